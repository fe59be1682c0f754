// src/ingest/providers/rss.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::{Captures, Regex};
use reqwest::Client;
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::config::SourceConfig;
use crate::ingest::types::{FeedEntry, FeedSource};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Text>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<Text>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<Text>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

/// Element whose attributes we ignore (`<guid isPermaLink=..>`, `<title type=..>`).
#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

/// RFC 2822 (RSS) or RFC 3339 (Atom), normalized to UTC.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond()))
        // chrono is more lenient with obsolete zone names ("GMT", "UT", "EST").
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Parse an RSS 2.0 or Atom document into feed entries.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let xml = scrub_html_entities_for_xml(xml);
    match from_str::<Rss>(&xml) {
        Ok(rss) => Ok(rss.channel.items.into_iter().map(rss_entry).collect()),
        Err(rss_err) if !xml.contains("<feed") => Err(anyhow!("not an RSS document: {rss_err}")),
        Err(rss_err) => {
            let atom: AtomFeed = from_str(&xml)
                .map_err(|atom_err| anyhow!("not RSS ({rss_err}) nor Atom ({atom_err})"))?;
            Ok(atom.entries.into_iter().map(atom_entry).collect())
        }
    }
}

fn rss_entry(it: Item) -> FeedEntry {
    FeedEntry {
        id: it.guid.map(|g| g.value),
        link: it.link,
        title: it.title,
        summary: it.description,
        published: it.pub_date.as_deref().and_then(parse_timestamp),
    }
}

fn atom_entry(e: AtomEntry) -> FeedEntry {
    let link = e
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| e.links.first())
        .map(|l| l.href.clone());
    FeedEntry {
        id: e.id,
        link,
        title: e.title.map(|t| t.value),
        summary: e.summary.map(|t| t.value),
        published: e
            .published
            .or(e.updated)
            .as_deref()
            .and_then(parse_timestamp),
    }
}

/// Rewrite HTML named entities (`&uuml;`, `&nbsp;`, ...) as numeric character
/// references so the XML parser accepts them. XML's own five are left alone;
/// names html-escape cannot resolve are escaped to literal text.
fn scrub_html_entities_for_xml(s: &str) -> Cow<'_, str> {
    static RE_ENTITY: OnceCell<Regex> = OnceCell::new();
    let re = RE_ENTITY.get_or_init(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]{1,31});").unwrap());
    re.replace_all(s, |caps: &Captures| {
        let (whole, name) = (&caps[0], &caps[1]);
        if matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
            return whole.to_string();
        }
        let decoded = html_escape::decode_html_entities(whole);
        if decoded == whole {
            return format!("&amp;{name};");
        }
        decoded.chars().map(|c| format!("&#{};", u32::from(c))).collect()
    })
}

pub struct RssFeedSource {
    mode: Mode,
}

enum Mode {
    Http(Client),
    /// feed_url -> document
    Fixtures(HashMap<String, String>),
}

impl RssFeedSource {
    pub fn http(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building feed http client")?;
        Ok(Self {
            mode: Mode::Http(client),
        })
    }

    pub fn from_fixture(feed_url: &str, xml: &str) -> Self {
        Self::from_fixtures([(feed_url.to_string(), xml.to_string())])
    }

    pub fn from_fixtures<I: IntoIterator<Item = (String, String)>>(docs: I) -> Self {
        Self {
            mode: Mode::Fixtures(docs.into_iter().collect()),
        }
    }

    async fn load(&self, url: &str) -> Result<String> {
        match &self.mode {
            Mode::Fixtures(docs) => docs
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("no fixture for {url}")),
            Mode::Http(client) => {
                let resp = client.get(url).send().await.context("feed http get()")?;
                let resp = resp.error_for_status().context("feed http status")?;
                resp.text().await.context("feed http .text()")
            }
        }
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch_entries(&self, source: &SourceConfig) -> Result<Vec<FeedEntry>> {
        let body = self.load(&source.feed_url).await?;
        let t0 = std::time::Instant::now();
        let entries =
            parse_feed(&body).with_context(|| format!("parsing feed of {}", source.name))?;
        histogram!("timeline_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("timeline_feed_entries_total").increment(entries.len() as u64);
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Http(_) => "rss-http",
            Mode::Fixtures(_) => "rss-fixture",
        }
    }
}
