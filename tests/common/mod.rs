// tests/common/mod.rs
#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use incident_timeline::ingest::config::{PipelineConfig, SourceConfig, StoreConfig};
use incident_timeline::ingest::providers::rss::RssFeedSource;
use incident_timeline::ingest::types::{PageFetch, PageFetcher, Translator};
use incident_timeline::store::header_row;
use incident_timeline::{Collaborators, MemoryStore, Pipeline};

/// Every article page is gone; bodies come from summaries or titles.
pub struct NoPages;

#[async_trait]
impl PageFetcher for NoPages {
    async fn fetch_paragraphs(&self, _url: &str) -> Result<PageFetch> {
        Ok(PageFetch::Unavailable(404))
    }
}

/// Serves paragraphs per URL; anything else is a 404.
#[derive(Default)]
pub struct StaticPages(pub HashMap<String, Vec<String>>);

#[async_trait]
impl PageFetcher for StaticPages {
    async fn fetch_paragraphs(&self, url: &str) -> Result<PageFetch> {
        Ok(match self.0.get(url) {
            Some(p) => PageFetch::Fetched(p.clone()),
            None => PageFetch::Unavailable(404),
        })
    }
}

/// Word-for-word tr→en for the handful of words the fixtures use.
/// Texts containing "bozuk" fail.
#[derive(Default)]
pub struct DictTranslator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Translator for DictTranslator {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("bozuk") {
            bail!("translation backend returned 500");
        }
        let mut out = text.to_string();
        for (tr, en) in [
            ("Deprem", "Earthquake"),
            ("deprem", "earthquake"),
            ("yardım", "aid"),
            ("derbiyi", "the derby"),
        ] {
            out = out.replace(tr, en);
        }
        Ok(out)
    }
    fn name(&self) -> &'static str {
        "dict"
    }
}

pub const BBC_URL: &str = "https://feeds.bbci.co.uk/turkce/rss.xml";

pub fn bbc_fixture() -> String {
    std::fs::read_to_string("tests/fixtures/bbc_turkce_rss.xml").expect("fixture")
}

/// Minimal RSS document: (link, title, pubDate).
pub fn rss(items: &[(&str, &str, &str)]) -> String {
    let mut xml =
        String::from("<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>t</title>");
    for (link, title, date) in items {
        xml.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate></item>"
        ));
    }
    xml.push_str("</channel></rss>");
    xml
}

pub fn feed_url(source: &str) -> String {
    format!("https://{}.feeds.test/rss", source.to_lowercase())
}

/// Sources named after their feed URL, keyword `earthquake`, no pacing, no retries.
pub fn config(sources: &[&str]) -> PipelineConfig {
    let sources = sources
        .iter()
        .map(|s| SourceConfig::new(s, &feed_url(s)))
        .collect();
    let mut cfg = PipelineConfig::new(
        sources,
        StoreConfig {
            spreadsheet_id: "test-sheet".into(),
            range: "Timeline!A:F".into(),
            token_env: "UNUSED".into(),
        },
    );
    cfg.relevance.keywords = vec!["earthquake".into()];
    cfg.sink.pacing_ms = 0;
    cfg.retry.max_attempts = 1;
    cfg
}

/// Feeds keyed by source name.
pub fn feeds(docs: &[(&str, String)]) -> RssFeedSource {
    RssFeedSource::from_fixtures(docs.iter().map(|(s, xml)| (feed_url(s), xml.clone())))
}

pub fn pipeline(cfg: PipelineConfig, feeds: RssFeedSource, store: Arc<MemoryStore>) -> Pipeline {
    Pipeline::new(
        cfg,
        Collaborators {
            feeds: Arc::new(feeds),
            pages: Arc::new(NoPages),
            translator: None,
            store,
        },
    )
    .expect("pipeline")
}

/// Header plus the given data rows.
pub fn seeded(rows: &[[&str; 6]]) -> Arc<MemoryStore> {
    let mut all = vec![header_row()];
    all.extend(rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()));
    Arc::new(MemoryStore::seeded(all))
}
