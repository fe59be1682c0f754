// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::ingest::config::SourceConfig;

/// One entry as parsed from a feed document. Every field is optional here;
/// `RawItem::from_entry` decides whether the entry is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    /// `guid` (RSS) or `id` (Atom).
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    /// Already normalized to UTC. `None` when absent or unparsable.
    pub published: Option<DateTime<Utc>>,
}

/// A feed entry that carries every required field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    /// Identifier used for full-text lookup (falls back to `link`).
    pub id: String,
    /// Canonical dedup key.
    pub link: String,
    pub title: String,
    pub summary: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source: String,
}

impl RawItem {
    pub fn from_entry(source: &str, entry: FeedEntry) -> Result<Self, SkipReason> {
        let link = non_blank(entry.link).ok_or(SkipReason::MissingField("link"))?;
        let title = non_blank(entry.title).ok_or(SkipReason::MissingField("title"))?;
        let published_at = entry
            .published
            .ok_or(SkipReason::MissingField("published"))?;
        let id = non_blank(entry.id).unwrap_or_else(|| link.clone());
        Ok(Self {
            id,
            link,
            title,
            summary: non_blank(entry.summary),
            published_at,
            source: source.to_string(),
        })
    }

    /// URL of the canonical page: the identifier when it is a web URL, else the link.
    pub fn page_url(&self) -> &str {
        let id = self.id.as_str();
        if id.starts_with("http://") || id.starts_with("https://") {
            id
        } else {
            &self.link
        }
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Where the body text of a normalized item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOrigin {
    Page,
    Summary,
    Title,
}

/// RawItem plus cleaned (and, if configured, translated) title and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    pub raw: RawItem,
    /// Working-language text.
    pub title: String,
    pub body: String,
    /// Source-language text, kept for script-specific matching.
    pub original_title: String,
    pub original_body: String,
    pub body_origin: BodyOrigin,
}

/// A relevant item, formatted for the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub source: String,
    pub date: String,
    pub time: String,
    /// "Source, DD/MM/YYYY HH:MM"
    pub label: String,
    pub link: String,
    pub text: String,
    /// Used for sequencing and freshness only; never persisted as-is.
    pub published_at: DateTime<Utc>,
}

impl CandidateRecord {
    pub fn into_row(self) -> PersistedRow {
        PersistedRow {
            date: self.date,
            time: self.time,
            text: self.text,
            source: self.source,
            label: self.label,
            link: self.link,
        }
    }
}

/// Exactly what gets appended to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRow {
    pub date: String,
    pub time: String,
    pub text: String,
    pub source: String,
    pub label: String,
    pub link: String,
}

impl PersistedRow {
    /// Column headers, in storage order.
    pub const HEADER: [&'static str; 6] = [
        "Date",
        "Time",
        "Information",
        "Source",
        "Source, Date Time",
        "Link",
    ];

    pub fn to_values(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.time.clone(),
            self.text.clone(),
            self.source.clone(),
            self.label.clone(),
            self.link.clone(),
        ]
    }
}

/// Why a single item was dropped. Never fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("translation failed: {0}")]
    Translation(String),
    #[error("not relevant")]
    Irrelevant,
    #[error("link already recorded")]
    Duplicate,
    #[error("not newer than source watermark {watermark}")]
    Stale { watermark: DateTime<Utc> },
}

/// Result of a page lookup that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageFetch {
    /// Success status; paragraph-level text blocks in document order.
    Fetched(Vec<String>),
    /// Non-success HTTP status.
    Unavailable(u16),
}

#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_entries(&self, source: &SourceConfig) -> Result<Vec<FeedEntry>>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_paragraphs(&self, url: &str) -> Result<PageFetch>;
}

#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}
