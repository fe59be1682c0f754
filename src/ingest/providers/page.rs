// src/ingest/providers/page.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;

use crate::ingest::normalize_text;
use crate::ingest::types::{PageFetch, PageFetcher};

/// Fetches an article page and keeps its paragraph-level text.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building page http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_paragraphs(&self, url: &str) -> Result<PageFetch> {
        let resp = self.client.get(url).send().await.context("page http get()")?;
        let status = resp.status();
        if !status.is_success() {
            return Ok(PageFetch::Unavailable(status.as_u16()));
        }
        let body = resp.text().await.context("page http .text()")?;
        Ok(PageFetch::Fetched(extract_paragraphs(&body)))
    }
}

/// Text of every `<p>` element, whitespace-collapsed, empty blocks dropped.
pub fn extract_paragraphs(html: &str) -> Vec<String> {
    let Ok(sel) = Selector::parse("p") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&sel)
        .map(|p| normalize_text(&p.text().collect::<Vec<_>>().join(" ")))
        .filter(|t| !t.is_empty())
        .collect()
}
