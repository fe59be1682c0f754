// src/ingest/normalize.rs
use metrics::histogram;
use std::sync::Arc;

use crate::ingest::normalize_text;
use crate::ingest::types::{
    BodyOrigin, NormalizedItem, PageFetch, PageFetcher, RawItem, SkipReason, Translator,
};
use crate::retry::{with_retry, RetryPolicy};

/// Turns a RawItem into clean (and optionally translated) title + body.
///
/// Body priority: article page paragraphs → feed summary → title.
pub struct ContentNormalizer {
    pages: Arc<dyn PageFetcher>,
    translator: Option<Arc<dyn Translator>>,
    target_language: String,
    retry: RetryPolicy,
}

impl ContentNormalizer {
    pub fn new(
        pages: Arc<dyn PageFetcher>,
        translator: Option<Arc<dyn Translator>>,
        target_language: &str,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            pages,
            translator,
            target_language: target_language.to_string(),
            retry,
        }
    }

    pub async fn normalize(
        &self,
        raw: RawItem,
        source_language: &str,
    ) -> Result<NormalizedItem, SkipReason> {
        let title = normalize_text(&raw.title);
        let (body, body_origin) = self.resolve_body(&raw, &title).await;

        let (t_title, t_body) = match &self.translator {
            Some(tr) if !same_language(source_language, &self.target_language) => {
                let t_title = self.translate(tr.as_ref(), &title, source_language).await?;
                let t_body = if body_origin == BodyOrigin::Title {
                    t_title.clone()
                } else {
                    self.translate(tr.as_ref(), &body, source_language).await?
                };
                (normalize_text(&t_title), normalize_text(&t_body))
            }
            _ => (title.clone(), body.clone()),
        };

        Ok(NormalizedItem {
            raw,
            title: t_title,
            body: t_body,
            original_title: title,
            original_body: body,
            body_origin,
        })
    }

    async fn resolve_body(&self, raw: &RawItem, clean_title: &str) -> (String, BodyOrigin) {
        let url = raw.page_url();
        let t0 = std::time::Instant::now();
        let fetched =
            with_retry(self.retry, "page fetch", || self.pages.fetch_paragraphs(url)).await;
        histogram!("timeline_page_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match fetched {
            Ok(PageFetch::Fetched(paragraphs)) => {
                let body = normalize_text(&paragraphs.join(" "));
                if !body.is_empty() {
                    return (body, BodyOrigin::Page);
                }
                tracing::debug!(%url, "page has no paragraph text; falling back");
            }
            Ok(PageFetch::Unavailable(status)) => {
                tracing::debug!(%url, status, "page unavailable; falling back");
            }
            Err(e) => {
                tracing::warn!(error = %e, %url, "page fetch failed; falling back");
            }
        }

        let summary = raw.summary.as_deref().map(normalize_text).unwrap_or_default();
        if !summary.is_empty() {
            (summary, BodyOrigin::Summary)
        } else {
            (clean_title.to_string(), BodyOrigin::Title)
        }
    }

    async fn translate(
        &self,
        tr: &dyn Translator,
        text: &str,
        source_language: &str,
    ) -> Result<String, SkipReason> {
        with_retry(self.retry, "translation", || {
            tr.translate(text, source_language, &self.target_language)
        })
        .await
        .map_err(|e| SkipReason::Translation(format!("{e:#}")))
    }
}

fn same_language(source: &str, target: &str) -> bool {
    source.eq_ignore_ascii_case(target)
}
