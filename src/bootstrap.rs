// src/bootstrap.rs
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::ingest::config::PipelineConfig;
use crate::ingest::providers::{
    page::HttpPageFetcher, rss::RssFeedSource, translate::HttpTranslator,
};
use crate::ingest::types::Translator;
use crate::ingest::{Collaborators, Pipeline};
use crate::store::{sheets::SheetsStore, MemoryStore, Store};

/// Wire the HTTP collaborators described by `config` into a ready pipeline.
///
/// With `dry_run` the live store is read once and every append lands in an
/// in-memory copy instead.
pub async fn build_pipeline(config: PipelineConfig, dry_run: bool) -> Result<Pipeline> {
    config.validate()?;
    let timeout = Duration::from_secs(config.http.timeout_secs);
    let ua = config.http.user_agent.as_str();

    let token = std::env::var(&config.store.token_env).map_err(|_| {
        anyhow!(
            "store token missing: set {} to a Sheets bearer token",
            config.store.token_env
        )
    })?;
    // Safe diagnostics: only ids + token length
    info!(
        spreadsheet = %config.store.spreadsheet_id,
        range = %config.store.range,
        token_len = token.len(),
        dry_run,
        "store configured"
    );
    let live: Arc<dyn Store> = Arc::new(SheetsStore::new(
        &config.store.spreadsheet_id,
        token,
        timeout,
        ua,
    )?);

    let store: Arc<dyn Store> = if dry_run {
        let rows = live
            .read(&config.store.range)
            .await
            .context("seeding dry-run store")?;
        info!(rows = rows.len(), "dry run: appends stay in memory");
        Arc::new(MemoryStore::seeded(rows))
    } else {
        live
    };

    let translator: Option<Arc<dyn Translator>> = match &config.translation {
        Some(t) => {
            let key = t.api_key_env.as_deref().and_then(|var| match std::env::var(var) {
                Ok(k) if !k.trim().is_empty() => Some(k),
                _ => {
                    warn!(env = var, "translation api key env unset; calling without key");
                    None
                }
            });
            let tr: Arc<dyn Translator> =
                Arc::new(HttpTranslator::new(&t.endpoint, key, timeout, ua)?);
            Some(tr)
        }
        None => {
            info!("translation disabled; items stay in their source language");
            None
        }
    };

    let collab = Collaborators {
        feeds: Arc::new(RssFeedSource::http(timeout, ua)?),
        pages: Arc::new(HttpPageFetcher::new(timeout, ua)?),
        translator,
        store,
    };
    Pipeline::new(config, collab)
}
