// src/ingest/controller.rs
//! Run controller: one pass of
//! `Init → LoadSnapshot → Collect → Sequence → Commit → Done`, with `Failed`
//! reachable from any stage. Collect runs fetch → normalize → filter per source.
//!
//! Failure isolation:
//! - feed fetch/parse error → that source is skipped, the run continues;
//! - missing field / translation error / irrelevant / duplicate / stale → that item is skipped;
//! - store read error → fatal before any write;
//! - append error → per `sink.on_append_error`.
//!
//! `Pipeline::run` never returns an error: it always yields a `RunReport` and
//! logs a summary line, whether the run finished or failed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::ingest::config::{PipelineConfig, SourceConfig};
use crate::ingest::dedup::{FreshnessGate, StoreSnapshot};
use crate::ingest::ensure_metrics_described;
use crate::ingest::normalize::ContentNormalizer;
use crate::ingest::sequence::sequence;
use crate::ingest::sink::{CommitReport, Sink};
use crate::ingest::timeline::TimelineClock;
use crate::ingest::types::{
    CandidateRecord, FeedEntry, FeedSource, NormalizedItem, PageFetcher, RawItem, SkipReason,
    Translator,
};
use crate::relevance::RelevanceFilter;
use crate::retry::{with_retry, RetryPolicy};
use crate::store::{header_row, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStage {
    Init,
    LoadSnapshot,
    Collect,
    Sequence,
    Commit,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stage: RunStage,
    /// Stage that was active when the run failed.
    pub failed_at: Option<RunStage>,
    pub error: Option<String>,

    pub sources_total: usize,
    pub sources_disabled: usize,
    pub sources_failed: usize,

    pub items_seen: usize,
    /// Missing required fields or translation failures.
    pub items_skipped: usize,
    /// Rejected by the relevance filter.
    pub filtered_out: usize,
    pub duplicates: usize,
    pub stale: usize,

    pub committed: usize,
    pub append_failures: usize,
    pub cells_written: usize,
}

impl RunReport {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            stage: RunStage::Init,
            failed_at: None,
            error: None,
            sources_total: 0,
            sources_disabled: 0,
            sources_failed: 0,
            items_seen: 0,
            items_skipped: 0,
            filtered_out: 0,
            duplicates: 0,
            stale: 0,
            committed: 0,
            append_failures: 0,
            cells_written: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.stage == RunStage::Done
    }

    fn record_skip(&mut self, source: &str, link: Option<&str>, reason: SkipReason) {
        let link = link.unwrap_or("-");
        match &reason {
            SkipReason::MissingField(_) | SkipReason::Translation(_) => {
                self.items_skipped += 1;
                warn!(%source, %link, %reason, "item skipped");
            }
            SkipReason::Irrelevant => {
                self.filtered_out += 1;
                info!(%source, %link, "item irrelevant");
            }
            SkipReason::Duplicate => {
                self.duplicates += 1;
                debug!(%source, %link, "item already recorded");
            }
            SkipReason::Stale { watermark } => {
                self.stale += 1;
                debug!(%source, %link, %watermark, "item older than watermark");
            }
        }
    }

    fn absorb_commit(&mut self, c: &CommitReport) {
        self.committed = c.committed;
        self.append_failures = c.failed;
        self.cells_written = c.cells_written;
    }

    fn log_summary(&self) {
        let elapsed_ms = self
            .finished_at
            .map(|f| (f - self.started_at).num_milliseconds())
            .unwrap_or_default();
        if self.is_success() {
            info!(
                sources = self.sources_total,
                sources_failed = self.sources_failed,
                seen = self.items_seen,
                skipped = self.items_skipped,
                filtered_out = self.filtered_out,
                duplicates = self.duplicates,
                stale = self.stale,
                committed = self.committed,
                append_failures = self.append_failures,
                elapsed_ms,
                "run finished"
            );
        } else {
            error!(
                failed_at = ?self.failed_at,
                error = self.error.as_deref().unwrap_or_default(),
                sources = self.sources_total,
                sources_failed = self.sources_failed,
                seen = self.items_seen,
                skipped = self.items_skipped,
                filtered_out = self.filtered_out,
                duplicates = self.duplicates,
                stale = self.stale,
                committed = self.committed,
                append_failures = self.append_failures,
                elapsed_ms,
                "run failed"
            );
        }
    }

    fn record_metrics(&self) {
        counter!("timeline_items_seen_total").increment(self.items_seen as u64);
        counter!("timeline_items_skipped_total").increment(self.items_skipped as u64);
        counter!("timeline_filtered_total").increment(self.filtered_out as u64);
        counter!("timeline_dedup_total").increment(self.duplicates as u64);
        counter!("timeline_stale_total").increment(self.stale as u64);
        counter!("timeline_committed_total").increment(self.committed as u64);
        counter!("timeline_source_errors_total").increment(self.sources_failed as u64);
        counter!("timeline_append_errors_total").increment(self.append_failures as u64);
        if !self.is_success() {
            counter!("timeline_runs_failed_total").increment(1);
        }
        let ts = self.finished_at.unwrap_or(self.started_at).timestamp();
        gauge!("timeline_last_run_ts").set(ts as f64);
    }
}

/// External collaborators the pipeline talks to.
pub struct Collaborators {
    pub feeds: Arc<dyn FeedSource>,
    pub pages: Arc<dyn PageFetcher>,
    pub translator: Option<Arc<dyn Translator>>,
    pub store: Arc<dyn Store>,
}

pub struct Pipeline {
    config: PipelineConfig,
    feeds: Arc<dyn FeedSource>,
    store: Arc<dyn Store>,
    normalizer: ContentNormalizer,
    relevance: RelevanceFilter,
    clock: TimelineClock,
    sink: Sink,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, c: Collaborators) -> Result<Self> {
        config.validate()?;
        let clock = TimelineClock::with_offset_minutes(config.timeline.utc_offset_minutes)?;
        let retry = config.retry.policy();
        let target_language = config
            .translation
            .as_ref()
            .map(|t| t.target_language.as_str())
            .unwrap_or("en");
        let normalizer = ContentNormalizer::new(c.pages, c.translator, target_language, retry);
        let sink = Sink::new(
            c.store.clone(),
            &config.store.range,
            config.sink.pacing(),
            config.sink.on_append_error,
        );
        Ok(Self {
            relevance: RelevanceFilter::new(&config.relevance),
            feeds: c.feeds,
            store: c.store,
            normalizer,
            clock,
            sink,
            retry,
            config,
        })
    }

    pub async fn run(&self) -> RunReport {
        ensure_metrics_described();
        counter!("timeline_runs_total").increment(1);

        let mut report = RunReport::start();
        info!(
            sources = self.config.sources.len(),
            feeds = self.feeds.name(),
            store = self.store.name(),
            "run started"
        );

        match self.execute(&mut report).await {
            Ok(()) => report.stage = RunStage::Done,
            Err(e) => {
                report.failed_at = Some(report.stage);
                report.error = Some(format!("{e:#}"));
                report.stage = RunStage::Failed;
            }
        }
        report.finished_at = Some(Utc::now());
        report.record_metrics();
        report.log_summary();
        report
    }

    async fn execute(&self, report: &mut RunReport) -> Result<()> {
        report.stage = RunStage::LoadSnapshot;
        let (snapshot, store_is_blank) = self.load_snapshot().await?;
        let mut gate = FreshnessGate::new(snapshot);

        report.stage = RunStage::Collect;
        let mut batch = Vec::new();
        for source in &self.config.sources {
            report.sources_total += 1;
            if !source.enabled {
                report.sources_disabled += 1;
                debug!(source = %source.name, "source disabled");
                continue;
            }
            if let Err(e) = self
                .collect_source(source, &mut gate, report, &mut batch)
                .await
            {
                report.sources_failed += 1;
                warn!(error = ?e, source = %source.name, "source skipped");
            }
        }

        report.stage = RunStage::Sequence;
        let batch = sequence(batch);

        report.stage = RunStage::Commit;
        if batch.is_empty() {
            return Ok(());
        }
        if store_is_blank {
            // A header-less store would read back its first data row as the header.
            self.store
                .append(&self.config.store.range, header_row())
                .await
                .context("writing timeline header")?;
        }
        let mut commit = CommitReport::default();
        let res = self.sink.commit(batch, &mut commit).await;
        report.absorb_commit(&commit);
        res
    }

    async fn load_snapshot(&self) -> Result<(StoreSnapshot, bool)> {
        let range = self.config.store.range.as_str();
        let rows = with_retry(self.retry, "store read", || self.store.read(range))
            .await
            .context("loading store snapshot")?;
        let blank = rows.iter().all(|r| r.iter().all(|c| c.trim().is_empty()));
        let snapshot = StoreSnapshot::from_rows(&rows, &self.clock);
        info!(
            rows = snapshot.row_count(),
            links = snapshot.link_count(),
            "snapshot loaded"
        );
        Ok((snapshot, blank))
    }

    /// Err means the whole source is skipped.
    async fn collect_source(
        &self,
        source: &SourceConfig,
        gate: &mut FreshnessGate,
        report: &mut RunReport,
        batch: &mut Vec<CandidateRecord>,
    ) -> Result<()> {
        let entries = with_retry(self.retry, "feed fetch", || self.feeds.fetch_entries(source))
            .await
            .with_context(|| format!("fetching feed {}", source.feed_url))?;
        debug!(source = %source.name, entries = entries.len(), "feed fetched");

        let before = batch.len();
        for entry in entries {
            report.items_seen += 1;
            let link = entry.link.clone();
            match self.process_entry(source, entry, gate).await {
                Ok(candidate) => batch.push(candidate),
                Err(reason) => report.record_skip(&source.name, link.as_deref(), reason),
            }
        }
        info!(
            source = %source.name,
            candidates = batch.len() - before,
            "source collected"
        );
        Ok(())
    }

    async fn process_entry(
        &self,
        source: &SourceConfig,
        entry: FeedEntry,
        gate: &mut FreshnessGate,
    ) -> Result<CandidateRecord, SkipReason> {
        let raw = RawItem::from_entry(&source.name, entry)?;

        // Cheap pre-check: skip page fetch + translation for items that cannot be admitted.
        if let Some(reason) = gate
            .check(&raw.source, &raw.link, raw.published_at)
            .skip_reason()
        {
            return Err(reason);
        }

        let item = self
            .normalizer
            .normalize(raw, source.source_language())
            .await?;

        let rel = self.relevance.evaluate(&item, &source.required_terms);
        if !rel.is_relevant() {
            debug!(link = %item.raw.link, reasons = ?rel.reasons, "relevance rejected");
            return Err(SkipReason::Irrelevant);
        }
        debug!(link = %item.raw.link, matched = ?rel.matched, "relevance accepted");

        let candidate = self.candidate(item);
        match gate.admit(&candidate).skip_reason() {
            Some(reason) => Err(reason),
            None => Ok(candidate),
        }
    }

    fn candidate(&self, item: NormalizedItem) -> CandidateRecord {
        let ts = item.raw.published_at;
        CandidateRecord {
            date: self.clock.date(ts),
            time: self.clock.time(ts),
            label: self.clock.label(&item.raw.source, ts),
            source: item.raw.source,
            link: item.raw.link,
            text: item.body,
            published_at: ts,
        }
    }
}
