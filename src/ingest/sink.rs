// src/ingest/sink.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::ingest::types::CandidateRecord;
use crate::store::Store;

/// What to do when a single append fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppendPolicy {
    /// Log and move on to the next row.
    #[default]
    Continue,
    /// Stop committing; rows already appended stay.
    Abort,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub committed: usize,
    pub failed: usize,
    pub cells_written: usize,
}

/// Appends rows one at a time, pausing `pacing` between appends.
///
/// Appends are not retried: a failed call may still have written the row, and
/// the next run's dedup/freshness check decides whether it gets re-admitted.
pub struct Sink {
    store: Arc<dyn Store>,
    range: String,
    pacing: Duration,
    policy: AppendPolicy,
}

impl Sink {
    pub fn new(store: Arc<dyn Store>, range: &str, pacing: Duration, policy: AppendPolicy) -> Self {
        Self {
            store,
            range: range.to_string(),
            pacing,
            policy,
        }
    }

    /// Commit in the given order. `report` is updated row by row so counts stay
    /// accurate even when the commit aborts halfway.
    pub async fn commit(
        &self,
        batch: Vec<CandidateRecord>,
        report: &mut CommitReport,
    ) -> Result<()> {
        let total = batch.len();
        for (i, candidate) in batch.into_iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            let link = candidate.link.clone();
            let row = candidate.into_row();
            match self.store.append(&self.range, row.to_values()).await {
                Ok(cells) => {
                    report.committed += 1;
                    report.cells_written += cells;
                    tracing::info!(
                        source = %row.source,
                        %link,
                        cells,
                        position = i + 1,
                        total,
                        "row appended"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(error = ?e, %link, position = i + 1, total, "append failed");
                    if self.policy == AppendPolicy::Abort {
                        return Err(e).with_context(|| {
                            format!("append aborted at row {} of {}", i + 1, total)
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn rec(link: &str) -> CandidateRecord {
        CandidateRecord {
            source: "X".into(),
            date: "07/02/2023".into(),
            time: "10:00".into(),
            label: "X, 07/02/2023 10:00".into(),
            link: link.into(),
            text: "t".into(),
            published_at: Utc.with_ymd_and_hms(2023, 2, 7, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn appends_in_order_and_counts_cells() {
        let store = Arc::new(MemoryStore::new());
        let sink = Sink::new(store.clone(), "A:F", Duration::ZERO, AppendPolicy::Continue);
        let mut rep = CommitReport::default();
        sink.commit(vec![rec("L1"), rec("L2")], &mut rep)
            .await
            .unwrap();
        assert_eq!(rep.committed, 2);
        assert_eq!(rep.cells_written, 12);
        let links: Vec<_> = store.data_rows().iter().map(|r| r[5].clone()).collect();
        assert_eq!(links, vec!["L1", "L2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_waits_between_appends_only() {
        let store = Arc::new(MemoryStore::new());
        let sink = Sink::new(store, "A:F", Duration::from_secs(1), AppendPolicy::Continue);
        let mut rep = CommitReport::default();
        let t0 = tokio::time::Instant::now();
        sink.commit(vec![rec("L1"), rec("L2"), rec("L3")], &mut rep)
            .await
            .unwrap();
        assert_eq!(t0.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn abort_policy_stops_after_first_failure() {
        let store = Arc::new(MemoryStore::new());
        store.fail_appends_for("L2");
        let sink = Sink::new(store.clone(), "A:F", Duration::ZERO, AppendPolicy::Abort);
        let mut rep = CommitReport::default();
        let res = sink
            .commit(vec![rec("L1"), rec("L2"), rec("L3")], &mut rep)
            .await;
        assert!(res.is_err());
        assert_eq!(rep.committed, 1);
        assert_eq!(rep.failed, 1);
        assert_eq!(store.data_rows().len(), 1);
    }

    #[tokio::test]
    async fn continue_policy_skips_failed_row() {
        let store = Arc::new(MemoryStore::new());
        store.fail_appends_for("L2");
        let sink = Sink::new(store.clone(), "A:F", Duration::ZERO, AppendPolicy::Continue);
        let mut rep = CommitReport::default();
        sink.commit(vec![rec("L1"), rec("L2"), rec("L3")], &mut rep)
            .await
            .unwrap();
        assert_eq!(rep.committed, 2);
        assert_eq!(rep.failed, 1);
    }
}
