// src/ingest/scheduler.rs
use std::time::Duration;

use metrics::counter;
use tokio::time::MissedTickBehavior;

use crate::ingest::controller::{Pipeline, RunReport};

/// Run the pipeline on a fixed interval, one run at a time.
///
/// The first run starts immediately. A run that outlasts the interval delays the
/// next tick instead of stacking runs. `max_runs = None` loops until the future is
/// dropped (e.g. by a `select!` on ctrl-c). Returns the number of completed runs.
pub async fn run_every<F>(
    pipeline: &Pipeline,
    every: Duration,
    max_runs: Option<usize>,
    mut on_report: F,
) -> usize
where
    F: FnMut(&RunReport),
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut runs = 0usize;
    while max_runs.map_or(true, |m| runs < m) {
        ticker.tick().await;
        let report = pipeline.run().await;
        runs += 1;
        counter!("timeline_scheduled_runs_total").increment(1);
        tracing::info!(
            target: "scheduler",
            run = runs,
            ok = report.is_success(),
            committed = report.committed,
            next_in_secs = every.as_secs(),
            "scheduled run complete"
        );
        on_report(&report);
    }
    runs
}
