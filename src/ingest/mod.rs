// src/ingest/mod.rs
pub mod config;
pub mod controller;
pub mod dedup;
pub mod normalize;
pub mod providers;
pub mod scheduler;
pub mod sequence;
pub mod sink;
pub mod timeline;
pub mod types;

pub use controller::{Collaborators, Pipeline, RunReport, RunStage};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// Spreadsheet cells hold at most 50k characters.
pub const CELL_CHAR_LIMIT: usize = 50_000;

/// One-time metrics registration (so series show up with descriptions).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("timeline_items_seen_total", "Feed entries seen across sources.");
        describe_counter!(
            "timeline_items_skipped_total",
            "Entries skipped for missing fields or translation failures."
        );
        describe_counter!(
            "timeline_filtered_total",
            "Entries dropped by the relevance filter."
        );
        describe_counter!(
            "timeline_dedup_total",
            "Entries whose link is already recorded."
        );
        describe_counter!(
            "timeline_stale_total",
            "Entries not newer than their source watermark."
        );
        describe_counter!(
            "timeline_feed_entries_total",
            "Entries parsed from fetched feeds."
        );
        describe_counter!("timeline_committed_total", "Rows appended to the store.");
        describe_counter!(
            "timeline_source_errors_total",
            "Sources skipped after feed fetch/parse errors."
        );
        describe_counter!("timeline_append_errors_total", "Failed store appends.");
        describe_counter!("timeline_runs_total", "Pipeline runs started.");
        describe_counter!("timeline_runs_failed_total", "Pipeline runs that ended in Failed.");
        describe_counter!(
            "timeline_scheduled_runs_total",
            "Runs started by the interval scheduler."
        );
        describe_histogram!("timeline_page_fetch_ms", "Article page fetch time in milliseconds.");
        describe_histogram!("timeline_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!("timeline_last_run_ts", "Unix ts when the pipeline last finished a run.");
    });
}

/// Decode entities, strip tags, collapse whitespace, trim, cap length.
///
/// Tag removal is a plain `<...>` pattern: malformed or unterminated markup can
/// leave residue in the output.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags; block boundaries become spaces so paragraphs don't fuse
    static RE_BLOCK: OnceCell<regex::Regex> = OnceCell::new();
    let re_block = RE_BLOCK
        .get_or_init(|| regex::Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6])\s*>").unwrap());
    out = re_block.replace_all(&out, " ").to_string();
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Collapse whitespace (incl. NBSP)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 4) Cell length cap
    if out.chars().count() > CELL_CHAR_LIMIT {
        out = out.chars().take(CELL_CHAR_LIMIT).collect();
    }

    out
}
