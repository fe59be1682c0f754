// src/ingest/dedup.rs
//! Store snapshot + freshness/dedup gate.
//!
//! The snapshot is rebuilt from the store contents on every run; there is no
//! separate cursor. Reruns after a partial commit are therefore self-healing:
//! anything already appended is excluded by link, anything missing is admitted.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::ingest::timeline::TimelineClock;
use crate::ingest::types::{CandidateRecord, SkipReason};

/// Links and per-source watermarks, read once at the start of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    links: HashSet<String>,
    watermarks: HashMap<String, DateTime<Utc>>,
    rows: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct Columns {
    date: Option<usize>,
    time: Option<usize>,
    source: Option<usize>,
    link: Option<usize>,
}

impl Columns {
    fn from_header(header: &[String]) -> Self {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        Self {
            date: find("date"),
            time: find("time"),
            source: find("source"),
            link: find("link"),
        }
    }

    fn is_empty(&self) -> bool {
        self.link.is_none() && (self.date.is_none() || self.source.is_none())
    }
}

fn cell(row: &[String], idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

impl StoreSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a raw store read: first row is the header, the rest is data.
    /// Columns are located by header name; missing columns degrade to an
    /// empty link set and/or no watermarks.
    pub fn from_rows(rows: &[Vec<String>], clock: &TimelineClock) -> Self {
        let Some((header, data)) = rows.split_first() else {
            return Self::empty();
        };
        let cols = Columns::from_header(header);
        if cols.is_empty() {
            tracing::warn!(
                header = ?header,
                "store header does not match the timeline schema; treating snapshot as empty"
            );
            return Self::empty();
        }

        let mut snap = Self::empty();
        let mut unparsed = 0usize;
        for row in data {
            if row.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            snap.rows += 1;
            if let Some(link) = cell(row, cols.link) {
                snap.links.insert(link.to_string());
            }
            let Some(source) = cell(row, cols.source) else {
                continue;
            };
            let date = cell(row, cols.date).unwrap_or_default();
            let time = cell(row, cols.time).unwrap_or("00:00");
            match clock.parse(date, time) {
                Some(ts) => snap.observe(source, ts),
                None => unparsed += 1,
            }
        }
        if unparsed > 0 {
            tracing::debug!(unparsed, "rows without a parsable Date/Time ignored for watermarks");
        }
        snap
    }

    pub fn observe(&mut self, source: &str, ts: DateTime<Utc>) {
        self.watermarks
            .entry(source.to_string())
            .and_modify(|w| {
                if ts > *w {
                    *w = ts;
                }
            })
            .or_insert(ts);
    }

    pub fn insert_link(&mut self, link: &str) {
        self.links.insert(link.to_string());
    }

    pub fn contains_link(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    pub fn watermark(&self, source: &str) -> Option<DateTime<Utc>> {
        self.watermarks.get(source).copied()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Non-empty data rows seen while building the snapshot.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty() && self.watermarks.is_empty()
    }
}

/// Gate decision for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Admit,
    Duplicate,
    Stale { watermark: DateTime<Utc> },
}

impl Gate {
    pub fn skip_reason(self) -> Option<SkipReason> {
        match self {
            Gate::Admit => None,
            Gate::Duplicate => Some(SkipReason::Duplicate),
            Gate::Stale { watermark } => Some(SkipReason::Stale { watermark }),
        }
    }
}

/// Applies dedup + freshness against the run's snapshot. Links admitted during
/// the run are remembered so the same link is never committed twice in one run.
/// Watermarks are *not* advanced mid-run.
#[derive(Debug)]
pub struct FreshnessGate {
    snapshot: StoreSnapshot,
    admitted: HashSet<String>,
}

impl FreshnessGate {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self {
            snapshot,
            admitted: HashSet::new(),
        }
    }

    /// Pure check; does not record anything.
    pub fn check(&self, source: &str, link: &str, ts: DateTime<Utc>) -> Gate {
        if self.snapshot.contains_link(link) || self.admitted.contains(link) {
            return Gate::Duplicate;
        }
        match self.snapshot.watermark(source) {
            Some(watermark) if ts <= watermark => Gate::Stale { watermark },
            _ => Gate::Admit,
        }
    }

    /// Check and, on admit, reserve the link for this run.
    pub fn admit(&mut self, candidate: &CandidateRecord) -> Gate {
        let g = self.check(&candidate.source, &candidate.link, candidate.published_at);
        if g == Gate::Admit {
            self.admitted.insert(candidate.link.clone());
        }
        g
    }

    pub fn admitted_count(&self) -> usize {
        self.admitted.len()
    }
}
