// src/store/mod.rs
//! Append-only row store behind a narrow read/append interface.

pub mod sheets;

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::ingest::types::PersistedRow;

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// All rows in `range`, header first. Trailing empty cells may be omitted.
    async fn read(&self, range: &str) -> Result<Vec<Vec<String>>>;
    /// Append exactly one row; returns the number of cells written.
    async fn append(&self, range: &str, values: Vec<String>) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-process store. Used by tests and by dry runs (seeded from the live store).
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Vec<String>>>,
    fail_reads: Mutex<bool>,
    fail_links: Mutex<HashSet<String>>,
    appends: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(rows: Vec<Vec<String>>) -> Self {
        let s = Self::default();
        *s.rows.lock().unwrap() = rows;
        s
    }

    /// Store that already holds the timeline header row.
    pub fn with_header() -> Self {
        Self::seeded(vec![header_row()])
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }

    /// Rows without the header (if one is present).
    pub fn data_rows(&self) -> Vec<Vec<String>> {
        let rows = self.rows.lock().unwrap();
        let skip = usize::from(rows.first().is_some_and(|r| is_header(r)));
        rows[skip..].to_vec()
    }

    /// Number of successful `append` calls so far.
    pub fn append_calls(&self) -> usize {
        *self.appends.lock().unwrap()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    /// Make every append whose values contain `link` fail.
    pub fn fail_appends_for(&self, link: &str) {
        self.fail_links.lock().unwrap().insert(link.to_string());
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn read(&self, _range: &str) -> Result<Vec<Vec<String>>> {
        if *self.fail_reads.lock().unwrap() {
            bail!("memory store: read failure injected");
        }
        Ok(self.rows())
    }

    async fn append(&self, _range: &str, values: Vec<String>) -> Result<usize> {
        {
            let fail = self.fail_links.lock().unwrap();
            if values.iter().any(|v| fail.contains(v)) {
                bail!("memory store: append failure injected");
            }
        }
        let cells = values.len();
        self.rows.lock().unwrap().push(values);
        *self.appends.lock().unwrap() += 1;
        Ok(cells)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

pub fn header_row() -> Vec<String> {
    PersistedRow::HEADER.iter().map(|h| h.to_string()).collect()
}

fn is_header(row: &[String]) -> bool {
    row.first()
        .is_some_and(|c| c.trim().eq_ignore_ascii_case(PersistedRow::HEADER[0]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_read_back() {
        let s = MemoryStore::with_header();
        let n = s
            .append("A:F", vec!["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(s.read("A:F").await.unwrap().len(), 2);
        assert_eq!(s.data_rows(), vec![vec!["a".to_string(), "b".to_string()]]);
        assert_eq!(s.append_calls(), 1);
    }

    #[tokio::test]
    async fn injected_failures() {
        let s = MemoryStore::new();
        s.set_fail_reads(true);
        assert!(s.read("A:F").await.is_err());
        s.fail_appends_for("L1");
        assert!(s.append("A:F", vec!["L1".into()]).await.is_err());
        assert_eq!(s.append_calls(), 0);
    }
}
