// src/ingest/sequence.rs
use crate::ingest::types::CandidateRecord;

/// Order the run's batch by ascending event time. The sort is stable, so items
/// sharing a timestamp keep their fetch order.
pub fn sequence(mut batch: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    batch.sort_by_key(|c| c.published_at);
    batch
}
