// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod bootstrap;
pub mod ingest;
pub mod relevance;
pub mod retry;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::ingest::config::{load_config_default, load_config_from, PipelineConfig};
pub use crate::ingest::{Collaborators, Pipeline, RunReport, RunStage};
pub use crate::store::{MemoryStore, Store};
