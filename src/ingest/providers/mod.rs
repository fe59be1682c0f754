// src/ingest/providers/mod.rs
//! Concrete collaborators: feeds, article pages, translation.

pub mod page;
pub mod rss;
pub mod translate;
