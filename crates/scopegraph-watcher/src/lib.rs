//! Filesystem watching: debounces change events and triggers incremental
//! re-ingestion through the indexer and store crates.

pub mod watcher;
