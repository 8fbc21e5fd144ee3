//! Incremental change tracking (C6): classifies files as
//! unchanged/updated/created between ingestion runs via content-hash
//! comparison, and computes which existing graph nodes a re-parse should
//! delete.
//!
//! Deletion is scoped to `parsed_files` (SPEC_FULL.md §9 decision): a node
//! is a deletion candidate only if the file it belongs to was actually
//! re-parsed this run. A partial parse (one changed file among many)
//! never deletes nodes belonging to files it didn't touch.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::model::{ChangeEvent, ChangeType, NodeLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Unchanged,
    Created,
    Updated,
    Deleted,
}

/// Per-file content hashes carried across ingestion runs.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    file_hashes: HashMap<PathBuf, String>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with hashes read back from the store before this run starts,
    /// so the first file classified against them sees real history rather
    /// than treating everything as `Created`.
    pub fn with_hashes(file_hashes: HashMap<PathBuf, String>) -> Self {
        ChangeTracker { file_hashes }
    }

    /// Classify `path`'s new content hash against what's on record, then
    /// record it for next time.
    pub fn classify_file(&mut self, path: &Path, content_hash: &str) -> ChangeKind {
        let kind = match self.file_hashes.get(path) {
            None => ChangeKind::Created,
            Some(previous) if previous == content_hash => ChangeKind::Unchanged,
            Some(_) => ChangeKind::Updated,
        };
        self.file_hashes.insert(path.to_path_buf(), content_hash.to_string());
        kind
    }

    pub fn hash_for(&self, path: &Path) -> Option<&str> {
        self.file_hashes.get(path).map(String::as_str)
    }

    /// Identities in `existing` (read back from the store before this run)
    /// whose owning file is in `parsed_files` but which are absent from
    /// `surviving_identities` (what this run's extraction actually
    /// produced). These are orphans: scopes/files that used to exist under
    /// a re-parsed or now-vanished file and no longer do.
    pub fn deletions(
        existing: &[(String, PathBuf)],
        parsed_files: &HashSet<PathBuf>,
        surviving_identities: &HashSet<String>,
    ) -> Vec<String> {
        existing
            .iter()
            .filter(|(_, file)| parsed_files.contains(file))
            .map(|(identity, _)| identity.clone())
            .filter(|identity| !surviving_identities.contains(identity))
            .collect()
    }

    /// Builds the `ChangeEvent` emitted for an entity, `None` for
    /// `Unchanged` (no event is emitted when nothing changed).
    pub fn event_for(label: NodeLabel, change: ChangeKind, metadata_json: String) -> Option<ChangeEvent> {
        let change_type = match change {
            ChangeKind::Created => ChangeType::Created,
            ChangeKind::Updated => ChangeType::Updated,
            ChangeKind::Deleted => ChangeType::Deleted,
            ChangeKind::Unchanged => return None,
        };
        Some(ChangeEvent {
            entity_type: label,
            change_type,
            timestamp: Utc::now().into(),
            metadata_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn first_sighting_is_created() {
        let mut tracker = ChangeTracker::new();
        assert_eq!(tracker.classify_file(Path::new("a.rs"), "h1"), ChangeKind::Created);
    }

    #[test]
    fn identical_hash_is_unchanged() {
        let mut tracker = ChangeTracker::new();
        tracker.classify_file(Path::new("a.rs"), "h1");
        assert_eq!(tracker.classify_file(Path::new("a.rs"), "h1"), ChangeKind::Unchanged);
    }

    #[test]
    fn different_hash_is_updated() {
        let mut tracker = ChangeTracker::new();
        tracker.classify_file(Path::new("a.rs"), "h1");
        assert_eq!(tracker.classify_file(Path::new("a.rs"), "h2"), ChangeKind::Updated);
    }

    #[test]
    fn deletions_scoped_to_parsed_files_only() {
        let existing = vec![
            ("file:a.rs".to_string(), PathBuf::from("a.rs")),
            ("file:untouched.rs".to_string(), PathBuf::from("untouched.rs")),
        ];

        let parsed_files: HashSet<PathBuf> = [PathBuf::from("a.rs")].into_iter().collect();
        let surviving: HashSet<String> = HashSet::new();

        let deletions = ChangeTracker::deletions(&existing, &parsed_files, &surviving);
        assert_eq!(deletions, vec!["file:a.rs".to_string()]);
    }

    #[test]
    fn deletions_excludes_identities_that_survived_the_reparse() {
        let existing = vec![("scope:abc".to_string(), PathBuf::from("a.rs"))];
        let parsed_files: HashSet<PathBuf> = [PathBuf::from("a.rs")].into_iter().collect();
        let surviving: HashSet<String> = ["scope:abc".to_string()].into_iter().collect();

        let deletions = ChangeTracker::deletions(&existing, &parsed_files, &surviving);
        assert!(deletions.is_empty());
    }
}
