//! Shared incremental-ingest orchestration (C6 wiring): the classify,
//! parse, upsert, delete pipeline used by the CLI's `index` command, the
//! `/ingest` HTTP handler, and the watcher's reingest loop, so all three
//! run the same pass instead of each doing its own full reparse-and-upsert.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use scopegraph_core::{ChangeKind, ChangeTracker, CoreError, GraphNode, IdentityTuple, UuidRegistry};

use crate::coordinator::{Coordinator, IngestionStats};
use crate::discover::discover_files;
use crate::store::{ExecutionReport, IngestionExecutor};

/// `{created, updated, unchanged, deleted}` per the `parseAndIngest`
/// contract (§6).
#[derive(Debug, Default)]
pub struct IngestCounts {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub stats: IngestionStats,
    pub counts: IngestCounts,
    pub report: ExecutionReport,
}

/// Runs one incremental ingestion pass over `root`.
///
/// The whole discovered file set is re-parsed every run — cross-file
/// reference resolution needs every file's symbols visible at once (§4.3)
/// — but the store write is not: each file is classified against its
/// content hash on record (C6), uuids for unchanged scopes are seeded from
/// the store rather than freshly minted, and anything that used to live
/// under a reparsed-or-vanished file but didn't come back out the other
/// end is `DETACH DELETE`d (§9 deletion scoping).
pub async fn run_incremental(
    root: &Path,
    include: &[String],
    exclude: &[String],
    executor: &IngestionExecutor,
) -> Result<IngestOutcome, CoreError> {
    let discovered = discover_files(root, include, exclude)?;
    let coordinator = Coordinator::new(root);
    let current_files: HashSet<PathBuf> = coordinator.parsed_file_set(&relative_paths(root, &discovered));

    let known_hashes = executor.load_file_hashes().await?;
    let removed_files: HashSet<PathBuf> = known_hashes.keys().filter(|f| !current_files.contains(*f)).cloned().collect();
    let reindex_scope: HashSet<PathBuf> = current_files.union(&removed_files).cloned().collect();

    let mut tracker = ChangeTracker::with_hashes(known_hashes);

    let registry = UuidRegistry::new();
    for scope in executor.load_existing_scopes(&reindex_scope).await? {
        registry.seed(
            IdentityTuple { parent: scope.parent, signature: scope.signature, kind: scope.kind, line: scope.line },
            scope.identity,
            &scope.name,
            &scope.file,
            scope.kind,
        );
    }

    let (graph, stats) = coordinator
        .run_full_index_with_registry(&discovered, &registry)
        .map_err(|e| CoreError::ParseError { file: root.display().to_string(), message: e.to_string() })?;

    let mut counts = IngestCounts::default();
    for path in &current_files {
        let hash = graph.all_nodes().find_map(|n| match n {
            GraphNode::File(f) if &f.path == path => Some(f.content_hash.clone()),
            _ => None,
        });
        let Some(hash) = hash else { continue };
        match tracker.classify_file(path, &hash) {
            ChangeKind::Created => counts.created += 1,
            ChangeKind::Updated => counts.updated += 1,
            ChangeKind::Unchanged => counts.unchanged += 1,
            ChangeKind::Deleted => {}
        }
    }

    let surviving_identities: HashSet<String> = graph.all_nodes().map(GraphNode::identity).collect();
    let existing_identities = executor.load_existing_identities(&reindex_scope).await?;
    let orphans = ChangeTracker::deletions(&existing_identities, &reindex_scope, &surviving_identities);

    let report = executor.upsert(&graph, false).await?;
    counts.deleted = executor.delete_by_identity(&orphans).await?;

    Ok(IngestOutcome { stats, counts, report })
}

fn relative_paths(root: &Path, files: &[PathBuf]) -> Vec<PathBuf> {
    files.iter().map(|f| f.strip_prefix(root).unwrap_or(f).to_path_buf()).collect()
}
