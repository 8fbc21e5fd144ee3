//! Ingestion coordinator: orchestrates C1 -> C2 -> C3 -> C4 for a full run
//! (§2 data flow, §5.2 scheduling model).
//!
//! Parsing fans out in parallel up to a configured `concurrency` (default
//! 5); graph assembly and reference resolution then run single-threaded
//! over the whole parsed batch, since both need every file's symbols
//! visible before cross-file references can resolve.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{FixedOffset, Utc};
use rayon::prelude::*;
use scopegraph_core::{Graph, SymbolTable, UuidRegistry};
use tracing::warn;

use crate::assembler::{assemble_libraries, Assembler};
use crate::extractor::ParsedFile;
use crate::languages::get_extractor;
use crate::resolver;

pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Default)]
pub struct IngestionStats {
    pub files_parsed: usize,
    pub files_failed: usize,
    pub scopes_assembled: usize,
    pub edges_assembled: usize,
}

pub struct Coordinator {
    project_root: PathBuf,
    concurrency: usize,
}

impl Coordinator {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self { project_root: project_root.into(), concurrency: DEFAULT_CONCURRENCY }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Runs a full ingestion pass over `files` with a fresh `UuidRegistry`.
    /// Returns the assembled graph and the set of scope uuids defined by
    /// each successfully parsed file, which the caller hands to the change
    /// tracker (C6) alongside the set of files actually covered by this
    /// parse.
    pub fn run_full_index(&self, files: &[PathBuf]) -> Result<(Graph, IngestionStats)> {
        self.run_full_index_with_registry(files, &UuidRegistry::new())
    }

    /// Same as `run_full_index`, but against a caller-supplied registry —
    /// used by incremental reindex runs that pre-seed `registry` with
    /// `(identity, uuid)` pairs read back from the store, so unchanged
    /// scopes reuse their existing uuid rather than relying solely on
    /// `scope_uuid`'s determinism.
    pub fn run_full_index_with_registry(&self, files: &[PathBuf], registry: &UuidRegistry) -> Result<(Graph, IngestionStats)> {
        let thread_pool = rayon::ThreadPoolBuilder::new().num_threads(self.concurrency).build()?;

        let parsed: Vec<Option<ParsedFile>> = thread_pool.install(|| {
            files
                .par_iter()
                .map(|path| match parse_one(path) {
                    Ok(parsed_file) => Some(parsed_file),
                    Err(error) => {
                        warn!(file = %path.display(), %error, "parse failed, skipping file");
                        None
                    }
                })
                .collect()
        });

        let files_failed = parsed.iter().filter(|p| p.is_none()).count();
        let parsed_files: Vec<ParsedFile> = parsed.into_iter().flatten().collect();

        let symbols = SymbolTable::new();
        let assembler = Assembler::new(registry, &symbols, self.project_root.clone());

        let mut graph = Graph::new();
        let project_name = self
            .project_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        let indexed_at = Utc::now().with_timezone(&FixedOffset::east_opt(0).expect("UTC offset is always valid"));
        let project_identity = assembler.assemble_project(&mut graph, &project_name, None, indexed_at);

        let mut all_facts = Vec::new();
        let mut all_refs = HashMap::new();
        let mut file_imports = HashMap::new();
        let mut all_imports = Vec::new();
        let mut scopes_assembled = 0;

        for parsed_file in &parsed_files {
            let assembled = assembler.assemble_file(&mut graph, parsed_file, &project_identity);
            scopes_assembled += assembled.scope_uuids.len();
            all_facts.extend(assembled.facts);
            all_refs.extend(assembled.refs_by_uuid);
            let rel_path = parsed_file.path.strip_prefix(&self.project_root).unwrap_or(&parsed_file.path).to_path_buf();
            file_imports.insert(rel_path, assembled.imports.clone());
            all_imports.extend(assembled.imports);
        }

        assemble_libraries(&mut graph, &all_imports);

        let edges = resolver::resolve(&all_facts, &all_refs, &file_imports, &symbols);
        let edges_assembled = edges.len();
        for edge in edges {
            graph.upsert_edge(edge);
        }

        Ok((
            graph,
            IngestionStats { files_parsed: parsed_files.len(), files_failed, scopes_assembled, edges_assembled },
        ))
    }

    /// The set of files this run actually parsed, for scoping C6's orphan
    /// deletion to the project under reindex.
    pub fn parsed_file_set(&self, files: &[PathBuf]) -> HashSet<PathBuf> {
        files.iter().cloned().collect()
    }
}

fn parse_one(path: &Path) -> Result<ParsedFile> {
    let content = std::fs::read(path)?;
    let extractor = get_extractor(path).expect("get_extractor always returns Some");
    extractor.extract(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn full_index_assembles_cross_file_inheritance() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().join("base.ts");
        let derived_path = dir.path().join("derived.ts");

        std::fs::File::create(&base_path).unwrap().write_all(b"export class SourceAdapter {}\n").unwrap();
        std::fs::File::create(&derived_path)
            .unwrap()
            .write_all(b"import { SourceAdapter } from './base';\nclass CodeSourceAdapter extends SourceAdapter {}\n")
            .unwrap();

        let coordinator = Coordinator::new(dir.path());
        let (graph, stats) = coordinator.run_full_index(&[base_path, derived_path]).unwrap();

        assert_eq!(stats.files_parsed, 2);
        assert_eq!(stats.files_failed, 0);
        assert!(graph.all_edges().any(|e| e.kind == scopegraph_core::EdgeKind::InheritsFrom));
    }
}
