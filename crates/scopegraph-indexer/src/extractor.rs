//! Parser adapter contract (C1): a language extractor turns one file's
//! bytes into a `ParsedFile` of `ScopeInfo` plus the identifier/import
//! references found inside each scope.
//!
//! This is a boundary contract, not a parsing-fidelity obligation: callers
//! only depend on the shape below and on `extract` failing with an error
//! (never a panic) on syntactically unrecoverable input.

use std::path::{Path, PathBuf};

use scopegraph_core::{Language, ScopeKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    LocalScope,
    Import,
    External,
}

/// A single identifier use inside a scope's body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierReference {
    pub identifier: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub kind: ReferenceKind,
    /// Populated when the extractor itself can already tell which scope
    /// this resolves to (e.g. a same-file call); left `None` otherwise and
    /// filled in later by the reference resolver (C3).
    pub target_scope: Option<String>,
    pub source: Option<String>,
}

/// One `import { imported as alias } from source` binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReference {
    pub source: String,
    pub imported: String,
    pub alias: Option<String>,
    pub is_local: bool,
}

/// One extracted syntactic unit, pre-UUID-assignment: the assembler (C4)
/// mints the uuid from `(parent, signature-or-fallback, type, line)` once
/// all scopes in a file are known.
#[derive(Debug, Clone)]
pub struct ScopeInfo {
    pub name: String,
    pub kind: ScopeKind,
    pub file_path: PathBuf,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub signature: Option<String>,
    pub parent: Option<String>,
    pub return_type: Option<String>,
    pub parameters: Vec<scopegraph_core::Parameter>,
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    pub heritage_clauses: Vec<String>,
    pub generics: Vec<String>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub identifier_references: Vec<IdentifierReference>,
    pub import_references: Vec<ImportReference>,
}

/// A file's full extraction result: its content hash (I8 depends on this
/// being SHA-256 of the concatenated scope sources, computed by the
/// assembler, not here) and every scope found in it.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub language: Language,
    pub scopes: Vec<ScopeInfo>,
}

/// Implemented once per source language. `extract` must never panic on
/// malformed input — syntactically unrecoverable content is a `ParseError`
/// the caller logs and skips (§7), not a crash.
pub trait LanguageExtractor: Send + Sync {
    fn extract(&self, path: &Path, content: &[u8]) -> anyhow::Result<ParsedFile>;
}
