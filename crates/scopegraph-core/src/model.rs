//! Core data model: scopes, files, directories, libraries, projects, and the
//! relationships between them (SPEC_FULL.md §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// The kind of syntactic unit a Scope node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Function,
    Method,
    Class,
    Interface,
    Type,
    Variable,
    Constant,
    EnumMember,
}

impl ScopeKind {
    /// `function`, `method`, `class`, `const` carry a value at runtime;
    /// `interface`/`type` exist only at the type level. Used by the
    /// reference resolver to break name ambiguity (§4.3).
    pub fn is_value_kind(self) -> bool {
        matches!(
            self,
            ScopeKind::Function | ScopeKind::Method | ScopeKind::Class | ScopeKind::Constant
        )
    }

    /// Only `variable`/`constant` get a line-number suffix in the UUID rule
    /// (§3), to disambiguate shadowed block-scoped bindings.
    pub fn disambiguates_by_line(self) -> bool {
        matches!(self, ScopeKind::Variable | ScopeKind::Constant)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Function => "function",
            ScopeKind::Method => "method",
            ScopeKind::Class => "class",
            ScopeKind::Interface => "interface",
            ScopeKind::Type => "type",
            ScopeKind::Variable => "variable",
            ScopeKind::Constant => "constant",
            ScopeKind::EnumMember => "enum_member",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    TypeScript,
    JavaScript,
    Python,
    Go,
    Java,
    C,
    Cpp,
    Other,
}

impl Language {
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rs") => Language::Rust,
            Some("ts") | Some("tsx") => Language::TypeScript,
            Some("js") | Some("jsx") | Some("mjs") => Language::JavaScript,
            Some("py") => Language::Python,
            Some("go") => Language::Go,
            Some("java") => Language::Java,
            Some("c") | Some("h") => Language::C,
            Some("cpp") | Some("cc") | Some("cxx") | Some("hpp") => Language::Cpp,
            _ => Language::Other,
        }
    }
}

/// Node labels in the property graph (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeLabel {
    Scope,
    File,
    Directory,
    ExternalLibrary,
    Project,
    Change,
}

/// A structured function parameter, part of `Scope.parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: Option<String>,
    pub default: Option<String>,
}

/// A Scope node: a function, method, class, interface, type, variable,
/// constant, or enum member extracted from a source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeNode {
    pub uuid: String,
    pub name: String,
    pub kind: ScopeKind,
    pub file: PathBuf,
    pub start_line: u32,
    pub end_line: u32,
    pub source: String,
    pub signature: String,
    pub hash: String,
    pub return_type: Option<String>,
    pub parameters: Vec<Parameter>,
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    pub language: Language,
    pub depth: u32,
    pub parent: Option<String>,
    pub parent_uuid: Option<String>,
    pub heritage_clauses: Vec<String>,
    pub generics: Vec<String>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub generic_parameters: Vec<String>,
    /// `<field>_summary_<outputField>` / `<field>_summary_hash` /
    /// `<field>_summarized_at`, flattened; see scopegraph-ai's summary store.
    pub summaries: HashMap<String, serde_json::Value>,
}

impl ScopeNode {
    /// Node identity per §4.4: the Scope's own uuid.
    pub fn node_identity(&self) -> &str {
        &self.uuid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    pub path: PathBuf,
    pub name: String,
    pub directory: PathBuf,
    pub extension: String,
    pub content_hash: String,
}

impl FileNode {
    pub fn node_identity(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub path: PathBuf,
    pub depth: u32,
}

impl DirectoryNode {
    pub fn node_identity(&self) -> String {
        format!("dir:{}", self.path.display())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLibraryNode {
    pub name: String,
}

impl ExternalLibraryNode {
    pub fn node_identity(&self) -> String {
        format!("lib:{}", self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectNode {
    pub name: String,
    pub git_remote: Option<String>,
    pub root_path: PathBuf,
    pub indexed_at: chrono::DateTime<chrono::FixedOffset>,
}

impl ProjectNode {
    pub fn node_identity(&self) -> String {
        format!("project:{}", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity_type: NodeLabel,
    pub change_type: ChangeType,
    pub timestamp: chrono::DateTime<chrono::FixedOffset>,
    pub metadata_json: String,
}

/// Tagged union of every node kind stored in the graph. Kept as a single
/// enum (rather than trait objects) so the graph assembler and ingestion
/// executor can match exhaustively on label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "label")]
pub enum GraphNode {
    Scope(ScopeNode),
    File(FileNode),
    Directory(DirectoryNode),
    ExternalLibrary(ExternalLibraryNode),
    Project(ProjectNode),
}

impl GraphNode {
    pub fn label(&self) -> NodeLabel {
        match self {
            GraphNode::Scope(_) => NodeLabel::Scope,
            GraphNode::File(_) => NodeLabel::File,
            GraphNode::Directory(_) => NodeLabel::Directory,
            GraphNode::ExternalLibrary(_) => NodeLabel::ExternalLibrary,
            GraphNode::Project(_) => NodeLabel::Project,
        }
    }

    /// The deterministic identity key used for MERGE-by-identity upserts
    /// (§4.4, §4.5).
    pub fn identity(&self) -> String {
        match self {
            GraphNode::Scope(s) => s.uuid.clone(),
            GraphNode::File(f) => f.node_identity(),
            GraphNode::Directory(d) => d.node_identity(),
            GraphNode::ExternalLibrary(l) => l.node_identity(),
            GraphNode::Project(p) => p.node_identity(),
        }
    }

    pub fn as_scope(&self) -> Option<&ScopeNode> {
        match self {
            GraphNode::Scope(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scope_mut(&mut self) -> Option<&mut ScopeNode> {
        match self {
            GraphNode::Scope(s) => Some(s),
            _ => None,
        }
    }
}

/// Relationship types (§3). Directed, no inverse edges are materialized
/// (SPEC_FULL.md §9, CONSUMED_BY open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    DefinedIn,
    InDirectory,
    ParentOf,
    Consumes,
    InheritsFrom,
    Implements,
    HasParent,
    UsesLibrary,
    BelongsTo,
}

/// Properties carried on a reference-backed edge. Line/column locations are
/// modelled as edge properties rather than separate event nodes
/// (SPEC_FULL.md §9 decision).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeLocation {
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub source: String,
    pub target: String,
    /// `{symbol: string}` for USES_LIBRARY; unused otherwise.
    pub symbol: Option<String>,
    pub location: EdgeLocation,
}

impl GraphEdge {
    pub fn new(kind: EdgeKind, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            target: target.into(),
            symbol: None,
            location: EdgeLocation::default(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_location(mut self, location: EdgeLocation) -> Self {
        self.location = location;
        self
    }

    /// Deduplication key for `CONSUMES` edges (§3: "may be many;
    /// deduplicated by (from,to)").
    pub fn dedup_key(&self) -> (EdgeKind, String, String) {
        (self.kind, self.source.clone(), self.target.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_kind_preference() {
        assert!(ScopeKind::Function.is_value_kind());
        assert!(ScopeKind::Class.is_value_kind());
        assert!(ScopeKind::Method.is_value_kind());
        assert!(!ScopeKind::Interface.is_value_kind());
        assert!(!ScopeKind::Type.is_value_kind());
    }

    #[test]
    fn line_disambiguation_only_for_bindings() {
        assert!(ScopeKind::Variable.disambiguates_by_line());
        assert!(ScopeKind::Constant.disambiguates_by_line());
        assert!(!ScopeKind::Function.disambiguates_by_line());
    }

    #[test]
    fn language_from_extension() {
        assert_eq!(Language::from_path(std::path::Path::new("a.rs")), Language::Rust);
        assert_eq!(Language::from_path(std::path::Path::new("a.ts")), Language::TypeScript);
        assert_eq!(Language::from_path(std::path::Path::new("a.tsx")), Language::TypeScript);
        assert_eq!(Language::from_path(std::path::Path::new("a.unknown")), Language::Other);
    }

    #[test]
    fn node_identity_keys() {
        let file = GraphNode::File(FileNode {
            path: PathBuf::from("src/lib.rs"),
            name: "lib.rs".into(),
            directory: PathBuf::from("src"),
            extension: "rs".into(),
            content_hash: "abc".into(),
        });
        assert_eq!(file.identity(), "file:src/lib.rs");

        let dir = GraphNode::Directory(DirectoryNode { path: PathBuf::from("src"), depth: 1 });
        assert_eq!(dir.identity(), "dir:src");

        let lib = GraphNode::ExternalLibrary(ExternalLibraryNode { name: "serde".into() });
        assert_eq!(lib.identity(), "lib:serde");
    }

    #[test]
    fn consumes_dedup_key_ignores_location() {
        let a = GraphEdge::new(EdgeKind::Consumes, "uuid1", "uuid2")
            .with_location(EdgeLocation { line: Some(10), column: Some(4), context: None });
        let b = GraphEdge::new(EdgeKind::Consumes, "uuid1", "uuid2")
            .with_location(EdgeLocation { line: Some(99), column: Some(1), context: None });
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
