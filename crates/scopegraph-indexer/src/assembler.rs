//! Graph assembler (C4): turns parsed files into the node/relationship set
//! for a run (§4.4). Scope UUID minting goes through the shared
//! `UuidRegistry` (C2); name -> uuid lookups needed by the reference
//! resolver (C3) are registered in the shared `SymbolTable` as each file is
//! assembled.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use scopegraph_core::{
    DirectoryNode, EdgeKind, ExternalLibraryNode, FileNode, Graph, GraphEdge, GraphNode, ProjectNode, ScopeKind,
    ScopeNode, SymbolTable, UuidRegistry,
};
use sha2::{Digest, Sha256};

use crate::extractor::{IdentifierReference, ImportReference, ParsedFile};
use crate::resolver::ScopeFacts;

/// What one assembled file contributes to the run: its own node identity,
/// every scope uuid defined in it (for C6's file-scoped deletion), and the
/// raw reference data the resolver needs once every file is in.
pub struct AssembledFile {
    pub file_identity: String,
    pub scope_uuids: Vec<String>,
    pub facts: Vec<ScopeFacts>,
    pub refs_by_uuid: HashMap<String, (Vec<IdentifierReference>, Vec<ImportReference>)>,
    pub imports: Vec<ImportReference>,
}

pub struct Assembler<'a> {
    registry: &'a UuidRegistry,
    symbols: &'a SymbolTable,
    project_root: PathBuf,
}

impl<'a> Assembler<'a> {
    pub fn new(registry: &'a UuidRegistry, symbols: &'a SymbolTable, project_root: impl Into<PathBuf>) -> Self {
        Self { registry, symbols, project_root: project_root.into() }
    }

    pub fn assemble_project(
        &self,
        graph: &mut Graph,
        name: &str,
        git_remote: Option<String>,
        indexed_at: DateTime<FixedOffset>,
    ) -> String {
        let node = ProjectNode {
            name: name.to_string(),
            git_remote,
            root_path: self.project_root.clone(),
            indexed_at,
        };
        let identity = node.node_identity();
        graph.upsert_node(GraphNode::Project(node));
        identity
    }

    /// Assembles one file's Scope/File/Directory nodes and their containment
    /// edges (`DEFINED_IN`, `IN_DIRECTORY`, `PARENT_OF`, `HAS_PARENT`,
    /// `BELONGS_TO`). Reference edges are resolved separately once every
    /// file in the run has gone through this step (§4.3 needs the whole
    /// run's symbol table populated first).
    pub fn assemble_file(&self, graph: &mut Graph, parsed: &ParsedFile, project_identity: &str) -> AssembledFile {
        let rel_path = parsed.path.strip_prefix(&self.project_root).unwrap_or(&parsed.path).to_path_buf();
        let dir = rel_path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();

        let dir_identity = self.assemble_directories(graph, &dir);

        let content_hash = file_content_hash(&parsed.scopes);
        let file_node = FileNode {
            path: rel_path.clone(),
            name: rel_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            directory: dir.clone(),
            extension: rel_path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default(),
            content_hash,
        };
        let file_identity = file_node.node_identity();
        graph.upsert_node(GraphNode::File(file_node));
        if let Some(dir_identity) = &dir_identity {
            graph.upsert_edge(GraphEdge::new(EdgeKind::InDirectory, file_identity.clone(), dir_identity.clone()));
        }
        graph.upsert_edge(GraphEdge::new(EdgeKind::BelongsTo, file_identity.clone(), project_identity.to_string()));

        let mut scope_uuids = Vec::new();
        let mut facts = Vec::new();
        let mut refs_by_uuid = HashMap::new();
        let mut parent_uuid_by_name: HashMap<String, String> = HashMap::new();
        let mut file_imports = Vec::new();

        for scope in &parsed.scopes {
            let parent_name = scope.parent.clone().unwrap_or_default();
            let signature_or_fallback = scope
                .signature
                .clone()
                .unwrap_or_else(|| scopegraph_core::signature_fallback(&scope.name, scope.kind, &scope.content));
            let line = Some(scope.start_line).filter(|_| scope.kind.disambiguates_by_line());
            let uuid = self.registry.assign(&scope.name, &parent_name, &signature_or_fallback, scope.kind, line, &rel_path);
            self.symbols.insert(scope.name.clone(), uuid.clone(), rel_path.display().to_string());

            let parent_uuid = scope.parent.as_ref().and_then(|p| parent_uuid_by_name.get(p).cloned());
            let depth = if scope.parent.is_some() { 1 } else { 0 };

            let node = ScopeNode {
                uuid: uuid.clone(),
                name: scope.name.clone(),
                kind: scope.kind,
                file: rel_path.clone(),
                start_line: scope.start_line,
                end_line: scope.end_line,
                source: scope.content.clone(),
                signature: signature_or_fallback.clone(),
                hash: scope_hash(&scope.content),
                return_type: scope.return_type.clone(),
                parameters: scope.parameters.clone(),
                decorators: scope.decorators.clone(),
                docstring: scope.docstring.clone(),
                language: parsed.language,
                depth,
                parent: scope.parent.clone(),
                parent_uuid: parent_uuid.clone(),
                heritage_clauses: scope.heritage_clauses.clone(),
                generics: scope.generics.clone(),
                extends: scope.extends.clone(),
                implements: scope.implements.clone(),
                generic_parameters: vec![],
                summaries: HashMap::new(),
            };
            graph.upsert_node(GraphNode::Scope(node));
            graph.upsert_edge(GraphEdge::new(EdgeKind::DefinedIn, uuid.clone(), file_identity.clone()));
            graph.upsert_edge(GraphEdge::new(EdgeKind::BelongsTo, uuid.clone(), project_identity.to_string()));
            if let Some(parent_uuid) = parent_uuid {
                graph.upsert_edge(GraphEdge::new(EdgeKind::HasParent, uuid.clone(), parent_uuid));
            }

            parent_uuid_by_name.insert(scope.name.clone(), uuid.clone());
            facts.push(ScopeFacts { uuid: uuid.clone(), name: scope.name.clone(), kind: scope.kind, file: rel_path.clone(), signature: signature_or_fallback });
            refs_by_uuid.insert(uuid.clone(), (scope.identifier_references.clone(), scope.import_references.clone()));
            scope_uuids.push(uuid);
            if file_imports.is_empty() {
                file_imports = scope.import_references.clone();
            }
        }

        AssembledFile { file_identity, scope_uuids, facts, refs_by_uuid, imports: file_imports }
    }

    fn assemble_directories(&self, graph: &mut Graph, dir: &Path) -> Option<String> {
        if dir.as_os_str().is_empty() {
            return None;
        }
        let mut acc = PathBuf::new();
        let mut parent_identity: Option<String> = None;
        let mut depth = 0u32;
        for component in dir.components() {
            acc.push(component);
            depth += 1;
            let node = DirectoryNode { path: acc.clone(), depth };
            let identity = node.node_identity();
            graph.upsert_node(GraphNode::Directory(node));
            if let Some(parent) = &parent_identity {
                graph.upsert_edge(GraphEdge::new(EdgeKind::ParentOf, parent.clone(), identity.clone()));
            }
            parent_identity = Some(identity);
        }
        parent_identity
    }
}

/// Registers external library nodes found among a run's import references
/// and returns their identities, keyed by library name.
pub fn assemble_libraries(graph: &mut Graph, imports: &[ImportReference]) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for import in imports.iter().filter(|i| !i.is_local) {
        let node = ExternalLibraryNode { name: import.source.clone() };
        let identity = node.node_identity();
        if !out.contains_key(&import.source) {
            graph.upsert_node(GraphNode::ExternalLibrary(node));
            out.insert(import.source.clone(), identity);
        }
    }
    out
}

fn scope_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// I8: `File.contentHash` is the SHA-256 over the concatenation of scope
/// sources, in parse order.
fn file_content_hash(scopes: &[crate::extractor::ScopeInfo]) -> String {
    let mut hasher = Sha256::new();
    for scope in scopes {
        hasher.update(scope.content.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopegraph_core::Language;

    fn scope(name: &str, kind: ScopeKind, parent: Option<&str>) -> crate::extractor::ScopeInfo {
        crate::extractor::ScopeInfo {
            name: name.to_string(),
            kind,
            file_path: PathBuf::from("src/widget.ts"),
            start_line: 1,
            end_line: 3,
            content: format!("body of {}", name),
            signature: Some(format!("{} {}", kind.as_str(), name)),
            parent: parent.map(str::to_string),
            return_type: None,
            parameters: vec![],
            decorators: vec![],
            docstring: None,
            heritage_clauses: vec![],
            generics: vec![],
            extends: None,
            implements: vec![],
            identifier_references: vec![],
            import_references: vec![],
        }
    }

    #[test]
    fn file_and_directory_nodes_and_edges_are_created() {
        let registry = UuidRegistry::new();
        let symbols = SymbolTable::new();
        let assembler = Assembler::new(&registry, &symbols, "/repo");
        let mut graph = Graph::new();

        let parsed = ParsedFile {
            path: PathBuf::from("/repo/src/widget.ts"),
            language: Language::TypeScript,
            scopes: vec![scope("Widget", ScopeKind::Class, None), scope("render", ScopeKind::Method, Some("Widget"))],
        };

        let project_identity = assembler.assemble_project(&mut graph, "demo", None, "2026-01-01T00:00:00+00:00".parse().unwrap());
        let assembled = assembler.assemble_file(&mut graph, &parsed, &project_identity);

        assert!(graph.contains_identity("file:src/widget.ts"));
        assert!(graph.contains_identity("dir:src"));
        assert_eq!(assembled.scope_uuids.len(), 2);
        assert!(graph.edges_to("dir:src").any(|e| e.kind == EdgeKind::InDirectory));
    }

    #[test]
    fn method_scope_gets_has_parent_edge_to_its_class() {
        let registry = UuidRegistry::new();
        let symbols = SymbolTable::new();
        let assembler = Assembler::new(&registry, &symbols, "/repo");
        let mut graph = Graph::new();

        let parsed = ParsedFile {
            path: PathBuf::from("/repo/src/widget.ts"),
            language: Language::TypeScript,
            scopes: vec![scope("Widget", ScopeKind::Class, None), scope("render", ScopeKind::Method, Some("Widget"))],
        };
        let project_identity = assembler.assemble_project(&mut graph, "demo", None, "2026-01-01T00:00:00+00:00".parse().unwrap());
        let assembled = assembler.assemble_file(&mut graph, &parsed, &project_identity);

        let method_uuid = &assembled.scope_uuids[1];
        assert!(graph.edges_from(method_uuid).any(|e| e.kind == EdgeKind::HasParent));
    }
}
