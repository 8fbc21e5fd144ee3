//! In-memory graph (C4 Graph Assembler's target): a directed multigraph
//! keyed by the deterministic identity strings from `model::GraphNode`.
//!
//! Node/edge upserts are MERGE-by-identity (§4.4, §4.5): re-adding a node
//! with an identity already present replaces its properties in place
//! rather than creating a duplicate, so repeated ingestion runs converge
//! to the same graph (I5 idempotency).

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use sha2::{Digest, Sha256};

use crate::model::{EdgeKind, GraphEdge, GraphNode};

/// The code graph: a directed multigraph with stable node/edge indices,
/// indexed by the entities' own identity keys for upsert lookups.
pub struct Graph {
    inner: StableDiGraph<GraphNode, GraphEdge>,
    by_identity: HashMap<String, NodeIndex>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
            by_identity: HashMap::new(),
        }
    }

    /// Insert or replace a node by its identity key. Returns `true` when an
    /// existing node's properties were replaced (an update), `false` when
    /// the node is new (a create) — the distinction the change tracker
    /// (C6) needs for Created/Updated/Deleted classification.
    pub fn upsert_node(&mut self, node: GraphNode) -> bool {
        let identity = node.identity();
        if let Some(&idx) = self.by_identity.get(&identity) {
            self.inner[idx] = node;
            true
        } else {
            let idx = self.inner.add_node(node);
            self.by_identity.insert(identity, idx);
            false
        }
    }

    pub fn node_by_identity(&self, identity: &str) -> Option<&GraphNode> {
        self.by_identity.get(identity).and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn contains_identity(&self, identity: &str) -> bool {
        self.by_identity.contains_key(identity)
    }

    /// Remove a node (and all incident edges) by identity. Used by the
    /// change tracker when a scope/file disappears from a re-parsed file.
    pub fn remove_by_identity(&mut self, identity: &str) -> Option<GraphNode> {
        let idx = self.by_identity.remove(identity)?;
        self.inner.remove_node(idx)
    }

    /// Insert an edge, deduplicating `CONSUMES` edges by `(kind, source,
    /// target)` regardless of location (§3: "may be many; deduplicated by
    /// (from,to)"). Other edge kinds are inserted unconditionally since the
    /// graph is a multigraph by identity design, not by physical index.
    pub fn upsert_edge(&mut self, edge: GraphEdge) {
        let source = match self.by_identity.get(&edge.source) {
            Some(&idx) => idx,
            None => return,
        };
        let target = match self.by_identity.get(&edge.target) {
            Some(&idx) => idx,
            None => return,
        };

        if edge.kind == EdgeKind::Consumes {
            let key = edge.dedup_key();
            let already = self
                .inner
                .edges_directed(source, Direction::Outgoing)
                .any(|e| e.weight().dedup_key() == key);
            if already {
                return;
            }
        }

        self.inner.add_edge(source, target, edge);
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner.node_weights()
    }

    pub fn all_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.inner.edge_weights()
    }

    pub fn edges_from(&self, identity: &str) -> impl Iterator<Item = &GraphEdge> {
        let idx = self.by_identity.get(identity).copied();
        idx.into_iter().flat_map(move |idx| {
            self.inner
                .edges_directed(idx, Direction::Outgoing)
                .map(|edge_ref| edge_ref.weight())
        })
    }

    pub fn edges_to(&self, identity: &str) -> impl Iterator<Item = &GraphEdge> {
        let idx = self.by_identity.get(identity).copied();
        idx.into_iter().flat_map(move |idx| {
            self.inner
                .edges_directed(idx, Direction::Incoming)
                .map(|edge_ref| edge_ref.weight())
        })
    }

    /// Every node reachable by walking `CONSUMES` edges backward from
    /// `identity` — i.e. every scope that (transitively) consumes it.
    /// Substitutes for a materialized `CONSUMED_BY` inverse edge
    /// (SPEC_FULL.md §9 decision).
    pub fn dependents(&self, identity: &str) -> HashSet<String> {
        self.walk_reverse(identity, EdgeKind::Consumes)
    }

    /// Every node reachable by walking `PARENT_OF` edges backward from
    /// `identity` — its chain of enclosing scopes.
    pub fn ancestors(&self, identity: &str) -> HashSet<String> {
        self.walk_reverse(identity, EdgeKind::ParentOf)
    }

    fn walk_reverse(&self, identity: &str, kind: EdgeKind) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut to_visit = vec![identity.to_string()];

        while let Some(current) = to_visit.pop() {
            let Some(&idx) = self.by_identity.get(&current) else { continue };
            for edge_ref in self.inner.edges_directed(idx, Direction::Incoming) {
                let edge = edge_ref.weight();
                if edge.kind == kind && !seen.contains(&edge.source) {
                    seen.insert(edge.source.clone());
                    to_visit.push(edge.source.clone());
                }
            }
        }

        seen
    }

    /// A stable hash of the whole graph's contents, independent of
    /// insertion order (identities and edges are sorted before hashing).
    /// Backs I5: "re-running ingestion on an unchanged codebase produces
    /// a graph whose serialization hash is unchanged."
    pub fn content_hash(&self) -> String {
        let mut node_json: Vec<String> = self
            .inner
            .node_weights()
            .map(|n| serde_json::to_string(n).unwrap_or_default())
            .collect();
        node_json.sort();

        let mut edge_json: Vec<String> = self
            .inner
            .edge_weights()
            .map(|e| serde_json::to_string(e).unwrap_or_default())
            .collect();
        edge_json.sort();

        let mut hasher = Sha256::new();
        for entry in node_json {
            hasher.update(entry.as_bytes());
            hasher.update(b"\0");
        }
        for entry in edge_json {
            hasher.update(entry.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DirectoryNode, ExternalLibraryNode, FileNode};
    use std::path::PathBuf;

    fn file(path: &str) -> GraphNode {
        GraphNode::File(FileNode {
            path: PathBuf::from(path),
            name: path.to_string(),
            directory: PathBuf::from("."),
            extension: "rs".into(),
            content_hash: "h1".into(),
        })
    }

    #[test]
    fn upsert_node_is_idempotent_by_identity() {
        let mut graph = Graph::new();
        assert!(!graph.upsert_node(file("a.rs")));
        assert!(graph.upsert_node(file("a.rs")));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn content_hash_stable_across_insertion_order() {
        let mut g1 = Graph::new();
        g1.upsert_node(file("a.rs"));
        g1.upsert_node(file("b.rs"));

        let mut g2 = Graph::new();
        g2.upsert_node(file("b.rs"));
        g2.upsert_node(file("a.rs"));

        assert_eq!(g1.content_hash(), g2.content_hash());
    }

    #[test]
    fn content_hash_changes_on_mutation() {
        let mut graph = Graph::new();
        graph.upsert_node(file("a.rs"));
        let before = graph.content_hash();
        graph.upsert_node(GraphNode::ExternalLibrary(ExternalLibraryNode { name: "serde".into() }));
        assert_ne!(before, graph.content_hash());
    }

    #[test]
    fn consumes_edges_dedup_by_source_and_target() {
        let mut graph = Graph::new();
        graph.upsert_node(file("a.rs"));
        graph.upsert_node(file("b.rs"));
        graph.upsert_edge(GraphEdge::new(EdgeKind::Consumes, "file:a.rs", "file:b.rs"));
        graph.upsert_edge(GraphEdge::new(EdgeKind::Consumes, "file:a.rs", "file:b.rs"));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn dependents_walks_consumes_backward() {
        let mut graph = Graph::new();
        graph.upsert_node(file("a.rs"));
        graph.upsert_node(file("b.rs"));
        graph.upsert_node(file("c.rs"));
        graph.upsert_edge(GraphEdge::new(EdgeKind::Consumes, "file:a.rs", "file:b.rs"));
        graph.upsert_edge(GraphEdge::new(EdgeKind::Consumes, "file:b.rs", "file:c.rs"));

        let dependents = graph.dependents("file:c.rs");
        assert!(dependents.contains("file:b.rs"));
        assert!(dependents.contains("file:a.rs"));
    }

    #[test]
    fn remove_by_identity_drops_incident_edges() {
        let mut graph = Graph::new();
        graph.upsert_node(file("a.rs"));
        graph.upsert_node(file("b.rs"));
        graph.upsert_edge(GraphEdge::new(EdgeKind::Consumes, "file:a.rs", "file:b.rs"));
        graph.remove_by_identity("file:b.rs");
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn directory_and_library_identities_round_trip() {
        let mut graph = Graph::new();
        graph.upsert_node(GraphNode::Directory(DirectoryNode { path: PathBuf::from("src"), depth: 1 }));
        assert!(graph.contains_identity("dir:src"));
    }
}
