//! Core data model, UUID registry, graph, change tracker, config, and
//! error taxonomy shared by the indexer, AI, query, and watcher crates.

pub mod change;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod symbols;
pub mod uuid;
pub mod workspace;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use change::{ChangeKind, ChangeTracker};
pub use config::{EntityConfig, EnvConfig, ProjectConfig, SourceConfig};
pub use error::CoreError;
pub use graph::Graph;
pub use model::{
    ChangeEvent, ChangeType, DirectoryNode, EdgeKind, EdgeLocation, ExternalLibraryNode, FileNode,
    GraphEdge, GraphNode, Language, NodeLabel, Parameter, ProjectNode, ScopeKind, ScopeNode,
};
pub use symbols::SymbolTable;
pub use uuid::{scope_uuid, signature_fallback, IdentityTuple, UuidCandidate, UuidRegistry};
pub use workspace::{detect_workspace, WorkspaceType};
