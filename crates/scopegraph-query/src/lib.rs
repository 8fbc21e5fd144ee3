//! Thin HTTP operations surface: the four caller-facing operations
//! (`parseAndIngest`, `query`, `mutations`, `generateSummaries`) exposed as
//! JSON endpoints over the library crates, plus a health check. No UI, no
//! live-diff broadcast — those are non-goals here.

pub mod handlers;
pub mod mutations;
pub mod pipeline;
pub mod router;

use std::sync::Arc;

use neo4rs::Graph as Neo4jGraph;
use scopegraph_ai::rerank::LlmReranker;
use scopegraph_ai::vector::VectorSearchAdapter;
use scopegraph_core::EnvConfig;
use scopegraph_core::ProjectConfig;

/// Shared state every handler reads from: the live graph connection plus
/// the optional AI components a given project config wires up.
pub struct ServerState {
    pub graph: Neo4jGraph,
    pub project_config: ProjectConfig,
    pub vector: Option<Arc<VectorSearchAdapter>>,
    pub reranker: Option<Arc<LlmReranker>>,
}

impl ServerState {
    pub fn new(
        graph: Neo4jGraph,
        project_config: ProjectConfig,
        vector: Option<Arc<VectorSearchAdapter>>,
        reranker: Option<Arc<LlmReranker>>,
    ) -> Self {
        Self { graph, project_config, vector, reranker }
    }

    pub fn env(&self) -> Result<EnvConfig, scopegraph_core::CoreError> {
        EnvConfig::load()
    }
}
