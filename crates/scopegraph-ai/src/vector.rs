//! Vector search adapter (C9): `{indexName, queryText, topK, minScore?,
//! filterUuids?} -> [{uuid, score}]` on top of a Neo4j vector index.
//!
//! Embedding *generation* is out of scope here (it's a non-goal of the
//! broader pipeline) — the adapter only knows how to turn an already-embedded
//! query vector into a scored UUID list. Callers provide an `Embedder`.

use std::time::Duration;

use async_trait::async_trait;
use neo4rs::{query, Graph as Neo4jGraph};
use scopegraph_core::{CoreError, EnvConfig};
use tracing::warn;

const MAX_RETRIES: u32 = 3;
const BACKOFF: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];

/// Turns query text into the embedding vector a vector index was built
/// over. Kept minimal and pluggable: the embedding model itself is not
/// this crate's concern.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CoreError>;
}

#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub index_name: String,
    pub query_text: String,
    pub top_k: usize,
    pub min_score: Option<f32>,
    pub filter_uuids: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub uuid: String,
    pub score: f32,
}

pub struct VectorSearchAdapter {
    graph: Neo4jGraph,
    embedder: Box<dyn Embedder>,
}

impl VectorSearchAdapter {
    pub async fn connect(env: &EnvConfig, embedder: Box<dyn Embedder>) -> Result<Self, CoreError> {
        let mut builder = neo4rs::ConfigBuilder::default()
            .uri(&env.neo4j_uri)
            .user(&env.neo4j_username)
            .password(&env.neo4j_password);
        if let Some(db) = &env.neo4j_database {
            builder = builder.db(db.as_str());
        }
        let config = builder.build().map_err(|e| CoreError::ConfigInvalid(e.to_string()))?;
        let graph = Neo4jGraph::connect(config).await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))?;
        Ok(Self { graph, embedder })
    }

    pub async fn search(&self, request: &VectorQuery) -> Result<Vec<VectorHit>, CoreError> {
        let vector = self.embedder.embed(&request.query_text).await?;

        // filterUuids restricts the candidate set; when the store has no
        // native pre-filter support we inflate topK and post-filter instead,
        // which is what this single code path always does.
        let effective_top_k = match &request.filter_uuids {
            Some(uuids) if !uuids.is_empty() => request.top_k.saturating_mul(4).max(uuids.len()),
            _ => request.top_k,
        };

        let cypher = "CALL db.index.vector.queryNodes($index, $k, $vector) YIELD node, score \
                      RETURN node.uuid AS uuid, score AS score";
        let q = query(cypher)
            .param("index", request.index_name.clone())
            .param("k", effective_top_k as i64)
            .param("vector", vector);

        let mut stream = self.run_with_retry(q).await?;
        let mut hits = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))? {
            let Ok(uuid) = row.get::<String>("uuid") else { continue };
            let Ok(score) = row.get::<f64>("score") else { continue };
            hits.push(VectorHit { uuid, score: score as f32 });
        }

        if let Some(uuids) = &request.filter_uuids {
            hits.retain(|hit| uuids.contains(&hit.uuid));
        }
        if let Some(min_score) = request.min_score {
            hits.retain(|hit| hit.score >= min_score);
        }
        hits.truncate(request.top_k);
        Ok(hits)
    }

    async fn run_with_retry(&self, q: neo4rs::Query) -> Result<neo4rs::RowStream, CoreError> {
        let mut attempt = 0;
        loop {
            match self.graph.execute(q.clone()).await {
                Ok(stream) => return Ok(stream),
                Err(error) if attempt < MAX_RETRIES - 1 => {
                    warn!(attempt, %error, "transient vector query error, retrying");
                    tokio::time::sleep(BACKOFF[attempt as usize]).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(CoreError::TransientGraphError { message: error.to_string(), attempt: attempt + 1, max_attempts: MAX_RETRIES });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filtering_and_truncation_applies_in_order() {
        let mut hits = vec![
            VectorHit { uuid: "a".into(), score: 0.9 },
            VectorHit { uuid: "b".into(), score: 0.2 },
            VectorHit { uuid: "c".into(), score: 0.8 },
        ];
        let allowed = vec!["a".to_string(), "c".to_string()];
        hits.retain(|hit| allowed.contains(&hit.uuid));
        hits.retain(|hit| hit.score >= 0.5);
        assert_eq!(hits.len(), 2);
    }
}
