//! Query pipeline (C11): an ordered, composable list of operations over a
//! working set of scored entities, backed directly by Cypher against the
//! graph store.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use neo4rs::{query, Graph as Neo4jGraph};
use scopegraph_ai::rerank::{LlmReranker, WorkingEntry};
use scopegraph_ai::vector::{VectorQuery, VectorSearchAdapter};
use scopegraph_core::CoreError;
use serde_json::Value;

/// One scored row in a working set, with optional enrichment data and a
/// score breakdown once a scoring stage has run.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub entity: Value,
    pub score: f32,
    pub score_breakdown: Option<Value>,
    pub context: Option<Value>,
}

impl SearchResult {
    fn uuid(&self) -> Option<&str> {
        self.entity.get("uuid").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    fn arrows(self) -> (&'static str, &'static str) {
        match self {
            Direction::Outgoing => ("-", "->"),
            Direction::Incoming => ("<-", "-"),
            Direction::Both => ("-", "-"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpandConfig {
    pub relationship_type: String,
    pub direction: Direction,
    pub depth: u32,
    pub target_label: Option<String>,
    pub enrich_field: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub label: String,
    pub where_eq: Vec<(String, Value)>,
}

type ChainFn = Arc<dyn Fn(Vec<SearchResult>) -> Vec<SearchResult> + Send + Sync>;
type TraverseFn = Arc<dyn Fn(SearchResult) -> Pin<Box<dyn Future<Output = SearchResult> + Send>> + Send + Sync>;

pub enum Operation {
    Fetch(FetchConfig),
    Filter(Arc<dyn Fn(&SearchResult) -> bool + Send + Sync>),
    Expand(ExpandConfig),
    Semantic { index_name: String, query_text: String, top_k: usize },
    LlmRerank { question: String },
    Chain(ChainFn),
    Traverse(TraverseFn),
}

/// Builds and runs a `QueryPipeline` against a live graph connection.
pub struct QueryPipeline {
    graph: Neo4jGraph,
    vector: Option<Arc<VectorSearchAdapter>>,
    reranker: Option<Arc<LlmReranker>>,
    ops: Vec<Operation>,
}

impl QueryPipeline {
    pub fn new(graph: Neo4jGraph) -> Self {
        Self { graph, vector: None, reranker: None, ops: Vec::new() }
    }

    pub fn with_vector_adapter(mut self, adapter: Arc<VectorSearchAdapter>) -> Self {
        self.vector = Some(adapter);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<LlmReranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn fetch(mut self, config: FetchConfig) -> Self {
        self.ops.push(Operation::Fetch(config));
        self
    }

    pub fn filter(mut self, predicate: impl Fn(&SearchResult) -> bool + Send + Sync + 'static) -> Self {
        self.ops.push(Operation::Filter(Arc::new(predicate)));
        self
    }

    pub fn expand(mut self, config: ExpandConfig) -> Self {
        self.ops.push(Operation::Expand(config));
        self
    }

    pub fn semantic(mut self, index_name: impl Into<String>, query_text: impl Into<String>, top_k: usize) -> Self {
        self.ops.push(Operation::Semantic { index_name: index_name.into(), query_text: query_text.into(), top_k });
        self
    }

    pub fn llm_rerank(mut self, question: impl Into<String>) -> Self {
        self.ops.push(Operation::LlmRerank { question: question.into() });
        self
    }

    pub fn chain(mut self, f: impl Fn(Vec<SearchResult>) -> Vec<SearchResult> + Send + Sync + 'static) -> Self {
        self.ops.push(Operation::Chain(Arc::new(f)));
        self
    }

    pub fn traverse<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SearchResult) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SearchResult> + Send + 'static,
    {
        self.ops.push(Operation::Traverse(Arc::new(move |entry| Box::pin(f(entry)))));
        self
    }

    pub async fn execute(self) -> Result<Vec<SearchResult>, CoreError> {
        let Self { graph, vector, reranker, ops } = self;
        let mut working: Vec<SearchResult> = Vec::new();

        for op in ops {
            working = match op {
                Operation::Fetch(config) => run_fetch(&graph, &config).await?,
                Operation::Filter(predicate) => working.into_iter().filter(|r| predicate(r)).collect(),
                Operation::Expand(config) => run_expand(&graph, &working, &config).await?,
                Operation::Semantic { index_name, query_text, top_k } => {
                    let Some(adapter) = &vector else {
                        return Err(CoreError::ConfigInvalid("no vector adapter configured for this pipeline".to_string()));
                    };
                    run_semantic(adapter, &working, &index_name, &query_text, top_k).await?
                }
                Operation::LlmRerank { question } => {
                    let Some(reranker) = &reranker else {
                        return Err(CoreError::ConfigInvalid("no reranker configured for this pipeline".to_string()));
                    };
                    run_rerank(reranker, &working, &question).await
                }
                Operation::Chain(f) => f(working),
                Operation::Traverse(f) => {
                    let mut out = Vec::with_capacity(working.len());
                    for entry in working {
                        out.push(f(entry).await);
                    }
                    out
                }
            };
        }

        working.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.uuid().cmp(&b.uuid())));
        Ok(working)
    }

    pub async fn execute_flat(self) -> Result<Vec<Value>, CoreError> {
        Ok(self.execute().await?.into_iter().map(|r| r.entity).collect())
    }
}

async fn run_fetch(graph: &Neo4jGraph, config: &FetchConfig) -> Result<Vec<SearchResult>, CoreError> {
    let mut where_clauses = Vec::new();
    let mut params: HashMap<String, Value> = HashMap::new();
    for (i, (field, value)) in config.where_eq.iter().enumerate() {
        let param_name = format!("p{i}");
        where_clauses.push(format!("n.{field} = ${param_name}"));
        params.insert(param_name, value.clone());
    }
    let where_clause = if where_clauses.is_empty() { String::new() } else { format!("WHERE {}", where_clauses.join(" AND ")) };
    let cypher = format!("MATCH (n:{label}) {where_clause} RETURN n", label = config.label);

    let mut q = query(&cypher);
    for (key, value) in params {
        q = q.param(&key, value);
    }

    let mut stream = graph.execute(q).await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))?;
    let mut out = Vec::new();
    while let Some(row) = stream.next().await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))? {
        if let Ok(node) = row.get::<neo4rs::Node>("n") {
            out.push(SearchResult { entity: node_to_value(&node), score: 1.0, score_breakdown: None, context: None });
        }
    }
    Ok(out)
}

/// Relationship-pattern Cypher per §4.11: direction arrows are derived from
/// the config, never bare juxtaposition.
fn expand_pattern(config: &ExpandConfig) -> String {
    let (left, right) = config.direction.arrows();
    let target = match &config.target_label {
        Some(label) => format!("related:{label}"),
        None => "related".to_string(),
    };
    format!("(n){left}[:{rel}*1..{depth}]{right}({target})", rel = config.relationship_type, depth = config.depth.max(1))
}

async fn run_expand(graph: &Neo4jGraph, working: &[SearchResult], config: &ExpandConfig) -> Result<Vec<SearchResult>, CoreError> {
    let pattern = expand_pattern(config);
    let uuids: Vec<Value> = working.iter().filter_map(|r| r.uuid().map(|u| Value::String(u.to_string()))).collect();

    let (match_prefix, param) = if uuids.is_empty() {
        ("MATCH (n)".to_string(), None)
    } else {
        ("MATCH (n) WHERE n.uuid IN $uuids".to_string(), Some(uuids))
    };

    let enrich_clause = match &config.enrich_field {
        Some(field) => format!(", collect(DISTINCT related.{field}) AS enrich"),
        None => String::new(),
    };

    let cypher = format!("{match_prefix} MATCH {pattern} RETURN DISTINCT related{enrich_clause}");
    let mut q = query(&cypher);
    if let Some(uuids) = param {
        q = q.param("uuids", uuids);
    }

    let mut stream = graph.execute(q).await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))?;
    let mut out = Vec::new();
    while let Some(row) = stream.next().await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))? {
        if let Ok(node) = row.get::<neo4rs::Node>("related") {
            let context = if config.enrich_field.is_some() {
                row.get::<Value>("enrich").ok()
            } else {
                None
            };
            out.push(SearchResult { entity: node_to_value(&node), score: 1.0, score_breakdown: None, context });
        }
    }
    Ok(out)
}

async fn run_semantic(
    adapter: &VectorSearchAdapter,
    working: &[SearchResult],
    index_name: &str,
    query_text: &str,
    top_k: usize,
) -> Result<Vec<SearchResult>, CoreError> {
    let filter_uuids = if working.is_empty() {
        None
    } else {
        Some(working.iter().filter_map(|r| r.uuid().map(str::to_string)).collect())
    };
    let hits = adapter.search(&VectorQuery { index_name: index_name.to_string(), query_text: query_text.to_string(), top_k, min_score: None, filter_uuids }).await?;

    let prior_by_uuid: HashMap<&str, &SearchResult> = working.iter().filter_map(|r| r.uuid().map(|u| (u, r))).collect();

    Ok(hits
        .into_iter()
        .map(|hit| match prior_by_uuid.get(hit.uuid.as_str()) {
            Some(prior) => SearchResult {
                entity: prior.entity.clone(),
                score: 0.3 * prior.score + 0.7 * hit.score,
                score_breakdown: Some(serde_json::json!({"prior": prior.score, "semantic": hit.score})),
                context: prior.context.clone(),
            },
            None => SearchResult { entity: serde_json::json!({"uuid": hit.uuid}), score: hit.score, score_breakdown: None, context: None },
        })
        .collect())
}

async fn run_rerank(reranker: &LlmReranker, working: &[SearchResult], question: &str) -> Vec<SearchResult> {
    let entries: Vec<WorkingEntry> = working
        .iter()
        .filter_map(|r| {
            r.uuid().map(|uuid| WorkingEntry {
                uuid: uuid.to_string(),
                vector_score: r.score,
                context: scopegraph_ai::rerank::EntityContext {
                    entity_type: "Scope".to_string(),
                    display_name: uuid.to_string(),
                    fields: vec![],
                    enrichments: vec![],
                },
            })
        })
        .collect();

    let entity_by_uuid: HashMap<&str, &SearchResult> = working.iter().filter_map(|r| r.uuid().map(|u| (u, r))).collect();
    let reranked = reranker.rerank(question, entries).await;

    reranked
        .into_iter()
        .filter_map(|r| {
            entity_by_uuid.get(r.uuid.as_str()).map(|prior| SearchResult {
                entity: prior.entity.clone(),
                score: r.final_score,
                score_breakdown: Some(serde_json::json!({
                    "vector": r.breakdown.vector_score,
                    "llm": r.breakdown.llm_score,
                    "reasoning": r.breakdown.reasoning,
                    "degraded": r.breakdown.degraded,
                })),
                context: prior.context.clone(),
            })
        })
        .collect()
}

fn node_to_value(node: &neo4rs::Node) -> Value {
    node.to::<Value>().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_pattern_uses_proper_relationship_syntax_for_each_direction() {
        let outgoing = ExpandConfig { relationship_type: "CONSUMES".to_string(), direction: Direction::Outgoing, depth: 1, target_label: Some("Scope".to_string()), enrich_field: None };
        assert_eq!(expand_pattern(&outgoing), "(n)-[:CONSUMES*1..1]->(related:Scope)");

        let incoming = ExpandConfig { relationship_type: "DEFINED_IN".to_string(), direction: Direction::Incoming, depth: 2, target_label: None, enrich_field: None };
        assert_eq!(expand_pattern(&incoming), "(n)<-[:DEFINED_IN*1..2]-(related)");

        let both = ExpandConfig { relationship_type: "USES_LIBRARY".to_string(), direction: Direction::Both, depth: 1, target_label: None, enrich_field: None };
        assert_eq!(expand_pattern(&both), "(n)-[:USES_LIBRARY*1..1]-(related)");
    }

    #[test]
    fn semantic_merge_uses_documented_weights() {
        let prior = SearchResult { entity: serde_json::json!({"uuid": "a"}), score: 1.0, score_breakdown: None, context: None };
        let merged = 0.3 * prior.score + 0.7 * 0.5;
        assert!((merged - 0.65).abs() < 1e-6);
    }
}
