//! HTTP handlers for the four caller-facing operations plus health.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use scopegraph_ai::summary::{SummaryKey, SummaryMode, SummaryStore};
use scopegraph_indexer::ingest::run_incremental;
use scopegraph_indexer::store::{IngestionExecutor, StoreConfig};

use crate::mutations::{MutationBuilder, RelationshipSpec};
use crate::pipeline::{FetchConfig, QueryPipeline};
use crate::ServerState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub root: PathBuf,
}

/// `{created, updated, unchanged, deleted}` per the `parseAndIngest`
/// operation contract (§6).
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub files_parsed: usize,
    pub files_failed: usize,
    pub partial: bool,
}

pub async fn ingest(State(state): State<Arc<ServerState>>, Json(request): Json<IngestRequest>) -> Result<impl IntoResponse, StatusCode> {
    let store_config = StoreConfig::from_env().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let executor = IngestionExecutor::connect(&store_config).await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    executor.bootstrap_schema().await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    let outcome = run_incremental(&request.root, &state.project_config.source.include, &state.project_config.source.exclude, &executor)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(IngestResponse {
        created: outcome.counts.created,
        updated: outcome.counts.updated,
        unchanged: outcome.counts.unchanged,
        deleted: outcome.counts.deleted,
        files_parsed: outcome.stats.files_parsed,
        files_failed: outcome.stats.files_failed,
        partial: outcome.report.partial,
    }))
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub label: String,
    #[serde(default)]
    pub where_eq: Vec<(String, Value)>,
    #[serde(default)]
    pub semantic: Option<SemanticStage>,
}

#[derive(Debug, Deserialize)]
pub struct SemanticStage {
    pub index_name: String,
    pub query_text: String,
    pub top_k: usize,
}

#[derive(Debug, Serialize)]
pub struct QueryResultItem {
    pub entity: Value,
    pub score: f32,
    pub score_breakdown: Option<Value>,
}

pub async fn run_query(State(state): State<Arc<ServerState>>, Json(request): Json<QueryRequest>) -> Result<impl IntoResponse, StatusCode> {
    let graph = state.graph.clone();
    let mut pipeline = QueryPipeline::new(graph).fetch(FetchConfig { label: request.label, where_eq: request.where_eq });

    if let Some(stage) = request.semantic {
        if let Some(vector) = &state.vector {
            pipeline = pipeline.with_vector_adapter(vector.clone()).semantic(stage.index_name, stage.query_text, stage.top_k);
        } else {
            return Err(StatusCode::PRECONDITION_FAILED);
        }
    }

    let results = pipeline.execute().await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let response: Vec<QueryResultItem> = results.into_iter().map(|r| QueryResultItem { entity: r.entity, score: r.score, score_breakdown: r.score_breakdown }).collect();
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum MutationRequest {
    Create { properties: Value },
    CreateBatch { rows: Vec<Value> },
    Update { id: String, patch: Value },
    Delete { id: String },
    AddRelationship { source_id: String, spec: RelationshipSpecRequest },
    RemoveRelationship { source_id: String, relationship_type: String, target_unique_value: String },
}

#[derive(Debug, Deserialize)]
pub struct RelationshipSpecRequest {
    pub relationship_type: String,
    pub target_label: String,
    pub target_unique_value: String,
    pub properties: Option<Value>,
}

pub async fn mutate(
    State(state): State<Arc<ServerState>>,
    Path(label): Path<String>,
    Json(request): Json<MutationRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let builder = MutationBuilder::new(state.graph.clone(), label, "uuid");

    let outcome = match request {
        MutationRequest::Create { properties } => builder.create(properties).await,
        MutationRequest::CreateBatch { rows } => builder.create_batch(rows).await,
        MutationRequest::Update { id, patch } => builder.update(&id, patch).await,
        MutationRequest::Delete { id } => builder.delete(&id).await,
        MutationRequest::AddRelationship { source_id, spec } => {
            builder
                .add_relationship(
                    &source_id,
                    &RelationshipSpec {
                        relationship_type: spec.relationship_type,
                        target_label: spec.target_label,
                        target_unique_value: spec.target_unique_value,
                        properties: spec.properties,
                    },
                )
                .await
        }
        MutationRequest::RemoveRelationship { source_id, relationship_type, target_unique_value } => {
            builder.remove_relationship(&source_id, &relationship_type, &target_unique_value).await
        }
    };

    match outcome {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(scopegraph_core::CoreError::NotFound { .. }) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub label: String,
    pub unique_field: String,
    pub unique_value: String,
    pub field: String,
    pub output_field: String,
    pub content_hash: String,
    /// Length of the live field value, so the store can apply the
    /// "don't summarize short content" threshold (§4.7) without needing
    /// the raw field text over the wire.
    pub value_length: usize,
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub needs_summary: bool,
    pub summary: Option<String>,
}

pub async fn generate_summaries(State(state): State<Arc<ServerState>>, Json(request): Json<SummaryRequest>) -> Result<impl IntoResponse, StatusCode> {
    let env = state.env().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let store = SummaryStore::connect(&env, SummaryMode::OnDemand).await.map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    let key = SummaryKey { label: &request.label, unique_field: &request.unique_field, unique_value: &request.unique_value, field: &request.field, output_field: &request.output_field };

    if let Some(text) = &request.text {
        store.store(&key, text, &request.content_hash).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        return Ok(Json(SummaryResponse { needs_summary: false, summary: Some(text.clone()) }));
    }

    let needs = store.needs_summary(&key, request.value_length, &request.content_hash).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let summary = store.load(&key).await.map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(SummaryResponse { needs_summary: needs, summary }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "ok".to_string(), version: env!("CARGO_PKG_VERSION").to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_check_reports_ok() {
        let response = health_check().await;
        let _ = response;
    }
}
