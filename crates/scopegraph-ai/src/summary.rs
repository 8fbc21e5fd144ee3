//! Summary store (C7): per-`(entityLabel, fieldName, outputField)` summary
//! persistence on top of the graph store itself — summaries live as
//! properties on the entity they describe, not in a side table.
//!
//! Property naming follows §6's persisted-state layout:
//! `<field>_summary_<outputField>`, `<field>_summary_hash`,
//! `<field>_summarized_at`.

use std::time::Duration;

use neo4rs::{query, Graph as Neo4jGraph};
use scopegraph_core::{CoreError, EnvConfig};
use tracing::warn;

const MAX_RETRIES: u32 = 3;
const BACKOFF: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];

/// Below this length, a field's content isn't worth summarizing — there's
/// nothing to avoid truncating (§4.7).
pub const DEFAULT_SUMMARY_THRESHOLD: usize = 500;

/// When summaries get produced relative to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// All summaries are generated ahead of time, during ingestion.
    PreGenerated,
    /// Summaries are generated the first time they're needed and cached.
    OnDemand,
    /// Pre-generate the common fields, fall back to on-demand for the rest.
    Hybrid,
}

pub struct SummaryKey<'a> {
    pub label: &'a str,
    pub unique_field: &'a str,
    pub unique_value: &'a str,
    pub field: &'a str,
    pub output_field: &'a str,
}

impl SummaryKey<'_> {
    fn summary_property(&self) -> String {
        summary_property(self.field, self.output_field)
    }

    fn hash_property(&self) -> String {
        hash_property(self.field)
    }

    fn timestamp_property(&self) -> String {
        timestamp_property(self.field)
    }
}

fn summary_property(field: &str, output_field: &str) -> String {
    format!("{field}_summary_{output_field}")
}

fn hash_property(field: &str) -> String {
    format!("{field}_summary_hash")
}

fn timestamp_property(field: &str) -> String {
    format!("{field}_summarized_at")
}

fn clears_threshold(value_length: usize, threshold: usize) -> bool {
    value_length > threshold
}

pub struct SummaryStore {
    graph: Neo4jGraph,
    mode: SummaryMode,
    threshold: usize,
}

impl SummaryStore {
    pub async fn connect(env: &EnvConfig, mode: SummaryMode) -> Result<Self, CoreError> {
        let mut builder = neo4rs::ConfigBuilder::default()
            .uri(&env.neo4j_uri)
            .user(&env.neo4j_username)
            .password(&env.neo4j_password);
        if let Some(db) = &env.neo4j_database {
            builder = builder.db(db.as_str());
        }
        let config = builder.build().map_err(|e| CoreError::ConfigInvalid(e.to_string()))?;
        let graph = Neo4jGraph::connect(config).await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))?;
        Ok(Self { graph, mode, threshold: DEFAULT_SUMMARY_THRESHOLD })
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn mode(&self) -> SummaryMode {
        self.mode
    }

    /// True when `value_length` clears the configured threshold and either
    /// no summary is stored yet, or the stored content hash no longer
    /// matches `content_hash` (the source field changed).
    pub async fn needs_summary(&self, key: &SummaryKey<'_>, value_length: usize, content_hash: &str) -> Result<bool, CoreError> {
        if !clears_threshold(value_length, self.threshold) {
            return Ok(false);
        }
        match self.load_hash(key).await? {
            None => Ok(true),
            Some(stored) => Ok(stored != content_hash),
        }
    }

    pub async fn load(&self, key: &SummaryKey<'_>) -> Result<Option<String>, CoreError> {
        let cypher = format!(
            "MATCH (e:{label} {{{unique_field}: $value}}) RETURN e.{summary_prop} AS summary",
            label = key.label,
            unique_field = key.unique_field,
            summary_prop = key.summary_property(),
        );
        let q = query(&cypher).param("value", key.unique_value.to_string());
        let mut stream = self.run_read_with_retry(q).await?;
        match stream.next().await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))? {
            Some(row) => Ok(row.get::<String>("summary").ok()),
            None => Ok(None),
        }
    }

    async fn load_hash(&self, key: &SummaryKey<'_>) -> Result<Option<String>, CoreError> {
        let cypher = format!(
            "MATCH (e:{label} {{{unique_field}: $value}}) RETURN e.{hash_prop} AS hash",
            label = key.label,
            unique_field = key.unique_field,
            hash_prop = key.hash_property(),
        );
        let q = query(&cypher).param("value", key.unique_value.to_string());
        let mut stream = self.run_read_with_retry(q).await?;
        match stream.next().await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))? {
            Some(row) => Ok(row.get::<String>("hash").ok()),
            None => Ok(None),
        }
    }

    pub async fn store(&self, key: &SummaryKey<'_>, text: &str, content_hash: &str) -> Result<(), CoreError> {
        let cypher = format!(
            "MATCH (e:{label} {{{unique_field}: $value}}) \
             SET e.{summary_prop} = $text, e.{hash_prop} = $hash, e.{ts_prop} = $now",
            label = key.label,
            unique_field = key.unique_field,
            summary_prop = key.summary_property(),
            hash_prop = key.hash_property(),
            ts_prop = key.timestamp_property(),
        );
        let q = query(&cypher)
            .param("value", key.unique_value.to_string())
            .param("text", text.to_string())
            .param("hash", content_hash.to_string())
            .param("now", chrono::Utc::now().to_rfc3339());
        self.run_write_with_retry(q).await
    }

    /// Entities of `label` whose `field` clears the configured threshold
    /// and whose `<field>_summary_<output_field>` is still missing, up to
    /// `limit` rows.
    pub async fn find_entities_needing_summaries(
        &self,
        label: &str,
        unique_field: &str,
        field: &str,
        output_field: &str,
        limit: usize,
    ) -> Result<Vec<String>, CoreError> {
        let cypher = format!(
            "MATCH (e:{label}) \
             WHERE size(e.{field}) > $threshold AND e.{summary_prop} IS NULL \
             RETURN e.{unique_field} AS id LIMIT $limit",
            summary_prop = summary_property(field, output_field),
        );
        let q = query(&cypher).param("limit", limit as i64).param("threshold", self.threshold as i64);
        let mut stream = self.run_read_with_retry(q).await?;
        let mut ids = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))? {
            if let Ok(id) = row.get::<String>("id") {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn run_write_with_retry(&self, q: neo4rs::Query) -> Result<(), CoreError> {
        let mut attempt = 0;
        loop {
            match self.graph.run(q.clone()).await {
                Ok(()) => return Ok(()),
                Err(error) if attempt < MAX_RETRIES - 1 => {
                    warn!(attempt, %error, "transient summary write error, retrying");
                    tokio::time::sleep(BACKOFF[attempt as usize]).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(CoreError::TransientGraphError { message: error.to_string(), attempt: attempt + 1, max_attempts: MAX_RETRIES });
                }
            }
        }
    }

    async fn run_read_with_retry(&self, q: neo4rs::Query) -> Result<neo4rs::RowStream, CoreError> {
        let mut attempt = 0;
        loop {
            match self.graph.execute(q.clone()).await {
                Ok(stream) => return Ok(stream),
                Err(error) if attempt < MAX_RETRIES - 1 => {
                    warn!(attempt, %error, "transient summary read error, retrying");
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
    fn property_names_follow_the_documented_convention() {
        assert_eq!(summary_property("body", "overview"), "body_summary_overview");
        assert_eq!(hash_property("body"), "body_summary_hash");
        assert_eq!(timestamp_property("body"), "body_summarized_at");
    }

    #[test]
    fn short_fields_never_clear_the_threshold() {
        assert!(!clears_threshold(50, DEFAULT_SUMMARY_THRESHOLD));
        assert!(clears_threshold(DEFAULT_SUMMARY_THRESHOLD + 1, DEFAULT_SUMMARY_THRESHOLD));
    }
}
