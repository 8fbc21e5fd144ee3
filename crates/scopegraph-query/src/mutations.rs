//! Mutation builder (C12): per-entity-label create/update/delete and
//! relationship mutations, all `MERGE`/`MATCH`-by-unique-field like the
//! ingestion executor, but driven by a caller rather than a parsed graph.

use neo4rs::{query, Graph as Neo4jGraph};
use scopegraph_core::CoreError;
use serde_json::Value;

pub struct MutationBuilder {
    graph: Neo4jGraph,
    label: String,
    unique_field: String,
}

#[derive(Debug, Clone)]
pub struct RelationshipSpec {
    pub relationship_type: String,
    pub target_label: String,
    pub target_unique_value: String,
    pub properties: Option<Value>,
}

impl MutationBuilder {
    pub fn new(graph: Neo4jGraph, label: impl Into<String>, unique_field: impl Into<String>) -> Self {
        Self { graph, label: label.into(), unique_field: unique_field.into() }
    }

    pub async fn create(&self, properties: Value) -> Result<(), CoreError> {
        let unique_value = require_unique_value(&properties, &self.unique_field)?;
        let cypher = format!(
            "MERGE (n:{label} {{{field}: $unique}}) SET n += $props",
            label = self.label,
            field = self.unique_field,
        );
        let q = query(&cypher).param("unique", unique_value).param("props", serialize_dates(properties));
        self.run(q).await
    }

    pub async fn create_batch(&self, rows: Vec<Value>) -> Result<(), CoreError> {
        let cypher = format!(
            "UNWIND $rows AS row MERGE (n:{label} {{{field}: row.{field}}}) SET n += row",
            label = self.label,
            field = self.unique_field,
        );
        let rows: Vec<Value> = rows.into_iter().map(serialize_dates).collect();
        let q = query(&cypher).param("rows", Value::Array(rows));
        self.run(q).await
    }

    pub async fn update(&self, id: &str, patch: Value) -> Result<(), CoreError> {
        let cypher = format!(
            "MATCH (n:{label} {{{field}: $id}}) SET n += $patch RETURN n",
            label = self.label,
            field = self.unique_field,
        );
        let q = query(&cypher).param("id", id.to_string()).param("patch", serialize_dates(patch));
        let mut stream = self.graph.execute(q).await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))?;
        match stream.next().await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))? {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound { entity: format!("{}:{}", self.label, id) }),
        }
    }

    /// `DETACH DELETE` clears incident edges but does not cascade further —
    /// no traversal beyond the node's own relationships.
    pub async fn delete(&self, id: &str) -> Result<(), CoreError> {
        let cypher = format!("MATCH (n:{label} {{{field}: $id}}) DETACH DELETE n", label = self.label, field = self.unique_field);
        let q = query(&cypher).param("id", id.to_string());
        self.run(q).await
    }

    pub async fn add_relationship(&self, source_id: &str, spec: &RelationshipSpec) -> Result<(), CoreError> {
        let cypher = format!(
            "MATCH (a:{label} {{{field}: $source}}) \
             MATCH (b:{target_label} {{uuid: $target}}) \
             MERGE (a)-[r:{rel}]->(b) SET r += $props",
            label = self.label,
            field = self.unique_field,
            target_label = spec.target_label,
            rel = spec.relationship_type,
        );
        let props = spec.properties.clone().unwrap_or(Value::Object(Default::default()));
        let q = query(&cypher).param("source", source_id.to_string()).param("target", spec.target_unique_value.clone()).param("props", props);
        self.run(q).await
    }

    pub async fn remove_relationship(&self, source_id: &str, relationship_type: &str, target_unique_value: &str) -> Result<(), CoreError> {
        let cypher = format!(
            "MATCH (a:{label} {{{field}: $source}})-[r:{rel}]->(b {{uuid: $target}}) DELETE r",
            label = self.label,
            field = self.unique_field,
            rel = relationship_type,
        );
        let q = query(&cypher).param("source", source_id.to_string()).param("target", target_unique_value.to_string());
        self.run(q).await
    }

    async fn run(&self, q: neo4rs::Query) -> Result<(), CoreError> {
        self.graph.run(q).await.map_err(|e| CoreError::GraphStoreUnavailable(e.to_string()))
    }
}

fn require_unique_value(properties: &Value, unique_field: &str) -> Result<String, CoreError> {
    properties
        .get(unique_field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| CoreError::SchemaViolation(format!("missing unique field `{unique_field}`")))
}

/// Dates serialize to ISO-8601 with offset; complex nested objects serialize
/// to JSON strings; arrays of scalars pass through unchanged.
fn serialize_dates(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let converted = match v {
                        Value::Object(_) => Value::String(v.to_string()),
                        other => other,
                    };
                    (k, converted)
                })
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_objects_serialize_to_json_strings_top_level_scalars_pass_through() {
        let value = serde_json::json!({"name": "scope-1", "tags": ["a", "b"], "meta": {"k": "v"}});
        let converted = serialize_dates(value);
        assert_eq!(converted["name"], "scope-1");
        assert!(converted["tags"].is_array());
        assert!(converted["meta"].is_string());
    }

    #[test]
    fn require_unique_value_rejects_missing_field() {
        let err = require_unique_value(&serde_json::json!({"name": "x"}), "uuid").unwrap_err();
        assert!(matches!(err, CoreError::SchemaViolation(_)));
    }
}
