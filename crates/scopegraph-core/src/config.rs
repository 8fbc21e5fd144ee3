//! Project configuration (§6, §10.3): a typed YAML config merged over a
//! defaults layer, plus environment/`.env` secrets kept in a small typed
//! struct instead of scattered `std::env::var` calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    pub unique_field: String,
    #[serde(default)]
    pub searchable_fields: Vec<String>,
    #[serde(default)]
    pub vector_indexes: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: String,
    pub adapter: String,
    pub root: PathBuf,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// The project's YAML config, deep-merged over `default_config()` before
/// typed deserialization so unknown/omitted fields still resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub source: SourceConfig,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub embeddings: Option<serde_yaml::Value>,
    #[serde(default)]
    pub summarization_strategies: Option<serde_yaml::Value>,
    #[serde(default)]
    pub summarization_llm: Option<String>,
    #[serde(default)]
    pub watch: Option<bool>,
    #[serde(default)]
    pub change_tracking: Option<serde_yaml::Value>,
}

impl ProjectConfig {
    /// Load and deep-merge `path` over the built-in defaults, then parse
    /// into the typed struct. Unknown keys under `entities[]`/top-level
    /// maps are preserved by round-tripping through `serde_yaml::Value`.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::ConfigInvalid(format!("{}: {}", path.display(), e)))?;
        Self::parse(&raw)
    }

    pub fn parse(yaml: &str) -> Result<Self, CoreError> {
        let user: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| CoreError::ConfigInvalid(e.to_string()))?;
        let merged = deep_merge(default_config(), user);
        serde_yaml::from_value(merged).map_err(|e| CoreError::ConfigInvalid(e.to_string()))
    }
}

/// The base defaults layer deep-merged under every user config (§6: "A
/// defaults layer... is deep-merged under the user's config").
fn default_config() -> serde_yaml::Value {
    serde_yaml::from_str(
        r#"
source:
  type: filesystem
  include: ["**/*"]
  exclude: ["**/node_modules/**", "**/target/**", "**/.git/**"]
entities: []
watch: false
"#,
    )
    .expect("default_config is valid YAML")
}

/// Merges `overlay` on top of `base`. Mappings merge key-by-key
/// recursively; any other value in `overlay` replaces `base` outright.
fn deep_merge(base: serde_yaml::Value, overlay: serde_yaml::Value) -> serde_yaml::Value {
    use serde_yaml::Value;
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Secrets and connection settings read from `.env` and the process
/// environment (§6, §10.3). Process environment always wins over `.env`.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub neo4j_uri: String,
    pub neo4j_username: String,
    pub neo4j_password: String,
    pub neo4j_database: Option<String>,
    pub gemini_api_key: Option<String>,
    pub vertex_project_id: Option<String>,
    pub vertex_location: Option<String>,
    pub google_application_credentials: Option<PathBuf>,
}

impl EnvConfig {
    /// Loads `.env` (if present, without overriding already-set process
    /// vars) then reads the named variables.
    pub fn load() -> Result<Self, CoreError> {
        let _ = dotenvy::dotenv();
        Self::from_env(&std::env::vars().collect())
    }

    fn from_env(vars: &HashMap<String, String>) -> Result<Self, CoreError> {
        let required = |key: &str| {
            vars.get(key)
                .cloned()
                .ok_or_else(|| CoreError::ConfigInvalid(format!("missing required env var {key}")))
        };
        Ok(EnvConfig {
            neo4j_uri: required("NEO4J_URI")?,
            neo4j_username: required("NEO4J_USERNAME")?,
            neo4j_password: required("NEO4J_PASSWORD")?,
            neo4j_database: vars.get("NEO4J_DATABASE").cloned(),
            gemini_api_key: vars.get("GEMINI_API_KEY").cloned(),
            vertex_project_id: vars.get("VERTEX_PROJECT_ID").cloned(),
            vertex_location: vars.get("VERTEX_LOCATION").cloned(),
            google_application_credentials: vars.get("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_source_fields() {
        let config = ProjectConfig::parse(
            r#"
name: demo
source:
  adapter: git
  root: .
entities: []
"#,
        )
        .unwrap();
        assert_eq!(config.source.source_type, "filesystem");
        assert!(config.source.exclude.iter().any(|p| p.contains("node_modules")));
    }

    #[test]
    fn user_values_override_defaults() {
        let config = ProjectConfig::parse(
            r#"
name: demo
source:
  type: git
  adapter: git
  root: .
  exclude: ["dist/**"]
entities: []
"#,
        )
        .unwrap();
        assert_eq!(config.source.source_type, "git");
        assert_eq!(config.source.exclude, vec!["dist/**".to_string()]);
    }

    #[test]
    fn missing_required_source_field_is_config_invalid() {
        let err = ProjectConfig::parse("name: demo\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid(_)));
    }

    #[test]
    fn env_config_reports_missing_required_vars() {
        let vars = HashMap::new();
        let err = EnvConfig::from_env(&vars).unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid(_)));
    }

    #[test]
    fn env_config_reads_required_and_optional_vars() {
        let mut vars = HashMap::new();
        vars.insert("NEO4J_URI".to_string(), "bolt://localhost:7687".to_string());
        vars.insert("NEO4J_USERNAME".to_string(), "neo4j".to_string());
        vars.insert("NEO4J_PASSWORD".to_string(), "secret".to_string());
        vars.insert("GEMINI_API_KEY".to_string(), "key".to_string());
        let env = EnvConfig::from_env(&vars).unwrap();
        assert_eq!(env.neo4j_uri, "bolt://localhost:7687");
        assert_eq!(env.gemini_api_key.as_deref(), Some("key"));
        assert!(env.vertex_project_id.is_none());
    }
}
