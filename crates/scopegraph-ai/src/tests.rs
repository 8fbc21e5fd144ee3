//! Crate-level integration tests exercising the provider factory, the
//! structured-output adapter, and the reranker's score merging end to end.

use std::sync::Arc;

use scopegraph_core::CoreError;

use crate::provider::LlmProvider;
use crate::providers::create_provider;
use crate::rerank::{EntityContext, EntityField, LlmReranker, RerankConfig, RerankUse, WorkingEntry};
use crate::schema::{FieldType, OutputSchema, SchemaField, StructuredLlmAdapter};

#[test]
fn factory_creates_every_known_provider_and_rejects_unknown_ones() {
    assert!(create_provider("openai", None).is_ok());
    assert!(create_provider("anthropic", None).is_ok());
    assert!(create_provider("local", None).is_ok());
    let err = create_provider("made-up", None).unwrap_err();
    assert!(matches!(err, CoreError::ConfigInvalid(_)));
}

#[tokio::test]
async fn local_provider_generate_never_errors() {
    let provider = create_provider("local", None).unwrap();
    let text = provider.generate("Summarize: fn add(a, b) { a + b }").await.unwrap();
    assert!(!text.is_empty());
    assert_eq!(provider.name(), "local");
}

#[tokio::test]
async fn default_generate_batch_falls_back_to_sequential_calls() {
    let provider = create_provider("local", None).unwrap();
    let prompts = vec!["one".to_string(), "two".to_string()];
    let results = provider.generate_batch(&prompts).await.unwrap();
    assert_eq!(results.len(), 2);
}

fn summary_schema() -> OutputSchema {
    OutputSchema {
        root: "summary".to_string(),
        fields: vec![SchemaField {
            name: "text".to_string(),
            field_type: FieldType::String,
            description: "one sentence describing the scope".to_string(),
            required: true,
            nested: None,
        }],
    }
}

#[tokio::test]
async fn structured_adapter_round_trips_through_local_provider() {
    let provider: Arc<dyn LlmProvider> = Arc::new(crate::providers::local::LocalProvider::new());
    let adapter = StructuredLlmAdapter::new(provider);
    let result = adapter
        .generate_structured(
            "You summarize code.",
            "Summarize this function in one sentence.",
            &summary_schema(),
            serde_json::json!({"name": "parse_file"}),
        )
        .await
        .unwrap();
    assert!(result.get("text").is_some());
}

#[tokio::test]
async fn reranker_degrades_to_vector_score_when_provider_returns_unjudgeable_text() {
    struct Mute;
    #[async_trait::async_trait]
    impl LlmProvider for Mute {
        async fn generate(&self, _prompt: &str) -> Result<String, CoreError> {
            Ok("I cannot help with that.".to_string())
        }
        fn name(&self) -> &str {
            "mute"
        }
    }

    let reranker = LlmReranker::new(Arc::new(Mute), RerankConfig::default());
    let entries = vec![WorkingEntry {
        uuid: "scope-1".to_string(),
        vector_score: 0.42,
        context: EntityContext {
            entity_type: "Scope".to_string(),
            display_name: "parse_file".to_string(),
            fields: vec![EntityField {
                name: "signature".to_string(),
                label: None,
                max_length: None,
                required: true,
                rerank_use: RerankUse::Never,
                summary: None,
                original: Some("fn parse_file(path: &Path) -> Result<ParsedFile>".to_string()),
            }],
            enrichments: vec![],
        },
    }];

    let results = reranker.rerank("how does parsing work?", entries).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].final_score, 0.42);
    assert!(results[0].breakdown.degraded);
}
