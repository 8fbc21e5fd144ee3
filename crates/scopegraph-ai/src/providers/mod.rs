//! LLM provider implementations.

pub mod anthropic;
pub mod local;
pub mod openai;

use scopegraph_core::CoreError;

use crate::provider::LlmProvider;

/// Factory dispatching on the `summarization_llm`/reranker config's provider
/// name to a concrete `LlmProvider`.
pub fn create_provider(provider_name: &str, api_key: Option<String>) -> Result<Box<dyn LlmProvider>, CoreError> {
    match provider_name {
        "openai" => Ok(Box::new(openai::OpenAiProvider::new(api_key))),
        "anthropic" => Ok(Box::new(anthropic::AnthropicProvider::new(api_key))),
        "local" => Ok(Box::new(local::LocalProvider::new())),
        other => Err(CoreError::ConfigInvalid(format!("unknown LLM provider: {other}"))),
    }
}
