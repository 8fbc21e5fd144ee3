//! LLM provider abstraction (C8's "provider abstraction"): a provider only
//! has to know how to turn a rendered prompt into text. Everything
//! schema-aware (deriving instructions, parsing structured output) lives in
//! `schema`, on top of this trait.

use async_trait::async_trait;
use scopegraph_core::CoreError;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CoreError>;

    /// Batching is preferred when the backend supports it; the default
    /// falls back to sequential `generate` calls, which callers wanting
    /// concurrency should bound with their own semaphore instead of relying
    /// on this default.
    async fn generate_batch(&self, prompts: &[String]) -> Result<Vec<String>, CoreError> {
        let mut out = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            out.push(self.generate(prompt).await?);
        }
        Ok(out)
    }

    fn name(&self) -> &str;
}
