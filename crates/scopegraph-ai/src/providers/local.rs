//! Offline stand-in provider: useful for tests and for running a pipeline
//! with no configured API key. Produces deterministic, low-quality text
//! rather than calling out to anything.

use scopegraph_core::CoreError;

use crate::provider::LlmProvider;

pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmProvider for LocalProvider {
    async fn generate(&self, prompt: &str) -> Result<String, CoreError> {
        let first_line = prompt.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        Ok(format!("{{\"text\": \"{}\"}}", first_line.replace('"', "'")))
    }

    fn name(&self) -> &str {
        "local"
    }
}
