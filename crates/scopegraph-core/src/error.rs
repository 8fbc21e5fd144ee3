//! Error taxonomy (§7, §10.2): kinds, not types. A single `thiserror`-derived
//! enum shared across crates, rather than each crate growing its own ad hoc
//! error type — matching the one-taxonomy-many-call-sites pattern the
//! collaborating crates build their own errors around.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("graph store unavailable: {0}")]
    GraphStoreUnavailable(String),

    #[error("transient graph error (attempt {attempt}/{max_attempts}): {message}")]
    TransientGraphError {
        message: String,
        attempt: u32,
        max_attempts: u32,
    },

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("not found: {entity}")]
    NotFound { entity: String },

    #[error("parse error in {file}: {message}")]
    ParseError { file: String, message: String },

    #[error("LLM quota exceeded: {0}")]
    LlmQuotaExceeded(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("empty summary for {entity}")]
    EmptySummary { entity: String },

    #[error("cancelled")]
    Cancelled,
}

impl CoreError {
    /// Whether a retry loop should keep going for this error kind
    /// (§7 propagation policy).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::GraphStoreUnavailable(_)
                | CoreError::TransientGraphError { .. }
                | CoreError::LlmQuotaExceeded(_)
                | CoreError::LlmUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_are_not_retryable() {
        let err = CoreError::ParseError { file: "a.rs".into(), message: "boom".into() };
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_graph_errors_are_retryable() {
        let err = CoreError::TransientGraphError { message: "timeout".into(), attempt: 1, max_attempts: 3 };
        assert!(err.is_retryable());
    }
}
