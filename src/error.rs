//! Error taxonomy for the RAG pipeline.
//!
//! Call sites carry these through `anyhow` so the CLI can print them with
//! context; tests downcast to assert on the failure class.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// Bad configuration (invalid chunk sizes, missing corpus file, missing
    /// columns). Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A remote backend (embedding, generation, judge) is unreachable or
    /// deliberately disabled. Fatal for the current operation.
    #[error("{service} backend unavailable: {detail}")]
    BackendUnavailable { service: String, detail: String },

    /// The generation backend accepted the request but failed to produce a
    /// usable response. Recovered at the session boundary with a fixed
    /// apology message.
    #[error("generation failed: {0}")]
    Generation(String),

    /// API misuse, e.g. querying the index with k = 0.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The judge model returned something that does not parse as the scoring
    /// rubric. Recovered with neutral default scores.
    #[error("malformed judge output: {0}")]
    MalformedJudgeOutput(String),
}

impl RagError {
    pub fn backend_unavailable(service: &str, detail: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            service: service.to_string(),
            detail: detail.into(),
        }
    }
}
