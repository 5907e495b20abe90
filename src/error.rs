//! Typed errors for the retrieval pipeline.
//!
//! Two failure classes reach the caller: the vector index being unreachable
//! and a language-model call failing outright. Everything recoverable
//! (malformed extraction JSON, an invalid date bound) is absorbed with a
//! safe default before it gets here — an empty result set and an unavailable
//! index are distinct, observable states.

use thiserror::Error;

/// The backing vector store could not be reached or the query failed.
///
/// Never produced for an empty result set — only for connectivity or
/// query-execution faults. Propagates unchanged through the orchestrator.
#[derive(Debug, Error)]
#[error("vector index unavailable: {reason}")]
pub struct IndexUnavailable {
    pub reason: String,
}

impl IndexUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the retrieval and generation pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Index(#[from] IndexUnavailable),

    /// A language-model call failed (network, quota, malformed endpoint).
    /// Covers both the extraction call and the final answer call; a
    /// non-JSON extraction *response* is not an error and never lands here.
    #[error("language model request failed: {0}")]
    Generation(String),
}

impl PipelineError {
    /// Wraps an `anyhow` error from a chat-model call, keeping the full
    /// context chain in the message text.
    pub fn generation(err: anyhow::Error) -> Self {
        Self::Generation(format!("{err:#}"))
    }
}
