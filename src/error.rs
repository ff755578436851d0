//! Error types for the webspider engine.
//!
//! `SpiderError` covers the two places errors surface: fatal-to-the-caller
//! validation at the public API boundary (configuration, lifecycle misuse,
//! seeding) and failures reported by pluggable capabilities. Worker loops
//! never bubble errors out of the run; a capability `Err` is logged and
//! treated as a retryable outcome so one bad page cannot end a crawl.

use crate::state::Phase;
use thiserror::Error;

/// Errors produced by the engine or returned by stage capabilities.
#[derive(Debug, Error)]
pub enum SpiderError {
    /// Invalid engine configuration, rejected before the run starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation was invoked in the wrong lifecycle phase.
    #[error("`{operation}` requires the {expected} phase, but the spider is {actual}")]
    Phase {
        operation: &'static str,
        expected: Phase,
        actual: Phase,
    },

    /// A seed could not be enqueued because the fetch queue is at capacity.
    #[error("fetch queue is full, cannot accept start task for `{0}`")]
    QueueFull(String),

    /// A URL failed to parse during normalization.
    #[error("invalid url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// A stage capability failed in a way it could not express as an
    /// outcome verdict. The engine treats this like a retry verdict.
    #[error("capability failure: {0}")]
    Capability(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Statistics export failed to serialize.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl SpiderError {
    /// Wraps an arbitrary error raised inside a capability implementation.
    pub fn capability(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        SpiderError::Capability(err.into())
    }
}
