//! Error types shared by the aggregation crates.
//!
//! Two layers:
//! - [`UpstreamFailure`] is what a source attaches to a failed fetch. It is the
//!   root-cause tag the classifier looks for in an `anyhow` error chain.
//! - [`MovieError`] is the closed domain taxonomy. It is the only error type
//!   that leaves the aggregator.

use thiserror::Error;

/// Root cause reported by an upstream source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// Network-like failure; the same request may succeed later.
    #[error("network failure: {0}")]
    Network(String),

    /// The upstream service rejected or failed the request.
    #[error("service failure: {0}")]
    Service(String),
}

/// Classified failure surfaced by the aggregation pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MovieError {
    /// Retryable failure.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// Failure that retrying will not fix.
    #[error("permanent failure: {message}")]
    Permanent { message: String },

    /// The retry budget was spent. `last` is the final classified failure.
    #[error("retries exhausted after {attempts} attempts: {}", last.message())]
    Exhausted { attempts: u32, last: Box<MovieError> },
}

impl MovieError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    pub fn exhausted(attempts: u32, last: MovieError) -> Self {
        Self::Exhausted {
            attempts,
            last: Box::new(last),
        }
    }

    /// Message of the original failure.
    ///
    /// For `Exhausted` this is the message of the last classified failure.
    pub fn message(&self) -> &str {
        match self {
            Self::Transient { message } | Self::Permanent { message } => message,
            Self::Exhausted { last, .. } => last.message(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Convenience type alias for Results carrying a [`MovieError`]
pub type Result<T> = std::result::Result<T, MovieError>;
