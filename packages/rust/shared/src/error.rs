//! Error types for SupportFlow.
//!
//! Library crates use [`SupportFlowError`] via `thiserror`.
//! App crates (cli/server) wrap this with `color-eyre` for rich diagnostics.
//! Inside the pipeline these errors never reach the caller: each stage turns
//! them into a modeled fallback.

use std::path::PathBuf;

/// Top-level error type for all SupportFlow operations.
#[derive(Debug, thiserror::Error)]
pub enum SupportFlowError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP error talking to a collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// Structured output could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Vector-search backend error (unavailable, GraphQL error, bad payload).
    #[error("search error: {0}")]
    Search(String),

    /// Language-model call error (HTTP status, missing content).
    #[error("llm error: {0}")]
    Llm(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (out-of-range value, schema mismatch, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SupportFlowError>;

impl SupportFlowError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors produced by malformed structured output.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Validation { .. })
    }
}
