//! Error types for coursemap.
//!
//! Library crates use [`CourseMapError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all coursemap operations.
#[derive(Debug, thiserror::Error)]
pub enum CourseMapError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching catalog pages.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad config value, malformed record, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A requested major or course does not exist in the store.
    #[error("{what} not found")]
    NotFound { what: &'static str },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CourseMapError>;

impl CourseMapError {
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

    /// Missing major or course. `what` is the capitalized noun ("Major", "Course").
    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound { what }
    }

    /// True for [`CourseMapError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
