//! Error types for Autopress.
//!
//! Every library crate returns [`AutopressError`]; the CLI wraps it with
//! `color-eyre`. A failed site is logged and counted by the cycle, so the
//! variants mainly tell the operator which collaborator broke.

use std::fmt::Display;
use std::path::PathBuf;

/// Top-level error type for all Autopress operations.
#[derive(Debug, thiserror::Error)]
pub enum AutopressError {
    /// `autopress.toml` is unreadable or invalid, or a secret env var a
    /// site needs is unset.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport failure reaching Unsplash, an image download, or building
    /// any of the HTTP clients.
    #[error("network error: {0}")]
    Network(String),

    /// Claude's reply lacked a tag we need, or a WordPress or image API
    /// returned JSON we could not read.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// libSQL failure, a corrupt row, or a write on a read-only handle.
    #[error("storage error: {0}")]
    Storage(String),

    /// Claude or an image model refused, overloaded, or returned nothing.
    #[error("generation error: {0}")]
    Generation(String),

    /// WordPress rejected a post, tag, category, or media upload.
    #[error("publish error: {0}")]
    Publish(String),

    /// Reading the config file or writing a generated image.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An `Article` status transition that is not allowed, or an empty title.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// htmd failed to turn WordPress HTML back into Markdown.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AutopressError>;

impl AutopressError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with the path it concerned.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// A libSQL error, for `map_err(AutopressError::storage)`.
    pub fn storage(err: impl Display) -> Self {
        Self::Storage(err.to_string())
    }

    /// A `reqwest::Client` builder failure.
    pub fn http_client(err: impl Display) -> Self {
        Self::Network(format!("failed to build HTTP client: {err}"))
    }

    /// Whether retrying the same call later could succeed.
    ///
    /// Config, validation and storage errors repeat on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Generation(_) | Self::Publish(_)
        )
    }
}
