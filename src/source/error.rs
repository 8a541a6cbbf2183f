//! Evaluation source error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading an evaluation document.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The evaluation file could not be read.
    #[error("failed to read evaluation file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not a valid evaluation.
    #[error("failed to parse evaluation from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backend could not be reached or the transfer failed.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("evaluation backend returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The configured backend URL is unusable.
    #[error("invalid evaluation backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}
