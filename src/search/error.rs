//! Error types for the search pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while searching and saving results.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The search endpoint answered with a non-success status.
    #[error("search endpoint returned status {status} for {url}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Full request URL.
        url: String,
    },

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTML parsing error.
    #[error("HTML parsing error: {0}")]
    HtmlParse(String),

    /// The output record is held by another process.
    #[error("{} is in use by another process", path.display())]
    ResourceLocked {
        /// Path of the locked file.
        path: PathBuf,
    },

    /// Date selection could not be turned into a calendar date.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Interactive prompt failed.
    #[error("Prompt failed: {0}")]
    Prompt(String),
}

impl SearchError {
    /// Check if this error came from talking to the search endpoint.
    ///
    /// Transport failures abort the remaining queries of a run.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::HttpStatus { .. })
    }

    /// Check if this error means the output record is locked elsewhere.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::ResourceLocked { .. })
    }
}

/// Convenience result alias for search operations.
pub type SearchResult<T> = Result<T, SearchError>;
