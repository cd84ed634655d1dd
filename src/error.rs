//! Error types for the analytics relay
//!
//! Only setup paths (configuration, opening stores, building the HTTP
//! client) and store writes are fallible. Event tracking never returns
//! an error.

use thiserror::Error;

/// Result type for analytics relay operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Errors that can occur while setting up or persisting the relay
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Filesystem failure in a persistent store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration file could not be parsed
    #[error("Failed to parse config {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// A configuration value is out of range
    #[error("Invalid config value for {field}: {message}")]
    ConfigInvalid { field: String, message: String },

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
