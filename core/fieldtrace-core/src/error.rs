//! Error types for fieldtrace-core operations.

use std::path::PathBuf;

/// All errors that can occur in fieldtrace-core operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP request failed: {context}: {source}")]
    Http {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Login rejected: {0}")]
    LoginRejected(String),

    #[error("Login response did not establish a session")]
    SessionCookieMissing,
}

/// Convenience type alias for Results using TrackError.
pub type Result<T> = std::result::Result<T, TrackError>;

// Conversion for string error compatibility with daemon storage code.
impl From<TrackError> for String {
    fn from(err: TrackError) -> String {
        err.to_string()
    }
}
