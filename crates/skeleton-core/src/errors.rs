//! Error types for the skeleton corpus builder.
//!
//! Only configuration-level failures travel through these variants. Per-file
//! parse problems and per-field encoding problems are recorded as data on the
//! extracted records instead.

/// Top-level error enum for the skeleton corpus builder.
#[derive(Debug, thiserror::Error)]
pub enum SkeletonError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read repository list {path}: {source}")]
    RepoList {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write artifact {path}: {message}")]
    Artifact { path: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<::config::ConfigError> for SkeletonError {
    fn from(err: ::config::ConfigError) -> Self {
        SkeletonError::Config(err.to_string())
    }
}

pub type SkeletonResult<T> = Result<T, SkeletonError>;
