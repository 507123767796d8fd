use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or configuring a cache
///
/// The shutdown flush never returns these; it logs and skips instead.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed cache index {path}: {reason}")]
    MalformedIndex { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, CacheError>;
