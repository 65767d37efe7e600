//! Error types for the sync pipeline

use std::path::PathBuf;

/// Sync pipeline errors
///
/// Payloads are plain strings so a failure can be recorded in an
/// [`ImportReport`](crate::orchestrator::ImportReport) and cloned into
/// progress events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive missing: {0}")]
    ArchiveMissing(String),

    #[error("Unsupported archive shape: {path} declares {count} prefabs, expected exactly 1")]
    UnsupportedArchiveShape { path: PathBuf, count: usize },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Host error: {0}")]
    Host(String),

    #[error("An import run is already in progress")]
    Busy,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Io(format!("JSON: {}", e))
    }
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
