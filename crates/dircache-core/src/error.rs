//! Error types for walking and cache lifecycle operations.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a directory cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheState {
    /// Constructed, not yet started.
    Created,
    /// Timer armed, snapshots being refreshed.
    Running,
    /// Stopped or closed; cannot be restarted.
    Stopped,
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheState::Created => "created",
            CacheState::Running => "running",
            CacheState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Errors produced by walks and by the cache lifecycle.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Root path does not exist.
    #[error("Root path not found: {path}")]
    InvalidRoot { path: PathBuf },

    /// Root path exists but is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation not allowed in the current lifecycle state.
    #[error("Cannot {operation} a cache that is {state}")]
    IllegalState {
        operation: &'static str,
        state: CacheState,
    },

    /// A name pattern failed to compile.
    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The background scheduler could not be set up.
    #[error("Failed to start scheduler: {source}")]
    Runtime {
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::InvalidRoot { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error means the walk root is unusable.
    pub fn is_invalid_root(&self) -> bool {
        matches!(self, Self::InvalidRoot { .. } | Self::NotADirectory { .. })
    }
}

/// Kind of walk warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Entry vanished or could not be listed.
    EntryUnreadable,
    /// Error reading metadata.
    MetadataError,
}

/// Non-fatal problem with a single entry; the entry is left out of the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl WalkWarning {
    /// Create a new walk warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Classify an I/O error hit while reading one entry.
    pub fn from_io(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let kind = match error.kind() {
            std::io::ErrorKind::PermissionDenied => WarningKind::PermissionDenied,
            _ => WarningKind::EntryUnreadable,
        };
        Self::new(path, error.to_string(), kind)
    }

    /// Create a metadata error warning.
    pub fn metadata(path: impl Into<PathBuf>, error: impl fmt::Display) -> Self {
        Self::new(path, format!("Metadata error: {error}"), WarningKind::MetadataError)
    }
}
