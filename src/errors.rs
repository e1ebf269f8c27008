//! Custom error types for pixel-truth.
//!
//! `TruthError` is the crate-wide error. The narrower enums below belong to
//! one collaborator each (storage backend, upload validation, the model hub,
//! the analysis session) and convert into it with `?`.

use std::path::PathBuf;

use crate::models::AnalysisKind;
use crate::session::Phase;

/// The main error type for pixel-truth operations.
#[derive(Debug, thiserror::Error)]
pub enum TruthError {
    /// I/O error (file read/write, permissions, etc.)
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Lookup of a history entry that is not (or no longer) stored
    #[error("No {kind} analysis with id '{id}' in history")]
    NotFound { kind: AnalysisKind, id: String },

    /// Filesystem watcher error
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Tokio task join error
    #[error("Async task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Generic error for external library errors
    #[error("{context}: {message}")]
    External { context: String, message: String },
}

/// Result type alias using TruthError
pub type TruthResult<T> = Result<T, TruthError>;

impl TruthError {
    /// Create an I/O error with path context
    pub fn io(source: std::io::Error, path: impl Into<Option<PathBuf>>) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an external error with context
    pub fn external(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::External {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Convert from raw I/O errors (without path context)
impl From<std::io::Error> for TruthError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { path: None, source }
    }
}

/// Key-value backend failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid storage key '{0}' (allowed: letters, digits, '_' and '-')")]
    InvalidKey(String),

    #[error("Storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("Storage I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No data directory available on this platform")]
    NoDataDir,
}

/// Rejections from the upload collaborator. These never reach a session.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Unsupported file type '{mime}' for {path:?}: please select an image")]
    UnsupportedType { path: PathBuf, mime: String },

    #[error("File too large: {path:?} is {size} bytes (limit: {limit} bytes)")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Model collaborator failures.
///
/// Cloneable because a single failed load is reported to every caller that
/// was waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to load model '{model_id}': {message}")]
    Load { model_id: String, message: String },

    /// The inference endpoint refused to serve the model (missing
    /// credentials, not deployed, cold start)
    #[error("Model '{model_id}' is unavailable: {message}")]
    Unavailable { model_id: String, message: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Classifier returned no classes")]
    EmptyClassification,
}

/// Analysis session misuse.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot {action} while {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },
}
