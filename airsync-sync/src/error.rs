//! Error types for airsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use airsync_core::error::RegistryError;
use airsync_reconcile::ReconcileError;

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the registry store.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A record failed reconciliation and the run policy is to abort.
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dataset could not be read as CSV.
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A dataset row is structurally valid CSV but not a valid record.
    #[error("{path}:{line}: {message}")]
    Decode {
        path: PathBuf,
        line: u64,
        message: String,
    },

    /// An intent would break a registry constraint; the whole record was
    /// rolled back.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// JSON serialization/deserialization error (run journal).
    #[error("journal JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
