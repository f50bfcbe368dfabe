//! Error types for the sync layer.

use offsync_model::ModelError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Identity resolution or identifier extraction failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A record, envelope or identity belongs to a different entity type.
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch { expected: String, found: String },

    /// Another session is already reconciling the same envelope set.
    #[error("a sync session for `{entity_type}` is already active")]
    SessionAlreadyActive { entity_type: String },

    /// Network or transport error reported by the remote source.
    #[error("network error: {0}")]
    Network(String),

    /// The remote source answered with something that breaks the exchange contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// The session was cancelled.
    #[error("sync session cancelled")]
    Cancelled,
}

impl SyncError {
    /// Whether a caller may reasonably retry the operation later.
    ///
    /// Contention and transport failures are transient; contract violations
    /// (identity, type, protocol, serialization) will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SessionAlreadyActive { .. } | Self::Network(_) | Self::Timeout
        )
    }
}
