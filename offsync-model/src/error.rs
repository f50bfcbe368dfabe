//! Error types for the identity model.

use thiserror::Error;

/// Result type for identity model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while resolving or reading entity identities.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No identifier property could be determined for the type.
    #[error("cannot resolve identity of `{entity_type}`: {reason}")]
    IdentityResolution { entity_type: String, reason: String },

    /// The entity does not fit the identity it was checked against.
    #[error("invalid `{entity_type}` entity: {reason}")]
    InvalidEntity { entity_type: String, reason: String },

    /// Serialization error while reading identifier values.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
