//! Core type definitions for offsync.
//!
//! This crate defines the small, domain-agnostic types shared by the
//! identity model and the synchronization layer:
//! - Synchronization identifiers (UUID v7)
//! - Hybrid Logical Clock timestamps used for `LastSynced` values

mod ids;
mod timestamp;

pub use ids::SyncId;
pub use timestamp::HybridTimestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
