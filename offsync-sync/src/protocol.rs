//! Wire representation exchanged with a remote source.
//!
//! The exchange is a simple two-call model:
//! 1. The client fetches the server's envelopes changed since its cursor
//! 2. The client pushes its pending envelopes and receives one outcome per record
//!
//! Records are flat and type-erased: the entity payload travels as serialized
//! JSON tagged with its entity type name, so one remote source can serve every
//! entity type.

use offsync_types::{HybridTimestamp, SyncId};
use serde::{Deserialize, Serialize};

/// Maximum number of records to push in a single call.
pub const MAX_BATCH_SIZE: usize = 100;

/// Flat representation of one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeRecord {
    /// Entity type name (`HasIdentity::ENTITY_TYPE`).
    pub entity_type: String,
    /// Sync ID, absent until first synchronized.
    #[serde(default)]
    pub sync_id: Option<SyncId>,
    /// Last successful reconciliation, absent if never synchronized.
    #[serde(default)]
    pub last_synced: Option<HybridTimestamp>,
    /// Tombstone flag.
    #[serde(default)]
    pub deleted: bool,
    /// Serialized entity (JSON).
    pub payload: String,
}

impl EnvelopeRecord {
    /// Creates an unsynchronized, live record.
    pub fn new(entity_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            sync_id: None,
            last_synced: None,
            deleted: false,
            payload: payload.into(),
        }
    }

    /// Sets the sync state.
    pub fn synced(mut self, sync_id: SyncId, last_synced: HybridTimestamp) -> Self {
        self.sync_id = Some(sync_id);
        self.last_synced = Some(last_synced);
        self
    }

    /// Marks the record as a tombstone.
    pub fn tombstone(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Per-record result of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushOutcome {
    /// The server stored the record. `sync_id` is the id it filed the record
    /// under and `last_synced` the stamp it gave it, when it reports them.
    Accepted {
        #[serde(default)]
        sync_id: Option<SyncId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_synced: Option<HybridTimestamp>,
    },
    /// The server refused the record; it stays pending locally.
    Rejected { reason: String },
}

impl PushOutcome {
    /// Accepted with a server-assigned id.
    pub fn accepted(sync_id: SyncId) -> Self {
        Self::Accepted {
            sync_id: Some(sync_id),
            last_synced: None,
        }
    }

    /// Accepted with a server-assigned id and server stamp.
    pub fn accepted_at(sync_id: SyncId, last_synced: HybridTimestamp) -> Self {
        Self::Accepted {
            sync_id: Some(sync_id),
            last_synced: Some(last_synced),
        }
    }

    /// Rejected with a reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Whether the record was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}
