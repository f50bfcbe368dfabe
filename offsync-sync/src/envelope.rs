//! Synchronization envelopes and conflict ordering.
//!
//! An envelope wraps one cached entity with its sync metadata. When a local
//! and a remote envelope describe the same entity, [`SyncEnvelope::resolve`]
//! decides which one wins:
//!
//! 1. An envelope that was never synchronized (no `SyncId`) is the newest.
//! 2. Otherwise the later `LastSynced` wins.
//! 3. Otherwise a [`TieBreaker`] picks one. The default compares payload
//!    digests, which is deterministic but carries no business meaning, so
//!    tie-broken decisions are reported as conflicts.

use crate::error::{SyncError, SyncResult};
use crate::protocol::EnvelopeRecord;
use offsync_model::HasIdentity;
use offsync_types::{HybridTimestamp, SyncId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;

/// Picks a winner between two envelopes whose sync state is indistinguishable.
///
/// Inputs are the serialized payloads (with the tombstone flag appended).
/// `Greater` keeps the local envelope, `Less` takes the remote one.
pub trait TieBreaker: Send + Sync + fmt::Debug {
    fn break_tie(&self, local: &[u8], remote: &[u8]) -> Ordering;
}

/// Compares SHA-256 digests of both sides. Deterministic on every replica.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadDigest;

impl TieBreaker for PayloadDigest {
    fn break_tie(&self, local: &[u8], remote: &[u8]) -> Ordering {
        Sha256::digest(local)
            .as_slice()
            .cmp(Sha256::digest(remote).as_slice())
    }
}

/// Always keeps the local envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferLocal;

impl TieBreaker for PreferLocal {
    fn break_tie(&self, _local: &[u8], _remote: &[u8]) -> Ordering {
        Ordering::Greater
    }
}

/// Always takes the remote envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferRemote;

impl TieBreaker for PreferRemote {
    fn break_tie(&self, _local: &[u8], _remote: &[u8]) -> Ordering {
        Ordering::Less
    }
}

/// Which rule decided a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    /// Exactly one side has never been synchronized.
    NeverSynced,
    /// Both sides are synchronized with different `LastSynced` values.
    LastSynced,
    /// Sync state tied and the payloads differ; the tie-breaker chose.
    TieBreak,
    /// Sync state tied and the payloads are the same.
    Identical,
}

/// Result of comparing a local envelope against a remote one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// `Greater`: local wins. `Less`: remote wins. `Equal`: no difference.
    pub ordering: Ordering,
    pub resolved_by: ResolvedBy,
}

impl Resolution {
    /// Whether the decision was an arbitrary pick between diverging copies.
    pub fn is_conflict(&self) -> bool {
        self.resolved_by == ResolvedBy::TieBreak
    }
}

/// One locally cached entity with its synchronization metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEnvelope<T> {
    sync_id: Option<SyncId>,
    last_synced: Option<HybridTimestamp>,
    deleted: bool,
    entity: T,
}

impl<T> SyncEnvelope<T> {
    /// Wraps an entity that has never been synchronized.
    pub fn new(entity: T) -> Self {
        Self {
            sync_id: None,
            last_synced: None,
            deleted: false,
            entity,
        }
    }

    /// Builds an envelope from explicit sync state (for replay and tests).
    pub fn from_parts(
        sync_id: Option<SyncId>,
        last_synced: Option<HybridTimestamp>,
        deleted: bool,
        entity: T,
    ) -> Self {
        Self {
            sync_id,
            last_synced,
            deleted,
            entity,
        }
    }

    pub fn sync_id(&self) -> Option<SyncId> {
        self.sync_id
    }

    pub fn last_synced(&self) -> Option<HybridTimestamp> {
        self.last_synced
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// True once the envelope has a `SyncId`.
    pub fn is_synchronized(&self) -> bool {
        self.sync_id.is_some()
    }

    /// The wrapped entity.
    pub fn entity(&self) -> &T {
        &self.entity
    }

    /// Unwraps the entity.
    pub fn into_entity(self) -> T {
        self.entity
    }

    pub(crate) fn replace_entity(&mut self, entity: T) {
        self.entity = entity;
    }

    /// Records a successful round trip.
    ///
    /// Assigns a fresh `SyncId` the first time; later calls keep it. Always
    /// moves `LastSynced` forward. Returns the envelope's `SyncId`.
    pub fn mark_synchronized(&mut self) -> SyncId {
        let sync_id = *self.sync_id.get_or_insert_with(SyncId::new);
        self.refresh_last_synced();
        sync_id
    }

    /// Like [`mark_synchronized`](Self::mark_synchronized), but adopts
    /// `sync_id` (typically server-assigned) when the envelope has none.
    pub fn mark_synchronized_with(&mut self, sync_id: SyncId) -> SyncId {
        let sync_id = *self.sync_id.get_or_insert(sync_id);
        self.refresh_last_synced();
        sync_id
    }

    /// Records a round trip stamped by the server at `at`.
    ///
    /// Adopts `sync_id` when the envelope has none. `LastSynced` becomes
    /// `at` as given, since the server's clock orders all replicas.
    pub fn mark_synchronized_at(&mut self, sync_id: SyncId, at: HybridTimestamp) -> SyncId {
        let sync_id = *self.sync_id.get_or_insert(sync_id);
        self.last_synced = Some(at);
        sync_id
    }

    fn refresh_last_synced(&mut self) {
        self.last_synced = Some(match self.last_synced {
            Some(previous) => previous.tick(),
            None => HybridTimestamp::now(),
        });
    }

    /// Turns the envelope into a tombstone.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Clears the tombstone flag.
    pub fn restore(&mut self) {
        self.deleted = false;
    }
}

impl<T: Serialize> SyncEnvelope<T> {
    /// Compares `self` (local) against `other` (remote).
    pub fn resolve(&self, other: &Self, tie_breaker: &dyn TieBreaker) -> SyncResult<Resolution> {
        let decided = |ordering, resolved_by| Ok(Resolution { ordering, resolved_by });

        match (self.sync_id, other.sync_id) {
            (None, Some(_)) => return decided(Ordering::Greater, ResolvedBy::NeverSynced),
            (Some(_), None) => return decided(Ordering::Less, ResolvedBy::NeverSynced),
            (Some(_), Some(_)) => match self.last_synced.cmp(&other.last_synced) {
                Ordering::Equal => {}
                ordering => return decided(ordering, ResolvedBy::LastSynced),
            },
            (None, None) => {}
        }

        let local = self.tie_bytes()?;
        let remote = other.tie_bytes()?;
        if local == remote {
            return decided(Ordering::Equal, ResolvedBy::Identical);
        }
        decided(tie_breaker.break_tie(&local, &remote), ResolvedBy::TieBreak)
    }

    /// [`resolve`](Self::resolve) with the default [`PayloadDigest`] tie-breaker.
    pub fn compare(&self, other: &Self) -> SyncResult<Ordering> {
        Ok(self.resolve(other, &PayloadDigest)?.ordering)
    }

    fn tie_bytes(&self) -> SyncResult<Vec<u8>> {
        let mut bytes = serde_json::to_vec(&self.entity)?;
        bytes.push(u8::from(self.deleted));
        Ok(bytes)
    }
}

impl<T: HasIdentity> SyncEnvelope<T> {
    /// Flattens the envelope for the remote source.
    pub fn to_record(&self) -> SyncResult<EnvelopeRecord> {
        Ok(EnvelopeRecord {
            entity_type: T::ENTITY_TYPE.to_string(),
            sync_id: self.sync_id,
            last_synced: self.last_synced,
            deleted: self.deleted,
            payload: serde_json::to_string(&self.entity)?,
        })
    }

    /// Rebuilds an envelope from a remote record.
    pub fn from_record(record: &EnvelopeRecord) -> SyncResult<Self> {
        if record.entity_type != T::ENTITY_TYPE {
            return Err(SyncError::TypeMismatch {
                expected: T::ENTITY_TYPE.to_string(),
                found: record.entity_type.clone(),
            });
        }
        Ok(Self {
            sync_id: record.sync_id,
            last_synced: record.last_synced,
            deleted: record.deleted,
            entity: serde_json::from_str(&record.payload)?,
        })
    }
}
