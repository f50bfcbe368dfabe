//! The per-type collection of cached envelopes.
//!
//! A set holds at most one envelope per entity identity and at most one
//! envelope per `SyncId`. Two indexes (identity fingerprint and `SyncId`)
//! are kept over it so that both lookups land on the same envelope.

use crate::envelope::{PayloadDigest, ResolvedBy, SyncEnvelope, TieBreaker};
use crate::error::{SyncError, SyncResult};
use crate::protocol::EnvelopeRecord;
use offsync_model::{EntityIdentity, EntityTypeRegistry, HasIdentity, IdentityKey};
use offsync_types::{HybridTimestamp, SyncId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a merge did to the local set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    /// No local envelope had this identity; the remote one was inserted.
    Inserted,
    /// Both sides were the same; nothing changed.
    Unchanged,
    /// The local envelope won.
    KeptLocal,
    /// The remote envelope won and replaced the local one.
    TookRemote,
    /// The remote envelope won and carried a deletion; the local envelope is
    /// now a tombstone.
    Tombstoned,
}

/// Result of merging one remote envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub action: MergeAction,
    /// How the winner was chosen; `None` for inserts.
    pub resolved_by: Option<ResolvedBy>,
}

impl MergeOutcome {
    fn inserted() -> Self {
        Self {
            action: MergeAction::Inserted,
            resolved_by: None,
        }
    }

    /// Whether the winner was an arbitrary pick between diverging copies.
    pub fn is_conflict(&self) -> bool {
        self.resolved_by == Some(ResolvedBy::TieBreak)
    }
}

/// Envelopes of one entity type.
#[derive(Debug)]
pub struct SyncEnvelopeSet<T> {
    identity: Arc<EntityIdentity>,
    slots: Vec<(IdentityKey, SyncEnvelope<T>)>,
    by_key: HashMap<String, usize>,
    by_sync_id: HashMap<SyncId, usize>,
    fetch_cursor: Option<HybridTimestamp>,
    tie_breaker: Arc<dyn TieBreaker>,
}

impl<T: HasIdentity> SyncEnvelopeSet<T> {
    /// Creates an empty set, resolving `T`'s identity through the registry.
    pub fn new(registry: &EntityTypeRegistry) -> SyncResult<Self> {
        Self::with_identity(registry.get_or_create::<T>()?)
    }

    /// Creates an empty set for an already resolved identity.
    pub fn with_identity(identity: Arc<EntityIdentity>) -> SyncResult<Self> {
        if !identity.describes::<T>() {
            return Err(SyncError::TypeMismatch {
                expected: T::ENTITY_TYPE.to_string(),
                found: identity.entity_type().to_string(),
            });
        }
        Ok(Self {
            identity,
            slots: Vec::new(),
            by_key: HashMap::new(),
            by_sync_id: HashMap::new(),
            fetch_cursor: None,
            tie_breaker: Arc::new(PayloadDigest),
        })
    }

    /// Rebuilds a set from a snapshot taken with [`to_records`](Self::to_records).
    ///
    /// Records are merged in order, so duplicates collapse the same way a
    /// fetch would. The fetch cursor is not part of the snapshot; restore it
    /// with [`advance_fetch_cursor`](Self::advance_fetch_cursor) or let the
    /// next session fetch everything.
    pub fn from_records(
        identity: Arc<EntityIdentity>,
        records: &[EnvelopeRecord],
    ) -> SyncResult<Self> {
        let mut set = Self::with_identity(identity)?;
        for record in records {
            set.merge_record(record)?;
        }
        Ok(set)
    }

    /// Replaces the tie-break rule used by [`merge`](Self::merge).
    pub fn with_tie_breaker(mut self, tie_breaker: Arc<dyn TieBreaker>) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    pub fn identity(&self) -> &Arc<EntityIdentity> {
        &self.identity
    }

    pub fn entity_type(&self) -> &'static str {
        self.identity.entity_type()
    }

    /// Number of envelopes, tombstones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All envelopes, tombstones included.
    pub fn iter(&self) -> impl Iterator<Item = &SyncEnvelope<T>> {
        self.slots.iter().map(|(_, envelope)| envelope)
    }

    /// Entities that are not deleted.
    pub fn entities(&self) -> impl Iterator<Item = &T> {
        self.iter()
            .filter(|envelope| !envelope.is_deleted())
            .map(SyncEnvelope::entity)
    }

    /// Identity key of `entity` under this set's identity.
    pub fn key_of(&self, entity: &T) -> SyncResult<IdentityKey> {
        Ok(self.identity.extract_identifiers(entity)?)
    }

    // ── Local changes ────────────────────────────────────────────

    /// Adds an unsynchronized envelope for `entity` unless one with the same
    /// identity already exists. Returns true if it was inserted.
    pub fn add(&mut self, entity: T) -> SyncResult<bool> {
        let key = self.key_of(&entity)?;
        if self.by_key.contains_key(key.fingerprint()) {
            debug!("Skipped add of existing {} {}", self.entity_type(), key);
            return Ok(false);
        }
        self.insert(key, SyncEnvelope::new(entity));
        Ok(true)
    }

    /// Replaces the payload of the envelope with `entity`'s identity and
    /// clears its tombstone. Returns false if there is no such envelope.
    pub fn update(&mut self, entity: T) -> SyncResult<bool> {
        let key = self.key_of(&entity)?;
        let Some(&pos) = self.by_key.get(key.fingerprint()) else {
            return Ok(false);
        };
        let envelope = &mut self.slots[pos].1;
        envelope.replace_entity(entity);
        envelope.restore();
        Ok(true)
    }

    /// Marks the envelope with `entity`'s identity as deleted. Returns false
    /// if there is no such envelope or it already is a tombstone.
    pub fn remove(&mut self, entity: &T) -> SyncResult<bool> {
        let key = self.key_of(entity)?;
        let Some(&pos) = self.by_key.get(key.fingerprint()) else {
            return Ok(false);
        };
        let envelope = &mut self.slots[pos].1;
        if envelope.is_deleted() {
            return Ok(false);
        }
        envelope.mark_deleted();
        debug!("Tombstoned local {} {}", self.entity_type(), key);
        Ok(true)
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn lookup_by_sync_id(&self, sync_id: &SyncId) -> Option<&SyncEnvelope<T>> {
        self.by_sync_id.get(sync_id).map(|&pos| &self.slots[pos].1)
    }

    pub fn lookup_by_key(&self, key: &IdentityKey) -> Option<&SyncEnvelope<T>> {
        self.by_key.get(key.fingerprint()).map(|&pos| &self.slots[pos].1)
    }

    /// Finds the envelope with the same identity as `entity`.
    pub fn lookup_by_entity(&self, entity: &T) -> SyncResult<Option<&SyncEnvelope<T>>> {
        let key = self.key_of(entity)?;
        Ok(self.lookup_by_key(&key))
    }

    // ── Reconciliation ───────────────────────────────────────────

    /// Merges a remote envelope into the set.
    ///
    /// Inserts it when no local envelope shares its identity; otherwise keeps
    /// whichever side wins [`SyncEnvelope::resolve`]. A winning remote
    /// deletion leaves a tombstone behind rather than removing the envelope.
    /// Merging the same envelope twice has the same effect as merging it once.
    ///
    /// When the remote `SyncId` is held by an envelope of another identity,
    /// the server has re-keyed that entity: a newer remote copy supersedes
    /// the old envelope, a stale one is ignored.
    pub fn merge(&mut self, remote: SyncEnvelope<T>) -> SyncResult<MergeOutcome> {
        let key = self.key_of(remote.entity())?;

        let mut rekeyed = None;
        if let Some(pos) = self.rekeyed_holder(&key, remote.sync_id()) {
            let resolution = self.slots[pos].1.resolve(&remote, self.tie_breaker.as_ref())?;
            if resolution.ordering == Ordering::Greater {
                debug!(
                    "Ignored stale re-keyed {} {}: local {} is newer",
                    self.entity_type(),
                    key,
                    self.slots[pos].0
                );
                return Ok(MergeOutcome {
                    action: MergeAction::KeptLocal,
                    resolved_by: Some(resolution.resolved_by),
                });
            }
            warn!(
                "{} {} re-keyed to {} by the server",
                self.entity_type(),
                self.slots[pos].0,
                key
            );
            self.slots.remove(pos);
            self.reindex();
            rekeyed = Some(resolution.resolved_by);
        }

        let Some(&pos) = self.by_key.get(key.fingerprint()) else {
            debug!("Inserted remote {} {}", self.entity_type(), key);
            self.insert(key, remote);
            return Ok(match rekeyed {
                Some(resolved_by) => MergeOutcome {
                    action: MergeAction::TookRemote,
                    resolved_by: Some(resolved_by),
                },
                None => MergeOutcome::inserted(),
            });
        };

        let local = &self.slots[pos].1;
        let resolution = local.resolve(&remote, self.tie_breaker.as_ref())?;
        let action = match resolution.ordering {
            Ordering::Equal => MergeAction::Unchanged,
            Ordering::Greater => MergeAction::KeptLocal,
            Ordering::Less if remote.is_deleted() && !local.is_deleted() => {
                MergeAction::Tombstoned
            }
            Ordering::Less => MergeAction::TookRemote,
        };

        if resolution.is_conflict() {
            warn!(
                "Conflicting copies of {} {}: tie broken by {:?}, {:?}",
                self.entity_type(),
                key,
                self.tie_breaker,
                action
            );
        } else {
            debug!("Merged {} {}: {:?}", self.entity_type(), key, action);
        }

        if resolution.ordering == Ordering::Less {
            self.replace_at(pos, remote);
        }

        Ok(MergeOutcome {
            action,
            resolved_by: Some(resolution.resolved_by),
        })
    }

    /// Decodes a remote record and merges it.
    ///
    /// Fails with [`SyncError::TypeMismatch`] when the record belongs to
    /// another entity type.
    pub fn merge_record(&mut self, record: &EnvelopeRecord) -> SyncResult<MergeOutcome> {
        let remote = SyncEnvelope::from_record(record)?;
        self.merge(remote)
    }

    /// Removes tombstones last synchronized strictly before `cutoff`.
    ///
    /// Live envelopes and tombstones that were never synchronized are always
    /// kept. Apart from re-keyed envelopes superseded in [`merge`](Self::merge),
    /// this is the only path that drops envelopes.
    pub fn purge_tombstones(&mut self, cutoff: HybridTimestamp) -> usize {
        let before = self.slots.len();
        self.slots.retain(|(_, envelope)| {
            !(envelope.is_deleted() && envelope.last_synced().is_some_and(|t| t < cutoff))
        });
        let purged = before - self.slots.len();
        if purged > 0 {
            self.reindex();
            debug!("Purged {} {} tombstones before {}", purged, self.entity_type(), cutoff);
        }
        purged
    }

    /// Envelopes the server has not confirmed since `since`: those without a
    /// `SyncId` and those last synchronized before it.
    pub fn pending_push(&self, since: HybridTimestamp) -> Vec<&SyncEnvelope<T>> {
        self.pending(since).map(|(_, envelope)| envelope).collect()
    }

    /// [`pending_push`](Self::pending_push) flattened into records, keyed by
    /// identity so outcomes can be acknowledged.
    pub fn pending_records(
        &self,
        since: HybridTimestamp,
    ) -> SyncResult<Vec<(IdentityKey, EnvelopeRecord)>> {
        self.pending(since)
            .map(|(key, envelope)| Ok((key.clone(), envelope.to_record()?)))
            .collect()
    }

    /// Marks the envelope with identity `key` as synchronized.
    ///
    /// `server_id` is adopted if the envelope has no `SyncId` yet and
    /// `server_time` becomes its `LastSynced`; without them a local id and
    /// clock are used. Returns the envelope's `SyncId`, or `None` if no
    /// envelope has that identity or `server_id` already belongs to another
    /// envelope.
    pub fn acknowledge(
        &mut self,
        key: &IdentityKey,
        server_id: Option<SyncId>,
        server_time: Option<HybridTimestamp>,
    ) -> Option<SyncId> {
        let pos = *self.by_key.get(key.fingerprint())?;
        let sync_id = self.slots[pos].1.sync_id().or(server_id);

        if let Some(id) = sync_id {
            if let Some(&holder) = self.by_sync_id.get(&id) {
                if holder != pos {
                    warn!(
                        "Not acknowledging {} {}: SyncId {} belongs to {}",
                        self.entity_type(),
                        key,
                        id,
                        self.slots[holder].0
                    );
                    return None;
                }
            }
        }

        let envelope = &mut self.slots[pos].1;
        let sync_id = match (sync_id, server_time) {
            (Some(id), Some(at)) => envelope.mark_synchronized_at(id, at),
            (None, Some(at)) => envelope.mark_synchronized_at(SyncId::new(), at),
            (Some(id), None) => envelope.mark_synchronized_with(id),
            (None, None) => envelope.mark_synchronized(),
        };
        self.by_sync_id.insert(sync_id, pos);
        Some(sync_id)
    }

    /// Latest `LastSynced` in the set, local acknowledgements included.
    pub fn high_water_mark(&self) -> Option<HybridTimestamp> {
        self.iter().filter_map(SyncEnvelope::last_synced).max()
    }

    /// Latest server stamp seen in a fetch; the cursor for the next one.
    ///
    /// Unlike [`high_water_mark`](Self::high_water_mark) this only moves on
    /// data the server returned, so records another client wrote while this
    /// client was pushing still fall at or after it.
    pub fn fetch_cursor(&self) -> Option<HybridTimestamp> {
        self.fetch_cursor
    }

    /// Moves the fetch cursor forward to `at`. Never moves it back.
    pub fn advance_fetch_cursor(&mut self, at: HybridTimestamp) {
        if self.fetch_cursor.is_none_or(|cursor| cursor < at) {
            self.fetch_cursor = Some(at);
        }
    }

    /// Snapshot of every envelope, tombstones included, for an external
    /// persistence component.
    pub fn to_records(&self) -> SyncResult<Vec<EnvelopeRecord>> {
        self.iter().map(SyncEnvelope::to_record).collect()
    }

    // ── Index maintenance ────────────────────────────────────────

    fn pending(
        &self,
        since: HybridTimestamp,
    ) -> impl Iterator<Item = &(IdentityKey, SyncEnvelope<T>)> {
        self.slots.iter().filter(move |(_, envelope)| {
            !envelope.is_synchronized() || envelope.last_synced().is_none_or(|t| t < since)
        })
    }

    /// Position of the envelope holding `sync_id` under an identity other
    /// than `key`.
    fn rekeyed_holder(&self, key: &IdentityKey, sync_id: Option<SyncId>) -> Option<usize> {
        let pos = *self.by_sync_id.get(&sync_id?)?;
        (self.slots[pos].0 != *key).then_some(pos)
    }

    fn insert(&mut self, key: IdentityKey, envelope: SyncEnvelope<T>) {
        let pos = self.slots.len();
        self.by_key.insert(key.fingerprint().to_string(), pos);
        if let Some(sync_id) = envelope.sync_id() {
            self.by_sync_id.insert(sync_id, pos);
        }
        self.slots.push((key, envelope));
    }

    fn replace_at(&mut self, pos: usize, envelope: SyncEnvelope<T>) {
        let previous = self.slots[pos].1.sync_id();
        let next = envelope.sync_id();
        if previous != next {
            if let Some(old) = previous {
                self.by_sync_id.remove(&old);
            }
            if let Some(new) = next {
                self.by_sync_id.insert(new, pos);
            }
        }
        self.slots[pos].1 = envelope;
    }

    fn reindex(&mut self) {
        self.by_key.clear();
        self.by_sync_id.clear();
        for (pos, (key, envelope)) in self.slots.iter().enumerate() {
            self.by_key.insert(key.fingerprint().to_string(), pos);
            if let Some(sync_id) = envelope.sync_id() {
                self.by_sync_id.insert(sync_id, pos);
            }
        }
    }
}
