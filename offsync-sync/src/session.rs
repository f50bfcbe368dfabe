//! Sync session: one fetch / merge / push pass for one entity type.
//!
//! ```text
//! Idle -> Fetching -> Merging -> Pushing -> Idle
//!            |           |          |
//!            +-----------+----------+--> Failed
//! ```
//!
//! Each step finishes before the next starts. Remote calls and the wait for
//! the set's lock are bounded by `SessionConfig::timeout_ms` and are never
//! retried here. Cancellation is
//! checked at every transition; work already applied stays applied.

use crate::envelope::SyncEnvelope;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{EnvelopeRecord, MAX_BATCH_SIZE, PushOutcome};
use crate::remote::RemoteSource;
use crate::set::{MergeAction, MergeOutcome, SyncEnvelopeSet};
use offsync_model::{HasIdentity, IdentityKey};
use offsync_types::{HybridTimestamp, SyncId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for sync sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout for each remote call and for acquiring the set (ms).
    pub timeout_ms: u64,
    /// Maximum records per push call.
    pub batch_size: usize,
    /// When set, a successful pass purges tombstones last synchronized more
    /// than this long (ms) before the session started.
    pub tombstone_retention_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            batch_size: MAX_BATCH_SIZE,
            tombstone_retention_ms: None,
        }
    }
}

/// Where a session is in its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Fetching,
    Merging,
    Pushing,
    Failed,
}

/// A pushed envelope the server refused. It stays pending locally.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEnvelope {
    pub key: IdentityKey,
    pub sync_id: Option<SyncId>,
    pub reason: String,
}

/// What one successful pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub entity_type: String,
    pub started_at: HybridTimestamp,
    /// Records returned by the fetch.
    pub fetched: usize,
    pub inserted: usize,
    pub unchanged: usize,
    pub kept_local: usize,
    pub took_remote: usize,
    pub tombstoned: usize,
    /// Identities whose winner was picked by the tie-breaker.
    pub conflicts: Vec<IdentityKey>,
    /// Pushed records the server accepted and the set acknowledged.
    pub accepted: usize,
    pub rejected: Vec<RejectedEnvelope>,
    /// Accepted records whose acknowledgement could not be applied locally.
    /// They stay pending.
    pub unacknowledged: Vec<IdentityKey>,
    /// Tombstones dropped by the retention policy.
    pub purged: usize,
}

impl SessionReport {
    fn new(entity_type: &str, started_at: HybridTimestamp) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            started_at,
            fetched: 0,
            inserted: 0,
            unchanged: 0,
            kept_local: 0,
            took_remote: 0,
            tombstoned: 0,
            conflicts: Vec::new(),
            accepted: 0,
            rejected: Vec::new(),
            unacknowledged: Vec::new(),
            purged: 0,
        }
    }

    fn record_merge(&mut self, key: IdentityKey, outcome: MergeOutcome) {
        match outcome.action {
            MergeAction::Inserted => self.inserted += 1,
            MergeAction::Unchanged => self.unchanged += 1,
            MergeAction::KeptLocal => self.kept_local += 1,
            MergeAction::TookRemote => self.took_remote += 1,
            MergeAction::Tombstoned => self.tombstoned += 1,
        }
        if outcome.is_conflict() {
            self.conflicts.push(key);
        }
    }
}

/// An envelope set that sessions can claim.
///
/// The mutex serializes access to the set; the active flag makes a second
/// session fail immediately instead of queueing behind the first.
#[derive(Debug)]
pub struct SharedEnvelopeSet<T> {
    set: Mutex<SyncEnvelopeSet<T>>,
    entity_type: &'static str,
    active: AtomicBool,
}

impl<T: HasIdentity> SharedEnvelopeSet<T> {
    pub fn new(set: SyncEnvelopeSet<T>) -> Self {
        Self {
            entity_type: set.entity_type(),
            set: Mutex::new(set),
            active: AtomicBool::new(false),
        }
    }

    /// Locks the set. Waits while a session is running.
    pub async fn lock(&self) -> MutexGuard<'_, SyncEnvelopeSet<T>> {
        self.set.lock().await
    }

    /// Whether a session currently holds the set.
    pub fn is_session_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn into_inner(self) -> SyncEnvelopeSet<T> {
        self.set.into_inner()
    }

    fn begin_session(&self) -> SyncResult<SessionLease<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::SessionAlreadyActive {
                entity_type: self.entity_type.to_string(),
            })?;
        Ok(SessionLease {
            active: &self.active,
        })
    }
}

struct SessionLease<'a> {
    active: &'a AtomicBool,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Drives reconciliation passes for one envelope set against a remote source.
pub struct SyncSession<T> {
    set: Arc<SharedEnvelopeSet<T>>,
    remote: Arc<dyn RemoteSource>,
    config: SessionConfig,
    state: SessionState,
    cancel: CancellationToken,
}

impl<T: HasIdentity> SyncSession<T> {
    pub fn new(
        set: Arc<SharedEnvelopeSet<T>>,
        remote: Arc<dyn RemoteSource>,
        config: SessionConfig,
    ) -> Self {
        Self {
            set,
            remote,
            config,
            state: SessionState::Idle,
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A token that cancels this session from another task. Cancellation is
    /// permanent: later passes stop at their first transition.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Runs one pass.
    ///
    /// Fails with [`SyncError::SessionAlreadyActive`] without touching the
    /// set if another session holds it. Fails with [`SyncError::Timeout`] if
    /// a non-session caller keeps the set locked past `timeout_ms`. Every
    /// failure other than `SessionAlreadyActive` leaves the session in
    /// [`SessionState::Failed`]; merges and acknowledgements made before the
    /// failure are kept.
    pub async fn run(&mut self) -> SyncResult<SessionReport> {
        let shared = Arc::clone(&self.set);
        let _lease = shared.begin_session()?;
        let Ok(mut set) = tokio::time::timeout(self.timeout(), shared.lock()).await else {
            warn!("Timed out waiting for the {} set to be released", shared.entity_type);
            self.state = SessionState::Failed;
            return Err(SyncError::Timeout);
        };

        let started_at = HybridTimestamp::now();
        let mut report = SessionReport::new(set.entity_type(), started_at);
        info!("Starting sync of {} ({} cached)", set.entity_type(), set.len());

        match self.reconcile(&mut set, started_at, &mut report).await {
            Ok(()) => {
                self.state = SessionState::Idle;
                info!(
                    "Synced {}: fetched {}, pushed {}/{}, {} conflicts",
                    report.entity_type,
                    report.fetched,
                    report.accepted,
                    report.accepted + report.rejected.len() + report.unacknowledged.len(),
                    report.conflicts.len()
                );
                Ok(report)
            }
            Err(e) => {
                warn!("Sync of {} failed while {:?}: {}", report.entity_type, self.state, e);
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    async fn reconcile(
        &mut self,
        set: &mut SyncEnvelopeSet<T>,
        started_at: HybridTimestamp,
        report: &mut SessionReport,
    ) -> SyncResult<()> {
        let entity_type = set.entity_type();

        self.transition(SessionState::Fetching)?;
        let since = set.fetch_cursor();
        let records = self
            .bounded(self.remote.fetch_envelopes(entity_type, since))
            .await?;
        report.fetched = records.len();
        debug!("Fetched {} {} records since {:?}", records.len(), entity_type, since);

        self.transition(SessionState::Merging)?;
        for record in &records {
            let remote = SyncEnvelope::<T>::from_record(record)?;
            let key = set.key_of(remote.entity())?;
            let outcome = set.merge(remote)?;
            report.record_merge(key, outcome);
        }
        if let Some(latest) = records.iter().filter_map(|r| r.last_synced).max() {
            set.advance_fetch_cursor(latest);
        }

        self.transition(SessionState::Pushing)?;
        let pending = set.pending_records(started_at)?;
        for chunk in pending.chunks(self.config.batch_size.max(1)) {
            let batch: Vec<EnvelopeRecord> =
                chunk.iter().map(|(_, record)| record.clone()).collect();
            let outcomes = self
                .bounded(self.remote.push_envelopes(entity_type, batch))
                .await?;
            if outcomes.len() != chunk.len() {
                return Err(SyncError::Protocol(format!(
                    "pushed {} {} records but got {} outcomes",
                    chunk.len(),
                    entity_type,
                    outcomes.len()
                )));
            }

            for ((key, record), outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    PushOutcome::Accepted {
                        sync_id,
                        last_synced,
                    } => {
                        if set.acknowledge(key, sync_id, last_synced).is_some() {
                            report.accepted += 1;
                        } else {
                            warn!("Could not acknowledge accepted {} {}", entity_type, key);
                            report.unacknowledged.push(key.clone());
                        }
                    }
                    PushOutcome::Rejected { reason } => {
                        warn!("Server rejected {} {}: {}", entity_type, key, reason);
                        report.rejected.push(RejectedEnvelope {
                            key: key.clone(),
                            sync_id: record.sync_id,
                            reason,
                        });
                    }
                }
            }
        }

        if let Some(retention) = self.config.tombstone_retention_ms {
            report.purged = set.purge_tombstones(started_at.saturating_sub_millis(retention));
        }

        Ok(())
    }

    fn transition(&mut self, next: SessionState) -> SyncResult<()> {
        if self.cancel.is_cancelled() {
            info!("Sync cancelled before {:?}", next);
            return Err(SyncError::Cancelled);
        }
        debug!("Sync session {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    async fn bounded<R>(&self, call: impl Future<Output = SyncResult<R>>) -> SyncResult<R> {
        tokio::time::timeout(self.timeout(), call)
            .await
            .unwrap_or(Err(SyncError::Timeout))
    }
}
