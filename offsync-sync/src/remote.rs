//! Remote data source abstraction.
//!
//! The session talks to the server only through [`RemoteSource`], so any
//! backend (HTTP API, message bus, another process) can serve as the source
//! of truth. Retry policy is the caller's business; implementations report
//! failures as [`SyncError::Network`](crate::SyncError::Network) or
//! [`SyncError::Protocol`](crate::SyncError::Protocol).

use crate::error::SyncResult;
use crate::protocol::{EnvelopeRecord, PushOutcome};
use async_trait::async_trait;
use offsync_types::HybridTimestamp;

/// The server side of a synchronization pass.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Returns the server's envelopes of `entity_type` last synchronized at
    /// or after `since` (all of them when `since` is `None`). The cursor is
    /// inclusive; merging a record twice is harmless.
    async fn fetch_envelopes(
        &self,
        entity_type: &str,
        since: Option<HybridTimestamp>,
    ) -> SyncResult<Vec<EnvelopeRecord>>;

    /// Stores `records` and returns exactly one outcome per record, in order.
    async fn push_envelopes(
        &self,
        entity_type: &str,
        records: Vec<EnvelopeRecord>,
    ) -> SyncResult<Vec<PushOutcome>>;
}

/// An in-memory remote source for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use offsync_types::SyncId;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    type RejectFn = dyn Fn(&EnvelopeRecord) -> Option<String> + Send + Sync;

    #[derive(Default)]
    struct ServerState {
        records: HashMap<String, Vec<EnvelopeRecord>>,
        clock: Option<HybridTimestamp>,
    }

    impl ServerState {
        /// Next server stamp, strictly after every stamp handed out so far.
        fn stamp(&mut self) -> HybridTimestamp {
            let next = self.clock.map_or_else(HybridTimestamp::now, |clock| clock.tick());
            self.clock = Some(next);
            next
        }

        fn observe(&mut self, at: HybridTimestamp) {
            if self.clock.is_none_or(|clock| clock < at) {
                self.clock = Some(at);
            }
        }

        fn store(&mut self, record: EnvelopeRecord) {
            let stored = self.records.entry(record.entity_type.clone()).or_default();
            match stored.iter_mut().find(|r| r.sync_id == record.sync_id) {
                Some(existing) => *existing = record,
                None => stored.push(record),
            }
        }
    }

    /// A server that keeps records per entity type, keyed by `SyncId`.
    ///
    /// Pushed records without a `SyncId` are filed under a fresh one, and
    /// every stored record is stamped with the server clock. The clock never
    /// hands out the same stamp twice, so a fetch cursor taken from stored
    /// stamps never skips a later write.
    #[derive(Default)]
    pub struct MockRemote {
        state: Mutex<ServerState>,
        latency: Option<Duration>,
        fetch_failure: Mutex<Option<SyncError>>,
        push_failure: Mutex<Option<SyncError>>,
        reject: Option<Box<RejectFn>>,
        fetch_calls: AtomicUsize,
        push_calls: AtomicUsize,
    }

    impl MockRemote {
        /// Creates an empty mock server.
        pub fn new() -> Self {
            Self::default()
        }

        /// Delays every call by `latency`.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Rejects every pushed record for which `reject` returns a reason.
        pub fn with_rejections(
            mut self,
            reject: impl Fn(&EnvelopeRecord) -> Option<String> + Send + Sync + 'static,
        ) -> Self {
            self.reject = Some(Box::new(reject));
            self
        }

        /// Stores a record as if another client had pushed it. Records
        /// without a `SyncId` get one; the record is stored as given otherwise
        /// and the server clock catches up with its stamp.
        pub async fn seed(&self, mut record: EnvelopeRecord) -> SyncId {
            let sync_id = *record.sync_id.get_or_insert_with(SyncId::new);
            let mut state = self.state.lock().await;
            if let Some(at) = record.last_synced {
                state.observe(at);
            }
            state.store(record);
            sync_id
        }

        /// Everything stored for `entity_type`.
        pub async fn records(&self, entity_type: &str) -> Vec<EnvelopeRecord> {
            self.state
                .lock()
                .await
                .records
                .get(entity_type)
                .cloned()
                .unwrap_or_default()
        }

        /// Makes the next fetch fail with `error`.
        pub async fn fail_next_fetch(&self, error: SyncError) {
            *self.fetch_failure.lock().await = Some(error);
        }

        /// Makes the next push fail with `error`.
        pub async fn fail_next_push(&self, error: SyncError) {
            *self.push_failure.lock().await = Some(error);
        }

        pub fn fetch_calls(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }

        pub fn push_calls(&self) -> usize {
            self.push_calls.load(Ordering::SeqCst)
        }

        async fn delay(&self) {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
        }
    }

    #[async_trait]
    impl RemoteSource for MockRemote {
        async fn fetch_envelopes(
            &self,
            entity_type: &str,
            since: Option<HybridTimestamp>,
        ) -> SyncResult<Vec<EnvelopeRecord>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.delay().await;
            if let Some(error) = self.fetch_failure.lock().await.take() {
                return Err(error);
            }

            Ok(self
                .records(entity_type)
                .await
                .into_iter()
                .filter(|r| match (since, r.last_synced) {
                    (Some(since), Some(at)) => at >= since,
                    _ => true,
                })
                .collect())
        }

        async fn push_envelopes(
            &self,
            entity_type: &str,
            records: Vec<EnvelopeRecord>,
        ) -> SyncResult<Vec<PushOutcome>> {
            self.push_calls.fetch_add(1, Ordering::SeqCst);
            self.delay().await;
            if let Some(error) = self.push_failure.lock().await.take() {
                return Err(error);
            }

            let mut state = self.state.lock().await;
            let mut outcomes = Vec::with_capacity(records.len());
            for mut record in records {
                if record.entity_type != entity_type {
                    outcomes.push(PushOutcome::rejected(format!(
                        "record of type `{}` pushed as `{entity_type}`",
                        record.entity_type
                    )));
                    continue;
                }
                if let Some(reason) = self.reject.as_ref().and_then(|reject| reject(&record)) {
                    outcomes.push(PushOutcome::rejected(reason));
                    continue;
                }

                let sync_id = *record.sync_id.get_or_insert_with(SyncId::new);
                let stamp = state.stamp();
                record.last_synced = Some(stamp);
                state.store(record);
                outcomes.push(PushOutcome::accepted_at(sync_id, stamp));
            }
            Ok(outcomes)
        }
    }
}
