//! Offline entity cache synchronization for offsync.
//!
//! Keeps a local cache of entities in step with a remote source of truth
//! while the client works offline.
//!
//! # Architecture
//!
//! Every cached entity is wrapped in a [`SyncEnvelope`] carrying its sync
//! state: a server-stable [`SyncId`](offsync_types::SyncId), the time of its
//! last successful reconciliation and a tombstone flag. Envelopes of one
//! entity type live in a [`SyncEnvelopeSet`], indexed by entity identity and
//! by `SyncId`.
//!
//! ## Components
//!
//! - **Envelope**: sync metadata plus the ordering used to pick a winner
//! - **Set**: per-type envelope collection with merge and tombstone handling
//! - **Protocol**: flat records exchanged with the server
//! - **Remote**: abstracts over the server behind an async trait
//! - **Session**: drives one reconciliation pass
//!
//! ## Sync Process
//!
//! 1. **Fetch**: Pull the server's envelopes changed since the last server stamp seen
//! 2. **Merge**: Fold each one into the local set; the winner of each pair is kept
//! 3. **Push**: Send envelopes the server has not confirmed in batches
//! 4. **Acknowledge**: Mark accepted envelopes synchronized, report rejected ones
//!
//! # Example
//!
//! ```
//! use offsync_model::{EntityTypeRegistry, HasIdentity};
//! use offsync_sync::{MergeAction, SyncEnvelope, SyncEnvelopeSet};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Order {
//!     #[serde(rename = "OrderId")]
//!     order_id: u64,
//!     total: u32,
//! }
//!
//! impl HasIdentity for Order {
//!     const ENTITY_TYPE: &'static str = "Order";
//!
//!     fn property_names() -> &'static [&'static str] {
//!         &["OrderId", "total"]
//!     }
//! }
//!
//! let registry = EntityTypeRegistry::new();
//! let mut orders = SyncEnvelopeSet::<Order>::new(&registry)?;
//! orders.add(Order { order_id: 5, total: 10 })?;
//!
//! let outcome = orders.merge(SyncEnvelope::new(Order { order_id: 6, total: 3 }))?;
//! assert_eq!(outcome.action, MergeAction::Inserted);
//! assert_eq!(orders.len(), 2);
//! # Ok::<(), offsync_sync::SyncError>(())
//! ```

mod envelope;
mod error;
pub mod protocol;
pub mod remote;
mod session;
mod set;

pub use envelope::{
    PayloadDigest, PreferLocal, PreferRemote, Resolution, ResolvedBy, SyncEnvelope, TieBreaker,
};
pub use error::{SyncError, SyncResult};
pub use protocol::{EnvelopeRecord, MAX_BATCH_SIZE, PushOutcome};
pub use remote::RemoteSource;
pub use session::{
    RejectedEnvelope, SessionConfig, SessionReport, SessionState, SharedEnvelopeSet, SyncSession,
};
pub use set::{MergeAction, MergeOutcome, SyncEnvelopeSet};
