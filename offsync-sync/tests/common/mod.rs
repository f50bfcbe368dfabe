#![allow(dead_code)]

use offsync_model::{EntityTypeRegistry, HasIdentity};
use offsync_sync::{EnvelopeRecord, SyncEnvelope, SyncEnvelopeSet};
use offsync_types::{HybridTimestamp, SyncId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "OrderId")]
    pub order_id: u64,
    #[serde(rename = "Total")]
    pub total: u32,
}

impl HasIdentity for Order {
    const ENTITY_TYPE: &'static str = "Order";

    fn property_names() -> &'static [&'static str] {
        &["OrderId", "Total"]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku: String,
    pub name: String,
}

impl HasIdentity for Product {
    const ENTITY_TYPE: &'static str = "Product";

    fn property_names() -> &'static [&'static str] {
        &["sku", "name"]
    }

    fn key_properties() -> &'static [&'static str] {
        &["sku"]
    }
}

pub fn order(order_id: u64, total: u32) -> Order {
    Order { order_id, total }
}

pub fn order_set() -> SyncEnvelopeSet<Order> {
    SyncEnvelopeSet::new(&EntityTypeRegistry::new()).unwrap()
}

pub fn ts(wall_time: u64) -> HybridTimestamp {
    HybridTimestamp::new(wall_time, 0)
}

/// A synchronized envelope as the server would hand it out.
pub fn synced(entity: Order, sync_id: SyncId, last_synced: HybridTimestamp) -> SyncEnvelope<Order> {
    SyncEnvelope::from_parts(Some(sync_id), Some(last_synced), false, entity)
}

pub fn order_record(entity: &Order) -> EnvelopeRecord {
    EnvelopeRecord::new(Order::ENTITY_TYPE, serde_json::to_string(entity).unwrap())
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
