mod common;

use common::{Order, Product, order, order_record, synced, ts};
use offsync_sync::{
    PayloadDigest, PreferLocal, PreferRemote, ResolvedBy, SyncEnvelope, SyncError, TieBreaker,
};
use offsync_types::SyncId;
use pretty_assertions::assert_eq;
use std::cmp::Ordering;

// ── Sync state ───────────────────────────────────────────────────

#[test]
fn new_envelope_is_unsynchronized() {
    let envelope = SyncEnvelope::new(order(5, 10));
    assert_eq!(envelope.sync_id(), None);
    assert_eq!(envelope.last_synced(), None);
    assert!(!envelope.is_deleted());
    assert!(!envelope.is_synchronized());
    assert_eq!(envelope.entity(), &order(5, 10));
}

#[test]
fn mark_synchronized_assigns_id_once() {
    let mut envelope = SyncEnvelope::new(order(5, 10));

    let first = envelope.mark_synchronized();
    let first_synced = envelope.last_synced().unwrap();
    let second = envelope.mark_synchronized();
    let second_synced = envelope.last_synced().unwrap();

    assert_eq!(first, second);
    assert_eq!(envelope.sync_id(), Some(first));
    assert!(second_synced > first_synced);
}

#[test]
fn mark_synchronized_with_adopts_only_when_missing() {
    let server_id = SyncId::new();
    let mut fresh = SyncEnvelope::new(order(1, 1));
    assert_eq!(fresh.mark_synchronized_with(server_id), server_id);

    let existing = SyncId::new();
    let mut known = synced(order(2, 2), existing, ts(100));
    assert_eq!(known.mark_synchronized_with(server_id), existing);
    assert!(known.last_synced().unwrap() > ts(100));
}

#[test]
fn delete_and_restore() {
    let mut envelope = SyncEnvelope::new(order(5, 10));
    envelope.mark_deleted();
    assert!(envelope.is_deleted());
    envelope.restore();
    assert!(!envelope.is_deleted());
}

#[test]
fn into_entity_unwraps() {
    let envelope = SyncEnvelope::new(order(7, 3));
    assert_eq!(envelope.into_entity(), order(7, 3));
}

// ── Ordering ─────────────────────────────────────────────────────

#[test]
fn unsynchronized_local_wins() {
    let local = SyncEnvelope::new(order(5, 10));
    let remote = synced(order(5, 99), SyncId::new(), ts(1_000));

    let resolution = local.resolve(&remote, &PayloadDigest).unwrap();
    assert_eq!(resolution.ordering, Ordering::Greater);
    assert_eq!(resolution.resolved_by, ResolvedBy::NeverSynced);
    assert!(!resolution.is_conflict());
}

#[test]
fn unsynchronized_remote_wins() {
    let local = synced(order(5, 10), SyncId::new(), ts(1_000));
    let remote = SyncEnvelope::new(order(5, 99));
    assert_eq!(local.compare(&remote).unwrap(), Ordering::Less);
}

#[test]
fn later_last_synced_wins() {
    let id = SyncId::new();
    let older = synced(order(5, 10), id, ts(1_000));
    let newer = synced(order(5, 20), id, ts(2_000));

    let resolution = older.resolve(&newer, &PayloadDigest).unwrap();
    assert_eq!(resolution.ordering, Ordering::Less);
    assert_eq!(resolution.resolved_by, ResolvedBy::LastSynced);
    assert_eq!(newer.compare(&older).unwrap(), Ordering::Greater);
}

#[test]
fn identical_envelopes_compare_equal() {
    let id = SyncId::new();
    let a = synced(order(5, 10), id, ts(1_000));
    let b = a.clone();

    let resolution = a.resolve(&b, &PayloadDigest).unwrap();
    assert_eq!(resolution.ordering, Ordering::Equal);
    assert_eq!(resolution.resolved_by, ResolvedBy::Identical);
}

#[test]
fn two_unsynchronized_identical_payloads_are_equal() {
    let a = SyncEnvelope::new(order(5, 10));
    let b = SyncEnvelope::new(order(5, 10));
    assert_eq!(a.compare(&b).unwrap(), Ordering::Equal);
}

#[test]
fn tie_break_is_a_conflict() {
    let id = SyncId::new();
    let local = synced(order(5, 10), id, ts(1_000));
    let remote = synced(order(5, 11), id, ts(1_000));

    let resolution = local.resolve(&remote, &PayloadDigest).unwrap();
    assert_eq!(resolution.resolved_by, ResolvedBy::TieBreak);
    assert!(resolution.is_conflict());
    assert_ne!(resolution.ordering, Ordering::Equal);
}

#[test]
fn payload_digest_is_antisymmetric() {
    let id = SyncId::new();
    let a = synced(order(5, 10), id, ts(1_000));
    let b = synced(order(5, 11), id, ts(1_000));

    let ab = a.compare(&b).unwrap();
    let ba = b.compare(&a).unwrap();
    assert_eq!(ab, ba.reverse());
}

#[test]
fn tombstone_flag_breaks_identical_payloads() {
    let id = SyncId::new();
    let live = synced(order(5, 10), id, ts(1_000));
    let mut dead = live.clone();
    dead.mark_deleted();

    let resolution = live.resolve(&dead, &PayloadDigest).unwrap();
    assert_eq!(resolution.resolved_by, ResolvedBy::TieBreak);
}

#[test]
fn fixed_tie_breakers() {
    assert_eq!(PreferLocal.break_tie(b"a", b"b"), Ordering::Greater);
    assert_eq!(PreferRemote.break_tie(b"a", b"b"), Ordering::Less);

    let id = SyncId::new();
    let local = synced(order(5, 10), id, ts(1_000));
    let remote = synced(order(5, 11), id, ts(1_000));
    assert_eq!(
        local.resolve(&remote, &PreferRemote).unwrap().ordering,
        Ordering::Less
    );
    assert_eq!(
        local.resolve(&remote, &PreferLocal).unwrap().ordering,
        Ordering::Greater
    );
}

// ── Records ──────────────────────────────────────────────────────

#[test]
fn to_record_flattens_state() {
    let id = SyncId::new();
    let mut envelope = synced(order(5, 10), id, ts(1_000));
    envelope.mark_deleted();

    let record = envelope.to_record().unwrap();
    assert_eq!(record.entity_type, "Order");
    assert_eq!(record.sync_id, Some(id));
    assert_eq!(record.last_synced, Some(ts(1_000)));
    assert!(record.deleted);
    assert_eq!(record.payload, r#"{"OrderId":5,"Total":10}"#);

    assert_eq!(SyncEnvelope::<Order>::from_record(&record).unwrap(), envelope);
}

#[test]
fn from_record_rejects_other_types() {
    let record = order_record(&order(5, 10));
    let err = SyncEnvelope::<Product>::from_record(&record).unwrap_err();
    match err {
        SyncError::TypeMismatch { expected, found } => {
            assert_eq!(expected, "Product");
            assert_eq!(found, "Order");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn from_record_rejects_bad_payload() {
    let mut record = order_record(&order(5, 10));
    record.payload = "{not json".into();
    let err = SyncEnvelope::<Order>::from_record(&record).unwrap_err();
    assert!(matches!(err, SyncError::Serialization(_)));
    assert!(!err.is_retryable());
}
