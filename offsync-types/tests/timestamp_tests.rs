use offsync_types::HybridTimestamp;
use proptest::prelude::*;

// ── Construction ─────────────────────────────────────────────────

#[test]
fn now_has_zero_logical() {
    let ts = HybridTimestamp::now();
    assert_eq!(ts.logical(), 0);
    assert!(ts.wall_time() > 0);
}

#[test]
fn new_from_components() {
    let ts = HybridTimestamp::new(42, 7);
    assert_eq!(ts.wall_time(), 42);
    assert_eq!(ts.logical(), 7);
}

// ── Ordering ─────────────────────────────────────────────────────

#[test]
fn ordering_by_wall_time() {
    assert!(HybridTimestamp::new(100, 9) < HybridTimestamp::new(200, 0));
}

#[test]
fn ordering_by_logical_when_wall_time_equal() {
    assert!(HybridTimestamp::new(100, 0) < HybridTimestamp::new(100, 1));
}

#[test]
fn is_before_and_after() {
    let a = HybridTimestamp::new(1, 0);
    let b = HybridTimestamp::new(2, 0);
    assert!(a.is_before(&b));
    assert!(b.is_after(&a));
    assert!(!a.is_after(&a));
    assert!(!a.is_before(&a));
}

// ── tick ─────────────────────────────────────────────────────────

#[test]
fn tick_from_future_timestamp_bumps_logical() {
    let future = HybridTimestamp::new(u64::MAX / 2, 3);
    let next = future.tick();
    assert_eq!(next.wall_time(), future.wall_time());
    assert_eq!(next.logical(), 4);
}

#[test]
fn tick_from_past_timestamp_uses_wall_clock() {
    let past = HybridTimestamp::new(1, 99);
    let next = past.tick();
    assert!(next.wall_time() > 1);
    assert_eq!(next.logical(), 0);
}

#[test]
fn saturating_sub_clamps_at_epoch() {
    let ts = HybridTimestamp::new(10, 2);
    assert_eq!(ts.saturating_sub_millis(4), HybridTimestamp::new(6, 2));
    assert_eq!(ts.saturating_sub_millis(40).wall_time(), 0);
}

#[test]
fn display_shows_both_components() {
    assert_eq!(HybridTimestamp::new(1500, 2).to_string(), "1500.2");
}

#[test]
fn parses_display_form() {
    let ts: HybridTimestamp = "1500.2".parse().unwrap();
    assert_eq!(ts, HybridTimestamp::new(1500, 2));
    assert_eq!(ts.to_string().parse::<HybridTimestamp>().unwrap(), ts);
}

#[test]
fn rejects_malformed_timestamps() {
    for input in ["", "1500", "1500.", ".2", "a.b", "1500.2.1"] {
        let err = input.parse::<HybridTimestamp>().unwrap_err();
        assert!(matches!(err, offsync_types::Error::InvalidTimestamp(_)), "{input}");
    }
}

#[test]
fn serde_roundtrip() {
    let ts = HybridTimestamp::new(123, 4);
    let json = serde_json::to_string(&ts).unwrap();
    let back: HybridTimestamp = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ts);
}

proptest! {
    #[test]
    fn tick_is_strictly_monotonic(wall in 0u64..u64::MAX / 2, logical in 0u32..u32::MAX - 1) {
        let ts = HybridTimestamp::new(wall, logical);
        prop_assert!(ts.tick() > ts);
    }
}
