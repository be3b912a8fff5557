use super::*;
use std::io;

#[test]
fn config_defaults_are_sane() {
    let cfg = Config::default();
    assert_eq!(cfg.page_size, 4096);
    assert_eq!(cfg.record_size, 8);
    assert_eq!(cfg.buffer_pool_pages, 15);
    assert!(cfg.tail_policy.is_cumulative());
}

#[test]
fn config_builder_overrides_defaults() {
    let cfg = Config::builder()
        .page_size(1024)
        .record_size(4)
        .tail_policy(TailPolicy::Delta)
        .build();
    assert_eq!(cfg.capacity_per_page(), 256);
    assert!(!cfg.tail_policy.is_cumulative());
}

#[test]
fn config_derives_matching_rid_layout() {
    let cfg = Config::default();
    let layout = cfg.rid_layout();
    assert_eq!(layout.offset_bits(), 9);
}

#[test]
fn db_error_formats_cleanly() {
    let err = DbError::Storage("corruption".into());
    assert!(format!("{err}").contains("storage"));
}

#[test]
fn io_error_converts() {
    let e = io::Error::other("oops");
    let db_err: DbError = e.into();
    assert!(matches!(db_err, DbError::Io(_)));
}

#[test]
fn mock_clock_advances_monotonically_across_clones() {
    let clock = MockClock::new();
    let cloned = clock.clone();
    assert_eq!(clock.now_nanos(), 0);
    assert_eq!(cloned.now_nanos(), 1);
    assert_eq!(clock.now_nanos(), 2);
}

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock::new();
    let a = clock.now_nanos();
    let b = clock.now_nanos();
    assert!(b >= a);
}
