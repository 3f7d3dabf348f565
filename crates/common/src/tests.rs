use super::*;
use std::io;

#[test]
fn engine_config_defaults_are_sane() {
    let cfg = EngineConfig::default();
    assert!(cfg.wal_enabled);
    assert_eq!(cfg.deadlock_timeout_ms, 50);
    assert_eq!(cfg.default_max_attempts, 1);
    assert_eq!(cfg.default_retry_delay_ms, 50);
}

#[test]
fn builder_overrides_defaults() {
    let cfg = EngineConfig::builder()
        .data_dir(PathBuf::from("/tmp/cb"))
        .deadlock_timeout_ms(25)
        .build();
    assert_eq!(cfg.data_dir, PathBuf::from("/tmp/cb"));
    assert_eq!(cfg.deadlock_timeout_ms, 25);
    assert!(cfg.wal_enabled);
}

#[test]
fn store_error_formats_cleanly() {
    let err = StoreError::Storage("corruption".into());
    assert!(format!("{err}").contains("corruption"));
    assert!(matches!(
        StoreError::TransactionClosed,
        StoreError::TransactionClosed
    ));
}

#[test]
fn unindexed_field_formats_the_field_name() {
    let err = StoreError::UnindexedField("year".into());
    assert!(format!("{err}").contains("year"));
}

#[test]
fn io_error_converts() {
    let e = io::Error::other("oops");
    let store_err: StoreError = e.into();
    assert!(matches!(store_err, StoreError::Io(_)));
}
