use super::helpers::open;
use crate::engine::{EngineError, InvalidKeyError};
use tempfile::TempDir;

#[test]
fn set__key_with_space_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let engine = open(tmp.path());

    let err = engine.set(b"has space", b"v").unwrap_err();
    assert!(matches!(err, EngineError::InvalidKey(InvalidKeyError)));
    assert_eq!(engine.stats().unwrap().live_keys, 0);
}

#[test]
fn set__key_with_newline_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let engine = open(tmp.path());

    let err = engine.set(b"has\nnewline", b"v").unwrap_err();
    assert!(matches!(err, EngineError::InvalidKey(InvalidKeyError)));
}

#[test]
fn delete__key_with_newline_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let engine = open(tmp.path());

    let err = engine.delete(b"has\nnewline").unwrap_err();
    assert!(matches!(err, EngineError::InvalidKey(InvalidKeyError)));
}

#[test]
fn set__value_may_contain_spaces() {
    let tmp = TempDir::new().unwrap();
    let engine = open(tmp.path());

    engine.set(b"k", b"value with spaces").unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(b"value with spaces".to_vec()));
}

#[test]
fn set__empty_value_round_trips() {
    let tmp = TempDir::new().unwrap();
    let engine = open(tmp.path());

    engine.set(b"k", b"").unwrap();
    assert_eq!(engine.get(b"k").unwrap(), Some(Vec::new()));
}

#[test]
fn set__record_exceeding_max_len_is_rejected() {
    use crate::engine::{Engine, EngineConfig};
    use std::time::Duration;

    let tmp = TempDir::new().unwrap();
    let config = EngineConfig {
        compaction_interval: Duration::from_secs(3600),
        deletion_interval: Duration::from_secs(3600),
        max_record_len: 8,
        ..EngineConfig::default()
    };
    let engine = Engine::open(tmp.path(), config).unwrap();

    let err = engine.set(b"toolongkey", b"v").unwrap_err();
    assert!(matches!(err, EngineError::Log(_)));
}
