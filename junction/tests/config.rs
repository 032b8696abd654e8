//! Loading configuration files.

use junction::{ConfigError, JunctionConfig};
use std::io::Write;
use std::time::Duration;

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[test]
fn partial_file_keeps_other_defaults() {
    let file = write_config(
        r#"{
            "endpoint": "engine.internal:9000",
            "modules": ["core", "store"],
            "worker_pool_size": 4,
            "reconnect": {"max_attempts": 3}
        }"#,
    );
    let config = JunctionConfig::from_path(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.endpoint, "engine.internal:9000");
    assert_eq!(config.modules, vec!["core", "store"]);
    assert_eq!(config.dispatch_config().worker_pool_size, 4);
    assert_eq!(
        config.dispatch_config().handler_timeout,
        Duration::from_secs(30)
    );
    let policy = config.reconnect_policy();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.initial_backoff, Duration::from_millis(250));
}

#[test]
fn configured_member_id_is_used() {
    let file = write_config(r#"{"member_id": "worker-7", "tags": ["eu"]}"#);
    let config = JunctionConfig::from_path(file.path()).unwrap();
    let stream = config.stream_config();
    assert_eq!(stream.member_id, "worker-7");
    assert_eq!(stream.tags, vec!["eu"]);
    assert_eq!(stream.drain_timeout, Duration::from_secs(10));
}

#[test]
fn malformed_file_reports_path() {
    let file = write_config("{ not json");
    let err = JunctionConfig::from_path(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains(&file.path().display().to_string()));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = JunctionConfig::from_path(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn explicit_path_wins_over_discovery() {
    let file = write_config(r#"{"log": {"filter": "debug", "json": true}}"#);
    let config = JunctionConfig::discover(Some(file.path())).unwrap();
    assert_eq!(config.log.filter, "debug");
    assert!(config.log.json);
}

#[test]
fn zero_timeouts_fail_validation() {
    let file = write_config(r#"{"handler_timeout_ms": 0}"#);
    let config = JunctionConfig::from_path(file.path()).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}
