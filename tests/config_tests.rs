//! Configuration loading tests against real files on disk

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use ingest_watch::config::WatchConfig;
use ingest_watch::error::ErrorCode;

/// Tests that touch INGEST_WATCH_* env vars serialize on this lock so the
/// parallel test runner cannot interleave them.
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Write `content` into a temp config file and load it through the
/// public API.
fn load_from(content: &str) -> (TempDir, ingest_watch::Result<WatchConfig>) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.toml");
    fs::write(&path, content).unwrap();
    let result = WatchConfig::load(path.to_str());
    (tmp, result)
}

#[test]
fn test_full_config_loads() {
    let (_tmp, result) = load_from(
        r#"
[server]
url = "wss://kb.example.com/api/ws/upload"

[subscription]
keepalive_interval_ms = 20000
reconnect_delay_ms = 1500
max_reconnect_attempts = 3
connect_timeout_ms = 5000

[logging]
level = "debug"
json_format = true
"#,
    );
    let config = result.unwrap();

    assert_eq!(config.server.url, "wss://kb.example.com/api/ws/upload");
    assert_eq!(config.subscription.keepalive_interval_ms, 20_000);
    assert_eq!(config.subscription.reconnect_delay_ms, 1_500);
    assert_eq!(config.subscription.max_reconnect_attempts, 3);
    assert_eq!(config.subscription.connect_timeout_ms, 5_000);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);
}

#[test]
fn test_sparse_config_falls_back_to_defaults() {
    let (_tmp, result) = load_from(
        r#"
[server]
url = "ws://10.0.0.5:8000/api/ws/upload"
"#,
    );
    let config = result.unwrap();

    assert_eq!(config.server.url, "ws://10.0.0.5:8000/api/ws/upload");
    assert_eq!(config.subscription.keepalive_interval_ms, 25_000);
    assert_eq!(config.subscription.reconnect_delay_ms, 3_000);
    assert_eq!(config.subscription.max_reconnect_attempts, 5);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_explicit_path_must_exist() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let err = WatchConfig::load(missing.to_str()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConfigNotFound);
    assert!(err.to_string().contains("nope.toml"));
}

#[test]
fn test_broken_toml_reports_parse_error() {
    let (_tmp, result) = load_from("this is not [valid toml");
    assert_eq!(result.unwrap_err().code(), ErrorCode::ConfigParse);
}

#[test]
fn test_http_scheme_fails_validation() {
    let (_tmp, result) = load_from(
        r#"
[server]
url = "http://kb.example.com/api/ws/upload"
"#,
    );
    assert_eq!(result.unwrap_err().code(), ErrorCode::ConfigValidation);
}

#[test]
fn test_zero_keepalive_fails_validation() {
    let (_tmp, result) = load_from(
        r#"
[subscription]
keepalive_interval_ms = 0
"#,
    );
    assert_eq!(result.unwrap_err().code(), ErrorCode::ConfigValidation);
}

#[test]
fn test_env_var_beats_file_value() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("INGEST_WATCH_LOG_FILE", "/tmp/from-env.log");
    let (_tmp, result) = load_from(
        r#"
[logging]
file = "/tmp/from-file.log"
"#,
    );
    std::env::remove_var("INGEST_WATCH_LOG_FILE");

    let config = result.unwrap();
    assert_eq!(config.logging.file.as_deref(), Some("/tmp/from-env.log"));
}

#[test]
fn test_loaded_values_reach_the_subscription_client() {
    let (_tmp, result) = load_from(
        r#"
[subscription]
reconnect_delay_ms = 500
max_reconnect_attempts = 1
"#,
    );
    let config = result.unwrap();
    let sub = config.subscription_config();

    assert_eq!(sub.reconnect.max_attempts, 1);
    assert_eq!(sub.reconnect.delay.as_millis(), 500);
    assert_eq!(sub.base_url, config.server.url);
}

#[test]
fn test_tilde_in_log_path_is_expanded() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("INGEST_WATCH_LOG_FILE", "~/ingest-watch.log");
    let (_tmp, result) = load_from("");
    std::env::remove_var("INGEST_WATCH_LOG_FILE");

    let config = result.unwrap();
    let file = config.logging.file.unwrap();
    assert!(!file.starts_with('~'), "path was not expanded: {}", file);
    assert!(Path::new(&file).is_absolute());
}
