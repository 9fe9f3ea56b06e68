//! Tests for engine configuration loading and validation.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use memorabilia::{
    ENV_MODE, ENV_RPC_URL, ENV_TORII_URL, ENV_WORLD_ADDRESS, EngineConfig, ExecutionMode,
    ReceiptSchema,
};
use tempfile::NamedTempFile;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn test_empty_toml_uses_defaults() {
    let config = EngineConfig::from_toml("").expect("parse");
    assert_eq!(config, EngineConfig::default());
    assert_eq!(*config.mode(), ExecutionMode::Local);
    assert_eq!(config.player_id(), "local-player");
    assert_eq!(*config.leaderboard_capacity(), 100);
    assert_eq!(*config.timing().preview(), Duration::from_secs(3));
    assert_eq!(*config.timing().mismatch_settle(), Duration::from_secs(1));
    assert_eq!(
        *config.confirmation_policy().timeout(),
        Duration::from_secs(60)
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_toml_file_overrides_fields() {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(
        file,
        r#"
mode = "remote"
player_id = "0xabc"
display_name = "Ada"
rpc_url = "https://rpc.example"
world_address = "0xworld"
receipt_schema = "legacy"
preview_ms = 1500
push_backoff_initial_ms = 250
"#
    )
    .expect("write");

    let config = EngineConfig::from_file(file.path()).expect("load");
    assert_eq!(*config.mode(), ExecutionMode::Remote);
    assert_eq!(*config.receipt_schema(), ReceiptSchema::Legacy);
    assert_eq!(config.identity().display_name(), "Ada");
    assert_eq!(*config.timing().preview(), Duration::from_millis(1500));
    assert_eq!(*config.backoff_policy().initial(), Duration::from_millis(250));
    assert_eq!(*config.backoff_policy().max(), Duration::from_secs(30));
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_is_error() {
    assert!(EngineConfig::from_file("/nonexistent/memorabilia.toml").is_err());
}

#[test]
fn test_malformed_toml_is_error() {
    assert!(EngineConfig::from_toml("preview_ms = \"soon\"").is_err());
}

#[test]
fn test_overrides_replace_endpoints_and_mode() {
    let config = EngineConfig::default()
        .apply_overrides(lookup(&[
            (ENV_MODE, "Remote"),
            (ENV_RPC_URL, "https://rpc.example"),
            (ENV_TORII_URL, "https://torii.example"),
            (ENV_WORLD_ADDRESS, "0xworld"),
        ]))
        .expect("overrides");
    assert_eq!(*config.mode(), ExecutionMode::Remote);
    assert_eq!(config.rpc_url().as_deref(), Some("https://rpc.example"));
    assert_eq!(config.torii_url().as_deref(), Some("https://torii.example"));
    assert_eq!(config.world_address().as_deref(), Some("0xworld"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_unknown_mode_override_is_error() {
    let err = EngineConfig::default()
        .apply_overrides(lookup(&[(ENV_MODE, "offline")]))
        .expect_err("bad mode");
    assert!(err.message.contains("offline"));
}

#[test]
fn test_remote_mode_requires_endpoints() {
    let config = EngineConfig::default().with_mode(ExecutionMode::Remote);
    let err = config.validate().expect_err("missing rpc_url");
    assert!(err.message.contains("rpc_url"));

    let config = config
        .apply_overrides(lookup(&[(ENV_RPC_URL, "https://rpc.example")]))
        .expect("overrides");
    let err = config.validate().expect_err("missing world_address");
    assert!(err.message.contains("world_address"));
}

#[test]
fn test_zero_capacity_is_invalid() {
    let config = EngineConfig::from_toml("leaderboard_capacity = 0").expect("parse");
    assert!(config.validate().is_err());
}

#[test]
fn test_store_path_override() {
    let config = EngineConfig::default().with_store_path(":memory:");
    assert_eq!(config.store_path(), ":memory:");
}
