//! Configuration Module Tests
//!
//! Tests for `ClientConfig` loading and its use by the client builder.

use command_core::test_utils::MockTransport;
use command_core::{ClientConfig, ConfigError, ServiceClient};
use serde_json::json;
use std::io::Write;

#[test]
fn config_has_expected_defaults() {
    let config = ClientConfig::default();

    assert_eq!(config.name, "service-client");
    assert_eq!(config.pool_size, 25);
    assert!(config.http_errors);
    assert!(config.defaults.is_empty());
    assert_eq!(config.event_channel_capacity, 1000);
}

#[test]
fn config_loads_from_json_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{"name": "catalog", "http_errors": false, "defaults": {{"tenant": 42}}}}"#
    )
    .unwrap();

    let config = ClientConfig::from_file(file.path()).expect("json config should load");

    assert_eq!(config.name, "catalog");
    assert!(!config.http_errors);
    assert_eq!(config.pool_size, 25);
    assert_eq!(config.defaults.get("tenant"), Some(&json!(42)));
}

#[test]
fn config_rejects_zero_pool_size() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "pool_size = 0").unwrap();

    let error = ClientConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(
        error,
        ConfigError::InvalidValue {
            field: "pool_size",
            ..
        }
    ));
}

#[test]
fn config_missing_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let error = ClientConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(error, ConfigError::Load(_)));
}

#[test]
fn builder_validates_configuration() {
    let config = ClientConfig {
        event_channel_capacity: 0,
        ..ClientConfig::default()
    };
    let result = ServiceClient::builder(MockTransport::new()).config(config).build();
    assert!(result.is_err());
}

#[test]
fn client_exposes_configuration_tree() {
    let mut config = ClientConfig::default();
    config.defaults.insert("region".to_string(), json!("us-east-1"));
    let client = ServiceClient::builder(MockTransport::new())
        .config(config)
        .build()
        .unwrap();

    assert_eq!(client.config_value("pool_size"), Some(&json!(25)));
    assert_eq!(client.config_value("defaults/region"), Some(&json!("us-east-1")));
    assert_eq!(client.config_value("defaults/missing"), None);
}
