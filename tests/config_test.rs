//! Unit tests for config.rs module

use std::fs;
use std::time::Duration;

use contact_messenger::config::AppConfig;
use tempfile::tempdir;

#[test]
fn test_default_config_values() {
    let config = AppConfig::default();

    assert_eq!(config.api.base_url, "http://localhost:5000/api");
    assert_eq!(config.api.request_timeout_secs, 30);
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
}

#[test]
fn test_default_polling_config() {
    let config = AppConfig::default();

    assert_eq!(config.polling.conversation_interval(), Duration::from_secs(2));
    assert_eq!(config.polling.unread_interval(), Duration::from_secs(30));
    assert_eq!(config.polling.clock_interval(), Duration::from_secs(5));
}

#[test]
fn test_default_logging_config() {
    let config = AppConfig::default();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.file_path, None);
    assert_eq!(config.logging.format, "text");
    assert_eq!(config.log_file(), None);
}

#[test]
fn test_config_validation_success() {
    assert!(AppConfig::default().validate().is_ok());
}

#[test]
fn test_config_validation_bad_base_url() {
    let mut config = AppConfig::default();
    config.api.base_url = "not a url".to_string();
    assert!(config.validate().is_err());

    config.api.base_url = "ftp://example.com/api".to_string();
    assert!(config.validate().is_err());

    config.api.base_url = "https://contacts.example.com/api".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_zero_values() {
    let mut config = AppConfig::default();
    config.api.request_timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.polling.conversation_interval_secs = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.polling.unread_interval_secs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_logging() {
    let mut config = AppConfig::default();
    config.logging.level = "verbose".to_string();
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_load_from_file_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("client.toml");
    fs::write(
        &path,
        r#"
[api]
base_url = "https://contacts.example.com/api"

[polling]
conversation_interval_secs = 3

[session]
token_path = "/tmp/contact-token"
"#,
    )
    .unwrap();

    let config = AppConfig::load_from(Some(&path)).unwrap();
    assert_eq!(config.api.base_url, "https://contacts.example.com/api");
    assert_eq!(config.api.request_timeout_secs, 30);
    assert_eq!(config.polling.conversation_interval_secs, 3);
    assert_eq!(config.polling.unread_interval_secs, 30);
    assert_eq!(config.session.token_path.as_deref(), Some("/tmp/contact-token"));
}

#[test]
fn test_load_from_file_rejects_invalid_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("client.toml");
    fs::write(&path, "[polling]\nclock_interval_secs = 0\n").unwrap();

    assert!(AppConfig::load_from(Some(&path)).is_err());
}

#[test]
fn test_config_serialization_round_trip() {
    let config = AppConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    let back: AppConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.api.base_url, config.api.base_url);
    assert_eq!(back.polling.clock_interval_secs, 5);
}
