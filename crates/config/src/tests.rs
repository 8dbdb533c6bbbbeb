use std::io::Write;

use crate::*;

#[test]
fn test_default_config_is_valid() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.dispatch.batch_size, 10);
    assert_eq!(config.dispatch.delay_between_batches_ms, 1000);
    assert_eq!(config.dispatch.max_attempts, 3);
    assert_eq!(config.dispatch.default_message, DEFAULT_LAUNCH_MESSAGE);
    assert!(config.channels.sms.is_none());
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = AppConfig::from_toml(
        r#"
        [dispatch]
        batch_size = 25
        delay_between_batches_ms = 2000

        [channels.email]
        endpoint = "https://relay.example.com/email"
        api_key = "key-123"
        subject = "We are live"
        "#,
    )
    .unwrap();

    assert_eq!(config.dispatch.batch_size, 25);
    assert_eq!(config.dispatch.delay_between_batches_ms, 2000);
    assert_eq!(config.dispatch.max_attempts, 3);
    let email = config.channels.email.unwrap();
    assert!(email.has_credentials());
    assert_eq!(email.subject.as_deref(), Some("We are live"));
}

#[test]
fn test_invalid_values_are_rejected() {
    assert!(AppConfig::from_toml("[dispatch]\nbatch_size = 0").is_err());
    assert!(AppConfig::from_toml("[dispatch]\nmax_attempts = 0").is_err());
    assert!(AppConfig::from_toml("[logging]\nlevel = \"loud\"").is_err());
    assert!(AppConfig::from_toml("[database]\nurl = \"postgres://localhost/db\"").is_err());
    assert!(AppConfig::from_toml("[channels.sms]\nendpoint = \"ftp://relay\"").is_err());
}

#[test]
fn test_missing_api_key_is_not_a_load_error() {
    let config = AppConfig::from_toml(
        r#"
        [channels.sms]
        endpoint = "https://relay.example.com/sms"
        "#,
    )
    .unwrap();
    assert!(!config.channels.sms.unwrap().has_credentials());
}

#[test]
fn test_load_from_file_with_env_override() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[dispatch]\nbatch_size = 5\n\n[logging]\nformat = \"json\""
    )
    .unwrap();

    std::env::set_var("NOTIFIER_TEST_LOAD_DISPATCH__MAX_ATTEMPTS", "7");
    let config = AppConfig::load_with_prefix(
        Some(file.path().to_str().unwrap()),
        "NOTIFIER_TEST_LOAD",
    )
    .unwrap();
    std::env::remove_var("NOTIFIER_TEST_LOAD_DISPATCH__MAX_ATTEMPTS");

    assert_eq!(config.dispatch.batch_size, 5);
    assert_eq!(config.dispatch.max_attempts, 7);
    assert_eq!(config.logging.format, "json");
}

#[test]
fn test_missing_config_file() {
    let result = AppConfig::load(Some("/definitely/not/here.toml"));
    assert!(result.is_err());
}

#[test]
fn test_toml_round_trip() {
    let config = AppConfig::default();
    let toml_str = config.to_toml().unwrap();
    let parsed = AppConfig::from_toml(&toml_str).unwrap();
    assert_eq!(parsed.dispatch.batch_size, config.dispatch.batch_size);
    assert_eq!(parsed.database.url, config.database.url);
}
