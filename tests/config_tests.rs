//! Tests for configuration loading.

use std::fs;

use statement_gate::api::CredentialTransport;
use statement_gate::config::GateConfig;
use statement_gate::error::GateError;
use tempfile::TempDir;

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = GateConfig::load_from_path(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, GateConfig::default());
}

#[test]
fn file_values_override_defaults_and_keep_the_rest() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
base_url = "https://convert.example.com"
transport = "cookie"
intent_ttl_secs = 600
plans = ["starter", "team"]
"#,
    )
    .unwrap();

    let config = GateConfig::load_from_path(&path).unwrap();
    assert_eq!(config.base_url, "https://convert.example.com");
    assert_eq!(config.transport, CredentialTransport::Cookie);
    assert_eq!(config.intent_ttl(), chrono::Duration::minutes(10));
    assert!(config.is_known_plan("team"));
    assert!(!config.is_known_plan("business"));
    assert_eq!(config.login_path, "/login.html");
}

#[test]
fn malformed_file_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "base_url = [").unwrap();

    let err = GateConfig::load_from_path(&path).unwrap_err();
    assert!(matches!(err, GateError::Configuration(_)));
}

#[test]
fn env_overrides_win_over_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "namespace = \"file\"\n").unwrap();

    let config = GateConfig::load_from_path(&path)
        .unwrap()
        .with_env_overrides(|key| match key {
            "STATEMENT_GATE_NAMESPACE" => Some("env".to_string()),
            "STATEMENT_GATE_STATE_DIR" => Some("/tmp/gate-state".to_string()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.namespace, "env");
    assert_eq!(config.state_dir(), std::path::PathBuf::from("/tmp/gate-state"));
}

#[test]
fn unknown_transport_is_rejected() {
    let err = GateConfig::default()
        .with_env_overrides(|key| {
            (key == "STATEMENT_GATE_TRANSPORT").then(|| "carrier-pigeon".to_string())
        })
        .unwrap_err();
    assert!(err.to_string().contains("TRANSPORT"));
}

#[test]
fn empty_plan_list_is_rejected() {
    let err = GateConfig::builder()
        .plans(Vec::new())
        .build()
        .validate()
        .unwrap_err();
    assert!(matches!(err, GateError::Configuration(_)));
}

#[test]
fn huge_intent_ttl_does_not_overflow() {
    let config = GateConfig::builder().intent_ttl_secs(u64::MAX).build();
    assert!(config.intent_ttl() > chrono::Duration::days(365));
}
