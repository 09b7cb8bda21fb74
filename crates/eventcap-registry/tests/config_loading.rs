//! Integration tests for building a registry from a TOML config file.

use std::io::Write;

use eventcap_core::{CaptureError, ConsolePolicy, Filter};
use eventcap_registry::{load_config, ConfigError, Registry};
use serde_json::json;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn registry_from_config_file() {
    let file = write_config(
        r#"
        [defaults]
        limit = 2
        console = "error"

        [[streams]]
        name = "http"

        [[streams]]
        name = "audit"
        limit = 0
        enabled = false
        "#,
    );
    let path = file.path().to_str().expect("utf-8 path");
    let config = load_config(Some(path)).expect("config loads");
    let mut registry = Registry::from_config(&config).expect("streams build");

    assert_eq!(registry.names(), vec!["audit".to_string(), "http".to_string()]);

    let http = registry.require("http").expect("http exists");
    assert_eq!(http.lock().limit(), 2);
    assert_eq!(http.lock().console(), ConsolePolicy::Error);

    let audit = registry.require("audit").expect("audit exists");
    assert_eq!(audit.lock().limit(), 0);
    assert!(!audit.lock().is_enabled());

    for seq in 0..4 {
        registry.info("http", json!({ "seq": seq }));
    }
    assert!(registry.info("audit", json!({"ignored": true})).is_none());
    assert_eq!(registry.query("http", &Filter::new()).expect("query").len(), 2);

    // Streams created later still pick up the configured defaults.
    registry.log("late", json!({"x": 1}));
    let late = registry.require("late").expect("late exists");
    assert_eq!(late.lock().limit(), 2);
}

#[test]
fn invalid_stream_options_fail_registry_build() {
    let file = write_config(
        r#"
        [[streams]]
        name = "bad"
        limit = "many"
        "#,
    );
    let path = file.path().to_str().expect("utf-8 path");
    let config = load_config(Some(path)).expect("toml is well formed");

    assert!(matches!(
        Registry::from_config(&config),
        Err(CaptureError::InvalidConfig(_))
    ));
}

#[test]
fn stream_without_name_fails_registry_build() {
    let file = write_config(
        r#"
        [[streams]]
        limit = 5
        "#,
    );
    let path = file.path().to_str().expect("utf-8 path");
    let config = load_config(Some(path)).expect("toml is well formed");

    assert!(matches!(
        Registry::from_config(&config),
        Err(CaptureError::InvalidName(_))
    ));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_config("[[streams]\nname = ");
    let path = file.path().to_str().expect("utf-8 path");

    assert!(matches!(load_config(Some(path)), Err(ConfigError::Parse(_))));
}

#[test]
fn directory_path_is_a_read_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().to_str().expect("utf-8 path");

    assert!(matches!(load_config(Some(path)), Err(ConfigError::FileRead(_))));
}
