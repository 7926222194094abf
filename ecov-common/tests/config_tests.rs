//! Configuration resolution tests
//!
//! Tests that touch `ECOV_*` environment variables are marked `#[serial]`
//! so they never run in parallel with each other.

use ecov_common::config::{
    load_toml_config, load_toml_config_or_default, write_toml_config, ClientSettings,
    CompiledDefaults, ConfigOverrides, LoggingConfig, TomlConfig, DATABASE_FILE,
    DEFAULT_API_BASE_URL, ENV_API_URL, ENV_AUDIT_TIMEOUT_SECS, ENV_LOG_LEVEL,
    ENV_REMOTE_STORE_URL, ENV_ROOT_FOLDER,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

fn clear_env() {
    for name in [
        ENV_ROOT_FOLDER,
        ENV_API_URL,
        ENV_REMOTE_STORE_URL,
        ENV_AUDIT_TIMEOUT_SECS,
        ENV_LOG_LEVEL,
    ] {
        env::remove_var(name);
    }
}

#[test]
fn test_compiled_defaults() {
    let defaults = CompiledDefaults::for_current_platform();
    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(defaults.audit_timeout_secs, 90);
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn test_resolve_with_nothing_configured_uses_defaults() {
    clear_env();
    let settings = ClientSettings::resolve(&ConfigOverrides::default(), &TomlConfig::default());
    let defaults = CompiledDefaults::for_current_platform();
    assert_eq!(settings.root_folder, defaults.root_folder);
    assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
    assert_eq!(settings.remote_store_url, None);
    assert_eq!(settings.audit_timeout, Duration::from_secs(90));
    assert_eq!(settings.max_input_chars, 200);
    assert_eq!(settings.max_claim_chars, 2000);
    assert_eq!(settings.database_path(), defaults.root_folder.join(DATABASE_FILE));
}

#[test]
#[serial]
fn test_priority_cli_over_env_over_toml() {
    clear_env();
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        api_base_url: Some("http://toml.example/".to_string()),
        remote_store_url: Some("http://store.toml".to_string()),
        audit_timeout_secs: Some(30),
        ..Default::default()
    };

    let settings = ClientSettings::resolve(&ConfigOverrides::default(), &toml);
    assert_eq!(settings.root_folder, PathBuf::from("/from/toml"));
    assert_eq!(settings.api_base_url, "http://toml.example");
    assert_eq!(settings.audit_timeout, Duration::from_secs(30));

    env::set_var(ENV_ROOT_FOLDER, "/from/env");
    env::set_var(ENV_API_URL, "http://env.example");
    env::set_var(ENV_AUDIT_TIMEOUT_SECS, "45");
    let settings = ClientSettings::resolve(&ConfigOverrides::default(), &toml);
    assert_eq!(settings.root_folder, PathBuf::from("/from/env"));
    assert_eq!(settings.api_base_url, "http://env.example");
    assert_eq!(settings.remote_store_url.as_deref(), Some("http://store.toml"));
    assert_eq!(settings.audit_timeout, Duration::from_secs(45));

    let overrides = ConfigOverrides {
        root_folder: Some(PathBuf::from("/from/cli")),
        api_base_url: Some("http://cli.example".to_string()),
        ..Default::default()
    };
    let settings = ClientSettings::resolve(&overrides, &toml);
    assert_eq!(settings.root_folder, PathBuf::from("/from/cli"));
    assert_eq!(settings.api_base_url, "http://cli.example");

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_timeout_is_ignored() {
    clear_env();
    env::set_var(ENV_AUDIT_TIMEOUT_SECS, "soon");
    let settings = ClientSettings::resolve(&ConfigOverrides::default(), &TomlConfig::default());
    assert_eq!(settings.audit_timeout, Duration::from_secs(90));

    env::set_var(ENV_AUDIT_TIMEOUT_SECS, "0");
    let settings = ClientSettings::resolve(&ConfigOverrides::default(), &TomlConfig::default());
    assert_eq!(settings.audit_timeout, Duration::from_secs(90));
    clear_env();
}

#[test]
#[serial]
fn test_log_level_resolution() {
    clear_env();
    let toml = TomlConfig {
        logging: LoggingConfig {
            level: "warn".to_string(),
        },
        ..Default::default()
    };
    assert_eq!(ClientSettings::resolve(&ConfigOverrides::default(), &toml).log_level, "warn");

    env::set_var(ENV_LOG_LEVEL, "debug");
    assert_eq!(ClientSettings::resolve(&ConfigOverrides::default(), &toml).log_level, "debug");
    clear_env();
}

#[test]
fn test_toml_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/data/eco")),
        api_base_url: Some("http://localhost:8000".to_string()),
        remote_store_url: None,
        audit_timeout_secs: Some(120),
        max_input_chars: Some(80),
        max_claim_chars: None,
        logging: LoggingConfig::default(),
    };
    write_toml_config(&config, &path).unwrap();
    assert_eq!(load_toml_config(&path).unwrap(), config);
}

#[test]
fn test_partial_toml_uses_field_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "api_base_url = \"http://x\"\n").unwrap();
    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.api_base_url.as_deref(), Some("http://x"));
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.root_folder, None);
}

#[test]
fn test_missing_or_broken_toml_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    assert_eq!(load_toml_config_or_default(Some(&missing)), TomlConfig::default());

    let broken = dir.path().join("broken.toml");
    std::fs::write(&broken, "root_folder = [unterminated").unwrap();
    assert!(load_toml_config(&broken).is_err());
    assert_eq!(load_toml_config_or_default(Some(&broken)), TomlConfig::default());
}

#[test]
fn test_ensure_root_folder_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let settings = ClientSettings {
        root_folder: dir.path().join("profile"),
        api_base_url: DEFAULT_API_BASE_URL.to_string(),
        remote_store_url: None,
        audit_timeout: Duration::from_secs(90),
        max_input_chars: 200,
        max_claim_chars: 2000,
        log_level: "info".to_string(),
    };
    settings.ensure_root_folder().unwrap();
    assert!(settings.root_folder.is_dir());
}
