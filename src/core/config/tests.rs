use super::data::{path_display, Config, SettingsOverrides};
use super::io::ConfigError;
use crate::core::models::DEFAULT_MODEL;
use crate::core::session::DEFAULT_BASE_URL;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
}

#[test]
fn test_load_config_values() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        "api_key = \"sk-file\"\nbase_url = \"https://proxy.example/v1\"\nmodel = \"grok-4.1\"\n",
    )
    .expect("Failed to write config");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config.api_key.as_deref(), Some("sk-file"));
    assert_eq!(config.base_url.as_deref(), Some("https://proxy.example/v1"));
    assert_eq!(config.model.as_deref(), Some("grok-4.1"));
}

#[test]
fn test_invalid_toml_reports_parse_error() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "api_key = [unterminated").expect("Failed to write config");

    let err = Config::load_from_path(&config_path).expect_err("parse should fail");

    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().starts_with("Failed to parse config at "));
}

#[test]
fn test_defaults_when_nothing_is_set() {
    let settings = Config::default()
        .resolve_settings(SettingsOverrides::default())
        .expect("resolve");

    assert_eq!(settings.api_key, "");
    assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    assert_eq!(settings.model, DEFAULT_MODEL);
    assert!(!settings.has_api_key());
}

#[test]
fn test_overrides_take_precedence_over_file() {
    let config = Config {
        api_key: Some("sk-file".to_string()),
        base_url: Some("https://file.example/v1".to_string()),
        model: Some("gpt-5.2".to_string()),
    };

    let settings = config
        .resolve_settings(SettingsOverrides {
            api_key: Some("sk-flag".to_string()),
            base_url: None,
            model: Some("doubao-pro-128k".to_string()),
        })
        .expect("resolve");

    assert_eq!(settings.api_key, "sk-flag");
    assert_eq!(settings.base_url, "https://file.example/v1");
    assert_eq!(settings.model, "doubao-pro-128k");
}

#[test]
fn test_blank_override_falls_back_to_file() {
    let config = Config {
        api_key: Some("sk-file".to_string()),
        ..Default::default()
    };

    let settings = config
        .resolve_settings(SettingsOverrides {
            api_key: Some("  ".to_string()),
            ..Default::default()
        })
        .expect("resolve");

    assert_eq!(settings.api_key, "sk-file");
}

#[test]
fn test_unknown_model_is_rejected() {
    let config = Config {
        model: Some("gpt-4o".to_string()),
        ..Default::default()
    };

    let err = config
        .resolve_settings(SettingsOverrides::default())
        .expect_err("unknown model");

    assert!(matches!(err, ConfigError::Model(_)));
    assert!(err.to_string().contains("gpt-4o"));
}

#[cfg(unix)]
#[test]
fn test_path_display_uses_tilde_for_home() {
    if let Some(home) = std::env::var_os("HOME") {
        let path = std::path::PathBuf::from(home).join(".config/studymate/config.toml");
        assert_eq!(path_display(&path), "~/.config/studymate/config.toml");
    }
}
