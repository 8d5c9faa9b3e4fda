use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::config::io::ConfigError;
use crate::core::models::{resolve_model, DEFAULT_MODEL};
use crate::core::session::{SessionSettings, DEFAULT_BASE_URL};

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bearer token for the completions endpoint
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL (e.g., "https://api.openai.com/v1")
    pub base_url: Option<String>,
    /// One of the offered model names; a unique prefix is accepted
    pub model: Option<String>,
}

/// Values supplied on the command line or through the environment. Each one
/// takes precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct SettingsOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl Config {
    pub fn resolve_settings(
        &self,
        overrides: SettingsOverrides,
    ) -> Result<SessionSettings, ConfigError> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let api_key = non_empty(overrides.api_key)
            .or_else(|| non_empty(self.api_key.clone()))
            .unwrap_or_default();
        let base_url = non_empty(overrides.base_url)
            .or_else(|| non_empty(self.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = match non_empty(overrides.model).or_else(|| non_empty(self.model.clone())) {
            Some(requested) => resolve_model(&requested).map_err(ConfigError::Model)?,
            None => DEFAULT_MODEL,
        };

        Ok(SessionSettings {
            api_key: api_key.trim().to_string(),
            base_url,
            model: model.to_string(),
        })
    }
}

/// Get a user-friendly display string for a path, using `~` for the home
/// directory on Unix-like systems.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
