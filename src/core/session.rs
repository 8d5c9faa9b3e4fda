use crate::core::models::DEFAULT_MODEL;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for one interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl SessionSettings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}
