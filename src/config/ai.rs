// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "mixtral-8x7b-32768";

fn default_provider() -> String {
    "groq".to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// Completion endpoint settings (`[ai]` in the research config).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiConfig {
    /// "groq" | "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from GROQ_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Overrides the provider's default base URL (OpenAI-compatible).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AiConfig {
    pub fn sanitize(&mut self) {
        self.provider = self.provider.trim().to_lowercase();
        if self.model.trim().is_empty() {
            self.model = default_model();
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
    }

    /// Env var consulted when `api_key = "ENV"`.
    pub fn key_env_var(&self) -> Option<&'static str> {
        match self.provider.as_str() {
            "groq" => Some("GROQ_API_KEY"),
            "openai" => Some("OPENAI_API_KEY"),
            _ => None,
        }
    }

    /// Literal key, or the provider's env var when configured as "ENV".
    /// `None` when nothing usable is set.
    pub fn resolve_api_key(&self) -> Option<String> {
        let key = if self.api_key.trim().eq_ignore_ascii_case("env") {
            env::var(self.key_env_var()?).ok()?
        } else {
            self.api_key.clone()
        };
        let key = key.trim().to_string();
        (!key.is_empty()).then_some(key)
    }

    pub fn base_url(&self) -> String {
        let base = match (&self.base_url, self.provider.as_str()) {
            (Some(b), _) if !b.trim().is_empty() => b.trim().to_string(),
            (_, "openai") => OPENAI_BASE_URL.to_string(),
            _ => GROQ_BASE_URL.to_string(),
        };
        base.trim_end_matches('/').to_string()
    }
}
