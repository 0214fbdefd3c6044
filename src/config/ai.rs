// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_system_prompt() -> String {
    "你是政企舆情分析助手。".to_string()
}

/// OpenAI-compatible backend used by the report endpoint. Disabled or keyless
/// configs make the report fall back to the local analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl AiConfig {
    /// Resolve the "ENV" api key placeholder and fill blank fields with defaults.
    /// A missing OPENAI_API_KEY is only an error when the backend is enabled.
    pub fn resolve(mut self) -> anyhow::Result<Self> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match env::var("OPENAI_API_KEY") {
                Ok(k) => k,
                Err(_) if !self.enabled => String::new(),
                Err(_) => return Err(anyhow::anyhow!("Missing OPENAI_API_KEY env var")),
            };
        }
        self.api_key = self.api_key.trim().to_string();

        if self.base_url.trim().is_empty() {
            self.base_url = default_base_url();
        }
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if self.model.trim().is_empty() {
            self.model = default_model();
        }
        if self.system_prompt.trim().is_empty() {
            self.system_prompt = default_system_prompt();
        }
        Ok(self)
    }

    /// True when a remote call is worth attempting.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }
}
