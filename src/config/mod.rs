// src/config/mod.rs
pub mod ai;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ai::AiConfig;

pub const DEFAULT_COLLECTOR_CONFIG_PATH: &str = "config/collector.toml";
pub const ENV_COLLECTOR_CONFIG_PATH: &str = "COLLECTOR_CONFIG_PATH";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_accept_language() -> String {
    "zh-CN,zh;q=0.9".to_string()
}
fn default_source_timeout_secs() -> u64 {
    12
}
fn default_gdelt_timeout_secs() -> u64 {
    15
}
fn default_cover_timeout_secs() -> u64 {
    10
}
fn default_hot_timeout_secs() -> u64 {
    12
}
fn default_pacing_ms() -> u64 {
    120
}
fn default_cover_cache_capacity() -> usize {
    800
}
fn default_hot_ttl_secs() -> u64 {
    30
}
fn default_hot_fetch_limit() -> usize {
    30
}
fn default_limit() -> u32 {
    10
}
/// Hard upper bound for per-job item limits.
pub const LIMIT_CEILING: u32 = 50;

fn default_max_limit() -> u32 {
    LIMIT_CEILING
}

/// Runtime knobs for adapters, caches and job pacing.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,
    #[serde(default = "default_gdelt_timeout_secs")]
    pub gdelt_timeout_secs: u64,
    #[serde(default = "default_cover_timeout_secs")]
    pub cover_timeout_secs: u64,
    #[serde(default = "default_hot_timeout_secs")]
    pub hot_timeout_secs: u64,
    /// Delay between streamed items of one job.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_cover_cache_capacity")]
    pub cover_cache_capacity: usize,
    #[serde(default = "default_hot_ttl_secs")]
    pub hot_ttl_secs: u64,
    #[serde(default = "default_hot_fetch_limit")]
    pub hot_fetch_limit: usize,
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
    #[serde(default)]
    pub ai: AiConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            source_timeout_secs: default_source_timeout_secs(),
            gdelt_timeout_secs: default_gdelt_timeout_secs(),
            cover_timeout_secs: default_cover_timeout_secs(),
            hot_timeout_secs: default_hot_timeout_secs(),
            pacing_ms: default_pacing_ms(),
            cover_cache_capacity: default_cover_cache_capacity(),
            hot_ttl_secs: default_hot_ttl_secs(),
            hot_fetch_limit: default_hot_fetch_limit(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            ai: AiConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Load from an explicit TOML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading collector config from {}", path.display()))?;
        Self::parse(&content)
    }

    /// Load using env var + fallback:
    /// 1) $COLLECTOR_CONFIG_PATH (must exist)
    /// 2) config/collector.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_COLLECTOR_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!(
                "COLLECTOR_CONFIG_PATH points to non-existent path"
            ));
        }
        let default_p = PathBuf::from(DEFAULT_COLLECTOR_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default())
    }

    pub fn parse(s: &str) -> Result<Self> {
        let cfg: CollectorConfig = toml::from_str(s).context("parsing collector config toml")?;
        cfg.sanitized()
    }

    fn sanitized(mut self) -> Result<Self> {
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        self.max_limit = self.max_limit.clamp(1, LIMIT_CEILING);
        self.default_limit = self.default_limit.clamp(1, self.max_limit);
        self.cover_cache_capacity = self.cover_cache_capacity.max(1);
        self.hot_fetch_limit = self.hot_fetch_limit.max(1);
        for t in [
            &mut self.source_timeout_secs,
            &mut self.gdelt_timeout_secs,
            &mut self.cover_timeout_secs,
            &mut self.hot_timeout_secs,
        ] {
            if *t == 0 {
                *t = default_source_timeout_secs();
            }
        }
        self.ai = self.ai.resolve()?;
        Ok(self)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn hot_ttl(&self) -> Duration {
        Duration::from_secs(self.hot_ttl_secs)
    }

    /// Shared reqwest client with browser-like headers.
    pub fn http_client(&self, timeout_secs: u64) -> Result<reqwest::Client> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(v) = reqwest::header::HeaderValue::from_str(&self.accept_language) {
            headers.insert(reqwest::header::ACCEPT_LANGUAGE, v);
        }
        reqwest::Client::builder()
            .user_agent(self.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("building reqwest client")
    }
}
