//! Single-slot, time-boxed cache over the trending-topics board.
//!
//! A read within the TTL of the last successful refresh returns the cached
//! payload without network I/O. Past the TTL a refresh is always attempted;
//! a failed or empty refresh yields `None` and the caller falls back to its
//! own data. The stale slot is kept but never served.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::warn;

use crate::config::CollectorConfig;
use crate::cover::normalize_cover_url;
use crate::store::{ranked_counts, NameCount};

pub const BAIDU_HOT_URL: &str = "https://top.baidu.com/api/board";
pub const DEFAULT_HOT_LABEL: &str = "百度热搜";
const HOT_LINK_BASE: &str = "https://www.baidu.com/";
const TOP_GROUPS: usize = 8;

/// One raw board entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotEntry {
    pub title: String,
    pub url: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotItem {
    pub title: String,
    pub url: String,
    pub source: String,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotPayload {
    pub ok: bool,
    pub mode: &'static str,
    pub ts: DateTime<Utc>,
    pub hot: Vec<HotItem>,
    pub sources: Vec<NameCount>,
}

/// External "current hot list" call.
#[async_trait]
pub trait HotListSource: Send + Sync {
    async fn fetch_hot(&self, limit: usize) -> Result<Vec<HotEntry>>;
}

/// Walk any JSON tree and collect objects carrying both `word` and `url`.
pub fn collect_board_entries(root: &Value) -> Vec<HotEntry> {
    fn as_text(v: Option<&Value>) -> String {
        match v {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string().trim().to_string(),
        }
    }

    fn walk(v: &Value, out: &mut Vec<HotEntry>) {
        match v {
            Value::Object(map) => {
                if map.contains_key("word") && map.contains_key("url") {
                    let title = as_text(map.get("word"));
                    let url = as_text(map.get("url"));
                    if !title.is_empty() && !url.is_empty() {
                        let label = ["labelTagName", "newHotName"]
                            .iter()
                            .filter_map(|k| map.get(*k).and_then(Value::as_str))
                            .map(str::trim)
                            .find(|s| !s.is_empty())
                            .unwrap_or(DEFAULT_HOT_LABEL);
                        out.push(HotEntry {
                            title: title.chars().take(500).collect(),
                            url,
                            label: label.chars().take(128).collect(),
                        });
                    }
                }
                for child in map.values() {
                    walk(child, out);
                }
            }
            Value::Array(items) => {
                for child in items {
                    walk(child, out);
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

/// Dedup by title (first wins), normalize links, cap, and aggregate labels.
pub fn build_payload(entries: Vec<HotEntry>, limit: usize, now: DateTime<Utc>) -> HotPayload {
    let mut seen = HashSet::new();
    let hot: Vec<HotItem> = entries
        .into_iter()
        .filter(|e| seen.insert(e.title.clone()))
        .take(limit.max(1))
        .map(|e| HotItem {
            url: normalize_cover_url(&e.url, HOT_LINK_BASE).unwrap_or(e.url),
            title: e.title,
            source: if e.label.trim().is_empty() {
                DEFAULT_HOT_LABEL.to_string()
            } else {
                e.label
            },
            collected_at: now,
        })
        .collect();
    let sources = ranked_counts(hot.iter().map(|h| h.source.clone()), TOP_GROUPS);
    HotPayload {
        ok: true,
        mode: "baidu_hot",
        ts: now,
        hot,
        sources,
    }
}

/// Baidu realtime board (`top.baidu.com/api/board`).
pub struct BaiduHotSource {
    client: reqwest::Client,
    endpoint: String,
    tab: String,
}

impl BaiduHotSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: BAIDU_HOT_URL.to_string(),
            tab: "realtime".to_string(),
        }
    }

    pub fn from_config(cfg: &CollectorConfig) -> Result<Self> {
        Ok(Self::new(cfg.http_client(cfg.hot_timeout_secs)?))
    }
}

#[async_trait]
impl HotListSource for BaiduHotSource {
    async fn fetch_hot(&self, limit: usize) -> Result<Vec<HotEntry>> {
        let resp = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::REFERER, "https://top.baidu.com/")
            .query(&[("platform", "wise"), ("tab", self.tab.as_str())])
            .send()
            .await
            .context("hot board get()")?
            .error_for_status()
            .context("hot board status")?;
        let text = resp.text().await.context("hot board .text()")?;
        let data: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        if data.get("success").and_then(Value::as_bool) != Some(true) {
            return Err(anyhow!("hot board answered without success flag"));
        }
        let root = data.get("data").cloned().unwrap_or(Value::Null);
        let mut entries = collect_board_entries(&root);
        let mut seen = HashSet::new();
        entries.retain(|e| seen.insert(e.title.clone()));
        entries.truncate(limit.max(1));
        Ok(entries)
    }
}

struct Slot {
    fetched_at: Instant,
    payload: HotPayload,
}

/// Single cached payload guarded by a mutex; share one instance per process.
pub struct HotTopicsCache {
    source: Arc<dyn HotListSource>,
    ttl: Duration,
    fetch_limit: usize,
    slot: Mutex<Option<Slot>>,
}

impl HotTopicsCache {
    pub fn new(source: Arc<dyn HotListSource>, ttl: Duration, fetch_limit: usize) -> Self {
        Self {
            source,
            ttl,
            fetch_limit,
            slot: Mutex::new(None),
        }
    }

    pub fn from_config(source: Arc<dyn HotListSource>, cfg: &CollectorConfig) -> Self {
        Self::new(source, cfg.hot_ttl(), cfg.hot_fetch_limit)
    }

    fn fresh(&self) -> Option<HotPayload> {
        let g = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        g.as_ref()
            .filter(|s| s.fetched_at.elapsed() < self.ttl)
            .map(|s| s.payload.clone())
    }

    /// Cached payload within the TTL, else a fresh fetch; None on failure.
    pub async fn get(&self) -> Option<HotPayload> {
        if let Some(p) = self.fresh() {
            counter!("hot_cache_hits_total").increment(1);
            return Some(p);
        }

        let entries = match self.source.fetch_hot(self.fetch_limit).await {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "hot", error = ?e, "hot list refresh failed");
                counter!("hot_fetch_errors_total").increment(1);
                Vec::new()
            }
        };
        if entries.is_empty() {
            return None;
        }

        let payload = build_payload(entries, self.fetch_limit, Utc::now());
        let mut g = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        *g = Some(Slot {
            fetched_at: Instant::now(),
            payload: payload.clone(),
        });
        Some(payload)
    }
}
