// src/store/sources.rs
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// A configured crawler source. `kind` is the raw type tag; tags without an
/// adapter are skipped by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlerSource {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub enabled: bool,
}

#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// Enabled sources in registry order. Empty `ids` means every enabled source.
    async fn enabled_sources(&self, ids: &[i64]) -> Result<Vec<CrawlerSource>>;

    async fn all(&self) -> Result<Vec<CrawlerSource>>;
}

pub struct InMemorySourceRegistry {
    rows: RwLock<Vec<CrawlerSource>>,
}

impl InMemorySourceRegistry {
    pub fn new(rows: Vec<CrawlerSource>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Registry seeded with the three built-in sources (Baidu off by default).
    pub fn with_defaults() -> Self {
        let reg = Self::new(Vec::new());
        reg.ensure("Google 新闻 RSS", "google_news_rss", true);
        reg.ensure("GDELT 全球媒体", "gdelt", true);
        reg.ensure("百度搜索", "baidu", false);
        reg
    }

    /// Add a source unless one with the same type tag already exists.
    pub fn ensure(&self, name: &str, kind: &str, enabled: bool) -> i64 {
        let mut rows = self.rows.write().unwrap_or_else(|p| p.into_inner());
        if let Some(existing) = rows.iter().find(|s| s.kind == kind) {
            return existing.id;
        }
        let id = rows.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        rows.push(CrawlerSource {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
            enabled,
        });
        id
    }

    /// Flip `enabled`; returns the new state, or None for an unknown id.
    pub fn toggle(&self, id: i64) -> Option<bool> {
        let mut rows = self.rows.write().unwrap_or_else(|p| p.into_inner());
        let row = rows.iter_mut().find(|s| s.id == id)?;
        row.enabled = !row.enabled;
        Some(row.enabled)
    }
}

#[async_trait]
impl SourceRegistry for InMemorySourceRegistry {
    async fn enabled_sources(&self, ids: &[i64]) -> Result<Vec<CrawlerSource>> {
        let rows = self.rows.read().unwrap_or_else(|p| p.into_inner());
        Ok(rows
            .iter()
            .filter(|s| s.enabled && (ids.is_empty() || ids.contains(&s.id)))
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<CrawlerSource>> {
        Ok(self.rows.read().unwrap_or_else(|p| p.into_inner()).clone())
    }
}
