// src/store/mod.rs
//! In-process collaborators the collector calls through: item storage with
//! content-addressed upsert, the crawler source registry and the keyword
//! usage counter. Each sits behind a trait so a database-backed version can
//! replace the in-memory one without touching the job code.

pub mod items;
pub mod keywords;
pub mod sources;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use items::{InMemoryItemStore, ItemStore};
pub use keywords::{InMemoryKeywordCounter, KeywordCounter, KeywordUsage};
pub use sources::{CrawlerSource, InMemorySourceRegistry, SourceRegistry};

/// Stable storage key for a url: UUIDv5 in the URL namespace, hex without dashes.
pub fn content_hash(url: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, url.as_bytes())
        .simple()
        .to_string()
}

/// Mutable fields written by one observation of a url.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFields {
    pub title: String,
    pub url: String,
    pub source: String,
    pub cover_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub keyword: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub source: String,
    pub cover_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub keyword: String,
    pub saved: bool,
}

/// Wire shape of an item (SSE `item` events and JSON APIs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDto {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub source: String,
    pub cover_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub keyword: String,
    pub saved: bool,
}

impl From<&StoredItem> for ItemDto {
    fn from(s: &StoredItem) -> Self {
        Self {
            id: s.id,
            title: s.title.clone(),
            url: s.url.clone(),
            source: s.source.clone(),
            cover_url: s.cover_url.clone(),
            published_at: s.published_at,
            collected_at: s.collected_at,
            keyword: s.keyword.clone(),
            saved: s.saved,
        }
    }
}

/// `{name, value}` pair used by the summary and overview payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCount {
    pub name: String,
    pub value: usize,
}

/// Group `labels` by value, order by count desc then label asc, keep `top`.
pub fn ranked_counts<I, S>(labels: I, top: usize) -> Vec<NameCount>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for l in labels {
        *counts.entry(l.into()).or_insert(0) += 1;
    }
    let mut out: Vec<NameCount> = counts
        .into_iter()
        .map(|(name, value)| NameCount { name, value })
        .collect();
    out.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    out.truncate(top);
    out
}
