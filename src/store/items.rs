// src/store/items.rs
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use super::{ranked_counts, ItemDto, ItemFields, NameCount, StoredItem};

const MAX_TITLE_CHARS: usize = 500;
const MAX_URL_CHARS: usize = 2048;
const MAX_SOURCE_CHARS: usize = 128;
const MAX_KEYWORD_CHARS: usize = 128;

/// Item persistence. Implementations keep exactly one row per `external_id`.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert-or-update keyed by `external_id`. Overwrites title, url, source,
    /// cover, published/collected timestamps and keyword; never touches `saved`.
    async fn upsert(&self, external_id: &str, fields: ItemFields) -> Result<StoredItem>;

    async fn get(&self, id: i64) -> Result<Option<StoredItem>>;

    /// Flag items as saved; returns how many distinct ids matched.
    async fn mark_saved(&self, ids: &[i64]) -> Result<usize>;

    async fn delete(&self, ids: &[i64]) -> Result<usize>;

    /// All saved items, newest `collected_at` first.
    async fn saved_items(&self) -> Result<Vec<StoredItem>>;
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[derive(Default)]
struct Inner {
    rows: BTreeMap<i64, StoredItem>,
    by_external: HashMap<String, i64>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemoryItemStore {
    inner: RwLock<Inner>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn upsert(&self, external_id: &str, fields: ItemFields) -> Result<StoredItem> {
        let mut g = self.inner.write().unwrap_or_else(|p| p.into_inner());
        let id = match g.by_external.get(external_id) {
            Some(id) => *id,
            None => {
                g.next_id += 1;
                let id = g.next_id;
                g.by_external.insert(external_id.to_string(), id);
                id
            }
        };

        let saved = g.rows.get(&id).map(|r| r.saved).unwrap_or(false);
        let source = truncate_chars(fields.source.trim(), MAX_SOURCE_CHARS);
        let row = StoredItem {
            id,
            external_id: external_id.to_string(),
            title: truncate_chars(fields.title.trim(), MAX_TITLE_CHARS),
            url: truncate_chars(fields.url.trim(), MAX_URL_CHARS),
            source: if source.is_empty() {
                "unknown".to_string()
            } else {
                source
            },
            cover_url: fields
                .cover_url
                .as_deref()
                .map(|c| truncate_chars(c.trim(), MAX_URL_CHARS))
                .filter(|c| !c.is_empty()),
            published_at: fields.published_at,
            collected_at: Utc::now(),
            keyword: truncate_chars(&fields.keyword, MAX_KEYWORD_CHARS),
            saved,
        };
        g.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: i64) -> Result<Option<StoredItem>> {
        let g = self.inner.read().unwrap_or_else(|p| p.into_inner());
        Ok(g.rows.get(&id).cloned())
    }

    async fn mark_saved(&self, ids: &[i64]) -> Result<usize> {
        let mut g = self.inner.write().unwrap_or_else(|p| p.into_inner());
        let ids: BTreeSet<i64> = ids.iter().copied().collect();
        let mut n = 0;
        for id in &ids {
            if let Some(row) = g.rows.get_mut(id) {
                row.saved = true;
                n += 1;
            }
        }
        Ok(n)
    }

    async fn delete(&self, ids: &[i64]) -> Result<usize> {
        let mut g = self.inner.write().unwrap_or_else(|p| p.into_inner());
        let ids: BTreeSet<i64> = ids.iter().copied().collect();
        let mut n = 0;
        for id in &ids {
            if let Some(row) = g.rows.remove(id) {
                g.by_external.remove(&row.external_id);
                n += 1;
            }
        }
        Ok(n)
    }

    async fn saved_items(&self) -> Result<Vec<StoredItem>> {
        let g = self.inner.read().unwrap_or_else(|p| p.into_inner());
        let mut out: Vec<StoredItem> = g.rows.values().filter(|r| r.saved).cloned().collect();
        out.sort_by(|a, b| b.collected_at.cmp(&a.collected_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }
}

/// One page of saved items matching a title/source substring.
#[derive(Debug, Clone, Serialize)]
pub struct SavedPage {
    pub items: Vec<ItemDto>,
    pub q: String,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

pub const SAVED_PAGE_SIZE: usize = 12;

pub async fn saved_page(store: &dyn ItemStore, q: &str, page: usize) -> Result<SavedPage> {
    let q = q.trim();
    let page = page.max(1);
    let matching: Vec<StoredItem> = store
        .saved_items()
        .await?
        .into_iter()
        .filter(|r| q.is_empty() || r.title.contains(q) || r.source.contains(q))
        .collect();
    let total = matching.len();
    // Offsets past the end (including overflow) yield an empty page.
    let offset = (page - 1).saturating_mul(SAVED_PAGE_SIZE);
    let items = matching
        .iter()
        .skip(offset)
        .take(SAVED_PAGE_SIZE)
        .map(ItemDto::from)
        .collect();
    Ok(SavedPage {
        items,
        q: q.to_string(),
        page,
        page_size: SAVED_PAGE_SIZE,
        total,
    })
}

/// Saved-item aggregates for the report overview.
#[derive(Debug, Clone, Serialize)]
pub struct SavedOverview {
    pub saved_total: usize,
    pub saved_sources_total: usize,
    pub saved_keywords_total: usize,
    pub top_sources: Vec<NameCount>,
    pub top_keywords: Vec<NameCount>,
}

pub async fn saved_overview(store: &dyn ItemStore) -> Result<SavedOverview> {
    let saved = store.saved_items().await?;
    let sources = ranked_counts(saved.iter().map(|r| r.source.clone()), usize::MAX);
    let keywords = ranked_counts(
        saved
            .iter()
            .filter(|r| !r.keyword.is_empty())
            .map(|r| r.keyword.clone()),
        usize::MAX,
    );
    Ok(SavedOverview {
        saved_total: saved.len(),
        saved_sources_total: sources.len(),
        saved_keywords_total: keywords.len(),
        top_sources: sources.into_iter().take(10).collect(),
        top_keywords: keywords.into_iter().take(12).collect(),
    })
}

/// Newest `n` saved items.
pub async fn recent_saved(store: &dyn ItemStore, n: usize) -> Result<Vec<ItemDto>> {
    Ok(store
        .saved_items()
        .await?
        .iter()
        .take(n)
        .map(ItemDto::from)
        .collect())
}

/// Saved items grouped by source, count desc.
pub async fn saved_source_counts(store: &dyn ItemStore, n: usize) -> Result<Vec<NameCount>> {
    let saved = store.saved_items().await?;
    Ok(ranked_counts(saved.iter().map(|r| r.source.clone()), n))
}
