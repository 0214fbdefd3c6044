// src/store/keywords.rs
use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

const MAX_KEYWORD_CHARS: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordUsage {
    pub keyword: String,
    pub count: u64,
    #[serde(rename = "last")]
    pub last_used: DateTime<Utc>,
}

/// Search-usage bookkeeping; one increment per started job.
#[async_trait]
pub trait KeywordCounter: Send + Sync {
    async fn record(&self, keyword: &str) -> Result<()>;

    /// Most recently used first.
    async fn recent(&self, n: usize) -> Result<Vec<KeywordUsage>>;

    /// Highest count first.
    async fn top(&self, n: usize) -> Result<Vec<KeywordUsage>>;
}

#[derive(Default)]
pub struct InMemoryKeywordCounter {
    rows: Mutex<HashMap<String, KeywordUsage>>,
}

impl InMemoryKeywordCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Vec<KeywordUsage> {
        let g = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        g.values().cloned().collect()
    }
}

#[async_trait]
impl KeywordCounter for InMemoryKeywordCounter {
    async fn record(&self, keyword: &str) -> Result<()> {
        let k: String = keyword.trim().chars().take(MAX_KEYWORD_CHARS).collect();
        if k.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let mut g = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        let row = g.entry(k.clone()).or_insert(KeywordUsage {
            keyword: k,
            count: 0,
            last_used: now,
        });
        row.count += 1;
        row.last_used = now;
        Ok(())
    }

    async fn recent(&self, n: usize) -> Result<Vec<KeywordUsage>> {
        let mut v = self.snapshot();
        v.sort_by(|a, b| {
            b.last_used
                .cmp(&a.last_used)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        v.truncate(n);
        Ok(v)
    }

    async fn top(&self, n: usize) -> Result<Vec<KeywordUsage>> {
        let mut v = self.snapshot();
        v.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.keyword.cmp(&b.keyword)));
        v.truncate(n);
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_trims_and_counts() {
        let c = InMemoryKeywordCounter::new();
        c.record(" 新能源 ").await.unwrap();
        c.record("新能源").await.unwrap();
        c.record("   ").await.unwrap();
        c.record("芯片").await.unwrap();

        let top = c.top(5).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].keyword, "新能源");
        assert_eq!(top[0].count, 2);
    }
}
