// src/collect/types.rs
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Adapter output before dedup/storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,           // <= 500 chars
    pub url: String,             // <= 2048 chars
    pub source: String,          // <= 128 chars
    pub published_at: Option<DateTime<Utc>>,
    pub cover_url: Option<String>,
}

/// Source type tags the collector knows how to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Baidu,
    GoogleNewsRss,
    Gdelt,
}

impl SourceKind {
    /// Parse a registry type tag; unknown tags yield None and are skipped.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "baidu" => Some(SourceKind::Baidu),
            "google_news_rss" => Some(SourceKind::GoogleNewsRss),
            "gdelt" => Some(SourceKind::Gdelt),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            SourceKind::Baidu => "baidu",
            SourceKind::GoogleNewsRss => "google_news_rss",
            SourceKind::Gdelt => "gdelt",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Why a source produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("parse error: {0}")]
    Parse(String),
}

/// One external content source. Implementations cap their output, bound their
/// network time, and never dedup or persist.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, keyword: &str) -> Result<Vec<Candidate>, FetchError>;
    fn kind(&self) -> SourceKind;
}
