// src/collect/providers/gdelt.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::collect::candidate;
use crate::collect::providers::get_text;
use crate::collect::types::{Candidate, FetchError, SourceAdapter, SourceKind};
use crate::config::CollectorConfig;

pub const GDELT_DOC_URL: &str = "https://api.gdeltproject.org/api/v2/doc/doc";
const MAX_RECORDS: usize = 25;

#[derive(Debug, Deserialize)]
struct DocResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    url: Option<String>,
    domain: Option<String>,
    #[serde(alias = "sourceCountry")]
    sourcecountry: Option<String>,
    socialimage: Option<String>,
    image: Option<String>,
    seendate: Option<String>,
}

/// GDELT `seendate`, e.g. `20240305T083000Z`.
pub fn parse_seendate(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|dt| dt.and_utc())
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a DOC API `ArtList` JSON body into at most 25 candidates.
pub fn parse_articles(body: &str) -> Result<Vec<Candidate>, FetchError> {
    let resp: DocResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("gdelt json: {e}")))?;

    let out = resp
        .articles
        .iter()
        .filter_map(|a| {
            let source = non_empty(&a.domain)
                .or_else(|| non_empty(&a.sourcecountry))
                .unwrap_or("GDELT");
            let cover = non_empty(&a.socialimage)
                .or_else(|| non_empty(&a.image))
                .map(str::to_string);
            let published = a.seendate.as_deref().and_then(parse_seendate);
            candidate(
                a.title.as_deref().unwrap_or_default(),
                a.url.as_deref().unwrap_or_default(),
                source,
                published,
                cover,
            )
        })
        .take(MAX_RECORDS)
        .collect();
    Ok(out)
}

/// GDELT DOC 2.0 article search client.
pub struct GdeltAdapter {
    client: reqwest::Client,
    endpoint: String,
}

impl GdeltAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: GDELT_DOC_URL.to_string(),
        }
    }

    pub fn from_config(cfg: &CollectorConfig) -> Result<Self> {
        Ok(Self::new(cfg.http_client(cfg.gdelt_timeout_secs)?))
    }
}

#[async_trait]
impl SourceAdapter for GdeltAdapter {
    async fn fetch(&self, keyword: &str) -> Result<Vec<Candidate>, FetchError> {
        let max = MAX_RECORDS.to_string();
        let req = self.client.get(&self.endpoint).query(&[
            ("query", keyword),
            ("mode", "ArtList"),
            ("format", "json"),
            ("maxrecords", max.as_str()),
            ("sort", "HybridRel"),
        ]);
        let body = get_text(req).await?;
        parse_articles(&body)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Gdelt
    }
}
