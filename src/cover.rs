//! Preview image resolution with a bounded, process-scoped cache.
//!
//! Lookup order on a fetched page: `og:image`, `twitter:image` (name, then
//! property), `link rel=image_src`, then the first `<img>`. Negative results
//! are cached too. When an insert would push the cache past its capacity the
//! whole map is cleared first (coarse reset, not LRU).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::CollectorConfig;

pub const DEFAULT_COVER_CACHE_CAPACITY: usize = 800;

/// Normalize a candidate image reference:
/// `//host/x` becomes `https://host/x`, `/x` is joined onto `base_url`,
/// anything not `http(s)://` afterwards is rejected.
pub fn normalize_cover_url(raw: &str, base_url: &str) -> Option<String> {
    let mut u = raw.trim().to_string();
    if u.is_empty() {
        return None;
    }
    if u.starts_with("//") {
        u = format!("https:{u}");
    }
    if u.starts_with('/') {
        u = Url::parse(base_url).ok()?.join(&u).ok()?.to_string();
    }
    if u.starts_with("http://") || u.starts_with("https://") {
        Some(u)
    } else {
        None
    }
}

fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("static selector")
}

static META_CANDIDATES: Lazy<Vec<(Selector, &'static str)>> = Lazy::new(|| {
    vec![
        (sel(r#"meta[property="og:image"]"#), "content"),
        (sel(r#"meta[name="twitter:image"]"#), "content"),
        (sel(r#"meta[property="twitter:image"]"#), "content"),
        (sel(r#"link[rel~="image_src"]"#), "href"),
    ]
});
static IMG: Lazy<Selector> = Lazy::new(|| sel("img"));

/// Pick the first usable cover reference from a full HTML page.
pub fn extract_cover_from_html(html: &str, page_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    for (selector, attr) in META_CANDIDATES.iter() {
        let candidate = doc
            .select(selector)
            .next()
            .and_then(|el| el.value().attr(attr))
            .unwrap_or_default();
        if let Some(n) = normalize_cover_url(candidate, page_url) {
            return Some(n);
        }
    }
    let src = doc
        .select(&IMG)
        .next()
        .and_then(|el| el.value().attr("src"))?;
    normalize_cover_url(src, page_url)
}

/// First `<img src>` of an HTML fragment (e.g. an RSS description).
pub fn extract_first_img(html: &str, base_url: &str) -> Option<String> {
    if html.trim().is_empty() {
        return None;
    }
    let frag = Html::parse_fragment(html);
    let src = frag.select(&IMG).next()?.value().attr("src")?;
    normalize_cover_url(src, base_url)
}

/// A fetched page after redirects.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub body: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage>;
}

/// reqwest-backed fetcher; follows redirects (reqwest default policy).
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(cfg: &CollectorConfig) -> Result<Self> {
        Ok(Self::new(cfg.http_client(cfg.cover_timeout_secs)?))
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("cover page get()")?
            .error_for_status()
            .context("cover page status")?;
        let final_url = resp.url().to_string();
        let body = resp.text().await.context("cover page .text()")?;
        Ok(FetchedPage { final_url, body })
    }
}

/// Cover lookup service. Share one instance across jobs.
pub struct CoverResolver {
    fetcher: Arc<dyn PageFetcher>,
    cache: Mutex<HashMap<String, Option<String>>>,
    capacity: usize,
}

impl CoverResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>, capacity: usize) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Cached value for `url`: `None` = never attempted, `Some(None)` = negative.
    pub fn cached(&self, url: &str) -> Option<Option<String>> {
        let g = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        g.get(url).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub async fn resolve(&self, url: &str) -> Option<String> {
        if let Some(hit) = self.cached(url) {
            counter!("cover_cache_hits_total").increment(1);
            return hit;
        }
        counter!("cover_cache_misses_total").increment(1);

        let cover = match self.fetcher.fetch_page(url).await {
            Ok(page) if !page.body.is_empty() => {
                extract_cover_from_html(&page.body, &page.final_url)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(target: "cover", error = %e, %url, "cover fetch failed");
                None
            }
        };

        self.insert(url, cover.clone());
        cover
    }

    fn insert(&self, url: &str, cover: Option<String>) {
        let mut g = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        if !g.contains_key(url) && g.len() >= self.capacity {
            g.clear();
            counter!("cover_cache_clears_total").increment(1);
        }
        g.insert(url.to_string(), cover);
    }
}
