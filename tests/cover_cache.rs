use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use keyword_collector::cover::{CoverResolver, FetchedPage, PageFetcher, DEFAULT_COVER_CACHE_CAPACITY};

/// Serves canned pages by url and counts every call.
#[derive(Default)]
struct MockFetcher {
    pages: HashMap<String, FetchedPage>,
    calls: AtomicUsize,
}

impl MockFetcher {
    fn with_page(mut self, url: &str, final_url: &str, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                final_url: final_url.to_string(),
                body: body.to_string(),
            },
        );
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("connection refused"))
    }
}

const OG_PAGE: &str = r#"<html><head>
    <meta name="twitter:image" content="https://cdn.example.com/tw.jpg">
    <meta property="og:image" content="/img/og.jpg">
</head><body><img src="https://cdn.example.com/body.jpg"></body></html>"#;

#[tokio::test]
async fn second_lookup_is_served_from_cache() {
    let fetcher = Arc::new(MockFetcher::default().with_page(
        "https://short.example/a",
        "https://news.example.com/story/a",
        OG_PAGE,
    ));
    let resolver = CoverResolver::new(fetcher.clone(), DEFAULT_COVER_CACHE_CAPACITY);

    let first = resolver.resolve("https://short.example/a").await;
    let second = resolver.resolve("https://short.example/a").await;

    assert_eq!(
        first.as_deref(),
        Some("https://news.example.com/img/og.jpg"),
        "og:image wins and is resolved against the post-redirect url"
    );
    assert_eq!(first, second);
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn failures_are_cached_as_negatives() {
    let fetcher = Arc::new(MockFetcher::default());
    let resolver = CoverResolver::new(fetcher.clone(), 10);

    assert_eq!(resolver.resolve("https://down.example/x").await, None);
    assert_eq!(resolver.cached("https://down.example/x"), Some(None));
    assert_eq!(resolver.resolve("https://down.example/x").await, None);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(resolver.cached("https://never.example/"), None);
}

#[tokio::test]
async fn page_without_usable_candidates_is_negative() {
    let fetcher = Arc::new(MockFetcher::default().with_page(
        "https://e.com/p",
        "https://e.com/p",
        r#"<meta property="og:image" content="data:image/png;base64,xx"><img src="javascript:void(0)">"#,
    ));
    let resolver = CoverResolver::new(fetcher, 10);
    assert_eq!(resolver.resolve("https://e.com/p").await, None);
}

#[tokio::test]
async fn inserting_past_capacity_clears_the_whole_cache() {
    let fetcher = Arc::new(MockFetcher::default());
    let resolver = CoverResolver::new(fetcher.clone(), DEFAULT_COVER_CACHE_CAPACITY);

    for i in 0..DEFAULT_COVER_CACHE_CAPACITY {
        resolver.resolve(&format!("https://e.com/{i}")).await;
    }
    assert_eq!(resolver.cache_len(), 800);
    assert!(resolver.cached("https://e.com/0").is_some());

    // Re-resolving a cached url does not count as a new entry.
    resolver.resolve("https://e.com/5").await;
    assert_eq!(resolver.cache_len(), 800);

    resolver.resolve("https://e.com/800").await;
    assert_eq!(resolver.cache_len(), 1);
    assert!(resolver.cached("https://e.com/0").is_none());
    assert!(resolver.cached("https://e.com/800").is_some());

    let before = fetcher.calls();
    resolver.resolve("https://e.com/0").await;
    assert_eq!(fetcher.calls(), before + 1, "evicted url is a miss again");
}
