// tests/metrics.rs
// One recorder per process, so this file holds a single test.
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use keyword_collector::config::CollectorConfig;
use keyword_collector::cover::{CoverResolver, FetchedPage, PageFetcher};
use keyword_collector::metrics::Metrics;

struct NoPages;

#[async_trait]
impl PageFetcher for NoPages {
    async fn fetch_page(&self, _url: &str) -> Result<FetchedPage> {
        Err(anyhow!("offline"))
    }
}

#[tokio::test]
async fn metrics_endpoint_exposes_cover_cache_series() {
    let cfg = CollectorConfig::default();
    let metrics = Metrics::init(&cfg).expect("recorder installs once");

    let covers = CoverResolver::new(Arc::new(NoPages), 1);
    covers.resolve("https://e.com/a").await;
    covers.resolve("https://e.com/a").await;
    covers.resolve("https://e.com/b").await;

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "cover_cache_hits_total 1",
        "cover_cache_misses_total 2",
        "cover_cache_clears_total 1",
        "cover_cache_capacity 800",
        "hot_cache_ttl_secs 30",
    ] {
        assert!(text.contains(needle), "missing `{needle}` in:\n{text}");
    }
}
