//! Keyword collector service: binary entrypoint.
//! Loads config, wires the collector, caches and routes, and hands the router to Shuttle.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keyword_collector::analyze::ai_report::AiReportClient;
use keyword_collector::config::CollectorConfig;
use keyword_collector::cover::{CoverResolver, HttpPageFetcher};
use keyword_collector::hot::{BaiduHotSource, HotTopicsCache};
use keyword_collector::metrics::Metrics;
use keyword_collector::store::{InMemoryItemStore, InMemoryKeywordCounter, InMemorySourceRegistry};
use keyword_collector::{create_router, AppState, ChannelBroker, Collector};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("keyword_collector=info,warn"));
    // The runtime may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // .env in local/dev; no-op in prod.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = CollectorConfig::load_default().context("loading collector config")?;

    let covers = Arc::new(CoverResolver::new(
        Arc::new(HttpPageFetcher::from_config(&cfg)?),
        cfg.cover_cache_capacity,
    ));
    let collector = Collector::new(
        Arc::new(ChannelBroker::new()),
        covers,
        Arc::new(InMemoryItemStore::new()),
        Arc::new(InMemorySourceRegistry::with_defaults()),
        Arc::new(InMemoryKeywordCounter::new()),
    )
    .with_pacing(cfg.pacing())
    .with_limits(&cfg)
    .with_http_adapters(&cfg)?;

    let hot = HotTopicsCache::from_config(Arc::new(BaiduHotSource::from_config(&cfg)?), &cfg);
    let ai = AiReportClient::from_config(&cfg.ai)?.map(Arc::new);
    info!(ai_enabled = ai.is_some(), "report backend configured");

    let state = AppState {
        collector: Arc::new(collector),
        hot: Arc::new(hot),
        ai,
    };
    let mut router = create_router(state);

    match Metrics::init(&cfg) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => warn!(error = ?e, "metrics exporter disabled"),
    }

    Ok(router.into())
}
