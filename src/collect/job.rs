// src/collect/job.rs
//! Collection job orchestration.
//!
//! A job walks the selected sources in order, streams up to the remaining
//! quota from each adapter, resolves missing covers, upserts every item and
//! publishes one `item` event per stored row. Source failures are recorded
//! and skipped. Every job ends with `status=done` followed by `close`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use metrics::{counter, histogram};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::broker::{ChannelBroker, ChannelEvent, JobStatus, SourceOutcome, SourceReport, StatusPayload};
use crate::collect::providers::{baidu::BaiduAdapter, gdelt::GdeltAdapter, news_rss::NewsRssAdapter};
use crate::collect::types::{Candidate, SourceAdapter, SourceKind};
use crate::collect::{ensure_metrics_described, to_item_fields};
use crate::config::CollectorConfig;
use crate::cover::CoverResolver;
use crate::store::{content_hash, CrawlerSource, ItemDto, ItemStore, KeywordCounter, SourceRegistry};

pub const EMPTY_MESSAGE: &str = "未获取到真实数据，请更换关键字或切换数据源。";

/// Body of a job start request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub source_ids: Vec<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("关键字不能为空")]
    EmptyKeyword,
    #[error("未选择可用爬虫源")]
    NoEnabledSource,
    #[error("source registry unavailable: {0}")]
    Registry(#[from] anyhow::Error),
}

/// Handle returned to the caller; the job keeps running without it.
pub struct StartedJob {
    pub channel_id: String,
    pub limit: usize,
    pub handle: JoinHandle<JobReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub emitted: usize,
    pub sources: Vec<SourceReport>,
}

/// Closes the channel when dropped, so a panicking job still terminates its stream.
struct CloseOnDrop<'a> {
    broker: &'a ChannelBroker,
    channel_id: &'a str,
}

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.broker.close(self.channel_id);
    }
}

/// Shared collector runtime: adapters, caches and collaborators.
pub struct Collector {
    broker: Arc<ChannelBroker>,
    covers: Arc<CoverResolver>,
    items: Arc<dyn ItemStore>,
    sources: Arc<dyn SourceRegistry>,
    keywords: Arc<dyn KeywordCounter>,
    adapters: HashMap<SourceKind, Arc<dyn SourceAdapter>>,
    pacing: Duration,
    default_limit: u32,
    max_limit: u32,
}

impl Collector {
    pub fn new(
        broker: Arc<ChannelBroker>,
        covers: Arc<CoverResolver>,
        items: Arc<dyn ItemStore>,
        sources: Arc<dyn SourceRegistry>,
        keywords: Arc<dyn KeywordCounter>,
    ) -> Self {
        let defaults = CollectorConfig::default();
        Self {
            broker,
            covers,
            items,
            sources,
            keywords,
            adapters: HashMap::new(),
            pacing: defaults.pacing(),
            default_limit: defaults.default_limit,
            max_limit: defaults.max_limit,
        }
    }

    /// Register (or replace) the adapter for its source kind.
    pub fn with_adapter(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_limits(mut self, cfg: &CollectorConfig) -> Self {
        self.default_limit = cfg.default_limit;
        self.max_limit = cfg.max_limit;
        self
    }

    /// Wire the three HTTP adapters from config.
    pub fn with_http_adapters(self, cfg: &CollectorConfig) -> Result<Self> {
        Ok(self
            .with_adapter(Arc::new(BaiduAdapter::from_config(cfg)?))
            .with_adapter(Arc::new(NewsRssAdapter::google_news(cfg)?))
            .with_adapter(Arc::new(GdeltAdapter::from_config(cfg)?)))
    }

    pub fn broker(&self) -> &Arc<ChannelBroker> {
        &self.broker
    }

    pub fn items(&self) -> &Arc<dyn ItemStore> {
        &self.items
    }

    pub fn keywords(&self) -> &Arc<dyn KeywordCounter> {
        &self.keywords
    }

    pub fn sources(&self) -> &Arc<dyn SourceRegistry> {
        &self.sources
    }

    fn clamp_limit(&self, requested: Option<i64>) -> usize {
        let max = i64::from(self.max_limit.max(1));
        requested
            .unwrap_or(i64::from(self.default_limit))
            .clamp(1, max) as usize
    }

    /// Validate, open a channel and spawn the job. Validation errors surface
    /// before any channel exists.
    pub async fn start(self: &Arc<Self>, req: StartRequest) -> Result<StartedJob, StartError> {
        let keyword = req.keyword.trim().to_string();
        if keyword.is_empty() {
            return Err(StartError::EmptyKeyword);
        }
        let limit = self.clamp_limit(req.limit);

        let sources = self.sources.enabled_sources(&req.source_ids).await?;
        if sources.is_empty() {
            return Err(StartError::NoEnabledSource);
        }

        if let Err(e) = self.keywords.record(&keyword).await {
            warn!(target: "collect", error = ?e, "keyword usage not recorded");
        }

        ensure_metrics_described();
        counter!("collect_jobs_total").increment(1);

        let channel_id = self.broker.create_channel();
        info!(
            target: "collect",
            channel = %channel_id,
            %keyword,
            limit,
            sources = sources.len(),
            "collection job started"
        );

        let this = Arc::clone(self);
        let id = channel_id.clone();
        let handle =
            tokio::spawn(async move { this.run_job(&id, &keyword, &sources, limit).await });

        Ok(StartedJob {
            channel_id,
            limit,
            handle,
        })
    }

    /// Drive one job to completion on `channel_id`.
    pub async fn run_job(
        &self,
        channel_id: &str,
        keyword: &str,
        sources: &[CrawlerSource],
        limit: usize,
    ) -> JobReport {
        let _close = CloseOnDrop {
            broker: &self.broker,
            channel_id,
        };
        self.broker
            .publish(channel_id, ChannelEvent::status(JobStatus::Running));

        let mut remaining = limit;
        let mut emitted = 0usize;
        let mut reports = Vec::with_capacity(sources.len());

        for src in sources {
            if remaining == 0 {
                break;
            }
            let outcome = self
                .collect_source(channel_id, keyword, src, remaining)
                .await;
            if let SourceOutcome::Fetched { count } | SourceOutcome::Partial { count, .. } = &outcome {
                emitted += count;
                remaining = remaining.saturating_sub(*count);
            }
            reports.push(SourceReport {
                source_id: src.id,
                name: src.name.clone(),
                kind: src.kind.clone(),
                outcome,
            });
        }

        if emitted == 0 {
            self.broker.publish(
                channel_id,
                ChannelEvent::Status(StatusPayload {
                    status: JobStatus::Empty,
                    message: Some(EMPTY_MESSAGE.to_string()),
                    sources: Vec::new(),
                }),
            );
        }
        self.broker.publish(
            channel_id,
            ChannelEvent::Status(StatusPayload {
                status: JobStatus::Done,
                message: None,
                sources: reports.clone(),
            }),
        );

        info!(target: "collect", channel = %channel_id, emitted, "collection job done");
        JobReport {
            emitted,
            sources: reports,
        }
    }

    async fn collect_source(
        &self,
        channel_id: &str,
        keyword: &str,
        src: &CrawlerSource,
        remaining: usize,
    ) -> SourceOutcome {
        let Some(kind) = SourceKind::from_tag(&src.kind) else {
            return SourceOutcome::Skipped;
        };
        let Some(adapter) = self.adapters.get(&kind) else {
            return SourceOutcome::Skipped;
        };

        let t0 = Instant::now();
        let fetched = adapter.fetch(keyword).await;
        histogram!("collect_source_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let candidates = match fetched {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "collect", error = %e, source = %kind, "source fetch failed");
                counter!("collect_source_errors_total").increment(1);
                return SourceOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        self.stream_items(channel_id, keyword, candidates, remaining)
            .await
    }

    async fn stream_items(
        &self,
        channel_id: &str,
        keyword: &str,
        candidates: Vec<Candidate>,
        limit: usize,
    ) -> SourceOutcome {
        let mut count = 0usize;
        for mut c in candidates.into_iter().take(limit) {
            if c.cover_url.is_none() {
                c.cover_url = self.covers.resolve(&c.url).await;
            }
            let stored = match self
                .items
                .upsert(&content_hash(&c.url), to_item_fields(&c, keyword))
                .await
            {
                Ok(row) => row,
                Err(e) => {
                    warn!(target: "collect", error = ?e, url = %c.url, "item upsert failed");
                    return SourceOutcome::Partial {
                        count,
                        reason: format!("store error: {e}"),
                    };
                }
            };
            self.broker
                .publish(channel_id, ChannelEvent::Item(ItemDto::from(&stored)));
            counter!("collect_items_total").increment(1);
            count += 1;
            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }
        SourceOutcome::Fetched { count }
    }
}
