use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use keyword_collector::broker::{ChannelBroker, ChannelEvent, JobStatus, SourceOutcome};
use keyword_collector::collect::types::{Candidate, FetchError, SourceAdapter, SourceKind};
use keyword_collector::collect::{Collector, StartError, StartRequest};
use keyword_collector::cover::{CoverResolver, FetchedPage, PageFetcher};
use keyword_collector::store::{
    CrawlerSource, InMemoryItemStore, InMemoryKeywordCounter, InMemorySourceRegistry, ItemStore,
    KeywordCounter,
};

struct FixedAdapter {
    kind: SourceKind,
    count: usize,
    calls: AtomicUsize,
}

impl FixedAdapter {
    fn new(kind: SourceKind, count: usize) -> Arc<Self> {
        Arc::new(Self {
            kind,
            count,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceAdapter for FixedAdapter {
    async fn fetch(&self, keyword: &str) -> Result<Vec<Candidate>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..self.count)
            .map(|i| Candidate {
                title: format!("{keyword} {} #{i}", self.kind),
                url: format!("https://{}.example.com/{i}", self.kind),
                source: self.kind.to_string(),
                published_at: None,
                cover_url: (i % 2 == 0).then(|| format!("https://img.example.com/{i}.jpg")),
            })
            .collect())
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }
}

struct FailingAdapter(SourceKind);

#[async_trait]
impl SourceAdapter for FailingAdapter {
    async fn fetch(&self, _keyword: &str) -> Result<Vec<Candidate>, FetchError> {
        Err(FetchError::Status(503))
    }

    fn kind(&self) -> SourceKind {
        self.0
    }
}

/// Every page lookup fails, so covers stay empty unless the adapter set one.
#[derive(Default)]
struct NoPages {
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for NoPages {
    async fn fetch_page(&self, _url: &str) -> Result<FetchedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("offline"))
    }
}

fn source(id: i64, kind: &str, enabled: bool) -> CrawlerSource {
    CrawlerSource {
        id,
        name: format!("src-{id}"),
        kind: kind.to_string(),
        enabled,
    }
}

struct Harness {
    collector: Arc<Collector>,
    items: Arc<InMemoryItemStore>,
    keywords: Arc<InMemoryKeywordCounter>,
    pages: Arc<NoPages>,
}

fn harness(sources: Vec<CrawlerSource>, adapters: Vec<Arc<dyn SourceAdapter>>) -> Harness {
    let items = Arc::new(InMemoryItemStore::new());
    let keywords = Arc::new(InMemoryKeywordCounter::new());
    let pages = Arc::new(NoPages::default());
    let mut collector = Collector::new(
        Arc::new(ChannelBroker::new()),
        Arc::new(CoverResolver::new(pages.clone(), 100)),
        items.clone(),
        Arc::new(InMemorySourceRegistry::new(sources)),
        keywords.clone(),
    )
    .with_pacing(Duration::ZERO);
    for a in adapters {
        collector = collector.with_adapter(a);
    }
    Harness {
        collector: Arc::new(collector),
        items,
        keywords,
        pages,
    }
}

async fn run(h: &Harness, keyword: &str, limit: Option<i64>) -> Vec<ChannelEvent> {
    let job = h
        .collector
        .start(StartRequest {
            keyword: keyword.to_string(),
            source_ids: Vec::new(),
            limit,
        })
        .await
        .expect("job starts");
    let events = h.collector.broker().consume(&job.channel_id);
    let (events, report) = tokio::join!(events.collect::<Vec<_>>(), job.handle);
    report.expect("job task");
    events
}

fn statuses(events: &[ChannelEvent]) -> Vec<JobStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            ChannelEvent::Status(p) => Some(p.status),
            _ => None,
        })
        .collect()
}

fn item_count(events: &[ChannelEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ChannelEvent::Item(_)))
        .count()
}

#[tokio::test]
async fn quota_is_shared_across_sources() {
    let rss = FixedAdapter::new(SourceKind::GoogleNewsRss, 4);
    let gdelt = FixedAdapter::new(SourceKind::Gdelt, 25);
    let h = harness(
        vec![source(1, "google_news_rss", true), source(2, "gdelt", true)],
        vec![rss.clone(), gdelt.clone()],
    );

    let events = run(&h, "新能源", Some(10)).await;
    assert_eq!(item_count(&events), 10);
    assert_eq!(h.items.len(), 10);

    let urls: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ChannelEvent::Item(i) => Some(i.url.clone()),
            _ => None,
        })
        .collect();
    assert!(urls[..4].iter().all(|u| u.contains("google_news_rss")));
    assert!(urls[4..].iter().all(|u| u.contains("gdelt")));
}

#[tokio::test]
async fn limit_is_clamped_and_never_exceeded() {
    let gdelt = FixedAdapter::new(SourceKind::Gdelt, 25);
    let rss = FixedAdapter::new(SourceKind::GoogleNewsRss, 25);
    let h = harness(
        vec![source(1, "gdelt", true), source(2, "google_news_rss", true)],
        vec![gdelt, rss],
    );

    assert_eq!(item_count(&run(&h, "a", Some(999)).await), 50);
    assert_eq!(item_count(&run(&h, "b", Some(0)).await), 1);
    assert_eq!(item_count(&run(&h, "c", None).await), 10);
}

#[tokio::test]
async fn quota_reached_skips_remaining_sources() {
    let first = FixedAdapter::new(SourceKind::Gdelt, 5);
    let second = FixedAdapter::new(SourceKind::GoogleNewsRss, 5);
    let h = harness(
        vec![source(1, "gdelt", true), source(2, "google_news_rss", true)],
        vec![first.clone(), second.clone()],
    );
    run(&h, "k", Some(3)).await;
    assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn lifecycle_is_running_then_done_then_one_close() {
    let h = harness(
        vec![source(1, "gdelt", true)],
        vec![FixedAdapter::new(SourceKind::Gdelt, 3)],
    );
    let events = run(&h, "k", Some(10)).await;

    assert_eq!(statuses(&events), vec![JobStatus::Running, JobStatus::Done]);
    assert!(events.last().unwrap().is_close());
    assert_eq!(events.iter().filter(|e| e.is_close()).count(), 1);
    assert!(matches!(&events[0], ChannelEvent::Status(p) if p.status == JobStatus::Running));
}

#[tokio::test]
async fn all_sources_failing_reports_empty_then_done() {
    let h = harness(
        vec![
            source(1, "gdelt", true),
            source(2, "baidu", true),
            source(3, "weibo", true),
        ],
        vec![
            Arc::new(FailingAdapter(SourceKind::Gdelt)),
            Arc::new(FailingAdapter(SourceKind::Baidu)),
        ],
    );
    let events = run(&h, "k", Some(10)).await;

    assert_eq!(item_count(&events), 0);
    assert_eq!(
        statuses(&events),
        vec![JobStatus::Running, JobStatus::Empty, JobStatus::Done]
    );
    assert!(events.last().unwrap().is_close());

    let done = events
        .iter()
        .rev()
        .find_map(|e| match e {
            ChannelEvent::Status(p) if p.status == JobStatus::Done => Some(p.clone()),
            _ => None,
        })
        .unwrap();
    let outcomes: Vec<_> = done.sources.iter().map(|s| s.outcome.clone()).collect();
    assert!(matches!(outcomes[0], SourceOutcome::Failed { .. }));
    assert!(matches!(outcomes[1], SourceOutcome::Failed { .. }));
    assert_eq!(outcomes[2], SourceOutcome::Skipped, "unknown type is skipped");
}

#[tokio::test]
async fn empty_status_carries_a_message() {
    let h = harness(vec![source(1, "gdelt", true)], vec![FixedAdapter::new(SourceKind::Gdelt, 0)]);
    let events = run(&h, "k", None).await;
    let empty = events.iter().find_map(|e| match e {
        ChannelEvent::Status(p) if p.status == JobStatus::Empty => p.message.clone(),
        _ => None,
    });
    assert!(empty.is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn missing_covers_go_through_the_resolver() {
    let h = harness(
        vec![source(1, "gdelt", true)],
        vec![FixedAdapter::new(SourceKind::Gdelt, 4)],
    );
    let events = run(&h, "k", Some(4)).await;
    // Items 1 and 3 have no adapter cover.
    assert_eq!(h.pages.calls.load(Ordering::SeqCst), 2);
    let covers: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ChannelEvent::Item(i) => Some(i.cover_url.is_some()),
            _ => None,
        })
        .collect();
    assert_eq!(covers, vec![true, false, true, false]);
}

#[tokio::test]
async fn repeated_jobs_upsert_the_same_rows() {
    let h = harness(
        vec![source(1, "gdelt", true)],
        vec![FixedAdapter::new(SourceKind::Gdelt, 3)],
    );
    let first = run(&h, "k", Some(3)).await;
    let second = run(&h, "k", Some(3)).await;

    let ids = |evs: &[ChannelEvent]| -> HashSet<i64> {
        evs.iter()
            .filter_map(|e| match e {
                ChannelEvent::Item(i) => Some(i.id),
                _ => None,
            })
            .collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(h.items.len(), 3);
}

#[tokio::test]
async fn item_events_carry_the_persisted_row() {
    let h = harness(
        vec![source(1, "gdelt", true)],
        vec![FixedAdapter::new(SourceKind::Gdelt, 1)],
    );
    let events = run(&h, " 光伏 ", Some(1)).await;
    let item = events
        .iter()
        .find_map(|e| match e {
            ChannelEvent::Item(i) => Some(i.clone()),
            _ => None,
        })
        .unwrap();
    let stored = h.items.get(item.id).await.unwrap().unwrap();
    assert_eq!(item.title, stored.title);
    assert_eq!(item.keyword, "光伏");
    assert!(!item.saved);

    let data = ChannelEvent::Item(item).data();
    assert!(data["item"]["collected_at"].is_string());
}

#[tokio::test]
async fn start_validates_before_opening_a_channel() {
    let h = harness(
        vec![source(1, "gdelt", false), source(2, "baidu", true)],
        vec![FixedAdapter::new(SourceKind::Gdelt, 1)],
    );

    let err = h
        .collector
        .start(StartRequest {
            keyword: "   ".into(),
            ..Default::default()
        })
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StartError::EmptyKeyword));

    let err = h
        .collector
        .start(StartRequest {
            keyword: "k".into(),
            source_ids: vec![1],
            limit: None,
        })
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StartError::NoEnabledSource));
    assert_eq!(h.collector.broker().open_channels(), 0);
    assert!(h.keywords.recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn start_records_keyword_usage() {
    let h = harness(
        vec![source(1, "gdelt", true)],
        vec![FixedAdapter::new(SourceKind::Gdelt, 1)],
    );
    run(&h, "储能", None).await;
    run(&h, "储能", None).await;
    let top = h.keywords.top(5).await.unwrap();
    assert_eq!(top[0].keyword, "储能");
    assert_eq!(top[0].count, 2);
}
