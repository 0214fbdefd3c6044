use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::analyze::ai_report::AiReportClient;
use crate::analyze::analyze_report;
use crate::collect::{Collector, StartError, StartRequest};
use crate::hot::HotTopicsCache;
use crate::store::items::{recent_saved, saved_overview, saved_page, saved_source_counts};

const FALLBACK_HOT_ITEMS: usize = 12;
const FALLBACK_SOURCE_GROUPS: usize = 8;
const OVERVIEW_RECENT_KEYWORDS: usize = 20;
const OVERVIEW_TOP_KEYWORDS: usize = 12;

#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<Collector>,
    pub hot: Arc<HotTopicsCache>,
    pub ai: Option<Arc<AiReportClient>>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/sources", get(list_sources))
        .route("/api/collect/start", post(collect_start))
        .route("/api/collect/stream/{channel_id}", get(collect_stream))
        .route("/api/items/save", post(items_save))
        .route("/api/items/delete", post(items_delete))
        .route("/api/items/saved", get(items_saved))
        .route("/api/report/overview", get(report_overview))
        .route("/api/report/analyze", post(report_analyze))
        .route("/api/bigscreen/summary", get(bigscreen_summary))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// `{ok: true, ...body}`.
#[derive(Serialize)]
struct Envelope<T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

fn ok<T: Serialize>(body: T) -> Json<Envelope<T>> {
    Json(Envelope { ok: true, body })
}

/// Any handler failure, rendered as `{ok: false, error}`.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        warn!(target: "api", error = ?e, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "ok": false, "error": self.message }))).into_response()
    }
}

/// Accept `10`, `"10"` or nothing.
fn lenient_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a JSON body regardless of content type; anything unreadable is `T::default()`.
fn lenient_body<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

#[derive(Default, Deserialize)]
struct StartBody {
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    source_ids: Option<Vec<Value>>,
    #[serde(default)]
    limit: Value,
}

impl From<StartBody> for StartRequest {
    fn from(b: StartBody) -> Self {
        StartRequest {
            keyword: b.keyword.unwrap_or_default(),
            source_ids: b
                .source_ids
                .unwrap_or_default()
                .iter()
                .filter_map(lenient_i64)
                .collect(),
            limit: lenient_i64(&b.limit),
        }
    }
}

async fn list_sources(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let sources = state.collector.sources().all().await?;
    Ok(ok(json!({ "sources": sources })))
}

async fn collect_start(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: StartBody = lenient_body(&body);
    match state.collector.start(body.into()).await {
        Ok(job) => Ok(ok(json!({ "channel_id": job.channel_id, "limit": job.limit }))),
        Err(StartError::Registry(e)) => Err(e.into()),
        Err(e) => Err(ApiError::bad_request(e.to_string())),
    }
}

/// `ready` first, then channel events until `close`.
async fn collect_stream(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ready = stream::once(async { Event::default().event("ready").data("{}") });
    let events = state
        .collector
        .broker()
        .consume(&channel_id)
        .map(|ev| Event::default().event(ev.kind()).data(ev.data().to_string()));
    Sse::new(ready.chain(events).map(Ok::<_, Infallible>)).keep_alive(KeepAlive::default())
}

#[derive(Default, Deserialize)]
struct ItemIds {
    #[serde(default)]
    item_ids: Option<Vec<Value>>,
}

impl ItemIds {
    /// Selected ids; an empty selection is a 400.
    fn parse(body: &Bytes) -> Result<Vec<i64>, ApiError> {
        let ids: Vec<i64> = lenient_body::<ItemIds>(body)
            .item_ids
            .unwrap_or_default()
            .iter()
            .filter_map(lenient_i64)
            .collect();
        if ids.is_empty() {
            return Err(ApiError::bad_request("未选择数据"));
        }
        Ok(ids)
    }
}

async fn items_save(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let ids = ItemIds::parse(&body)?;
    let n = state.collector.items().mark_saved(&ids).await?;
    Ok(ok(json!({ "saved": n })))
}

async fn items_delete(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let ids = ItemIds::parse(&body)?;
    let n = state.collector.items().delete(&ids).await?;
    Ok(ok(json!({ "deleted": n })))
}

#[derive(Deserialize)]
struct SavedQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    page: Option<usize>,
}

async fn items_saved(
    State(state): State<AppState>,
    Query(q): Query<SavedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = saved_page(state.collector.items().as_ref(), &q.q, q.page.unwrap_or(1)).await?;
    Ok(ok(page))
}

async fn report_overview(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let overview = saved_overview(state.collector.items().as_ref()).await?;
    let keywords = state.collector.keywords();
    let recent = keywords.recent(OVERVIEW_RECENT_KEYWORDS).await?;
    let top = keywords.top(OVERVIEW_TOP_KEYWORDS).await?;
    Ok(ok(json!({
        "overview": overview,
        "recent_keywords": recent,
        "top_keywords": top,
    })))
}

#[derive(Default, Deserialize)]
struct AnalyzeBody {
    #[serde(default)]
    text: Option<String>,
}

async fn report_analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: AnalyzeBody = lenient_body(&body);
    let text = body.text.as_deref().unwrap_or_default().trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("文本不能为空"));
    }
    let (report, mode) = analyze_report(text, state.ai.as_deref()).await;
    Ok(ok(json!({ "report": report, "mode": mode })))
}

/// Hot board when available, else the newest saved items.
async fn bigscreen_summary(State(state): State<AppState>) -> Result<Response, ApiError> {
    if let Some(payload) = state.hot.get().await {
        return Ok(Json(payload).into_response());
    }
    let items = state.collector.items().as_ref();
    let hot = recent_saved(items, FALLBACK_HOT_ITEMS).await?;
    let sources = saved_source_counts(items, FALLBACK_SOURCE_GROUPS).await?;
    Ok(ok(json!({
        "mode": "db",
        "ts": Utc::now(),
        "hot": hot,
        "sources": sources,
    }))
    .into_response())
}
