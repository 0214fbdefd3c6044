// src/collect/providers/news_rss.rs
//! RSS (and Atom-ish) feed adapter; used for the Google News search feed.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::collect::candidate;
use crate::collect::providers::get_text;
use crate::collect::types::{Candidate, FetchError, SourceAdapter, SourceKind};
use crate::config::CollectorConfig;
use crate::cover::{extract_first_img, normalize_cover_url};

pub const GOOGLE_NEWS_LABEL: &str = "Google 新闻";
pub const GOOGLE_NEWS_SEARCH_URL: &str = "https://news.google.com/rss/search";
const MAX_ITEMS: usize = 25;

/// RFC-822 style dates (`pubDate`), with RFC 3339 accepted for Atom feeds.
pub fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Date,
    Source,
    Description,
}

#[derive(Default)]
struct ItemBuf {
    title: String,
    link: String,
    date: String,
    source: String,
    description: String,
    media_url: Option<String>,
    enclosure_url: Option<String>,
}

impl ItemBuf {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::Date => &mut self.date,
            Field::Source => &mut self.source,
            Field::Description => &mut self.description,
        };
        target.push_str(text);
    }

    fn into_candidate(self, default_source: &str) -> Option<Candidate> {
        let link = self.link.trim().to_string();
        let source = match self.source.trim() {
            "" => default_source,
            s => s,
        };
        let cover = self
            .media_url
            .as_deref()
            .and_then(|u| normalize_cover_url(u, &link))
            .or_else(|| {
                self.enclosure_url
                    .as_deref()
                    .and_then(|u| normalize_cover_url(u, &link))
            })
            .or_else(|| extract_first_img(&self.description, &link));
        candidate(
            &self.title,
            &link,
            source,
            parse_feed_date(&self.date),
            cover,
        )
    }
}

fn field_for(name: &[u8]) -> Option<Field> {
    match name {
        b"title" => Some(Field::Title),
        b"link" => Some(Field::Link),
        b"pubDate" | b"published" | b"updated" => Some(Field::Date),
        b"source" => Some(Field::Source),
        b"description" | b"summary" => Some(Field::Description),
        _ => None,
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
        .filter(|v| !v.is_empty())
}

/// Item-level attributes carried on start or empty tags.
fn take_attrs(buf: &mut ItemBuf, e: &BytesStart<'_>) {
    match e.name().as_ref() {
        b"media:content" if buf.media_url.is_none() => buf.media_url = attr(e, b"url"),
        b"enclosure" if buf.enclosure_url.is_none() => buf.enclosure_url = attr(e, b"url"),
        // Atom: <link href="..."/>
        b"link" if buf.link.is_empty() => {
            if let Some(href) = attr(e, b"href") {
                buf.link = href;
            }
        }
        _ => {}
    }
}

/// Parse a feed document into at most 25 candidates.
pub fn parse_items(xml: &str, default_source: &str) -> Result<Vec<Candidate>, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut item: Option<ItemBuf> = None;
    let mut field: Option<Field> = None;
    let mut depth_in_item = 0usize;

    loop {
        let ev = reader
            .read_event()
            .map_err(|e| FetchError::Parse(format!("feed xml: {e}")))?;
        match ev {
            Event::Start(e) => {
                let name = e.name();
                if item.is_none() {
                    if matches!(name.as_ref(), b"item" | b"entry") {
                        item = Some(ItemBuf::default());
                        depth_in_item = 0;
                    }
                    continue;
                }
                depth_in_item += 1;
                if let Some(buf) = item.as_mut() {
                    take_attrs(buf, &e);
                }
                // Only direct children of the item carry fields.
                field = if depth_in_item == 1 {
                    field_for(name.as_ref())
                } else {
                    None
                };
            }
            Event::Empty(e) => {
                if let Some(buf) = item.as_mut() {
                    take_attrs(buf, &e);
                }
            }
            Event::Text(t) => {
                if let (Some(buf), Some(f)) = (item.as_mut(), field) {
                    let raw = String::from_utf8_lossy(&t);
                    buf.push(f, &html_escape::decode_html_entities(&raw));
                }
            }
            Event::CData(c) => {
                if let (Some(buf), Some(f)) = (item.as_mut(), field) {
                    buf.push(f, &String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => {
                if item.is_none() {
                    continue;
                }
                if depth_in_item == 0 && matches!(e.name().as_ref(), b"item" | b"entry") {
                    if let Some(c) = item.take().and_then(|b| b.into_candidate(default_source)) {
                        out.push(c);
                        if out.len() >= MAX_ITEMS {
                            break;
                        }
                    }
                    field = None;
                    continue;
                }
                depth_in_item = depth_in_item.saturating_sub(1);
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Feed adapter: one search URL template plus a default source label.
pub struct NewsRssAdapter {
    client: reqwest::Client,
    endpoint: String,
    default_source: String,
}

impl NewsRssAdapter {
    pub fn new(client: reqwest::Client, endpoint: &str, default_source: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            default_source: default_source.to_string(),
        }
    }

    /// Google News keyword search feed (zh-CN edition).
    pub fn google_news(cfg: &CollectorConfig) -> Result<Self> {
        Ok(Self::new(
            cfg.http_client(cfg.source_timeout_secs)?,
            GOOGLE_NEWS_SEARCH_URL,
            GOOGLE_NEWS_LABEL,
        ))
    }
}

#[async_trait]
impl SourceAdapter for NewsRssAdapter {
    async fn fetch(&self, keyword: &str) -> Result<Vec<Candidate>, FetchError> {
        let req = self.client.get(&self.endpoint).query(&[
            ("q", keyword),
            ("hl", "zh-CN"),
            ("gl", "CN"),
            ("ceid", "CN:zh-Hans"),
        ]);
        let body = get_text(req).await?;
        parse_items(&body, &self.default_source)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::GoogleNewsRss
    }
}
