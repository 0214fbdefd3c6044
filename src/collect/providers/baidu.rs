// src/collect/providers/baidu.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::collect::candidate;
use crate::collect::providers::get_text;
use crate::collect::types::{Candidate, FetchError, SourceAdapter, SourceKind};
use crate::config::CollectorConfig;

pub const BAIDU_LABEL: &str = "百度";
pub const BAIDU_SEARCH_URL: &str = "https://www.baidu.com/s";
const MAX_RESULTS: usize = 20;

static RESULT_BLOCK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.result, div.result-op").expect("static selector"));
static TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3 a").expect("static selector"));
static TIME_HINT: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".c-abstract, .content-right_8Zs40, .c-color-gray2").expect("static selector")
});
static RE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").expect("date regex"));

/// Pull a `YYYY-M-D` date out of free text; midnight UTC. Invalid dates are None.
pub fn parse_time_guess(text: &str) -> Option<DateTime<Utc>> {
    let caps = RE_DATE.captures(text)?;
    let y: i32 = caps[1].parse().ok()?;
    let m: u32 = caps[2].parse().ok()?;
    let d: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

/// Raw text of an element; callers normalize whitespace.
fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Parse a Baidu result page into at most 20 candidates.
pub fn parse_results(html: &str) -> Vec<Candidate> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();
    for block in doc.select(&RESULT_BLOCK) {
        let Some(a) = block.select(&TITLE_LINK).next() else {
            continue;
        };
        let title = element_text(a);
        let href = a.value().attr("href").unwrap_or_default();
        let time_text = block
            .select(&TIME_HINT)
            .next()
            .map(element_text)
            .unwrap_or_default();

        if let Some(c) = candidate(&title, href, BAIDU_LABEL, parse_time_guess(&time_text), None) {
            out.push(c);
        }
        if out.len() >= MAX_RESULTS {
            break;
        }
    }
    out
}

/// Web-search scraper against Baidu.
pub struct BaiduAdapter {
    client: reqwest::Client,
    endpoint: String,
}

impl BaiduAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: BAIDU_SEARCH_URL.to_string(),
        }
    }

    pub fn from_config(cfg: &CollectorConfig) -> Result<Self> {
        Ok(Self::new(cfg.http_client(cfg.source_timeout_secs)?))
    }
}

#[async_trait]
impl SourceAdapter for BaiduAdapter {
    async fn fetch(&self, keyword: &str) -> Result<Vec<Candidate>, FetchError> {
        let html = get_text(self.client.get(&self.endpoint).query(&[("wd", keyword)])).await?;
        Ok(parse_results(&html))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Baidu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_guess_reads_loose_dates() {
        let dt = parse_time_guess("发布于 2024-3-7 来源").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-07T00:00:00+00:00");
        assert_eq!(parse_time_guess("3天前"), None);
        assert_eq!(parse_time_guess("2024-13-40"), None);
        assert_eq!(parse_time_guess(""), None);
    }
}
