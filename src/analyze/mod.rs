// src/analyze/mod.rs
//! Report analysis: a deterministic local analyzer (summary, lexicon sentiment,
//! keyword ranking) and an optional AI backend that falls back to it.

pub mod ai_report;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::analyze::ai_report::AiReportClient;
use crate::sentiment::{classify, Sentiment};

pub const SUMMARY_CHARS: usize = 160;
pub const DEFAULT_TOP_K: usize = 8;
const TOPIC_COUNT: usize = 4;

/// Runs of >=2 CJK ideographs or >=3 Latin letters.
static RE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x{4e00}-\x{9fff}]{2,}|[A-Za-z]{3,}").expect("token regex"));

const STOPWORDS: &[&str] = &[
    "我们", "你们", "他们", "以及", "对于", "因为", "所以", "这个", "那个", "进行", "相关", "目前",
    "今日", "其中", "公司", "政府", "部门",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub summary: String,
    pub sentiment: Sentiment,
    pub topics: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    Ai,
    Local,
}

/// First 160 characters, trimmed.
pub fn summarize(text: &str) -> String {
    text.chars()
        .take(SUMMARY_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Top `top_k` tokens by frequency desc, ties by ascending token.
pub fn extract_keywords(text: &str, top_k: usize) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for m in RE_TOKEN.find_iter(text) {
        let t = m.as_str();
        if STOPWORDS.contains(&t) {
            continue;
        }
        *counts.entry(t).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(top_k)
        .map(|(t, _)| t.to_string())
        .collect()
}

/// Deterministic, offline report.
pub fn local_report(text: &str) -> Report {
    let keywords = extract_keywords(text, DEFAULT_TOP_K);
    Report {
        summary: summarize(text),
        sentiment: classify(text),
        topics: keywords.iter().take(TOPIC_COUNT).cloned().collect(),
        keywords,
    }
}

/// Try the AI backend when present; any failure falls back to the local report.
pub async fn analyze_report(text: &str, ai: Option<&AiReportClient>) -> (Report, ReportMode) {
    if let Some(client) = ai {
        match client.report(text).await {
            Ok(r) => return (r, ReportMode::Ai),
            Err(e) => warn!(target: "analyze", error = ?e, "ai report failed, using local"),
        }
    }
    (local_report(text), ReportMode::Local)
}
