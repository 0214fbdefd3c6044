// src/collect/mod.rs
pub mod job;
pub mod providers;
pub mod types;

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

use crate::collect::types::Candidate;
use crate::store::ItemFields;

pub use job::{Collector, JobReport, StartError, StartRequest, StartedJob};

pub const MAX_TITLE_CHARS: usize = 500;
pub const MAX_URL_CHARS: usize = 2048;
pub const MAX_SOURCE_CHARS: usize = 128;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("collect_jobs_total", "Collection jobs started.");
        describe_counter!("collect_items_total", "Items streamed to job channels.");
        describe_counter!(
            "collect_source_errors_total",
            "Source adapter fetch/parse failures."
        );
        describe_histogram!(
            "collect_source_fetch_ms",
            "Source adapter fetch time in milliseconds."
        );
        describe_counter!("cover_cache_hits_total", "Cover lookups served from cache.");
        describe_counter!("cover_cache_misses_total", "Cover lookups that fetched a page.");
        describe_counter!("cover_cache_clears_total", "Full cover cache resets.");
        describe_counter!("hot_cache_hits_total", "Hot-topic reads served from the slot.");
        describe_counter!("hot_fetch_errors_total", "Failed hot-topic refreshes.");
    });
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Title cleanup: decode entities, strip tags, collapse whitespace, cap length.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    truncate_chars(&out, MAX_TITLE_CHARS)
}

/// Build a candidate from raw adapter fields; None when title or url is blank.
pub fn candidate(
    title: &str,
    url: &str,
    source: &str,
    published_at: Option<chrono::DateTime<chrono::Utc>>,
    cover_url: Option<String>,
) -> Option<Candidate> {
    let title = normalize_title(title);
    let url = url.trim();
    if title.is_empty() || url.is_empty() {
        return None;
    }
    Some(Candidate {
        title,
        url: truncate_chars(url, MAX_URL_CHARS),
        source: truncate_chars(source.trim(), MAX_SOURCE_CHARS),
        published_at,
        cover_url: cover_url
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    })
}

/// Storage fields for one observation of a candidate under `keyword`.
pub fn to_item_fields(c: &Candidate, keyword: &str) -> ItemFields {
    ItemFields {
        title: c.title.clone(),
        url: c.url.clone(),
        source: c.source.clone(),
        cover_url: c.cover_url.clone(),
        published_at: c.published_at,
        keyword: truncate_chars(keyword, 128),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_title_decodes_and_collapses() {
        assert_eq!(
            normalize_title("  <em>新能源</em>&nbsp;&amp;\n 汽车  "),
            "新能源 & 汽车"
        );
    }

    #[test]
    fn title_is_capped_at_500_chars() {
        let long = "字".repeat(600);
        assert_eq!(normalize_title(&long).chars().count(), 500);
    }

    #[test]
    fn candidate_requires_title_and_url() {
        assert!(candidate("", "https://e.com", "x", None, None).is_none());
        assert!(candidate("t", "  ", "x", None, None).is_none());
        let c = candidate("t", " https://e.com ", "x", None, Some(" ".into())).unwrap();
        assert_eq!(c.url, "https://e.com");
        assert_eq!(c.cover_url, None);
    }
}
