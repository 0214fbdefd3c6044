use chrono::{TimeZone, Utc};
use keyword_collector::collect::providers::gdelt::parse_articles;
use keyword_collector::collect::types::FetchError;

const ARTLIST_JSON: &str = include_str!("fixtures/gdelt_artlist.json");

#[test]
fn artlist_fixture_maps_articles() {
    let items = parse_articles(ARTLIST_JSON).expect("gdelt parse ok");
    assert_eq!(items.len(), 3, "article without url is dropped");

    let first = &items[0];
    assert_eq!(first.title, "China EV exports keep climbing");
    assert_eq!(first.source, "reuters.com");
    assert_eq!(
        first.cover_url.as_deref(),
        Some("https://www.reuters.com/resizer/ev.jpg")
    );
    assert_eq!(
        first.published_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 5, 8, 30, 0).unwrap())
    );
}

#[test]
fn source_label_falls_back_to_country_then_literal() {
    let items = parse_articles(ARTLIST_JSON).unwrap();
    assert_eq!(items[1].source, "Germany");
    assert_eq!(items[2].source, "GDELT");
}

#[test]
fn odd_fields_degrade_to_none() {
    let items = parse_articles(ARTLIST_JSON).unwrap();
    assert_eq!(items[1].title, "Solar & storage expansion");
    assert_eq!(items[1].published_at, None, "non-compact seendate");
    assert_eq!(items[1].cover_url, None, "blank socialimage");
}

#[test]
fn empty_object_means_no_articles() {
    assert!(parse_articles("{}").unwrap().is_empty());
}

#[test]
fn non_json_body_is_a_parse_error() {
    assert!(matches!(
        parse_articles("<html>rate limited</html>"),
        Err(FetchError::Parse(_))
    ));
}
