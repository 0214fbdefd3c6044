use keyword_collector::collect::{candidate, to_item_fields};
use keyword_collector::store::items::{saved_overview, saved_page};
use keyword_collector::store::{content_hash, InMemoryItemStore, ItemStore};

fn fields_for(title: &str, url: &str, source: &str, keyword: &str) -> keyword_collector::store::ItemFields {
    let c = candidate(title, url, source, None, None).expect("valid candidate");
    to_item_fields(&c, keyword)
}

#[test]
fn content_hash_is_stable_per_url() {
    let a = content_hash("https://e.com/a");
    assert_eq!(a, content_hash("https://e.com/a"));
    assert_ne!(a, content_hash("https://e.com/b"));
    assert_eq!(a.len(), 32);
}

#[tokio::test]
async fn same_url_converges_to_one_row_with_latest_fields() {
    let store = InMemoryItemStore::new();
    let url = "https://news.example.com/1";
    let key = content_hash(url);

    let first = store
        .upsert(&key, fields_for("旧标题", url, "A", "k1"))
        .await
        .unwrap();
    store.mark_saved(&[first.id]).await.unwrap();

    let second = store
        .upsert(&key, fields_for("新标题", url, "B", "k2"))
        .await
        .unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(second.id, first.id);
    assert_eq!(second.title, "新标题");
    assert_eq!(second.source, "B");
    assert_eq!(second.keyword, "k2");
    assert!(second.saved, "upsert never resets the saved flag");
    assert!(second.collected_at >= first.collected_at);
}

#[tokio::test]
async fn overview_counts_saved_rows_only() {
    let store = InMemoryItemStore::new();
    let mut ids = Vec::new();
    for (i, (src, kw)) in [("新华网", "光伏"), ("新华网", "储能"), ("人民网", "光伏"), ("央视", "风电")]
        .iter()
        .enumerate()
    {
        let url = format!("https://e.com/{i}");
        let row = store
            .upsert(&content_hash(&url), fields_for(&format!("t{i}"), &url, src, kw))
            .await
            .unwrap();
        ids.push(row.id);
    }
    store.mark_saved(&ids[..3]).await.unwrap();

    let o = saved_overview(&store).await.unwrap();
    assert_eq!(o.saved_total, 3);
    assert_eq!(o.saved_sources_total, 2);
    assert_eq!(o.saved_keywords_total, 2);
    assert_eq!(o.top_sources[0].name, "新华网");
    assert_eq!(o.top_sources[0].value, 2);
    assert_eq!(o.top_keywords[0].name, "光伏");

    let page = saved_page(&store, "新华", 1).await.unwrap();
    assert_eq!(page.total, 2);
}
