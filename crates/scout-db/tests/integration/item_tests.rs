use chrono::{TimeDelta, Utc};
use scout_core::models::{ItemQuery, NewScrapedItem};
use scout_db::ItemRepository;

use crate::common::setup_test_db;

fn item(url: &str, title: &str, source: &str, age_minutes: i64) -> NewScrapedItem {
    NewScrapedItem::new(
        url,
        title,
        Some(format!("{title} body")),
        source,
        Utc::now() - TimeDelta::minutes(age_minutes),
    )
}

#[tokio::test]
async fn upsert_inserts_then_updates_in_place() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    let first = repo
        .upsert(&item("https://example.com/a", "First", "Test", 5))
        .await
        .unwrap();
    let second = repo
        .upsert(&item("https://example.com/a", "Second", "Test", 0))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.title, "Second");
    assert_ne!(first.content_hash, second.content_hash);
    assert!(second.updated_at >= first.updated_at);

    let page = repo.query(&ItemQuery::new()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].title, "Second");
}

#[tokio::test]
async fn get_by_url_returns_none_for_unknown() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    assert!(repo.get_by_url("https://nope.test").await.unwrap().is_none());

    repo.upsert(&item("https://example.com/b", "B", "Test", 0))
        .await
        .unwrap();
    let found = repo.get_by_url("https://example.com/b").await.unwrap().unwrap();
    assert_eq!(found.source, "Test");
    assert_eq!(found.content.as_deref(), Some("B body"));
}

#[tokio::test]
async fn query_filters_by_source_and_search() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    repo.upsert(&item("https://hn/1", "Rust 2024 released", "HackerNews", 1))
        .await
        .unwrap();
    repo.upsert(&item("https://hn/2", "Go generics", "HackerNews", 2))
        .await
        .unwrap();
    repo.upsert(&item("https://dev/1", "Rust tips", "Dev.to", 3))
        .await
        .unwrap();

    let hn = repo
        .query(&ItemQuery::new().with_source("HackerNews"))
        .await
        .unwrap();
    assert_eq!(hn.total, 2);
    assert!(hn.items.iter().all(|i| i.source == "HackerNews"));

    let rust = repo.query(&ItemQuery::new().with_search("Rust")).await.unwrap();
    assert_eq!(rust.total, 2);

    let both = repo
        .query(&ItemQuery::new().with_source("Dev.to").with_search("tips body"))
        .await
        .unwrap();
    assert_eq!(both.total, 1);
    assert_eq!(both.items[0].url, "https://dev/1");

    let none = repo
        .query(&ItemQuery::new().with_source("Nobody"))
        .await
        .unwrap();
    assert_eq!(none.total, 0);
    assert!(none.items.is_empty());
}

#[tokio::test]
async fn query_paginates_newest_first() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    for i in 0..5 {
        repo.upsert(&item(&format!("https://x/{i}"), &format!("item {i}"), "Test", i))
            .await
            .unwrap();
    }

    let page1 = repo
        .query(&ItemQuery::new().paginate(1, 2))
        .await
        .unwrap();
    assert_eq!(page1.total, 5);
    assert_eq!(page1.pages(2), 3);
    let titles: Vec<_> = page1.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["item 0", "item 1"]);

    let page3 = repo
        .query(&ItemQuery::new().paginate(3, 2))
        .await
        .unwrap();
    assert_eq!(page3.items.len(), 1);
    assert_eq!(page3.items[0].title, "item 4");

    let past_end = repo
        .query(&ItemQuery::new().paginate(9, 2))
        .await
        .unwrap();
    assert!(past_end.items.is_empty());
    assert_eq!(past_end.total, 5);
}

#[tokio::test]
async fn recent_limits_and_orders() {
    let (pool, _container) = setup_test_db().await;
    let repo = ItemRepository::new(pool);

    repo.upsert(&item("https://x/old", "old", "Test", 60))
        .await
        .unwrap();
    repo.upsert(&item("https://x/new", "new", "Test", 1))
        .await
        .unwrap();
    repo.upsert(&item("https://x/mid", "mid", "Test", 30))
        .await
        .unwrap();

    let recent = repo.recent(2).await.unwrap();
    let titles: Vec<_> = recent.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["new", "mid"]);
}
