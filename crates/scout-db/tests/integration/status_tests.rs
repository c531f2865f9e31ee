use chrono::{TimeDelta, Utc};
use scout_db::{Database, StatusRepository};

use crate::common::setup_test_db;

#[tokio::test]
async fn record_run_creates_then_overwrites() {
    let (pool, _container) = setup_test_db().await;
    let repo = StatusRepository::new(pool);

    assert!(repo.get_status("scraper").await.unwrap().is_none());

    let earlier = Utc::now() - TimeDelta::minutes(15);
    repo.record_run("scraper", earlier).await.unwrap();
    let later = Utc::now();
    repo.record_run("scraper", later).await.unwrap();

    let status = repo.get_status("scraper").await.unwrap().unwrap();
    assert_eq!(status.name, "scraper");
    // Postgres keeps microseconds
    assert!((status.last_run - later).num_milliseconds().abs() < 1);
}

#[tokio::test]
async fn health_check_and_repeat_migration() {
    let (pool, _container) = setup_test_db().await;
    let db = Database::from_pool(pool);

    db.health_check().await.unwrap();
    db.migrate().await.unwrap();
}
