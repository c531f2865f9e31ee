use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use scout_core::models::NewScrapedItem;
use tower::ServiceExt;

use crate::common::setup_test_app;

/// Read SSE frames until the accumulated text contains `needle`.
async fn read_until(body: &mut Body, needle: &str) -> String {
    let mut text = String::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !text.contains(needle) {
            let frame = body
                .frame()
                .await
                .expect("stream ended early")
                .expect("body error");
            if let Ok(data) = frame.into_data() {
                text.push_str(&String::from_utf8_lossy(&data));
            }
        }
    })
    .await
    .expect("timed out waiting for event");
    text
}

/// JSON payloads of every complete `data:` line.
fn data_payloads(text: &str) -> Vec<serde_json::Value> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|json| serde_json::from_str(json.trim()).ok())
        .collect()
}

#[tokio::test]
async fn subscribe_sends_initial_snapshot_of_ten_newest() {
    let app = setup_test_app().await;
    let repo = app.db.item_repo();
    for i in 0..12 {
        repo.upsert(&NewScrapedItem::new(
            format!("https://example.com/{i}"),
            format!("item {i}"),
            None,
            "Test",
            Utc::now() - TimeDelta::minutes(i),
        ))
        .await
        .unwrap();
    }

    let response = app
        .router
        .oneshot(Request::get("/api/scraper/subscribe").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let mut body = response.into_body();
    let text = read_until(&mut body, "\n\n").await;
    let events = data_payloads(&text);

    assert_eq!(events[0]["type"], "initial");
    let items = events[0]["items"].as_array().unwrap();
    assert_eq!(items.len(), 10);
    assert_eq!(items[0]["title"], "item 0");
}

#[tokio::test]
async fn published_items_reach_the_stream_and_drop_unsubscribes() {
    let app = setup_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/api/scraper/subscribe").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let mut body = response.into_body();
    read_until(&mut body, "initial").await;
    assert_eq!(app.state.hub.subscriber_count(), 1);

    let item = app
        .db
        .item_repo()
        .upsert(&NewScrapedItem::new(
            "https://example.com/live",
            "Live item",
            None,
            "Test",
            Utc::now(),
        ))
        .await
        .unwrap();
    app.state.hub.publish(&item);

    let text = read_until(&mut body, "Live item").await;
    let update = data_payloads(&text)
        .into_iter()
        .find(|e| e["type"] == "update")
        .expect("update event");
    assert_eq!(update["item"]["url"], "https://example.com/live");

    drop(body);
    assert_eq!(app.state.hub.subscriber_count(), 0);
}
