use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use chrono::{TimeDelta, Utc};
use http_body_util::BodyExt;
use scout_core::models::NewScrapedItem;
use tower::ServiceExt;

use crate::common::{
    TEST_ADMIN_TOKEN, TestApp, setup_test_app, setup_test_app_no_auth, setup_test_app_tiny_queue,
};

async fn body_json(response: Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn seed(app: &TestApp, url: &str, title: &str, source: &str, age_minutes: i64) {
    app.db
        .item_repo()
        .upsert(&NewScrapedItem::new(
            url,
            title,
            Some(format!("{title} body")),
            source,
            Utc::now() - TimeDelta::minutes(age_minutes),
        ))
        .await
        .unwrap();
}

fn enqueue_request(token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::post("/api/scraper/enqueue").header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn latest_empty_returns_pagination_and_cache_header() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/api/scraper/latest").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, s-maxage=30, stale-while-revalidate=60"
    );
    let json = body_json(response).await;
    assert_eq!(json["items"], serde_json::json!([]));
    assert_eq!(
        json["pagination"],
        serde_json::json!({"page": 1, "limit": 20, "total": 0, "pages": 0})
    );
}

#[tokio::test]
async fn latest_filters_by_source_and_query() {
    let app = setup_test_app().await;
    seed(&app, "https://hn/1", "Rust 2024", "HackerNews", 1).await;
    seed(&app, "https://hn/2", "Go news", "HackerNews", 2).await;
    seed(&app, "https://dev/1", "Rust tips", "Dev.to", 3).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/api/scraper/latest?source=HackerNews")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["pagination"]["total"], 2);
    assert_eq!(json["items"][0]["url"], "https://hn/1");
    assert_eq!(json["items"][0]["source"], "HackerNews");
    assert!(json["items"][0]["fetchedAt"].is_string());

    let response = app
        .router
        .oneshot(
            Request::get("/api/scraper/latest?q=Rust&limit=1&page=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(
        json["pagination"],
        serde_json::json!({"page": 2, "limit": 1, "total": 2, "pages": 2})
    );
    assert_eq!(json["items"][0]["url"], "https://dev/1");
}

#[tokio::test]
async fn latest_caps_limit() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/api/scraper/latest?limit=1000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["pagination"]["limit"], 100);
}

#[tokio::test]
async fn status_is_404_until_first_cycle() {
    let app = setup_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/api/scraper/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.db
        .status_repo()
        .record_run("scraper", Utc::now())
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(Request::get("/api/scraper/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "scraper");
    assert!(json["lastRun"].is_string());
}

#[tokio::test]
async fn enqueue_without_configured_token_returns_403() {
    let app = setup_test_app_no_auth().await;

    let response = app
        .router
        .oneshot(enqueue_request(
            Some("any-token"),
            serde_json::json!({"url": "https://example.com/a", "site": "Test"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "forbidden");
}

#[tokio::test]
async fn enqueue_with_wrong_or_missing_token_returns_401() {
    let app = setup_test_app().await;
    let body = serde_json::json!({"url": "https://example.com/a", "site": "Test"});

    let response = app
        .router
        .clone()
        .oneshot(enqueue_request(Some("wrong-token"), body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .oneshot(enqueue_request(None, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn enqueue_unknown_site_returns_404() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(enqueue_request(
            Some(TEST_ADMIN_TOKEN),
            serde_json::json!({"url": "https://example.com/a", "site": "Nowhere"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn enqueue_relative_url_returns_400() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(enqueue_request(
            Some(TEST_ADMIN_TOKEN),
            serde_json::json!({"url": "/relative", "site": "Test"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn enqueue_accepts_known_site() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(enqueue_request(
            Some(TEST_ADMIN_TOKEN),
            serde_json::json!({"url": "http://127.0.0.1:9/page", "site": "Test"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["site"], "Test");
    assert_eq!(json["url"], "http://127.0.0.1:9/page");

    // The SSRF guard fails the fetch; the queue logs it and goes idle.
    tokio::time::timeout(std::time::Duration::from_secs(5), app.state.queue.wait_idle())
        .await
        .expect("queue should drain");
}

#[tokio::test]
async fn enqueue_into_full_queue_returns_429() {
    let app = setup_test_app_tiny_queue().await;

    // The consumer may take the first entry before the second request lands,
    // so the rejection shows up on the second or third request.
    let mut statuses = Vec::new();
    for i in 0..3 {
        let response = app
            .router
            .clone()
            .oneshot(enqueue_request(
                Some(TEST_ADMIN_TOKEN),
                serde_json::json!({"url": format!("http://127.0.0.1:9/{i}"), "site": "Test"}),
            ))
            .await
            .unwrap();
        statuses.push(response.status());
    }

    assert_eq!(statuses[0], StatusCode::ACCEPTED);
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS), "{statuses:?}");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/api/scraper/latest"].is_object());
    assert!(json["paths"]["/api/scraper/enqueue"].is_object());
}
