use std::sync::Arc;

use axum::Router;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

use scout_client::ReqwestFetcher;
use scout_core::queue::{OverflowPolicy, QueueConfig};
use scout_core::site::{ExtractionRule, SiteConfig, SiteRegistry, SiteRules};
use scout_db::Database;
use scout_server::routes;
use scout_server::state::AppState;

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

/// Router plus handles the tests poke at directly.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub db: Database,
    _container: ContainerAsync<GenericImage>,
}

/// App with the admin token configured.
pub async fn setup_test_app() -> TestApp {
    build_app(Some(TEST_ADMIN_TOKEN.to_string()), default_queue()).await
}

/// App with admin endpoints disabled.
pub async fn setup_test_app_no_auth() -> TestApp {
    build_app(None, default_queue()).await
}

/// App whose queue holds a single entry and rejects the rest.
pub async fn setup_test_app_tiny_queue() -> TestApp {
    let queue = QueueConfig {
        delay: std::time::Duration::from_secs(60),
        capacity: 1,
        overflow: OverflowPolicy::Reject,
    };
    build_app(Some(TEST_ADMIN_TOKEN.to_string()), queue).await
}

fn default_queue() -> QueueConfig {
    QueueConfig {
        delay: std::time::Duration::ZERO,
        ..QueueConfig::default()
    }
}

/// One site on a loopback address; the SSRF guard makes any fetch fail fast.
fn test_registry() -> SiteRegistry {
    let mut rules = SiteRules::new(ExtractionRule::new("h1"));
    rules.links = Some(ExtractionRule::new("a"));
    SiteRegistry::from_sites(vec![SiteConfig::new("Test", "http://127.0.0.1:9", rules)])
        .expect("valid test registry")
}

async fn build_app(admin_token: Option<String>, queue: QueueConfig) -> TestApp {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "scout_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let url = format!("postgresql://postgres:postgres@{host}:{port}/scout_test");

    let db = Database::from_pool(retry_connect(&url).await);
    db.migrate().await.expect("Failed to run migrations");

    let fetcher = ReqwestFetcher::new().expect("fetcher");
    let state = Arc::new(AppState::new(
        db.clone(),
        test_registry(),
        fetcher,
        queue,
        admin_token,
    ));

    TestApp {
        router: routes::router(state.clone()),
        state,
        db,
        _container: container,
    }
}

async fn retry_connect(url: &str) -> PgPool {
    for _ in 0..30 {
        if let Ok(pool) = PgPoolOptions::new().max_connections(5).connect(url).await {
            return pool;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Failed to connect to test database");
}
