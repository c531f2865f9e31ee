use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use scout_client::{ReqwestFetcher, validate_selectors};
use scout_core::broadcast::BroadcastHub;
use scout_core::queue::QueueConfig;
use scout_core::scheduler::{SchedulerConfig, TracingSchedulerReporter};
use scout_core::site::SiteRegistry;
use scout_db::{Database, DatabaseConfig};
use scout_server::config::ServerConfig;
use scout_server::routes;
use scout_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scout=info".parse()?))
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;
    let scheduler_config = SchedulerConfig::from_env()?;
    let queue_config = QueueConfig::from_env()?;

    let registry = SiteRegistry::load(config.sites_file.as_deref())?;
    validate_selectors(&registry)?;
    tracing::info!(sites = registry.len(), "Site registry loaded");

    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    db.migrate().await?;

    let mut fetcher = ReqwestFetcher::new()?;
    if config.allow_private_urls {
        tracing::warn!("SSRF protection disabled (SCOUT_ALLOW_PRIVATE_URLS)");
        fetcher = fetcher.allow_private_urls();
    }

    if config.admin_token.is_none() {
        tracing::warn!("SCOUT_ADMIN_TOKEN not set, admin endpoints are disabled");
    }

    let state = Arc::new(AppState::new(
        db,
        registry,
        fetcher,
        queue_config,
        config.admin_token.clone(),
    ));

    let cancel_token = CancellationToken::new();
    let scheduler = state.scheduler(scheduler_config);
    let worker = tokio::spawn({
        let cancel_token = cancel_token.clone();
        async move {
            scheduler.run(cancel_token, &TracingSchedulerReporter).await;
        }
    });

    let app = routes::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel_token.clone(), state.hub.clone()))
        .await?;

    cancel_token.cancel();
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "Scheduler task ended abnormally");
    }
    tracing::info!("Server stopped");

    Ok(())
}

/// Waits for CTRL+C, then stops the scheduler and closes live streams so the
/// graceful shutdown is not held open by long-lived connections.
async fn shutdown_signal(cancel_token: CancellationToken, hub: BroadcastHub) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    cancel_token.cancel();
    hub.close_all();
}
