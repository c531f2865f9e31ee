use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures::stream::{self, Stream};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use scout_core::broadcast::Subscription;
use scout_core::scheduler::SCHEDULER_STATUS_NAME;

use crate::auth::require_admin_token;
use crate::dto::{
    EnqueueRequest, EnqueueResponse, ErrorResponse, HealthResponse, LatestQuery, LatestResponse,
    StatusResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Cache policy for the latest-items listing.
const LATEST_CACHE_CONTROL: &str = "public, s-maxage=30, stale-while-revalidate=60";

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let admin = Router::new()
        .route("/api/scraper/enqueue", post(enqueue))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_token,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .route("/api/scraper/latest", get(latest))
        .route("/api/scraper/subscribe", get(subscribe))
        .route("/api/scraper/status", get(status))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(admin).with_state(state)
}

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (status, axum::Json(ErrorResponse::new(error, message))).into_response()
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/scraper/latest",
    params(LatestQuery),
    responses(
        (status = 200, description = "Page of stored items, newest first", body = LatestResponse),
        (status = 500, description = "Database error", body = ErrorResponse),
    ),
    tag = "items"
)]
pub async fn latest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let query = query.to_item_query();
    let page = state.db.item_repo().query(&query).await?;

    Ok((
        [(
            header::CACHE_CONTROL,
            HeaderValue::from_static(LATEST_CACHE_CONTROL),
        )],
        axum::Json(LatestResponse::new(page, &query)),
    ))
}

// ---------------------------------------------------------------------------
// Live stream
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/scraper/subscribe",
    responses(
        (status = 200, description = "Server-sent events, `initial` first, then `update` and `ping`",
            body = String, content_type = "text/event-stream"),
        (status = 500, description = "Snapshot could not be loaded", body = ErrorResponse),
    ),
    tag = "items"
)]
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let snapshot = state.db.item_repo().recent(state.snapshot_size).await?;
    let subscription = state.hub.subscribe(snapshot);
    tracing::info!(id = %subscription.id(), "Live subscriber connected");

    Ok(Sse::new(event_stream(subscription)))
}

/// Each hub event becomes one `data:` frame. The stream ends when the hub
/// drops the subscriber; when the client disconnects axum drops the stream,
/// and with it the subscription.
fn event_stream(subscription: Subscription) -> impl Stream<Item = Result<Event, axum::Error>> {
    stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        Some((Event::default().json_data(&event), subscription))
    })
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/scraper/status",
    responses(
        (status = 200, description = "Last completed scheduler cycle", body = StatusResponse),
        (status = 404, description = "Scheduler has not completed a cycle yet", body = ErrorResponse),
    ),
    tag = "system"
)]
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let status = state
        .db
        .status_repo()
        .get_status(SCHEDULER_STATUS_NAME)
        .await?;

    Ok(match status {
        Some(status) => axum::Json(StatusResponse::from(status)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            "No scheduler run recorded yet",
        ),
    })
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/scraper/enqueue",
    request_body = EnqueueRequest,
    responses(
        (status = 202, description = "Link queued", body = EnqueueResponse),
        (status = 400, description = "Invalid URL", body = ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin endpoints disabled"),
        (status = 404, description = "Unknown site", body = ErrorResponse),
        (status = 429, description = "Queue full", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<EnqueueRequest>,
) -> Result<Response, ApiError> {
    if !is_http_url(&body.url) {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("Not an absolute http(s) URL: {}", body.url),
        ));
    }

    let Some(site) = state.registry.get(&body.site) else {
        return Ok(error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("Unknown site: {}", body.site),
        ));
    };

    state.queue.enqueue(body.url.clone(), Arc::clone(site))?;
    tracing::info!(url = %body.url, site = %body.site, "Link enqueued by admin");

    let response = EnqueueResponse {
        url: body.url,
        site: body.site,
        pending: state.queue.len(),
    };
    Ok((StatusCode::ACCEPTED, axum::Json(response)).into_response())
}

fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, response) = match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            HealthResponse {
                status: "healthy",
                database: "ok",
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                HealthResponse {
                    status: "unhealthy",
                    database: "error",
                },
            )
        }
    };

    (status, axum::Json(response))
}
