use std::sync::Arc;

use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::dto::ErrorResponse;
use crate::state::AppState;

/// Middleware that validates `Authorization: Bearer <token>` against the
/// configured admin token.
///
/// Returns 403 when no admin token is configured at all, 401 when the header
/// is missing or wrong.
pub async fn require_admin_token(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        let body = ErrorResponse::new(
            "forbidden",
            "Admin endpoints are disabled. Set SCOUT_ADMIN_TOKEN to enable them.",
        );
        return (StatusCode::FORBIDDEN, axum::Json(body)).into_response();
    };

    let authenticated = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| token_matches(token, expected));

    if !authenticated {
        let body = ErrorResponse::new(
            "unauthorized",
            "Missing or invalid Authorization header. Expected: Bearer <admin_token>",
        );
        return (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response();
    }

    next.run(request).await
}

/// Constant-time comparison; slices of different length compare unequal.
fn token_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
