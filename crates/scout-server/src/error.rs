use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use scout_core::error::AppError;

use crate::dto::ErrorResponse;

/// Wrapper so we can implement `IntoResponse` for `AppError`.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            AppError::QueueOverflow { .. } => (StatusCode::TOO_MANY_REQUESTS, "queue_full"),
            AppError::SerializationError(_) => (StatusCode::BAD_REQUEST, "serialization_error"),
            AppError::ExtractionError(_) => (StatusCode::UNPROCESSABLE_ENTITY, "extraction_error"),
            AppError::HttpError(_) | AppError::NetworkError(_) => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            AppError::BlockedUrl(_) => (StatusCode::BAD_REQUEST, "blocked_url"),
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::ConfigError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Generic(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_kind();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = ErrorResponse::new(error_type, self.0.to_string());
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        let cases = [
            (AppError::QueueOverflow { capacity: 3 }, StatusCode::TOO_MANY_REQUESTS),
            (AppError::DatabaseError("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Timeout(10), StatusCode::GATEWAY_TIMEOUT),
            (AppError::HttpError("HTTP 500 for x".into()), StatusCode::BAD_GATEWAY),
            (AppError::ExtractionError("bad".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::BlockedUrl("http://10.0.0.1/".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).into_response().status(), expected);
        }
    }
}
