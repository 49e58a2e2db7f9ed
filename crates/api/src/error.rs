//! HTTP error envelope (spec §7). Every handler returns
//! `Result<T, ApiError>`; `ApiError` maps `tessera_core::DomainError` plus a
//! handful of transport-only failures onto a status code and the
//! `{"error":{"code","message"}}` body shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tessera_core::DomainError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Domain(e) => match e {
                DomainError::BadRequest(_) => StatusCode::BAD_REQUEST,
                DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
                DomainError::NotFound(_) => StatusCode::NOT_FOUND,
                DomainError::Conflict(_) => StatusCode::CONFLICT,
                DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DomainError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Domain(e) => e.code(),
            Self::MalformedBody(_) => "bad_request",
            Self::Unexpected(_) => "internal",
        }
    }

    fn log(&self) {
        match self {
            Self::Domain(e) if matches!(e.log_level(), tracing::Level::ERROR) => {
                tracing::error!(error = %e, "request failed")
            }
            Self::Domain(e) if matches!(e.log_level(), tracing::Level::WARN) => {
                tracing::warn!(error = %e, "request failed")
            }
            Self::Domain(e) => tracing::info!(error = %e, "request failed"),
            other => tracing::error!(error = %other, "request failed"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_not_found_maps_to_404() {
        let err = ApiError::from(DomainError::not_found("asset not found"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn domain_conflict_maps_to_409() {
        let err = ApiError::from(DomainError::Conflict("fqn already registered".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn malformed_body_maps_to_400_bad_request_code() {
        let err = ApiError::MalformedBody("invalid json".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "bad_request");
    }

    #[test]
    fn rate_limited_maps_to_429() {
        let err = ApiError::from(DomainError::RateLimited);
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.code(), "rate_limited");
    }
}
