//! Error taxonomy shared by every layer of the service.
//!
//! Mirrors the classification in the coordination spec: each variant maps to
//! exactly one HTTP status at the API boundary (`tessera-api::error` does the
//! mapping). Domain and repository code only ever produces a `DomainError`;
//! nothing below the API layer knows about HTTP.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("rate limited")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Unauthorized(_) => "unauthorized",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::RateLimited => "rate_limited",
            Self::Internal(_) => "internal",
        }
    }

    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self {
            Self::Internal(_) => Level::ERROR,
            Self::BadRequest(_) | Self::Validation(_) | Self::Conflict(_) => Level::WARN,
            _ => Level::INFO,
        }
    }

    pub fn not_found(entity: impl std::fmt::Display) -> Self {
        Self::NotFound(entity.to_string())
    }

    pub fn bad_request(msg: impl std::fmt::Display) -> Self {
        Self::BadRequest(msg.to_string())
    }

    pub fn conflict(msg: impl std::fmt::Display) -> Self {
        Self::Conflict(msg.to_string())
    }

    pub fn forbidden(msg: impl std::fmt::Display) -> Self {
        Self::Forbidden(msg.to_string())
    }

    pub fn unauthorized(msg: impl std::fmt::Display) -> Self {
        Self::Unauthorized(msg.to_string())
    }

    pub fn validation(msg: impl std::fmt::Display) -> Self {
        Self::Validation(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
