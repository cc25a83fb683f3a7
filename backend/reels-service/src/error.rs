//! Error types for reels-service
//!
//! Errors propagate as coarse categories; the underlying cause is logged
//! server-side and never serialized into a response body.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::BadRequest(_) => 400,
            AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Config(_)
            | AppError::Internal(_) => 500,
        }
    }

    /// Degraded-dependency errors: the caller should recompute instead of
    /// failing the request.
    pub fn is_degraded_dependency(&self) -> bool {
        matches!(self, AppError::Cache(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::from_u16(self.http_status())
            .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = ResponseError::status_code(self);

        // 5xx details stay in the server log only
        let message = match self {
            AppError::NotFound(_) | AppError::Conflict(_) | AppError::BadRequest(_) => {
                self.to_string()
            }
            _ => {
                tracing::error!(error = %self, "request failed");
                "internal server error".to_string()
            }
        };

        HttpResponse::build(status).json(json!({ "error": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound("reel".into()).http_status(), 404);
        assert_eq!(AppError::Conflict("already liked".into()).http_status(), 409);
        assert_eq!(AppError::BadRequest("bad page".into()).http_status(), 400);
        assert_eq!(AppError::Internal("boom".into()).http_status(), 500);
    }

    #[test]
    fn test_degraded_dependency_is_cache_only() {
        let cache_err = AppError::Cache(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )));
        assert!(cache_err.is_degraded_dependency());
        assert!(!AppError::NotFound("user".into()).is_degraded_dependency());
    }
}
