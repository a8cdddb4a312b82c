use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// The error taxonomy from the error-handling design: each variant maps
/// 1:1 to a row (kind, status, user-visible shape). Validation and
/// rate-limit short-circuit before any work happens; database/internal
/// errors are logged at `error` level here and surfaced as a generic
/// message — stack traces never leave the process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("upstream LLM call failed: {0}")]
    Llm(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, msg, retry_after) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
                None,
            ),
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit",
                "rate limit exceeded".to_string(),
                Some(*retry_after_secs),
            ),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "not_found",
                "not found".to_string(),
                None,
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "request_error",
                msg.clone(),
                None,
            ),
            AppError::Llm(msg) => {
                tracing::error!("LLM adapter error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_error".to_string(),
                    None,
                )
            }
            AppError::Database(e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_error".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_error".to_string(),
                    None,
                )
            }
        };

        let body = Json(json!({
            "error": error_type,
            "message": msg,
        }));

        let mut response = (status, body).into_response();

        if let Some(secs) = retry_after {
            if let Ok(val) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("retry-after", val);
            }
        }

        response
    }
}
