//! Error responses - RFC 7807 problem details.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;

use tradelog_core::ports::RateLimitError;
use tradelog_shared::ErrorResponse;

/// Application-level error type that converts to RFC 7807 responses.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    /// Admission check denied the request.
    RateLimited {
        limit: u32,
        retry_after_secs: u64,
        message: String,
        request_id: Option<String>,
    },
    /// The rate limiter failed and the policy is to fail closed.
    Unavailable {
        detail: String,
        request_id: Option<String>,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::RateLimited {
                retry_after_secs, ..
            } => write!(f, "Rate limited, retry after {}s", retry_after_secs),
            AppError::Unavailable { detail, .. } => write!(f, "Unavailable: {}", detail),
        }
    }
}

impl AppError {
    pub fn unavailable(err: &RateLimitError, request_id: Option<String>) -> Self {
        tracing::error!("Rate limiter error: {}", err);
        AppError::Unavailable {
            detail: "Request admission is temporarily unavailable.".to_string(),
            request_id,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::NotFound(detail) => {
                HttpResponse::NotFound().json(ErrorResponse::not_found(detail))
            }
            AppError::RateLimited {
                limit,
                retry_after_secs,
                message,
                request_id,
            } => {
                let mut error = ErrorResponse::too_many_requests(message);
                if let Some(id) = request_id {
                    error = error.with_request_id(id);
                }

                HttpResponse::TooManyRequests()
                    .insert_header(("Retry-After", retry_after_secs.to_string()))
                    .insert_header(("X-RateLimit-Limit", limit.to_string()))
                    .insert_header(("X-RateLimit-Remaining", "0"))
                    .json(error)
            }
            AppError::Unavailable { detail, request_id } => {
                let mut error = ErrorResponse::service_unavailable(detail);
                if let Some(id) = request_id {
                    error = error.with_request_id(id);
                }

                HttpResponse::ServiceUnavailable()
                    .insert_header(("Retry-After", "1"))
                    .json(error)
            }
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
