//! JSON error responses

use aspatal_core::{AuthError, ClinicError, ErrorCategory};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::json;
use tracing::error;

/// Error returned by handlers and the authorization gate.
///
/// Rendered as `{"error": {"code", "category", "message"}}` with the status of
/// its category.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    code: &'static str,
    category: ErrorCategory,
    message: String,
}

impl ApiError {
    pub fn new(code: &'static str, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            code,
            category,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("invalid_input", ErrorCategory::BadInput, message)
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.category.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(err.code(), err.category(), err.to_string())
    }
}

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        Self::new(err.code(), err.category(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the log.
        let message = if self.category == ErrorCategory::Internal {
            error!(code = self.code, error = %self.message, "request failed");
            "internal server error".to_string()
        } else {
            self.message
        };

        let body = json!({
            "error": {
                "code": self.code,
                "category": self.category.as_str(),
                "message": message,
            }
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
