use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use turnstile_core::QueueError;

/// Application-level error type for HTTP handlers.
///
/// Every error renders as `{"success": false, "error": ..., "code": ...}`,
/// which is the shape the web client already checks.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The task id in the path is not one we could have issued.
    #[error("task {0} not found")]
    UnknownTask(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Queue(QueueError::Validation(e)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            AppError::Queue(QueueError::NotFound(_)) | AppError::UnknownTask(_) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string())
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "success": false,
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
