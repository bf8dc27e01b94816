//! Error handling

use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::logic::ServiceError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Client errors: bad schema, unreadable body, batch size
    ValidationError(String),

    // Classifier rejected a well-formed request
    InferenceError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::InferenceError(msg) => {
                tracing::error!("Inference error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Model inference failed")
            }
        };

        // `detail` is what browser clients read
        let body = Json(json!({
            "error": error_message,
            "detail": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(_) | ServiceError::InvalidRecord { .. } => {
                AppError::ValidationError(err.to_string())
            }
            ServiceError::Inference(e) => AppError::InferenceError(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}
