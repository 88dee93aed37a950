//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use stress_monitor::MonitorError;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned to API clients as `{"error": "..."}`
#[derive(Debug, Error)]
pub enum ApiError {
    /// Upload could not be decoded as an image
    #[error("Invalid image")]
    InvalidImage(String),

    /// Request carried no file
    #[error("No image uploaded")]
    MissingImage(String),

    /// Upload exceeded the body limit
    #[error("Image too large")]
    TooLarge(String),

    /// Model execution failed for a valid image
    #[error("Inference failed")]
    Inference(#[from] MonitorError),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidImage(_) | ApiError::MissingImage(_) => StatusCode::BAD_REQUEST,
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Inference(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::InvalidImage(detail)
            | ApiError::MissingImage(detail)
            | ApiError::TooLarge(detail) => {
                warn!("Rejected upload: {}: {}", self, detail);
            }
            ApiError::Inference(e) => error!("On-demand inference failed: {}", e),
            ApiError::Internal(detail) => error!("Internal error: {}", detail),
        }

        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
