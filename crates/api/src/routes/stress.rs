//! Stress Routes

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use camera_capture::VideoFrame;
use serde_json::json;
use std::sync::Arc;
use stress_monitor::StressResult;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Latest result written by the capture loop, verbatim.
/// `{}` until the first cycle completes.
pub async fn latest_stress_level(State(state): State<Arc<AppState>>) -> Response {
    match state.results.latest() {
        Some(latest) => Json(latest.result.clone()).into_response(),
        None => Json(json!({})).into_response(),
    }
}

/// Analyze one uploaded image now. Does not touch the latest result.
pub async fn analyze_stress(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<StressResult>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::MissingImage(e.to_string()))?;
    let bytes = read_upload(&mut multipart).await?;
    debug!("Received upload of {} bytes", bytes.len());

    let pipeline = Arc::clone(&state.pipeline);
    let result = tokio::task::spawn_blocking(move || {
        let frame = VideoFrame::decode(&bytes).map_err(|e| {
            metrics::counter!("stress_invalid_uploads_total").increment(1);
            ApiError::InvalidImage(e.to_string())
        })?;
        pipeline.infer(&frame).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    metrics::counter!("stress_inferences_total", "source" => "upload").increment(1);
    if !result.face_detected() {
        metrics::counter!("stress_no_face_total", "source" => "upload").increment(1);
    }

    Ok(Json(result))
}

/// Bytes of the uploaded file: the first part with a file name, or else the first part
async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    let mut fallback = None;

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let is_file = field.file_name().is_some();
        let bytes = field.bytes().await.map_err(upload_error)?;

        if is_file {
            return Ok(bytes.to_vec());
        }
        if fallback.is_none() {
            fallback = Some(bytes.to_vec());
        }
    }

    fallback.ok_or_else(|| ApiError::MissingImage("multipart body has no parts".to_string()))
}

/// Length-limit rejections are reported apart from malformed bodies
fn upload_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::TooLarge(e.body_text())
    } else {
        ApiError::InvalidImage(e.body_text())
    }
}
