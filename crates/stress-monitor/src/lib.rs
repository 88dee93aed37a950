//! Stress Monitor
//!
//! Emotion-based stress estimation from camera frames:
//! - Face location (single face per frame)
//! - Emotion classification on a normalized 48x48 crop
//! - Emotion to stress level and recommendation mapping
//! - Single-writer store for the latest result
//! - Background capture loop on a fixed cadence

pub mod analysis;
pub mod capture;
pub mod config;
pub mod locator;
pub mod mapper;
pub mod pipeline;
pub mod store;

pub use analysis::{NoFace, StressReport, StressResult};
pub use capture::{CaptureHandle, CaptureLoop, CaptureState, CaptureStatus, CAPTURE_INTERVAL};
pub use config::MonitorConfig;
pub use locator::{FaceDetector, FaceLocator, FaceSelection, RustfaceDetector};
pub use mapper::StressBucket;
pub use pipeline::{normalize_face, StressPipeline};
pub use store::{LatestResult, ResultReader, ResultStore, ResultWriter};

use inference_engine::InferenceError;
use thiserror::Error;

/// Stress monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
}
