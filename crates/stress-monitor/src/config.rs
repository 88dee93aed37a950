//! Stress monitor configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::FaceSelection;

/// Model locations and face detector tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// SeetaFace frontal face model used by the face detector
    pub face_model_path: PathBuf,

    /// ONNX emotion classifier taking a [1, 48, 48, 1] input
    pub emotion_model_path: PathBuf,

    /// Which face to analyse when several are detected
    pub face_selection: FaceSelection,

    /// Smallest face side length the detector searches for (pixels)
    pub min_face_size: u32,

    /// Detector score threshold
    pub score_threshold: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            face_model_path: PathBuf::from("models/seeta_fd_frontal_v1.0.bin"),
            emotion_model_path: PathBuf::from("models/face_model.onnx"),
            face_selection: FaceSelection::First,
            min_face_size: 20,
            score_threshold: 2.0,
        }
    }
}
