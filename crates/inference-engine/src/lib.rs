//! Emotion Inference Engine
//!
//! Classifies normalized face crops into the seven FER2013 emotion labels
//! using an ONNX model executed by tract.

mod emotion;
mod engine;
mod tensor;

pub use emotion::{EmotionLabel, EmotionScores};
pub use engine::{EmotionClassifier, TractEmotionClassifier};
pub use tensor::{NormalizedFace, FACE_INPUT_SIZE};

use thiserror::Error;

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Invalid model output: expected {expected} scores, got {actual}")]
    InvalidOutput { expected: usize, actual: usize },
}
