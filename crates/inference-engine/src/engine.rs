//! Emotion classifier contract and tract-onnx implementation

use std::path::Path;
use std::time::Instant;

use tract_onnx::prelude::*;
use tracing::{debug, error, info};

use crate::{EmotionLabel, EmotionScores, InferenceError, NormalizedFace};

/// Classifies a normalized face into per-label scores.
///
/// The face must already be resized and scaled; implementations do not
/// preprocess. Implementations are loaded once and shared across threads.
pub trait EmotionClassifier: Send + Sync {
    fn classify(&self, face: &NormalizedFace) -> Result<EmotionScores, InferenceError>;
}

/// ONNX emotion classifier executed by tract.
///
/// Expects a model taking a `[1, 48, 48, 1]` f32 tensor and returning
/// seven scores in FER2013 label order.
pub struct TractEmotionClassifier {
    model: TypedRunnableModel<TypedModel>,
}

impl TractEmotionClassifier {
    /// Load and optimize the model
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let model_path = model_path.as_ref();
        info!("Loading emotion model from {}", model_path.display());

        let shape: TVec<usize> = NormalizedFace::SHAPE.iter().copied().collect();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|m| m.with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), shape)))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| {
                error!("Failed to load emotion model: {}", e);
                InferenceError::ModelLoadError(format!("{}: {}", model_path.display(), e))
            })?;

        info!("Emotion model loaded successfully");
        Ok(Self { model })
    }
}

impl EmotionClassifier for TractEmotionClassifier {
    fn classify(&self, face: &NormalizedFace) -> Result<EmotionScores, InferenceError> {
        let start = Instant::now();

        let input = tract_ndarray::Array4::from_shape_vec(
            (
                NormalizedFace::SHAPE[0],
                NormalizedFace::SHAPE[1],
                NormalizedFace::SHAPE[2],
                NormalizedFace::SHAPE[3],
            ),
            face.to_vec(),
        )
        .map_err(|e| InferenceError::InvalidInputShape {
            expected: format!("{:?}", NormalizedFace::SHAPE),
            actual: e.to_string(),
        })?
        .into_tensor();

        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let output = outputs.first().ok_or(InferenceError::InvalidOutput {
            expected: EmotionLabel::COUNT,
            actual: 0,
        })?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let raw: Vec<f32> = view.iter().copied().collect();
        let scores = EmotionScores::from_slice(&raw)?;

        debug!("Inference completed in {}ms", start.elapsed().as_millis());
        Ok(scores)
    }
}
