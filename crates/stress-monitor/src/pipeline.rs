//! Frame to stress result inference pipeline

use std::sync::Arc;
use std::time::Instant;

use camera_capture::VideoFrame;
use image::imageops::{self, FilterType};
use inference_engine::{
    EmotionClassifier, NormalizedFace, TractEmotionClassifier, FACE_INPUT_SIZE,
};
use tracing::{debug, info};

use crate::locator::{FaceLocator, RustfaceDetector};
use crate::{mapper, MonitorConfig, MonitorError, StressResult};

/// Composes face location, normalization, classification and stress mapping.
///
/// Holds only immutable, loaded-once capabilities, so one pipeline can be
/// shared by the capture loop and any number of concurrent requests.
#[derive(Clone)]
pub struct StressPipeline {
    locator: FaceLocator,
    classifier: Arc<dyn EmotionClassifier>,
}

impl StressPipeline {
    pub fn new(locator: FaceLocator, classifier: Arc<dyn EmotionClassifier>) -> Self {
        Self {
            locator,
            classifier,
        }
    }

    /// Load the face and emotion models named in the configuration
    pub fn load(config: &MonitorConfig) -> Result<Self, MonitorError> {
        let detector = RustfaceDetector::load(&config.face_model_path, config)?;
        let classifier = TractEmotionClassifier::load(&config.emotion_model_path)
            .map_err(|e| MonitorError::ModelLoad(e.to_string()))?;

        info!(
            "Stress pipeline ready (face selection: {:?})",
            config.face_selection
        );

        Ok(Self::new(
            FaceLocator::new(Arc::new(detector), config.face_selection),
            Arc::new(classifier),
        ))
    }

    /// Analyze one frame. A frame without a face yields the no-face result.
    pub fn infer(&self, frame: &VideoFrame) -> Result<StressResult, MonitorError> {
        let start = Instant::now();

        let Some(region) = self.locator.locate(frame) else {
            debug!("No face in frame {}", frame.sequence);
            return Ok(StressResult::no_face());
        };

        // Located regions are clamped to the frame
        let Some(crop) = frame.crop(&region) else {
            return Ok(StressResult::no_face());
        };
        let face = normalize_face(&crop)?;

        let scores = self.classifier.classify(&face)?;
        let emotion = scores.top_label();
        let report = mapper::assess(emotion);

        metrics::histogram!("stress_inference_seconds").record(start.elapsed().as_secs_f64());
        debug!(
            "Frame {}: face {:?} -> {} (stress {})",
            frame.sequence, region, emotion, report.stress_level
        );

        Ok(StressResult::Detected(report))
    }
}

/// Convert a face crop to the classifier input: intensity, 48x48, scaled to [0, 1]
pub fn normalize_face(crop: &VideoFrame) -> Result<NormalizedFace, MonitorError> {
    let gray = crop.to_grayscale();
    let resized = imageops::resize(&gray, FACE_INPUT_SIZE, FACE_INPUT_SIZE, FilterType::Triangle);
    Ok(NormalizedFace::from_gray(&resized)?)
}
