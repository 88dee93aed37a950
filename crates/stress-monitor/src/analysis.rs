//! Stress analysis results

use inference_engine::EmotionLabel;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Message reported when no face is visible
pub const NO_FACE_MESSAGE: &str = "No face detected";

/// Successful analysis of one face
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressReport {
    /// Classified emotion
    pub emotion: EmotionLabel,

    /// Stress score (20.0, 50.0 or 70.0)
    pub stress_level: f64,

    /// Ordered recommendations for the stress bucket
    pub recommendations: Vec<String>,
}

/// Marker for a frame without a visible face, serialized as
/// `{"error": "No face detected"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoFace;

impl Serialize for NoFace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("error", NO_FACE_MESSAGE)?;
        map.end()
    }
}

/// Pipeline output: either a report or the no-face marker, never both
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StressResult {
    Detected(StressReport),
    NoFace(NoFace),
}

impl StressResult {
    pub fn no_face() -> Self {
        StressResult::NoFace(NoFace)
    }

    /// Check if a face was analysed
    pub fn face_detected(&self) -> bool {
        matches!(self, StressResult::Detected(_))
    }

    pub fn report(&self) -> Option<&StressReport> {
        match self {
            StressResult::Detected(report) => Some(report),
            StressResult::NoFace(_) => None,
        }
    }
}

impl From<StressReport> for StressResult {
    fn from(report: StressReport) -> Self {
        StressResult::Detected(report)
    }
}
