//! Emotion to stress mapping
//!
//! The only place stress levels and recommendations are decided.

use inference_engine::EmotionLabel;
use serde::{Deserialize, Serialize};

use crate::StressReport;

/// Coarse stress bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StressBucket {
    High,
    Medium,
    Low,
}

impl StressBucket {
    /// Bucket an emotion falls into
    pub fn for_emotion(emotion: EmotionLabel) -> Self {
        match emotion {
            EmotionLabel::Anger | EmotionLabel::Fear | EmotionLabel::Disgust => StressBucket::High,
            EmotionLabel::Sad => StressBucket::Medium,
            EmotionLabel::Happy | EmotionLabel::Surprise | EmotionLabel::Neutral => {
                StressBucket::Low
            }
        }
    }

    /// Stress score reported for the bucket
    pub fn stress_level(&self) -> f64 {
        match self {
            StressBucket::High => 70.0,
            StressBucket::Medium => 50.0,
            StressBucket::Low => 20.0,
        }
    }

    /// Recommendations for the bucket, in display order
    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            StressBucket::High => &["Take a 5-minute deep breathing break"],
            StressBucket::Medium => &["Drink a glass of water and take a break from the screen"],
            StressBucket::Low => &["Keep up the good work, stay positive!"],
        }
    }
}

/// Build the report for a classified emotion
pub fn assess(emotion: EmotionLabel) -> StressReport {
    let bucket = StressBucket::for_emotion(emotion);
    StressReport {
        emotion,
        stress_level: bucket.stress_level(),
        recommendations: bucket.recommendations().iter().map(|r| r.to_string()).collect(),
    }
}
