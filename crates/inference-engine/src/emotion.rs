//! Emotion labels and classifier scores

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::InferenceError;

/// Emotion expressed by a face (FER2013 label set)
///
/// Declaration order matches the classifier's output vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmotionLabel {
    Anger,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl EmotionLabel {
    /// All labels in classifier output order
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Anger,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    /// Number of labels
    pub const COUNT: usize = Self::ALL.len();

    /// Label at a classifier output position
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Classifier output position of this label
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Anger => "Anger",
            EmotionLabel::Disgust => "Disgust",
            EmotionLabel::Fear => "Fear",
            EmotionLabel::Happy => "Happy",
            EmotionLabel::Sad => "Sad",
            EmotionLabel::Surprise => "Surprise",
            EmotionLabel::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-label scores produced by a classifier.
///
/// Scores are not required to sum to one; only the arg-max is consumed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionScores([f32; EmotionLabel::COUNT]);

impl EmotionScores {
    pub fn new(scores: [f32; EmotionLabel::COUNT]) -> Self {
        Self(scores)
    }

    /// Build from a raw model output, which must hold exactly one score per label
    pub fn from_slice(scores: &[f32]) -> Result<Self, InferenceError> {
        let scores: [f32; EmotionLabel::COUNT] =
            scores.try_into().map_err(|_| InferenceError::InvalidOutput {
                expected: EmotionLabel::COUNT,
                actual: scores.len(),
            })?;
        Ok(Self(scores))
    }

    /// Label with the highest score; ties go to the lowest index, NaN never wins
    pub fn top_label(&self) -> EmotionLabel {
        let mut best: Option<usize> = None;
        for (i, &score) in self.0.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some(b) if score <= self.0[b] => {}
                _ => best = Some(i),
            }
        }
        EmotionLabel::ALL[best.unwrap_or(0)]
    }
}
