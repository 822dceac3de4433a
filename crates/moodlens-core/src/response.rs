//! The analysis payload returned to clients.

use crate::types::{round2, Emotion, EmotionDistribution, Mood};
use serde::Serialize;

/// Confidence reported when no classification is available.
const FALLBACK_CONFIDENCE: f64 = 50.0;
/// Flat share reported when the classifier failed on a detected face.
const CLASSIFIER_FALLBACK_SHARE: f64 = 14.3;
const NO_FACE_NOTE: &str =
    "\n\n(Note: No face was detected. Please try again with a clearer photo.)";

/// Result of analysing one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub success: bool,
    /// Application mood label.
    pub emotion: Mood,
    /// Dominant canonical emotion name.
    pub raw_emotion: String,
    pub confidence: f64,
    pub all_emotions: EmotionDistribution,
    pub empathetic_message: String,
    pub face_detected: bool,
}

impl AnalysisResult {
    /// No face in the image: uniform distribution and a hint to retake the photo.
    pub fn no_face() -> Self {
        Self {
            success: true,
            emotion: Mood::Neutral,
            raw_emotion: Emotion::Neutral.as_str().to_string(),
            confidence: FALLBACK_CONFIDENCE,
            all_emotions: EmotionDistribution::uniform(round2(100.0 / Emotion::ALL.len() as f64)),
            empathetic_message: format!("{}{NO_FACE_NOTE}", Mood::Neutral.empathetic_message()),
            face_detected: false,
        }
    }

    /// A face was found but could not be classified.
    pub fn classifier_fallback() -> Self {
        Self {
            success: true,
            emotion: Mood::Neutral,
            raw_emotion: Emotion::Neutral.as_str().to_string(),
            confidence: FALLBACK_CONFIDENCE,
            all_emotions: EmotionDistribution::uniform(CLASSIFIER_FALLBACK_SHARE),
            empathetic_message: Mood::Neutral.empathetic_message().to_string(),
            face_detected: true,
        }
    }

    /// A classified face.
    pub fn classified(distribution: &EmotionDistribution, dominant: Emotion) -> Self {
        let mood = Mood::from_raw(dominant.raw_label());
        let all_emotions = distribution.rounded();

        Self {
            success: true,
            emotion: mood,
            raw_emotion: dominant.as_str().to_string(),
            confidence: all_emotions.get(dominant),
            all_emotions,
            empathetic_message: mood.empathetic_message().to_string(),
            face_detected: true,
        }
    }
}
