//! moodlens-core — Face location and emotion classification.
//!
//! Uses an OpenCV Haar cascade for face location and the FER+ model via
//! ONNX Runtime for emotion classification, then maps the model's classes to
//! application moods.

pub mod cascade;
pub mod classifier;
pub mod detector;
pub mod imgproc;
pub mod mapper;
pub mod normalize;
pub mod pipeline;
pub mod response;
pub mod types;

pub use classifier::{ClassifierError, EmotionClassifier, FERPLUS_MODEL_FILE};
pub use detector::{DetectorError, FaceDetector, Pass, ScanParams};
pub use normalize::NormalizeError;
pub use pipeline::{analyze_image, EmotionModel, FaceLocator};
pub use response::AnalysisResult;
pub use types::{Detection, Emotion, EmotionDistribution, Mood, RawLabel, RawScores};

use std::path::PathBuf;

/// File name of the frontal-face cascade shipped with OpenCV.
pub const CASCADE_FILE: &str = "haarcascade_frontalface_default.xml";

/// Default directory holding the cascade and the ONNX model:
/// `$XDG_DATA_HOME/moodlens/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("moodlens")
        .join("models")
}
