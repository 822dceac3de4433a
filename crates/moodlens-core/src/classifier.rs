//! FER+ emotion classifier via ONNX Runtime.
//!
//! Runs `emotion-ferplus-8.onnx` on a normalized 64×64 face and returns the
//! eight raw logits.

use crate::normalize::NormalizedFace;
use crate::pipeline::EmotionModel;
use crate::types::RawScores;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants ---
const FERPLUS_NUM_CLASSES: usize = 8;
pub const FERPLUS_MODEL_FILE: &str = "emotion-ferplus-8.onnx";
const DEFAULT_INTRA_THREADS: usize = 2;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0} — download emotion-ferplus-8.onnx from the ONNX model zoo and place it in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// FER+ emotion classifier.
pub struct EmotionClassifier {
    session: Session,
}

impl EmotionClassifier {
    /// Load the FER+ ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, ClassifierError> {
        Self::load_with_threads(model_path, DEFAULT_INTRA_THREADS)
    }

    /// Load the model with an explicit intra-op thread count.
    pub fn load_with_threads(model_path: &str, intra_threads: usize) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded FER+ model"
        );

        Ok(Self { session })
    }

    /// Run the model on one face and return its logits.
    pub fn classify(&mut self, face: &NormalizedFace) -> Result<RawScores, ClassifierError> {
        let input = face.tensor();
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("logit extraction: {e}")))?;

        let logits = logits_from_slice(raw)?;
        tracing::debug!(?logits, "raw model output");
        Ok(logits)
    }
}

impl EmotionModel for EmotionClassifier {
    fn classify(&mut self, face: &NormalizedFace) -> Result<RawScores, ClassifierError> {
        EmotionClassifier::classify(self, face)
    }
}

/// Check the output length and copy it into [`RawScores`].
fn logits_from_slice(raw: &[f32]) -> Result<RawScores, ClassifierError> {
    let values: [f32; FERPLUS_NUM_CLASSES] = raw.try_into().map_err(|_| {
        ClassifierError::InferenceFailed(format!(
            "expected {FERPLUS_NUM_CLASSES} logits, got {}",
            raw.len()
        ))
    })?;
    Ok(RawScores(values))
}
