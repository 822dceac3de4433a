//! Turns FER+ logits into the canonical emotion distribution.

use crate::types::{Emotion, EmotionDistribution, RawLabel, RawScores};

/// Numerically stable softmax.
pub fn softmax(logits: &[f32; 8]) -> [f32; 8] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = logits.map(|x| (x - max).exp());
    let sum: f32 = exp.iter().sum();
    exp.map(|e| e / sum)
}

/// Map logits to percentages over the canonical emotions and pick the
/// dominant one.
///
/// Contempt has no canonical slot; its share is added to neutral. Returns
/// `None` when the logits contain NaN or infinities.
pub fn map_scores(scores: &RawScores) -> Option<(EmotionDistribution, Emotion)> {
    if scores.0.iter().any(|v| !v.is_finite()) {
        tracing::warn!(logits = ?scores.0, "non-finite model output");
        return None;
    }

    let probs = softmax(&scores.0);
    let mut dist = EmotionDistribution::zeroed();
    for label in RawLabel::ALL {
        dist.add(label.canonical(), probs[label.index()] as f64 * 100.0);
    }

    let dominant = dist.dominant();
    tracing::info!(
        %dominant,
        confidence = dist.get(dominant),
        "mapped emotion scores"
    );
    Some((dist, dominant))
}
