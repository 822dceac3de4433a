//! Per-image analysis: locate → normalize → classify → map → assemble.

use crate::classifier::ClassifierError;
use crate::detector::DetectorError;
use crate::mapper::map_scores;
use crate::normalize::{normalize_face, NormalizedFace};
use crate::response::AnalysisResult;
use crate::types::{largest_detection, Detection, RawScores};
use image::RgbImage;

/// Finds face rectangles in a color image.
pub trait FaceLocator {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError>;
}

/// Produces FER+ logits for a normalized face.
pub trait EmotionModel {
    fn classify(&mut self, face: &NormalizedFace) -> Result<RawScores, ClassifierError>;
}

/// Analyse the largest face in `image`.
///
/// Only locator failures are returned as errors. A face that cannot be
/// normalized or classified degrades to [`AnalysisResult::classifier_fallback`].
pub fn analyze_image(
    image: &RgbImage,
    locator: &mut dyn FaceLocator,
    model: &mut dyn EmotionModel,
) -> Result<AnalysisResult, DetectorError> {
    tracing::info!(width = image.width(), height = image.height(), "analyzing image");

    let faces = locator.locate(image)?;
    let Some(face) = largest_detection(&faces) else {
        return Ok(AnalysisResult::no_face());
    };
    tracing::info!(
        x = face.x,
        y = face.y,
        w = face.width,
        h = face.height,
        candidates = faces.len(),
        "largest face"
    );

    let input = match normalize_face(image, &face) {
        Ok(input) => input,
        Err(e) => {
            tracing::warn!(?face, error = %e, "face normalization failed");
            return Ok(AnalysisResult::classifier_fallback());
        }
    };

    let scores = match model.classify(&input) {
        Ok(scores) => scores,
        Err(e) => {
            tracing::error!(error = %e, "emotion classification failed");
            return Ok(AnalysisResult::classifier_fallback());
        }
    };

    let Some((distribution, dominant)) = map_scores(&scores) else {
        return Ok(AnalysisResult::classifier_fallback());
    };

    let result = AnalysisResult::classified(&distribution, dominant);
    tracing::info!(
        raw = %dominant,
        mood = %result.emotion,
        confidence = result.confidence,
        "final result"
    );
    Ok(result)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Emotion, Mood};
    use image::Rgb;

    pub(crate) struct FixedLocator(pub Vec<Detection>);

    impl FaceLocator for FixedLocator {
        fn locate(&mut self, _image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    /// Returns fixed logits and remembers the mean pixel of each input.
    pub(crate) struct FixedModel {
        pub logits: Result<[f32; 8], String>,
        pub seen_means: Vec<f32>,
    }

    impl FixedModel {
        pub(crate) fn returning(logits: [f32; 8]) -> Self {
            Self { logits: Ok(logits), seen_means: Vec::new() }
        }

        pub(crate) fn failing(msg: &str) -> Self {
            Self { logits: Err(msg.to_string()), seen_means: Vec::new() }
        }
    }

    impl EmotionModel for FixedModel {
        fn classify(&mut self, face: &NormalizedFace) -> Result<RawScores, ClassifierError> {
            self.seen_means.push(face.tensor().mean().unwrap_or(0.0));
            self.logits
                .clone()
                .map(RawScores)
                .map_err(ClassifierError::InferenceFailed)
        }
    }

    struct BrokenLocator;

    impl FaceLocator for BrokenLocator {
        fn locate(&mut self, _image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
            Err(DetectorError::Unavailable("no cascade".into()))
        }
    }

    const HAPPY: [f32; 8] = [0.5, 7.0, 0.2, 0.1, 0.0, 0.0, 0.1, 0.3];

    fn gray_image() -> RgbImage {
        RgbImage::from_pixel(200, 200, Rgb([128, 128, 128]))
    }

    #[test]
    fn test_no_face_returns_neutral_without_classifying() {
        let mut model = FixedModel::returning(HAPPY);
        let result = analyze_image(&gray_image(), &mut FixedLocator(vec![]), &mut model).unwrap();
        assert_eq!(result, AnalysisResult::no_face());
        assert!(model.seen_means.is_empty());
    }

    #[test]
    fn test_happy_face() {
        let mut locator = FixedLocator(vec![Detection::new(50, 50, 80, 80)]);
        let mut model = FixedModel::returning(HAPPY);
        let result = analyze_image(&gray_image(), &mut locator, &mut model).unwrap();
        assert!(result.face_detected);
        assert_eq!(result.emotion, Mood::Happy);
        assert_eq!(result.raw_emotion, "happy");
        let happy = result.all_emotions.get(Emotion::Happy);
        assert!(result.all_emotions.iter().all(|(_, v)| v <= happy));
        assert_eq!(result.confidence, happy);
    }

    #[test]
    fn test_largest_face_is_classified() {
        let mut img = RgbImage::from_pixel(300, 300, Rgb([0, 0, 0]));
        for y in 150..300 {
            for x in 150..300 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let mut locator = FixedLocator(vec![
            Detection::new(10, 10, 40, 40),
            Detection::new(170, 170, 100, 100),
        ]);
        let mut model = FixedModel::returning(HAPPY);
        analyze_image(&img, &mut locator, &mut model).unwrap();
        // Only the bright (larger) face reached the model.
        assert_eq!(model.seen_means, vec![255.0]);
    }

    #[test]
    fn test_classifier_failure_falls_back() {
        let mut locator = FixedLocator(vec![Detection::new(50, 50, 80, 80)]);
        let mut model = FixedModel::failing("session exploded");
        let result = analyze_image(&gray_image(), &mut locator, &mut model).unwrap();
        assert_eq!(result, AnalysisResult::classifier_fallback());
    }

    #[test]
    fn test_non_finite_scores_fall_back() {
        let mut locator = FixedLocator(vec![Detection::new(50, 50, 80, 80)]);
        let mut logits = HAPPY;
        logits[0] = f32::NAN;
        let mut model = FixedModel::returning(logits);
        let result = analyze_image(&gray_image(), &mut locator, &mut model).unwrap();
        assert_eq!(result, AnalysisResult::classifier_fallback());
    }

    #[test]
    fn test_out_of_bounds_face_falls_back() {
        let mut locator = FixedLocator(vec![Detection::new(500, 500, 20, 20)]);
        let mut model = FixedModel::returning(HAPPY);
        let result = analyze_image(&gray_image(), &mut locator, &mut model).unwrap();
        assert_eq!(result, AnalysisResult::classifier_fallback());
        assert!(model.seen_means.is_empty());
    }

    #[test]
    fn test_locator_failure_is_an_error() {
        let mut model = FixedModel::returning(HAPPY);
        assert!(matches!(
            analyze_image(&gray_image(), &mut BrokenLocator, &mut model),
            Err(DetectorError::Unavailable(_))
        ));
    }
}
