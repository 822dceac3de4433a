use image::RgbImage;
use moodlens_core::normalize::NormalizedFace;
use moodlens_core::{
    AnalysisResult, ClassifierError, Detection, DetectorError, EmotionClassifier, EmotionModel,
    FaceDetector, FaceLocator, RawScores,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Analyze {
        image: RgbImage,
        reply: oneshot::Sender<Result<AnalysisResult, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Request analysis of a decoded image.
    pub async fn analyze(&self, image: RgbImage) -> Result<AnalysisResult, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Analyze {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Stands in for a cascade that failed to load. Every request fails.
pub struct UnavailableLocator(pub String);

impl FaceLocator for UnavailableLocator {
    fn locate(&mut self, _image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        Err(DetectorError::Unavailable(self.0.clone()))
    }
}

/// Stands in for an emotion model that failed to load.
pub struct UnavailableModel(pub String);

impl EmotionModel for UnavailableModel {
    fn classify(&mut self, _face: &NormalizedFace) -> Result<RawScores, ClassifierError> {
        Err(ClassifierError::Unavailable(self.0.clone()))
    }
}

/// Load the Haar cascade, or a placeholder that reports why it is missing.
pub fn load_locator(cascade_path: &str) -> Box<dyn FaceLocator + Send> {
    match FaceDetector::load(cascade_path) {
        Ok(detector) => {
            tracing::info!(path = cascade_path, "face cascade loaded");
            Box::new(detector)
        }
        Err(e) => {
            tracing::error!(path = cascade_path, error = %e, "face cascade unavailable");
            Box::new(UnavailableLocator(e.to_string()))
        }
    }
}

/// Load the FER+ model, or a placeholder that forces the neutral fallback.
pub fn load_model(model_path: &str, intra_threads: usize) -> Box<dyn EmotionModel + Send> {
    match EmotionClassifier::load_with_threads(model_path, intra_threads) {
        Ok(classifier) => {
            tracing::info!(path = model_path, intra_threads, "FER+ emotion model loaded");
            Box::new(classifier)
        }
        Err(e) => {
            tracing::error!(path = model_path, error = %e, "emotion model unavailable");
            Box::new(UnavailableModel(e.to_string()))
        }
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns both models and serves requests one at a time until
/// every [`EngineHandle`] is dropped.
pub fn spawn_engine(
    mut locator: Box<dyn FaceLocator + Send>,
    mut model: Box<dyn EmotionModel + Send>,
) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("moodlens-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Analyze { image, reply } => {
                        let result =
                            moodlens_core::analyze_image(&image, locator.as_mut(), model.as_mut())
                                .map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgb;
    use moodlens_core::{Emotion, Mood};

    /// Reports the same rectangles for every image.
    pub(crate) struct StubLocator(pub Vec<Detection>);

    impl FaceLocator for StubLocator {
        fn locate(&mut self, _image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    /// Returns the same logits for every face.
    pub(crate) struct StubModel(pub [f32; 8]);

    impl EmotionModel for StubModel {
        fn classify(&mut self, _face: &NormalizedFace) -> Result<RawScores, ClassifierError> {
            Ok(RawScores(self.0))
        }
    }

    pub(crate) const HAPPY_LOGITS: [f32; 8] = [0.4, 6.5, 0.3, 0.1, 0.2, 0.0, 0.1, 0.2];

    pub(crate) fn face_engine() -> EngineHandle {
        spawn_engine(
            Box::new(StubLocator(vec![Detection::new(10, 10, 40, 40)])),
            Box::new(StubModel(HAPPY_LOGITS)),
        )
    }

    fn image() -> RgbImage {
        RgbImage::from_pixel(64, 64, Rgb([90, 120, 150]))
    }

    #[tokio::test]
    async fn test_analyze_round_trip() {
        let result = face_engine().analyze(image()).await.unwrap();
        assert!(result.face_detected);
        assert_eq!(result.emotion, Mood::Happy);
        assert_eq!(result.raw_emotion, Emotion::Happy.as_str());
    }

    #[tokio::test]
    async fn test_handle_is_shared_across_tasks() {
        let engine = face_engine();
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.analyze(image()).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap().face_detected);
        }
    }

    #[tokio::test]
    async fn test_missing_cascade_is_an_error() {
        let engine = spawn_engine(
            Box::new(UnavailableLocator("cascade not found".into())),
            Box::new(StubModel(HAPPY_LOGITS)),
        );
        let err = engine.analyze(image()).await.unwrap_err();
        assert!(matches!(err, EngineError::Detector(DetectorError::Unavailable(_))));
        assert!(err.to_string().contains("cascade not found"));
    }

    #[tokio::test]
    async fn test_missing_model_falls_back_to_neutral() {
        let engine = spawn_engine(
            Box::new(StubLocator(vec![Detection::new(10, 10, 40, 40)])),
            Box::new(UnavailableModel("model not found".into())),
        );
        let result = engine.analyze(image()).await.unwrap();
        assert_eq!(result, AnalysisResult::classifier_fallback());
    }

    #[test]
    fn test_load_locator_missing_file() {
        let mut locator = load_locator("/nonexistent/haarcascade.xml");
        assert!(matches!(
            locator.locate(&image()),
            Err(DetectorError::Unavailable(_))
        ));
    }

    #[test]
    fn test_load_model_missing_file() {
        let mut model = load_model("/nonexistent/emotion.onnx", 1);
        let face = moodlens_core::normalize::normalize_face(&image(), &Detection::new(0, 0, 32, 32))
            .unwrap();
        assert!(matches!(
            model.classify(&face),
            Err(ClassifierError::Unavailable(_))
        ));
    }
}
