//! Haar cascade face detector.
//!
//! Runs OpenCV's `CascadeClassifier` over the grayscale image, first
//! histogram-equalized with strict parameters, then plain with looser ones
//! when the first pass finds nothing.

use crate::cascade::{self, CascadeError};
use crate::imgproc;
use crate::pipeline::FaceLocator;
use crate::types::Detection;
use image::RgbImage;
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::{self, CascadeClassifier};
use opencv::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("cascade: {0}")]
    Cascade(#[from] CascadeError),
    #[error("invalid scan parameters: {0}")]
    InvalidParams(String),
    #[error("detector unavailable: {0}")]
    Unavailable(String),
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
}

/// Parameters for one multi-scale scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanParams {
    /// Pyramid step between scales (> 1).
    pub scale_factor: f64,
    /// Raw hits a group needs beyond this count to survive; 0 disables grouping.
    pub min_neighbors: u32,
    /// Smallest window (width, height) considered.
    pub min_size: (u32, u32),
}

impl ScanParams {
    /// First pass, run on the histogram-equalized image.
    pub const PRIMARY: ScanParams = ScanParams {
        scale_factor: 1.1,
        min_neighbors: 4,
        min_size: (50, 50),
    };

    /// Looser retry, run on the plain grayscale image when the first pass finds nothing.
    pub const FALLBACK: ScanParams = ScanParams {
        scale_factor: 1.05,
        min_neighbors: 3,
        min_size: (30, 30),
    };
}

/// One pass of the two-pass search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Equalized,
    Plain,
}

impl Pass {
    pub fn params(self) -> ScanParams {
        match self {
            Pass::Equalized => ScanParams::PRIMARY,
            Pass::Plain => ScanParams::FALLBACK,
        }
    }
}

/// Cascade-based face detector.
pub struct FaceDetector {
    classifier: CascadeClassifier,
}

impl FaceDetector {
    /// Check and load the cascade XML at the given path.
    pub fn load(cascade_path: &str) -> Result<Self, DetectorError> {
        let info = cascade::inspect(cascade_path)?;

        let classifier = CascadeClassifier::new(cascade_path)?;
        if classifier.empty()? {
            return Err(CascadeError::Invalid(format!("OpenCV could not load {cascade_path}")).into());
        }

        tracing::info!(
            path = cascade_path,
            window = ?info.window,
            stages = info.stages,
            features = info.features,
            "loaded Haar cascade"
        );

        Ok(Self { classifier })
    }

    /// Find faces in a grayscale matrix.
    pub fn detect_multi_scale(
        &mut self,
        gray: &Mat,
        params: &ScanParams,
    ) -> Result<Vec<Detection>, DetectorError> {
        if params.scale_factor.is_nan() || params.scale_factor <= 1.0 {
            return Err(DetectorError::InvalidParams(format!(
                "scale factor must exceed 1, got {}",
                params.scale_factor
            )));
        }

        let mut rects = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            gray,
            &mut rects,
            params.scale_factor,
            params.min_neighbors as i32,
            objdetect::CASCADE_SCALE_IMAGE,
            Size::new(params.min_size.0 as i32, params.min_size.1 as i32),
            Size::new(0, 0),
        )?;

        let faces: Vec<Detection> = rects.iter().filter_map(detection_from_rect).collect();
        tracing::debug!(faces = faces.len(), ?params, "cascade scan finished");
        Ok(faces)
    }

    /// Two-pass face search on a color image: equalized grayscale with
    /// [`ScanParams::PRIMARY`], then the plain grayscale with
    /// [`ScanParams::FALLBACK`] if nothing was found.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        let gray = imgproc::to_gray(&imgproc::rgb_mat(image)?)?;

        two_pass(|pass| match pass {
            Pass::Equalized => self.detect_multi_scale(&imgproc::equalize(&gray)?, &pass.params()),
            Pass::Plain => self.detect_multi_scale(&gray, &pass.params()),
        })
    }
}

impl FaceLocator for FaceDetector {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<Detection>, DetectorError> {
        self.detect(image)
    }
}

/// Run the equalized pass, and the plain pass only if the first found nothing.
fn two_pass<F>(mut scan: F) -> Result<Vec<Detection>, DetectorError>
where
    F: FnMut(Pass) -> Result<Vec<Detection>, DetectorError>,
{
    let faces = scan(Pass::Equalized)?;
    tracing::info!(faces = faces.len(), "detected faces");
    if !faces.is_empty() {
        return Ok(faces);
    }

    let faces = scan(Pass::Plain)?;
    tracing::info!(faces = faces.len(), "second attempt");
    Ok(faces)
}

fn detection_from_rect(r: Rect) -> Option<Detection> {
    if r.x < 0 || r.y < 0 || r.width <= 0 || r.height <= 0 {
        return None;
    }
    Some(Detection::new(r.x as u32, r.y as u32, r.width as u32, r.height as u32))
}
