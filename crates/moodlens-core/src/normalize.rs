//! Face crop normalization for the FER+ input layer.
//!
//! Pads the detected rectangle by 10% on every side, clips it to the image,
//! converts it to grayscale and area-resizes it to 64×64 with OpenCV. Pixel
//! values stay on the 0–255 scale the model was trained on.

use crate::imgproc;
use crate::types::Detection;
use image::RgbImage;
use ndarray::Array4;
use thiserror::Error;

/// Side length of the FER+ input.
pub const FACE_INPUT_SIZE: usize = 64;

/// Padding added on each side, as a fraction of the detection size.
const PADDING_RATIO: f64 = 0.1;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("face region is empty after clipping")]
    EmptyRegion,
    #[error("opencv: {0}")]
    OpenCv(#[from] opencv::Error),
    #[error("tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// A (1, 1, 64, 64) f32 tensor holding one grayscale face.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFace(Array4<f32>);

impl NormalizedFace {
    pub fn tensor(&self) -> &Array4<f32> {
        &self.0
    }

    pub fn into_tensor(self) -> Array4<f32> {
        self.0
    }
}

/// Padded crop bounds `(x0, y0, x1, y1)` (exclusive end) for a detection.
pub fn padded_region(det: &Detection, img_width: u32, img_height: u32) -> (u32, u32, u32, u32) {
    let pad_x = (det.width as f64 * PADDING_RATIO) as u32;
    let pad_y = (det.height as f64 * PADDING_RATIO) as u32;

    let x0 = det.x.saturating_sub(pad_x);
    let y0 = det.y.saturating_sub(pad_y);
    let x1 = det.x.saturating_add(det.width).saturating_add(pad_x).min(img_width);
    let y1 = det.y.saturating_add(det.height).saturating_add(pad_y).min(img_height);

    (x0, y0, x1, y1)
}

/// Crop, grayscale and resize the face at `det`.
pub fn normalize_face(image: &RgbImage, det: &Detection) -> Result<NormalizedFace, NormalizeError> {
    let (x0, y0, x1, y1) = padded_region(det, image.width(), image.height());
    if x1 <= x0 || y1 <= y0 {
        return Err(NormalizeError::EmptyRegion);
    }

    let crop = image::imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image();
    let gray = imgproc::to_gray(&imgproc::rgb_mat(&crop)?)?;
    let size = FACE_INPUT_SIZE as i32;
    let resized = imgproc::resize_area(&gray, size, size)?;

    tracing::debug!(
        crop_width = crop.width(),
        crop_height = crop.height(),
        "normalized face region"
    );

    // Values stay on the 0-255 scale; NCHW layout.
    let pixels: Vec<f32> = imgproc::gray_pixels(&resized)?
        .into_iter()
        .map(f32::from)
        .collect();
    let tensor = Array4::from_shape_vec((1, 1, FACE_INPUT_SIZE, FACE_INPUT_SIZE), pixels)?;
    Ok(NormalizedFace(tensor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_padded_region_inside_image() {
        let det = Detection::new(100, 80, 50, 40);
        assert_eq!(padded_region(&det, 640, 480), (95, 76, 155, 124));
    }

    #[test]
    fn test_padded_region_clipped_to_bounds() {
        let det = Detection::new(2, 3, 100, 100);
        assert_eq!(padded_region(&det, 105, 90), (0, 0, 105, 90));
    }

    #[test]
    fn test_padding_truncates() {
        // 10% of 59 is 5.9 → 5 pixels.
        let det = Detection::new(10, 10, 59, 59);
        assert_eq!(padded_region(&det, 200, 200), (5, 5, 74, 74));
    }

    #[test]
    fn test_output_shape_and_raw_scale() {
        let img = RgbImage::from_pixel(320, 240, Rgb([255, 255, 255]));
        let face = normalize_face(&img, &Detection::new(100, 60, 90, 110)).unwrap();
        assert_eq!(face.tensor().shape(), &[1, 1, FACE_INPUT_SIZE, FACE_INPUT_SIZE]);
        // No rescaling to [0, 1].
        assert!(face.tensor().iter().all(|&v| v == 255.0));
    }

    #[test]
    fn test_uses_grayscale_of_crop() {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([0, 0, 0]));
        for y in 50..150 {
            for x in 50..150 {
                img.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        let face = normalize_face(&img, &Detection::new(60, 60, 80, 80)).unwrap();
        // Padding stays inside the red square, so every value is red's luma.
        assert!(face.tensor().iter().all(|&v| v == 76.0));
    }

    #[test]
    fn test_small_face_is_upscaled() {
        let img = RgbImage::from_pixel(40, 40, Rgb([10, 200, 30]));
        let face = normalize_face(&img, &Detection::new(5, 5, 20, 20)).unwrap();
        assert_eq!(face.tensor().len(), FACE_INPUT_SIZE * FACE_INPUT_SIZE);
    }

    #[test]
    fn test_empty_region_is_rejected() {
        let img = RgbImage::from_pixel(50, 50, Rgb([1, 2, 3]));
        assert!(matches!(
            normalize_face(&img, &Detection::new(60, 60, 10, 10)),
            Err(NormalizeError::EmptyRegion)
        ));
        assert!(matches!(
            normalize_face(&img, &Detection::new(10, 10, 0, 0)),
            Err(NormalizeError::EmptyRegion)
        ));
    }

    #[test]
    fn test_deterministic() {
        let mut img = RgbImage::new(90, 90);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 2) as u8, (y * 2) as u8, ((x + y) % 256) as u8]);
        }
        let det = Detection::new(10, 12, 60, 58);
        assert_eq!(
            normalize_face(&img, &det).unwrap(),
            normalize_face(&img, &det).unwrap()
        );
    }
}
