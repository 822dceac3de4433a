//! Moves pixels between `image` buffers and OpenCV matrices, and wraps the
//! `opencv::imgproc` calls used by detection and normalization.

use image::RgbImage;
use opencv::core::{Mat, Size};
use opencv::imgproc;
use opencv::prelude::*;

/// Copy an RGB image into a `CV_8UC3` matrix.
pub fn rgb_mat(image: &RgbImage) -> opencv::Result<Mat> {
    let flat = Mat::from_slice(image.as_raw())?;
    let shaped = flat.reshape(3, image.height() as i32)?;
    shaped.try_clone()
}

/// BT.601 grayscale of an RGB matrix.
pub fn to_gray(rgb: &Mat) -> opencv::Result<Mat> {
    let mut gray = Mat::default();
    imgproc::cvt_color_def(rgb, &mut gray, imgproc::COLOR_RGB2GRAY)?;
    Ok(gray)
}

/// Histogram-equalized copy of a grayscale matrix.
pub fn equalize(gray: &Mat) -> opencv::Result<Mat> {
    let mut out = Mat::default();
    imgproc::equalize_hist(gray, &mut out)?;
    Ok(out)
}

/// Area-interpolated resize.
pub fn resize_area(src: &Mat, width: i32, height: i32) -> opencv::Result<Mat> {
    let mut out = Mat::default();
    imgproc::resize(src, &mut out, Size::new(width, height), 0.0, 0.0, imgproc::INTER_AREA)?;
    Ok(out)
}

/// Row-major bytes of a single-channel matrix.
pub fn gray_pixels(gray: &Mat) -> opencv::Result<Vec<u8>> {
    Ok(gray.data_bytes()?.to_vec())
}
