//! Image similarity via downsampled pixel-difference voting.

use crate::error::VerifyError;
use image::imageops::FilterType;
use image::RgbImage;

/// Edge length of the square comparison canvas, in pixels.
const COMPARE_SIZE: u32 = 100;
/// Summed-RGB difference strictly below which a pixel pair counts as matching.
const PIXEL_MATCH_THRESHOLD: u32 = 128;

/// Decode two encoded images and score their pixel-level similarity.
///
/// Both inputs are decoded (any format the `image` crate reads), resampled
/// to a fixed 100×100 RGB canvas with bilinear filtering, and compared
/// position by position: a pixel pair matches when the sum of absolute
/// red, green, and blue channel differences stays under the threshold.
/// The score is the matching fraction, in [0, 1]. Alpha is dropped by the
/// RGB conversion.
///
/// A decode failure on either side aborts the whole comparison with
/// [`VerifyError::ImageDecode`]; no partial score is produced.
pub fn compare_images(a: &[u8], b: &[u8]) -> Result<f32, VerifyError> {
    let a = decode_to_canvas(a)?;
    let b = decode_to_canvas(b)?;
    Ok(score_canvases(&a, &b))
}

/// Decode and resample one encoded image to the comparison canvas.
///
/// Bilinear (`Triangle`) resampling is used on both sides of every
/// comparison, so stored baselines and fresh captures go through the same
/// filter and stay mutually comparable.
fn decode_to_canvas(encoded: &[u8]) -> Result<RgbImage, VerifyError> {
    let decoded = image::load_from_memory(encoded)?;
    Ok(decoded
        .resize_exact(COMPARE_SIZE, COMPARE_SIZE, FilterType::Triangle)
        .to_rgb8())
}

/// Pixel-voting score over two canvases of identical dimensions.
fn score_canvases(a: &RgbImage, b: &RgbImage) -> f32 {
    let total = (COMPARE_SIZE * COMPARE_SIZE) as f32;
    let matching = a
        .pixels()
        .zip(b.pixels())
        .filter(|(pa, pb)| {
            let diff: u32 = pa
                .0
                .iter()
                .zip(pb.0.iter())
                .map(|(&ca, &cb)| (ca as i32 - cb as i32).unsigned_abs())
                .sum();
            diff < PIXEL_MATCH_THRESHOLD
        })
        .count();
    matching as f32 / total
}
