//! Feature normalization — raw detector output to scale- and
//! position-invariant feature records.

use crate::error::VerifyError;
use crate::types::{FeatureRecord, GeometricFeatures, RawDetection};

/// Minimum landmark count for deriving geometric features. Detectors that
/// emit fewer points still yield a usable record, just without the derived
/// eye/nose ratios.
const MIN_LANDMARKS_FOR_FEATURES: usize = 6;

// Landmark positional convention (detector order).
const RIGHT_EYE: usize = 0;
const LEFT_EYE: usize = 1;
const NOSE: usize = 2;
const MOUTH: usize = 3;

/// Normalize one detection into a comparable [`FeatureRecord`].
///
/// Distances are expressed as fractions of the bounding box and every
/// landmark is remapped to box-relative unit coordinates, so the record is
/// invariant under uniform scaling and translation of the input frame.
///
/// Fails with [`VerifyError::InvalidDetection`] when the bounding box is
/// degenerate (zero or negative extent on either axis).
pub fn normalize(detection: &RawDetection) -> Result<FeatureRecord, VerifyError> {
    let (left, top) = detection.top_left;
    let (right, bottom) = detection.bottom_right;
    let box_width = right - left;
    let box_height = bottom - top;

    if box_width <= 0.0 || box_height <= 0.0 {
        return Err(VerifyError::InvalidDetection);
    }

    let features = if detection.landmarks.len() >= MIN_LANDMARKS_FOR_FEATURES {
        let eye_distance =
            distance(detection.landmarks[RIGHT_EYE], detection.landmarks[LEFT_EYE]) / box_width;
        let nose_to_mouth =
            distance(detection.landmarks[NOSE], detection.landmarks[MOUTH]) / box_height;
        Some(GeometricFeatures { eye_distance, nose_to_mouth })
    } else {
        None
    };

    let landmarks = detection
        .landmarks
        .iter()
        .map(|&(x, y)| ((x - left) / box_width, (y - top) / box_height))
        .collect();

    Ok(FeatureRecord {
        aspect_ratio: box_width / box_height,
        features,
        landmarks,
        probability: detection.probability,
    })
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}
