//! Feature-record similarity scoring.

use crate::types::FeatureRecord;

/// Confidence deltas at or below this land in the high-confidence band.
const CLOSE_DELTA: f32 = 0.01;
/// Confidence deltas strictly above this score zero.
const MAX_DELTA: f32 = 0.1;
/// Floor for the weighted mid-band score.
const MID_BAND_FLOOR: f32 = 0.85;

/// Strategy for scoring similarity between two feature records.
///
/// Returns a score in [0, 1]. Either side may be absent (no enrolled data,
/// failed capture), which scores 0.
pub trait FeatureComparator {
    fn compare(&self, a: Option<&FeatureRecord>, b: Option<&FeatureRecord>) -> f32;
}

/// Scores on the detector-confidence scalar alone.
///
/// The geometric features carried by [`FeatureRecord`] are not consulted
/// here; they exist as the extension point for a comparator that also
/// weighs face geometry. A replacement must keep this one's output ranges
/// to stay comparable with scores already persisted in attendance records.
///
/// The score is a three-branch step function of
/// `d = |a.probability - b.probability|`:
///
/// - `d <= 0.01` → `0.95 + (0.01 - d)`, range (0.95, 0.96]
/// - `d > 0.1`   → `0`
/// - otherwise   → `max(0.85, 1 - d / 0.1)`; a delta of exactly 0.1 falls
///   in this branch (the cutoff above is strict) and floors at 0.85
pub struct ConfidenceComparator;

impl FeatureComparator for ConfidenceComparator {
    fn compare(&self, a: Option<&FeatureRecord>, b: Option<&FeatureRecord>) -> f32 {
        let (Some(a), Some(b)) = (a, b) else {
            return 0.0;
        };
        let delta = (a.probability - b.probability).abs();

        if delta <= CLOSE_DELTA {
            return 0.95 + (CLOSE_DELTA - delta);
        }
        if delta > MAX_DELTA {
            return 0.0;
        }
        (1.0 - delta / MAX_DELTA).max(MID_BAND_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_probability(probability: f32) -> FeatureRecord {
        FeatureRecord {
            aspect_ratio: 0.75,
            features: None,
            landmarks: vec![],
            probability,
        }
    }

    fn compare(a: f32, b: f32) -> f32 {
        let (a, b) = (record_with_probability(a), record_with_probability(b));
        ConfidenceComparator.compare(Some(&a), Some(&b))
    }

    #[test]
    fn test_identical_record_scores_high_band() {
        for p in [0.0f32, 0.5, 0.93, 1.0] {
            let record = record_with_probability(p);
            let score = ConfidenceComparator.compare(Some(&record), Some(&record));
            // Zero delta is the top of the high band
            assert!((score - 0.96).abs() < 1e-6, "p = {p}, score = {score}");
        }
    }

    #[test]
    fn test_symmetric() {
        for (a, b) in [(0.97, 0.98), (0.5, 0.56), (0.2, 0.9)] {
            assert_eq!(compare(a, b), compare(b, a), "a = {a}, b = {b}");
        }
    }

    #[test]
    fn test_delta_exactly_close_cutoff() {
        // d == 0.01 exactly: still the high band, at its lower edge
        let score = compare(0.0, 0.01);
        assert!((score - 0.95).abs() < 1e-6, "score = {score}");
    }

    #[test]
    fn test_delta_exactly_max_cutoff_floors() {
        // d == 0.1 exactly: the rejection cutoff is strict, so this falls
        // into the weighted band and bottoms out at the floor
        let score = compare(0.0, 0.1);
        assert!((score - 0.85).abs() < 1e-6, "score = {score}");
    }

    #[test]
    fn test_large_delta_rejects() {
        assert_eq!(compare(0.97, 0.80), 0.0);
        assert_eq!(compare(0.0, 1.0), 0.0);
        assert_eq!(compare(0.0, 0.11), 0.0);
    }

    #[test]
    fn test_mid_band_weighted() {
        // d = 0.012 → 1 - 0.12 = 0.88, above the floor
        let score = compare(0.5, 0.512);
        assert!((score - 0.88).abs() < 1e-4, "score = {score}");

        // d = 0.05 → 1 - 0.5 = 0.5, floored to 0.85
        let score = compare(0.5, 0.55);
        assert!((score - 0.85).abs() < 1e-6, "score = {score}");

        // d = 0.02 → 1 - 0.2 = 0.8, floored to 0.85
        let score = compare(0.5, 0.52);
        assert!((score - 0.85).abs() < 1e-6, "score = {score}");
    }

    #[test]
    fn test_absent_input_scores_zero() {
        let record = record_with_probability(0.9);
        assert_eq!(ConfidenceComparator.compare(None, Some(&record)), 0.0);
        assert_eq!(ConfidenceComparator.compare(Some(&record), None), 0.0);
        assert_eq!(ConfidenceComparator.compare(None, None), 0.0);
    }

    #[test]
    fn test_output_always_in_unit_range() {
        let probs = [0.0f32, 0.01, 0.3, 0.499, 0.5, 0.91, 1.0];
        for &a in &probs {
            for &b in &probs {
                let score = compare(a, b);
                assert!((0.0..=1.0).contains(&score), "a = {a}, b = {b}, score = {score}");
            }
        }
    }
}
