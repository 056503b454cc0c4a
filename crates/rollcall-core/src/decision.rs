//! Match decision engine — combines feature and image similarity into a
//! single accept/reject decision and enforces the once-per-day rule.

use chrono::NaiveDate;

use crate::comparator::{ConfidenceComparator, FeatureComparator};
use crate::error::VerifyError;
use crate::image_score;
use crate::normalizer;
use crate::types::{AttendanceRecord, Capture, IdentityProfile, MatchResult};

/// Weight of the feature score in the combined score; the image score
/// takes the remainder.
const FEATURE_WEIGHT: f32 = 0.5;

/// Scores a capture against an enrolled profile and applies the acceptance
/// threshold.
///
/// The threshold is per-engine, not a constant: attendance marking runs at
/// 0.30 while login verification runs at 0.35, each call site supplying
/// its own cutoff. Stateless between calls.
pub struct DecisionEngine {
    comparator: Box<dyn FeatureComparator + Send + Sync>,
    accept_threshold: f32,
}

impl DecisionEngine {
    /// Engine with the stock confidence comparator and the given cutoff.
    pub fn new(accept_threshold: f32) -> Self {
        Self::with_comparator(Box::new(ConfidenceComparator), accept_threshold)
    }

    /// Engine with a caller-supplied comparator.
    pub fn with_comparator(
        comparator: Box<dyn FeatureComparator + Send + Sync>,
        accept_threshold: f32,
    ) -> Self {
        Self { comparator, accept_threshold }
    }

    pub fn accept_threshold(&self) -> f32 {
        self.accept_threshold
    }

    /// Decide whether `capture` matches `profile`.
    ///
    /// The duplicate check against `existing` runs first, before any
    /// scoring, so a repeat attempt costs no image work. `today` is the
    /// calendar date the once-per-day rule is evaluated against; this
    /// check is advisory — the authoritative guard is the attendance
    /// store's insert-if-absent, which the caller invokes on acceptance.
    ///
    /// Exactly one detection must be present in the capture. Scoring
    /// combines the feature and image similarity at equal weight and
    /// accepts on a strict threshold comparison.
    pub fn decide(
        &self,
        capture: &Capture,
        profile: &IdentityProfile,
        existing: &[AttendanceRecord],
        today: NaiveDate,
    ) -> Result<MatchResult, VerifyError> {
        if already_marked(existing, &profile.identity, today) {
            return Err(VerifyError::AlreadyMarked(profile.identity.clone()));
        }

        match capture.detections.len() {
            0 => return Err(VerifyError::NoFaceDetected),
            1 => {}
            n => return Err(VerifyError::MultipleFacesDetected(n)),
        }

        let current = normalizer::normalize(&capture.detections[0])?;
        let feature_score = self.comparator.compare(Some(&current), Some(&profile.record));
        let image_score = image_score::compare_images(&capture.image, &profile.image)?;

        let combined_score = feature_score * FEATURE_WEIGHT + image_score * (1.0 - FEATURE_WEIGHT);
        let accepted = combined_score > self.accept_threshold;

        tracing::debug!(
            identity = %profile.identity,
            feature_score,
            image_score,
            combined_score,
            accepted,
            "match decision"
        );

        Ok(MatchResult { feature_score, image_score, combined_score, accepted })
    }
}

/// True when `existing` already holds a record for `identity` dated `today`.
pub fn already_marked(existing: &[AttendanceRecord], identity: &str, today: NaiveDate) -> bool {
    existing
        .iter()
        .any(|r| r.identity == identity && r.timestamp.date_naive() == today)
}
