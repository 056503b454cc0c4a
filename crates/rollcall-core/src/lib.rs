//! rollcall-core — face-match scoring and attendance decision engine.
//!
//! Turns raw face-detector output into scale-invariant feature records,
//! scores similarity from detector confidence and downsampled pixel
//! voting, and gates attendance marking behind a configurable acceptance
//! threshold. Face detection itself is an external collaborator: callers
//! run a third-party detector and hand its per-frame output to this crate.

pub mod comparator;
pub mod decision;
pub mod error;
pub mod image_score;
pub mod normalizer;
pub mod types;

pub use comparator::{ConfidenceComparator, FeatureComparator};
pub use decision::DecisionEngine;
pub use error::VerifyError;
pub use types::{
    AttendanceRecord, AttendanceStatus, Capture, FeatureRecord, GeometricFeatures,
    IdentityProfile, MatchResult, RawDetection,
};
