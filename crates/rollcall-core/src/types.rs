use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One face localization from the external detector, for a single frame.
///
/// Coordinates are frame pixels. Landmarks follow the detector's positional
/// convention: index 0 = right eye, 1 = left eye, 2 = nose, 3 = mouth,
/// 4–5 = ear/reference points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "topLeft")]
    pub top_left: (f32, f32),
    #[serde(rename = "bottomRight")]
    pub bottom_right: (f32, f32),
    pub landmarks: Vec<(f32, f32)>,
    /// Detector confidence in [0, 1].
    pub probability: f32,
}

/// Distances derived from the landmark set, normalized by the box size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeometricFeatures {
    /// Inter-eye distance / box width.
    #[serde(rename = "eyeDistance")]
    pub eye_distance: f32,
    /// Nose-to-mouth distance / box height.
    #[serde(rename = "noseToMouth")]
    pub nose_to_mouth: f32,
}

/// Normalized, scale- and position-invariant face signature.
///
/// `features` is present only when the detection carried enough landmarks
/// to derive them. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: f32,
    pub features: Option<GeometricFeatures>,
    /// Landmarks remapped to box-relative unit coordinates.
    pub landmarks: Vec<(f32, f32)>,
    pub probability: f32,
}

/// One webcam capture submitted for scoring: everything the external
/// detector returned for the frame, plus the encoded snapshot.
#[derive(Debug, Clone)]
pub struct Capture {
    pub detections: Vec<RawDetection>,
    /// Encoded image bytes (any format the decoder understands).
    pub image: Vec<u8>,
}

/// Enrolled face data for one identity: the feature record and reference
/// image captured at registration. Read-only input to the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub identity: String,
    pub record: FeatureRecord,
    /// Encoded reference image bytes.
    #[serde(with = "serde_bytes_base64")]
    pub image: Vec<u8>,
    pub enrolled_at: DateTime<Utc>,
}

/// Outcome of one verification attempt. Not persisted by the engine;
/// accepted outcomes are recorded by the caller as [`AttendanceRecord`]s.
#[derive(Debug, Clone, Copy)]
pub struct MatchResult {
    pub feature_score: f32,
    pub image_score: f32,
    pub combined_score: f32,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
}

/// One persisted attendance entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub identity: String,
    pub timestamp: DateTime<Utc>,
    pub status: AttendanceStatus,
    #[serde(rename = "matchScore")]
    pub match_score: f32,
}

impl AttendanceRecord {
    /// A `Present` record for `identity`, stamped now.
    pub fn present(identity: &str, match_score: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            timestamp: Utc::now(),
            status: AttendanceStatus::Present,
            match_score,
        }
    }
}

/// Base64 (de)serialization for image byte blobs — keeps the JSON store
/// document readable and matches how snapshots arrive from capture shells
/// (data-URL payloads).
mod serde_bytes_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(serde::de::Error::custom)
    }
}
