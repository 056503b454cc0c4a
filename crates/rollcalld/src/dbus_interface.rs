use std::future::Future;
use std::time::Duration;

use zbus::interface;

use rollcall_core::{Capture, RawDetection};

use crate::config::Config;
use crate::engine::{EngineError, EngineHandle};

/// D-Bus interface for the Rollcall attendance daemon.
///
/// Bus name: org.rollcall.Rollcall1
/// Object path: /org/rollcall/Rollcall1
///
/// Captures arrive as the external detector's JSON output plus the encoded
/// snapshot bytes; results leave as JSON strings.
pub struct RollcallService {
    engine: EngineHandle,
    accept_threshold: f32,
    login_threshold: f32,
    request_timeout: Duration,
}

impl RollcallService {
    pub fn new(engine: EngineHandle, config: &Config) -> Self {
        Self {
            engine,
            accept_threshold: config.accept_threshold,
            login_threshold: config.login_threshold,
            request_timeout: Duration::from_secs(config.verify_timeout_secs),
        }
    }

    /// Bound one engine request; a capture that never finishes decoding
    /// must not wedge the bus handler.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, EngineError>>,
    ) -> zbus::fdo::Result<T> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result.map_err(to_fdo),
            Err(_) => Err(zbus::fdo::Error::Failed("scoring request timed out".into())),
        }
    }
}

#[interface(name = "org.rollcall.Rollcall1")]
impl RollcallService {
    /// Enroll a face capture for the given identity, replacing any
    /// previous enrollment.
    async fn enroll(
        &self,
        identity: &str,
        detections_json: &str,
        image: Vec<u8>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(identity, "enroll requested");
        let capture = parse_capture(detections_json, image)?;
        let profile = self
            .bounded(self.engine.enroll(identity.to_string(), capture))
            .await?;
        Ok(serde_json::json!({
            "identity": profile.identity,
            "enrolledAt": profile.enrolled_at.to_rfc3339(),
            "probability": profile.record.probability,
        })
        .to_string())
    }

    /// Score a capture against the enrolled profile and record today's
    /// attendance when it is accepted.
    async fn mark_attendance(
        &self,
        identity: &str,
        detections_json: &str,
        image: Vec<u8>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(identity, "mark attendance requested");
        let capture = parse_capture(detections_json, image)?;
        let outcome = self
            .bounded(self.engine.mark_attendance(identity.to_string(), capture))
            .await?;
        Ok(serde_json::json!({
            "accepted": outcome.result.accepted,
            "featureScore": outcome.result.feature_score,
            "imageScore": outcome.result.image_score,
            "combinedScore": outcome.result.combined_score,
            "recordId": outcome.record.as_ref().map(|r| r.id.to_string()),
        })
        .to_string())
    }

    /// Score a capture against the enrolled profile without recording
    /// attendance. A non-positive threshold selects the configured login
    /// cutoff.
    async fn verify(
        &self,
        identity: &str,
        detections_json: &str,
        image: Vec<u8>,
        threshold: f64,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(identity, threshold, "verify requested");
        let capture = parse_capture(detections_json, image)?;
        let threshold = if threshold > 0.0 {
            threshold as f32
        } else {
            self.login_threshold
        };
        let result = self
            .bounded(self.engine.verify(identity.to_string(), capture, threshold))
            .await?;
        Ok(serde_json::json!({
            "accepted": result.accepted,
            "featureScore": result.feature_score,
            "imageScore": result.image_score,
            "combinedScore": result.combined_score,
            "threshold": threshold,
        })
        .to_string())
    }

    /// List attendance records as JSON; an empty identity lists everyone.
    async fn list_records(&self, identity: &str) -> zbus::fdo::Result<String> {
        let filter = if identity.is_empty() {
            None
        } else {
            Some(identity.to_string())
        };
        let records = self.engine.list_records(filter).await.map_err(to_fdo)?;
        serde_json::to_string(&records)
            .map_err(|e| zbus::fdo::Error::Failed(format!("serializing records: {e}")))
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "acceptThreshold": self.accept_threshold,
            "loginThreshold": self.login_threshold,
        })
        .to_string())
    }
}

fn parse_capture(detections_json: &str, image: Vec<u8>) -> zbus::fdo::Result<Capture> {
    let detections: Vec<RawDetection> = serde_json::from_str(detections_json)
        .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("detections: {e}")))?;
    Ok(Capture { detections, image })
}

fn to_fdo(err: EngineError) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(err.to_string())
}
