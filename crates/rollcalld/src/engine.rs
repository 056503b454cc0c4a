use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use rollcall_core::{
    normalizer, AttendanceRecord, Capture, DecisionEngine, IdentityProfile, MatchResult,
    VerifyError,
};
use rollcall_store::{AttendanceStore, IdentityStore, StoreError};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Outcome of a mark-attendance request: the scores, plus the persisted
/// record when the match was accepted.
pub struct MarkOutcome {
    pub result: MatchResult,
    pub record: Option<AttendanceRecord>,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Enroll {
        identity: String,
        capture: Capture,
        reply: oneshot::Sender<Result<IdentityProfile, EngineError>>,
    },
    Mark {
        identity: String,
        capture: Capture,
        reply: oneshot::Sender<Result<MarkOutcome, EngineError>>,
    },
    Verify {
        identity: String,
        capture: Capture,
        threshold: f32,
        reply: oneshot::Sender<Result<MatchResult, EngineError>>,
    },
    ListRecords {
        identity: Option<String>,
        reply: oneshot::Sender<Result<Vec<AttendanceRecord>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Request enrollment: normalize the capture and store the profile.
    pub async fn enroll(
        &self,
        identity: String,
        capture: Capture,
    ) -> Result<IdentityProfile, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Enroll { identity, capture, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request attendance marking: score the capture and persist a record
    /// on acceptance.
    pub async fn mark_attendance(
        &self,
        identity: String,
        capture: Capture,
    ) -> Result<MarkOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Mark { identity, capture, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request verification at a caller-supplied threshold; nothing is
    /// persisted.
    pub async fn verify(
        &self,
        identity: String,
        capture: Capture,
        threshold: f32,
    ) -> Result<MatchResult, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Verify { identity, capture, threshold, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Request attendance records, optionally filtered by identity.
    pub async fn list_records(
        &self,
        identity: Option<String>,
    ) -> Result<Vec<AttendanceRecord>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::ListRecords { identity, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The thread owns the stores and the decision engine and services
/// requests one at a time, so image decoding and scoring never block the
/// async executor and store access needs no further coordination.
pub fn spawn_engine(
    identities: Arc<dyn IdentityStore>,
    attendance: Arc<dyn AttendanceStore>,
    config: &Config,
) -> EngineHandle {
    let accept_threshold = config.accept_threshold;
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!(accept_threshold, "engine thread started");
            let engine = DecisionEngine::new(accept_threshold);
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Enroll { identity, capture, reply } => {
                        let _ = reply.send(run_enroll(identities.as_ref(), &identity, capture));
                    }
                    EngineRequest::Mark { identity, capture, reply } => {
                        let _ = reply.send(run_mark(
                            &engine,
                            identities.as_ref(),
                            attendance.as_ref(),
                            &identity,
                            &capture,
                        ));
                    }
                    EngineRequest::Verify { identity, capture, threshold, reply } => {
                        let _ = reply.send(run_verify(
                            identities.as_ref(),
                            &identity,
                            &capture,
                            threshold,
                        ));
                    }
                    EngineRequest::ListRecords { identity, reply } => {
                        let _ = reply.send(run_list(attendance.as_ref(), identity.as_deref()));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

/// Validate the capture, normalize its detection, and store the profile.
/// Re-enrolling an identity replaces the previous profile.
fn run_enroll(
    identities: &dyn IdentityStore,
    identity: &str,
    capture: Capture,
) -> Result<IdentityProfile, EngineError> {
    let detection = match capture.detections.as_slice() {
        [] => return Err(VerifyError::NoFaceDetected.into()),
        [single] => single,
        many => return Err(VerifyError::MultipleFacesDetected(many.len()).into()),
    };

    let record = normalizer::normalize(detection)?;
    let profile = IdentityProfile {
        identity: identity.to_string(),
        record,
        image: capture.image,
        enrolled_at: Utc::now(),
    };
    identities.put(profile.clone())?;

    tracing::info!(identity, "profile enrolled");
    Ok(profile)
}

/// Score the capture against the enrolled profile and persist a record on
/// acceptance.
fn run_mark(
    engine: &DecisionEngine,
    identities: &dyn IdentityStore,
    attendance: &dyn AttendanceStore,
    identity: &str,
    capture: &Capture,
) -> Result<MarkOutcome, EngineError> {
    let profile = identities
        .get(identity)?
        .ok_or_else(|| VerifyError::MissingProfile(identity.to_string()))?;

    let today = Utc::now().date_naive();
    let existing = attendance.records_on(today)?;
    let result = engine.decide(capture, &profile, &existing, today)?;

    if !result.accepted {
        tracing::info!(identity, score = result.combined_score, "match rejected");
        return Ok(MarkOutcome { result, record: None });
    }

    let record = AttendanceRecord::present(identity, result.combined_score);
    if !attendance.insert_if_absent(record.clone())? {
        // The advisory pre-check raced with another writer; the store
        // guard is authoritative.
        return Err(VerifyError::AlreadyMarked(identity.to_string()).into());
    }

    tracing::info!(identity, score = result.combined_score, "attendance marked");
    Ok(MarkOutcome { result, record: Some(record) })
}

/// Score the capture at a per-call threshold without touching the
/// attendance log. The login call site runs this at its own cutoff.
fn run_verify(
    identities: &dyn IdentityStore,
    identity: &str,
    capture: &Capture,
    threshold: f32,
) -> Result<MatchResult, EngineError> {
    let profile = identities
        .get(identity)?
        .ok_or_else(|| VerifyError::MissingProfile(identity.to_string()))?;

    let engine = DecisionEngine::new(threshold);
    let result = engine.decide(capture, &profile, &[], Utc::now().date_naive())?;

    tracing::info!(identity, threshold, score = result.combined_score, accepted = result.accepted, "verify scored");
    Ok(result)
}

fn run_list(
    attendance: &dyn AttendanceStore,
    identity: Option<&str>,
) -> Result<Vec<AttendanceRecord>, EngineError> {
    Ok(match identity {
        Some(identity) => attendance.records_for(identity)?,
        None => attendance.all_records()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rollcall_core::RawDetection;
    use rollcall_store::MemoryStore;

    fn png_bytes(color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(48, 48, Rgb(color));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("png encode");
        bytes
    }

    fn detection(probability: f32) -> RawDetection {
        RawDetection {
            top_left: (40.0, 30.0),
            bottom_right: (200.0, 230.0),
            landmarks: vec![
                (80.0, 100.0),
                (160.0, 100.0),
                (120.0, 150.0),
                (120.0, 190.0),
                (50.0, 110.0),
                (190.0, 110.0),
            ],
            probability,
        }
    }

    fn capture(probability: f32, color: [u8; 3]) -> Capture {
        Capture { detections: vec![detection(probability)], image: png_bytes(color) }
    }

    fn test_engine() -> DecisionEngine {
        DecisionEngine::new(0.3)
    }

    #[test]
    fn test_enroll_then_mark_then_duplicate() {
        let store = MemoryStore::new();
        let engine = test_engine();

        run_enroll(&store, "alice", capture(0.97, [120, 110, 100])).unwrap();

        let outcome = run_mark(&engine, &store, &store, "alice", &capture(0.98, [120, 110, 100]))
            .unwrap();
        assert!(outcome.result.accepted);
        let record = outcome.record.unwrap();
        assert_eq!(record.identity, "alice");
        assert!((record.match_score - outcome.result.combined_score).abs() < 1e-6);

        // Second mark the same day short-circuits on the duplicate check
        let again = run_mark(&engine, &store, &store, "alice", &capture(0.98, [120, 110, 100]));
        assert!(matches!(again, Err(EngineError::Verify(VerifyError::AlreadyMarked(_)))));
        assert_eq!(store.records_for("alice").unwrap().len(), 1);
    }

    #[test]
    fn test_mark_rejection_persists_nothing() {
        let store = MemoryStore::new();
        let engine = test_engine();

        run_enroll(&store, "alice", capture(0.97, [0, 0, 255])).unwrap();

        // Distant confidence + unrelated image → rejected
        let outcome = run_mark(&engine, &store, &store, "alice", &capture(0.80, [255, 0, 0]))
            .unwrap();
        assert!(!outcome.result.accepted);
        assert!(outcome.record.is_none());
        assert!(store.all_records().unwrap().is_empty());
    }

    #[test]
    fn test_mark_unknown_identity() {
        let store = MemoryStore::new();
        let engine = test_engine();

        let result = run_mark(&engine, &store, &store, "nobody", &capture(0.9, [1, 2, 3]));
        assert!(matches!(
            result,
            Err(EngineError::Verify(VerifyError::MissingProfile(id))) if id == "nobody"
        ));
    }

    #[test]
    fn test_enroll_requires_exactly_one_face() {
        let store = MemoryStore::new();

        let empty = Capture { detections: vec![], image: png_bytes([1, 2, 3]) };
        assert!(matches!(
            run_enroll(&store, "alice", empty),
            Err(EngineError::Verify(VerifyError::NoFaceDetected))
        ));

        let crowded = Capture {
            detections: vec![detection(0.9), detection(0.8), detection(0.7)],
            image: png_bytes([1, 2, 3]),
        };
        assert!(matches!(
            run_enroll(&store, "alice", crowded),
            Err(EngineError::Verify(VerifyError::MultipleFacesDetected(3)))
        ));
    }

    #[test]
    fn test_verify_threshold_is_per_call() {
        let store = MemoryStore::new();
        run_enroll(&store, "alice", capture(0.97, [120, 110, 100])).unwrap();

        // Feature 0 (delta 0.17), image 1.0 → combined 0.5
        let probe = capture(0.80, [120, 110, 100]);
        let lenient = run_verify(&store, "alice", &probe, 0.35).unwrap();
        assert!(lenient.accepted);

        let strict = run_verify(&store, "alice", &probe, 0.75).unwrap();
        assert!(!strict.accepted);

        // Verification never writes attendance
        assert!(store.all_records().unwrap().is_empty());
    }

    #[test]
    fn test_list_filters_by_identity() {
        let store = MemoryStore::new();
        let engine = test_engine();

        run_enroll(&store, "alice", capture(0.97, [9, 9, 9])).unwrap();
        run_enroll(&store, "bob", capture(0.91, [9, 9, 9])).unwrap();
        run_mark(&engine, &store, &store, "alice", &capture(0.97, [9, 9, 9])).unwrap();
        run_mark(&engine, &store, &store, "bob", &capture(0.91, [9, 9, 9])).unwrap();

        assert_eq!(run_list(&store, Some("alice")).unwrap().len(), 1);
        assert_eq!(run_list(&store, None).unwrap().len(), 2);
    }
}
