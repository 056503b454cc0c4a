use thiserror::Error;

/// Failure taxonomy for one verification attempt.
///
/// Every variant is recovered at the service boundary and reported back to
/// the caller; none abort the host process. The caller owns user-facing
/// messaging and typically re-prompts for a fresh capture.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("degenerate bounding box: bottom-right must lie below and right of top-left")]
    InvalidDetection,
    #[error("no face detected in frame")]
    NoFaceDetected,
    #[error("{0} faces detected in frame; exactly one required")]
    MultipleFacesDetected(usize),
    #[error("no enrolled profile for identity {0:?}")]
    MissingProfile(String),
    #[error("image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("attendance already marked today for {0:?}")]
    AlreadyMarked(String),
    #[error("verification failed: {0}")]
    Failed(String),
}
