use aruco_pose_core::CameraError;
use aruco_pose_detect::FrameError;

/// Errors from the end-to-end localization pipeline.
///
/// Only input validation fails the call; per-marker pose degeneracies are
/// logged and the affected candidate is dropped.
#[derive(thiserror::Error, Debug)]
pub enum LocalizeError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("invalid marker size {0}: must be positive and finite")]
    InvalidMarkerSize(f64),
}
