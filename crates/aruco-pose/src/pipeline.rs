//! End-to-end pipeline: pixel buffer in, localized markers out.

use aruco_pose_core::{CameraIntrinsics, DistortionModel};
use aruco_pose_detect::{undistort_image, MarkerDetector, PixelBuffer};
use aruco_pose_dict::Dictionary;
use aruco_pose_pnp::estimate_marker_pose;
use log::{debug, warn};
use nalgebra::Matrix3;

use crate::error::LocalizeError;
use crate::result::DetectedMarker;
use crate::DetectorParams;

/// Detects markers in camera frames and recovers their 3D poses.
///
/// Immutable after construction; every call owns its working buffers, so a
/// single instance can process frames from several threads concurrently.
#[derive(Clone, Debug)]
pub struct MarkerLocalizer {
    detector: MarkerDetector,
}

impl MarkerLocalizer {
    pub fn new(dictionary: Dictionary, params: DetectorParams) -> Self {
        Self {
            detector: MarkerDetector::new(dictionary, params),
        }
    }

    pub fn with_defaults(dictionary: Dictionary) -> Self {
        Self::new(dictionary, DetectorParams::default())
    }

    #[inline]
    pub fn params(&self) -> &DetectorParams {
        self.detector.params()
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.detector.dictionary()
    }

    /// Detect markers and recover their poses from a camera frame.
    ///
    /// `camera_matrix` is the 3x3 pinhole matrix, `distortion` an OpenCV-style
    /// coefficient slice (empty for an ideal lens) and `marker_size` the
    /// physical side length of the printed marker; positions come back in the
    /// same units.
    ///
    /// A frame with no visible markers yields an empty vector. Invalid
    /// calibration or buffers fail the whole call; a candidate whose pose
    /// solve degenerates is dropped with a warning instead.
    pub fn detect_and_localize(
        &self,
        frame: &PixelBuffer<'_>,
        camera_matrix: &Matrix3<f64>,
        distortion: &[f64],
        marker_size: f64,
    ) -> Result<Vec<DetectedMarker>, LocalizeError> {
        if !marker_size.is_finite() || marker_size <= 0.0 {
            return Err(LocalizeError::InvalidMarkerSize(marker_size));
        }
        let intrinsics = CameraIntrinsics::new(*camera_matrix)?;
        let model = DistortionModel::from_coefficients(distortion)?;

        let mut gray = frame.to_grayscale()?;
        if !model.is_identity() {
            gray = undistort_image(&gray.view(), &intrinsics, &model);
        }

        let detections = self.detector.detect(&gray.view());
        debug!("{} markers detected in {}x{} frame", detections.len(), gray.width, gray.height);

        let mut markers = Vec::with_capacity(detections.len());
        for d in &detections {
            let sol = match estimate_marker_pose(&d.corners, &intrinsics, marker_size) {
                Ok(sol) => sol,
                Err(e) => {
                    warn!("dropping marker {}: {e}", d.id);
                    continue;
                }
            };
            markers.push(DetectedMarker {
                id: d.id,
                corners: d.corners,
                position: sol.best.translation,
                orientation: sol.best.quaternion(),
                hamming: d.hamming,
                border_score: d.border_score,
                image_width: gray.width,
                image_height: gray.height,
            });
        }

        Ok(markers)
    }

    /// Legacy entry point without lens correction.
    pub fn estimate_pose(
        &self,
        frame: &PixelBuffer<'_>,
        camera_matrix: &Matrix3<f64>,
        marker_size: f64,
    ) -> Result<Vec<DetectedMarker>, LocalizeError> {
        self.detect_and_localize(frame, camera_matrix, &[], marker_size)
    }
}

/// Liveness probe for host applications checking that the library is
/// present and callable.
#[inline]
pub fn linked_and_loaded() -> bool {
    true
}
