use aruco_pose_core::CameraIntrinsics;
use nalgebra::{Point2, Rotation3, UnitQuaternion, Vector3};

/// One localized marker: identity, image corners and camera-frame pose.
#[derive(Clone, Copy, Debug)]
pub struct DetectedMarker {
    /// Dictionary id.
    pub id: u32,
    /// Undistorted image corners, clockwise from the marker's canonical
    /// top-left.
    pub corners: [Point2<f32>; 4],
    /// Marker center in the camera frame, in the units of the marker size.
    pub position: Vector3<f64>,
    /// Marker-to-camera orientation.
    pub orientation: UnitQuaternion<f64>,
    /// Bit errors corrected during dictionary matching.
    pub hamming: u8,
    /// Fraction of border cells sampled as black.
    pub border_score: f32,
    /// Dimensions of the frame this detection came from.
    pub image_width: usize,
    pub image_height: usize,
}

impl DetectedMarker {
    /// Axis-angle rotation vector (Rodrigues form).
    #[inline]
    pub fn rotation_vector(&self) -> Vector3<f64> {
        self.orientation.scaled_axis()
    }

    #[inline]
    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        self.orientation.to_rotation_matrix()
    }

    /// Image-space endpoints of the marker frame for overlay rendering:
    /// the origin followed by the tips of the x, y and z axes, each of
    /// length `axis_len`.
    pub fn axis_endpoints(&self, intrinsics: &CameraIntrinsics, axis_len: f64) -> [Point2<f64>; 4] {
        let r = self.rotation_matrix();
        let tips = [
            Vector3::zeros(),
            Vector3::new(axis_len, 0.0, 0.0),
            Vector3::new(0.0, axis_len, 0.0),
            Vector3::new(0.0, 0.0, axis_len),
        ];
        tips.map(|v| intrinsics.project(&(r * v + self.position)))
    }
}
