//! Synthetic frame renderer shared by the integration tests.

use aruco_pose::core::{CameraIntrinsics, DistortionModel, GrayImage};
use nalgebra::{Point2, Rotation3, Vector3};

pub const BACKGROUND: u8 = 235;
pub const INK: u8 = 25;

/// A 4x4 marker placed in the camera frame.
pub struct SceneMarker {
    /// Row-major code, black = 1.
    pub code: u64,
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

pub fn camera() -> CameraIntrinsics {
    CameraIntrinsics::from_row_slice(&[600.0, 0.0, 320.0, 0.0, 600.0, 240.0, 0.0, 0.0, 1.0])
        .expect("test intrinsics")
}

/// Render markers seen through the given lens model.
///
/// Each pixel is supersampled on a 3x3 grid; rays go through the inverse of
/// the distortion, so passing the same model to the pipeline reproduces the
/// physical capture chain. Pixel centers sit at integer coordinates.
pub fn render_scene(
    width: usize,
    height: usize,
    k: &CameraIntrinsics,
    model: &DistortionModel,
    markers: &[SceneMarker],
    marker_size: f64,
) -> GrayImage {
    let offsets = [-1.0 / 3.0, 0.0, 1.0 / 3.0];
    let mut img = GrayImage::filled(width, height, BACKGROUND);

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0u32;
            for dy in offsets {
                for dx in offsets {
                    let p = Point2::new(x as f64 + dx, y as f64 + dy);
                    let n = model.undistort(k.normalize(p));
                    let ray = Vector3::new(n.x, n.y, 1.0);
                    sum += shade(&ray, markers, marker_size) as u32;
                }
            }
            img.data[y * width + x] = (sum / 9) as u8;
        }
    }

    img
}

/// Intensity along one camera ray: the nearest marker hit wins.
fn shade(ray: &Vector3<f64>, markers: &[SceneMarker], marker_size: f64) -> u8 {
    let mut best_depth = f64::INFINITY;
    let mut value = BACKGROUND;

    for m in markers {
        let rt = m.rotation.inverse();
        let dir = rt * ray;
        if dir.z.abs() < 1e-12 {
            continue;
        }
        let origin = rt * m.translation;
        // Marker plane is z = 0 in the marker frame.
        let depth = origin.z / dir.z;
        if depth <= 0.0 || depth >= best_depth {
            continue;
        }
        let hit = dir * depth - origin;

        let half = marker_size / 2.0;
        if hit.x.abs() >= half || hit.y.abs() >= half {
            continue;
        }

        let cell = marker_size / 6.0;
        let cx = ((hit.x + half) / cell) as usize;
        let cy = ((hit.y + half) / cell) as usize;
        let black = if cx == 0 || cy == 0 || cx == 5 || cy == 5 {
            true
        } else {
            (m.code >> ((cy - 1) * 4 + (cx - 1))) & 1 == 1
        };

        best_depth = depth;
        value = if black { INK } else { BACKGROUND };
    }

    value
}
