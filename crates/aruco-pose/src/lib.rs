//! High-level facade crate for the `aruco-pose-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the underlying detection and pose crates
//! - the [`MarkerLocalizer`] pipeline, which takes a camera pixel buffer plus
//!   calibration and returns the id, image corners and camera-frame pose of
//!   every visible marker
//! - a binary wire format and UDP publisher for streaming detections.
//!
//! ## Quickstart
//!
//! ```no_run
//! use aruco_pose::{builtins, DetectorParams, MarkerLocalizer, PixelBuffer};
//! use nalgebra::Matrix3;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let localizer = MarkerLocalizer::new(builtins::DICT_4X4_50, DetectorParams::default());
//!
//! let pixels = vec![0u8; 640 * 480];
//! let frame = PixelBuffer::gray(640, 480, &pixels);
//! let camera = Matrix3::new(600.0, 0.0, 320.0, 0.0, 600.0, 240.0, 0.0, 0.0, 1.0);
//! let distortion = [-0.1, 0.02, 0.0, 0.0];
//!
//! // 5 cm markers
//! let markers = localizer.detect_and_localize(&frame, &camera, &distortion, 0.05)?;
//! for m in &markers {
//!     println!("marker {} at {:.3?}", m.id, m.position);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `aruco_pose::core`: image containers, homographies, the camera model.
//! - `aruco_pose::dict`: embedded dictionaries and code matching.
//! - `aruco_pose::detect`: frame ingest and the 2D marker detector.
//! - `aruco_pose::pnp`: planar pose recovery from four corners.
//! - `aruco_pose::publish`: detection packets over UDP.

pub use aruco_pose_core as core;
pub use aruco_pose_detect as detect;
pub use aruco_pose_dict as dict;
pub use aruco_pose_pnp as pnp;

pub use aruco_pose_core::{CameraError, CameraIntrinsics, DistortionModel};
pub use aruco_pose_detect::{DetectorParams, FrameError, PixelBuffer, PixelFormat};
pub use aruco_pose_dict::{builtins, Dictionary};
pub use aruco_pose_pnp::PoseError;

mod error;
mod pipeline;
pub mod publish;
mod result;

pub use error::LocalizeError;
pub use pipeline::{linked_and_loaded, MarkerLocalizer};
pub use result::DetectedMarker;
