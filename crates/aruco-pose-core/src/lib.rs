//! Core types and utilities for ArUco marker pose estimation.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! know anything about markers or dictionaries; it provides:
//! - lightweight grayscale image containers and sampling,
//! - 4-point projective homographies,
//! - a validated pinhole camera model with lens distortion.

mod camera;
mod homography;
mod image;
mod logger;

pub use camera::{CameraError, CameraIntrinsics, DistortionModel, RadialTangential, Rational};
pub use homography::{homography_from_quad, Homography};
pub use image::{sample_bilinear, sample_bilinear_u8, sample_mean_3x3, GrayImage, GrayImageView};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
