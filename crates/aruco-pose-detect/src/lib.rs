//! Marker detection: frame ingest, quad candidates and bit-grid decoding.
//!
//! The pipeline implemented here is the classic one:
//! adaptive threshold -> contour tracing -> polygon approximation to convex
//! quads -> subpixel edge refinement -> perspective rectification ->
//! bit sampling -> dictionary match.
//!
//! Pose recovery lives in `aruco-pose-pnp`; this crate stops at decoded
//! markers with image-space corners.

mod contours;
mod decode;
mod detector;
mod ingest;
mod params;
mod refine;
mod threshold;

pub use detector::{MarkerDetection, MarkerDetector};
pub use ingest::{undistort_image, FrameError, PixelBuffer, PixelFormat};
pub use params::DetectorParams;
