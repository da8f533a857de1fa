//! Planar pose estimation for square markers.
//!
//! Given the four image corners of a marker of known physical size and the
//! camera intrinsics, recovers the rigid transform from the marker frame to
//! the camera frame. The solver seeds from a homography decomposition and
//! polishes with orthogonal iteration (Lu, Hager & Mjolsness 2000); planar
//! targets can have two local minima, so the flipped solution is also
//! inspected (Schweighofer & Pinz 2006) and both are reported.

mod solve;

pub use solve::{estimate_marker_pose, MarkerPose, PoseError, PoseSolutions};
