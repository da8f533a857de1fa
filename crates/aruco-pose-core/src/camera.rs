//! Pinhole camera model with lens distortion.
//!
//! Intrinsics are validated on construction; distortion models are built
//! from ordered coefficient slices with the OpenCV layouts (4, 5 or 8
//! coefficients, or none at all).

use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Errors produced while validating camera inputs.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("invalid intrinsics: {reason}")]
    InvalidIntrinsics { reason: String },

    #[error("invalid distortion model: expected 0, 4, 5 or 8 coefficients, got {got}")]
    InvalidDistortionModel { got: usize },
}

/// Validated 3x3 camera intrinsic matrix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    k: Matrix3<f64>,
}

impl CameraIntrinsics {
    /// Validate and wrap an intrinsic matrix.
    ///
    /// Requires finite entries, positive focal lengths and a non-singular
    /// matrix; the bottom row must be `[0 0 1]` up to rounding.
    pub fn new(k: Matrix3<f64>) -> Result<Self, CameraError> {
        if k.iter().any(|v| !v.is_finite()) {
            return Err(CameraError::InvalidIntrinsics {
                reason: "non-finite entries".into(),
            });
        }
        if k[(0, 0)] <= 0.0 || k[(1, 1)] <= 0.0 {
            return Err(CameraError::InvalidIntrinsics {
                reason: format!("non-positive focal lengths fx={} fy={}", k[(0, 0)], k[(1, 1)]),
            });
        }
        if k.determinant().abs() < 1e-9 {
            return Err(CameraError::InvalidIntrinsics {
                reason: "singular matrix".into(),
            });
        }
        Ok(Self { k })
    }

    /// Build from a row-major 9-element slice.
    pub fn from_row_slice(values: &[f64; 9]) -> Result<Self, CameraError> {
        Self::new(Matrix3::from_row_slice(values))
    }

    #[inline]
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.k
    }

    #[inline]
    pub fn fx(&self) -> f64 {
        self.k[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f64 {
        self.k[(1, 1)]
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.k[(0, 2)]
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.k[(1, 2)]
    }

    /// Project a camera-frame point to pixel coordinates.
    #[inline]
    pub fn project(&self, p: &Vector3<f64>) -> Point2<f64> {
        Point2::new(
            self.fx() * p.x / p.z + self.cx(),
            self.fy() * p.y / p.z + self.cy(),
        )
    }

    /// Pixel coordinates to normalized camera coordinates (z = 1 plane).
    #[inline]
    pub fn normalize(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new((p.x - self.cx()) / self.fx(), (p.y - self.cy()) / self.fy())
    }

    /// Normalized camera coordinates back to pixels.
    #[inline]
    pub fn denormalize(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(p.x * self.fx() + self.cx(), p.y * self.fy() + self.cy())
    }
}

/// Brown-Conrady radial-tangential coefficients (`k1 k2 p1 p2 k3`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RadialTangential {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

/// Rational model: radial-tangential plus denominator terms (`k4 k5 k6`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rational {
    pub rt: RadialTangential,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
}

/// Lens distortion model selected by the coefficient count.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum DistortionModel {
    None,
    RadialTangential(RadialTangential),
    Rational(Rational),
}

/// Fixed-point iterations used to invert the distortion.
const UNDISTORT_ITERS: usize = 40;

impl DistortionModel {
    /// Build a model from an ordered coefficient slice.
    ///
    /// Accepted layouts (OpenCV convention):
    /// - `[]` — no distortion
    /// - `[k1, k2, p1, p2]`
    /// - `[k1, k2, p1, p2, k3]`
    /// - `[k1, k2, p1, p2, k3, k4, k5, k6]`
    pub fn from_coefficients(coeffs: &[f64]) -> Result<Self, CameraError> {
        if coeffs.iter().any(|v| !v.is_finite()) {
            return Err(CameraError::InvalidDistortionModel { got: coeffs.len() });
        }
        match *coeffs {
            [] => Ok(Self::None),
            [k1, k2, p1, p2] => Ok(Self::RadialTangential(RadialTangential {
                k1,
                k2,
                p1,
                p2,
                k3: 0.0,
            })),
            [k1, k2, p1, p2, k3] => {
                Ok(Self::RadialTangential(RadialTangential { k1, k2, p1, p2, k3 }))
            }
            [k1, k2, p1, p2, k3, k4, k5, k6] => Ok(Self::Rational(Rational {
                rt: RadialTangential { k1, k2, p1, p2, k3 },
                k4,
                k5,
                k6,
            })),
            _ => Err(CameraError::InvalidDistortionModel { got: coeffs.len() }),
        }
    }

    /// True when the model is a no-op (all coefficients zero).
    pub fn is_identity(&self) -> bool {
        match self {
            Self::None => true,
            Self::RadialTangential(rt) => *rt == RadialTangential::default(),
            Self::Rational(r) => *r == Rational::default(),
        }
    }

    /// Apply distortion to a point in normalized camera coordinates.
    pub fn distort(&self, p: Point2<f64>) -> Point2<f64> {
        let (rt, denom) = match self {
            Self::None => return p,
            Self::RadialTangential(rt) => (rt, None),
            Self::Rational(r) => (&r.rt, Some((r.k4, r.k5, r.k6))),
        };

        let x = p.x;
        let y = p.y;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let mut radial = 1.0 + rt.k1 * r2 + rt.k2 * r4 + rt.k3 * r6;
        if let Some((k4, k5, k6)) = denom {
            radial /= 1.0 + k4 * r2 + k5 * r4 + k6 * r6;
        }
        let x_tan = 2.0 * rt.p1 * x * y + rt.p2 * (r2 + 2.0 * x * x);
        let y_tan = rt.p1 * (r2 + 2.0 * y * y) + 2.0 * rt.p2 * x * y;
        Point2::new(x * radial + x_tan, y * radial + y_tan)
    }

    /// Invert the distortion via fixed-point iteration.
    ///
    /// The inverse has no closed form; the iteration converges quickly for
    /// realistic lens parameters.
    pub fn undistort(&self, distorted: Point2<f64>) -> Point2<f64> {
        if self.is_identity() {
            return distorted;
        }

        let mut p = distorted;
        for _ in 0..UNDISTORT_ITERS {
            let q = self.distort(p);
            let next = Point2::new(p.x + (distorted.x - q.x), p.y + (distorted.y - q.y));
            if !next.x.is_finite() || !next.y.is_finite() {
                return distorted;
            }
            let step = (next.x - p.x).abs() + (next.y - p.y).abs();
            p = next;
            if step < 1e-12 {
                break;
            }
        }
        p
    }
}
