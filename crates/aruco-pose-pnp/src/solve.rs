use aruco_pose_core::{homography_from_quad, CameraIntrinsics};
use nalgebra::{Matrix3, Point2, Rotation3, UnitQuaternion, Vector3};

const OI_ITERS: usize = 50;

/// Errors produced during pose recovery.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PoseError {
    #[error("degenerate marker geometry: {reason}")]
    DegeneratePose { reason: &'static str },
}

/// Rigid transform from the marker frame to the camera frame.
///
/// The marker frame has its origin at the marker center, x to the right and
/// y downward along the printed marker, z completing the right-handed frame
/// (away from the camera for a frontal view); a frontally viewed marker
/// therefore has an identity rotation.
#[derive(Clone, Copy, Debug)]
pub struct MarkerPose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    /// Object-space residual of the solution (squared, summed over corners).
    pub error: f64,
}

impl MarkerPose {
    /// Axis-angle rotation vector (Rodrigues form).
    #[inline]
    pub fn rotation_vector(&self) -> Vector3<f64> {
        self.rotation.scaled_axis()
    }

    #[inline]
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_rotation_matrix(&self.rotation)
    }
}

/// Best pose plus the alternate local minimum of the planar problem.
#[derive(Clone, Copy, Debug)]
pub struct PoseSolutions {
    pub best: MarkerPose,
    /// Second local minimum, when one exists with higher error.
    pub alternate: Option<MarkerPose>,
}

impl PoseSolutions {
    /// Ratio `best.error / alternate.error` in `[0, 1]`; values near 1 mean
    /// the two interpretations are hard to tell apart.
    pub fn ambiguity(&self) -> Option<f64> {
        self.alternate.as_ref().map(|alt| {
            if alt.error > 0.0 {
                self.best.error / alt.error
            } else {
                1.0
            }
        })
    }
}

/// Marker-frame corners, matching the detector's canonical image order
/// (top-left, top-right, bottom-right, bottom-left).
fn object_corners(half: f64) -> [Vector3<f64>; 4] {
    [
        Vector3::new(-half, -half, 0.0),
        Vector3::new(half, -half, 0.0),
        Vector3::new(half, half, 0.0),
        Vector3::new(-half, half, 0.0),
    ]
}

/// Recover the marker pose from its four image corners.
///
/// `corners` must be in the detector's canonical order; `marker_size` is
/// the physical side length of the black border in caller units.
pub fn estimate_marker_pose(
    corners: &[Point2<f32>; 4],
    intrinsics: &CameraIntrinsics,
    marker_size: f64,
) -> Result<PoseSolutions, PoseError> {
    let half = marker_size / 2.0;
    let obj = object_corners(half);

    // Work in normalized camera coordinates throughout.
    let mut rays = [Vector3::zeros(); 4];
    let mut img_n = [Point2::new(0.0_f64, 0.0); 4];
    for i in 0..4 {
        let n = intrinsics.normalize(Point2::new(corners[i].x as f64, corners[i].y as f64));
        if !n.x.is_finite() || !n.y.is_finite() {
            return Err(PoseError::DegeneratePose {
                reason: "non-finite corner coordinates",
            });
        }
        img_n[i] = n;
        rays[i] = Vector3::new(n.x, n.y, 1.0);
    }

    let (r_init, t_init) = homography_seed(&img_n, half)?;

    let (pose1, err1) = orthogonal_iteration(&rays, &obj, r_init, t_init);
    let first = MarkerPose {
        rotation: pose1.0,
        translation: pose1.1,
        error: err1,
    };
    validate(&first)?;

    let second = second_minimum(&rays, &obj, &first);

    Ok(match second {
        Some(alt) if alt.error < first.error => {
            if validate(&alt).is_ok() {
                PoseSolutions {
                    best: alt,
                    alternate: Some(first),
                }
            } else {
                PoseSolutions {
                    best: first,
                    alternate: None,
                }
            }
        }
        Some(alt) => PoseSolutions {
            best: first,
            alternate: validate(&alt).ok().map(|_| alt),
        },
        None => PoseSolutions {
            best: first,
            alternate: None,
        },
    })
}

fn validate(pose: &MarkerPose) -> Result<(), PoseError> {
    if !pose.error.is_finite()
        || pose.translation.iter().any(|v| !v.is_finite())
        || pose.rotation.matrix().iter().any(|v| !v.is_finite())
    {
        return Err(PoseError::DegeneratePose {
            reason: "non-finite solution",
        });
    }
    if pose.translation.z <= 0.0 {
        return Err(PoseError::DegeneratePose {
            reason: "marker behind the camera",
        });
    }
    Ok(())
}

/// Seed rotation and translation from the plane-to-plane homography.
///
/// In normalized coordinates `H ~ [r0 r1 t]` for a z = 0 plane, so the
/// first two columns give the rotation up to scale and the third the
/// translation.
fn homography_seed(
    img_n: &[Point2<f64>; 4],
    half: f64,
) -> Result<(Rotation3<f64>, Vector3<f64>), PoseError> {
    let obj2d = [
        Point2::new(-half, -half),
        Point2::new(half, -half),
        Point2::new(half, half),
        Point2::new(-half, half),
    ];
    let h = homography_from_quad(&obj2d, img_n).ok_or(PoseError::DegeneratePose {
        reason: "repeated or collinear corners",
    })?;

    let c0 = h.h.column(0).into_owned();
    let c1 = h.h.column(1).into_owned();
    let c2 = h.h.column(2).into_owned();

    let scale = 0.5 * (c0.norm() + c1.norm());
    if scale < 1e-12 {
        return Err(PoseError::DegeneratePose {
            reason: "vanishing homography scale",
        });
    }

    let r0 = c0 / scale;
    let r1 = c1 / scale;
    let r2 = r0.cross(&r1);
    let r_raw = Matrix3::from_columns(&[r0, r1, r2]);
    let r = project_to_so3(&r_raw).ok_or(PoseError::DegeneratePose {
        reason: "rotation seed has no SVD",
    })?;

    Ok((r, c2 / scale))
}

/// Nearest rotation in the Frobenius sense: `R = U V^T` with a sign fix
/// when the product lands on a reflection.
fn project_to_so3(m: &Matrix3<f64>) -> Option<Rotation3<f64>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.column_mut(2).neg_mut();
        r = u_fixed * v_t;
    }
    Some(Rotation3::from_matrix_unchecked(r))
}

/// Orthogonal iteration of Lu, Hager & Mjolsness (2000), minimizing the
/// object-space error over rotation and translation.
fn orthogonal_iteration(
    rays: &[Vector3<f64>; 4],
    obj: &[Vector3<f64>; 4],
    r_init: Rotation3<f64>,
    t_init: Vector3<f64>,
) -> ((Rotation3<f64>, Vector3<f64>), f64) {
    // Line-of-sight projection operators F_i = v v^T / (v^T v).
    let mut f_ops = [Matrix3::zeros(); 4];
    for i in 0..4 {
        f_ops[i] = rays[i] * rays[i].transpose() / rays[i].norm_squared();
    }

    let p_mean: Vector3<f64> = (obj[0] + obj[1] + obj[2] + obj[3]) / 4.0;
    let p_res = [
        obj[0] - p_mean,
        obj[1] - p_mean,
        obj[2] - p_mean,
        obj[3] - p_mean,
    ];

    let f_mean = (f_ops[0] + f_ops[1] + f_ops[2] + f_ops[3]) / 4.0;
    let m1_inv = (Matrix3::identity() - f_mean)
        .try_inverse()
        .unwrap_or_else(Matrix3::identity);

    let mut r = r_init;
    let mut t = t_init;

    for _ in 0..OI_ITERS {
        // Optimal translation for the current rotation.
        let mut m2 = Vector3::zeros();
        for i in 0..4 {
            let rp = r * obj[i];
            m2 += (f_ops[i] * rp - rp) / 4.0;
        }
        t = m1_inv * m2;

        // Optimal rotation for the projected points q_i = F_i (R p_i + t).
        let mut q = [Vector3::zeros(); 4];
        let mut q_mean = Vector3::zeros();
        for i in 0..4 {
            q[i] = f_ops[i] * (r * obj[i] + t);
            q_mean += q[i] / 4.0;
        }
        let mut m3 = Matrix3::zeros();
        for i in 0..4 {
            m3 += (q[i] - q_mean) * p_res[i].transpose();
        }
        let Some(r_new) = project_to_so3(&m3) else {
            break;
        };
        r = r_new;
    }

    let err = object_space_error(&f_ops, &r, &t, obj);
    ((r, t), err)
}

fn object_space_error(
    f_ops: &[Matrix3<f64>; 4],
    r: &Rotation3<f64>,
    t: &Vector3<f64>,
    obj: &[Vector3<f64>; 4],
) -> f64 {
    let mut err = 0.0;
    for i in 0..4 {
        let p = r * obj[i] + t;
        let d = p - f_ops[i] * p;
        err += d.norm_squared();
    }
    err
}

/// Probe for the flipped local minimum of the planar pose problem.
///
/// The alternate solution sits near a 180-degree rotation about the line of
/// sight to the marker center; iterating from that reflected start either
/// converges to a distinct minimum or back to the first one.
fn second_minimum(
    rays: &[Vector3<f64>; 4],
    obj: &[Vector3<f64>; 4],
    first: &MarkerPose,
) -> Option<MarkerPose> {
    let t_norm = first.translation.norm();
    if t_norm < 1e-10 {
        return None;
    }
    let n = first.translation / t_norm;

    let reflect = 2.0 * (n * n.transpose()) - Matrix3::identity();
    let r2_raw = reflect * first.rotation.matrix();
    let r2 = project_to_so3(&r2_raw)?;

    // Skip when the reflected start is essentially the same rotation.
    let angle = first.rotation.rotation_to(&r2).angle();
    if angle < 0.1 {
        return None;
    }

    let ((r, t), err) = orthogonal_iteration(rays, obj, r2, first.translation);
    Some(MarkerPose {
        rotation: r,
        translation: t,
        error: err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::from_row_slice(&[500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0])
            .expect("intrinsics")
    }

    fn project_corners(
        k: &CameraIntrinsics,
        r: &Rotation3<f64>,
        t: &Vector3<f64>,
        size: f64,
    ) -> [Point2<f32>; 4] {
        object_corners(size / 2.0).map(|p| {
            let c = r * p + t;
            let px = k.project(&c);
            Point2::new(px.x as f32, px.y as f32)
        })
    }

    #[test]
    fn frontal_marker_recovers_identity_pose() {
        let k = intrinsics();
        let t = Vector3::new(0.0, 0.0, 0.5);
        let corners = project_corners(&k, &Rotation3::identity(), &t, 0.1);

        let sol = estimate_marker_pose(&corners, &k, 0.1).expect("pose");
        assert!(sol.best.rotation.angle() < 1e-3, "angle={}", sol.best.rotation.angle());
        assert_relative_eq!(sol.best.translation, t, epsilon = 1e-3);
        assert!(sol.best.error < 1e-8, "error={}", sol.best.error);
    }

    #[test]
    fn offset_marker_recovers_translation() {
        let k = intrinsics();
        let t = Vector3::new(0.2, -0.1, 0.8);
        let corners = project_corners(&k, &Rotation3::identity(), &t, 0.05);

        let sol = estimate_marker_pose(&corners, &k, 0.05).expect("pose");
        assert_relative_eq!(sol.best.translation, t, epsilon = 2e-3);
        assert!(sol.best.error < 1e-8);
    }

    #[test]
    fn oblique_marker_recovers_rotation_and_reports_alternate() {
        let k = intrinsics();
        let r_true = Rotation3::from_axis_angle(&Vector3::y_axis(), 0.7);
        let t = Vector3::new(0.05, 0.02, 1.0);
        let corners = project_corners(&k, &r_true, &t, 0.2);

        let sol = estimate_marker_pose(&corners, &k, 0.2).expect("pose");
        let angle_diff = sol.best.rotation.rotation_to(&r_true).angle();
        assert!(angle_diff < 0.02, "rotation off by {angle_diff} rad");
        assert_relative_eq!(sol.best.translation, t, epsilon = 5e-3);
        assert!(sol.alternate.is_some(), "oblique view must report the flipped solution");
        let ambiguity = sol.ambiguity().expect("ambiguity for two solutions");
        assert!(ambiguity <= 1.0);
    }

    #[test]
    fn rotation_vector_matches_quaternion() {
        let k = intrinsics();
        let r_true = Rotation3::from_axis_angle(&Vector3::x_axis(), 0.4);
        let t = Vector3::new(0.0, 0.0, 0.6);
        let corners = project_corners(&k, &r_true, &t, 0.1);

        let sol = estimate_marker_pose(&corners, &k, 0.1).expect("pose");
        let rvec = sol.best.rotation_vector();
        let from_quat = sol.best.quaternion().scaled_axis();
        assert_relative_eq!(rvec, from_quat, epsilon = 1e-9);
        assert_relative_eq!(rvec.norm(), 0.4, epsilon = 0.02);
    }

    #[test]
    fn repeated_corners_are_degenerate() {
        let k = intrinsics();
        let corners = [Point2::new(320.0_f32, 240.0); 4];
        let err = estimate_marker_pose(&corners, &k, 0.1).unwrap_err();
        assert!(matches!(err, PoseError::DegeneratePose { .. }));
    }

    #[test]
    fn collinear_corners_are_degenerate() {
        let k = intrinsics();
        let corners = [
            Point2::new(100.0_f32, 100.0),
            Point2::new(150.0_f32, 100.0),
            Point2::new(200.0_f32, 100.0),
            Point2::new(250.0_f32, 100.0),
        ];
        let err = estimate_marker_pose(&corners, &k, 0.1).unwrap_err();
        assert!(matches!(err, PoseError::DegeneratePose { .. }));
    }
}
