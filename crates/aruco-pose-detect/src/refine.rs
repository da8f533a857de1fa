//! Subpixel refinement of quad edges.
//!
//! Contour tracing lands corners on dark pixel centers, roughly half a
//! pixel inside the true marker border. Each edge is re-estimated by
//! sampling the intensity profile along its normal at several points,
//! locating the mid-intensity crossing, and fitting a line; refined corners
//! are the intersections of adjacent edge lines.

use aruco_pose_core::{sample_bilinear, GrayImageView};
use nalgebra::{Point2, Vector2};

const SCAN_STEP: f32 = 0.25;
const MIN_EDGE_CONTRAST: f32 = 20.0;
const MIN_EDGE_SAMPLES: usize = 4;

/// An infinite line through `point` with unit-ish direction `dir`.
#[derive(Clone, Copy, Debug)]
struct EdgeLine {
    point: Point2<f32>,
    dir: Vector2<f32>,
}

/// Refine quad corners to subpixel accuracy.
///
/// `corners` must be in clockwise screen order with the dark region inside.
/// Edges that cannot be measured (low contrast, too short) keep their
/// original geometry.
pub fn refine_quad(
    gray: &GrayImageView<'_>,
    corners: &[Point2<f32>; 4],
    reach: f32,
) -> [Point2<f32>; 4] {
    let mut lines = [EdgeLine {
        point: Point2::new(0.0, 0.0),
        dir: Vector2::new(1.0, 0.0),
    }; 4];

    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        lines[i] = fit_edge(gray, a, b, reach).unwrap_or(EdgeLine {
            point: a,
            dir: b - a,
        });
    }

    let mut out = *corners;
    for i in 0..4 {
        // Corner i joins the incoming edge (i + 3) % 4 and outgoing edge i.
        if let Some(p) = intersect(lines[(i + 3) % 4], lines[i]) {
            // Guard against wild intersections from nearly-parallel fits.
            if (p - corners[i]).norm() <= 2.0 * reach {
                out[i] = p;
            }
        }
    }
    out
}

/// Fit a line to the dark/light transition along the edge `a -> b`.
fn fit_edge(
    gray: &GrayImageView<'_>,
    a: Point2<f32>,
    b: Point2<f32>,
    reach: f32,
) -> Option<EdgeLine> {
    let ab = b - a;
    let len = ab.norm();
    if len < 4.0 {
        return None;
    }
    let d = ab / len;
    // For clockwise screen order this rotation of `d` points into the
    // dark interior.
    let n = Vector2::new(-d.y, d.x);

    let count = ((len / 4.0) as usize).clamp(6, 24);
    let mut ts = Vec::with_capacity(count);
    let mut offsets = Vec::with_capacity(count);

    for k in 0..count {
        let t = 0.12 + 0.76 * (k as f32) / ((count - 1) as f32);
        let base = a + ab * t;
        if let Some(off) = edge_crossing(gray, base, n, reach) {
            ts.push(t * len);
            offsets.push(off);
        }
    }

    if ts.len() < MIN_EDGE_SAMPLES {
        return None;
    }

    // Least squares for offset(t) = c0 + c1 * t.
    let m = ts.len() as f32;
    let st: f32 = ts.iter().sum();
    let so: f32 = offsets.iter().sum();
    let stt: f32 = ts.iter().map(|t| t * t).sum();
    let sto: f32 = ts.iter().zip(&offsets).map(|(t, o)| t * o).sum();
    let det = m * stt - st * st;
    if det.abs() < 1e-6 {
        return None;
    }
    let c1 = (m * sto - st * so) / det;
    let c0 = (so - c1 * st) / m;

    Some(EdgeLine {
        point: a + n * c0,
        dir: d + n * c1,
    })
}

/// Locate the mid-intensity crossing along the normal at `base`.
///
/// Scans from `-reach` (outside, light) to `+reach` (inside, dark) and
/// returns the signed offset of the crossing nearest to zero, linearly
/// interpolated between scan steps.
fn edge_crossing(
    gray: &GrayImageView<'_>,
    base: Point2<f32>,
    n: Vector2<f32>,
    reach: f32,
) -> Option<f32> {
    let steps = (2.0 * reach / SCAN_STEP).round() as i32;
    let sample = |i: i32| -> f32 {
        let s = -reach + i as f32 * SCAN_STEP;
        let p = base + n * s;
        sample_bilinear(gray, p.x, p.y)
    };

    let outside = sample(0);
    let inside = sample(steps);
    if outside - inside < MIN_EDGE_CONTRAST {
        return None;
    }
    let mid = 0.5 * (outside + inside);

    let mut best: Option<f32> = None;
    let mut prev = outside;
    for i in 1..=steps {
        let v = sample(i);
        if prev >= mid && v < mid {
            let s_prev = -reach + (i - 1) as f32 * SCAN_STEP;
            let frac = (prev - mid) / (prev - v);
            let s = s_prev + frac * SCAN_STEP;
            if best.map(|b| s.abs() < b.abs()).unwrap_or(true) {
                best = Some(s);
            }
        }
        prev = v;
    }
    best
}

fn intersect(l1: EdgeLine, l2: EdgeLine) -> Option<Point2<f32>> {
    let cross = l1.dir.x * l2.dir.y - l1.dir.y * l2.dir.x;
    if cross.abs() < 1e-6 {
        return None;
    }
    let dp = l2.point - l1.point;
    let t = (dp.x * l2.dir.y - dp.y * l2.dir.x) / cross;
    Some(l1.point + l1.dir * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aruco_pose_core::GrayImage;

    /// Anti-aliased dark rectangle on a light background: pixel intensity
    /// is proportional to the uncovered area (pixel centers at integers).
    fn render_rect(w: usize, h: usize, x0: f32, y0: f32, x1: f32, y1: f32) -> GrayImage {
        let overlap = |lo: f32, hi: f32, c: f32| -> f32 {
            let a = (c - 0.5).max(lo);
            let b = (c + 0.5).min(hi);
            (b - a).max(0.0)
        };
        let mut img = GrayImage::filled(w, h, 255);
        for y in 0..h {
            for x in 0..w {
                let cov = overlap(x0, x1, x as f32) * overlap(y0, y1, y as f32);
                img.data[y * w + x] = (255.0 * (1.0 - cov)) as u8;
            }
        }
        img
    }

    #[test]
    fn recovers_fractional_edge_positions() {
        let img = render_rect(60, 60, 10.3, 12.7, 40.3, 42.7);
        let coarse = [
            Point2::new(11.0, 13.0),
            Point2::new(40.0, 13.0),
            Point2::new(40.0, 42.0),
            Point2::new(11.0, 42.0),
        ];
        let refined = refine_quad(&img.view(), &coarse, 2.5);

        let truth = [
            Point2::new(10.3, 12.7),
            Point2::new(40.3, 12.7),
            Point2::new(40.3, 42.7),
            Point2::new(10.3, 42.7),
        ];
        for (r, t) in refined.iter().zip(&truth) {
            assert!(
                (r - t).norm() < 0.2,
                "refined {r:?} too far from true corner {t:?}"
            );
        }
    }

    #[test]
    fn flat_region_keeps_input_corners() {
        let img = GrayImage::filled(50, 50, 128);
        let coarse = [
            Point2::new(10.0, 10.0),
            Point2::new(40.0, 10.0),
            Point2::new(40.0, 40.0),
            Point2::new(10.0, 40.0),
        ];
        let refined = refine_quad(&img.view(), &coarse, 2.5);
        for (r, c) in refined.iter().zip(&coarse) {
            assert!((r - c).norm() < 1e-6);
        }
    }
}
