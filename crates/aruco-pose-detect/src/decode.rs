//! Bit-grid sampling and dictionary decoding of quad candidates.

use aruco_pose_core::{homography_from_quad, sample_mean_3x3, GrayImageView};
use aruco_pose_dict::Matcher;
use nalgebra::Point2;

use crate::params::DetectorParams;
use crate::threshold::otsu_threshold_from_samples;

/// A quad that decoded to a dictionary id.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DecodedQuad {
    pub id: u32,
    pub rotation: u8,
    pub hamming: u8,
    /// Observed code before rotation correction, row-major, black = 1.
    pub code: u64,
    /// Fraction of border cells sampled as black.
    pub border_score: f32,
    /// Combined quality in `[0, 1]`; used to rank duplicate detections.
    pub score: f32,
    /// Corners rotated into the dictionary's canonical order.
    pub corners: [Point2<f32>; 4],
}

/// Rectify the quad, sample its cell grid and match against the dictionary.
///
/// Returns `None` when the border is not black enough, cells fall too close
/// to the image edge to sample, or no unique dictionary id matches.
pub(crate) fn decode_quad(
    gray: &GrayImageView<'_>,
    corners: &[Point2<f32>; 4],
    matcher: &Matcher,
    params: &DetectorParams,
) -> Option<DecodedQuad> {
    let dict = matcher.dictionary();
    let n = dict.marker_size;
    let cells = n + 2; // data grid plus the black border ring
    let side = cells as f64 * params.px_per_cell as f64;

    let canonical = [
        Point2::new(0.0_f64, 0.0),
        Point2::new(side, 0.0),
        Point2::new(side, side),
        Point2::new(0.0_f64, side),
    ];
    let observed = [
        Point2::new(corners[0].x as f64, corners[0].y as f64),
        Point2::new(corners[1].x as f64, corners[1].y as f64),
        Point2::new(corners[2].x as f64, corners[2].y as f64),
        Point2::new(corners[3].x as f64, corners[3].y as f64),
    ];
    let h = homography_from_quad(&canonical, &observed)?;

    // Sample every cell center through the homography.
    let mut samples = Vec::with_capacity(cells * cells);
    for cy in 0..cells {
        for cx in 0..cells {
            let u = (cx as f64 + 0.5) * params.px_per_cell as f64;
            let v = (cy as f64 + 0.5) * params.px_per_cell as f64;
            let p = h.apply_f64(Point2::new(u, v));
            samples.push(sample_mean_3x3(gray, p.x as f32, p.y as f32)?);
        }
    }

    let otsu = otsu_threshold_from_samples(&samples);
    let dark = |cx: usize, cy: usize| samples[cy * cells + cx] <= otsu;

    let mut border_dark = 0usize;
    let border_total = 4 * cells - 4;
    for cy in 0..cells {
        for cx in 0..cells {
            let on_border = cx == 0 || cy == 0 || cx == cells - 1 || cy == cells - 1;
            if on_border && dark(cx, cy) {
                border_dark += 1;
            }
        }
    }
    let border_score = border_dark as f32 / border_total as f32;
    if border_score < params.min_border_score {
        return None;
    }

    // Inner n x n cells, row-major, black = 1.
    let mut code = 0u64;
    for iy in 0..n {
        for ix in 0..n {
            if dark(ix + 1, iy + 1) {
                code |= 1 << (iy * n + ix);
            }
        }
    }

    let m = matcher.match_code(code)?;

    // The observed grid equals the dictionary code rotated by `m.rotation`
    // quarter turns, so rotating the corner list the same amount restores
    // the dictionary's canonical corner order.
    let mut canonical_corners = *corners;
    canonical_corners.rotate_left(m.rotation as usize);

    let bits = dict.bit_count() as f32;
    let score = border_score * (1.0 - m.hamming as f32 / bits);

    Some(DecodedQuad {
        id: m.id,
        rotation: m.rotation,
        hamming: m.hamming,
        code,
        border_score,
        score,
        corners: canonical_corners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aruco_pose_core::GrayImage;
    use aruco_pose_dict::{builtins, rotate_code_u64};

    /// Render a marker (border + code cells) at `cell_px` pixels per cell
    /// with `margin` light pixels around it.
    fn render_marker(code: u64, n: usize, cell_px: usize, margin: usize) -> GrayImage {
        let cells = n + 2;
        let size = cells * cell_px + 2 * margin;
        let mut img = GrayImage::filled(size, size, 230);
        for cy in 0..cells {
            for cx in 0..cells {
                let on_border = cx == 0 || cy == 0 || cx == cells - 1 || cy == cells - 1;
                let black = if on_border {
                    true
                } else {
                    (code >> ((cy - 1) * n + (cx - 1))) & 1 == 1
                };
                if black {
                    for y in 0..cell_px {
                        for x in 0..cell_px {
                            let px = margin + cx * cell_px + x;
                            let py = margin + cy * cell_px + y;
                            img.data[py * size + px] = 25;
                        }
                    }
                }
            }
        }
        img
    }

    fn marker_corners(n: usize, cell_px: usize, margin: usize) -> [Point2<f32>; 4] {
        // Outer border edges sit halfway between the last dark and first
        // light pixel centers.
        let lo = margin as f32 - 0.5;
        let hi = (margin + (n + 2) * cell_px) as f32 - 0.5;
        [
            Point2::new(lo, lo),
            Point2::new(hi, lo),
            Point2::new(hi, hi),
            Point2::new(lo, hi),
        ]
    }

    #[test]
    fn decodes_upright_marker() {
        let dict = builtins::DICT_4X4_50;
        let code = dict.codes[17];
        let img = render_marker(code, 4, 8, 10);
        let corners = marker_corners(4, 8, 10);
        let matcher = Matcher::new(dict, 1);

        let d = decode_quad(&img.view(), &corners, &matcher, &DetectorParams::default())
            .expect("decoded");
        assert_eq!(d.id, 17);
        assert_eq!(d.rotation, 0);
        assert_eq!(d.hamming, 0);
        assert_eq!(d.code, code);
        assert!(d.border_score > 0.99);
        assert_eq!(d.corners, corners);
    }

    #[test]
    fn corner_order_is_rotation_invariant() {
        let dict = builtins::DICT_4X4_50;
        let code = dict.codes[3];
        // Draw the marker rotated one quarter turn clockwise.
        let img = render_marker(rotate_code_u64(code, 4, 1), 4, 8, 10);
        let corners = marker_corners(4, 8, 10);
        let matcher = Matcher::new(dict, 1);

        let d = decode_quad(&img.view(), &corners, &matcher, &DetectorParams::default())
            .expect("decoded");
        assert_eq!(d.id, 3);
        assert_eq!(d.rotation, 1);
        // Canonical order starts at the dictionary's top-left corner, which
        // the clockwise image rotation moved to the observed top-right.
        assert_eq!(d.corners[0], corners[1]);
        assert_eq!(d.corners[3], corners[0]);
    }

    #[test]
    fn white_border_is_rejected() {
        let dict = builtins::DICT_4X4_50;
        // All-white grid: border check must fail before any matching.
        let img = GrayImage::filled(100, 100, 230);
        let corners = marker_corners(4, 8, 10);
        let matcher = Matcher::new(dict, 1);
        assert!(decode_quad(&img.view(), &corners, &matcher, &DetectorParams::default()).is_none());
    }

    #[test]
    fn unknown_code_is_rejected() {
        let dict = builtins::DICT_4X4_50;
        // A code far from every dictionary entry.
        let img = render_marker(0xffff, 4, 8, 10);
        let corners = marker_corners(4, 8, 10);
        let matcher = Matcher::new(dict, 1);
        assert!(decode_quad(&img.view(), &corners, &matcher, &DetectorParams::default()).is_none());
    }
}
