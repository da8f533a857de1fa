//! Detector front-end tying thresholding, contours and decoding together.

use std::collections::HashMap;

use aruco_pose_core::GrayImageView;
use aruco_pose_dict::{Dictionary, Matcher};
use log::debug;
use nalgebra::Point2;

use crate::contours::find_quads;
use crate::decode::decode_quad;
use crate::params::DetectorParams;
use crate::refine::refine_quad;
use crate::threshold::adaptive_threshold_dark;

/// A decoded marker observation in image space.
#[derive(Clone, Copy, Debug)]
pub struct MarkerDetection {
    /// Dictionary id.
    pub id: u32,
    /// Outer border corners, clockwise from the dictionary's canonical
    /// top-left corner.
    pub corners: [Point2<f32>; 4],
    /// Quarter turns separating the observed grid from the dictionary code.
    pub rotation: u8,
    /// Bit errors corrected during matching.
    pub hamming: u8,
    /// Fraction of border cells sampled as black.
    pub border_score: f32,
    /// Combined detection quality in `[0, 1]`.
    pub score: f32,
    /// Raw observed code, row-major, black = 1.
    pub code: u64,
}

/// Marker detector for a fixed dictionary.
///
/// Detection is a pure function of the input frame; the detector holds no
/// mutable state and is `Send + Sync`, so one instance can serve frames
/// from several threads.
#[derive(Clone, Debug)]
pub struct MarkerDetector {
    params: DetectorParams,
    matcher: Matcher,
}

impl MarkerDetector {
    pub fn new(dictionary: Dictionary, params: DetectorParams) -> Self {
        let max_hamming = params.max_hamming.min(dictionary.max_correction_bits);
        Self {
            matcher: Matcher::new(dictionary, max_hamming),
            params,
        }
    }

    pub fn with_defaults(dictionary: Dictionary) -> Self {
        Self::new(dictionary, DetectorParams::default())
    }

    #[inline]
    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.matcher.dictionary()
    }

    /// Detect markers in a grayscale frame.
    ///
    /// Detections come back in discovery order (row-major by the candidate's
    /// topmost pixel). With `dedup_by_id` only the best-scoring observation
    /// per id survives, keeping the position of its first discovery.
    pub fn detect(&self, gray: &GrayImageView<'_>) -> Vec<MarkerDetection> {
        let mask = adaptive_threshold_dark(gray, self.params.adaptive_radius, self.params.adaptive_offset);
        let quads = find_quads(&mask, gray.width, gray.height, &self.params);
        debug!("{} quad candidates", quads.len());

        let mut detections: Vec<MarkerDetection> = Vec::new();
        let mut by_id: HashMap<u32, usize> = HashMap::new();

        for quad in &quads {
            let corners = if self.params.refine_edges {
                refine_quad(gray, quad, self.params.refine_reach)
            } else {
                *quad
            };

            let Some(d) = decode_quad(gray, &corners, &self.matcher, &self.params) else {
                continue;
            };
            let detection = MarkerDetection {
                id: d.id,
                corners: d.corners,
                rotation: d.rotation,
                hamming: d.hamming,
                border_score: d.border_score,
                score: d.score,
                code: d.code,
            };

            if self.params.dedup_by_id {
                match by_id.get(&d.id) {
                    Some(&idx) => {
                        if detection.score > detections[idx].score {
                            detections[idx] = detection;
                        }
                    }
                    None => {
                        by_id.insert(d.id, detections.len());
                        detections.push(detection);
                    }
                }
            } else {
                detections.push(detection);
            }
        }

        debug!("{} markers decoded", detections.len());
        detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aruco_pose_core::GrayImage;
    use aruco_pose_dict::builtins;

    /// Paint a marker into `img` with its border's top-left outer corner
    /// edge at `(x0 - 0.5, y0 - 0.5)`.
    fn paint_marker(img: &mut GrayImage, code: u64, n: usize, cell_px: usize, x0: usize, y0: usize) {
        let cells = n + 2;
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
                            let px = x0 + cx * cell_px + x;
                            let py = y0 + cy * cell_px + y;
                            img.data[py * img.width + px] = 25;
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn detects_single_marker_with_subpixel_corners() {
        let dict = builtins::DICT_4X4_50;
        let mut img = GrayImage::filled(120, 120, 230);
        paint_marker(&mut img, dict.codes[5], 4, 10, 25, 30);

        let detector = MarkerDetector::with_defaults(dict);
        let found = detector.detect(&img.view());
        assert_eq!(found.len(), 1);

        let m = &found[0];
        assert_eq!(m.id, 5);
        assert_eq!(m.rotation, 0);
        assert_eq!(m.hamming, 0);
        assert!(m.border_score > 0.99);

        // Outer border spans pixels [25, 84] x [30, 89]; true edges sit
        // half a pixel outside the dark pixel centers.
        let truth = [
            Point2::new(24.5, 29.5),
            Point2::new(84.5, 29.5),
            Point2::new(84.5, 89.5),
            Point2::new(24.5, 89.5),
        ];
        for (c, t) in m.corners.iter().zip(&truth) {
            assert!((c - t).norm() < 0.3, "corner {c:?} vs {t:?}");
        }
    }

    #[test]
    fn detects_multiple_markers_in_discovery_order() {
        let dict = builtins::DICT_4X4_50;
        let mut img = GrayImage::filled(200, 120, 230);
        paint_marker(&mut img, dict.codes[2], 4, 10, 15, 25);
        paint_marker(&mut img, dict.codes[9], 4, 10, 115, 25);

        let detector = MarkerDetector::with_defaults(dict);
        let found = detector.detect(&img.view());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, 2);
        assert_eq!(found[1].id, 9);
    }

    #[test]
    fn duplicate_ids_collapse_to_best() {
        let dict = builtins::DICT_4X4_50;
        let mut img = GrayImage::filled(220, 120, 230);
        paint_marker(&mut img, dict.codes[11], 4, 10, 20, 25);
        paint_marker(&mut img, dict.codes[11], 4, 10, 130, 25);

        let detector = MarkerDetector::with_defaults(dict);
        let found = detector.detect(&img.view());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 11);

        let mut params = DetectorParams::default();
        params.dedup_by_id = false;
        let detector = MarkerDetector::new(dict, params);
        assert_eq!(detector.detect(&img.view()).len(), 2);
    }

    #[test]
    fn empty_frame_yields_no_detections() {
        let img = GrayImage::filled(100, 100, 230);
        let detector = MarkerDetector::with_defaults(builtins::DICT_4X4_50);
        assert!(detector.detect(&img.view()).is_empty());
    }

    #[test]
    fn max_hamming_is_clamped_to_dictionary_budget() {
        let detector = MarkerDetector::new(
            builtins::DICT_4X4_50,
            DetectorParams {
                max_hamming: 7,
                ..DetectorParams::default()
            },
        );
        // Two flipped bits put the observation at distance >= 2 from every
        // code; the clamp to the dictionary's 1-bit budget must reject it
        // even though the caller asked for a larger tolerance.
        let mut img = GrayImage::filled(100, 100, 230);
        paint_marker(&mut img, builtins::DICT_4X4_50.codes[0] ^ 0b101, 4, 10, 15, 15);
        assert!(detector.detect(&img.view()).is_empty());
    }
}
