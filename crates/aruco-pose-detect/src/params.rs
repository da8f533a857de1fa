use serde::{Deserialize, Serialize};

/// Configuration for the marker detector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorParams {
    /// Half window size (pixels) of the adaptive mean threshold.
    pub adaptive_radius: usize,
    /// Offset subtracted from the local mean; a pixel is dark when
    /// `value < mean - adaptive_offset`.
    pub adaptive_offset: f32,
    /// Minimum quad area in pixels^2.
    pub min_quad_area: f32,
    /// Maximum quad area as a fraction of the image area.
    pub max_quad_area_frac: f32,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter.
    pub approx_eps_frac: f32,
    /// Minimum distance between any two quad corners (pixels).
    pub min_corner_separation: f32,
    /// Canonical sampling resolution: pixels per marker cell in the
    /// rectified space used for bit decoding.
    pub px_per_cell: f32,
    /// Require border-black ratio >= this.
    pub min_border_score: f32,
    /// Refine quad edges to subpixel before decoding and pose estimation.
    pub refine_edges: bool,
    /// Search reach (pixels) along the edge normal during refinement.
    pub refine_reach: f32,
    /// Maximum Hamming distance for dictionary matching. Clamped to the
    /// dictionary's `max_correction_bits` on detector construction.
    pub max_hamming: u8,
    /// If true, keep only the best detection per marker id.
    pub dedup_by_id: bool,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            adaptive_radius: 15,
            adaptive_offset: 7.0,
            min_quad_area: 100.0,
            max_quad_area_frac: 0.95,
            approx_eps_frac: 0.05,
            min_corner_separation: 5.0,
            px_per_cell: 8.0,
            min_border_score: 0.85,
            refine_edges: true,
            refine_reach: 2.5,
            max_hamming: 1,
            dedup_by_id: true,
        }
    }
}
