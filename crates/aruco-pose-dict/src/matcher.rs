//! Dictionary matching and rotation helpers.

use crate::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Marker id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` such that: `observed_code == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance between observed and dictionary code (after rotation).
    pub hamming: u8,
}

/// Matcher for a fixed dictionary.
///
/// Uses a brute-force search over all ids and rotations; for typical
/// dictionary sizes (<= 1000) this is fast enough and keeps memory small.
///
/// A code matching more than one id within the Hamming tolerance is treated
/// as unreadable and rejected. Guessing between near-equidistant ids would
/// trade missed detections for false positives, which is the wrong trade for
/// per-frame video use.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher for the given dictionary and Hamming threshold.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let bits = dict.bit_count();
        assert!(
            bits <= 64,
            "marker_size {} implies {} bits > 64 (unsupported)",
            dict.marker_size,
            bits
        );

        let mut rotated = Vec::with_capacity(dict.codes.len());
        for &base in dict.codes {
            rotated.push([
                rotate_code_u64(base, dict.marker_size, 0),
                rotate_code_u64(base, dict.marker_size, 1),
                rotate_code_u64(base, dict.marker_size, 2),
                rotate_code_u64(base, dict.marker_size, 3),
            ]);
        }

        Self {
            dict,
            max_hamming,
            rotated,
        }
    }

    /// Dictionary used by this matcher.
    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dict
    }

    /// Maximum Hamming distance allowed for matches.
    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Find the unique match within `max_hamming`, or `None`.
    ///
    /// Returns `None` both when no id is close enough and when two distinct
    /// ids fall within the tolerance (ambiguous observation).
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;
        let mut second_best_id: Option<u32> = None;

        for (id, rots) in self.rotated.iter().enumerate() {
            let id = id as u32;
            let mut id_best: Option<Match> = None;
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                if id_best.map(|m| h < m.hamming).unwrap_or(true) {
                    id_best = Some(Match {
                        id,
                        rotation: rot as u8,
                        hamming: h,
                    });
                }
            }

            let Some(m) = id_best else { continue };
            match best {
                None => best = Some(m),
                Some(prev) if m.hamming < prev.hamming => {
                    second_best_id = Some(prev.id);
                    best = Some(m);
                }
                Some(_) => second_best_id = Some(m.id),
            }
        }

        let best = best?;
        if second_best_id.is_some_and(|id| id != best.id) {
            return None;
        }
        Some(best)
    }
}

/// Rotate a code stored in row-major bits: `idx = y * N + x`.
///
/// `rot = 1` corresponds to one 90-degree clockwise rotation of the marker
/// image.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    #[inline]
    fn get(code: u64, idx: usize) -> u64 {
        (code >> idx) & 1
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                0 => (x, y),
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            out |= get(code, sy * n + sx) << (y * n + x);
        }
    }
    out
}
