//! Thresholding primitives for candidate extraction and bit decoding.

use aruco_pose_core::GrayImageView;

/// Adaptive mean threshold, marking dark pixels.
///
/// Returns a row-major mask where `1` means the pixel is darker than the
/// local mean over a `(2 * radius + 1)^2` window by more than `offset`.
/// Window edges are clamped to the image, so border pixels use a smaller
/// window rather than padded zeros.
pub fn adaptive_threshold_dark(src: &GrayImageView<'_>, radius: usize, offset: f32) -> Vec<u8> {
    let w = src.width;
    let h = src.height;
    if w == 0 || h == 0 {
        return Vec::new();
    }

    // Summed-area table with a zero first row/column: (w+1) x (h+1).
    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += src.data[y * w + x] as u64;
            integral[(y + 1) * (w + 1) + (x + 1)] = integral[y * (w + 1) + (x + 1)] + row_sum;
        }
    }

    let r = radius as i64;
    let mut mask = vec![0u8; w * h];
    for y in 0..h {
        let y0 = (y as i64 - r).max(0) as usize;
        let y1 = (y as i64 + r + 1).min(h as i64) as usize;
        for x in 0..w {
            let x0 = (x as i64 - r).max(0) as usize;
            let x1 = (x as i64 + r + 1).min(w as i64) as usize;

            let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                - integral[y0 * (w + 1) + x1]
                - integral[y1 * (w + 1) + x0];
            let count = ((y1 - y0) * (x1 - x0)) as f32;
            let mean = sum as f32 / count;

            if (src.data[y * w + x] as f32) < mean - offset {
                mask[y * w + x] = 1;
            }
        }
    }

    mask
}

/// Otsu's threshold over a small sample set.
///
/// Used to split decoded cell intensities into black/white; returns the
/// threshold maximizing between-class variance. Samples below or equal to
/// the threshold are black.
pub fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    let mut hist = [0u32; 256];
    for &s in samples {
        hist[s as usize] += 1;
    }
    let total = samples.len() as f64;
    if total == 0.0 {
        return 127;
    }

    let mut sum_all = 0.0_f64;
    for (v, &c) in hist.iter().enumerate() {
        sum_all += v as f64 * c as f64;
    }

    let mut sum_b = 0.0_f64;
    let mut weight_b = 0.0_f64;
    let mut best_t = 127u8;
    let mut best_var = -1.0_f64;

    for t in 0..256usize {
        weight_b += hist[t] as f64;
        if weight_b == 0.0 {
            continue;
        }
        let weight_f = total - weight_b;
        if weight_f == 0.0 {
            break;
        }
        sum_b += t as f64 * hist[t] as f64;

        let mean_b = sum_b / weight_b;
        let mean_f = (sum_all - sum_b) / weight_f;
        let var = weight_b * weight_f * (mean_b - mean_f) * (mean_b - mean_f);
        if var > best_var {
            best_var = var;
            best_t = t as u8;
        }
    }

    best_t
}
