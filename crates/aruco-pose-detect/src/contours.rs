//! Quad candidate extraction from a binary dark-pixel mask.
//!
//! Connected dark regions are boundary-traced (Moore neighborhood), the
//! closed contour is simplified with Douglas-Peucker, and the survivors are
//! filtered down to convex quadrilaterals of plausible size.

use nalgebra::Point2;

use crate::params::DetectorParams;

/// Components smaller than this many pixels cannot form a usable quad.
const MIN_COMPONENT_PIXELS: usize = 16;

/// Moore neighborhood in clockwise order, starting east (y grows down).
const NB: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Extract convex quad candidates from the dark mask.
///
/// Corners are returned clockwise in screen orientation, starting at the
/// corner closest to the image origin. Order is by discovery (row-major
/// scan of the mask).
pub fn find_quads(
    mask: &[u8],
    width: usize,
    height: usize,
    params: &DetectorParams,
) -> Vec<[Point2<f32>; 4]> {
    let mut visited = vec![false; width * height];
    let mut quads = Vec::new();
    let max_area = params.max_quad_area_frac * (width * height) as f32;

    for start in 0..mask.len() {
        if mask[start] == 0 || visited[start] {
            continue;
        }

        // Row-major scan order makes `start` the topmost-leftmost pixel of
        // its component.
        let count = flood_component(mask, width, height, start, &mut visited);
        if count < MIN_COMPONENT_PIXELS {
            continue;
        }

        let boundary = trace_boundary(mask, width, height, start, count);
        if boundary.len() < 4 {
            continue;
        }

        let Some(mut quad) = approx_quad(&boundary, params.approx_eps_frac) else {
            continue;
        };

        if !is_convex(&quad) {
            continue;
        }
        let area = shoelace_area(&quad);
        if area.abs() < params.min_quad_area || area.abs() > max_area {
            continue;
        }
        if min_corner_separation(&quad) < params.min_corner_separation {
            continue;
        }

        // Negative shoelace means counter-clockwise in y-down coordinates.
        if area < 0.0 {
            quad.swap(1, 3);
        }
        canonicalize_start(&mut quad);
        quads.push(quad);
    }

    quads
}

/// Flood-fill the 8-connected component containing `start`; returns its
/// pixel count.
fn flood_component(
    mask: &[u8],
    width: usize,
    height: usize,
    start: usize,
    visited: &mut [bool],
) -> usize {
    let mut stack = vec![start];
    visited[start] = true;
    let mut count = 0usize;

    while let Some(idx) = stack.pop() {
        count += 1;
        let x = (idx % width) as i32;
        let y = (idx / width) as i32;
        for (dx, dy) in NB {
            let nx = x + dx;
            let ny = y + dy;
            if nx < 0 || ny < 0 || nx >= width as i32 || ny >= height as i32 {
                continue;
            }
            let nidx = ny as usize * width + nx as usize;
            if mask[nidx] != 0 && !visited[nidx] {
                visited[nidx] = true;
                stack.push(nidx);
            }
        }
    }

    count
}

/// Moore boundary tracing around the outer contour of a component.
///
/// `start` must be the topmost-leftmost pixel, so its west neighbor is
/// guaranteed outside the component and serves as the initial backtrack.
fn trace_boundary(
    mask: &[u8],
    width: usize,
    height: usize,
    start: usize,
    component_pixels: usize,
) -> Vec<(i32, i32)> {
    let dark = |x: i32, y: i32| -> bool {
        x >= 0
            && y >= 0
            && x < width as i32
            && y < height as i32
            && mask[y as usize * width + x as usize] != 0
    };

    let sx = (start % width) as i32;
    let sy = (start / width) as i32;
    let start_pos = (sx, sy);
    let start_back = (sx - 1, sy);

    let mut boundary = vec![start_pos];
    let mut cur = start_pos;
    let mut back = start_back;

    // Outer boundaries cannot exceed the component size by much; the cap
    // guards against pathological masks.
    let max_steps = 4 * component_pixels + 8;

    for _ in 0..max_steps {
        // Index of the backtrack pixel among cur's neighbors.
        let k = NB
            .iter()
            .position(|&(dx, dy)| (cur.0 + dx, cur.1 + dy) == back)
            .unwrap_or(4);

        let mut next = None;
        for i in 1..=8 {
            let idx = (k + i) % 8;
            let cand = (cur.0 + NB[idx].0, cur.1 + NB[idx].1);
            if dark(cand.0, cand.1) {
                let prev_idx = (k + i - 1) % 8;
                next = Some((cand, (cur.0 + NB[prev_idx].0, cur.1 + NB[prev_idx].1)));
                break;
            }
        }

        let Some((pos, new_back)) = next else {
            // Isolated pixel.
            break;
        };
        if pos == start_pos && new_back == start_back {
            break;
        }
        boundary.push(pos);
        cur = pos;
        back = new_back;
    }

    boundary
}

/// Simplify a closed contour with Douglas-Peucker; accept only exact quads.
fn approx_quad(boundary: &[(i32, i32)], eps_frac: f32) -> Option<[Point2<f32>; 4]> {
    let pts: Vec<Point2<f32>> = boundary
        .iter()
        .map(|&(x, y)| Point2::new(x as f32, y as f32))
        .collect();

    let mut perimeter = 0.0f32;
    for i in 0..pts.len() {
        let j = (i + 1) % pts.len();
        perimeter += (pts[j] - pts[i]).norm();
    }
    let eps = eps_frac * perimeter;

    // Split the closed contour at the point farthest from the trace start,
    // then simplify the two open halves.
    let far = pts
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let da = (*a - pts[0]).norm_squared();
            let db = (*b - pts[0]).norm_squared();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)?;
    if far == 0 {
        return None;
    }

    let mut poly = Vec::new();
    douglas_peucker(&pts[0..=far], eps, &mut poly);
    poly.pop(); // shared endpoint
    let mut second: Vec<Point2<f32>> = pts[far..].to_vec();
    second.push(pts[0]);
    let mut tail = Vec::new();
    douglas_peucker(&second, eps, &mut tail);
    tail.pop(); // closes back to the start point
    poly.extend(tail);

    if poly.len() != 4 {
        return None;
    }
    Some([poly[0], poly[1], poly[2], poly[3]])
}

/// Recursive Douglas-Peucker on an open polyline; appends all kept points
/// except the last (callers manage shared endpoints).
fn douglas_peucker(pts: &[Point2<f32>], eps: f32, out: &mut Vec<Point2<f32>>) {
    if pts.len() <= 2 {
        out.extend_from_slice(pts);
        return;
    }

    let a = pts[0];
    let b = pts[pts.len() - 1];
    let ab = b - a;
    let ab_len = ab.norm();

    let mut max_d = -1.0f32;
    let mut max_i = 0usize;
    for (i, p) in pts.iter().enumerate().skip(1).take(pts.len() - 2) {
        let d = if ab_len < 1e-6 {
            (*p - a).norm()
        } else {
            (ab.x * (a.y - p.y) - ab.y * (a.x - p.x)).abs() / ab_len
        };
        if d > max_d {
            max_d = d;
            max_i = i;
        }
    }

    if max_d <= eps {
        out.push(a);
        out.push(b);
        return;
    }

    douglas_peucker(&pts[0..=max_i], eps, out);
    out.pop(); // max_i would otherwise appear twice
    douglas_peucker(&pts[max_i..], eps, out);
}

/// Signed area; positive for clockwise order in y-down image coordinates.
fn shoelace_area(quad: &[Point2<f32>; 4]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..4 {
        let j = (i + 1) % 4;
        sum += quad[i].x * quad[j].y - quad[j].x * quad[i].y;
    }
    0.5 * sum
}

fn is_convex(quad: &[Point2<f32>; 4]) -> bool {
    let mut sign = 0.0f32;
    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let c = quad[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross.abs() < 1e-6 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

fn min_corner_separation(quad: &[Point2<f32>; 4]) -> f32 {
    let mut min = f32::INFINITY;
    for i in 0..4 {
        for j in i + 1..4 {
            min = min.min((quad[i] - quad[j]).norm());
        }
    }
    min
}

/// Rotate so the first corner is the one closest to the image origin.
fn canonicalize_start(quad: &mut [Point2<f32>; 4]) {
    let first = quad
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (a.x + a.y)
                .partial_cmp(&(b.x + b.y))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    quad.rotate_left(first);
}
