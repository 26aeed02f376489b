//! Ramer–Douglas–Peucker polyline simplification.
//!
//! Streamlines are traced at `dstep` resolution for collision testing but
//! rendered and graphed from a simplified copy. Simplification keeps both
//! endpoints and every vertex farther than `tolerance` from the chord of
//! its span.

use crate::vector::Vec2;

/// Simplifies a polyline, keeping endpoints. Tolerance is the maximum
/// perpendicular deviation of removed points from the simplified shape.
pub fn simplify(points: &[Vec2], tolerance: f64) -> Vec<Vec2> {
    if points.len() < 3 || tolerance <= 0.0 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    mark_kept(points, 0, points.len() - 1, tolerance, &mut keep);
    points
        .iter()
        .zip(keep.iter())
        .filter_map(|(p, &k)| k.then_some(*p))
        .collect()
}

fn mark_kept(points: &[Vec2], first: usize, last: usize, tolerance: f64, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }
    let mut max_dist = 0.0;
    let mut max_idx = first;
    for i in first + 1..last {
        let d = point_to_segment_distance(points[i], points[first], points[last]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }
    if max_dist > tolerance {
        keep[max_idx] = true;
        mark_kept(points, first, max_idx, tolerance, keep);
        mark_kept(points, max_idx, last, tolerance, keep);
    }
}

/// Distance from `p` to the segment `a-b`.
pub fn point_to_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq == 0.0 {
        return p.distance_to(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_to(a + ab * t)
}
