//! Polygon and polyline geometry.
//!
//! The computational-geometry primitives the generator needs: area,
//! point-in-polygon, segment intersection, slicing a polygon by a line,
//! slicing the world rectangle by a polyline, and miter buffer/offset of
//! polygons and polylines. Polygons are open vertex loops (the first
//! vertex is not repeated); solid regions wind counter-clockwise.

use crate::vector::Vec2;

/// Tolerance for side-of-line classification and intersection parameters.
const GEOM_EPS: f64 = 1e-9;

/// Miter joins longer than this multiple of the offset distance are
/// clamped to a bevel point.
const MITER_LIMIT: f64 = 4.0;

/// Signed area by the shoelace formula. Positive for counter-clockwise
/// winding (y-up convention).
pub fn signed_area(polygon: &[Vec2]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

/// Absolute polygon area.
pub fn area(polygon: &[Vec2]) -> f64 {
    signed_area(polygon).abs()
}

/// Total edge length of the closed polygon.
pub fn perimeter(polygon: &[Vec2]) -> f64 {
    let n = polygon.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| polygon[i].distance_to(polygon[(i + 1) % n]))
        .sum()
}

/// Compactness measure `area / perimeter^2`. A circle scores `1/4pi`
/// (~0.08); long slivers approach zero.
pub fn shape_index(polygon: &[Vec2]) -> f64 {
    let p = perimeter(polygon);
    if p == 0.0 {
        return 0.0;
    }
    area(polygon) / (p * p)
}

/// Arithmetic mean of the vertices.
pub fn average_point(polygon: &[Vec2]) -> Vec2 {
    if polygon.is_empty() {
        return Vec2::ZERO;
    }
    let mut sum = Vec2::ZERO;
    for v in polygon {
        sum += *v;
    }
    sum / polygon.len() as f64
}

pub fn is_ccw(polygon: &[Vec2]) -> bool {
    signed_area(polygon) > 0.0
}

/// Reverses the vertex order if the polygon winds clockwise.
pub fn ensure_ccw(polygon: &mut [Vec2]) {
    if signed_area(polygon) < 0.0 {
        polygon.reverse();
    }
}

/// Ray-casting point-in-polygon test. Points on the boundary may fall on
/// either side; callers needing boundary guarantees must test separately.
pub fn point_in_polygon(point: Vec2, polygon: &[Vec2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Inclusive axis-aligned rectangle containment.
pub fn point_in_rectangle(point: Vec2, origin: Vec2, dimensions: Vec2) -> bool {
    point.x >= origin.x
        && point.x <= origin.x + dimensions.x
        && point.y >= origin.y
        && point.y <= origin.y + dimensions.y
}

/// Intersection of segments `a1-a2` and `b1-b2`, with the parameters
/// `t` (along a) and `u` (along b) in [0, 1]. Parallel segments never
/// intersect, including the collinear-overlap case.
pub fn segment_intersection_t(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<(Vec2, f64, f64)> {
    let r = a2 - a1;
    let s = b2 - b1;
    let denom = r.cross(s);
    if denom.abs() < GEOM_EPS {
        return None;
    }
    let q = b1 - a1;
    let t = q.cross(s) / denom;
    let u = q.cross(r) / denom;
    if (-GEOM_EPS..=1.0 + GEOM_EPS).contains(&t) && (-GEOM_EPS..=1.0 + GEOM_EPS).contains(&u) {
        Some((a1 + r * t, t, u))
    } else {
        None
    }
}

/// Intersection point of two segments, if any.
pub fn segment_intersection(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<Vec2> {
    segment_intersection_t(a1, a2, b1, b2).map(|(p, _, _)| p)
}

/// Slices a simple polygon by the infinite line through `a` and `b`.
///
/// Returns the resulting pieces, each in the input winding. A polygon the
/// line misses (or any degenerate configuration) comes back unchanged as
/// a single piece. Crossing points are paired by their position along the
/// line, which handles non-convex polygons the line crosses more than
/// twice.
pub fn slice_by_line(polygon: &[Vec2], a: Vec2, b: Vec2) -> Vec<Vec<Vec2>> {
    let n = polygon.len();
    let dir = b - a;
    if n < 3 || dir.length_sq() < GEOM_EPS * GEOM_EPS {
        return vec![polygon.to_vec()];
    }
    let dir_len = dir.length();

    // Side of the line, with on-line vertices tie-broken positive so that
    // crossings only occur in edge interiors.
    let raw_side: Vec<f64> = polygon.iter().map(|p| dir.cross(*p - a)).collect();
    let sign = |s: f64| if s / dir_len > -GEOM_EPS { 1 } else { -1 };

    struct AugVertex {
        pos: Vec2,
        partner: Option<usize>,
        t_line: f64,
    }

    let mut ring: Vec<AugVertex> = Vec::with_capacity(n + 4);
    let mut crossings: Vec<usize> = Vec::new();
    for i in 0..n {
        let j = (i + 1) % n;
        ring.push(AugVertex {
            pos: polygon[i],
            partner: None,
            t_line: 0.0,
        });
        if sign(raw_side[i]) != sign(raw_side[j]) {
            let t = raw_side[i] / (raw_side[i] - raw_side[j]);
            let point = polygon[i].lerp(polygon[j], t);
            crossings.push(ring.len());
            ring.push(AugVertex {
                pos: point,
                partner: Some(usize::MAX),
                t_line: dir.dot(point - a),
            });
        }
    }

    if crossings.len() < 2 || crossings.len() % 2 != 0 {
        return vec![polygon.to_vec()];
    }

    // Pair crossings along the line; each pair is an interior bridge
    // shared by exactly two pieces.
    crossings.sort_by(|&i, &j| ring[i].t_line.partial_cmp(&ring[j].t_line).unwrap());
    for pair in crossings.chunks(2) {
        ring[pair[0]].partner = Some(pair[1]);
        ring[pair[1]].partner = Some(pair[0]);
    }

    let len = ring.len();
    let mut visited = vec![false; len];
    let mut pieces = Vec::new();
    for start in 0..len {
        if visited[start] || ring[start].partner.is_some() {
            continue;
        }
        let mut piece = Vec::new();
        let mut cur = start;
        let mut guard = 0;
        loop {
            guard += 1;
            if guard > 2 * len {
                // Inconsistent pairing (non-simple input); give up.
                return vec![polygon.to_vec()];
            }
            match ring[cur].partner {
                Some(partner) => {
                    piece.push(ring[cur].pos);
                    piece.push(ring[partner].pos);
                    cur = (partner + 1) % len;
                }
                None => {
                    visited[cur] = true;
                    piece.push(ring[cur].pos);
                    cur = (cur + 1) % len;
                }
            }
            if cur == start {
                break;
            }
        }
        if piece.len() >= 3 {
            pieces.push(piece);
        }
    }

    if pieces.len() < 2 {
        return vec![polygon.to_vec()];
    }
    pieces
}

/// Slices the world rectangle by a polyline whose endpoints lie outside
/// it, returning the smaller of the two resulting polygons.
///
/// This is how the sea polygon is carved from the coastline streamline.
/// Returns an empty polygon when the polyline never crosses the
/// rectangle.
pub fn slice_rectangle(origin: Vec2, dimensions: Vec2, polyline: &[Vec2]) -> Vec<Vec2> {
    if polyline.len() < 2 {
        return Vec::new();
    }
    let inside = |p: Vec2| point_in_rectangle(p, origin, dimensions);

    // First segment crossing into the rectangle, and last crossing out.
    let mut entry: Option<(usize, Vec2)> = None;
    for i in 0..polyline.len() - 1 {
        if !inside(polyline[i]) && inside(polyline[i + 1]) {
            if let Some(p) = rectangle_boundary_crossing(origin, dimensions, polyline[i], polyline[i + 1]) {
                entry = Some((i, p));
                break;
            }
        }
    }
    let mut exit: Option<(usize, Vec2)> = None;
    for i in (0..polyline.len() - 1).rev() {
        if inside(polyline[i]) && !inside(polyline[i + 1]) {
            if let Some(p) = rectangle_boundary_crossing(origin, dimensions, polyline[i + 1], polyline[i]) {
                exit = Some((i, p));
                break;
            }
        }
    }
    let (Some((entry_idx, entry_point)), Some((exit_idx, exit_point))) = (entry, exit) else {
        return Vec::new();
    };
    if exit_idx < entry_idx {
        return Vec::new();
    }

    let mut chain = vec![entry_point];
    for p in &polyline[entry_idx + 1..=exit_idx] {
        if inside(*p) {
            chain.push(*p);
        }
    }
    chain.push(exit_point);

    let w = dimensions.x;
    let h = dimensions.y;
    let total = 2.0 * (w + h);
    // Perimeter coordinate, counter-clockwise from the origin corner.
    let boundary_s = |p: Vec2| -> f64 {
        let local = p - origin;
        let tol_x = 1e-6 * (1.0 + w);
        let tol_y = 1e-6 * (1.0 + h);
        if local.y.abs() < tol_y {
            local.x
        } else if (local.x - w).abs() < tol_x {
            w + local.y
        } else if (local.y - h).abs() < tol_y {
            w + h + (w - local.x)
        } else {
            2.0 * w + h + (h - local.y)
        }
    };
    let corners = [
        (0.0, origin),
        (w, origin + Vec2::new(w, 0.0)),
        (w + h, origin + Vec2::new(w, h)),
        (2.0 * w + h, origin + Vec2::new(0.0, h)),
    ];
    let s_entry = boundary_s(entry_point);
    let s_exit = boundary_s(exit_point);

    // Close the chain along the boundary in each direction and keep the
    // smaller side.
    let ccw_gap = (s_entry - s_exit).rem_euclid(total);
    let mut ccw_corners: Vec<(f64, Vec2)> = corners
        .iter()
        .filter(|(s, _)| (*s - s_exit).rem_euclid(total) < ccw_gap)
        .map(|(s, c)| ((*s - s_exit).rem_euclid(total), *c))
        .collect();
    ccw_corners.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let cw_gap = (s_exit - s_entry).rem_euclid(total);
    let mut cw_corners: Vec<(f64, Vec2)> = corners
        .iter()
        .filter(|(s, _)| (s_exit - *s).rem_euclid(total) < cw_gap)
        .map(|(s, c)| ((s_exit - *s).rem_euclid(total), *c))
        .collect();
    cw_corners.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let mut side_a = chain.clone();
    side_a.extend(ccw_corners.into_iter().map(|(_, c)| c));
    let mut side_b = chain;
    side_b.extend(cw_corners.into_iter().map(|(_, c)| c));

    if area(&side_a) <= area(&side_b) {
        side_a
    } else {
        side_b
    }
}

/// First crossing of segment `from -> to` with the rectangle boundary,
/// where `from` is outside and `to` inside.
fn rectangle_boundary_crossing(origin: Vec2, dimensions: Vec2, from: Vec2, to: Vec2) -> Option<Vec2> {
    let c0 = origin;
    let c1 = origin + Vec2::new(dimensions.x, 0.0);
    let c2 = origin + dimensions;
    let c3 = origin + Vec2::new(0.0, dimensions.y);
    let edges = [(c0, c1), (c1, c2), (c2, c3), (c3, c0)];
    let mut best: Option<(f64, Vec2)> = None;
    for (e0, e1) in edges {
        if let Some((p, t, _)) = segment_intersection_t(from, to, e0, e1) {
            if best.as_ref().map_or(true, |(bt, _)| t < *bt) {
                best = Some((t, p));
            }
        }
    }
    best.map(|(_, p)| p)
}

/// Offsets a polygon outward (`delta > 0`) or inward (`delta < 0`) with
/// miter joins.
///
/// Returns `None` when the offset collapses or self-intersects the
/// polygon, which callers treat as "discard this geometry".
pub fn offset_polygon(polygon: &[Vec2], delta: f64) -> Option<Vec<Vec2>> {
    let n = polygon.len();
    if n < 3 {
        return None;
    }
    let signed = signed_area(polygon);
    if signed.abs() < GEOM_EPS {
        return None;
    }
    let orientation = signed.signum();

    // Outward normal of each edge; for CCW polygons the interior is to
    // the left, so outward is the right-hand perpendicular.
    let edge_normal = |i: usize| -> Vec2 {
        let d = (polygon[(i + 1) % n] - polygon[i]).normalize_or_zero();
        Vec2::new(d.y, -d.x) * orientation
    };

    let mut result = Vec::with_capacity(n);
    for i in 0..n {
        let prev = (i + n - 1) % n;
        let n0 = edge_normal(prev);
        let n1 = edge_normal(i);
        let p0 = polygon[prev] + n0 * delta;
        let d0 = polygon[i] - polygon[prev];
        let p1 = polygon[i] + n1 * delta;
        let d1 = polygon[(i + 1) % n] - polygon[i];

        let denom = d0.cross(d1);
        let candidate = if denom.abs() < GEOM_EPS {
            polygon[i] + n1 * delta
        } else {
            let t = (p1 - p0).cross(d1) / denom;
            p0 + d0 * t
        };
        let vertex = if candidate.distance_to(polygon[i]) > delta.abs() * MITER_LIMIT {
            polygon[i] + (n0 + n1).normalize_or_zero() * delta
        } else {
            candidate
        };
        result.push(vertex);
    }

    let result_signed = signed_area(&result);
    if result_signed.abs() < GEOM_EPS || result_signed.signum() != orientation {
        return None;
    }
    if !is_simple(&result) {
        return None;
    }
    Some(result)
}

/// Buffers an open polyline into a closed loop at distance `delta` on
/// both sides, with flat caps and miter joins. The result winds
/// counter-clockwise.
pub fn buffer_polyline(line: &[Vec2], delta: f64) -> Option<Vec<Vec2>> {
    let n = line.len();
    if n < 2 || delta <= 0.0 {
        return None;
    }

    // Left normal per vertex: averaged adjacent segment normals with a
    // clamped miter scale.
    let seg_left = |i: usize| -> Vec2 { (line[i + 1] - line[i]).normalize_or_zero().perp() };
    let mut offsets = Vec::with_capacity(n);
    for i in 0..n {
        let off = if i == 0 {
            seg_left(0) * delta
        } else if i == n - 1 {
            seg_left(n - 2) * delta
        } else {
            let l0 = seg_left(i - 1);
            let l1 = seg_left(i);
            let m = (l0 + l1).normalize_or_zero();
            if m == Vec2::ZERO {
                l1 * delta
            } else {
                let cos_half = m.dot(l1).max(1.0 / MITER_LIMIT);
                m * (delta / cos_half)
            }
        };
        offsets.push(off);
    }

    let mut loop_points: Vec<Vec2> = Vec::with_capacity(2 * n);
    for i in 0..n {
        loop_points.push(line[i] + offsets[i]);
    }
    for i in (0..n).rev() {
        loop_points.push(line[i] - offsets[i]);
    }
    ensure_ccw(&mut loop_points);
    if area(&loop_points) < GEOM_EPS {
        return None;
    }
    Some(loop_points)
}

/// Whether the polygon has no pair of non-adjacent edges crossing in
/// their interiors. Quadratic; block and lot polygons are small.
pub fn is_simple(polygon: &[Vec2]) -> bool {
    let n = polygon.len();
    if n < 4 {
        return true;
    }
    for i in 0..n {
        for j in i + 1..n {
            // Skip edges sharing a vertex (adjacent, including the wrap pair).
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            let (a1, a2) = (polygon[i], polygon[(i + 1) % n]);
            let (b1, b2) = (polygon[j], polygon[(j + 1) % n]);
            if let Some((_, t, u)) = segment_intersection_t(a1, a2, b1, b2) {
                let interior = |v: f64| v > 1e-7 && v < 1.0 - 1e-7;
                if interior(t) && interior(u) {
                    return false;
                }
            }
        }
    }
    true
}
