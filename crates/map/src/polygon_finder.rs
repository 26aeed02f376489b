//! Block extraction and lot subdivision.
//!
//! City blocks are the minimum cycles of the road graph: from every
//! directed edge, walk by always taking the clockwise-next edge at each
//! arrival node and consume the directed edges of each cycle found, so
//! every face is extracted exactly once. The unbounded outer face comes
//! out wound clockwise and is discarded by area sign.
//!
//! Blocks become building lots by recursive longest-edge bisection, then
//! shrink inward for street setback.

use city_engine_core::polygon;
use city_engine_core::prng::Xorshift64;
use city_engine_core::tensor_field::TensorField;
use city_engine_core::vector::Vec2;
use std::f64::consts::TAU;

use crate::graph::Graph;

/// Walks longer than this are abandoned; it also bounds block vertex
/// counts, which keeps the unbounded face out on large maps.
const MAX_CYCLE_EDGES: usize = 20;

/// Blocks with `area / perimeter^2` below this are slivers.
const MIN_SHAPE_INDEX: f64 = 0.04;

/// Subdivision recursion cap; lots hitting it are emitted as-is.
const MAX_SUBDIVISION_DEPTH: usize = 16;

/// Extracts block polygons from the road graph.
///
/// Returns counter-clockwise polygons with at least `min_area`, whose
/// average point is on land and outside existing parks.
pub fn find_blocks(graph: &Graph, min_area: f64, field: &TensorField) -> Vec<Vec<Vec2>> {
    // Working adjacency, consumed edge by edge as faces are extracted.
    let mut adj: Vec<Vec<usize>> = graph
        .nodes
        .iter()
        .map(|n| n.neighbors.iter().map(|nb| nb.node).collect())
        .collect();

    let mut cycles: Vec<Vec<usize>> = Vec::new();
    for start in 0..graph.nodes.len() {
        if adj[start].len() < 2 {
            continue;
        }
        for second in adj[start].clone() {
            if !adj[start].contains(&second) {
                continue;
            }
            let Some(cycle) = walk_cycle(graph, &adj, start, second) else {
                continue;
            };
            consume_cycle_edges(&mut adj, &cycle);
            cycles.push(cycle);
        }
    }

    cycles
        .into_iter()
        .filter_map(|cycle| {
            let points: Vec<Vec2> = cycle
                .iter()
                .map(|&id| graph.nodes[id].position)
                .collect();
            // Inner faces come out counter-clockwise; the outer face is
            // the clockwise complement.
            if polygon::signed_area(&points) <= 0.0 {
                return None;
            }
            if polygon::area(&points) < min_area {
                return None;
            }
            let centre = polygon::average_point(&points);
            if !field.on_land(centre) || field.in_parks(centre) {
                return None;
            }
            Some(points)
        })
        .collect()
}

/// Walks from the directed edge `first -> second`, taking the
/// clockwise-next edge at every node, until the walk closes or exceeds
/// [`MAX_CYCLE_EDGES`].
fn walk_cycle(graph: &Graph, adj: &[Vec<usize>], first: usize, second: usize) -> Option<Vec<usize>> {
    let mut visited = vec![first, second];
    for _ in 0..MAX_CYCLE_EDGES {
        let prev = visited[visited.len() - 2];
        let cur = visited[visited.len() - 1];
        let next = rightmost_node(graph, adj, prev, cur)?;
        if let Some(pos) = visited.iter().position(|&n| n == next) {
            return Some(visited[pos..].to_vec());
        }
        visited.push(next);
    }
    None
}

/// The neighbour of `to` at the smallest counter-clockwise angle from
/// the reversed incoming edge, excluding an immediate backtrack.
fn rightmost_node(graph: &Graph, adj: &[Vec<usize>], from: usize, to: usize) -> Option<usize> {
    let backwards = graph.nodes[from].position - graph.nodes[to].position;
    let base = backwards.angle();
    let mut best: Option<(f64, usize)> = None;
    for &candidate in &adj[to] {
        if candidate == from {
            continue;
        }
        let v = graph.nodes[candidate].position - graph.nodes[to].position;
        let mut angle = v.angle() - base;
        if angle < 0.0 {
            angle += TAU;
        }
        if best.map_or(true, |(best_angle, _)| angle < best_angle) {
            best = Some((angle, candidate));
        }
    }
    best.map(|(_, node)| node)
}

/// Removes each directed edge of the cycle so no face is walked twice.
fn consume_cycle_edges(adj: &mut [Vec<usize>], cycle: &[usize]) {
    for i in 0..cycle.len() {
        let from = cycle[i];
        let to = cycle[(i + 1) % cycle.len()];
        if let Some(pos) = adj[from].iter().position(|&n| n == to) {
            adj[from].remove(pos);
        } else {
            log::warn!("cycle edge {from}->{to} missing from adjacency");
        }
    }
}

/// Recursively bisects blocks into lots.
///
/// Per polygon: discard below `0.5 * min_area` or when too sliver-like,
/// emit below `2 * min_area`, emit early with probability
/// `chance_no_divide`, otherwise slice perpendicular to the longest edge
/// at a random point 40-60% along it and recurse on both halves.
pub fn divide_into_lots(
    blocks: &[Vec<Vec2>],
    min_area: f64,
    chance_no_divide: f64,
    rng: &mut Xorshift64,
) -> Vec<Vec<Vec2>> {
    let mut lots = Vec::new();
    for block in blocks {
        subdivide(block.clone(), min_area, chance_no_divide, rng, 0, &mut lots);
    }
    lots
}

fn subdivide(
    poly: Vec<Vec2>,
    min_area: f64,
    chance_no_divide: f64,
    rng: &mut Xorshift64,
    depth: usize,
    out: &mut Vec<Vec<Vec2>>,
) {
    let area = polygon::area(&poly);
    if area < 0.5 * min_area {
        return;
    }
    if polygon::shape_index(&poly) < MIN_SHAPE_INDEX {
        return;
    }
    if area < 2.0 * min_area || depth >= MAX_SUBDIVISION_DEPTH {
        out.push(poly);
        return;
    }
    if chance_no_divide > 0.0 && rng.next_f64() < chance_no_divide {
        out.push(poly);
        return;
    }

    let n = poly.len();
    let mut longest = 0usize;
    let mut longest_len = 0.0;
    for i in 0..n {
        let len = poly[i].distance_to(poly[(i + 1) % n]);
        if len > longest_len {
            longest_len = len;
            longest = i;
        }
    }
    let a = poly[longest];
    let b = poly[(longest + 1) % n];
    let cut = a.lerp(b, rng.next_range(0.4, 0.6));
    let perp = (b - a).normalize_or_zero().perp();

    let pieces = polygon::slice_by_line(&poly, cut, cut + perp);
    if pieces.len() < 2 {
        out.push(poly);
        return;
    }
    for piece in pieces {
        subdivide(piece, min_area, chance_no_divide, rng, depth + 1, out);
    }
}

/// Street setback: shrinks every lot inward, discarding lots the offset
/// collapses or makes non-simple.
pub fn shrink_lots(lots: &[Vec<Vec2>], spacing: f64) -> Vec<Vec<Vec2>> {
    if spacing <= 0.0 {
        return lots.to_vec();
    }
    lots.iter()
        .filter_map(|lot| polygon::offset_polygon(lot, -spacing))
        .collect()
}
