//! Planar graph construction from road polylines.
//!
//! All pairwise segment intersections are computed (quadratic over the
//! simplified polylines, which keeps segment counts tractable), each
//! polyline is split at its crossings, and endpoints are merged into
//! nodes keyed by quantized position. Every node stores its neighbours in
//! counter-clockwise angular order, which is what the minimum-cycle walk
//! in the polygon finder relies on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use city_engine_core::polygon::segment_intersection_t;
use city_engine_core::vector::Vec2;

/// Road class an edge originated from, kept for downstream styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoadKind {
    Coastline,
    River,
    Main,
    Major,
    Minor,
}

/// A polyline tagged with the road class that produced it.
#[derive(Debug, Clone)]
pub struct RoadPolyline {
    pub kind: RoadKind,
    pub points: Vec<Vec2>,
}

/// Directed reference to an adjacent node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub node: usize,
    pub kind: RoadKind,
}

/// A graph node with neighbours sorted counter-clockwise from +x.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub position: Vec2,
    pub neighbors: Vec<Neighbor>,
}

/// Planar graph of the road network.
#[derive(Debug, Clone)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
}

impl Graph {
    /// Builds the graph. `dstep` scales the position tolerance used to
    /// deduplicate intersection points and nodes. With `delete_dangling`
    /// set, degree-1 chains are pruned (they can never border a block).
    pub fn new(polylines: &[RoadPolyline], dstep: f64, delete_dangling: bool) -> Self {
        let quantum = (dstep / 10.0).max(1e-6);

        // Per-segment cut points from all pairwise intersections.
        struct Segment {
            line: usize,
            index: usize,
            a: Vec2,
            b: Vec2,
        }
        let mut segments: Vec<Segment> = Vec::new();
        for (line, polyline) in polylines.iter().enumerate() {
            for index in 0..polyline.points.len().saturating_sub(1) {
                segments.push(Segment {
                    line,
                    index,
                    a: polyline.points[index],
                    b: polyline.points[index + 1],
                });
            }
        }

        let mut cuts: HashMap<(usize, usize), Vec<(f64, Vec2)>> = HashMap::new();
        for i in 0..segments.len() {
            for j in i + 1..segments.len() {
                let (s1, s2) = (&segments[i], &segments[j]);
                if s1.line == s2.line && s1.index.abs_diff(s2.index) <= 1 {
                    continue;
                }
                // Cheap reject before the exact test.
                if s1.a.x.max(s1.b.x) < s2.a.x.min(s2.b.x) - quantum
                    || s2.a.x.max(s2.b.x) < s1.a.x.min(s1.b.x) - quantum
                    || s1.a.y.max(s1.b.y) < s2.a.y.min(s2.b.y) - quantum
                    || s2.a.y.max(s2.b.y) < s1.a.y.min(s1.b.y) - quantum
                {
                    continue;
                }
                if let Some((p, t, u)) = segment_intersection_t(s1.a, s1.b, s2.a, s2.b) {
                    cuts.entry((s1.line, s1.index)).or_default().push((t, p));
                    cuts.entry((s2.line, s2.index)).or_default().push((u, p));
                }
            }
        }

        // Split each polyline at its cuts and merge endpoints into nodes.
        let mut builder = GraphBuilder::new(quantum);
        for (line, polyline) in polylines.iter().enumerate() {
            let mut sequence: Vec<Vec2> = Vec::new();
            for index in 0..polyline.points.len().saturating_sub(1) {
                sequence.push(polyline.points[index]);
                if let Some(cut_list) = cuts.get_mut(&(line, index)) {
                    cut_list.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
                    sequence.extend(cut_list.iter().map(|(_, p)| *p));
                }
            }
            if let Some(last) = polyline.points.last() {
                sequence.push(*last);
            }
            builder.add_split_polyline(&sequence, polyline.kind);
        }

        let mut graph = builder.finish();
        if delete_dangling {
            graph.delete_dangling_chains();
        }
        graph.sort_neighbors();
        graph
    }

    /// Total number of directed neighbour references. Always even: every
    /// undirected edge appears once per endpoint.
    pub fn directed_edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.neighbors.len()).sum()
    }

    fn sort_neighbors(&mut self) {
        let positions: Vec<Vec2> = self.nodes.iter().map(|n| n.position).collect();
        for node in &mut self.nodes {
            let here = node.position;
            node.neighbors.sort_by(|a, b| {
                let angle_a = (positions[a.node] - here).angle();
                let angle_b = (positions[b.node] - here).angle();
                angle_a.partial_cmp(&angle_b).unwrap()
            });
        }
    }

    /// Iteratively strips degree-1 nodes; their chains cannot bound a
    /// polygon.
    fn delete_dangling_chains(&mut self) {
        loop {
            let Some(leaf) = self
                .nodes
                .iter()
                .position(|n| n.neighbors.len() == 1)
            else {
                break;
            };
            let neighbor = self.nodes[leaf].neighbors[0].node;
            self.nodes[leaf].neighbors.clear();
            self.nodes[neighbor].neighbors.retain(|n| n.node != leaf);
        }
    }
}

struct GraphBuilder {
    quantum: f64,
    index_of: HashMap<(i64, i64), usize>,
    nodes: Vec<GraphNode>,
}

impl GraphBuilder {
    fn new(quantum: f64) -> Self {
        Self {
            quantum,
            index_of: HashMap::new(),
            nodes: Vec::new(),
        }
    }

    fn node_at(&mut self, p: Vec2) -> usize {
        let key = (
            (p.x / self.quantum).round() as i64,
            (p.y / self.quantum).round() as i64,
        );
        if let Some(&id) = self.index_of.get(&key) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(GraphNode {
            position: p,
            neighbors: Vec::new(),
        });
        self.index_of.insert(key, id);
        id
    }

    fn add_split_polyline(&mut self, sequence: &[Vec2], kind: RoadKind) {
        let mut previous: Option<usize> = None;
        for p in sequence {
            let id = self.node_at(*p);
            if let Some(prev) = previous {
                // Samples quantized to the same node merge silently.
                if prev != id {
                    self.add_edge(prev, id, kind);
                }
            }
            previous = Some(id);
        }
    }

    fn add_edge(&mut self, a: usize, b: usize, kind: RoadKind) {
        if !self.nodes[a].neighbors.iter().any(|n| n.node == b) {
            self.nodes[a].neighbors.push(Neighbor { node: b, kind });
        }
        if !self.nodes[b].neighbors.iter().any(|n| n.node == a) {
            self.nodes[b].neighbors.push(Neighbor { node: a, kind });
        }
    }

    fn finish(self) -> Graph {
        Graph { nodes: self.nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(kind: RoadKind, points: &[(f64, f64)]) -> RoadPolyline {
        RoadPolyline {
            kind,
            points: points.iter().map(|(x, y)| Vec2::new(*x, *y)).collect(),
        }
    }

    fn node_near(graph: &Graph, p: Vec2) -> &GraphNode {
        graph
            .nodes
            .iter()
            .filter(|n| !n.neighbors.is_empty())
            .min_by(|a, b| {
                a.position
                    .distance_to(p)
                    .partial_cmp(&b.position.distance_to(p))
                    .unwrap()
            })
            .expect("graph has no connected nodes")
    }

    #[test]
    fn crossing_produces_degree_four_node() {
        let roads = vec![
            line(RoadKind::Main, &[(-10.0, 0.0), (10.0, 0.0)]),
            line(RoadKind::Minor, &[(0.0, -10.0), (0.0, 10.0)]),
        ];
        let graph = Graph::new(&roads, 1.0, false);
        let centre = node_near(&graph, Vec2::ZERO);
        assert!(centre.position.distance_to(Vec2::ZERO) < 1e-6);
        assert_eq!(centre.neighbors.len(), 4);
    }

    #[test]
    fn neighbors_are_sorted_counter_clockwise() {
        let roads = vec![
            line(RoadKind::Main, &[(-10.0, 0.0), (10.0, 0.0)]),
            line(RoadKind::Minor, &[(0.0, -10.0), (0.0, 10.0)]),
        ];
        let graph = Graph::new(&roads, 1.0, false);
        let centre = node_near(&graph, Vec2::ZERO);
        let angles: Vec<f64> = centre
            .neighbors
            .iter()
            .map(|n| (graph.nodes[n.node].position - centre.position).angle())
            .collect();
        for pair in angles.windows(2) {
            assert!(pair[0] < pair[1], "angles not strictly increasing: {angles:?}");
        }
    }

    #[test]
    fn every_edge_appears_twice() {
        let roads = vec![
            line(RoadKind::Main, &[(-10.0, 0.0), (10.0, 0.0)]),
            line(RoadKind::Minor, &[(0.0, -10.0), (0.0, 10.0)]),
            line(RoadKind::Minor, &[(-10.0, 5.0), (10.0, 5.0)]),
        ];
        let graph = Graph::new(&roads, 1.0, false);
        for (id, node) in graph.nodes.iter().enumerate() {
            for n in &node.neighbors {
                assert!(
                    graph.nodes[n.node].neighbors.iter().any(|m| m.node == id),
                    "edge {id}->{} missing its reverse", n.node
                );
            }
        }
        assert_eq!(graph.directed_edge_count() % 2, 0);
    }

    #[test]
    fn edges_carry_their_road_kind() {
        let roads = vec![
            line(RoadKind::Main, &[(-10.0, 0.0), (10.0, 0.0)]),
            line(RoadKind::Minor, &[(0.0, -10.0), (0.0, 10.0)]),
        ];
        let graph = Graph::new(&roads, 1.0, false);
        let centre = node_near(&graph, Vec2::ZERO);
        let kinds: Vec<RoadKind> = centre.neighbors.iter().map(|n| n.kind).collect();
        assert!(kinds.contains(&RoadKind::Main));
        assert!(kinds.contains(&RoadKind::Minor));
    }

    #[test]
    fn shared_endpoints_merge_into_one_node() {
        let roads = vec![
            line(RoadKind::Minor, &[(0.0, 0.0), (10.0, 0.0)]),
            line(RoadKind::Minor, &[(10.0, 0.00001), (20.0, 0.0)]),
        ];
        let graph = Graph::new(&roads, 1.0, false);
        let connected = graph.nodes.iter().filter(|n| !n.neighbors.is_empty()).count();
        assert_eq!(connected, 3, "shared endpoint did not merge");
    }

    #[test]
    fn grid_of_streets_has_expected_structure() {
        // 3 horizontal and 3 vertical streets: 9 crossings.
        let mut roads = Vec::new();
        for i in 0..3 {
            let y = i as f64 * 10.0;
            roads.push(line(RoadKind::Minor, &[(-5.0, y), (25.0, y)]));
            let x = i as f64 * 10.0;
            roads.push(line(RoadKind::Minor, &[(x, -5.0), (x, 25.0)]));
        }
        let graph = Graph::new(&roads, 1.0, false);
        let degree_four = graph
            .nodes
            .iter()
            .filter(|n| n.neighbors.len() == 4)
            .count();
        assert_eq!(degree_four, 9, "expected 9 full crossings");
    }

    #[test]
    fn dangling_chains_are_pruned() {
        let roads = vec![
            line(RoadKind::Minor, &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]),
            // Stub hanging off the loop.
            line(RoadKind::Minor, &[(10.0, 0.0), (20.0, 0.0), (30.0, 0.0)]),
        ];
        let graph = Graph::new(&roads, 1.0, true);
        for node in &graph.nodes {
            assert_ne!(
                node.neighbors.len(),
                1,
                "degree-1 node survived pruning at {:?}",
                node.position
            );
        }
    }

    #[test]
    fn empty_input_gives_empty_graph() {
        let graph = Graph::new(&[], 1.0, false);
        assert!(graph.nodes.is_empty());
    }
}
