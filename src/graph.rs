//! Undirected weighted graph backing the roadmap.
//!
//! Vertices are opaque, monotonically issued ids. Edge admission enforces the
//! roadmap invariants (symmetry, positive bounded weights, a per-vertex degree
//! cap) so the planner can treat `add_edge` rejections as ordinary control
//! flow.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::BinaryHeap;
use std::fmt;

/// Opaque roadmap vertex id. Ids are issued monotonically and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(pub u32);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A half-edge stored in a vertex's neighbour list.
#[derive(Clone, Copy, Debug)]
pub struct Edge {
    pub to: VertexId,
    pub weight: f64,
}

/// Undirected weighted graph with capped vertex degree and edge length.
#[derive(Clone, Debug)]
pub struct Graph {
    adjacency: BTreeMap<VertexId, Vec<Edge>>,
    max_degree: usize,
    max_edge_len: f64,
}

/// Entry in the Dijkstra priority queue.
#[derive(Clone, Copy, Debug)]
struct SearchNode {
    vertex: VertexId,
    cost: f64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.vertex == other.vertex
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse cost ordering for a min-heap; ties pop the smaller vertex
        // id first so search results are deterministic for a fixed graph.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Graph {
    /// Create an empty graph with the given degree and edge length caps.
    pub fn new(max_degree: usize, max_edge_len: f64) -> Self {
        Self {
            adjacency: BTreeMap::new(),
            max_degree,
            max_edge_len,
        }
    }

    /// Insert a vertex with an empty neighbour set. Idempotent.
    pub fn add_vertex(&mut self, v: VertexId) {
        self.adjacency.entry(v).or_default();
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.adjacency.contains_key(&v)
    }

    pub fn max_edge_len(&self) -> f64 {
        self.max_edge_len
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Neighbour list of a vertex; empty for unknown vertices.
    pub fn neighbours(&self, v: VertexId) -> &[Edge] {
        self.adjacency.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn degree(&self, v: VertexId) -> usize {
        self.neighbours(v).len()
    }

    /// True when the vertex cannot accept further edges.
    pub fn at_capacity(&self, v: VertexId) -> bool {
        self.degree(v) >= self.max_degree
    }

    fn are_neighbours(&self, u: VertexId, v: VertexId) -> bool {
        self.neighbours(u).iter().any(|e| e.to == v)
    }

    /// Insert the undirected edge `u <-> v` with the given weight.
    ///
    /// Returns `false` without modifying the graph when the edge would break
    /// an invariant: self-edge, non-positive or over-length weight, unknown
    /// endpoint, saturated endpoint, or an edge that already exists.
    pub fn add_edge(&mut self, u: VertexId, v: VertexId, weight: f64) -> bool {
        if u == v || weight <= 0.0 || weight > self.max_edge_len {
            return false;
        }
        if !self.contains(u) || !self.contains(v) {
            return false;
        }
        if self.at_capacity(u) || self.at_capacity(v) {
            return false;
        }
        if self.are_neighbours(u, v) {
            return false;
        }

        if let Some(edges) = self.adjacency.get_mut(&u) {
            edges.push(Edge { to: v, weight });
        }
        if let Some(edges) = self.adjacency.get_mut(&v) {
            edges.push(Edge { to: u, weight });
        }
        true
    }

    /// Dijkstra shortest path from `src` to `dst`.
    ///
    /// Returns the vertex sequence including both endpoints, `[src]` when
    /// `src == dst`, and an empty vector when `dst` is unreachable or either
    /// endpoint is unknown. Distance ties are broken toward the smaller
    /// vertex id.
    pub fn shortest_path(&self, src: VertexId, dst: VertexId) -> Vec<VertexId> {
        if !self.contains(src) || !self.contains(dst) {
            return Vec::new();
        }
        if src == dst {
            return vec![src];
        }

        let mut dist: BTreeMap<VertexId, f64> = BTreeMap::new();
        let mut prev: BTreeMap<VertexId, VertexId> = BTreeMap::new();
        let mut heap = BinaryHeap::new();

        dist.insert(src, 0.0);
        heap.push(SearchNode {
            vertex: src,
            cost: 0.0,
        });

        while let Some(SearchNode { vertex, cost }) = heap.pop() {
            if vertex == dst {
                break;
            }

            // Stale queue entry from an earlier relaxation.
            if cost > *dist.get(&vertex).unwrap_or(&f64::MAX) {
                continue;
            }

            for edge in self.neighbours(vertex) {
                let next_cost = cost + edge.weight;
                let best = *dist.get(&edge.to).unwrap_or(&f64::MAX);
                if next_cost < best {
                    dist.insert(edge.to, next_cost);
                    prev.insert(edge.to, vertex);
                    heap.push(SearchNode {
                        vertex: edge.to,
                        cost: next_cost,
                    });
                }
            }
        }

        if !prev.contains_key(&dst) {
            return Vec::new();
        }

        let mut path = vec![dst];
        let mut current = dst;
        while let Some(&p) = prev.get(&current) {
            path.push(p);
            current = p;
        }
        path.reverse();
        path
    }

    /// Iterate every undirected edge exactly once as `(u, v, weight)`.
    pub fn edges(&self) -> impl Iterator<Item = (VertexId, VertexId, f64)> + '_ {
        self.adjacency.iter().flat_map(|(&u, edges)| {
            edges
                .iter()
                .filter(move |e| u < e.to)
                .map(move |e| (u, e.to, e.weight))
        })
    }

    /// Iterate every vertex id in ascending order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.adjacency.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(n: u32) -> Graph {
        let mut g = Graph::new(5, 2.5);
        for i in 0..n {
            g.add_vertex(VertexId(i));
        }
        g
    }

    #[test]
    fn test_add_vertex_idempotent() {
        let mut g = graph_with(1);
        g.add_vertex(VertexId(0));
        assert_eq!(g.vertex_count(), 1);
    }

    #[test]
    fn test_add_edge_is_symmetric() {
        let mut g = graph_with(2);
        assert!(g.add_edge(VertexId(0), VertexId(1), 1.5));
        assert!(g.neighbours(VertexId(0)).iter().any(|e| e.to == VertexId(1)));
        assert!(g.neighbours(VertexId(1)).iter().any(|e| e.to == VertexId(0)));
        assert_eq!(g.neighbours(VertexId(0))[0].weight, 1.5);
        assert_eq!(g.neighbours(VertexId(1))[0].weight, 1.5);
    }

    #[test]
    fn test_add_edge_rejections() {
        let mut g = graph_with(2);
        assert!(!g.add_edge(VertexId(0), VertexId(0), 1.0)); // self-edge
        assert!(!g.add_edge(VertexId(0), VertexId(1), 0.0)); // non-positive
        assert!(!g.add_edge(VertexId(0), VertexId(1), -1.0));
        assert!(!g.add_edge(VertexId(0), VertexId(1), 2.6)); // over max length
        assert!(!g.add_edge(VertexId(0), VertexId(7), 1.0)); // unknown endpoint
        assert!(g.add_edge(VertexId(0), VertexId(1), 1.0));
        assert!(!g.add_edge(VertexId(0), VertexId(1), 1.0)); // duplicate
        assert!(!g.add_edge(VertexId(1), VertexId(0), 1.0)); // reversed duplicate
    }

    #[test]
    fn test_degree_cap() {
        let mut g = graph_with(8);
        for i in 1..8 {
            g.add_edge(VertexId(0), VertexId(i), 1.0);
        }
        assert_eq!(g.degree(VertexId(0)), 5);
        assert!(g.at_capacity(VertexId(0)));
        // Saturated hub refuses, but spokes still connect among themselves.
        assert!(!g.add_edge(VertexId(0), VertexId(6), 1.0));
        assert!(g.add_edge(VertexId(6), VertexId(7), 1.0));
    }

    #[test]
    fn test_shortest_path_simple_chain() {
        let mut g = graph_with(4);
        g.add_edge(VertexId(0), VertexId(1), 1.0);
        g.add_edge(VertexId(1), VertexId(2), 1.0);
        g.add_edge(VertexId(2), VertexId(3), 1.0);
        assert_eq!(
            g.shortest_path(VertexId(0), VertexId(3)),
            vec![VertexId(0), VertexId(1), VertexId(2), VertexId(3)]
        );
    }

    #[test]
    fn test_shortest_path_prefers_cheaper_route() {
        let mut g = graph_with(4);
        g.add_edge(VertexId(0), VertexId(1), 1.0);
        g.add_edge(VertexId(1), VertexId(3), 1.0);
        g.add_edge(VertexId(0), VertexId(2), 1.5);
        g.add_edge(VertexId(2), VertexId(3), 1.5);
        assert_eq!(
            g.shortest_path(VertexId(0), VertexId(3)),
            vec![VertexId(0), VertexId(1), VertexId(3)]
        );
    }

    #[test]
    fn test_shortest_path_unreachable_is_empty() {
        let mut g = graph_with(3);
        g.add_edge(VertexId(0), VertexId(1), 1.0);
        assert!(g.shortest_path(VertexId(0), VertexId(2)).is_empty());
    }

    #[test]
    fn test_shortest_path_to_self() {
        let g = graph_with(1);
        assert_eq!(g.shortest_path(VertexId(0), VertexId(0)), vec![VertexId(0)]);
    }

    #[test]
    fn test_tie_break_is_deterministic() {
        // Two routes of identical cost; the one through the smaller id wins.
        let mut g = graph_with(4);
        g.add_edge(VertexId(0), VertexId(1), 1.0);
        g.add_edge(VertexId(0), VertexId(2), 1.0);
        g.add_edge(VertexId(1), VertexId(3), 1.0);
        g.add_edge(VertexId(2), VertexId(3), 1.0);
        assert_eq!(
            g.shortest_path(VertexId(0), VertexId(3)),
            vec![VertexId(0), VertexId(1), VertexId(3)]
        );
    }

    #[test]
    fn test_edges_yields_each_edge_once() {
        let mut g = graph_with(3);
        g.add_edge(VertexId(0), VertexId(1), 1.0);
        g.add_edge(VertexId(1), VertexId(2), 2.0);
        let edges: Vec<_> = g.edges().collect();
        assert_eq!(edges.len(), 2);
        assert!(edges.contains(&(VertexId(0), VertexId(1), 1.0)));
        assert!(edges.contains(&(VertexId(1), VertexId(2), 2.0)));
    }
}
