//! Low-dispersion probabilistic roadmap construction and query.
//!
//! The roadmap captures configuration-space connectivity with few samples by
//! refusing any random sample closer than a dispersion radius to an existing
//! vertex, which spreads vertices almost uniformly and helps in narrow
//! passages. Vertices and edges accumulate across goal requests; a grid frame
//! only lives for one build cycle.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::PlannerConfig;
use crate::graph::{Graph, VertexId};
use crate::grid::OccupancyGrid;
use crate::types::WorldOrd;

/// Round a coordinate to one decimal place, the sampler's grid pitch.
#[inline]
fn round_decimetre(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// A PRM network over a square, robot-centred map region.
pub struct Roadmap {
    graph: Graph,
    /// Vertex id to world ordinate, bijective. Reverse lookups scan linearly;
    /// the network stays small (tens to low hundreds of vertices).
    network: BTreeMap<VertexId, WorldOrd>,
    next_vertex_id: u32,
    reference: WorldOrd,
    map_size: f64,
    robot_diameter: f64,
    dispersion_radius: f64,
    max_samples: usize,
    rng: StdRng,
}

impl Roadmap {
    pub fn new(config: &PlannerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            graph: Graph::new(config.density, config.max_edge_len),
            network: BTreeMap::new(),
            next_vertex_id: 0,
            reference: WorldOrd::new(0.0, 0.0),
            map_size: config.map_size,
            robot_diameter: config.robot_diameter,
            dispersion_radius: config.dispersion_radius,
            max_samples: config.max_samples,
            rng,
        }
    }

    /// Centre of the sampling window, usually the robot's position.
    pub fn set_reference(&mut self, reference: WorldOrd) {
        self.reference = reference;
    }

    pub fn reference(&self) -> WorldOrd {
        self.reference
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// World ordinate of a roadmap vertex.
    pub fn ordinate(&self, v: VertexId) -> Option<WorldOrd> {
        self.network.get(&v).copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.network.len()
    }

    fn lookup(&self, ordinate: WorldOrd) -> Option<VertexId> {
        self.network
            .iter()
            .find(|(_, o)| **o == ordinate)
            .map(|(&v, _)| v)
    }

    fn alloc_vertex(&mut self) -> VertexId {
        let v = VertexId(self.next_vertex_id);
        self.next_vertex_id += 1;
        v
    }

    /// Vertex for an ordinate, allocating one if none matches exactly.
    ///
    /// Used for start and goal ordinates; bypasses the dispersion rule.
    pub fn find_or_add(&mut self, ordinate: WorldOrd) -> VertexId {
        if let Some(v) = self.lookup(ordinate) {
            return v;
        }
        let v = self.alloc_vertex();
        self.graph.add_vertex(v);
        self.network.insert(v, ordinate);
        v
    }

    /// True iff any existing vertex lies strictly closer than `r` to `p`.
    pub fn violates_dispersion(&self, p: WorldOrd, r: f64) -> bool {
        self.network.values().any(|o| o.distance(&p) < r)
    }

    /// Try to connect a vertex to every other vertex in the network.
    ///
    /// Candidates further than the edge length cap are skipped, as are
    /// existing neighbours; each surviving candidate gets a line-of-sight
    /// check before the edge is admitted with its Euclidean weight. The scan
    /// stops as soon as the vertex saturates.
    pub fn connect_to_existing(&mut self, v: VertexId, grid: &OccupancyGrid) {
        let Some(v_ord) = self.ordinate(v) else {
            return;
        };
        let v_cell = grid.world_to_cell(v_ord);
        let max_len = self.graph.max_edge_len();

        let candidates: Vec<(VertexId, WorldOrd)> =
            self.network.iter().map(|(&u, &o)| (u, o)).collect();

        for (u, u_ord) in candidates {
            if self.graph.at_capacity(v) {
                break;
            }
            if u == v || self.graph.neighbours(v).iter().any(|e| e.to == u) {
                continue;
            }

            let dist = v_ord.distance(&u_ord);
            if dist > max_len {
                continue;
            }

            if grid.can_connect(v_cell, grid.world_to_cell(u_ord)) {
                self.graph.add_edge(v, u, dist);
            }
        }
    }

    /// Build a roadmap path from `start` to `goal` within the C-space grid.
    ///
    /// Dilates the grid if the frame was not already expanded, re-attaches
    /// start and goal to the existing network, and only then grows the
    /// network by low-dispersion sampling, bounded by `max_samples`. Returns
    /// the ordered waypoints, or an empty vector when no path was found.
    ///
    /// `cancel` is polled at the top of every sampling iteration so a
    /// shutdown never waits on a long build.
    pub fn build(
        &mut self,
        grid: &mut OccupancyGrid,
        start: WorldOrd,
        goal: WorldOrd,
        cancel: &AtomicBool,
    ) -> Vec<WorldOrd> {
        grid.expand_cspace(self.robot_diameter);

        if !grid.is_free(grid.world_to_cell(start)) || !grid.is_free(grid.world_to_cell(goal)) {
            warn!(
                "start ({:.1}, {:.1}) or goal ({:.1}, {:.1}) not in known free space",
                start.x, start.y, goal.x, goal.y
            );
            return Vec::new();
        }

        let v_start = self.find_or_add(start);
        let v_goal = self.find_or_add(goal);

        // The network persists across requests; a previous build may already
        // answer this one.
        let path = self.graph.shortest_path(v_start, v_goal);
        if !path.is_empty() {
            return self.to_ord_path(&path);
        }

        self.connect_to_existing(v_start, grid);
        self.connect_to_existing(v_goal, grid);
        let path = self.graph.shortest_path(v_start, v_goal);
        if !path.is_empty() {
            return self.to_ord_path(&path);
        }

        for drawn in 0..self.max_samples {
            if cancel.load(Ordering::Acquire) {
                debug!("build cancelled after {} samples", drawn);
                return Vec::new();
            }

            let p = self.sample_ordinate();
            if !grid.is_free(grid.world_to_cell(p)) {
                continue;
            }
            if self.violates_dispersion(p, self.dispersion_radius) {
                continue;
            }

            let v = self.find_or_add(p);
            self.connect_to_existing(v, grid);

            let path = self.graph.shortest_path(v_start, v_goal);
            if !path.is_empty() {
                debug!(
                    "path found after {} samples, {} vertices in network",
                    drawn + 1,
                    self.network.len()
                );
                return self.optimise_path(grid, self.to_ord_path(&path));
            }
        }

        Vec::new()
    }

    /// Answer a path from the existing network without drawing samples.
    pub fn query(
        &mut self,
        grid: &mut OccupancyGrid,
        start: WorldOrd,
        goal: WorldOrd,
    ) -> Vec<WorldOrd> {
        grid.expand_cspace(self.robot_diameter);

        if !grid.is_free(grid.world_to_cell(start)) || !grid.is_free(grid.world_to_cell(goal)) {
            return Vec::new();
        }

        let v_start = self.find_or_add(start);
        let v_goal = self.find_or_add(goal);
        self.connect_to_existing(v_start, grid);
        self.connect_to_existing(v_goal, grid);

        let path = self.graph.shortest_path(v_start, v_goal);
        if path.is_empty() {
            return Vec::new();
        }
        self.optimise_path(grid, self.to_ord_path(&path))
    }

    /// Shortcut a path: greedily jump to the furthest waypoint still in
    /// direct line of sight.
    ///
    /// Preserves both endpoints, never emits a segment that fails the
    /// line-of-sight check, and never returns more waypoints than it was
    /// given.
    pub fn optimise_path(&self, grid: &OccupancyGrid, path: Vec<WorldOrd>) -> Vec<WorldOrd> {
        if path.len() <= 2 {
            return path;
        }

        let mut result = vec![path[0]];
        let mut i = 0;

        while i + 1 < path.len() {
            let mut j = path.len() - 1;
            while j > i + 1 {
                let a = grid.world_to_cell(path[i]);
                let b = grid.world_to_cell(path[j]);
                if grid.can_connect(a, b) {
                    break;
                }
                j -= 1;
            }
            result.push(path[j]);
            i = j;
        }

        result
    }

    fn sample_ordinate(&mut self) -> WorldOrd {
        let half = self.map_size / 2.0;
        let x = self
            .rng
            .gen_range(self.reference.x - half..=self.reference.x + half);
        let y = self
            .rng
            .gen_range(self.reference.y - half..=self.reference.y + half);
        WorldOrd::new(round_decimetre(x), round_decimetre(y))
    }

    fn to_ord_path(&self, path: &[VertexId]) -> Vec<WorldOrd> {
        path.iter().filter_map(|&v| self.ordinate(v)).collect()
    }
}
