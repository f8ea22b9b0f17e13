//! Occupancy grid and configuration-space geometry.
//!
//! A grid frame is a greyscale raster: bytes near 255 are known free space,
//! bytes near 0 are occupied, anything in between is unknown. The grid is
//! robot-centred around its `reference` ordinate, with the y-axis inverted
//! (positive world y maps to smaller row indices).

use std::collections::VecDeque;

use crate::error::{MargaError, Result};
use crate::types::{Cell, WorldOrd};

/// Occupancy bytes strictly greater than this are known free space.
/// Everything else (occupied or unknown) is treated as an obstacle.
pub const FREE_THRESHOLD: u8 = 127;

/// Byte stamped into cells swallowed by C-space dilation.
const OCCUPIED: u8 = 0;

/// A single occupancy grid frame.
///
/// Frames are immutable for the duration of one build cycle; dilation is the
/// only mutation and happens once per frame before planning starts.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    resolution: f64,
    reference: WorldOrd,
    data: Vec<u8>,
    /// Cell radius this grid was last dilated with, if any.
    inflated_radius: Option<u32>,
}

impl OccupancyGrid {
    /// Build a grid frame from a row-major byte buffer.
    pub fn from_raw(
        data: Vec<u8>,
        width: u32,
        height: u32,
        resolution: f64,
        reference: WorldOrd,
    ) -> Result<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return Err(MargaError::Map(format!(
                "grid byte count {} does not match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        if resolution <= 0.0 {
            return Err(MargaError::Map(format!(
                "non-positive resolution {resolution}"
            )));
        }

        Ok(Self {
            width,
            height,
            resolution,
            reference,
            data,
            inflated_radius: None,
        })
    }

    /// Build a uniformly filled grid.
    pub fn filled(
        width: u32,
        height: u32,
        resolution: f64,
        reference: WorldOrd,
        value: u8,
    ) -> Self {
        Self {
            width,
            height,
            resolution,
            reference,
            data: vec![value; (width as usize) * (height as usize)],
            inflated_radius: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn reference(&self) -> WorldOrd {
        self.reference
    }

    #[inline]
    fn index(&self, cell: Cell) -> usize {
        (cell.row as usize) * (self.width as usize) + cell.col as usize
    }

    #[inline]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.col >= 0
            && cell.row >= 0
            && (cell.col as u32) < self.width
            && (cell.row as u32) < self.height
    }

    /// Occupancy byte at a cell, `None` when out of bounds.
    #[inline]
    pub fn value(&self, cell: Cell) -> Option<u8> {
        if self.in_bounds(cell) {
            Some(self.data[self.index(cell)])
        } else {
            None
        }
    }

    /// Overwrite the occupancy byte at a cell. Out-of-bounds writes are
    /// ignored.
    pub fn set_value(&mut self, cell: Cell, value: u8) {
        if self.in_bounds(cell) {
            let idx = self.index(cell);
            self.data[idx] = value;
        }
    }

    /// True iff the cell is inside the grid and known free.
    /// Out-of-bounds cells read as occupied.
    #[inline]
    pub fn is_free(&self, cell: Cell) -> bool {
        matches!(self.value(cell), Some(v) if v > FREE_THRESHOLD)
    }

    /// Map a world ordinate onto its grid cell.
    #[inline]
    pub fn world_to_cell(&self, p: WorldOrd) -> Cell {
        let col = ((p.x - self.reference.x) / self.resolution + self.width as f64 / 2.0).round();
        let row = (self.height as f64 / 2.0 - (p.y - self.reference.y) / self.resolution).round();
        Cell::new(col as i32, row as i32)
    }

    /// Map a grid cell back onto its world ordinate.
    ///
    /// Exact inverse of [`world_to_cell`](Self::world_to_cell): converting a
    /// cell to world coordinates and back yields the same cell for every
    /// in-bounds cell.
    #[inline]
    pub fn cell_to_world(&self, c: Cell) -> WorldOrd {
        let x = self.reference.x + (c.col as f64 - self.width as f64 / 2.0) * self.resolution;
        let y = self.reference.y + (self.height as f64 / 2.0 - c.row as f64) * self.resolution;
        WorldOrd::new(x, y)
    }

    /// Dilate non-free space outward by half the robot diameter so the robot
    /// can be treated as a point.
    ///
    /// The structuring element is a square of radius
    /// `ceil(diameter / (2 * resolution))` cells. Re-applying with the same
    /// diameter is a no-op: the grid remembers the radius it was inflated
    /// with.
    pub fn expand_cspace(&mut self, robot_diameter_m: f64) {
        let radius = self.dilation_radius_cells(robot_diameter_m);
        if self.inflated_radius == Some(radius) {
            return;
        }

        if radius > 0 {
            self.dilate(radius);
        }
        self.inflated_radius = Some(radius);
    }

    /// Convert a robot diameter to a dilation radius in cells.
    #[inline]
    fn dilation_radius_cells(&self, robot_diameter_m: f64) -> u32 {
        if robot_diameter_m <= 0.0 {
            return 0;
        }
        (robot_diameter_m / (2.0 * self.resolution)).ceil() as u32
    }

    /// Brushfire sweep outward from every obstacle cell.
    ///
    /// Uses 8-connected BFS with unit step cost, which measures Chebyshev
    /// distance and therefore grows obstacles with a square element. Every
    /// cell within `radius` of an obstacle becomes occupied.
    fn dilate(&mut self, radius: u32) {
        let total = (self.width as usize) * (self.height as usize);
        let mut distance = vec![u32::MAX; total];
        let mut queue = VecDeque::new();

        for row in 0..self.height as i32 {
            for col in 0..self.width as i32 {
                let cell = Cell::new(col, row);
                if !self.is_free(cell) {
                    distance[self.index(cell)] = 0;
                    queue.push_back(cell);
                }
            }
        }

        let neighbours = [
            (-1, 0),
            (1, 0),
            (0, -1),
            (0, 1),
            (-1, -1),
            (1, -1),
            (-1, 1),
            (1, 1),
        ];

        while let Some(cell) = queue.pop_front() {
            let current = distance[self.index(cell)];
            if current >= radius {
                continue;
            }

            for (dc, dr) in neighbours {
                let next = Cell::new(cell.col + dc, cell.row + dr);
                if !self.in_bounds(next) {
                    continue;
                }
                let idx = self.index(next);
                if current + 1 < distance[idx] {
                    distance[idx] = current + 1;
                    queue.push_back(next);
                }
            }
        }

        for idx in 0..total {
            if distance[idx] <= radius {
                self.data[idx] = OCCUPIED;
            }
        }
    }

    /// Cells visited by the straight segment between two cells, inclusive.
    pub fn line(&self, a: Cell, b: Cell) -> BresenhamLine {
        BresenhamLine::new(a, b)
    }

    /// True iff every cell rasterised along the segment `a -> b` is free.
    pub fn can_connect(&self, a: Cell, b: Cell) -> bool {
        self.line(a, b).all(|cell| self.is_free(cell))
    }
}

/// Bresenham traversal over the cells of a straight segment.
///
/// Yields both endpoints. Cost is linear in the segment's Chebyshev length.
pub struct BresenhamLine {
    current: Cell,
    end: Cell,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
    done: bool,
}

impl BresenhamLine {
    pub fn new(a: Cell, b: Cell) -> Self {
        let dx = (b.col - a.col).abs();
        let dy = (b.row - a.row).abs();
        Self {
            current: a,
            end: b,
            dx,
            dy,
            sx: if a.col < b.col { 1 } else { -1 },
            sy: if a.row < b.row { 1 } else { -1 },
            err: dx - dy,
            done: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        if self.done {
            return None;
        }

        let cell = self.current;
        if cell == self.end {
            self.done = true;
            return Some(cell);
        }

        let e2 = 2 * self.err;
        if e2 > -self.dy {
            self.err -= self.dy;
            self.current.col += self.sx;
        }
        if e2 < self.dx {
            self.err += self.dx;
            self.current.row += self.sy;
        }

        Some(cell)
    }
}
