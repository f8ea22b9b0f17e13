//! Roadmap overlay composition.
//!
//! Debug view of the planner state: the occupancy grid as a grey base image,
//! every roadmap edge in blue, the current path (when one exists) in red on
//! top.

use image::{Rgb, RgbImage};

use crate::grid::{BresenhamLine, OccupancyGrid};
use crate::planning::Roadmap;
use crate::types::{Cell, WorldOrd};

const ROADMAP_COLOUR: Rgb<u8> = Rgb([0, 0, 255]);
const PATH_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);

/// Render the roadmap, and optionally a path, on top of the grid.
///
/// The image has the same pixel dimensions as the grid. Roadmap edges are
/// thin blue lines, isolated vertices single blue pixels, and the path is
/// drawn thicker in red over everything else.
pub fn compose_overlay(roadmap: &Roadmap, grid: &OccupancyGrid, path: &[WorldOrd]) -> RgbImage {
    let mut image = grid_to_colour(grid);

    for (u, v, _) in roadmap.graph().edges() {
        if let (Some(a), Some(b)) = (roadmap.ordinate(u), roadmap.ordinate(v)) {
            draw_line(
                &mut image,
                grid.world_to_cell(a),
                grid.world_to_cell(b),
                ROADMAP_COLOUR,
                0,
            );
        }
    }

    for v in roadmap.graph().vertices() {
        if roadmap.graph().degree(v) == 0 {
            if let Some(ord) = roadmap.ordinate(v) {
                put_pixel(&mut image, grid.world_to_cell(ord), ROADMAP_COLOUR);
            }
        }
    }

    for pair in path.windows(2) {
        draw_line(
            &mut image,
            grid.world_to_cell(pair[0]),
            grid.world_to_cell(pair[1]),
            PATH_COLOUR,
            1,
        );
    }

    image
}

/// Expand the greyscale occupancy bytes into a colour base image.
fn grid_to_colour(grid: &OccupancyGrid) -> RgbImage {
    let mut image = RgbImage::new(grid.width(), grid.height());
    for row in 0..grid.height() as i32 {
        for col in 0..grid.width() as i32 {
            let v = grid.value(Cell::new(col, row)).unwrap_or(0);
            image.put_pixel(col as u32, row as u32, Rgb([v, v, v]));
        }
    }
    image
}

#[inline]
fn put_pixel(image: &mut RgbImage, cell: Cell, colour: Rgb<u8>) {
    if cell.col >= 0
        && cell.row >= 0
        && (cell.col as u32) < image.width()
        && (cell.row as u32) < image.height()
    {
        image.put_pixel(cell.col as u32, cell.row as u32, colour);
    }
}

/// Rasterise a segment with the given half-width in pixels.
fn draw_line(image: &mut RgbImage, a: Cell, b: Cell, colour: Rgb<u8>, half_width: i32) {
    for cell in BresenhamLine::new(a, b) {
        for dr in -half_width..=half_width {
            for dc in -half_width..=half_width {
                put_pixel(image, Cell::new(cell.col + dc, cell.row + dr), colour);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use std::sync::atomic::AtomicBool;

    fn free_grid() -> OccupancyGrid {
        OccupancyGrid::filled(40, 40, 0.1, WorldOrd::new(0.0, 0.0), 255)
    }

    fn built_roadmap(grid: &mut OccupancyGrid) -> (Roadmap, Vec<WorldOrd>) {
        let config = PlannerConfig {
            map_size: 4.0,
            robot_diameter: 0.0,
            seed: Some(1),
            ..PlannerConfig::default()
        };
        let mut roadmap = Roadmap::new(&config);
        let path = roadmap.build(
            grid,
            WorldOrd::new(-0.8, -0.8),
            WorldOrd::new(0.8, 0.8),
            &AtomicBool::new(false),
        );
        (roadmap, path)
    }

    #[test]
    fn test_overlay_matches_grid_size() {
        let mut grid = free_grid();
        let (roadmap, path) = built_roadmap(&mut grid);
        let image = compose_overlay(&roadmap, &grid, &path);
        assert_eq!(image.width(), 40);
        assert_eq!(image.height(), 40);
    }

    #[test]
    fn test_path_drawn_in_red() {
        let mut grid = free_grid();
        let (roadmap, path) = built_roadmap(&mut grid);
        assert!(!path.is_empty());
        let image = compose_overlay(&roadmap, &grid, &path);

        // The path crosses the map centre; the centre pixel must be red.
        let centre = grid.world_to_cell(WorldOrd::new(0.0, 0.0));
        assert_eq!(
            image.get_pixel(centre.col as u32, centre.row as u32),
            &PATH_COLOUR
        );
    }

    #[test]
    fn test_base_image_keeps_grid_shade() {
        let mut grid = free_grid();
        let (roadmap, path) = built_roadmap(&mut grid);
        let image = compose_overlay(&roadmap, &grid, &path);

        // A corner away from any geometry stays the free-space grey.
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_isolated_vertex_marker() {
        let grid = free_grid();
        let config = PlannerConfig {
            robot_diameter: 0.0,
            ..PlannerConfig::default()
        };
        let mut roadmap = Roadmap::new(&config);
        let lone = WorldOrd::new(0.5, 0.5);
        roadmap.find_or_add(lone);

        let image = compose_overlay(&roadmap, &grid, &[]);
        let cell = grid.world_to_cell(lone);
        assert_eq!(
            image.get_pixel(cell.col as u32, cell.row as u32),
            &ROADMAP_COLOUR
        );
    }
}
