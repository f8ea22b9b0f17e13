//! World feed threads for the simulation shell.
//!
//! Stand-ins for the external perception stack: one thread publishes grid
//! frames, one publishes pose frames, both at a fixed cadence until shutdown.
//! The grid comes from a greyscale map image when one is configured, or a
//! synthetic all-free map otherwise.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{PlannerConfig, WorldConfig};
use crate::error::Result;
use crate::grid::OccupancyGrid;
use crate::shared::{PlannerMailbox, WorldBuffer};
use crate::types::{RobotPose, WorldOrd};

/// Load the map grid named by the config, or synthesise a free one.
pub fn load_map_grid(world: &WorldConfig, planner: &PlannerConfig) -> Result<OccupancyGrid> {
    let reference = WorldOrd::new(world.start_x, world.start_y);

    match &world.map_image {
        Some(path) => {
            let img = image::open(path)?.to_luma8();
            let (width, height) = (img.width(), img.height());
            info!("loaded map {:?} ({}x{} cells)", path, width, height);
            OccupancyGrid::from_raw(img.into_raw(), width, height, planner.resolution, reference)
        }
        None => {
            let cells = (planner.map_size / planner.resolution).round() as u32;
            info!("using synthetic free map ({0}x{0} cells)", cells);
            Ok(OccupancyGrid::filled(
                cells,
                cells,
                planner.resolution,
                reference,
                255,
            ))
        }
    }
}

/// Publish grid frames until shutdown.
pub fn run_grid_feed(
    grid: OccupancyGrid,
    buffer: Arc<WorldBuffer>,
    mailbox: Arc<PlannerMailbox>,
    interval: Duration,
) {
    info!("grid feed started");
    while !mailbox.is_shutdown() {
        buffer.push_grid(grid.clone());
        std::thread::sleep(interval);
    }
    info!("grid feed shutting down");
}

/// Publish pose frames until shutdown.
pub fn run_pose_feed(
    pose: RobotPose,
    buffer: Arc<WorldBuffer>,
    mailbox: Arc<PlannerMailbox>,
    interval: Duration,
) {
    info!("pose feed started");
    while !mailbox.is_shutdown() {
        buffer.push_pose(pose);
        std::thread::sleep(interval);
    }
    info!("pose feed shutting down");
}
