//! Multi-threaded architecture for MargaNav.
//!
//! Separates concerns into four threads:
//! - Grid feed: publishes occupancy-grid frames into the world buffer
//! - Pose feed: publishes robot pose frames into the world buffer
//! - Planner thread: consumes goals, drives the roadmap, publishes results
//! - Output thread: logs waypoints, writes the overlay image

mod output;
mod planner;
mod world;

pub use output::OutputThread;
pub use planner::PlannerThread;
pub use world::{load_map_grid, run_grid_feed, run_pose_feed};

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::MargaConfig;
use crate::error::Result;
use crate::shared::{PlannerMailbox, WorldBuffer};
use crate::types::RobotPose;

/// Thread handles for the multi-threaded system.
pub struct ThreadHandles {
    pub planner: JoinHandle<()>,
    pub grid_feed: JoinHandle<()>,
    pub pose_feed: JoinHandle<()>,
    pub output: JoinHandle<()>,
}

impl ThreadHandles {
    /// Join every thread, logging any that panicked.
    pub fn join_all(self) {
        for (name, handle) in [
            ("grid-feed", self.grid_feed),
            ("pose-feed", self.pose_feed),
            ("planner", self.planner),
            ("output", self.output),
        ] {
            if handle.join().is_err() {
                tracing::error!("{} thread panicked", name);
            }
        }
    }
}

/// Spawn all threads and return handles.
pub fn spawn_threads(
    config: &MargaConfig,
    buffer: Arc<WorldBuffer>,
    mailbox: Arc<PlannerMailbox>,
) -> Result<ThreadHandles> {
    let (path_tx, path_rx) = mpsc::channel();
    let (overlay_tx, overlay_rx) = mpsc::channel();

    let map_grid = load_map_grid(&config.world, &config.planner)?;
    let pose = RobotPose::new(
        config.world.start_x,
        config.world.start_y,
        config.world.start_z,
    );
    let interval = Duration::from_millis(config.world.frame_interval_ms);

    let grid_feed = {
        let buffer = Arc::clone(&buffer);
        let mailbox = Arc::clone(&mailbox);
        thread::Builder::new()
            .name("grid-feed".into())
            .spawn(move || run_grid_feed(map_grid, buffer, mailbox, interval))
            .expect("Failed to spawn grid feed thread")
    };

    let pose_feed = {
        let buffer = Arc::clone(&buffer);
        let mailbox = Arc::clone(&mailbox);
        thread::Builder::new()
            .name("pose-feed".into())
            .spawn(move || run_pose_feed(pose, buffer, mailbox, interval))
            .expect("Failed to spawn pose feed thread")
    };

    let planner = {
        let planner_config = config.planner.clone();
        let buffer = Arc::clone(&buffer);
        let mailbox = Arc::clone(&mailbox);
        thread::Builder::new()
            .name("planner".into())
            .spawn(move || {
                let mut planner =
                    PlannerThread::new(planner_config, buffer, mailbox, path_tx, overlay_tx);
                planner.run();
            })
            .expect("Failed to spawn planner thread")
    };

    let output = {
        let mailbox = Arc::clone(&mailbox);
        let overlay_path = config.output.overlay_path.clone().into();
        thread::Builder::new()
            .name("output".into())
            .spawn(move || {
                let mut output = OutputThread::new(mailbox, path_rx, overlay_rx, overlay_path);
                output.run();
            })
            .expect("Failed to spawn output thread")
    };

    Ok(ThreadHandles {
        planner,
        grid_feed,
        pose_feed,
        output,
    })
}
