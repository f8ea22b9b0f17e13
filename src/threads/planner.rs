//! Planner loop thread.
//!
//! Serialises goal requests against the asynchronously updated world state:
//! wait for the first world frames, then for each goal snapshot the latest
//! grid and pose, drive the roadmap build, and hand the results to the
//! output sinks. Goals arriving mid-build overwrite the pending goal in the
//! mailbox and are picked up right after the current build completes.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::PlannerConfig;
use crate::grid::OccupancyGrid;
use crate::planning::{compose_overlay, Roadmap};
use crate::shared::messages::{OverlayMsg, PathMsg};
use crate::shared::{PlannerMailbox, WorldBuffer};
use crate::types::{RobotPose, WorldOrd};

/// Poll interval while waiting for the first world frames.
const WORLD_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Planner thread state and logic.
pub struct PlannerThread {
    config: PlannerConfig,
    buffer: Arc<WorldBuffer>,
    mailbox: Arc<PlannerMailbox>,
    roadmap: Roadmap,
    /// Last consumed world frame, retained while the streams are quiet.
    current_grid: Option<OccupancyGrid>,
    current_pose: Option<RobotPose>,
    path_tx: Sender<PathMsg>,
    overlay_tx: Sender<OverlayMsg>,
}

impl PlannerThread {
    pub fn new(
        config: PlannerConfig,
        buffer: Arc<WorldBuffer>,
        mailbox: Arc<PlannerMailbox>,
        path_tx: Sender<PathMsg>,
        overlay_tx: Sender<OverlayMsg>,
    ) -> Self {
        let roadmap = Roadmap::new(&config);
        Self {
            config,
            buffer,
            mailbox,
            roadmap,
            current_grid: None,
            current_pose: None,
            path_tx,
            overlay_tx,
        }
    }

    /// Run the planner loop until shutdown.
    pub fn run(&mut self) {
        info!("planner thread started");

        if !self.wait_for_world() {
            info!("planner thread shutting down before first world frame");
            return;
        }
        info!("world data available, ready to receive goal requests");

        while let Some(goal) = self.mailbox.wait_for_goal() {
            self.plan(goal);
        }

        info!("planner thread shutting down");
    }

    /// Spin until both streams have produced at least one frame.
    fn wait_for_world(&self) -> bool {
        while !self.buffer.has_both() {
            if self.mailbox.is_shutdown() {
                return false;
            }
            std::thread::sleep(WORLD_POLL_INTERVAL);
        }
        true
    }

    /// One Planning pass for a single goal.
    fn plan(&mut self, goal: WorldOrd) {
        let (grid, pose) = self.buffer.try_pop_latest();
        if let Some(grid) = grid {
            self.current_grid = Some(grid);
        }
        if let Some(pose) = pose {
            self.current_pose = Some(pose);
        }

        let (Some(grid), Some(pose)) = (self.current_grid.clone(), self.current_pose) else {
            warn!("no world frame available, dropping goal");
            return;
        };

        let start = pose.ordinate();
        self.roadmap.set_reference(start);

        info!(
            "starting build: ({:.1}, {:.1}) to ({:.1}, {:.1})",
            start.x, start.y, goal.x, goal.y
        );

        // The build dilates its grid in place; keep a pristine copy so the
        // overlay shows the map as delivered.
        let display_grid = grid.clone();
        let mut cspace = grid;

        let mut path = Vec::new();
        for attempt in 1..=self.config.max_retries.max(1) {
            if self.mailbox.is_shutdown() {
                return;
            }
            path = self
                .roadmap
                .build(&mut cspace, start, goal, self.mailbox.shutdown_flag());
            if !path.is_empty() {
                break;
            }
            warn!("path find failed, attempt {}", attempt);
        }

        // The overlay is published even when no path was found.
        let overlay = compose_overlay(&self.roadmap, &display_grid, &path);
        let _ = self.overlay_tx.send(OverlayMsg { image: overlay });

        if path.is_empty() {
            warn!("cannot reach goal ({:.1}, {:.1})", goal.x, goal.y);
            return;
        }

        let waypoints: Vec<RobotPose> = path
            .iter()
            .map(|w| RobotPose::new(w.x, w.y, pose.z))
            .collect();
        info!("publishing path with {} waypoints", waypoints.len());
        let _ = self.path_tx.send(PathMsg { waypoints });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;
    use std::sync::mpsc::{self, Receiver};
    use std::thread::JoinHandle;
    use std::time::Duration;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    struct Harness {
        buffer: Arc<WorldBuffer>,
        mailbox: Arc<PlannerMailbox>,
        path_rx: Receiver<PathMsg>,
        overlay_rx: Receiver<OverlayMsg>,
        handle: JoinHandle<()>,
    }

    impl Harness {
        fn shutdown(self) {
            self.mailbox.request_shutdown();
            self.handle.join().unwrap();
        }
    }

    fn free_grid() -> OccupancyGrid {
        OccupancyGrid::filled(40, 40, 0.1, WorldOrd::new(0.0, 0.0), 255)
    }

    fn start_planner(grid: Option<OccupancyGrid>, pose: Option<RobotPose>) -> Harness {
        let config = PlannerConfig {
            map_size: 4.0,
            robot_diameter: 0.0,
            seed: Some(5),
            ..PlannerConfig::default()
        };

        let buffer = Arc::new(WorldBuffer::new());
        let mailbox = Arc::new(PlannerMailbox::new());
        let (path_tx, path_rx) = mpsc::channel();
        let (overlay_tx, overlay_rx) = mpsc::channel();

        if let Some(grid) = grid {
            buffer.push_grid(grid);
        }
        if let Some(pose) = pose {
            buffer.push_pose(pose);
        }

        let handle = {
            let buffer = Arc::clone(&buffer);
            let mailbox = Arc::clone(&mailbox);
            std::thread::spawn(move || {
                let mut planner = PlannerThread::new(config, buffer, mailbox, path_tx, overlay_tx);
                planner.run();
            })
        };

        Harness {
            buffer,
            mailbox,
            path_rx,
            overlay_rx,
            handle,
        }
    }

    #[test]
    fn test_plans_goal_and_forwards_pose_z() {
        let harness = start_planner(Some(free_grid()), Some(RobotPose::new(0.0, 0.0, 0.7)));

        harness.mailbox.submit_goal(WorldOrd::new(1.0, 1.0));

        let overlay = harness.overlay_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(overlay.image.width(), 40);

        let path = harness.path_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert!(path.waypoints.len() >= 2);
        assert_eq!(path.waypoints[0].x, 0.0);
        let last = path.waypoints.last().unwrap();
        assert_eq!((last.x, last.y), (1.0, 1.0));
        assert!(path.waypoints.iter().all(|w| w.z == 0.7));

        harness.shutdown();
    }

    #[test]
    fn test_inaccessible_goal_still_publishes_overlay() {
        let mut grid = free_grid();
        for row in 10..15 {
            for col in 10..15 {
                grid.set_value(Cell::new(col, row), 0);
            }
        }
        let blocked_goal = grid.cell_to_world(Cell::new(12, 12));

        let harness = start_planner(Some(grid), Some(RobotPose::new(0.0, 0.0, 0.0)));
        harness.mailbox.submit_goal(blocked_goal);

        assert!(harness.overlay_rx.recv_timeout(RECV_TIMEOUT).is_ok());
        assert!(harness
            .path_rx
            .recv_timeout(Duration::from_millis(200))
            .is_err());

        harness.shutdown();
    }

    #[test]
    fn test_goal_submitted_while_waiting_is_overwritten() {
        // Both goals land in the mailbox before the planner sees world data,
        // so exactly one build runs and it uses the newer goal.
        let harness = start_planner(None, None);

        harness.mailbox.submit_goal(WorldOrd::new(1.0, 1.0));
        harness.mailbox.submit_goal(WorldOrd::new(-1.0, -1.0));

        harness.buffer.push_grid(free_grid());
        harness.buffer.push_pose(RobotPose::new(0.0, 0.0, 0.0));

        let path = harness.path_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        let last = path.waypoints.last().unwrap();
        assert_eq!((last.x, last.y), (-1.0, -1.0));

        // No second build happened.
        assert!(harness
            .path_rx
            .recv_timeout(Duration::from_millis(200))
            .is_err());

        harness.shutdown();
    }

    #[test]
    fn test_sequential_goals_reuse_retained_world_frame() {
        let harness = start_planner(Some(free_grid()), Some(RobotPose::new(0.0, 0.0, 0.0)));

        harness.mailbox.submit_goal(WorldOrd::new(1.0, 1.0));
        let first = harness.path_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        let last = first.waypoints.last().unwrap();
        assert_eq!((last.x, last.y), (1.0, 1.0));

        // The buffer is drained; the second goal must plan against the
        // retained frame.
        harness.mailbox.submit_goal(WorldOrd::new(-1.0, 0.5));
        let second = harness.path_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        let last = second.waypoints.last().unwrap();
        assert_eq!((last.x, last.y), (-1.0, 0.5));

        harness.shutdown();
    }

    #[test]
    fn test_shutdown_while_waiting_for_world() {
        let harness = start_planner(None, None);
        harness.shutdown();
    }

    #[test]
    fn test_shutdown_while_idle() {
        let harness = start_planner(Some(free_grid()), Some(RobotPose::new(0.0, 0.0, 0.0)));
        std::thread::sleep(Duration::from_millis(50));
        harness.shutdown();
    }
}
