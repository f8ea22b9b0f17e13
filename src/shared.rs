//! Shared state for the multi-threaded planner.
//!
//! Three roles touch this module: world producers push grid and pose frames
//! into [`WorldBuffer`], the goal service writes into [`PlannerMailbox`], and
//! the planner thread is the sole consumer of both. Roadmap state itself is
//! owned exclusively by the planner thread and never appears here.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use crate::grid::OccupancyGrid;
use crate::types::{RobotPose, WorldOrd};

/// Frames retained per stream; the oldest frame is dropped on overflow so
/// producers never block on the consumer.
const BUFFER_DEPTH: usize = 4;

#[derive(Default)]
struct BufferInner {
    grids: VecDeque<OccupancyGrid>,
    poses: VecDeque<RobotPose>,
}

/// Bounded buffers for the incoming occupancy-grid and pose streams.
///
/// One mutex guards both sequences as a unit; the critical sections do no
/// I/O and no allocation beyond the frame hand-off.
#[derive(Default)]
pub struct WorldBuffer {
    inner: Mutex<BufferInner>,
}

impl WorldBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a grid frame, dropping the oldest when the buffer is full.
    pub fn push_grid(&self, grid: OccupancyGrid) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.grids.len() == BUFFER_DEPTH {
                inner.grids.pop_front();
            }
            inner.grids.push_back(grid);
        }
    }

    /// Append a pose frame, dropping the oldest when the buffer is full.
    pub fn push_pose(&self, pose: RobotPose) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.poses.len() == BUFFER_DEPTH {
                inner.poses.pop_front();
            }
            inner.poses.push_back(pose);
        }
    }

    /// True once at least one frame of each stream has arrived.
    pub fn has_both(&self) -> bool {
        self.inner
            .lock()
            .map(|inner| !inner.grids.is_empty() && !inner.poses.is_empty())
            .unwrap_or(false)
    }

    /// Take the most recent frame of each stream, emptying both buffers.
    /// A stream that has not produced since the last call yields `None`.
    pub fn try_pop_latest(&self) -> (Option<OccupancyGrid>, Option<RobotPose>) {
        match self.inner.lock() {
            Ok(mut inner) => {
                let grid = inner.grids.drain(..).last();
                let pose = inner.poses.drain(..).last();
                (grid, pose)
            }
            Err(_) => (None, None),
        }
    }
}

/// Synchronised mailbox carrying the pending goal and the shutdown flag.
///
/// A goal submitted while the planner is mid-build overwrites the pending
/// goal without preempting the build; the planner picks it up as soon as the
/// current build finishes.
#[derive(Default)]
pub struct PlannerMailbox {
    goal: Mutex<Option<WorldOrd>>,
    goal_ready: Condvar,
    shutdown: AtomicBool,
}

impl PlannerMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service-handler side: store the goal and wake the planner.
    pub fn submit_goal(&self, goal: WorldOrd) {
        if let Ok(mut pending) = self.goal.lock() {
            *pending = Some(goal);
            self.goal_ready.notify_one();
        }
    }

    /// Block until a goal arrives; `None` means shutdown was requested.
    pub fn wait_for_goal(&self) -> Option<WorldOrd> {
        let mut pending = self.goal.lock().ok()?;
        loop {
            if self.is_shutdown() {
                return None;
            }
            if let Some(goal) = pending.take() {
                return Some(goal);
            }
            pending = self.goal_ready.wait(pending).ok()?;
        }
    }

    /// Signal cooperative shutdown and wake every waiter.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        // Hold the goal lock while notifying so a waiter cannot check the
        // flag and then sleep through the wakeup.
        let _guard = self.goal.lock();
        self.goal_ready.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// The raw flag, polled inside the sampling loop of a running build.
    pub fn shutdown_flag(&self) -> &AtomicBool {
        &self.shutdown
    }
}

/// Message types crossing from the planner thread to the output sinks.
pub mod messages {
    use crate::types::RobotPose;
    use image::RgbImage;

    /// Waypoints of a discovered path. `z` carries the robot's last known
    /// height, copied onto every waypoint.
    #[derive(Clone, Debug)]
    pub struct PathMsg {
        pub waypoints: Vec<RobotPose>,
    }

    /// Roadmap overlay image, published after every build attempt whether or
    /// not a path was found.
    pub struct OverlayMsg {
        pub image: RgbImage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn grid_with_ref(x: f64) -> OccupancyGrid {
        OccupancyGrid::filled(4, 4, 0.1, WorldOrd::new(x, 0.0), 255)
    }

    #[test]
    fn test_buffer_starts_empty() {
        let buffer = WorldBuffer::new();
        assert!(!buffer.has_both());
        let (grid, pose) = buffer.try_pop_latest();
        assert!(grid.is_none());
        assert!(pose.is_none());
    }

    #[test]
    fn test_has_both_needs_both_streams() {
        let buffer = WorldBuffer::new();
        buffer.push_grid(grid_with_ref(0.0));
        assert!(!buffer.has_both());
        buffer.push_pose(RobotPose::new(0.0, 0.0, 0.0));
        assert!(buffer.has_both());
    }

    #[test]
    fn test_pop_latest_takes_newest_and_drains() {
        let buffer = WorldBuffer::new();
        for i in 0..3 {
            buffer.push_grid(grid_with_ref(i as f64));
        }
        buffer.push_pose(RobotPose::new(1.0, 2.0, 3.0));

        let (grid, pose) = buffer.try_pop_latest();
        assert_eq!(grid.map(|g| g.reference().x), Some(2.0));
        assert_eq!(pose, Some(RobotPose::new(1.0, 2.0, 3.0)));
        assert!(!buffer.has_both());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let buffer = WorldBuffer::new();
        for i in 0..10 {
            buffer.push_grid(grid_with_ref(i as f64));
        }
        let (grid, _) = buffer.try_pop_latest();
        assert_eq!(grid.map(|g| g.reference().x), Some(9.0));
    }

    #[test]
    fn test_missing_side_returns_none() {
        let buffer = WorldBuffer::new();
        buffer.push_grid(grid_with_ref(0.0));
        let (grid, pose) = buffer.try_pop_latest();
        assert!(grid.is_some());
        assert!(pose.is_none());
    }

    #[test]
    fn test_mailbox_overwrites_pending_goal() {
        let mailbox = PlannerMailbox::new();
        mailbox.submit_goal(WorldOrd::new(1.0, 1.0));
        mailbox.submit_goal(WorldOrd::new(2.0, 2.0));
        assert_eq!(mailbox.wait_for_goal(), Some(WorldOrd::new(2.0, 2.0)));
    }

    #[test]
    fn test_mailbox_shutdown_wakes_waiter() {
        let mailbox = Arc::new(PlannerMailbox::new());
        let waiter = {
            let mailbox = Arc::clone(&mailbox);
            std::thread::spawn(move || mailbox.wait_for_goal())
        };

        std::thread::sleep(Duration::from_millis(50));
        mailbox.request_shutdown();
        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn test_mailbox_shutdown_beats_pending_goal() {
        let mailbox = PlannerMailbox::new();
        mailbox.submit_goal(WorldOrd::new(1.0, 1.0));
        mailbox.request_shutdown();
        assert_eq!(mailbox.wait_for_goal(), None);
    }
}
