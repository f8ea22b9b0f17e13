//! Output sink thread.
//!
//! Drains the planner's two output channels: waypoint paths are logged, the
//! roadmap overlay is written to the configured image path after every build.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::shared::messages::{OverlayMsg, PathMsg};
use crate::shared::PlannerMailbox;

/// How long to block on the overlay channel before re-checking shutdown.
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Output sink state and logic.
pub struct OutputThread {
    mailbox: Arc<PlannerMailbox>,
    path_rx: Receiver<PathMsg>,
    overlay_rx: Receiver<OverlayMsg>,
    overlay_path: PathBuf,
}

impl OutputThread {
    pub fn new(
        mailbox: Arc<PlannerMailbox>,
        path_rx: Receiver<PathMsg>,
        overlay_rx: Receiver<OverlayMsg>,
        overlay_path: PathBuf,
    ) -> Self {
        Self {
            mailbox,
            path_rx,
            overlay_rx,
            overlay_path,
        }
    }

    /// Run the sink loop until shutdown or the planner hangs up.
    pub fn run(&mut self) {
        info!("output thread started");

        loop {
            match self.overlay_rx.recv_timeout(DRAIN_INTERVAL) {
                Ok(msg) => self.save_overlay(msg),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            loop {
                match self.path_rx.try_recv() {
                    Ok(msg) => Self::log_path(&msg),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            if self.mailbox.is_shutdown() {
                break;
            }
        }

        // Flush anything the planner sent on its way out.
        while let Ok(msg) = self.overlay_rx.try_recv() {
            self.save_overlay(msg);
        }
        while let Ok(msg) = self.path_rx.try_recv() {
            Self::log_path(&msg);
        }

        info!("output thread shutting down");
    }

    fn save_overlay(&self, msg: OverlayMsg) {
        if let Some(parent) = self.overlay_path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!("could not create output directory: {}", e);
                    return;
                }
            }
        }

        match msg.image.save(&self.overlay_path) {
            Ok(()) => debug!("overlay written to {:?}", self.overlay_path),
            Err(e) => warn!("could not write overlay: {}", e),
        }
    }

    fn log_path(msg: &PathMsg) {
        info!("path with {} waypoints:", msg.waypoints.len());
        for (i, w) in msg.waypoints.iter().enumerate() {
            info!("  {:>2}: ({:.1}, {:.1}, {:.1})", i, w.x, w.y, w.z);
        }
    }
}
