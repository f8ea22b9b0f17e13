//! MargaNav - LD-PRM Global Path Planner
//!
//! A sampling-based motion planner for a mobile robot on a 2D occupancy
//! grid. Goal requests are answered with an ordered sequence of waypoints
//! from the robot's current pose to the goal, staying inside known free
//! space, or with an empty path when none was found.
//!
//! ## Multi-Threaded Architecture
//!
//! MargaNav uses four threads for concurrent operation:
//!
//! - **Grid feed / pose feed**: Publish world frames into a bounded shared
//!   buffer at a fixed cadence
//! - **Planner thread**: Waits on goal requests, snapshots the latest world
//!   frame, builds the low-dispersion probabilistic roadmap and searches it
//! - **Output thread**: Logs waypoint paths, writes the roadmap overlay
//!
//! Goals are read as `x y` lines on stdin; the loop stops on EOF or `quit`.

mod config;
mod error;
mod graph;
mod grid;
mod planning;
mod shared;
mod threads;
mod types;

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use config::MargaConfig;
use error::Result;
use shared::{PlannerMailbox, WorldBuffer};
use threads::spawn_threads;
use tracing::{info, warn};
use types::WorldOrd;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marga_nav=info".parse().unwrap()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let config = if args.len() > 1 {
        let config_path = Path::new(&args[1]);
        info!("Loading configuration from {:?}", config_path);
        MargaConfig::load(config_path)?
    } else if Path::new("marga.toml").exists() {
        info!("Loading configuration from marga.toml");
        MargaConfig::load(Path::new("marga.toml"))?
    } else {
        info!("Using default configuration");
        MargaConfig::default()
    };

    info!("MargaNav v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Map {}m at {}m/cell, robot diameter {}m, density {}, max edge {}m",
        config.planner.map_size,
        config.planner.resolution,
        config.planner.robot_diameter,
        config.planner.density,
        config.planner.max_edge_len
    );

    // Shared structures reachable from the goal intake and all threads
    let buffer = Arc::new(WorldBuffer::new());
    let mailbox = Arc::new(PlannerMailbox::new());

    let handles = spawn_threads(&config, Arc::clone(&buffer), Arc::clone(&mailbox))?;

    // Main thread: goal service. Every parseable request is acknowledged;
    // an unreachable goal surfaces in the planner log, not here.
    info!("Enter goal requests as `x y` lines; `quit` or EOF stops the planner");

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("stdin closed: {}", e);
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" {
            break;
        }

        match parse_goal(trimmed) {
            Some(goal) => {
                info!("goal request: x={:.1}, y={:.1}", goal.x, goal.y);
                mailbox.submit_goal(goal);
            }
            None => warn!("could not parse goal from {:?}", trimmed),
        }
    }

    // Signal shutdown to all threads and wait for them
    info!("Waiting for threads to finish...");
    mailbox.request_shutdown();
    handles.join_all();

    info!("MargaNav finished");
    Ok(())
}

/// Parse a goal request of the form `x y`.
fn parse_goal(line: &str) -> Option<WorldOrd> {
    let mut parts = line.split_whitespace();
    let x: f64 = parts.next()?.parse().ok()?;
    let y: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(WorldOrd::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_goal() {
        assert_eq!(parse_goal("1.5 -2.0"), Some(WorldOrd::new(1.5, -2.0)));
        assert_eq!(parse_goal("3 4"), Some(WorldOrd::new(3.0, 4.0)));
        assert_eq!(parse_goal("1.0"), None);
        assert_eq!(parse_goal("1.0 2.0 3.0"), None);
        assert_eq!(parse_goal("a b"), None);
    }
}
