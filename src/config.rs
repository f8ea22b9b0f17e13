//! Configuration loading for MargaNav

use crate::error::Result;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
pub struct MargaConfig {
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Planner parameters
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    /// Side length of the square map in meters (default: 20.0)
    #[serde(default = "default_map_size")]
    pub map_size: f64,

    /// Map resolution in meters per cell (default: 0.1)
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    /// Robot diameter for C-space dilation in meters (default: 0.2)
    #[serde(default = "default_robot_diameter")]
    pub robot_diameter: f64,

    /// Maximum neighbours a roadmap node can have (default: 5)
    #[serde(default = "default_density")]
    pub density: usize,

    /// Maximum edge length in meters (default: 2.5)
    #[serde(default = "default_max_edge_len")]
    pub max_edge_len: f64,

    /// Samples drawn per build before giving up (default: 1000)
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Total build attempts per goal when a build returns empty (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Minimum spacing between accepted samples in meters (default: 0.3)
    #[serde(default = "default_dispersion_radius")]
    pub dispersion_radius: f64,

    /// Seed for the sampler; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

/// World feed settings for the simulation shell
#[derive(Clone, Debug, Deserialize)]
pub struct WorldConfig {
    /// Grayscale map image (PGM/PNG); a synthetic free map when absent
    #[serde(default)]
    pub map_image: Option<String>,

    /// Robot start position in world coordinates
    #[serde(default)]
    pub start_x: f64,
    #[serde(default)]
    pub start_y: f64,
    #[serde(default)]
    pub start_z: f64,

    /// Interval between published world frames in milliseconds (default: 500)
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
}

/// Output configuration
#[derive(Clone, Debug, Deserialize)]
pub struct OutputConfig {
    /// Path the roadmap overlay image is written to after each build
    #[serde(default = "default_overlay_path")]
    pub overlay_path: String,
}

// Default value functions
fn default_map_size() -> f64 {
    20.0
}
fn default_resolution() -> f64 {
    0.1
}
fn default_robot_diameter() -> f64 {
    0.2
}
fn default_density() -> usize {
    5
}
fn default_max_edge_len() -> f64 {
    2.5
}
fn default_max_samples() -> usize {
    1000
}
fn default_max_retries() -> usize {
    3
}
fn default_dispersion_radius() -> f64 {
    0.3
}
fn default_frame_interval() -> u64 {
    500
}
fn default_overlay_path() -> String {
    "output/prm.png".to_string()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            map_size: default_map_size(),
            resolution: default_resolution(),
            robot_diameter: default_robot_diameter(),
            density: default_density(),
            max_edge_len: default_max_edge_len(),
            max_samples: default_max_samples(),
            max_retries: default_max_retries(),
            dispersion_radius: default_dispersion_radius(),
            seed: None,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            map_image: None,
            start_x: 0.0,
            start_y: 0.0,
            start_z: 0.0,
            frame_interval_ms: default_frame_interval(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            overlay_path: default_overlay_path(),
        }
    }
}

impl Default for MargaConfig {
    fn default() -> Self {
        Self {
            planner: PlannerConfig::default(),
            world: WorldConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl MargaConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MargaConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
