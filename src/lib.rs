//! Skeleton Explorer - frontier-driven global exploration planning
//!
//! This library provides the decision core of an exploration planner working on
//! a submap-based signed-distance field: gradient-ascent point correction that
//! keeps points in traversable space, and a staged global planner that picks
//! frontiers, finds reachable goals near them, plans through a navigation
//! skeleton and hands verified paths to execution.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod core;
pub mod navigation;
pub mod sim;

// Re-export commonly used items for easier access
pub use self::core::{
    DistanceFieldQuery, FloatingPoint, Point, SharedMap, SubmapStore, WayPoint,
    find_nearby_traversable_point, find_safest_nearby_point,
};
pub use navigation::{
    ExecutionInterface, FrontierEvaluator, GlobalPlanner, PlannerConfig, PlanningStatus,
    SkeletonPathSearch, SkeletonPlanner, Stage,
};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Top-level configuration of an exploration run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Global planner parameters
    pub planner: PlannerConfig,
    /// Run loop settings
    pub run: RunConfig,
}

/// Planning loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pause between planning iterations (ms)
    pub tick_interval_ms: u64,
    /// Stop after this many planning iterations
    pub max_iterations: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            tick_interval_ms: 50,
            max_iterations: 200,
        }
    }
}

impl ExplorerConfig {
    /// Load from a YAML file and validate the planner section
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ExplorerError> {
        let config: ExplorerConfig = navigation::config::read_yaml_file(path.as_ref())?;
        config.planner.validate()?;
        log::info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }
}

/// Skeleton Explorer error types
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] navigation::ConfigError),
}
