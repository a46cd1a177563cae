// src/navigation/config.rs
// Tunables of the skeleton exploration planner, loaded from YAML and validated once.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::FloatingPoint;

/// Planner configuration. Immutable once the planner is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// 0 silences per-frontier reporting, higher values log more
    pub verbosity: u8,
    /// Merge frontiers whose centroids are close together
    pub use_centroid_clustering: bool,
    /// Merge radius for centroid clustering (m)
    pub centroid_clustering_radius: FloatingPoint,
    /// Re-check upcoming way-points against the latest map before issuing them
    pub use_path_verification: bool,
    /// Clearance required of upcoming way-points (m)
    pub path_verification_min_distance: FloatingPoint,
    /// Grid elements per side of the goal search cube
    pub goal_search_steps: usize,
    /// Grid element length of the goal search cube (m)
    pub goal_search_step_size: FloatingPoint,
    /// Frontiers with fewer points are not worth a path search
    pub min_num_visible_frontier_points: usize,
    /// Robot body radius used for goal traversability (m)
    pub traversability_radius: FloatingPoint,
    /// Extra clearance demanded of goals on top of the body radius (m)
    pub safety_distance: FloatingPoint,
    /// Move the selected goal to the locally safest point before executing
    pub use_goal_refinement: bool,
    /// Time budget for trying frontiers in one goal search (s)
    pub max_goal_search_time_sec: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            verbosity: 1,
            use_centroid_clustering: false,
            centroid_clustering_radius: 1.0,
            use_path_verification: true,
            path_verification_min_distance: 1.0,
            goal_search_steps: 5,
            goal_search_step_size: 1.0,
            min_num_visible_frontier_points: 10,
            traversability_radius: 0.3,
            safety_distance: 0.0,
            use_goal_refinement: true,
            max_goal_search_time_sec: 25.0,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter is outside its valid range
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// Config file could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("expected > 0, got {}", value),
        })
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("expected >= 0, got {}", value),
        })
    }
}

impl PlannerConfig {
    /// Check every parameter range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.use_centroid_clustering {
            check_positive(
                "centroid_clustering_radius",
                self.centroid_clustering_radius.into(),
            )?;
        }
        check_non_negative(
            "path_verification_min_distance",
            self.path_verification_min_distance.into(),
        )?;
        if self.goal_search_steps == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "goal_search_steps",
                reason: "expected at least 1".to_string(),
            });
        }
        check_positive("goal_search_step_size", self.goal_search_step_size.into())?;
        check_non_negative("traversability_radius", self.traversability_radius.into())?;
        check_non_negative("safety_distance", self.safety_distance.into())?;
        check_non_negative("max_goal_search_time_sec", self.max_goal_search_time_sec)?;
        if Duration::try_from_secs_f64(self.max_goal_search_time_sec).is_err() {
            return Err(ConfigError::InvalidParameter {
                name: "max_goal_search_time_sec",
                reason: format!(
                    "{} s is not a representable duration",
                    self.max_goal_search_time_sec
                ),
            });
        }
        Ok(())
    }

    /// Clearance a goal point must have
    pub fn goal_clearance(&self) -> FloatingPoint {
        self.traversability_radius + self.safety_distance
    }

    /// Goal search time budget. Saturates for budgets `validate` would reject.
    pub fn max_goal_search_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_goal_search_time_sec).unwrap_or(Duration::MAX)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: PlannerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: PlannerConfig = read_yaml_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }
}

/// Deserialize a YAML file; shared by every config loader of the crate.
pub(crate) fn read_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let file = File::open(path)?;
    Ok(serde_yaml::from_reader(file)?)
}
