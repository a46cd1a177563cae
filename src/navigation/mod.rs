//! Global exploration planning for Skeleton Explorer
//!
//! This module turns map frontiers into executable paths: frontier candidates,
//! goal search around them, skeleton path requests, path verification and the
//! stage machine sequencing all of it.

pub mod config;
pub mod frontier;
pub mod goal_search;
pub mod planner;
pub mod skeleton_planner;
pub mod snapshot;

pub use config::{ConfigError, PlannerConfig};
pub use frontier::{FrontierEvaluator, FrontierSearchData, Reachability};
pub use goal_search::GoalSearchOffsets;
pub use planner::{GlobalPlanner, PlanningStatus, ReplanHandle, Stage, StagedPlanner};
pub use skeleton_planner::{ExecutionInterface, SkeletonPathSearch, SkeletonPlanner};
pub use snapshot::{PlannerSnapshot, SnapshotReader};
