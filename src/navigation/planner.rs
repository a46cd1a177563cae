// src/navigation/planner.rs
// Stage machine of the global planner. One stage's work per planning tick:
// ComputeFrontiers -> ComputeGoalAndPath -> ExecutePath -> ComputeFrontiers,
// plus a replan request that resets to ComputeFrontiers from anywhere.

use log::{debug, info};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::{FloatingPoint, Point, WayPoint};

/// Stages of global planning
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Detect and filter frontier candidates
    ComputeFrontiers,
    /// Find a reachable goal near a frontier and a path to it
    ComputeGoalAndPath,
    /// Hand the path to execution one way-point at a time
    ExecutePath,
}

/// Result of one planning iteration
#[derive(Clone, Debug, PartialEq)]
pub enum PlanningStatus {
    /// Frontier candidates survived filtering
    FrontiersFound(usize),
    /// No frontier worth a goal search
    NoFrontiers,
    /// A reachable goal was selected
    GoalSelected {
        /// Goal position
        goal: Point,
        /// Length of the path to it
        path_distance: FloatingPoint,
    },
    /// No frontier could be reached within the search budget
    NoReachableFrontier,
    /// The next way-point was handed to execution
    WayPointIssued(WayPoint),
    /// The current way-point is still being tracked
    Executing,
    /// An upcoming way-point is no longer safe
    PathInvalidated,
    /// All way-points were executed
    ExecutionFinished,
}

/// Capability interface of a global planning strategy.
///
/// [`GlobalPlanner`] decides which stage runs; implementations only do the
/// work of the stage they are asked for.
pub trait StagedPlanner {
    /// Stage 1: compute frontier candidates
    fn compute_frontiers(&mut self) -> PlanningStatus;

    /// Stage 2: select a goal and a path to it
    fn compute_goal_and_path(&mut self) -> PlanningStatus;

    /// Stage 3: verify and execute the stored path
    fn execute_path(&mut self) -> PlanningStatus;

    /// Drop every goal, path and frontier of the current cycle
    fn reset(&mut self);
}

/// Stage reached after `stage` reported `status`
pub fn next_stage(stage: Stage, status: &PlanningStatus) -> Stage {
    match (stage, status) {
        (Stage::ComputeFrontiers, PlanningStatus::FrontiersFound(n)) if *n > 0 => {
            Stage::ComputeGoalAndPath
        }
        (Stage::ComputeFrontiers, _) => Stage::ComputeFrontiers,
        (Stage::ComputeGoalAndPath, PlanningStatus::GoalSelected { .. }) => Stage::ExecutePath,
        (Stage::ComputeGoalAndPath, _) => Stage::ComputeFrontiers,
        (Stage::ExecutePath, PlanningStatus::WayPointIssued(_) | PlanningStatus::Executing) => {
            Stage::ExecutePath
        }
        (Stage::ExecutePath, _) => Stage::ComputeFrontiers,
    }
}

/// Handle for requesting a full replan, usable from other threads
#[derive(Clone, Debug, Default)]
pub struct ReplanHandle {
    requested: Arc<AtomicBool>,
}

impl ReplanHandle {
    /// Ask the planner to drop its goal and start over on its next tick
    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

/// Global planner driving a [`StagedPlanner`] through its stages
pub struct GlobalPlanner<P: StagedPlanner> {
    planner: P,
    stage: Stage,
    replan: ReplanHandle,
    iterations: u64,
}

impl<P: StagedPlanner> GlobalPlanner<P> {
    /// Start in [`Stage::ComputeFrontiers`]
    pub fn new(planner: P) -> Self {
        GlobalPlanner {
            planner,
            stage: Stage::ComputeFrontiers,
            replan: ReplanHandle::default(),
            iterations: 0,
        }
    }

    /// Run one planning iteration (one stage's work).
    pub fn execute_planning_iteration(&mut self) -> PlanningStatus {
        if self.replan.take() {
            info!("Replan requested in stage {:?}, resetting planner.", self.stage);
            self.planner.reset();
            self.stage = Stage::ComputeFrontiers;
        }

        let status = match self.stage {
            Stage::ComputeFrontiers => self.planner.compute_frontiers(),
            Stage::ComputeGoalAndPath => self.planner.compute_goal_and_path(),
            Stage::ExecutePath => self.planner.execute_path(),
        };

        let next = next_stage(self.stage, &status);
        if next != self.stage {
            debug!("Stage {:?} -> {:?} ({:?})", self.stage, next, status);
        }
        self.stage = next;
        self.iterations += 1;
        status
    }

    /// Request a full replan; honoured at the start of the next iteration
    pub fn request_replan(&self) {
        self.replan.request();
    }

    /// Handle for requesting replans from elsewhere
    pub fn replan_handle(&self) -> ReplanHandle {
        self.replan.clone()
    }

    /// Currently active stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Planning iterations run so far
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// The planning strategy
    pub fn planner(&self) -> &P {
        &self.planner
    }

    /// Mutable access to the planning strategy (e.g. for submap ingestion)
    pub fn planner_mut(&mut self) -> &mut P {
        &mut self.planner
    }
}
