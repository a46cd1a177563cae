// src/navigation/snapshot.rs
// Settled copies of planner state for visualization and monitoring. The planner
// replaces the published snapshot at the end of each stage; readers only ever
// see whole snapshots, never a cycle in progress.

use serde::Serialize;
use std::sync::{Arc, RwLock};

use super::frontier::FrontierSearchData;
use crate::core::WayPoint;

/// Planner state as of the end of a stage
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlannerSnapshot {
    /// Frontier computation count; changes whenever the frontiers do
    pub cycle: u64,
    /// Frontier candidates with their goal search results
    pub frontiers: Vec<FrontierSearchData>,
    /// Way-points not yet handed to execution
    pub way_points: Vec<WayPoint>,
    /// Way-point currently being executed
    pub active_target: Option<WayPoint>,
    /// The last path was executed to the end
    pub execution_finished: bool,
}

/// Shared slot holding the latest snapshot
#[derive(Clone, Debug, Default)]
pub struct SnapshotReader {
    latest: Arc<RwLock<Arc<PlannerSnapshot>>>,
}

impl SnapshotReader {
    /// Latest published snapshot
    pub fn latest(&self) -> Arc<PlannerSnapshot> {
        match self.latest.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub(crate) fn publish(&self, snapshot: PlannerSnapshot) {
        let snapshot = Arc::new(snapshot);
        match self.latest.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}
