//! Skeleton-based global planning strategy
//!
//! Finds paths to frontiers through a precomputed navigation skeleton. Goals
//! near frontier centroids are resolved with point correction and the goal
//! search cube, and paths are re-verified against the latest map while they
//! are executed.

use log::{debug, info, warn};
use std::collections::VecDeque;
use std::time::Instant;

use super::config::{ConfigError, PlannerConfig};
use super::frontier::{FrontierEvaluator, FrontierSearchData, Reachability, build_candidates};
use super::goal_search::GoalSearchOffsets;
use super::planner::{PlanningStatus, StagedPlanner};
use super::snapshot::{PlannerSnapshot, SnapshotReader};
use crate::core::{
    DistanceFieldQuery, FloatingPoint, Point, WayPoint, find_nearby_traversable_point,
    find_safest_nearby_point, path_length,
};

/// Path search through the navigation skeleton
#[cfg_attr(test, mockall::automock(type Submap = u32;))]
pub trait SkeletonPathSearch {
    /// Submap payload the skeleton is built from
    type Submap;

    /// Extend the skeleton with a new submap
    fn add_submap(&mut self, submap: Self::Submap, traversability_radius: FloatingPoint);

    /// Way-points from `start` to `goal`, or `None` if they are not connected
    fn plan(&self, start: &Point, goal: &Point) -> Option<Vec<WayPoint>>;
}

/// Execution side of the robot (local planner / controller)
#[cfg_attr(test, mockall::automock)]
pub trait ExecutionInterface {
    /// Current robot position in the mission frame
    fn current_position(&self) -> Point;

    /// Hand a way-point to execution
    fn request_way_point(&mut self, way_point: &WayPoint);

    /// Whether the last requested way-point has been reached
    fn target_reached(&self) -> bool;
}

/// Global planning strategy using the skeleton path search
pub struct SkeletonPlanner<M, F, S, E> {
    config: PlannerConfig,
    map: M,
    frontier_evaluator: F,
    skeleton: S,
    execution: E,

    // Cube of side goal_search_step_size * goal_search_steps, nearest first.
    goal_search_offsets: GoalSearchOffsets,

    frontier_data: Vec<FrontierSearchData>,
    way_points: VecDeque<WayPoint>,
    active_target: Option<WayPoint>,
    execution_finished: bool,
    cycle: u64,
    snapshot: SnapshotReader,
}

impl<M, F, S, E> SkeletonPlanner<M, F, S, E>
where
    M: DistanceFieldQuery,
    F: FrontierEvaluator,
    S: SkeletonPathSearch,
    E: ExecutionInterface,
{
    /// Validate the config and precompute the goal search cube
    pub fn new(
        config: PlannerConfig,
        map: M,
        frontier_evaluator: F,
        skeleton: S,
        execution: E,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let goal_search_offsets =
            GoalSearchOffsets::new(config.goal_search_steps, config.goal_search_step_size);

        Ok(SkeletonPlanner {
            config,
            map,
            frontier_evaluator,
            skeleton,
            execution,
            goal_search_offsets,
            frontier_data: Vec::new(),
            way_points: VecDeque::new(),
            active_target: None,
            execution_finished: false,
            cycle: 0,
            snapshot: SnapshotReader::default(),
        })
    }

    /// Forward a new submap to the skeleton
    pub fn add_submap(&mut self, submap: S::Submap, traversability_radius: FloatingPoint) {
        self.skeleton.add_submap(submap, traversability_radius);
    }

    /// Reader for the published snapshots
    pub fn snapshot_reader(&self) -> SnapshotReader {
        self.snapshot.clone()
    }

    /// Frontier candidates of the current cycle
    pub fn frontier_search_data(&self) -> &[FrontierSearchData] {
        &self.frontier_data
    }

    /// Way-points not yet handed to execution
    pub fn way_points(&self) -> &VecDeque<WayPoint> {
        &self.way_points
    }

    /// Planner configuration
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Execution interface
    pub fn execution(&self) -> &E {
        &self.execution
    }

    /// Goal near a frontier centroid that is traversable at the goal clearance.
    ///
    /// Tries the centroid, then a gradient-corrected centroid that stays inside
    /// the search cube, then the cube offsets nearest first.
    pub fn find_goal_near(&self, centroid: &Point) -> Option<Point> {
        let clearance = self.config.goal_clearance();
        match find_nearby_traversable_point(&self.map, clearance, *centroid) {
            Ok(corrected) if self.goal_search_offsets.contains(centroid, &corrected.position) => {
                return Some(corrected.position);
            }
            Ok(corrected) => debug!(
                "Corrected goal {:?} left the search cube around {:?}.",
                corrected.position.as_slice(),
                centroid.as_slice()
            ),
            Err(failure) => debug!("Goal correction failed: {}", failure),
        }
        self.goal_search_offsets
            .find_traversable(&self.map, centroid, clearance)
    }

    /// Check that every upcoming way-point is still traversable.
    ///
    /// The way-point handed to execution counts as upcoming until the robot
    /// reports it reached.
    pub fn verify_next_way_points(&self) -> bool {
        self.verify_path(self.target_outstanding())
    }

    fn target_outstanding(&self) -> bool {
        self.active_target.is_some() && !self.execution.target_reached()
    }

    fn verify_path(&self, target_outstanding: bool) -> bool {
        let min_distance = self.config.path_verification_min_distance;
        let in_flight = self.active_target.iter().filter(|_| target_outstanding);
        match in_flight
            .chain(self.way_points.iter())
            .find(|wp| !self.map.is_traversable_in_active_submap(&wp.position, min_distance))
        {
            Some(way_point) => {
                warn!(
                    "Way-point at {:?} is no longer traversable.",
                    way_point.position.as_slice()
                );
                false
            }
            None => true,
        }
    }

    fn plan_to(&self, start: &Point, goal: &Point) -> Option<Vec<WayPoint>> {
        self.skeleton
            .plan(start, goal)
            .filter(|way_points| !way_points.is_empty())
    }

    // Move the selected goal to the locally safest point; keep the original
    // if the refined goal cannot be reached.
    fn refine_goal(&self, start: &Point, goal: Point) -> Option<(Point, Vec<WayPoint>)> {
        let safe = find_safest_nearby_point(&self.map, self.config.goal_clearance(), goal).ok()?;
        if safe.position == goal {
            return None;
        }
        let way_points = self.plan_to(start, &safe.position)?;
        Some((safe.position, way_points))
    }

    fn clear_path(&mut self) {
        self.way_points.clear();
        self.active_target = None;
    }

    fn publish(&self) {
        self.snapshot.publish(PlannerSnapshot {
            cycle: self.cycle,
            frontiers: self.frontier_data.clone(),
            way_points: self.way_points.iter().copied().collect(),
            active_target: self.active_target,
            execution_finished: self.execution_finished,
        });
    }

    fn execute_way_point(&mut self, target_outstanding: bool) -> PlanningStatus {
        if target_outstanding {
            return PlanningStatus::Executing;
        }

        match self.way_points.pop_front() {
            Some(way_point) => {
                self.execution.request_way_point(&way_point);
                self.active_target = Some(way_point);
                if self.config.verbosity >= 2 {
                    debug!(
                        "Issued way-point {:?}, {} remaining.",
                        way_point.position.as_slice(),
                        self.way_points.len()
                    );
                }
                self.publish();
                PlanningStatus::WayPointIssued(way_point)
            }
            None => {
                self.active_target = None;
                self.execution_finished = true;
                info!("Finished executing global path.");
                self.publish();
                PlanningStatus::ExecutionFinished
            }
        }
    }
}

impl<M, F, S, E> StagedPlanner for SkeletonPlanner<M, F, S, E>
where
    M: DistanceFieldQuery,
    F: FrontierEvaluator,
    S: SkeletonPathSearch,
    E: ExecutionInterface,
{
    fn compute_frontiers(&mut self) -> PlanningStatus {
        self.clear_path();
        let robot_position = self.execution.current_position();

        let raw_frontiers = self.frontier_evaluator.evaluate();
        let num_raw = raw_frontiers.len();
        let clustering_radius = self
            .config
            .use_centroid_clustering
            .then_some(self.config.centroid_clustering_radius);
        self.frontier_data = build_candidates(
            raw_frontiers,
            &robot_position,
            clustering_radius,
            self.config.min_num_visible_frontier_points,
        );
        self.cycle += 1;

        if self.config.verbosity >= 1 {
            info!(
                "Found {} frontiers, {} candidates after clustering and filtering.",
                num_raw,
                self.frontier_data.len()
            );
        }
        self.publish();

        if self.frontier_data.is_empty() {
            PlanningStatus::NoFrontiers
        } else {
            PlanningStatus::FrontiersFound(self.frontier_data.len())
        }
    }

    fn compute_goal_and_path(&mut self) -> PlanningStatus {
        let start_time = Instant::now();
        let time_budget = self.config.max_goal_search_time();
        let robot_position = self.execution.current_position();

        // (frontier index, goal) of the best reachable frontier so far.
        let mut best: Option<(usize, Point)> = None;
        let mut best_path_distance = FloatingPoint::INFINITY;

        for idx in 0..self.frontier_data.len() {
            if start_time.elapsed() >= time_budget {
                warn!(
                    "Goal search time budget of {:.1}s used up after {} of {} frontiers.",
                    time_budget.as_secs_f64(),
                    idx,
                    self.frontier_data.len()
                );
                break;
            }
            let centroid = self.frontier_data[idx].centroid;
            let Some(goal) = self.find_goal_near(&centroid) else {
                self.frontier_data[idx].reachability = Reachability::InvalidGoal;
                if self.config.verbosity >= 2 {
                    debug!("No traversable goal near frontier at {:?}.", centroid.as_slice());
                }
                continue;
            };

            // A path to the goal is never shorter than the straight line to it.
            // The goal may lie anywhere in the search cube, so only this
            // frontier can be skipped.
            if (goal - robot_position).norm() > best_path_distance {
                if self.config.verbosity >= 2 {
                    debug!(
                        "Skipping frontier at {:?}, its goal is farther than the best path.",
                        centroid.as_slice()
                    );
                }
                continue;
            }

            let Some(way_points) = self.plan_to(&robot_position, &goal) else {
                self.frontier_data[idx].reachability = Reachability::Unreachable;
                if self.config.verbosity >= 2 {
                    debug!("Frontier at {:?} is unreachable.", centroid.as_slice());
                }
                continue;
            };

            let path_distance = path_length(&robot_position, &way_points);
            let better = match best {
                None => true,
                Some((best_idx, _)) => {
                    path_distance < best_path_distance
                        || (path_distance == best_path_distance
                            && self.frontier_data[idx].euclidean_distance
                                < self.frontier_data[best_idx].euclidean_distance)
                }
            };

            let frontier = &mut self.frontier_data[idx];
            frontier.reachability = Reachability::Reachable;
            frontier.path_distance = path_distance;
            frontier.way_points = way_points;
            if better {
                best = Some((idx, goal));
                best_path_distance = path_distance;
            }
        }

        let Some((idx, mut goal)) = best else {
            info!("No reachable frontier found.");
            self.publish();
            return PlanningStatus::NoReachableFrontier;
        };

        if self.config.use_goal_refinement {
            if let Some((refined_goal, way_points)) = self.refine_goal(&robot_position, goal) {
                let frontier = &mut self.frontier_data[idx];
                frontier.path_distance = path_length(&robot_position, &way_points);
                frontier.way_points = way_points;
                goal = refined_goal;
            }
        }

        let frontier = &self.frontier_data[idx];
        let path_distance = frontier.path_distance;
        self.way_points = frontier.way_points.iter().copied().collect();
        self.active_target = None;
        self.execution_finished = false;
        info!(
            "Selected goal {:?} for frontier at {:?}, path distance {:.2}m ({} way-points).",
            goal.as_slice(),
            frontier.centroid.as_slice(),
            path_distance,
            self.way_points.len()
        );
        self.publish();

        PlanningStatus::GoalSelected {
            goal,
            path_distance,
        }
    }

    fn execute_path(&mut self) -> PlanningStatus {
        let target_outstanding = self.target_outstanding();
        if self.config.use_path_verification && !self.verify_path(target_outstanding) {
            warn!(
                "Path verification failed, discarding {} way-points and replanning.",
                self.way_points.len()
            );
            self.clear_path();
            self.publish();
            return PlanningStatus::PathInvalidated;
        }
        self.execute_way_point(target_outstanding)
    }

    fn reset(&mut self) {
        self.frontier_data.clear();
        self.clear_path();
        self.execution_finished = false;
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::map::MockDistanceFieldQuery;
    use crate::navigation::frontier::MockFrontierEvaluator;
    use crate::navigation::planner::{GlobalPlanner, Stage};
    use approx::assert_relative_eq;
    use mockall::predicate::eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    type TestPlanner = SkeletonPlanner<
        MockDistanceFieldQuery,
        MockFrontierEvaluator,
        MockSkeletonPathSearch,
        MockExecutionInterface,
    >;

    fn blob(center: Point, count: usize) -> Vec<Point> {
        (0..count)
            .map(|i| center + Point::new(0.0, 0.0, i as FloatingPoint * 0.01))
            .collect()
    }

    fn free_map() -> MockDistanceFieldQuery {
        let mut map = MockDistanceFieldQuery::new();
        map.expect_voxel_size().return_const(0.1);
        map.expect_is_traversable_in_active_submap()
            .return_const(true);
        map.expect_distance_and_gradient_in_active_submap()
            .returning(|_| Some((2.0, Point::zeros())));
        map
    }

    fn robot_at_origin() -> MockExecutionInterface {
        let mut execution = MockExecutionInterface::new();
        execution.expect_current_position().return_const(Point::zeros());
        execution
    }

    fn config() -> PlannerConfig {
        PlannerConfig {
            min_num_visible_frontier_points: 3,
            use_goal_refinement: false,
            ..PlannerConfig::default()
        }
    }

    // Straight path: one intermediate way-point offset sideways by `detour`.
    fn detour_path(goal: &Point, detour: FloatingPoint) -> Vec<WayPoint> {
        vec![
            WayPoint::new(goal / 2.0 + Point::new(0.0, detour, 0.0)),
            WayPoint::new(*goal),
        ]
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PlannerConfig {
            goal_search_steps: 0,
            ..PlannerConfig::default()
        };
        let planner: Result<TestPlanner, _> = SkeletonPlanner::new(
            config,
            free_map(),
            MockFrontierEvaluator::new(),
            MockSkeletonPathSearch::new(),
            robot_at_origin(),
        );
        assert!(planner.is_err());
    }

    #[test]
    fn test_small_frontiers_never_reach_goal_search() {
        let mut frontiers = MockFrontierEvaluator::new();
        frontiers.expect_evaluate().returning(|| {
            vec![
                blob(Point::new(2.0, 0.0, 0.0), 2),
                blob(Point::new(4.0, 0.0, 0.0), 1),
            ]
        });
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton.expect_plan().never();

        let planner =
            SkeletonPlanner::new(config(), free_map(), frontiers, skeleton, robot_at_origin())
                .unwrap();
        let mut global = GlobalPlanner::new(planner);

        assert_eq!(global.execute_planning_iteration(), PlanningStatus::NoFrontiers);
        assert_eq!(global.stage(), Stage::ComputeFrontiers);
        assert!(global.planner().frontier_search_data().is_empty());
    }

    #[test]
    fn test_shortest_path_wins_over_closest_frontier() {
        let near = Point::new(3.0, 0.0, 0.0);
        let far = Point::new(0.0, 3.2, 0.0);

        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(move || vec![blob(near, 3), blob(far, 3)]);

        // The nearer frontier needs a long detour (path length 5.0), the
        // farther one is straight (3.2).
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton.expect_plan().returning(|_, goal| {
            if goal.x > 1.0 {
                Some(detour_path(goal, 2.0))
            } else {
                Some(vec![WayPoint::new(*goal)])
            }
        });

        let planner =
            SkeletonPlanner::new(config(), free_map(), frontiers, skeleton, robot_at_origin())
                .unwrap();
        let mut global = GlobalPlanner::new(planner);
        assert_eq!(global.execute_planning_iteration(), PlanningStatus::FrontiersFound(2));

        match global.execute_planning_iteration() {
            PlanningStatus::GoalSelected {
                goal,
                path_distance,
            } => {
                assert_relative_eq!(path_distance, 3.2, epsilon = 0.05);
                assert_relative_eq!(goal.y, 3.2, epsilon = 0.05);
            }
            other => panic!("expected a goal, got {:?}", other),
        }
        assert_eq!(global.stage(), Stage::ExecutePath);

        let data = global.planner().frontier_search_data();
        assert!(data.iter().all(|f| f.reachability == Reachability::Reachable));
        assert_relative_eq!(data[0].path_distance, 5.0, epsilon = 0.05);
    }

    #[test]
    fn test_goal_from_search_cube_can_beat_nearer_centroid() {
        let open = Point::new(3.0, 0.0, 0.0);
        let blocked = Point::new(0.0, 3.4, 0.0);

        // Occupied from y = 3 on; the cube finds a goal one step below the
        // blocked centroid, closer to the robot than the open frontier.
        let mut map = MockDistanceFieldQuery::new();
        map.expect_voxel_size().return_const(0.1);
        map.expect_is_traversable_in_active_submap()
            .returning(|p, _| p.y < 3.0);
        map.expect_distance_and_gradient_in_active_submap()
            .returning(|_| None);

        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(move || vec![vec![open; 3], vec![blocked; 3]]);
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton
            .expect_plan()
            .returning(|_, goal| Some(vec![WayPoint::new(*goal)]));

        let planner =
            SkeletonPlanner::new(config(), map, frontiers, skeleton, robot_at_origin()).unwrap();
        let mut global = GlobalPlanner::new(planner);
        global.execute_planning_iteration();

        match global.execute_planning_iteration() {
            PlanningStatus::GoalSelected {
                goal,
                path_distance,
            } => {
                assert_relative_eq!(goal, Point::new(0.0, 2.4, 0.0), epsilon = 1.0e-5);
                assert_relative_eq!(path_distance, 2.4, epsilon = 1.0e-5);
            }
            other => panic!("expected a goal, got {:?}", other),
        }
        let data = global.planner().frontier_search_data();
        assert!(data.iter().all(|f| f.reachability == Reachability::Reachable));
    }

    #[test]
    fn test_goals_beyond_best_path_are_not_planned() {
        let near = Point::new(2.0, 0.0, 0.0);
        let far = Point::new(6.0, 0.0, 0.0);

        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(move || vec![vec![far; 3], vec![near; 3]]);
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton
            .expect_plan()
            .withf(|_, goal| goal.x < 3.0)
            .times(1)
            .returning(|_, goal| Some(vec![WayPoint::new(*goal)]));

        let planner =
            SkeletonPlanner::new(config(), free_map(), frontiers, skeleton, robot_at_origin())
                .unwrap();
        let mut global = GlobalPlanner::new(planner);
        global.execute_planning_iteration();

        match global.execute_planning_iteration() {
            PlanningStatus::GoalSelected { goal, .. } => assert_relative_eq!(goal, near),
            other => panic!("expected a goal, got {:?}", other),
        }
        // Sorted nearest first
        let data = global.planner().frontier_search_data();
        assert_relative_eq!(data[0].centroid, near);
        assert_eq!(data[0].reachability, Reachability::Reachable);
        assert_eq!(data[1].reachability, Reachability::Unchecked);
    }

    #[test]
    fn test_unreachable_and_invalid_goals_are_tagged() {
        let blocked = Point::new(2.0, 0.0, 0.0);
        let disconnected = Point::new(-4.0, 0.0, 0.0);

        let mut map = MockDistanceFieldQuery::new();
        map.expect_voxel_size().return_const(0.1);
        // Everything around the first frontier is occupied, lookups fail there.
        map.expect_is_traversable_in_active_submap()
            .returning(|p, _| p.x < 0.0);
        map.expect_distance_and_gradient_in_active_submap()
            .returning(|_| None);

        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(move || vec![blob(blocked, 3), blob(disconnected, 3)]);
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton.expect_plan().returning(|_, _| None);

        let planner =
            SkeletonPlanner::new(config(), map, frontiers, skeleton, robot_at_origin()).unwrap();
        let mut global = GlobalPlanner::new(planner);
        global.execute_planning_iteration();

        assert_eq!(
            global.execute_planning_iteration(),
            PlanningStatus::NoReachableFrontier
        );
        assert_eq!(global.stage(), Stage::ComputeFrontiers);
        let data = global.planner().frontier_search_data();
        assert_eq!(data[0].reachability, Reachability::InvalidGoal);
        assert_eq!(data[1].reachability, Reachability::Unreachable);
    }

    #[test]
    fn test_intraversable_centroid_uses_search_cube() {
        let mut map = MockDistanceFieldQuery::new();
        map.expect_voxel_size().return_const(0.1);
        // Free only above z = 1.5; no gradient information available.
        map.expect_is_traversable_in_active_submap()
            .returning(|p, _| p.z >= 1.5);
        map.expect_distance_and_gradient_in_active_submap()
            .returning(|_| None);

        let execution = robot_at_origin();
        let planner = SkeletonPlanner::new(
            config(),
            map,
            MockFrontierEvaluator::new(),
            MockSkeletonPathSearch::new(),
            execution,
        )
        .unwrap();

        let goal = planner.find_goal_near(&Point::new(4.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(goal, Point::new(4.0, 0.0, 2.0));
    }

    #[test]
    fn test_exhausted_time_budget_reports_no_reachable_frontier() {
        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(|| vec![blob(Point::new(2.0, 0.0, 0.0), 3)]);
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton.expect_plan().never();

        let config = PlannerConfig {
            max_goal_search_time_sec: 0.0,
            ..config()
        };
        let planner =
            SkeletonPlanner::new(config, free_map(), frontiers, skeleton, robot_at_origin())
                .unwrap();
        let mut global = GlobalPlanner::new(planner);
        global.execute_planning_iteration();

        assert_eq!(
            global.execute_planning_iteration(),
            PlanningStatus::NoReachableFrontier
        );
        assert_eq!(
            global.planner().frontier_search_data()[0].reachability,
            Reachability::Unchecked
        );
    }

    #[test]
    fn test_intraversable_way_point_forces_replan() {
        let goal = Point::new(3.0, 0.0, 0.0);
        let blocked = Arc::new(AtomicBool::new(false));

        let mut map = MockDistanceFieldQuery::new();
        map.expect_voxel_size().return_const(0.1);
        let blocked_in_map = Arc::clone(&blocked);
        map.expect_is_traversable_in_active_submap()
            .returning(move |p, _| !(blocked_in_map.load(Ordering::SeqCst) && p.x > 2.5));
        map.expect_distance_and_gradient_in_active_submap()
            .returning(|_| Some((2.0, Point::zeros())));

        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(move || vec![blob(goal, 3)]);
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton.expect_plan().returning(|_, goal| {
            Some(vec![
                WayPoint::new(goal / 3.0),
                WayPoint::new(goal * 2.0 / 3.0),
                WayPoint::new(*goal),
            ])
        });

        let mut execution = robot_at_origin();
        execution.expect_target_reached().return_const(true);
        execution
            .expect_request_way_point()
            .times(1)
            .return_const(());

        let planner = SkeletonPlanner::new(config(), map, frontiers, skeleton, execution).unwrap();
        let reader = planner.snapshot_reader();
        let mut global = GlobalPlanner::new(planner);

        global.execute_planning_iteration();
        global.execute_planning_iteration();
        assert!(matches!(
            global.execute_planning_iteration(),
            PlanningStatus::WayPointIssued(_)
        ));
        assert_eq!(reader.latest().way_points.len(), 2);

        blocked.store(true, Ordering::SeqCst);
        assert_eq!(
            global.execute_planning_iteration(),
            PlanningStatus::PathInvalidated
        );
        assert_eq!(global.stage(), Stage::ComputeFrontiers);
        assert!(global.planner().way_points().is_empty());
        assert!(reader.latest().way_points.is_empty());
        assert!(reader.latest().active_target.is_none());
    }

    #[test]
    fn test_blocked_way_point_in_flight_forces_replan() {
        let goal = Point::new(2.0, 0.0, 0.0);
        let blocked = Arc::new(AtomicBool::new(false));

        let mut map = MockDistanceFieldQuery::new();
        map.expect_voxel_size().return_const(0.1);
        let blocked_in_map = Arc::clone(&blocked);
        map.expect_is_traversable_in_active_submap()
            .returning(move |p, _| !(blocked_in_map.load(Ordering::SeqCst) && p.x < 1.5));
        map.expect_distance_and_gradient_in_active_submap()
            .returning(|_| Some((2.0, Point::zeros())));

        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(move || vec![vec![goal; 3]]);
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton
            .expect_plan()
            .returning(|_, goal| Some(vec![WayPoint::new(goal / 2.0), WayPoint::new(*goal)]));

        // The robot never reaches the first way-point.
        let mut execution = robot_at_origin();
        execution.expect_target_reached().return_const(false);
        execution
            .expect_request_way_point()
            .times(1)
            .return_const(());

        let planner = SkeletonPlanner::new(config(), map, frontiers, skeleton, execution).unwrap();
        let mut global = GlobalPlanner::new(planner);
        global.execute_planning_iteration();
        global.execute_planning_iteration();
        assert!(matches!(
            global.execute_planning_iteration(),
            PlanningStatus::WayPointIssued(_)
        ));
        assert_eq!(global.execute_planning_iteration(), PlanningStatus::Executing);

        blocked.store(true, Ordering::SeqCst);
        assert!(!global.planner().verify_next_way_points());
        assert_eq!(
            global.execute_planning_iteration(),
            PlanningStatus::PathInvalidated
        );
        assert_eq!(global.stage(), Stage::ComputeFrontiers);
        assert!(global.planner().way_points().is_empty());
    }

    #[test]
    fn test_way_points_are_issued_one_by_one() {
        let goal = Point::new(2.0, 0.0, 0.0);
        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(move || vec![vec![goal; 3]]);
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton
            .expect_plan()
            .returning(|_, goal| Some(vec![WayPoint::new(goal / 2.0), WayPoint::new(*goal)]));

        let mut execution = robot_at_origin();
        let mut reached = vec![false, true, true].into_iter();
        execution
            .expect_target_reached()
            .returning(move || reached.next().unwrap_or(true));
        let mut seq = mockall::Sequence::new();
        execution
            .expect_request_way_point()
            .with(eq(WayPoint::new(Point::new(1.0, 0.0, 0.0))))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        execution
            .expect_request_way_point()
            .withf(|wp| wp.position.x > 1.5)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let planner =
            SkeletonPlanner::new(config(), free_map(), frontiers, skeleton, execution).unwrap();
        let reader = planner.snapshot_reader();
        let mut global = GlobalPlanner::new(planner);
        global.execute_planning_iteration();
        global.execute_planning_iteration();

        assert!(matches!(
            global.execute_planning_iteration(),
            PlanningStatus::WayPointIssued(_)
        ));
        assert_eq!(global.execute_planning_iteration(), PlanningStatus::Executing);
        assert!(matches!(
            global.execute_planning_iteration(),
            PlanningStatus::WayPointIssued(_)
        ));
        assert_eq!(
            global.execute_planning_iteration(),
            PlanningStatus::ExecutionFinished
        );
        assert_eq!(global.stage(), Stage::ComputeFrontiers);
        assert!(reader.latest().execution_finished);
    }

    #[test]
    fn test_goal_refinement_moves_goal_to_safer_point() {
        // Clearance grows with +y up to y = 1 and falls after it.
        let mut map = MockDistanceFieldQuery::new();
        map.expect_voxel_size().return_const(0.1);
        map.expect_is_traversable_in_active_submap()
            .returning(|p, r| 1.5 - (p.y - 1.0).abs() >= r);
        map.expect_distance_and_gradient_in_active_submap()
            .returning(|p| {
                let gradient = if p.y < 1.0 { Point::y() } else { -Point::y() };
                Some((1.5 - (p.y - 1.0).abs(), gradient))
            });

        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(|| vec![vec![Point::new(4.0, 0.0, 0.0); 3]]);
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton
            .expect_plan()
            .returning(|_, goal| Some(vec![WayPoint::new(*goal)]));

        let config = PlannerConfig {
            use_goal_refinement: true,
            ..config()
        };
        let planner =
            SkeletonPlanner::new(config, map, frontiers, skeleton, robot_at_origin()).unwrap();
        let mut global = GlobalPlanner::new(planner);
        global.execute_planning_iteration();

        match global.execute_planning_iteration() {
            PlanningStatus::GoalSelected { goal, .. } => {
                assert_relative_eq!(goal.x, 4.0);
                assert_relative_eq!(goal.y, 1.0, epsilon = 0.11);
            }
            other => panic!("expected a goal, got {:?}", other),
        }
        let remaining = global.planner().way_points();
        assert_eq!(remaining.len(), 1);
        assert_relative_eq!(remaining[0].position.y, 1.0, epsilon = 0.11);
    }

    #[test]
    fn test_unreachable_refined_goal_keeps_original() {
        let mut map = MockDistanceFieldQuery::new();
        map.expect_voxel_size().return_const(0.1);
        map.expect_is_traversable_in_active_submap()
            .returning(|p, r| 1.5 - (p.y - 1.0).abs() >= r);
        map.expect_distance_and_gradient_in_active_submap()
            .returning(|p| {
                let gradient = if p.y < 1.0 { Point::y() } else { -Point::y() };
                Some((1.5 - (p.y - 1.0).abs(), gradient))
            });

        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(|| vec![vec![Point::new(4.0, 0.0, 0.0); 3]]);
        // Only the unrefined goal on the x axis is connected.
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton
            .expect_plan()
            .times(2)
            .returning(|_, goal| (goal.y.abs() < 0.01).then(|| vec![WayPoint::new(*goal)]));

        let config = PlannerConfig {
            use_goal_refinement: true,
            ..config()
        };
        let planner =
            SkeletonPlanner::new(config, map, frontiers, skeleton, robot_at_origin()).unwrap();
        let mut global = GlobalPlanner::new(planner);
        global.execute_planning_iteration();

        match global.execute_planning_iteration() {
            PlanningStatus::GoalSelected {
                goal,
                path_distance,
            } => {
                assert_relative_eq!(goal, Point::new(4.0, 0.0, 0.0));
                assert_relative_eq!(path_distance, 4.0);
            }
            other => panic!("expected a goal, got {:?}", other),
        }
        let remaining = global.planner().way_points();
        assert_eq!(remaining.len(), 1);
        assert_relative_eq!(remaining[0].position, Point::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_reset_discards_cycle() {
        let mut frontiers = MockFrontierEvaluator::new();
        frontiers
            .expect_evaluate()
            .returning(|| vec![blob(Point::new(2.0, 0.0, 0.0), 3)]);
        let mut skeleton = MockSkeletonPathSearch::new();
        skeleton
            .expect_plan()
            .returning(|_, goal| Some(vec![WayPoint::new(*goal)]));
        skeleton
            .expect_add_submap()
            .with(eq(7), eq(0.3))
            .times(1)
            .return_const(());

        let planner =
            SkeletonPlanner::new(config(), free_map(), frontiers, skeleton, robot_at_origin())
                .unwrap();
        let mut global = GlobalPlanner::new(planner);
        global.planner_mut().add_submap(7, 0.3);
        global.execute_planning_iteration();
        global.execute_planning_iteration();
        assert_eq!(global.planner().way_points().len(), 1);

        global.planner_mut().reset();
        assert!(global.planner().way_points().is_empty());
        assert!(global.planner().frontier_search_data().is_empty());
    }
}
