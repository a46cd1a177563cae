//! Simulated collaborators
//!
//! A small analytic world for exercising the planner without a mapping stack:
//! spherical obstacles inside a bounded mapped region, a straight-line
//! skeleton with simple detours, frontiers that disappear once visited, and a
//! robot that reaches every way-point it is given.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::core::{
    DistanceFieldQuery, FloatingPoint, Point, SharedMap, SubmapStore, WayPoint,
};
use crate::navigation::{ExecutionInterface, FrontierEvaluator, SkeletonPathSearch};

/// Spherical obstacle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Center
    pub center: Point,
    /// Radius
    pub radius: FloatingPoint,
}

impl Sphere {
    /// Obstacle at `center`
    pub fn new(center: Point, radius: FloatingPoint) -> Self {
        Sphere { center, radius }
    }
}

/// Distance field of spheres inside an axis-aligned mapped region.
///
/// Distances are truncated at `max_distance`; beyond it the gradient is zero,
/// like a truncated ESDF. Points outside the region cannot be looked up.
#[derive(Debug, Clone)]
pub struct SphereWorld {
    min_corner: Point,
    max_corner: Point,
    voxel_size: FloatingPoint,
    max_distance: FloatingPoint,
    obstacles: Vec<Sphere>,
}

impl SphereWorld {
    /// Empty world spanning `min_corner`..`max_corner`
    pub fn new(min_corner: Point, max_corner: Point, voxel_size: FloatingPoint) -> Self {
        SphereWorld {
            min_corner,
            max_corner,
            voxel_size,
            max_distance: 5.0,
            obstacles: Vec::new(),
        }
    }

    /// Builder-style setter for the truncation distance
    pub fn with_max_distance(mut self, max_distance: FloatingPoint) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Obstacles added so far
    pub fn obstacles(&self) -> &[Sphere] {
        &self.obstacles
    }

    fn contains(&self, position: &Point) -> bool {
        (0..3).all(|i| position[i] >= self.min_corner[i] && position[i] <= self.max_corner[i])
    }

    fn nearest(&self, position: &Point) -> Option<(FloatingPoint, &Sphere)> {
        self.obstacles
            .iter()
            .map(|sphere| ((position - sphere.center).norm() - sphere.radius, sphere))
            .min_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// Signed distance to the nearest obstacle, truncated
    pub fn distance(&self, position: &Point) -> FloatingPoint {
        self.nearest(position)
            .map_or(self.max_distance, |(distance, _)| distance.min(self.max_distance))
    }
}

impl DistanceFieldQuery for SphereWorld {
    fn is_traversable_in_active_submap(
        &self,
        position: &Point,
        clearance_radius: FloatingPoint,
    ) -> bool {
        self.contains(position) && self.distance(position) >= clearance_radius
    }

    fn distance_and_gradient_in_active_submap(
        &self,
        position: &Point,
    ) -> Option<(FloatingPoint, Point)> {
        if !self.contains(position) {
            return None;
        }
        match self.nearest(position) {
            Some((distance, sphere)) if distance < self.max_distance => {
                let gradient = (position - sphere.center)
                    .try_normalize(1.0e-6)
                    .unwrap_or_else(Point::x);
                Some((distance, gradient))
            }
            _ => Some((self.max_distance, Point::zeros())),
        }
    }

    fn voxel_size(&self) -> FloatingPoint {
        self.voxel_size
    }
}

impl SubmapStore for SphereWorld {
    type Submap = Vec<Sphere>;

    fn add_submap(&mut self, submap: Vec<Sphere>, traversability_radius: FloatingPoint) {
        debug!(
            "Adding submap with {} obstacles (traversability radius {}).",
            submap.len(),
            traversability_radius
        );
        self.obstacles.extend(submap);
    }
}

/// Skeleton stand-in: straight segments, or one detour around obstacles.
pub struct StraightLineSkeleton {
    map: SharedMap<SphereWorld>,
    clearance: FloatingPoint,
    spacing: FloatingPoint,
    detour_step: FloatingPoint,
    max_detours: usize,
}

impl StraightLineSkeleton {
    /// Paths keep `clearance` and have way-points every `spacing` meters
    pub fn new(
        map: SharedMap<SphereWorld>,
        clearance: FloatingPoint,
        spacing: FloatingPoint,
    ) -> Self {
        StraightLineSkeleton {
            map,
            clearance,
            spacing,
            detour_step: 1.0,
            max_detours: 4,
        }
    }

    fn segment_is_free(&self, from: &Point, to: &Point) -> bool {
        let length = (to - from).norm();
        let samples = (length / (self.map.voxel_size().max(1.0e-3))).ceil() as usize;
        (0..=samples.max(1)).all(|i| {
            let t = i as FloatingPoint / samples.max(1) as FloatingPoint;
            self.map
                .is_traversable_in_active_submap(&from.lerp(to, t), self.clearance)
        })
    }

    fn sample_segment(&self, from: &Point, to: &Point, way_points: &mut Vec<WayPoint>) {
        let length = (to - from).norm();
        let count = ((length / self.spacing).ceil() as usize).max(1);
        for i in 1..=count {
            let position = from.lerp(to, i as FloatingPoint / count as FloatingPoint);
            way_points.push(WayPoint::facing_from(position, from));
        }
    }

    fn via_point(&self, start: &Point, goal: &Point) -> Option<Point> {
        let direction = goal - start;
        let side = Point::new(-direction.y, direction.x, 0.0).try_normalize(1.0e-6)?;
        let midpoint = start + direction / 2.0;
        (1..=self.max_detours)
            .flat_map(|k| {
                let offset = side * (k as FloatingPoint * self.detour_step);
                [midpoint + offset, midpoint - offset]
            })
            .find(|via| self.segment_is_free(start, via) && self.segment_is_free(via, goal))
    }
}

impl SkeletonPathSearch for StraightLineSkeleton {
    type Submap = Vec<Sphere>;

    fn add_submap(&mut self, submap: Vec<Sphere>, traversability_radius: FloatingPoint) {
        self.map.add_submap(submap, traversability_radius);
    }

    fn plan(&self, start: &Point, goal: &Point) -> Option<Vec<WayPoint>> {
        let mut way_points = Vec::new();
        if self.segment_is_free(start, goal) {
            self.sample_segment(start, goal, &mut way_points);
        } else {
            let via = self.via_point(start, goal)?;
            self.sample_segment(start, &via, &mut way_points);
            self.sample_segment(&via, goal, &mut way_points);
        }
        Some(way_points)
    }
}

/// Robot position shared between the simulated robot and frontiers
#[derive(Clone, Debug, Default)]
pub struct RobotHandle {
    position: Arc<Mutex<Point>>,
}

impl RobotHandle {
    /// Handle with the robot at `position`
    pub fn new(position: Point) -> Self {
        RobotHandle {
            position: Arc::new(Mutex::new(position)),
        }
    }

    /// Current position
    pub fn position(&self) -> Point {
        match self.position.lock() {
            Ok(position) => *position,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set(&self, position: Point) {
        match self.position.lock() {
            Ok(mut guard) => *guard = position,
            Err(poisoned) => *poisoned.into_inner() = position,
        }
    }
}

/// Robot that reaches every requested way-point instantly
#[derive(Debug)]
pub struct SimulatedRobot {
    handle: RobotHandle,
    visited: Vec<WayPoint>,
}

impl SimulatedRobot {
    /// Robot moving the position behind `handle`
    pub fn new(handle: RobotHandle) -> Self {
        SimulatedRobot {
            handle,
            visited: Vec::new(),
        }
    }

    /// Every way-point executed so far
    pub fn visited(&self) -> &[WayPoint] {
        &self.visited
    }
}

impl ExecutionInterface for SimulatedRobot {
    fn current_position(&self) -> Point {
        self.handle.position()
    }

    fn request_way_point(&mut self, way_point: &WayPoint) {
        self.handle.set(way_point.position);
        self.visited.push(*way_point);
    }

    fn target_reached(&self) -> bool {
        true
    }
}

/// Fixed frontier regions that vanish once the robot gets close to them
pub struct ScriptedFrontiers {
    robot: RobotHandle,
    observation_radius: FloatingPoint,
    frontiers: Vec<Vec<Point>>,
}

impl ScriptedFrontiers {
    /// Frontiers observed from within `observation_radius` of their centroid
    pub fn new(
        robot: RobotHandle,
        observation_radius: FloatingPoint,
        frontiers: Vec<Vec<Point>>,
    ) -> Self {
        ScriptedFrontiers {
            robot,
            observation_radius,
            frontiers,
        }
    }

    /// Ring of `count` points of radius `radius` around `center`
    pub fn ring(center: Point, radius: FloatingPoint, count: usize) -> Vec<Point> {
        (0..count)
            .map(|i| {
                let angle = i as FloatingPoint / count as FloatingPoint * std::f32::consts::TAU;
                center + Point::new(angle.cos() * radius, angle.sin() * radius, 0.0)
            })
            .collect()
    }

    /// Frontiers not observed yet
    pub fn remaining(&self) -> usize {
        self.frontiers.len()
    }
}

impl FrontierEvaluator for ScriptedFrontiers {
    fn evaluate(&mut self) -> Vec<Vec<Point>> {
        let robot = self.robot.position();
        let radius = self.observation_radius;
        let before = self.frontiers.len();
        self.frontiers.retain(|points| {
            let centroid = points.iter().fold(Point::zeros(), |acc, p| acc + p)
                / points.len().max(1) as FloatingPoint;
            (centroid - robot).norm() > radius
        });
        if self.frontiers.len() < before {
            info!(
                "Observed {} frontiers, {} remaining.",
                before - self.frontiers.len(),
                self.frontiers.len()
            );
        }
        self.frontiers.clone()
    }
}
