//! Frontier candidates for global planning
//!
//! Raw frontier point sets come from a [`FrontierEvaluator`]. They are turned
//! into [`FrontierSearchData`] entries, optionally merged by centroid
//! proximity, filtered by size, and ordered by distance from the robot.

use serde::Serialize;

use crate::core::{FloatingPoint, Point, WayPoint};

/// Source of frontier regions in the current map
#[cfg_attr(test, mockall::automock)]
pub trait FrontierEvaluator {
    /// Point sets on the boundary between traversable and unknown space
    fn evaluate(&mut self) -> Vec<Vec<Point>>;
}

/// Goal search result of a frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Reachability {
    /// A path to a goal near the frontier exists
    Reachable,
    /// A goal was found but no path leads to it
    Unreachable,
    /// Not searched yet
    Unchecked,
    /// No traversable goal near the frontier
    InvalidGoal,
}

/// One frontier candidate of the current planning cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrontierSearchData {
    /// Mean of the frontier points
    pub centroid: Point,
    /// Straight-line distance from the robot to the centroid
    pub euclidean_distance: FloatingPoint,
    /// Length of the planned path, valid once reachable
    pub path_distance: FloatingPoint,
    /// Number of frontier points
    pub num_points: usize,
    /// Raw frontier points
    pub frontier_points: Vec<Point>,
    /// Number of frontiers merged into this one
    pub clusters: usize,
    /// Path to the goal, valid once reachable
    pub way_points: Vec<WayPoint>,
    /// Goal search result
    pub reachability: Reachability,
}

impl FrontierSearchData {
    /// Build an unchecked candidate from a raw point set. `None` for an empty set.
    pub fn from_points(frontier_points: Vec<Point>, robot_position: &Point) -> Option<Self> {
        if frontier_points.is_empty() {
            return None;
        }
        let sum = frontier_points.iter().fold(Point::zeros(), |acc, p| acc + p);
        let centroid = sum / frontier_points.len() as FloatingPoint;
        Some(FrontierSearchData {
            centroid,
            euclidean_distance: (centroid - robot_position).norm(),
            path_distance: 0.0,
            num_points: frontier_points.len(),
            frontier_points,
            clusters: 1,
            way_points: Vec::new(),
            reachability: Reachability::Unchecked,
        })
    }

    /// Absorb another frontier; the centroid becomes the point-weighted mean.
    fn merge(&mut self, other: FrontierSearchData, robot_position: &Point) {
        let total = (self.num_points + other.num_points) as FloatingPoint;
        self.centroid = (self.centroid * self.num_points as FloatingPoint
            + other.centroid * other.num_points as FloatingPoint)
            / total;
        self.num_points += other.num_points;
        self.frontier_points.extend(other.frontier_points);
        self.clusters += other.clusters;
        self.euclidean_distance = (self.centroid - robot_position).norm();
    }
}

/// Greedy centroid clustering: each frontier joins the first cluster whose
/// centroid lies within `radius`, otherwise it opens a new one.
pub fn cluster_frontiers(
    frontiers: Vec<FrontierSearchData>,
    radius: FloatingPoint,
    robot_position: &Point,
) -> Vec<FrontierSearchData> {
    let mut clusters: Vec<FrontierSearchData> = Vec::with_capacity(frontiers.len());
    for frontier in frontiers {
        match clusters
            .iter_mut()
            .find(|cluster| (cluster.centroid - frontier.centroid).norm() <= radius)
        {
            Some(cluster) => cluster.merge(frontier, robot_position),
            None => clusters.push(frontier),
        }
    }
    clusters
}

/// Build the candidate list of one planning cycle.
pub fn build_candidates(
    raw_frontiers: Vec<Vec<Point>>,
    robot_position: &Point,
    clustering_radius: Option<FloatingPoint>,
    min_num_points: usize,
) -> Vec<FrontierSearchData> {
    let mut frontiers: Vec<FrontierSearchData> = raw_frontiers
        .into_iter()
        .filter_map(|points| FrontierSearchData::from_points(points, robot_position))
        .collect();

    if let Some(radius) = clustering_radius {
        frontiers = cluster_frontiers(frontiers, radius, robot_position);
    }

    frontiers.retain(|frontier| frontier.num_points >= min_num_points);
    frontiers.sort_by(|a, b| a.euclidean_distance.total_cmp(&b.euclidean_distance));
    frontiers
}
