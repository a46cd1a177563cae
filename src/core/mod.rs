// core/mod.rs

// Shared geometry types and the distance-field layer the planner stands on: the
// map query interface, concurrent submap ingestion, and the gradient-ascent point
// correction routines.

pub mod correction;
pub mod map;

pub use correction::{
    CorrectionFailure, DisplacedFailure, SafePoint, TraversablePoint,
    find_nearby_traversable_point, find_safest_nearby_point,
};
pub use map::{DistanceFieldQuery, SharedMap, SubmapStore};

use serde::{Deserialize, Serialize};

/// Scalar used for distances, radii and step sizes
pub type FloatingPoint = f32;

/// 3-D point or direction in the mission frame
pub type Point = nalgebra::Vector3<FloatingPoint>;

/// One element of a path handed to execution
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WayPoint {
    /// Target position (mission frame)
    pub position: Point,
    /// Heading at the target (radians)
    pub yaw: FloatingPoint,
}

impl WayPoint {
    /// Way-point at `position` with zero heading
    pub fn new(position: Point) -> Self {
        WayPoint { position, yaw: 0.0 }
    }

    /// Way-point heading from `from` towards `position`
    pub fn facing_from(position: Point, from: &Point) -> Self {
        let delta = position - from;
        let yaw = if delta.x == 0.0 && delta.y == 0.0 {
            0.0
        } else {
            delta.y.atan2(delta.x)
        };
        WayPoint { position, yaw }
    }

    /// Euclidean distance to a point
    pub fn distance_to(&self, point: &Point) -> FloatingPoint {
        (self.position - point).norm()
    }
}

/// Length of the polyline from `start` through every way-point.
pub fn path_length(start: &Point, way_points: &[WayPoint]) -> FloatingPoint {
    let mut previous = *start;
    let mut length = 0.0;
    for way_point in way_points {
        length += way_point.distance_to(&previous);
        previous = way_point.position;
    }
    length
}
