// src/navigation/goal_search.rs
// Cube of candidate goal offsets around a frontier centroid, nearest first.

use crate::core::{DistanceFieldQuery, FloatingPoint, Point};

/// Precomputed goal search offsets.
///
/// `steps³` offsets on a grid of `step_size` spacing, centred on the origin
/// and sorted by distance from it. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalSearchOffsets {
    offsets: Vec<Point>,
    half_extent: FloatingPoint,
}

impl GoalSearchOffsets {
    /// Build the cube. A stable sort keeps equidistant offsets in grid order.
    pub fn new(steps: usize, step_size: FloatingPoint) -> Self {
        let center = (steps as FloatingPoint - 1.0) / 2.0;
        let axis = |i: usize| (i as FloatingPoint - center) * step_size;

        let mut offsets = Vec::with_capacity(steps * steps * steps);
        for x in 0..steps {
            for y in 0..steps {
                for z in 0..steps {
                    offsets.push(Point::new(axis(x), axis(y), axis(z)));
                }
            }
        }
        offsets.sort_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()));

        GoalSearchOffsets {
            offsets,
            half_extent: steps as FloatingPoint * step_size / 2.0,
        }
    }

    /// Offsets, nearest first
    pub fn offsets(&self) -> &[Point] {
        &self.offsets
    }

    /// Number of offsets
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the cube is empty
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Whether `point` lies inside the cube placed at `center`
    pub fn contains(&self, center: &Point, point: &Point) -> bool {
        (point - center).amax() <= self.half_extent
    }

    /// First `center + offset` that is traversable at `clearance`.
    pub fn find_traversable<M: DistanceFieldQuery + ?Sized>(
        &self,
        map: &M,
        center: &Point,
        clearance: FloatingPoint,
    ) -> Option<Point> {
        self.offsets
            .iter()
            .map(|offset| center + offset)
            .find(|candidate| map.is_traversable_in_active_submap(candidate, clearance))
    }
}
