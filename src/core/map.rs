// core/map.rs

// Query interface onto the submap distance field, plus a shared wrapper that lets
// a mapping thread ingest submaps while the planner keeps reading.

use log::error;
use std::sync::{Arc, RwLock};

use super::{FloatingPoint, Point};

/// Local distance-field queries against the currently active submap.
#[cfg_attr(test, mockall::automock)]
pub trait DistanceFieldQuery {
    /// Whether `position` keeps at least `clearance_radius` to every obstacle.
    fn is_traversable_in_active_submap(
        &self,
        position: &Point,
        clearance_radius: FloatingPoint,
    ) -> bool;

    /// Distance to the nearest obstacle and its (unit) gradient, or `None` if
    /// the point cannot be looked up (e.g. outside the mapped region).
    fn distance_and_gradient_in_active_submap(
        &self,
        position: &Point,
    ) -> Option<(FloatingPoint, Point)>;

    /// Map resolution, used as the minimum gradient step.
    fn voxel_size(&self) -> FloatingPoint;
}

/// A map that accepts new submaps from the mapping process.
pub trait SubmapStore: DistanceFieldQuery {
    /// Opaque submap payload.
    type Submap;

    /// Ingest a finished submap.
    fn add_submap(&mut self, submap: Self::Submap, traversability_radius: FloatingPoint);
}

/// Map handle shared between the mapping thread and the planner.
///
/// Every query holds the read lock for its own duration only, so a planner
/// iteration sees each lookup against a consistent map while `add_submap`
/// may land in between two lookups.
pub struct SharedMap<M> {
    inner: Arc<RwLock<M>>,
}

impl<M> Clone for SharedMap<M> {
    fn clone(&self) -> Self {
        SharedMap {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: SubmapStore> SharedMap<M> {
    /// Wrap a map for shared access
    pub fn new(map: M) -> Self {
        SharedMap {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Add a submap under the write lock. Returns false if the lock is poisoned.
    pub fn add_submap(&self, submap: M::Submap, traversability_radius: FloatingPoint) -> bool {
        match self.inner.write() {
            Ok(mut map) => {
                map.add_submap(submap, traversability_radius);
                true
            }
            Err(_) => {
                error!("Map lock poisoned, dropping submap");
                false
            }
        }
    }

    /// Run a closure against a read-locked view of the map.
    pub fn with_map<R>(&self, f: impl FnOnce(&M) -> R) -> Option<R> {
        self.inner.read().ok().map(|map| f(&map))
    }
}

impl<M: SubmapStore> DistanceFieldQuery for SharedMap<M> {
    fn is_traversable_in_active_submap(
        &self,
        position: &Point,
        clearance_radius: FloatingPoint,
    ) -> bool {
        self.with_map(|map| map.is_traversable_in_active_submap(position, clearance_radius))
            .unwrap_or(false)
    }

    fn distance_and_gradient_in_active_submap(
        &self,
        position: &Point,
    ) -> Option<(FloatingPoint, Point)> {
        self.with_map(|map| map.distance_and_gradient_in_active_submap(position))
            .flatten()
    }

    // The resolution never changes with new submaps, so a poisoned lock still
    // reports it rather than a zero step.
    fn voxel_size(&self) -> FloatingPoint {
        match self.inner.read() {
            Ok(map) => map.voxel_size(),
            Err(poisoned) => {
                error!("Map lock poisoned, reading voxel size from the last state");
                poisoned.into_inner().voxel_size()
            }
        }
    }
}

impl<T: DistanceFieldQuery + ?Sized> DistanceFieldQuery for &T {
    fn is_traversable_in_active_submap(
        &self,
        position: &Point,
        clearance_radius: FloatingPoint,
    ) -> bool {
        (**self).is_traversable_in_active_submap(position, clearance_radius)
    }

    fn distance_and_gradient_in_active_submap(
        &self,
        position: &Point,
    ) -> Option<(FloatingPoint, Point)> {
        (**self).distance_and_gradient_in_active_submap(position)
    }

    fn voxel_size(&self) -> FloatingPoint {
        (**self).voxel_size()
    }
}
