// core/correction.rs

// Gradient-ascent point correction on the distance field. Two routines with
// different contracts:
// - find_nearby_traversable_point: minimal displacement until the point is
//   traversable. The point moves on every step, so a failure reports where the
//   ascent stopped.
// - find_safest_nearby_point: climbs to a local clearance maximum. A failure
//   carries no point at all and the caller's value stays as it was.

use log::{info, warn};
use thiserror::Error;

use super::{DistanceFieldQuery, FloatingPoint, Point};

const MAX_TRAVERSABLE_STEPS: usize = 20;
const MAX_SAFEST_STEPS: usize = 80;

/// Why a correction did not produce a point
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CorrectionFailure {
    /// The map could not answer a distance/gradient query
    #[error("failed to look up distance and gradient information at {:?}", .at.as_slice())]
    LookupFailed {
        /// Where the lookup was attempted
        at: Point,
    },
    /// The step budget ran out
    #[error("no acceptable point after {steps} gradient ascent steps")]
    StepsExhausted {
        /// Number of loop iterations attempted
        steps: usize,
    },
}

/// Failure of [`find_nearby_traversable_point`]; the point has already been moved.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("{reason} (ascent stopped at {:?})", .last_position.as_slice())]
pub struct DisplacedFailure {
    /// Cause
    pub reason: CorrectionFailure,
    /// Position after the last gradient step
    pub last_position: Point,
}

/// Successful [`find_nearby_traversable_point`] result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraversablePoint {
    /// Traversable position
    pub position: Point,
    /// Gradient steps taken (0 if the input was already traversable)
    pub steps: usize,
}

/// Successful [`find_safest_nearby_point`] result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafePoint {
    /// Position with the highest clearance found
    pub position: Point,
    /// Distance to the nearest obstacle at `position`
    pub clearance: FloatingPoint,
    /// Loop iterations used before accepting
    pub steps: usize,
}

/// Move `position` along the distance gradient until it is traversable at
/// `traversability_radius`.
///
/// Each step is at least one voxel and longer while the point is still deep
/// inside an obstacle. At most `MAX_TRAVERSABLE_STEPS - 1` steps are taken. A
/// single failed lookup ends the search.
pub fn find_nearby_traversable_point<M: DistanceFieldQuery + ?Sized>(
    map: &M,
    traversability_radius: FloatingPoint,
    position: Point,
) -> Result<TraversablePoint, DisplacedFailure> {
    let initial_position = position;
    let voxel_size = map.voxel_size();
    let mut position = position;

    for step_idx in 1..MAX_TRAVERSABLE_STEPS {
        if map.is_traversable_in_active_submap(&position, traversability_radius) {
            let steps = step_idx - 1;
            if steps > 0 {
                info!(
                    "Moved point from intraversable initial position {:?} to traversable position {:?} after {} gradient ascent steps.",
                    initial_position.as_slice(),
                    position.as_slice(),
                    steps
                );
            }
            return Ok(TraversablePoint { position, steps });
        }

        let Some((distance, gradient)) = map.distance_and_gradient_in_active_submap(&position)
        else {
            warn!(
                "Failed to look up distance and gradient information at: {:?}",
                position.as_slice()
            );
            return Err(DisplacedFailure {
                reason: CorrectionFailure::LookupFailed { at: position },
                last_position: position,
            });
        };

        let step_size = voxel_size.max(traversability_radius - distance);
        position += step_size * gradient;
    }

    Err(DisplacedFailure {
        reason: CorrectionFailure::StepsExhausted {
            steps: MAX_TRAVERSABLE_STEPS - 1,
        },
        last_position: position,
    })
}

/// Climb the distance gradient in one-voxel steps and return the point with the
/// highest clearance, provided it is traversable at `minimum_distance`.
///
/// The climb stops once the clearance drops more than half a voxel below the
/// best seen (it walked over the local maximum) or on the last iteration.
///
/// Only a lookup failure on the very first iteration aborts. Later failures
/// count as zero clearance and the previous gradient is reused.
pub fn find_safest_nearby_point<M: DistanceFieldQuery + ?Sized>(
    map: &M,
    minimum_distance: FloatingPoint,
    position: Point,
) -> Result<SafePoint, CorrectionFailure> {
    let initial_position = position;
    let voxel_size = map.voxel_size();

    let mut current_position = initial_position;
    let mut best_distance_so_far: FloatingPoint = 0.0;
    let mut best_position_so_far = initial_position;
    let mut gradient = Point::zeros();

    for step_idx in 1..MAX_SAFEST_STEPS {
        let distance = match map.distance_and_gradient_in_active_submap(&current_position) {
            Some((distance, new_gradient)) => {
                gradient = new_gradient;
                distance
            }
            None if step_idx == 1 => {
                warn!(
                    "Failed to look up distance and gradient information at: {:?}",
                    current_position.as_slice()
                );
                return Err(CorrectionFailure::LookupFailed {
                    at: current_position,
                });
            }
            None => 0.0,
        };

        if best_distance_so_far < distance {
            best_distance_so_far = distance;
            best_position_so_far = current_position;
        } else if (distance + voxel_size / 2.0 < best_distance_so_far
            || step_idx == MAX_SAFEST_STEPS - 1)
            && map.is_traversable_in_active_submap(&best_position_so_far, minimum_distance)
        {
            info!(
                "Found a safe point near initial position {:?}, at {:?} with distance {} after {} gradient ascent steps.",
                initial_position.as_slice(),
                best_position_so_far.as_slice(),
                best_distance_so_far,
                step_idx
            );
            return Ok(SafePoint {
                position: best_position_so_far,
                clearance: best_distance_so_far,
                steps: step_idx,
            });
        }

        current_position += voxel_size * gradient;
    }

    info!(
        "Could not find a safer point near initial position {:?}, attempted {} gradient ascent steps.",
        initial_position.as_slice(),
        MAX_SAFEST_STEPS - 1
    );
    Err(CorrectionFailure::StepsExhausted {
        steps: MAX_SAFEST_STEPS - 1,
    })
}
