// src/main.rs
// Demo run of the skeleton exploration planner in a simulated sphere world.
// A mapping thread keeps adding obstacle submaps while the planner ticks.

use log::{error, info, warn};
use skeleton_explorer::sim::{
    RobotHandle, ScriptedFrontiers, SimulatedRobot, Sphere, SphereWorld, StraightLineSkeleton,
};
use skeleton_explorer::{
    ExplorerConfig, GlobalPlanner, PlanningStatus, Point, SharedMap, SkeletonPlanner,
};
use std::error::Error;
use std::thread;
use std::time::Duration;

/// Obstacles revealed over time by the mapping thread, one submap per batch.
fn obstacle_batches() -> Vec<Vec<Sphere>> {
    vec![
        vec![Sphere::new(Point::new(4.0, 0.0, 0.0), 1.0)],
        vec![
            Sphere::new(Point::new(-3.0, 4.0, 0.0), 1.5),
            Sphere::new(Point::new(0.0, -6.0, 0.0), 1.0),
        ],
        vec![Sphere::new(Point::new(7.0, 6.0, 0.0), 1.2)],
    ]
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    info!("Starting skeleton explorer demo...");

    let config = match std::env::args().nth(1) {
        Some(path) => ExplorerConfig::load(&path)?,
        None => {
            warn!("No config file given, using defaults");
            ExplorerConfig::default()
        }
    };
    let radius = config.planner.traversability_radius;

    let map = SharedMap::new(SphereWorld::new(
        Point::new(-12.0, -12.0, -1.0),
        Point::new(12.0, 12.0, 1.0),
        0.1,
    ));
    let robot = RobotHandle::new(Point::zeros());
    let frontiers = ScriptedFrontiers::new(
        robot.clone(),
        1.5,
        vec![
            ScriptedFrontiers::ring(Point::new(8.0, 0.0, 0.0), 0.8, 16),
            ScriptedFrontiers::ring(Point::new(-6.0, 6.0, 0.0), 0.8, 16),
            ScriptedFrontiers::ring(Point::new(2.0, -9.0, 0.0), 0.8, 16),
            ScriptedFrontiers::ring(Point::new(9.0, 9.0, 0.0), 0.8, 16),
        ],
    );
    let skeleton = StraightLineSkeleton::new(map.clone(), radius, 1.0);

    let planner = SkeletonPlanner::new(
        config.planner.clone(),
        map.clone(),
        frontiers,
        skeleton,
        SimulatedRobot::new(robot.clone()),
    )?;
    let snapshots = planner.snapshot_reader();
    let mut global = GlobalPlanner::new(planner);

    // Mapping runs concurrently with planning
    let tick = Duration::from_millis(config.run.tick_interval_ms);
    let mapper_map = map.clone();
    let mapper = thread::spawn(move || {
        for batch in obstacle_batches() {
            if !mapper_map.add_submap(batch, radius) {
                error!("Mapping thread lost access to the map");
                return;
            }
            thread::sleep(tick * 5);
        }
    });

    let mut idle_iterations = 0;
    for iteration in 0..config.run.max_iterations {
        match global.execute_planning_iteration() {
            PlanningStatus::NoFrontiers => {
                idle_iterations += 1;
                if idle_iterations >= 3 {
                    info!("No frontiers left after {} iterations", iteration + 1);
                    break;
                }
            }
            PlanningStatus::GoalSelected {
                goal,
                path_distance,
            } => {
                idle_iterations = 0;
                info!(
                    "Heading to ({:.2}, {:.2}, {:.2}), {:.2}m away",
                    goal.x, goal.y, goal.z, path_distance
                );
            }
            PlanningStatus::PathInvalidated => {
                warn!("Path became unsafe, replanning");
            }
            _ => idle_iterations = 0,
        }
        thread::sleep(tick);
    }

    if mapper.join().is_err() {
        error!("Mapping thread panicked");
    }

    let snapshot = snapshots.latest();
    let position = robot.position();
    info!(
        "Exploration demo completed: {} planning iterations, {} frontier cycles, robot at ({:.2}, {:.2}, {:.2})",
        global.iterations(),
        snapshot.cycle,
        position.x,
        position.y,
        position.z
    );
    Ok(())
}
