//! Navigation controller
//!
//! Orchestrates the occupancy grid, particle filter, path planner, and VFH
//! avoider into a single pose-update / map-update / velocity-command control
//! loop driven by one external caller per tick.
//!
//! # Example
//!
//! ```rust
//! use horus_navstack::controller::{NavigationController, NavigationGoal};
//! use horus_navstack::types::{Pose, Vector3};
//!
//! let mut controller = NavigationController::new();
//! controller.update_pose(Vector3::new(0.0, 0.0, 0.0), Vector3::zero());
//! let goal = NavigationGoal::new(Pose::new(2.0, 0.0, 0.0));
//! let _ = controller.set_goal(goal);
//! let (linear, angular) = controller.velocity_command(&[]);
//! assert!((0.0..=0.5).contains(&linear));
//! assert!((-1.0..=1.0).contains(&angular));
//! ```

use crate::algorithms::occupancy_grid::OccupancyGrid;
use crate::algorithms::particle_filter::ParticleFilter;
use crate::algorithms::planner::PathPlanner;
use crate::algorithms::vfh::Vfh;
use crate::error::NavigationError;
use crate::types::{canonicalize, Pose, Vector3};
use async_trait::async_trait;

const GOAL_POSITION_TOLERANCE: f64 = 0.1;
const GOAL_ANGLE_TOLERANCE: f64 = 0.1;
const EMERGENCY_STOP_DISTANCE: f64 = 0.3;
const WAYPOINT_REACH_DISTANCE: f64 = 0.3;
const MAX_LINEAR_SPEED: f64 = 0.5;
const TURN_GAIN: f64 = 2.0;
const REPLAN_VALIDATION_SPACING_FACTOR: f64 = 2.0;

/// Tunables for [`NavigationController`] not otherwise owned by a subsystem config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub goal_position_tolerance: f64,
    pub goal_angle_tolerance: f64,
    pub emergency_stop_distance: f64,
    pub waypoint_reach_distance: f64,
    pub max_linear_speed: f64,
    pub turn_gain: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            goal_position_tolerance: GOAL_POSITION_TOLERANCE,
            goal_angle_tolerance: GOAL_ANGLE_TOLERANCE,
            emergency_stop_distance: EMERGENCY_STOP_DISTANCE,
            waypoint_reach_distance: WAYPOINT_REACH_DISTANCE,
            max_linear_speed: MAX_LINEAR_SPEED,
            turn_gain: TURN_GAIN,
        }
    }
}

/// A sensor-reported range measurement, already converted to the crate's
/// planar convention at the sensor boundary: `point.x = world.x`,
/// `point.y = world.z`, `point.z = world.y`. Every other module consumes
/// `point.x`/`point.y` as the planar `(x, y)` pair; no module re-derives
/// the swap.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub point: Vector3,
    pub distance: f64,
    pub occupied: bool,
    pub mesh_id: String,
    pub normal: Option<[f64; 3]>,
}

/// A heterogeneous sensor collaborator. Object-safe so the controller can
/// hold `Vec<Box<dyn Sensor>>` mixing different sensor kinds.
#[async_trait]
pub trait Sensor: Send {
    async fn update(&mut self, robot_position: Vector3, robot_rotation: Vector3) -> Vec<SensorReading>;
}

/// Position and orientation tolerance for declaring a goal reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalTolerance {
    pub position: f64,
    pub orientation: f64,
}

impl Default for GoalTolerance {
    fn default() -> Self {
        Self {
            position: GOAL_POSITION_TOLERANCE,
            orientation: GOAL_ANGLE_TOLERANCE,
        }
    }
}

/// A navigation goal: target pose plus the tolerance that defines "reached".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationGoal {
    pub pose: Pose,
    pub tolerance: GoalTolerance,
}

impl NavigationGoal {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            tolerance: GoalTolerance::default(),
        }
    }
}

/// Current lifecycle status of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Planning,
    Moving,
    Blocked,
    GoalReached,
    Failed,
}

/// A read-only snapshot of the controller's state, returned by
/// [`NavigationController::navigation_state`].
#[derive(Debug, Clone)]
pub struct NavigationState {
    pub current_pose: Pose,
    pub is_navigating: bool,
    pub current_goal: Option<NavigationGoal>,
    pub path: Vec<Pose>,
    pub status: Status,
    pub last_error: Option<NavigationError>,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current_pose: Pose::origin(),
            is_navigating: false,
            current_goal: None,
            path: Vec::new(),
            status: Status::Idle,
            last_error: None,
        }
    }
}

/// Owns the full navigation stack and exposes the direct-call control loop:
/// `update_pose`, `set_goal`, `update_map`, `velocity_command`.
pub struct NavigationController {
    config: ControllerConfig,
    grid: OccupancyGrid,
    filter: ParticleFilter,
    planner: PathPlanner,
    vfh: Vfh,
    sensors: Vec<Box<dyn Sensor>>,
    state: NavigationState,
    last_position: Vector3,
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationController {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        Self {
            config,
            grid: OccupancyGrid::empty(30.0, 30.0, 0.05),
            filter: ParticleFilter::new(),
            planner: PathPlanner::new(),
            vfh: Vfh::new(),
            sensors: Vec::new(),
            state: NavigationState::default(),
            last_position: Vector3::zero(),
        }
    }

    pub fn add_sensor(&mut self, sensor: Box<dyn Sensor>) {
        self.sensors.push(sensor);
    }

    pub fn navigation_state(&self) -> &NavigationState {
        &self.state
    }

    pub fn map(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Mutable access to the occupancy grid, for callers seeding a known
    /// map (tests, or an application restoring a prior session's map).
    pub fn map_mut(&mut self) -> &mut OccupancyGrid {
        &mut self.grid
    }

    /// Poll every registered sensor once and return the combined batch of
    /// readings. The caller feeds the same batch into `apply_readings`,
    /// `update_map`, and `velocity_command` for one control tick. A sensor
    /// that returns no readings this tick simply contributes nothing; a
    /// sensor collaborator that fails is the caller's concern (the trait
    /// has no `Result` in its signature — see DESIGN.md).
    pub async fn gather_readings(&mut self, robot_position: Vector3, robot_rotation: Vector3) -> Vec<SensorReading> {
        let mut readings = Vec::new();
        for sensor in &mut self.sensors {
            readings.extend(sensor.update(robot_position, robot_rotation).await);
        }
        readings
    }

    /// Advance the pose estimate from a raw odometry reading. Call
    /// `apply_readings` afterward with the tick's gathered sensor batch.
    pub fn update_pose(&mut self, world_position: Vector3, world_rotation: Vector3) {
        let delta_position = world_position.sub(&self.last_position);
        let delta_theta = canonicalize(world_rotation.y - self.state.current_pose.theta);

        self.filter.predict(delta_position, delta_theta);
        self.last_position = world_position;

        self.state.current_pose = self.filter.estimated_pose();

        if self.state.is_navigating {
            if let Some(goal) = self.state.current_goal {
                if self.goal_reached(goal) {
                    self.state.path.clear();
                    self.state.is_navigating = false;
                    self.state.status = Status::GoalReached;
                    tracing::debug!("goal reached");
                }
            }
        }
    }

    /// Apply a batch of sensor readings to the particle filter. Call after
    /// `update_pose`, before `update_map`, to preserve filter convergence.
    pub fn apply_readings(&mut self, readings: &[SensorReading]) {
        if !readings.is_empty() {
            self.filter.update(readings);
            self.state.current_pose = self.filter.estimated_pose();
        }
    }

    fn goal_reached(&self, goal: NavigationGoal) -> bool {
        let pose = self.state.current_pose;
        pose.distance(&goal.pose) < goal.tolerance.position
            && pose.angle_to(&goal.pose).abs() < goal.tolerance.orientation
    }

    /// Set a new navigation goal, planning a path from the current pose.
    pub fn set_goal(&mut self, goal: NavigationGoal) -> Result<(), NavigationError> {
        self.state.status = Status::Planning;

        if !self.planner.is_traversable(self.state.current_pose, &self.grid)
            || !self.planner.is_traversable(goal.pose, &self.grid)
        {
            self.state.status = Status::Failed;
            self.state.last_error = Some(NavigationError::InvalidGoal);
            self.state.is_navigating = false;
            tracing::warn!("start or goal pose is not traversable");
            return Err(NavigationError::InvalidGoal);
        }

        let path = self.planner.plan(self.state.current_pose, goal.pose, &self.grid);

        if path.is_empty() {
            self.state.status = Status::Failed;
            self.state.last_error = Some(NavigationError::NoPath);
            self.state.is_navigating = false;
            tracing::warn!("no path found to goal");
            return Err(NavigationError::NoPath);
        }

        self.state.current_goal = Some(goal);
        self.state.path = path;
        self.state.is_navigating = true;
        self.state.status = Status::Moving;
        tracing::debug!("planned path, navigating to goal");
        Ok(())
    }

    /// Integrate sensor readings into the map, and replan if the update
    /// invalidates the active path.
    pub fn update_map(&mut self, readings: &[SensorReading]) {
        let significant_change = self.grid.integrate(readings, self.state.current_pose);

        if significant_change && self.state.is_navigating {
            if let Some(goal) = self.state.current_goal {
                if !self.path_still_valid() {
                    self.replan_or_block(goal);
                }
            }
        }
    }

    fn path_still_valid(&self) -> bool {
        let spacing = self.grid.resolution() * REPLAN_VALIDATION_SPACING_FACTOR;
        let mut prev = self.state.current_pose;
        for waypoint in &self.state.path {
            let dist = prev.distance(waypoint);
            let steps = (dist / spacing).ceil().max(1.0) as usize;
            for i in 0..=steps {
                let t = i as f64 / steps as f64;
                let x = prev.x + (waypoint.x - prev.x) * t;
                let y = prev.y + (waypoint.y - prev.y) * t;
                match self.grid.world_to_grid(x, y) {
                    Some((row, col)) => {
                        let cell = self.grid.cell(row, col).unwrap();
                        if cell.occupied || cell.probability > 0.5 {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
            prev = *waypoint;
        }
        true
    }

    fn replan_or_block(&mut self, goal: NavigationGoal) {
        let path = self.planner.plan(self.state.current_pose, goal.pose, &self.grid);
        if path.is_empty() {
            self.state.is_navigating = false;
            self.state.path.clear();
            self.state.status = Status::Blocked;
            self.state.last_error = Some(NavigationError::PathBlocked);
            tracing::warn!("path blocked by map change, replanning failed");
        } else {
            self.state.path = path;
            tracing::debug!("replanned path after map change");
        }
    }

    /// Compute the next `(linear, angular)` velocity command.
    pub fn velocity_command(&mut self, readings: &[SensorReading]) -> (f64, f64) {
        if !self.state.is_navigating || self.state.path.is_empty() {
            return (0.0, 0.0);
        }

        let min_distance = readings.iter().map(|r| r.distance).fold(f64::INFINITY, f64::min);
        if min_distance < self.config.emergency_stop_distance {
            tracing::warn!("emergency stop: obstacle within {min_distance:.2}m");
            return (0.0, 0.0);
        }

        let target = self.state.path[0];
        let dx = target.x - self.state.current_pose.x;
        let dy = target.y - self.state.current_pose.y;
        let dist = (dx * dx + dy * dy).sqrt();
        let target_angle = dy.atan2(dx);

        let safe_angle =
            self.vfh
                .find_best_direction(readings, target_angle, Vector3::new(dx, 0.0, dy));

        if dist < self.config.waypoint_reach_distance {
            self.state.path.remove(0);
            if self.state.path.is_empty() {
                return (0.0, 0.0);
            }
        }

        let angle_diff = canonicalize(safe_angle - self.state.current_pose.theta);
        let speed_factor = ((min_distance - self.config.emergency_stop_distance) / 1.0).clamp(0.1, 1.0);
        let linear = (dist * 0.5)
            .min(self.config.max_linear_speed)
            .max(0.0)
            * speed_factor
            * angle_diff.cos();
        let linear = linear.max(0.0);
        let angular = (angle_diff * self.config.turn_gain).clamp(-1.0, 1.0);

        (linear, angular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(x: f64, y: f64, distance: f64, occupied: bool) -> SensorReading {
        SensorReading {
            point: Vector3::new(x, y, 0.0),
            distance,
            occupied,
            mesh_id: "test".to_string(),
            normal: None,
        }
    }

    #[test]
    fn new_controller_is_idle() {
        let controller = NavigationController::new();
        assert_eq!(controller.navigation_state().status, Status::Idle);
        assert!(!controller.navigation_state().is_navigating);
    }

    #[test]
    fn set_goal_in_open_space_starts_moving() {
        let mut controller = NavigationController::new();
        let goal = NavigationGoal::new(Pose::new(2.0, 0.0, 0.0));
        let result = controller.set_goal(goal);
        assert!(result.is_ok());
        assert_eq!(controller.navigation_state().status, Status::Moving);
        assert!(controller.navigation_state().is_navigating);
    }

    #[test]
    fn set_goal_inside_obstacle_fails() {
        let mut controller = NavigationController::new();
        let (row, col) = controller.grid.world_to_grid(2.0, 0.0).unwrap();
        for dr in -3..=3 {
            for dc in -3..=3 {
                controller.grid.set_occupied(row + dr, col + dc, 0.95);
            }
        }
        let goal = NavigationGoal::new(Pose::new(2.0, 0.0, 0.0));
        let result = controller.set_goal(goal);
        assert_eq!(result, Err(NavigationError::InvalidGoal));
        assert_eq!(controller.navigation_state().status, Status::Failed);
        assert!(!controller.navigation_state().is_navigating);
    }

    #[test]
    fn velocity_command_idle_is_zero() {
        let mut controller = NavigationController::new();
        let (linear, angular) = controller.velocity_command(&[]);
        assert_eq!((linear, angular), (0.0, 0.0));
    }

    #[test]
    fn velocity_command_emergency_stops_on_close_obstacle() {
        let mut controller = NavigationController::new();
        controller.set_goal(NavigationGoal::new(Pose::new(2.0, 0.0, 0.0))).unwrap();
        let (linear, angular) = controller.velocity_command(&[reading(0.2, 0.0, 0.2, true)]);
        assert_eq!((linear, angular), (0.0, 0.0));
        assert!(controller.navigation_state().is_navigating);
    }

    #[test]
    fn velocity_command_stays_within_bounds() {
        let mut controller = NavigationController::new();
        controller.set_goal(NavigationGoal::new(Pose::new(2.0, 0.0, 0.0))).unwrap();
        let (linear, angular) = controller.velocity_command(&[reading(5.0, 5.0, 7.0, true)]);
        assert!((0.0..=0.5).contains(&linear));
        assert!((-1.0..=1.0).contains(&angular));
    }

    #[test]
    fn update_pose_advances_estimate_and_last_position() {
        let mut controller = NavigationController::new();
        controller.update_pose(Vector3::new(0.5, 0.0, 0.0), Vector3::zero());
        assert_eq!(controller.last_position, Vector3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn empty_readings_leave_filter_weights_untouched() {
        let mut controller = NavigationController::new();
        let before: Vec<f64> = controller.filter.particles().iter().map(|p| p.weight).collect();
        controller.apply_readings(&[]);
        let after: Vec<f64> = controller.filter.particles().iter().map(|p| p.weight).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn update_map_replans_when_path_is_blocked() {
        let mut controller = NavigationController::new();
        controller.set_goal(NavigationGoal::new(Pose::new(5.0, 0.0, 0.0))).unwrap();
        assert!(controller.navigation_state().is_navigating);
        let path_before = controller.navigation_state().path.clone();

        let waypoint = path_before[0];
        let blocking = reading(
            waypoint.x,
            waypoint.y,
            waypoint.distance(&Pose::origin()),
            true,
        );
        controller.update_map(&[blocking]);

        let status = controller.navigation_state().status;
        assert!(status == Status::Moving || status == Status::Blocked);
        if status == Status::Moving {
            assert_ne!(controller.navigation_state().path, path_before);
        } else {
            assert!(controller.navigation_state().path.is_empty());
        }
    }
}
