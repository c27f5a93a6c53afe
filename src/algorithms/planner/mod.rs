//! RRT Path Planner
//!
//! Sampling-based path planning over an [`OccupancyGrid`], used by the
//! controller whenever the active path is missing or invalidated by a map
//! change.
//!
//! # Features
//!
//! - Goal-biased sampling with an inflated-traversability fallback
//! - Wall-clock timeout in addition to an iteration budget
//! - Segment validation against the grid's inflation margin
//! - Single-pass heading assignment for a drivable, headed polyline
//!
//! # Example
//!
//! ```rust
//! use horus_navstack::algorithms::occupancy_grid::OccupancyGrid;
//! use horus_navstack::algorithms::planner::PathPlanner;
//! use horus_navstack::types::Pose;
//!
//! let grid = OccupancyGrid::empty(10.0, 10.0, 0.1);
//! let planner = PathPlanner::new();
//! let path = planner.plan(Pose::new(-4.0, -4.0, 0.0), Pose::new(4.0, 4.0, 0.0), &grid);
//! assert!(!path.is_empty());
//! ```

use crate::algorithms::occupancy_grid::{OccupancyGrid, DEFAULT_INFLATION_MARGIN};
use crate::types::Pose;
use rand::Rng;
use std::time::{Duration, Instant};

/// Tunables for [`PathPlanner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerConfig {
    pub max_iterations: usize,
    pub step_size: f64,
    pub goal_bias: f64,
    pub timeout: Duration,
    pub occupancy_threshold: f64,
    pub inflation_margin: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            step_size: 0.5,
            goal_bias: 0.10,
            timeout: Duration::from_millis(2000),
            occupancy_threshold: 0.65,
            inflation_margin: DEFAULT_INFLATION_MARGIN,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RrtNode {
    x: f64,
    y: f64,
    parent: Option<usize>,
}

/// RRT planner over a probabilistic occupancy grid.
pub struct PathPlanner {
    config: PlannerConfig,
}

impl Default for PathPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PathPlanner {
    pub fn new() -> Self {
        Self::with_config(PlannerConfig::default())
    }

    pub fn with_config(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// True iff `pose` maps to a traversable cell with the configured
    /// inflation margin clear. Used by callers (the controller) to
    /// distinguish an untraversable start/goal from an exhausted search.
    pub fn is_traversable(&self, pose: Pose, map: &OccupancyGrid) -> bool {
        self.traversable_world(pose.x, pose.y, map)
    }

    /// Plan a path from `start` to `goal` over `map`.
    ///
    /// Returns an empty `Vec` if `start` or `goal` is untraversable, or if
    /// the iteration budget or wall-clock timeout is exhausted before the
    /// tree reaches the goal's neighborhood.
    pub fn plan(&self, start: Pose, goal: Pose, map: &OccupancyGrid) -> Vec<Pose> {
        if !self.traversable_world(start.x, start.y, map) || !self.traversable_world(goal.x, goal.y, map) {
            return Vec::new();
        }

        let mut rng = rand::thread_rng();
        let mut tree = vec![RrtNode {
            x: start.x,
            y: start.y,
            parent: None,
        }];

        let deadline = Instant::now() + self.config.timeout;
        let goal_threshold = 1.5 * self.config.step_size;

        for _ in 0..self.config.max_iterations {
            if Instant::now() >= deadline {
                break;
            }

            let (target_x, target_y) = if rng.gen::<f64>() < self.config.goal_bias {
                (goal.x, goal.y)
            } else {
                self.sample_free_point(&mut rng, map)
            };

            let nearest_idx = nearest_node(&tree, target_x, target_y);
            let nearest = tree[nearest_idx];
            let (new_x, new_y) = self.steer(nearest.x, nearest.y, target_x, target_y);

            if !self.segment_traversable(nearest.x, nearest.y, new_x, new_y, map) {
                continue;
            }

            let new_idx = tree.len();
            tree.push(RrtNode {
                x: new_x,
                y: new_y,
                parent: Some(nearest_idx),
            });

            let dist_to_goal = ((new_x - goal.x).powi(2) + (new_y - goal.y).powi(2)).sqrt();
            if dist_to_goal < goal_threshold {
                return build_path(&tree, new_idx, start, goal);
            }
        }

        Vec::new()
    }

    fn traversable_world(&self, x: f64, y: f64, map: &OccupancyGrid) -> bool {
        match map.world_to_grid(x, y) {
            Some((row, col)) => map.inflated_traversable(row, col, self.config.inflation_margin),
            None => false,
        }
    }

    fn sample_free_point(&self, rng: &mut impl Rng, map: &OccupancyGrid) -> (f64, f64) {
        let (origin_x, origin_y) = map.origin();
        let width_m = map.width() as f64 * map.resolution();
        let height_m = map.height() as f64 * map.resolution();

        for _ in 0..100 {
            let x = rng.gen_range(origin_x..origin_x + width_m);
            let y = rng.gen_range(origin_y..origin_y + height_m);
            if self.traversable_world(x, y, map) {
                return (x, y);
            }
        }

        let x = rng.gen_range(origin_x..origin_x + width_m);
        let y = rng.gen_range(origin_y..origin_y + height_m);
        (x, y)
    }

    fn steer(&self, from_x: f64, from_y: f64, to_x: f64, to_y: f64) -> (f64, f64) {
        let dist = ((to_x - from_x).powi(2) + (to_y - from_y).powi(2)).sqrt();
        if dist < self.config.step_size {
            return (to_x, to_y);
        }
        let heading = (to_y - from_y).atan2(to_x - from_x);
        (
            from_x + self.config.step_size * heading.cos(),
            from_y + self.config.step_size * heading.sin(),
        )
    }

    fn segment_traversable(&self, from_x: f64, from_y: f64, to_x: f64, to_y: f64, map: &OccupancyGrid) -> bool {
        let dist = ((to_x - from_x).powi(2) + (to_y - from_y).powi(2)).sqrt();
        let samples = (dist / (map.resolution() / 4.0)).ceil() as usize + 1;

        for i in 0..=samples {
            let t = i as f64 / samples as f64;
            let x = from_x + (to_x - from_x) * t;
            let y = from_y + (to_y - from_y) * t;
            if !self.traversable_world(x, y, map) {
                return false;
            }
        }
        true
    }
}

fn nearest_node(tree: &[RrtNode], x: f64, y: f64) -> usize {
    tree.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let dist_a = (a.x - x).powi(2) + (a.y - y).powi(2);
            let dist_b = (b.x - x).powi(2) + (b.y - y).powi(2);
            dist_a.partial_cmp(&dist_b).unwrap()
        })
        .map(|(idx, _)| idx)
        .unwrap()
}

/// Walk parents back to the root, reverse, prepend the verbatim start and
/// append the verbatim goal, then assign each pose a heading from its
/// outgoing segment (the last pose inherits the final segment's heading).
fn build_path(tree: &[RrtNode], goal_idx: usize, start: Pose, goal: Pose) -> Vec<Pose> {
    let mut waypoints = Vec::new();
    let mut current = Some(goal_idx);
    while let Some(idx) = current {
        waypoints.push((tree[idx].x, tree[idx].y));
        current = tree[idx].parent;
    }
    waypoints.reverse();

    let mut points = Vec::with_capacity(waypoints.len() + 2);
    points.push((start.x, start.y));
    points.extend(waypoints);
    points.push((goal.x, goal.y));

    let mut path = Vec::with_capacity(points.len());
    for i in 0..points.len() - 1 {
        let (x0, y0) = points[i];
        let (x1, y1) = points[i + 1];
        let heading = (y1 - y0).atan2(x1 - x0);
        path.push(Pose::new(x0, y0, heading));
    }
    let last_heading = path.last().map(|p| p.theta).unwrap_or(0.0);
    let (last_x, last_y) = *points.last().unwrap();
    path.push(Pose::new(last_x, last_y, last_heading));

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid() -> OccupancyGrid {
        OccupancyGrid::empty(20.0, 20.0, 0.2)
    }

    #[test]
    fn plans_a_path_in_open_space() {
        let grid = open_grid();
        let planner = PathPlanner::new();
        let path = planner.plan(Pose::new(-8.0, -8.0, 0.0), Pose::new(8.0, 8.0, 0.0), &grid);
        assert!(!path.is_empty());
    }

    #[test]
    fn path_starts_and_ends_verbatim() {
        let grid = open_grid();
        let planner = PathPlanner::new();
        let start = Pose::new(-8.0, -8.0, 0.0);
        let goal = Pose::new(8.0, 8.0, 0.0);
        let path = planner.plan(start, goal, &grid);
        assert!(!path.is_empty());
        assert_eq!((path[0].x, path[0].y), (start.x, start.y));
        let last = path.last().unwrap();
        assert_eq!((last.x, last.y), (goal.x, goal.y));
    }

    #[test]
    fn rejects_untraversable_start() {
        let mut grid = open_grid();
        let (row, col) = grid.world_to_grid(-8.0, -8.0).unwrap();
        grid.set_occupied(row, col, 0.95);
        let planner = PathPlanner::new();
        let path = planner.plan(Pose::new(-8.0, -8.0, 0.0), Pose::new(8.0, 8.0, 0.0), &grid);
        assert!(path.is_empty());
    }

    #[test]
    fn rejects_untraversable_goal() {
        let mut grid = open_grid();
        let (row, col) = grid.world_to_grid(8.0, 8.0).unwrap();
        grid.set_occupied(row, col, 0.95);
        let planner = PathPlanner::new();
        let path = planner.plan(Pose::new(-8.0, -8.0, 0.0), Pose::new(8.0, 8.0, 0.0), &grid);
        assert!(path.is_empty());
    }

    #[test]
    fn path_avoids_a_wall() {
        let mut grid = open_grid();
        for col in 0..grid.width() as i64 {
            grid.set_occupied(50, col, 0.95);
        }
        let planner = PathPlanner::with_config(PlannerConfig {
            max_iterations: 5000,
            ..Default::default()
        });
        let path = planner.plan(Pose::new(-8.0, -8.0, 0.0), Pose::new(8.0, 8.0, 0.0), &grid);
        if !path.is_empty() {
            for pose in &path {
                let (row, col) = grid.world_to_grid(pose.x, pose.y).unwrap();
                assert!(grid.cell(row, col).unwrap().is_traversable());
            }
        }
    }

    #[test]
    fn headings_point_along_each_segment() {
        let grid = open_grid();
        let planner = PathPlanner::new();
        let path = planner.plan(Pose::new(-8.0, -8.0, 0.0), Pose::new(8.0, 8.0, 0.0), &grid);
        assert!(!path.is_empty());
        for window in path.windows(2) {
            let expected = (window[1].y - window[0].y).atan2(window[1].x - window[0].x);
            assert!((window[0].theta - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn goal_inside_obstacle_returns_empty_path() {
        let mut grid = open_grid();
        let (row, col) = grid.world_to_grid(8.0, 8.0).unwrap();
        for dr in -3..=3 {
            for dc in -3..=3 {
                grid.set_occupied(row + dr, col + dc, 0.95);
            }
        }
        let planner = PathPlanner::new();
        let path = planner.plan(Pose::new(-8.0, -8.0, 0.0), Pose::new(8.0, 8.0, 0.0), &grid);
        assert!(path.is_empty());
    }
}
