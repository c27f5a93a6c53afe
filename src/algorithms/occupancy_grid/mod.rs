//! 2D Probabilistic Occupancy Grid
//!
//! Bayesian-style cell updates via ray casting, used by the planner as the
//! sole obstacle query (`inflated_traversable`) and by the controller as the
//! map that sensor integration writes into.
//!
//! # Features
//!
//! - Probabilistic occupancy per cell (`0.0` free .. `1.0` occupied, `0.5` unknown)
//! - Bresenham ray integration with a simple hit/decay policy
//! - Grid↔world coordinate conversion
//! - Inflated traversability queries for planning with a safety margin
//!
//! # Example
//!
//! ```rust
//! use horus_navstack::algorithms::occupancy_grid::OccupancyGrid;
//! use horus_navstack::controller::SensorReading;
//! use horus_navstack::types::{Pose, Vector3};
//!
//! let mut grid = OccupancyGrid::empty(30.0, 30.0, 0.05);
//! let reading = SensorReading {
//!     point: Vector3::new(2.0, 0.0, 0.0),
//!     distance: 2.0,
//!     occupied: true,
//!     mesh_id: "wall".to_string(),
//!     normal: None,
//! };
//! grid.integrate(&[reading], Pose::origin());
//! let (row, col) = grid.world_to_grid(2.0, 0.0).unwrap();
//! assert!(grid.cell(row, col).unwrap().occupied);
//! ```

use crate::controller::SensorReading;
use crate::types::Pose;

/// A single occupancy grid cell.
///
/// Invariants: `probability` is always in `[0, 1]`; `occupied` implies
/// `probability >= 0.5`. `probability == 0.5` means unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub occupied: bool,
    pub probability: f64,
    pub cost: f64,
    pub last_updated: u64,
}

impl GridCell {
    fn unknown() -> Self {
        Self {
            occupied: false,
            probability: 0.5,
            cost: 0.0,
            last_updated: 0,
        }
    }

    /// A cell is traversable iff it is not occupied and its probability has
    /// not crossed the occupied threshold.
    pub fn is_traversable(&self) -> bool {
        !self.occupied && self.probability <= 0.5
    }
}

/// 2D probabilistic occupancy grid.
///
/// Default construction yields a 30 m × 30 m grid at 0.05 m/cell (600 × 600
/// cells), centered on the origin (`origin = (-width_m/2, -height_m/2)`).
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    resolution: f64,
    cells: Vec<GridCell>,
    origin: (f64, f64),
    tick: u64,
}

/// Default inflation margin, in cells, used by [`OccupancyGrid::inflated_traversable`].
pub const DEFAULT_INFLATION_MARGIN: usize = 2;

const PROBABILITY_HIT: f64 = 0.95;
const PROBABILITY_DECAY: f64 = 0.10;
const SIGNIFICANT_CHANGE_THRESHOLD: f64 = 0.3;

impl OccupancyGrid {
    /// Create an empty grid spanning `width_m` × `height_m` meters at
    /// `resolution` meters per cell, centered on the world origin.
    pub fn empty(width_m: f64, height_m: f64, resolution: f64) -> Self {
        let width = (width_m / resolution).round() as usize;
        let height = (height_m / resolution).round() as usize;
        Self {
            width,
            height,
            resolution,
            cells: vec![GridCell::unknown(); width * height],
            origin: (-width_m / 2.0, -height_m / 2.0),
            tick: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    fn index(&self, row: i64, col: i64) -> Option<usize> {
        if row < 0 || col < 0 || row as usize >= self.height || col as usize >= self.width {
            None
        } else {
            Some(row as usize * self.width + col as usize)
        }
    }

    /// Read a cell by `(row, col)`. Returns `None` out of bounds — the
    /// planner treats an out-of-bounds read as non-traversable via this.
    pub fn cell(&self, row: i64, col: i64) -> Option<&GridCell> {
        self.index(row, col).map(|i| &self.cells[i])
    }

    /// World → grid: `col = floor((x - x0) / r)`, `row = floor((y - y0) / r)`.
    /// Returns `None` when the resulting cell is out of bounds.
    pub fn world_to_grid(&self, x: f64, y: f64) -> Option<(i64, i64)> {
        let col = ((x - self.origin.0) / self.resolution).floor() as i64;
        let row = ((y - self.origin.1) / self.resolution).floor() as i64;
        if row < 0 || col < 0 || row as usize >= self.height || col as usize >= self.width {
            None
        } else {
            Some((row, col))
        }
    }

    /// Grid → world, the center of the cell.
    pub fn grid_to_world(&self, row: i64, col: i64) -> (f64, f64) {
        let x = col as f64 * self.resolution + self.origin.0;
        let y = row as f64 * self.resolution + self.origin.1;
        (x, y)
    }

    /// True iff every cell in the `(2*margin+1)` square centered on
    /// `(row, col)` is both in bounds and traversable. This is the only
    /// obstacle query the planner uses.
    pub fn inflated_traversable(&self, row: i64, col: i64, margin: usize) -> bool {
        let margin = margin as i64;
        for dr in -margin..=margin {
            for dc in -margin..=margin {
                match self.cell(row + dr, col + dc) {
                    Some(c) if c.is_traversable() => continue,
                    _ => return false,
                }
            }
        }
        true
    }

    /// Integrate a batch of sensor readings via Bresenham ray casting.
    ///
    /// Only readings with `occupied == true` are traced; each ray runs from
    /// the robot's grid cell to the hit cell, marking every intermediate
    /// cell free (`probability = 0.10`) and the final cell occupied
    /// (`probability = 0.95`). Readings whose hit point falls outside the
    /// grid are skipped. Returns `true` if any touched cell's probability
    /// moved by more than 0.3 (a "significant change" the controller uses
    /// to decide whether to re-validate the active path).
    pub fn integrate(&mut self, readings: &[SensorReading], robot_pose: Pose) -> bool {
        let Some((robot_row, robot_col)) = self.world_to_grid(robot_pose.x, robot_pose.y) else {
            return false;
        };

        self.tick += 1;
        let mut significant_change = false;

        for reading in readings {
            if !reading.occupied {
                continue;
            }
            let Some((hit_row, hit_col)) = self.world_to_grid(reading.point.x, reading.point.y)
            else {
                continue;
            };

            let cells = bresenham_line(robot_row, robot_col, hit_row, hit_col);
            let last = cells.len() - 1;
            for (i, (row, col)) in cells.into_iter().enumerate() {
                let Some(idx) = self.index(row, col) else {
                    continue;
                };
                let new_probability = if i == last {
                    PROBABILITY_HIT
                } else {
                    PROBABILITY_DECAY
                };
                let old_probability = self.cells[idx].probability;
                if (old_probability - new_probability).abs() > SIGNIFICANT_CHANGE_THRESHOLD {
                    significant_change = true;
                }
                self.cells[idx].probability = new_probability;
                self.cells[idx].occupied = i == last;
                self.cells[idx].last_updated = self.tick;
            }
        }

        significant_change
    }

    /// Mark a single cell occupied directly, bypassing ray integration.
    /// Used by tests and by callers seeding a known map (e.g. a wall).
    pub fn set_occupied(&mut self, row: i64, col: i64, probability: f64) {
        if let Some(idx) = self.index(row, col) {
            self.tick += 1;
            self.cells[idx].occupied = true;
            self.cells[idx].probability = probability.clamp(0.0, 1.0);
            self.cells[idx].last_updated = self.tick;
        }
    }
}

/// Integer-only Bresenham line walk, inclusive of both endpoints.
///
/// Deterministic tie-breaking (the classic error-accumulator variant) so
/// repeated calls with the same endpoints always visit the same cells.
fn bresenham_line(r0: i64, c0: i64, r1: i64, c1: i64) -> Vec<(i64, i64)> {
    let mut cells = Vec::new();

    let dr = (r1 - r0).abs();
    let dc = (c1 - c0).abs();
    let sr = if r0 < r1 { 1 } else { -1 };
    let sc = if c0 < c1 { 1 } else { -1 };
    let mut err = dc - dr;

    let mut r = r0;
    let mut c = c0;

    loop {
        cells.push((r, c));
        if r == r1 && c == c1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dr {
            err -= dr;
            c += sc;
        }
        if e2 < dc {
            err += dc;
            r += sr;
        }
    }

    cells
}
