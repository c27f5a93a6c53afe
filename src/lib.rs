//! # horus_navstack
//!
//! Autonomous 2D navigation stack for a mobile robot on a ground plane: an
//! occupancy grid with Bayesian-style ray-cast integration, a Monte-Carlo
//! particle filter localizer, an RRT path planner, and a Vector Field
//! Histogram reactive avoider, orchestrated by a single navigation
//! controller.
//!
//! ## Structure
//!
//! ```text
//! horus_navstack/
//! ── types          # Poses, vectors, angle utilities
//! ── error          # Crate-wide NavigationError
//! ── algorithms/
//! │  ── occupancy_grid
//! │  ── particle_filter
//! │  ── planner
//! │  └─ vfh
//! └─ controller      # Orchestrates the above into a control loop
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use horus_navstack::controller::{NavigationController, NavigationGoal};
//! use horus_navstack::types::{Pose, Vector3};
//!
//! let mut controller = NavigationController::new();
//! controller.update_pose(Vector3::zero(), Vector3::zero());
//! controller.set_goal(NavigationGoal::new(Pose::new(2.0, 0.0, 0.0))).unwrap();
//! let (linear, angular) = controller.velocity_command(&[]);
//! assert!((0.0..=0.5).contains(&linear));
//! ```

pub mod algorithms;
pub mod controller;
pub mod error;
pub mod types;

/// Prelude module for convenient imports.
///
/// # Usage
/// ```rust
/// use horus_navstack::prelude::*;
///
/// let mut controller = NavigationController::new();
/// let _ = controller;
/// ```
pub mod prelude {
    pub use crate::algorithms::occupancy_grid::{GridCell, OccupancyGrid};
    pub use crate::algorithms::particle_filter::{Particle, ParticleFilter, ParticleFilterConfig};
    pub use crate::algorithms::planner::{PathPlanner, PlannerConfig};
    pub use crate::algorithms::vfh::{Vfh, VfhConfig};
    pub use crate::controller::{
        ControllerConfig, GoalTolerance, NavigationController, NavigationGoal, NavigationState,
        Sensor, SensorReading, Status,
    };
    pub use crate::error::NavigationError;
    pub use crate::types::{angle_diff, canonicalize, Pose, Vector3};
}
