//! Pure computational algorithms for navigation
//!
//! Contains no I/O and no shared mutable state beyond what each struct owns;
//! the controller module is the only thing that wires these together and
//! performs logging.
//!
//! # Available Algorithms
//!
//! - **occupancy_grid**: 2D probabilistic occupancy grid with ray-cast integration
//! - **particle_filter**: Monte-Carlo localization
//! - **planner**: RRT path planning over the occupancy grid
//! - **vfh**: Vector Field Histogram reactive obstacle avoidance

pub mod occupancy_grid;
pub mod particle_filter;
pub mod planner;
pub mod vfh;
