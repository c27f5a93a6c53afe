//! Crate-wide error type
//!
//! Only [`crate::controller::NavigationController::set_goal`] returns
//! `Result<_, NavigationError>`. Transient conditions (emergency stop, a
//! single sensor failing, numerical degeneracy) are recovered locally and
//! folded into [`crate::controller::NavigationState`] instead; see
//! DESIGN.md for the propagation policy.

use thiserror::Error;

/// Failure surfaced by the navigation stack's public, fallible entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigationError {
    /// The planner exhausted its iteration budget or wall-clock timeout
    /// without finding a path.
    #[error("no path found to goal")]
    NoPath,

    /// `start` or `goal` maps to a cell that fails `inflated_traversable`.
    #[error("start or goal pose is not traversable")]
    InvalidGoal,

    /// A map change invalidated the active path and replanning also failed.
    #[error("path blocked by updated map, replanning failed")]
    PathBlocked,
}
