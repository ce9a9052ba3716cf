//! Core types for continuous-time trajectory estimation.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec3`, `Pt3`, ...),
//! - closed-open time intervals ([`TimeInterval`]),
//! - the scalar parameter arena shared by trajectories and solvers ([`ParamStore`]),
//! - the [`Trajectory`] collaborator trait with uniform B-spline and piecewise linear
//!   implementations.
//!
//! Trajectories here are linear in their control points: the state at time `t` is a
//! weighted sum of the control points in a small support window. Residuals built on top
//! of a [`SupportWindow`] therefore only ever touch the parameters that influence `t`.

/// Linear algebra type aliases.
pub mod math;
/// Scalar parameter arena with stable handles.
pub mod params;
/// Time intervals.
pub mod time;
/// Trajectory trait and concrete trajectories.
pub mod trajectory;

pub use math::*;
pub use params::{ParamHandle, ParamStore};
pub use time::TimeInterval;
pub use trajectory::{
    Derivative, LinearTrajectory, SupportWindow, Trajectory, TrajectoryError, UniformBSpline,
};
