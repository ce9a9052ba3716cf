//! Residual factor implementations.
//!
//! Factors compute the difference between an observation and the prediction made from
//! a small local parameter vector: the trajectory support window of the measurement
//! time, optionally followed by sensor block components. All factors here are built on
//! a [`taser_core::SupportWindow`], so the trajectory part of the prediction is a
//! weighted sum of control points.
//!
//! # Available Factors
//!
//! - [`window::WindowFactor`] - state (or derivative) equals an observed vector
//! - [`accelerometer::AccelerometerFactor`] - specific force with optional bias
//! - [`reprojection::ReprojectionFactor`] - pinhole projection of a known landmark
//!
//! Factors that return `None` from [`ResidualFactor::jacobian`] are differentiated
//! numerically by the caller.

pub mod accelerometer;
pub mod reprojection;
pub mod window;

use nalgebra::{DMatrix, DVector};
use std::fmt;
use taser_core::Real;

pub trait ResidualFactor: fmt::Debug {
    fn residual_dim(&self) -> usize;
    /// Length of the local parameter vector.
    fn num_params(&self) -> usize;
    fn residual(&self, params: &[Real]) -> DVector<Real>;

    /// Analytic Jacobian (`residual_dim x num_params`), if available.
    fn jacobian(&self, _params: &[Real]) -> Option<DMatrix<Real>> {
        None
    }
}
