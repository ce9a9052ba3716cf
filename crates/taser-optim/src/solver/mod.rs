//! Trust-region solve of the assembled problem.
//!
//! The [`TrustRegionMinimizer`] is backend-agnostic: it sees a [`LeastSquaresProblem`]
//! over the free parameters only and reports to a per-iteration hook, which is where
//! the estimator commits parameter updates and dispatches caller callbacks.

mod callback;
mod minimizer;

pub use callback::{
    CallbackReturn, IntoCallbackReturn, IterationCallback, IterationState, IterationSummary,
    WithState,
};
pub use minimizer::{MinimizerOutcome, TrustRegionMinimizer};

use crate::error::EstimatorError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use taser_core::Real;

/// Least squares problem over a dense vector of free parameters.
pub trait LeastSquaresProblem {
    fn num_params(&self) -> usize;
    fn num_residuals(&self) -> usize;
    fn residuals(&self, x: &DVector<Real>) -> DVector<Real>;
    fn residuals_and_jacobian(&self, x: &DVector<Real>) -> (DVector<Real>, DMatrix<Real>);
}

/// Solver options.
///
/// Every field has a default, so a partial JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Maximum number of iterations after the initial evaluation (iteration 0).
    pub max_iterations: usize,
    /// Converged when `|cost change| <= function_tolerance * cost`.
    pub function_tolerance: Real,
    /// Converged when the max-norm of the gradient drops to this value.
    pub gradient_tolerance: Real,
    /// Converged when `|step| <= parameter_tolerance * (|x| + parameter_tolerance)`.
    pub parameter_tolerance: Real,
    pub initial_trust_region_radius: Real,
    pub max_trust_region_radius: Real,
    /// The solve fails once the radius shrinks below this value.
    pub min_trust_region_radius: Real,
    /// Minimum ratio of actual to predicted cost decrease for accepting a step.
    pub min_relative_decrease: Real,
    /// Relative step for numeric differentiation of factors without a Jacobian.
    pub jacobian_step: Real,
    /// Log every iteration at info level instead of debug.
    pub verbose: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            function_tolerance: 1e-6,
            gradient_tolerance: 1e-10,
            parameter_tolerance: 1e-8,
            initial_trust_region_radius: 1e4,
            max_trust_region_radius: 1e16,
            min_trust_region_radius: 1e-32,
            min_relative_decrease: 1e-3,
            jacobian_step: 1e-6,
            verbose: false,
        }
    }
}

impl SolveOptions {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerances(mut self, function: Real, gradient: Real, parameter: Real) -> Self {
        self.function_tolerance = function;
        self.gradient_tolerance = gradient;
        self.parameter_tolerance = parameter;
        self
    }

    /// Checks the options before any iteration runs.
    pub fn validate(&self) -> Result<(), EstimatorError> {
        let non_negative = [
            ("function_tolerance", self.function_tolerance),
            ("gradient_tolerance", self.gradient_tolerance),
            ("parameter_tolerance", self.parameter_tolerance),
            ("min_relative_decrease", self.min_relative_decrease),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EstimatorError::InvalidOptions(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        let positive = [
            ("initial_trust_region_radius", self.initial_trust_region_radius),
            ("max_trust_region_radius", self.max_trust_region_radius),
            ("min_trust_region_radius", self.min_trust_region_radius),
            ("jacobian_step", self.jacobian_step),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EstimatorError::InvalidOptions(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if self.min_trust_region_radius > self.initial_trust_region_radius
            || self.initial_trust_region_radius > self.max_trust_region_radius
        {
            return Err(EstimatorError::InvalidOptions(format!(
                "trust region radii must satisfy min <= initial <= max, got {} / {} / {}",
                self.min_trust_region_radius,
                self.initial_trust_region_radius,
                self.max_trust_region_radius
            )));
        }
        Ok(())
    }
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationType {
    /// A function, gradient or parameter tolerance was met.
    Convergence,
    /// `max_iterations` was reached.
    NoConvergence,
    /// The minimizer could not make progress (non-finite cost, radius collapse).
    Failure,
    /// An iteration callback returned [`CallbackReturn::Abort`].
    UserAbort,
}

impl fmt::Display for TerminationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminationType::Convergence => "CONVERGENCE",
            TerminationType::NoConvergence => "NO_CONVERGENCE",
            TerminationType::Failure => "FAILURE",
            TerminationType::UserAbort => "USER_ABORT",
        };
        f.write_str(name)
    }
}
