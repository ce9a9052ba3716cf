//! The trajectory collaborator interface.
//!
//! A [`Trajectory`] maps time to a `dim`-dimensional state. Every implementation in this
//! crate is linear in its control points, which lets the estimator bind a measurement
//! to exactly the scalar parameters active at the measurement time (the
//! [`SupportWindow`]) together with the basis weights needed to evaluate it.

mod bspline;
mod linear;

pub use bspline::UniformBSpline;
pub use linear::LinearTrajectory;

use crate::params::{ParamHandle, ParamStore};
use crate::{Real, TimeInterval};
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    #[error("time {t} is outside the valid interval {valid}")]
    OutsideValidTime { t: Real, valid: TimeInterval },
    #[error("knot spacing must be positive and finite, got {0}")]
    InvalidKnotSpacing(Real),
    #[error("need at least {required} control points, got {got}")]
    TooFewControlPoints { required: usize, got: usize },
    #[error("control point has dimension {got}, expected {expected}")]
    ControlPointDimension { expected: usize, got: usize },
}

/// Time derivative order of a trajectory evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Derivative {
    Value,
    First,
    Second,
}

impl Derivative {
    fn index(self) -> usize {
        match self {
            Derivative::Value => 0,
            Derivative::First => 1,
            Derivative::Second => 2,
        }
    }
}

/// Control points active at one time instant and their basis weights.
///
/// The state is `x(t) = sum_i w_i * c_i`, where `c_i` is the `i`-th listed control point.
/// Weights are stored for the value and the first two time derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportWindow {
    pub dim: usize,
    pub control_points: Vec<usize>,
    weights: [Vec<Real>; 3],
}

impl SupportWindow {
    pub fn new(
        dim: usize,
        control_points: Vec<usize>,
        value: Vec<Real>,
        first: Vec<Real>,
        second: Vec<Real>,
    ) -> Self {
        debug_assert_eq!(value.len(), control_points.len());
        debug_assert_eq!(first.len(), control_points.len());
        debug_assert_eq!(second.len(), control_points.len());
        Self {
            dim,
            control_points,
            weights: [value, first, second],
        }
    }

    pub fn weights(&self, derivative: Derivative) -> &[Real] {
        &self.weights[derivative.index()]
    }

    /// Number of scalar parameters in the window.
    pub fn num_params(&self) -> usize {
        self.control_points.len() * self.dim
    }

    /// Scalar parameter handles, control point by control point.
    pub fn handles(&self) -> Vec<ParamHandle> {
        self.control_points
            .iter()
            .flat_map(|&cp| ParamStore::chunk_handles(cp, self.dim))
            .collect()
    }

    /// Evaluates the window given the local parameter values (ordered as [`Self::handles`]).
    pub fn combine(&self, local: &[Real], derivative: Derivative) -> DVector<Real> {
        debug_assert_eq!(local.len(), self.num_params());
        let mut out = DVector::zeros(self.dim);
        for (i, w) in self.weights(derivative).iter().enumerate() {
            for k in 0..self.dim {
                out[k] += w * local[i * self.dim + k];
            }
        }
        out
    }

    /// Jacobian of [`Self::combine`] with respect to the local parameters (`dim x num_params`).
    pub fn jacobian(&self, derivative: Derivative) -> DMatrix<Real> {
        let mut j = DMatrix::zeros(self.dim, self.num_params());
        for (i, w) in self.weights(derivative).iter().enumerate() {
            for k in 0..self.dim {
                j[(k, i * self.dim + k)] = *w;
            }
        }
        j
    }
}

/// A time-parameterized state function backed by a [`ParamStore`].
pub trait Trajectory {
    /// Interval on which the trajectory is defined.
    fn valid_time(&self) -> TimeInterval;
    fn is_locked(&self) -> bool;
    fn set_locked(&mut self, locked: bool);
    /// Dimension of the state (and of every control point).
    fn dim(&self) -> usize;
    fn params(&self) -> &ParamStore;
    fn params_mut(&mut self) -> &mut ParamStore;

    /// Minimal set of control points influencing the state at `t`.
    fn support_at(&self, t: Real) -> Result<SupportWindow, TrajectoryError>;

    fn parameters_active_at(&self, t: Real) -> Result<Vec<ParamHandle>, TrajectoryError> {
        Ok(self.support_at(t)?.handles())
    }

    fn evaluate(&self, t: Real, derivative: Derivative) -> Result<DVector<Real>, TrajectoryError> {
        let window = self.support_at(t)?;
        let local: Vec<Real> = window
            .handles()
            .into_iter()
            .map(|h| self.params().get(h).unwrap_or(Real::NAN))
            .collect();
        Ok(window.combine(&local, derivative))
    }

    fn num_control_points(&self) -> usize {
        if self.dim() == 0 {
            0
        } else {
            self.params().len() / self.dim()
        }
    }
}

/// Uniformly spaced knots shared by the concrete trajectories.
#[derive(Debug, Clone, Copy, PartialEq)]
struct UniformKnots {
    dt: Real,
    t0: Real,
}

impl UniformKnots {
    fn new(dt: Real, t0: Real) -> Result<Self, TrajectoryError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(TrajectoryError::InvalidKnotSpacing(dt));
        }
        Ok(Self { dt, t0 })
    }

    fn valid_time(&self, num_segments: usize) -> TimeInterval {
        TimeInterval::new(self.t0, self.t0 + self.dt * num_segments as Real)
    }

    /// Segment index and normalized position `u in [0, 1)` of `t`.
    fn locate(&self, t: Real, num_segments: usize) -> Result<(usize, Real), TrajectoryError> {
        let valid = self.valid_time(num_segments);
        if num_segments == 0 || !valid.contains(t) {
            return Err(TrajectoryError::OutsideValidTime { t, valid });
        }
        let s = (t - self.t0) / self.dt;
        // rounding can push s onto the end knot of the last segment
        let segment = (s.floor() as usize).min(num_segments - 1);
        Ok((segment, s - segment as Real))
    }
}

fn check_control_points(
    dim: usize,
    control_points: &[DVector<Real>],
) -> Result<ParamStore, TrajectoryError> {
    let mut store = ParamStore::new();
    for cp in control_points {
        if cp.len() != dim {
            return Err(TrajectoryError::ControlPointDimension {
                expected: dim,
                got: cp.len(),
            });
        }
        store.push_chunk(cp.as_slice());
    }
    Ok(store)
}
