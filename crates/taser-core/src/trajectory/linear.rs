//! Piecewise linear trajectory.

use super::{check_control_points, SupportWindow, Trajectory, TrajectoryError, UniformKnots};
use crate::params::ParamStore;
use crate::{Real, TimeInterval};
use nalgebra::DVector;

/// Linear interpolation between uniformly spaced control points.
///
/// Valid on `[t0, t0 + (n - 1) dt)`; two control points are active at any time and the
/// second derivative is identically zero.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTrajectory {
    dim: usize,
    knots: UniformKnots,
    params: ParamStore,
    locked: bool,
}

impl LinearTrajectory {
    pub fn from_control_points(
        dt: Real,
        t0: Real,
        control_points: &[DVector<Real>],
    ) -> Result<Self, TrajectoryError> {
        if control_points.len() < 2 {
            return Err(TrajectoryError::TooFewControlPoints {
                required: 2,
                got: control_points.len(),
            });
        }
        let dim = control_points[0].len();
        Ok(Self {
            dim,
            knots: UniformKnots::new(dt, t0)?,
            params: check_control_points(dim, control_points)?,
            locked: false,
        })
    }

    pub fn control_point(&self, index: usize) -> Option<DVector<Real>> {
        self.params.chunk(index, self.dim).ok()
    }
}

impl Trajectory for LinearTrajectory {
    fn valid_time(&self) -> TimeInterval {
        self.knots
            .valid_time(self.num_control_points().saturating_sub(1))
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn params(&self) -> &ParamStore {
        &self.params
    }

    fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.params
    }

    fn support_at(&self, t: Real) -> Result<SupportWindow, TrajectoryError> {
        let num_segments = self.num_control_points().saturating_sub(1);
        let (segment, u) = self.knots.locate(t, num_segments)?;
        let dt = self.knots.dt;
        Ok(SupportWindow::new(
            self.dim,
            vec![segment, segment + 1],
            vec![1.0 - u, u],
            vec![-1.0 / dt, 1.0 / dt],
            vec![0.0, 0.0],
        ))
    }
}
