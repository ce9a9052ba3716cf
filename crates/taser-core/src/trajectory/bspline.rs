//! Uniform cubic B-spline trajectory.

use super::{check_control_points, SupportWindow, Trajectory, TrajectoryError, UniformKnots};
use crate::params::{ParamHandle, ParamStore};
use crate::{Real, TimeInterval};
use nalgebra::DVector;

/// Cubic (order 4) uniform B-spline over `dim`-dimensional control points.
///
/// With `n` control points, spacing `dt` and start time `t0` the spline is valid on
/// `[t0, t0 + (n - 3) dt)`. Segment `i` is driven by control points `i..i + 4`.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBSpline {
    dim: usize,
    knots: UniformKnots,
    params: ParamStore,
    locked: bool,
}

impl UniformBSpline {
    pub const ORDER: usize = 4;

    /// Creates a spline without control points; it is valid nowhere until
    /// at least [`Self::ORDER`] control points are appended.
    pub fn new(dim: usize, dt: Real, t0: Real) -> Result<Self, TrajectoryError> {
        Ok(Self {
            dim,
            knots: UniformKnots::new(dt, t0)?,
            params: ParamStore::new(),
            locked: false,
        })
    }

    pub fn from_control_points(
        dt: Real,
        t0: Real,
        control_points: &[DVector<Real>],
    ) -> Result<Self, TrajectoryError> {
        let dim = control_points.first().map_or(0, |cp| cp.len());
        if control_points.len() < Self::ORDER {
            return Err(TrajectoryError::TooFewControlPoints {
                required: Self::ORDER,
                got: control_points.len(),
            });
        }
        Ok(Self {
            dim,
            knots: UniformKnots::new(dt, t0)?,
            params: check_control_points(dim, control_points)?,
            locked: false,
        })
    }

    /// Spline whose `n` control points all equal `value`.
    pub fn constant(
        dt: Real,
        t0: Real,
        n: usize,
        value: &DVector<Real>,
    ) -> Result<Self, TrajectoryError> {
        Self::from_control_points(dt, t0, &vec![value.clone(); n])
    }

    pub fn append_control_point(
        &mut self,
        cp: &DVector<Real>,
    ) -> Result<ParamHandle, TrajectoryError> {
        if cp.len() != self.dim {
            return Err(TrajectoryError::ControlPointDimension {
                expected: self.dim,
                got: cp.len(),
            });
        }
        Ok(self.params.push_chunk(cp.as_slice()))
    }

    pub fn control_point(&self, index: usize) -> Option<DVector<Real>> {
        self.params.chunk(index, self.dim).ok()
    }

    pub fn dt(&self) -> Real {
        self.knots.dt
    }

    pub fn t0(&self) -> Real {
        self.knots.t0
    }

    fn num_segments(&self) -> usize {
        self.num_control_points().saturating_sub(Self::ORDER - 1)
    }
}

/// Uniform cubic basis at `u` for the value and its first two derivatives.
fn cubic_basis(u: Real, dt: Real) -> [Vec<Real>; 3] {
    let u2 = u * u;
    let u3 = u2 * u;
    let v = 1.0 - u;
    let value = vec![
        v * v * v / 6.0,
        (3.0 * u3 - 6.0 * u2 + 4.0) / 6.0,
        (-3.0 * u3 + 3.0 * u2 + 3.0 * u + 1.0) / 6.0,
        u3 / 6.0,
    ];
    let first = vec![
        -v * v / 2.0 / dt,
        (3.0 * u2 - 4.0 * u) / 2.0 / dt,
        (-3.0 * u2 + 2.0 * u + 1.0) / 2.0 / dt,
        u2 / 2.0 / dt,
    ];
    let dt2 = dt * dt;
    let second = vec![v / dt2, (3.0 * u - 2.0) / dt2, (1.0 - 3.0 * u) / dt2, u / dt2];
    [value, first, second]
}

impl Trajectory for UniformBSpline {
    fn valid_time(&self) -> TimeInterval {
        self.knots.valid_time(self.num_segments())
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
        let (segment, u) = self.knots.locate(t, self.num_segments())?;
        let [value, first, second] = cubic_basis(u, self.knots.dt);
        Ok(SupportWindow::new(
            self.dim,
            (segment..segment + Self::ORDER).collect(),
            value,
            first,
            second,
        ))
    }
}
