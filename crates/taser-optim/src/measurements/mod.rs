//! Timestamped measurements and their binding to trajectory parameters.
//!
//! A [`Measurement`] knows the times it constrains and how to produce residual bindings
//! against a trajectory. Binding is pure: it reads the trajectory's support windows and
//! lock-independent layout, never its values, and may be repeated safely.
//!
//! # Available Measurements
//!
//! - [`SimpleMeasurement`] - observes the full trajectory state
//! - [`PositionMeasurement`] - observes a 3D position
//! - [`CameraMeasurement`] - pixel observation of a known landmark
//! - [`ImuMeasurement`] - accelerometer sample, optionally with an estimated bias

mod camera;
mod imu;
mod position;
mod simple;

pub use camera::CameraMeasurement;
pub use imu::{standard_gravity, ImuMeasurement};
pub use position::PositionMeasurement;
pub use simple::SimpleMeasurement;

use crate::binding::{ParamRef, ResidualBinding};
use crate::error::BindError;
use crate::sensors::{SensorBlockId, SensorParams};
use taser_core::{Real, SupportWindow, Trajectory, TrajectoryError};

/// Everything a measurement may consult while binding.
pub struct BindContext<'a> {
    trajectory: &'a dyn Trajectory,
    sensors: &'a SensorParams,
}

impl<'a> BindContext<'a> {
    pub fn new(trajectory: &'a dyn Trajectory, sensors: &'a SensorParams) -> Self {
        Self {
            trajectory,
            sensors,
        }
    }

    pub fn trajectory(&self) -> &'a dyn Trajectory {
        self.trajectory
    }

    pub fn sensors(&self) -> &'a SensorParams {
        self.sensors
    }

    pub fn check_time(&self, t: Real) -> Result<(), BindError> {
        let valid = self.trajectory.valid_time();
        if valid.contains(t) {
            Ok(())
        } else {
            Err(TrajectoryError::OutsideValidTime { t, valid }.into())
        }
    }

    /// Support window at `t`, requiring a trajectory of dimension `dim` if given.
    pub fn window(&self, t: Real, dim: Option<usize>) -> Result<SupportWindow, BindError> {
        if let Some(expected) = dim {
            let got = self.trajectory.dim();
            if got != expected {
                return Err(BindError::DimensionMismatch { expected, got });
            }
        }
        Ok(self.trajectory.support_at(t)?)
    }

    pub fn trajectory_refs(window: &SupportWindow) -> Vec<ParamRef> {
        window
            .handles()
            .into_iter()
            .map(ParamRef::Trajectory)
            .collect()
    }

    /// All components of a sensor block, which must have dimension `dim`.
    pub fn sensor_refs(&self, id: SensorBlockId, dim: usize) -> Result<Vec<ParamRef>, BindError> {
        let block = self
            .sensors
            .get(id)
            .ok_or(BindError::UnknownSensorBlock(id))?;
        if block.values.len() != dim {
            return Err(BindError::DimensionMismatch {
                expected: dim,
                got: block.values.len(),
            });
        }
        Ok((0..dim).map(|i| ParamRef::Sensor(id, i)).collect())
    }
}

pub trait Measurement {
    /// Times constrained by this measurement.
    fn timestamps(&self) -> Vec<Real>;

    /// Produces the residual bindings of this measurement.
    ///
    /// Fails if any timestamp lies outside the trajectory's valid interval.
    fn bind(&self, ctx: &BindContext<'_>) -> Result<Vec<ResidualBinding>, BindError>;
}

impl<M: Measurement + ?Sized> Measurement for Box<M> {
    fn timestamps(&self) -> Vec<Real> {
        (**self).timestamps()
    }

    fn bind(&self, ctx: &BindContext<'_>) -> Result<Vec<ResidualBinding>, BindError> {
        (**self).bind(ctx)
    }
}
