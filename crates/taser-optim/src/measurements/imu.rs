use super::{BindContext, Measurement};
use crate::binding::ResidualBinding;
use crate::error::BindError;
use crate::factors::accelerometer::AccelerometerFactor;
use crate::sensors::SensorBlockId;
use taser_core::{Real, Vec3};

/// Standard gravity in a z-up world frame.
pub fn standard_gravity() -> Vec3 {
    Vec3::new(0.0, 0.0, -9.80665)
}

/// Accelerometer sample expressed in a world-aligned body frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuMeasurement {
    pub t: Real,
    pub acceleration: Vec3,
    pub gravity: Vec3,
    /// Optional 3D bias block estimated alongside the trajectory.
    pub bias: Option<SensorBlockId>,
    pub weight: Real,
}

impl ImuMeasurement {
    pub fn new(t: Real, acceleration: Vec3) -> Self {
        Self {
            t,
            acceleration,
            gravity: standard_gravity(),
            bias: None,
            weight: 1.0,
        }
    }

    pub fn with_bias(mut self, bias: SensorBlockId) -> Self {
        self.bias = Some(bias);
        self
    }

    pub fn with_weight(mut self, weight: Real) -> Self {
        self.weight = weight;
        self
    }
}

impl Measurement for ImuMeasurement {
    fn timestamps(&self) -> Vec<Real> {
        vec![self.t]
    }

    fn bind(&self, ctx: &BindContext<'_>) -> Result<Vec<ResidualBinding>, BindError> {
        ctx.check_time(self.t)?;
        let window = ctx.window(self.t, Some(3))?;
        let mut params = BindContext::trajectory_refs(&window);
        if let Some(bias) = self.bias {
            params.extend(ctx.sensor_refs(bias, 3)?);
        }
        let factor = AccelerometerFactor {
            window,
            measured: self.acceleration,
            gravity: self.gravity,
            with_bias: self.bias.is_some(),
            weight: self.weight,
        };
        Ok(vec![ResidualBinding::new("imu", params, Box::new(factor))?])
    }
}
