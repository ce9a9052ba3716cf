use super::{BindContext, Measurement};
use crate::binding::ResidualBinding;
use crate::error::BindError;
use crate::factors::window::WindowFactor;
use nalgebra::DVector;
use taser_core::{Derivative, Real, Vec3};

/// 3D position observation, e.g. from GNSS or motion capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionMeasurement {
    pub t: Real,
    pub position: Vec3,
    pub weight: Real,
}

impl PositionMeasurement {
    pub fn new(t: Real, position: Vec3) -> Self {
        Self {
            t,
            position,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: Real) -> Self {
        self.weight = weight;
        self
    }
}

impl Measurement for PositionMeasurement {
    fn timestamps(&self) -> Vec<Real> {
        vec![self.t]
    }

    fn bind(&self, ctx: &BindContext<'_>) -> Result<Vec<ResidualBinding>, BindError> {
        ctx.check_time(self.t)?;
        let window = ctx.window(self.t, Some(3))?;
        let params = BindContext::trajectory_refs(&window);
        let factor = WindowFactor {
            window,
            derivative: Derivative::Value,
            observed: DVector::from_column_slice(self.position.as_slice()),
            weight: self.weight,
        };
        Ok(vec![ResidualBinding::new("position", params, Box::new(factor))?])
    }
}
