use super::{BindContext, Measurement};
use crate::binding::ResidualBinding;
use crate::error::BindError;
use crate::factors::window::WindowFactor;
use nalgebra::DVector;
use taser_core::{Derivative, Real};

/// Direct observation of the trajectory state, whatever its dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleMeasurement {
    pub t: Real,
    pub value: DVector<Real>,
    pub weight: Real,
}

impl SimpleMeasurement {
    pub fn new(t: Real, value: DVector<Real>) -> Self {
        Self {
            t,
            value,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: Real) -> Self {
        self.weight = weight;
        self
    }
}

impl Measurement for SimpleMeasurement {
    fn timestamps(&self) -> Vec<Real> {
        vec![self.t]
    }

    fn bind(&self, ctx: &BindContext<'_>) -> Result<Vec<ResidualBinding>, BindError> {
        ctx.check_time(self.t)?;
        let window = ctx.window(self.t, Some(self.value.len()))?;
        let params = BindContext::trajectory_refs(&window);
        let factor = WindowFactor {
            window,
            derivative: Derivative::Value,
            observed: self.value.clone(),
            weight: self.weight,
        };
        Ok(vec![ResidualBinding::new("simple", params, Box::new(factor))?])
    }
}
