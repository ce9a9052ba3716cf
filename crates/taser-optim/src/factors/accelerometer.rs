use super::ResidualFactor;
use nalgebra::{DMatrix, DVector};
use taser_core::{Derivative, Real, SupportWindow, Vec3};

/// Accelerometer residual in a world-aligned body frame.
///
/// `weight * (x''(t) - gravity + bias - measured)`. With `with_bias` the last three
/// local parameters are the bias; otherwise the bias is zero.
#[derive(Debug, Clone)]
pub struct AccelerometerFactor {
    pub window: SupportWindow,
    pub measured: Vec3,
    pub gravity: Vec3,
    pub with_bias: bool,
    pub weight: Real,
}

impl ResidualFactor for AccelerometerFactor {
    fn residual_dim(&self) -> usize {
        3
    }

    fn num_params(&self) -> usize {
        self.window.num_params() + if self.with_bias { 3 } else { 0 }
    }

    fn residual(&self, params: &[Real]) -> DVector<Real> {
        let n = self.window.num_params();
        let acc = self.window.combine(&params[..n], Derivative::Second);
        let mut r = DVector::from_fn(3, |k, _| acc[k] - self.gravity[k] - self.measured[k]);
        if self.with_bias {
            for k in 0..3 {
                r[k] += params[n + k];
            }
        }
        r * self.weight
    }

    fn jacobian(&self, _params: &[Real]) -> Option<DMatrix<Real>> {
        let n = self.window.num_params();
        let mut j = DMatrix::zeros(3, self.num_params());
        j.view_mut((0, 0), (3, n))
            .copy_from(&self.window.jacobian(Derivative::Second));
        if self.with_bias {
            j.view_mut((0, n), (3, 3)).fill_with_identity();
        }
        Some(j * self.weight)
    }
}
