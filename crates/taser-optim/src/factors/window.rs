use super::ResidualFactor;
use nalgebra::{DMatrix, DVector};
use taser_core::{Derivative, Real, SupportWindow};

/// `weight * (x^(d)(t) - observed)` for a fixed support window.
#[derive(Debug, Clone)]
pub struct WindowFactor {
    pub window: SupportWindow,
    pub derivative: Derivative,
    pub observed: DVector<Real>,
    pub weight: Real,
}

impl ResidualFactor for WindowFactor {
    fn residual_dim(&self) -> usize {
        self.observed.len()
    }

    fn num_params(&self) -> usize {
        self.window.num_params()
    }

    fn residual(&self, params: &[Real]) -> DVector<Real> {
        (self.window.combine(params, self.derivative) - &self.observed) * self.weight
    }

    fn jacobian(&self, _params: &[Real]) -> Option<DMatrix<Real>> {
        Some(self.window.jacobian(self.derivative) * self.weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::numeric_jacobian;

    #[test]
    fn analytic_jacobian_matches_numeric() {
        let window = SupportWindow::new(
            2,
            vec![0, 1],
            vec![0.25, 0.75],
            vec![-2.0, 2.0],
            vec![0.0, 0.0],
        );
        let factor = WindowFactor {
            window,
            derivative: Derivative::First,
            observed: DVector::from_vec(vec![1.0, -1.0]),
            weight: 3.0,
        };
        let params = [0.1, 0.2, 0.3, 0.4];
        let r = factor.residual(&params);
        assert!((r[0] - 3.0 * (2.0 * (0.3 - 0.1) - 1.0)).abs() < 1e-12);

        let analytic = factor.jacobian(&params).unwrap();
        let numeric = numeric_jacobian(&factor, &params, 1e-6);
        assert!((analytic - numeric).abs().max() < 1e-6);
    }
}
