//! Residual bindings: a residual factor coupled to the parameters it reads.

use crate::error::BindError;
use crate::factors::ResidualFactor;
use crate::sensors::SensorBlockId;
use nalgebra::{DMatrix, DVector};
use taser_core::{ParamHandle, Real};

/// Identity of one scalar parameter referenced by a residual.
///
/// Identity, not value, is what the problem assembler de-duplicates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamRef {
    /// Slot in the trajectory's parameter store.
    Trajectory(ParamHandle),
    /// Component `idx` of an estimator-owned sensor block.
    Sensor(SensorBlockId, usize),
}

/// A residual factor bound to the parameters active at its measurement time.
///
/// The parameter list is fixed at bind time; the order matches the factor's expected
/// local parameter layout.
#[derive(Debug)]
pub struct ResidualBinding {
    kind: &'static str,
    params: Vec<ParamRef>,
    factor: Box<dyn ResidualFactor>,
}

impl ResidualBinding {
    pub fn new(
        kind: &'static str,
        params: Vec<ParamRef>,
        factor: Box<dyn ResidualFactor>,
    ) -> Result<Self, BindError> {
        if factor.residual_dim() == 0 {
            return Err(BindError::EmptyMeasurement);
        }
        if params.len() != factor.num_params() {
            return Err(BindError::DimensionMismatch {
                expected: factor.num_params(),
                got: params.len(),
            });
        }
        Ok(Self {
            kind,
            params,
            factor,
        })
    }

    /// Short name of the measurement modality, used in reports.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn params(&self) -> &[ParamRef] {
        &self.params
    }

    pub fn residual_dim(&self) -> usize {
        self.factor.residual_dim()
    }

    /// Residual block of exactly `residual_dim()` rows.
    ///
    /// A factor returning the wrong number of rows yields a NaN block, which the
    /// minimizer treats as a failed evaluation.
    pub fn residual(&self, local: &[Real]) -> DVector<Real> {
        let r = self.factor.residual(local);
        let dim = self.residual_dim();
        if r.len() != dim {
            log::warn!(
                "{} factor returned {} residuals, declared {}",
                self.kind,
                r.len(),
                dim
            );
            return DVector::from_element(dim, Real::NAN);
        }
        r
    }

    /// Analytic Jacobian if the factor provides one, central differences otherwise.
    ///
    /// Always `residual_dim() x params().len()`; a misshaped analytic Jacobian becomes NaN.
    pub fn jacobian(&self, local: &[Real], step: Real) -> DMatrix<Real> {
        let shape = (self.residual_dim(), self.params.len());
        let j = match self.factor.jacobian(local) {
            Some(j) => j,
            None => numeric_jacobian(self.factor.as_ref(), local, step),
        };
        if j.shape() != shape {
            log::warn!(
                "{} factor returned a {:?} jacobian, expected {:?}",
                self.kind,
                j.shape(),
                shape
            );
            return DMatrix::from_element(shape.0, shape.1, Real::NAN);
        }
        j
    }
}

/// Central-difference Jacobian with a step relative to each parameter's magnitude.
pub(crate) fn numeric_jacobian(factor: &dyn ResidualFactor, local: &[Real], step: Real) -> DMatrix<Real> {
    let mut j = DMatrix::zeros(factor.residual_dim(), local.len());
    let mut shifted = local.to_vec();
    for col in 0..local.len() {
        let h = step * local[col].abs().max(1.0);
        shifted[col] = local[col] + h;
        let plus = factor.residual(&shifted);
        shifted[col] = local[col] - h;
        let minus = factor.residual(&shifted);
        shifted[col] = local[col];
        if plus.len() != j.nrows() || minus.len() != j.nrows() {
            return DMatrix::from_element(j.nrows(), local.len(), Real::NAN);
        }
        j.set_column(col, &((plus - minus) / (2.0 * h)));
    }
    j
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Quadratic;

    impl ResidualFactor for Quadratic {
        fn residual_dim(&self) -> usize {
            2
        }

        fn num_params(&self) -> usize {
            2
        }

        fn residual(&self, p: &[Real]) -> DVector<Real> {
            DVector::from_vec(vec![p[0] * p[0], p[0] * p[1]])
        }
    }

    #[test]
    fn numeric_jacobian_matches_derivative() {
        let j = numeric_jacobian(&Quadratic, &[3.0, -2.0], 1e-6);
        let expected = [[6.0, 0.0], [-2.0, 3.0]];
        for r in 0..2 {
            for c in 0..2 {
                assert!(
                    (j[(r, c)] - expected[r][c]).abs() < 1e-6,
                    "J[{},{}] = {}",
                    r,
                    c,
                    j[(r, c)]
                );
            }
        }
    }

    /// Declares one residual but returns two.
    #[derive(Debug)]
    struct Overlong;

    impl ResidualFactor for Overlong {
        fn residual_dim(&self) -> usize {
            1
        }

        fn num_params(&self) -> usize {
            1
        }

        fn residual(&self, p: &[Real]) -> DVector<Real> {
            DVector::from_vec(vec![p[0], 99.0])
        }
    }

    /// Analytic Jacobian with one column too many.
    #[derive(Debug)]
    struct WideJacobian;

    impl ResidualFactor for WideJacobian {
        fn residual_dim(&self) -> usize {
            1
        }

        fn num_params(&self) -> usize {
            1
        }

        fn residual(&self, p: &[Real]) -> DVector<Real> {
            DVector::from_element(1, p[0])
        }

        fn jacobian(&self, _p: &[Real]) -> Option<DMatrix<Real>> {
            Some(DMatrix::from_element(1, 2, 1.0))
        }
    }

    #[test]
    fn misshaped_factor_output_becomes_nan() {
        let params = vec![ParamRef::Trajectory(ParamHandle(0))];
        let b = ResidualBinding::new("overlong", params.clone(), Box::new(Overlong)).unwrap();
        let r = b.residual(&[7.0]);
        assert_eq!(r.len(), 1);
        assert!(r[0].is_nan());
        let j = b.jacobian(&[7.0], 1e-6);
        assert_eq!(j.shape(), (1, 1));
        assert!(j[(0, 0)].is_nan());

        let b = ResidualBinding::new("wide", params, Box::new(WideJacobian)).unwrap();
        assert_eq!(b.residual(&[2.0])[0], 2.0);
        let j = b.jacobian(&[2.0], 1e-6);
        assert_eq!(j.shape(), (1, 1));
        assert!(j[(0, 0)].is_nan());
    }

    #[test]
    fn parameter_count_must_match_factor() {
        let params = vec![ParamRef::Trajectory(ParamHandle(0))];
        match ResidualBinding::new("quadratic", params, Box::new(Quadratic)) {
            Err(BindError::DimensionMismatch { expected: 2, got: 1 }) => {}
            other => panic!("expected DimensionMismatch, got {:?}", other),
        }
    }
}
