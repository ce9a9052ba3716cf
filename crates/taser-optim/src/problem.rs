//! Incremental assembly of the least squares problem.
//!
//! The assembler owns residual bindings and the de-duplicated set of parameters they
//! reference. Parameters are keyed by identity ([`ParamRef`]), so two measurements
//! sharing a control point share one column of the Jacobian.

use crate::binding::{ParamRef, ResidualBinding};
use crate::solver::LeastSquaresProblem;
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use taser_core::Real;

/// A parameter registered with the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamEntry {
    pub key: ParamRef,
    /// Held fixed during the solve.
    pub constant: bool,
}

#[derive(Debug)]
struct ResidualEntry {
    binding: ResidualBinding,
    /// Index into `params` for each local parameter of the binding.
    columns: Vec<usize>,
    row: usize,
}

/// Accumulates residual bindings across `add_measurement` calls.
///
/// Constant-ness is sticky: once a binding registers a parameter while its owner is
/// locked (or fixed), the parameter stays constant. The result does not depend on the
/// order measurements were added in.
#[derive(Debug, Default)]
pub struct ProblemAssembler {
    params: Vec<ParamEntry>,
    index: HashMap<ParamRef, usize>,
    residuals: Vec<ResidualEntry>,
    num_residuals: usize,
}

impl ProblemAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers bindings; `is_constant` reports whether a parameter's owner is locked.
    pub fn add_bindings<F>(&mut self, bindings: Vec<ResidualBinding>, is_constant: F)
    where
        F: Fn(ParamRef) -> bool,
    {
        for binding in bindings {
            let columns = binding
                .params()
                .iter()
                .map(|&key| self.register(key, is_constant(key)))
                .collect();
            let row = self.num_residuals;
            self.num_residuals += binding.residual_dim();
            log::trace!(
                "registered {} residual block ({} residuals) at row {}",
                binding.kind(),
                binding.residual_dim(),
                row
            );
            self.residuals.push(ResidualEntry {
                binding,
                columns,
                row,
            });
        }
    }

    fn register(&mut self, key: ParamRef, constant: bool) -> usize {
        if let Some(&idx) = self.index.get(&key) {
            self.params[idx].constant |= constant;
            return idx;
        }
        let idx = self.params.len();
        self.params.push(ParamEntry { key, constant });
        self.index.insert(key, idx);
        idx
    }

    /// Number of distinct parameters referenced by any residual.
    pub fn num_parameters(&self) -> usize {
        self.params.len()
    }

    /// Number of free parameters, i.e. those the solver may change.
    pub fn num_parameters_reduced(&self) -> usize {
        self.params.iter().filter(|p| !p.constant).count()
    }

    pub fn num_residual_blocks(&self) -> usize {
        self.residuals.len()
    }

    /// Total number of scalar residuals.
    pub fn num_residuals(&self) -> usize {
        self.num_residuals
    }

    /// Registered parameters in first-seen order.
    pub fn parameters(&self) -> &[ParamEntry] {
        &self.params
    }

    /// `true` if the parameter is registered and held constant.
    pub fn is_constant(&self, key: ParamRef) -> bool {
        self.index
            .get(&key)
            .is_some_and(|&idx| self.params[idx].constant)
    }

    pub fn contains(&self, key: ParamRef) -> bool {
        self.index.contains_key(&key)
    }

    /// Residual block kinds with their counts, in first-seen order.
    pub fn residual_kinds(&self) -> Vec<(&'static str, usize)> {
        let mut kinds: Vec<(&'static str, usize)> = Vec::new();
        for entry in &self.residuals {
            let kind = entry.binding.kind();
            match kinds.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, count)) => *count += 1,
                None => kinds.push((kind, 1)),
            }
        }
        kinds
    }

    /// Free parameters in column order of the reduced Jacobian.
    pub fn free_parameters(&self) -> Vec<ParamRef> {
        self.params
            .iter()
            .filter(|p| !p.constant)
            .map(|p| p.key)
            .collect()
    }

    /// Reads the current value of every registered parameter. Missing values become NaN.
    pub fn gather<F>(&self, read: F) -> DVector<Real>
    where
        F: Fn(ParamRef) -> Option<Real>,
    {
        DVector::from_iterator(
            self.params.len(),
            self.params.iter().map(|p| read(p.key).unwrap_or(Real::NAN)),
        )
    }

    /// Extracts the free entries of a full value vector.
    pub fn free_values(&self, values: &DVector<Real>) -> DVector<Real> {
        let free: Vec<Real> = self
            .params
            .iter()
            .zip(values.iter())
            .filter(|(p, _)| !p.constant)
            .map(|(_, &v)| v)
            .collect();
        DVector::from_vec(free)
    }

    /// Residual vector and the Jacobian restricted to free parameters.
    ///
    /// `values` holds every registered parameter in [`Self::parameters`] order.
    pub fn evaluate(&self, values: &DVector<Real>, jacobian_step: Real) -> (DVector<Real>, DMatrix<Real>) {
        let free_column = self.free_columns();
        let num_free = self.num_parameters_reduced();
        let mut r = DVector::zeros(self.num_residuals);
        let mut j = DMatrix::zeros(self.num_residuals, num_free);

        for entry in &self.residuals {
            let local: Vec<Real> = entry.columns.iter().map(|&c| values[c]).collect();
            let block = entry.binding.residual(&local);
            r.rows_mut(entry.row, block.len()).copy_from(&block);

            if entry.columns.iter().all(|&c| free_column[c].is_none()) {
                continue;
            }
            let jac = entry.binding.jacobian(&local, jacobian_step);
            for (k, &c) in entry.columns.iter().enumerate() {
                if let Some(col) = free_column[c] {
                    for i in 0..jac.nrows() {
                        j[(entry.row + i, col)] += jac[(i, k)];
                    }
                }
            }
        }
        (r, j)
    }

    /// Stacked residual vector only.
    pub fn residuals(&self, values: &DVector<Real>) -> DVector<Real> {
        let mut r = DVector::zeros(self.num_residuals);
        for entry in &self.residuals {
            let local: Vec<Real> = entry.columns.iter().map(|&c| values[c]).collect();
            let block = entry.binding.residual(&local);
            r.rows_mut(entry.row, block.len()).copy_from(&block);
        }
        r
    }

    /// View of the problem over the free parameters, with constants taken from `base`.
    pub fn reduced(&self, base: DVector<Real>, jacobian_step: Real) -> ReducedProblem<'_> {
        let free_indices = self
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.constant)
            .map(|(i, _)| i)
            .collect();
        ReducedProblem {
            assembler: self,
            base,
            free_indices,
            jacobian_step,
        }
    }

    fn free_columns(&self) -> Vec<Option<usize>> {
        let mut next = 0;
        self.params
            .iter()
            .map(|p| {
                if p.constant {
                    None
                } else {
                    next += 1;
                    Some(next - 1)
                }
            })
            .collect()
    }
}

/// Least squares problem over the free parameters of an assembler.
pub struct ReducedProblem<'a> {
    assembler: &'a ProblemAssembler,
    base: DVector<Real>,
    free_indices: Vec<usize>,
    jacobian_step: Real,
}

impl ReducedProblem<'_> {
    /// Full parameter vector with the free entries replaced by `x`.
    pub fn expand(&self, x: &DVector<Real>) -> DVector<Real> {
        let mut full = self.base.clone();
        for (col, &idx) in self.free_indices.iter().enumerate() {
            full[idx] = x[col];
        }
        full
    }
}

impl LeastSquaresProblem for ReducedProblem<'_> {
    fn num_params(&self) -> usize {
        self.free_indices.len()
    }

    fn num_residuals(&self) -> usize {
        self.assembler.num_residuals()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        self.assembler.residuals(&self.expand(x))
    }

    fn residuals_and_jacobian(&self, x: &DVector<Real>) -> (DVector<Real>, DMatrix<Real>) {
        self.assembler.evaluate(&self.expand(x), self.jacobian_step)
    }
}
