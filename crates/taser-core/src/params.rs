//! Scalar parameter arena.
//!
//! Trajectories keep their control points in a [`ParamStore`]: a flat vector of scalar
//! slots addressed by [`ParamHandle`]. Handles are stable for the lifetime of the store,
//! so residuals can hold handles instead of values and observe in-place updates
//! without being rebound.

use crate::Real;
use anyhow::{ensure, Result};
use nalgebra::DVector;

/// Stable identity of one scalar slot in a [`ParamStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamHandle(pub usize);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamStore {
    values: Vec<Real>,
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(values: Vec<Real>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Appends `values` and returns the handle of the first new slot.
    pub fn push_chunk(&mut self, values: &[Real]) -> ParamHandle {
        let first = ParamHandle(self.values.len());
        self.values.extend_from_slice(values);
        first
    }

    pub fn get(&self, handle: ParamHandle) -> Option<Real> {
        self.values.get(handle.0).copied()
    }

    /// Writes a slot; returns `false` if the handle is out of range.
    pub fn set(&mut self, handle: ParamHandle, value: Real) -> bool {
        match self.values.get_mut(handle.0) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Handles `[index * dim, (index + 1) * dim)` of the `index`-th chunk.
    pub fn chunk_handles(index: usize, dim: usize) -> impl Iterator<Item = ParamHandle> {
        (index * dim..(index + 1) * dim).map(ParamHandle)
    }

    /// Copy of the `index`-th `dim`-sized chunk.
    pub fn chunk(&self, index: usize, dim: usize) -> Result<DVector<Real>> {
        let start = index * dim;
        ensure!(
            start + dim <= self.values.len(),
            "chunk {} of size {} out of range for store of length {}",
            index,
            dim,
            self.values.len()
        );
        Ok(DVector::from_column_slice(&self.values[start..start + dim]))
    }

    pub fn as_slice(&self) -> &[Real] {
        &self.values
    }
}
