//! Auxiliary parameter blocks owned by the estimator.
//!
//! Sensor blocks hold quantities that are estimated alongside the trajectory but are not
//! part of it, e.g. an accelerometer bias. A block is free unless created fixed.

use anyhow::{ensure, Result};
use nalgebra::{DVector, DVectorView};
use taser_core::Real;

/// Identifier of a sensor block, stable within one estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorBlockId(pub usize);

#[derive(Debug, Clone)]
pub struct SensorBlock {
    pub name: String,
    pub values: DVector<Real>,
    pub fixed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SensorParams {
    blocks: Vec<SensorBlock>,
}

impl SensorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, initial: DVector<Real>, fixed: bool) -> SensorBlockId {
        let id = SensorBlockId(self.blocks.len());
        self.blocks.push(SensorBlock {
            name: name.into(),
            values: initial,
            fixed,
        });
        id
    }

    pub fn get(&self, id: SensorBlockId) -> Option<&SensorBlock> {
        self.blocks.get(id.0)
    }

    pub fn by_name(&self, name: &str) -> Option<SensorBlockId> {
        self.blocks
            .iter()
            .position(|b| b.name == name)
            .map(SensorBlockId)
    }

    pub fn value(&self, id: SensorBlockId, idx: usize) -> Option<Real> {
        self.get(id).and_then(|b| b.values.get(idx).copied())
    }

    pub fn set(&mut self, id: SensorBlockId, idx: usize, value: Real) -> bool {
        match self.blocks.get_mut(id.0).and_then(|b| b.values.get_mut(idx)) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Replaces the whole block; the dimension must not change.
    pub fn set_values(&mut self, id: SensorBlockId, values: DVectorView<'_, Real>) -> Result<()> {
        let len = self.blocks.len();
        let Some(block) = self.blocks.get_mut(id.0) else {
            anyhow::bail!("sensor block {} out of range ({} blocks)", id.0, len);
        };
        ensure!(
            block.values.len() == values.len(),
            "sensor block {} has dimension {}, got {}",
            block.name,
            block.values.len(),
            values.len()
        );
        block.values.copy_from(&values);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
