use crate::sensors::SensorBlockId;
use taser_core::TrajectoryError;
use thiserror::Error;

/// A measurement could not be resolved to trajectory (or sensor) parameters.
#[derive(Debug, Error)]
pub enum BindError {
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("unknown sensor block {0:?}")]
    UnknownSensorBlock(SensorBlockId),
    #[error("measurement produced an empty residual")]
    EmptyMeasurement,
}

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("measurement binding failed: {0}")]
    Binding(#[from] BindError),
    #[error("invalid solver options: {0}")]
    InvalidOptions(String),
    #[error("iteration callback {index} failed at iteration {iteration}: {source}")]
    Callback {
        index: usize,
        iteration: usize,
        #[source]
        source: anyhow::Error,
    },
}
