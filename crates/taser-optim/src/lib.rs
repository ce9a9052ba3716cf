//! Trajectory estimation on top of `taser-core` trajectories.
//!
//! This crate focuses on turning timestamped measurements into a non-linear least
//! squares problem over trajectory control points and solving it with a trust-region
//! minimizer whose iterations can be observed (and aborted) by caller callbacks.
//!
//! Data flow: [`Measurement`] -> [`ResidualBinding`] -> [`ProblemAssembler`] ->
//! [`TrustRegionMinimizer`] -> iteration callbacks -> [`SolveSummary`].
//!
//! The entry point is [`TrajectoryEstimator`]:
//!
//! ```ignore
//! let mut estimator = TrajectoryEstimator::new(&mut spline);
//! estimator.add_measurement(&PositionMeasurement::new(0.4, Vec3::new(1.0, 0.0, 2.0)))?;
//! estimator.add_callback(|s: &IterationSummary| println!("{} {}", s.iteration, s.cost));
//! let summary = estimator.solve(&SolveOptions::default().with_max_iterations(10))?;
//! println!("{}", summary.full_report());
//! ```

pub mod binding;
pub mod error;
pub mod estimator;
pub mod factors;
pub mod measurements;
pub mod problem;
pub mod sensors;
pub mod solver;
pub mod summary;

pub use crate::binding::{ParamRef, ResidualBinding};
pub use crate::error::{BindError, EstimatorError};
pub use crate::estimator::TrajectoryEstimator;
pub use crate::factors::reprojection::PinholeIntrinsics;
pub use crate::factors::ResidualFactor;
pub use crate::measurements::{
    standard_gravity, BindContext, CameraMeasurement, ImuMeasurement, Measurement,
    PositionMeasurement, SimpleMeasurement,
};
pub use crate::problem::{ParamEntry, ProblemAssembler, ReducedProblem};
pub use crate::sensors::{SensorBlock, SensorBlockId, SensorParams};
pub use crate::solver::{
    CallbackReturn, IntoCallbackReturn, IterationCallback, IterationState, IterationSummary,
    LeastSquaresProblem, MinimizerOutcome, SolveOptions, TerminationType, TrustRegionMinimizer,
    WithState,
};
pub use crate::summary::SolveSummary;
