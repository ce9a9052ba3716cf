//! The estimator facade: measurements in, updated trajectory and a summary out.

use crate::binding::ParamRef;
use crate::error::EstimatorError;
use crate::measurements::{BindContext, Measurement};
use crate::problem::ProblemAssembler;
use crate::sensors::{SensorBlock, SensorBlockId, SensorParams};
use crate::solver::{
    CallbackReturn, IntoCallbackReturn, IterationCallback, IterationState, IterationSummary,
    SolveOptions, TerminationType, TrustRegionMinimizer, WithState,
};
use crate::summary::SolveSummary;
use nalgebra::{DVector, DVectorView};
use std::time::Instant;
use taser_core::{Real, Trajectory};

/// Fits a trajectory (and optional sensor blocks) to timestamped measurements.
///
/// The estimator borrows the trajectory mutably for its whole lifetime and writes
/// solved values straight into the trajectory's parameter store. Bindings accumulate
/// across `solve()` calls; there is no reset.
///
/// Callbacks may borrow caller state for `'a`; the caller keeps ownership of it. The
/// trajectory itself is reachable from callbacks through [`IterationState`].
pub struct TrajectoryEstimator<'a, T: Trajectory> {
    trajectory: &'a mut T,
    sensors: SensorParams,
    problem: ProblemAssembler,
    callbacks: Vec<Box<dyn IterationCallback + 'a>>,
}

impl<'a, T: Trajectory> TrajectoryEstimator<'a, T> {
    pub fn new(trajectory: &'a mut T) -> Self {
        Self {
            trajectory,
            sensors: SensorParams::new(),
            problem: ProblemAssembler::new(),
            callbacks: Vec::new(),
        }
    }

    pub fn trajectory(&self) -> &T {
        &*self.trajectory
    }

    /// Mutable access, e.g. to lock the trajectory before adding measurements.
    ///
    /// Locking takes effect for measurements added afterwards.
    pub fn trajectory_mut(&mut self) -> &mut T {
        &mut *self.trajectory
    }

    /// Adds an auxiliary parameter block; `fixed` blocks are never changed by the solver.
    pub fn add_sensor_block(
        &mut self,
        name: impl Into<String>,
        initial: DVector<Real>,
        fixed: bool,
    ) -> SensorBlockId {
        self.sensors.add(name, initial, fixed)
    }

    pub fn sensor_block(&self, id: SensorBlockId) -> Option<&SensorBlock> {
        self.sensors.get(id)
    }

    pub fn sensor_block_by_name(&self, name: &str) -> Option<SensorBlockId> {
        self.sensors.by_name(name)
    }

    /// Overwrites a sensor block, e.g. to re-seed it before the next `solve()`.
    ///
    /// Bindings keep referring to the block, so the new values are the next solve's
    /// starting point. The dimension must not change.
    pub fn set_sensor_block(
        &mut self,
        id: SensorBlockId,
        values: DVectorView<'_, Real>,
    ) -> anyhow::Result<()> {
        self.sensors.set_values(id, values)
    }

    pub fn sensors(&self) -> &SensorParams {
        &self.sensors
    }

    /// Read-only view of the assembled problem.
    pub fn problem(&self) -> &ProblemAssembler {
        &self.problem
    }

    /// Binds a measurement and registers its residuals.
    ///
    /// On error nothing is registered.
    pub fn add_measurement<M>(&mut self, measurement: &M) -> Result<(), EstimatorError>
    where
        M: Measurement + ?Sized,
    {
        let ctx = BindContext::new(&*self.trajectory, &self.sensors);
        for t in measurement.timestamps() {
            ctx.check_time(t)?;
        }
        let bindings = measurement.bind(&ctx)?;

        let locked = self.trajectory.is_locked();
        let sensors = &self.sensors;
        let count = bindings.len();
        self.problem.add_bindings(bindings, |key| match key {
            ParamRef::Trajectory(_) => locked,
            ParamRef::Sensor(id, _) => sensors.get(id).map_or(true, |b| b.fixed),
        });
        log::debug!(
            "added measurement with {} residual block(s); problem has {} parameters ({} free)",
            count,
            self.problem.num_parameters(),
            self.problem.num_parameters_reduced()
        );
        Ok(())
    }

    /// Adds measurements in order, stopping at the first failure.
    ///
    /// Measurements added before the failing one stay registered.
    pub fn add_measurements<'m, M, I>(&mut self, measurements: I) -> Result<(), EstimatorError>
    where
        M: Measurement + ?Sized + 'm,
        I: IntoIterator<Item = &'m M>,
    {
        for measurement in measurements {
            self.add_measurement(measurement)?;
        }
        Ok(())
    }

    /// Registers a closure called after every iteration, in registration order.
    ///
    /// The closure may return `()`, a [`CallbackReturn`] or an `anyhow::Result` of either.
    pub fn add_callback<F, R>(&mut self, callback: F)
    where
        F: FnMut(&IterationSummary) -> R + 'a,
        R: IntoCallbackReturn,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Registers a closure that also reads the trajectory and sensor blocks.
    ///
    /// The state passed in already holds the parameters of the reported iteration.
    pub fn add_state_callback<F, R>(&mut self, callback: F)
    where
        F: FnMut(&IterationSummary, &IterationState<'_>) -> R + 'a,
        R: IntoCallbackReturn,
    {
        self.callbacks.push(Box::new(WithState::new(callback)));
    }

    /// Registers any [`IterationCallback`] implementor.
    pub fn add_iteration_callback<C>(&mut self, callback: C)
    where
        C: IterationCallback + 'a,
    {
        self.callbacks.push(Box::new(callback));
    }

    pub fn num_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    /// Runs the minimizer over all measurements added so far.
    ///
    /// Free parameters are written back after every iteration, before callbacks run.
    /// A failing callback stops the solve; updates already written are kept.
    pub fn solve(&mut self, options: &SolveOptions) -> Result<SolveSummary, EstimatorError> {
        options.validate()?;
        let start = Instant::now();
        let Self {
            trajectory,
            sensors,
            problem,
            callbacks,
        } = self;

        if problem.num_residual_blocks() == 0 {
            log::info!("no residual blocks, nothing to solve");
            return Ok(SolveSummary {
                num_parameters: 0,
                num_parameters_reduced: 0,
                num_residual_blocks: 0,
                num_residuals: 0,
                residual_kinds: Vec::new(),
                initial_cost: 0.0,
                final_cost: 0.0,
                iterations: Vec::new(),
                termination: TerminationType::Convergence,
                message: "No residual blocks to solve.".to_string(),
                total_time: start.elapsed(),
            });
        }

        let base = problem.gather(|key| match key {
            ParamRef::Trajectory(h) => trajectory.params().get(h),
            ParamRef::Sensor(id, i) => sensors.value(id, i),
        });
        let x0 = problem.free_values(&base);
        let free = problem.free_parameters();
        let reduced = problem.reduced(base, options.jacobian_step);
        log::info!(
            "solving: {} parameters ({} free), {} residual blocks, {} residuals",
            problem.num_parameters(),
            free.len(),
            problem.num_residual_blocks(),
            problem.num_residuals()
        );

        let minimizer = TrustRegionMinimizer::new(options.clone());
        let outcome = minimizer.minimize(&reduced, x0, |summary, x| {
            commit(&mut **trajectory, sensors, &free, x);
            let state = IterationState::new(&**trajectory, &*sensors);
            dispatch(callbacks, summary, &state)
        })?;
        commit(&mut **trajectory, sensors, &free, &outcome.x);

        Ok(SolveSummary {
            num_parameters: problem.num_parameters(),
            num_parameters_reduced: problem.num_parameters_reduced(),
            num_residual_blocks: problem.num_residual_blocks(),
            num_residuals: problem.num_residuals(),
            residual_kinds: problem.residual_kinds(),
            initial_cost: outcome.initial_cost,
            final_cost: outcome.final_cost,
            iterations: outcome.iterations,
            termination: outcome.termination,
            message: outcome.message,
            total_time: start.elapsed(),
        })
    }
}

/// Writes free parameter values back to their owners.
fn commit<T: Trajectory + ?Sized>(
    trajectory: &mut T,
    sensors: &mut SensorParams,
    free: &[ParamRef],
    x: &DVector<Real>,
) {
    for (&key, &value) in free.iter().zip(x.iter()) {
        let written = match key {
            ParamRef::Trajectory(h) => trajectory.params_mut().set(h, value),
            ParamRef::Sensor(id, i) => sensors.set(id, i, value),
        };
        if !written {
            log::warn!("parameter {key:?} vanished from its owner, update dropped");
        }
    }
}

/// Invokes every callback once; any `Abort` is reported after all have run.
fn dispatch(
    callbacks: &mut [Box<dyn IterationCallback + '_>],
    summary: &IterationSummary,
    state: &IterationState<'_>,
) -> Result<CallbackReturn, EstimatorError> {
    let mut signal = CallbackReturn::Continue;
    for (index, callback) in callbacks.iter_mut().enumerate() {
        match callback.on_iteration(summary, state) {
            Ok(CallbackReturn::Abort) => {
                log::debug!("callback {index} requested abort at iteration {}", summary.iteration);
                signal = CallbackReturn::Abort;
            }
            Ok(CallbackReturn::Continue) => {}
            Err(source) => {
                log::warn!(
                    "callback {index} failed at iteration {}: {source}",
                    summary.iteration
                );
                return Err(EstimatorError::Callback {
                    index,
                    iteration: summary.iteration,
                    source,
                });
            }
        }
    }
    Ok(signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurements::SimpleMeasurement;
    use taser_core::LinearTrajectory;

    fn line() -> LinearTrajectory {
        let cps: Vec<DVector<Real>> = (0..4).map(|i| DVector::from_element(1, i as Real)).collect();
        LinearTrajectory::from_control_points(1.0, 0.0, &cps).unwrap()
    }

    #[test]
    fn empty_problem_skips_callbacks() {
        let mut traj = line();
        let mut calls = 0;
        {
            let mut estimator = TrajectoryEstimator::new(&mut traj);
            estimator.add_callback(|_: &IterationSummary| calls += 1);
            let summary = estimator.solve(&SolveOptions::default()).unwrap();
            assert_eq!(summary.num_parameters, 0);
            assert_eq!(summary.termination, TerminationType::Convergence);
        }
        assert_eq!(calls, 0);
    }

    #[test]
    fn failed_binding_registers_nothing() {
        let mut traj = line();
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        let err = estimator
            .add_measurement(&SimpleMeasurement::new(10.0, DVector::from_element(1, 0.0)))
            .unwrap_err();
        assert!(matches!(err, EstimatorError::Binding(_)));
        assert_eq!(estimator.problem().num_residual_blocks(), 0);
    }

    #[test]
    fn fits_one_dimensional_line() {
        let mut traj = line();
        {
            let mut estimator = TrajectoryEstimator::new(&mut traj);
            for k in 0..12 {
                let t = 0.25 * k as Real;
                estimator
                    .add_measurement(&SimpleMeasurement::new(t, DVector::from_element(1, 2.0 * t)))
                    .unwrap();
            }
            let summary = estimator.solve(&SolveOptions::default()).unwrap();
            assert!(summary.is_solution_usable(), "{}", summary.full_report());
            assert_eq!(summary.num_parameters_reduced, 4);
        }
        for i in 0..4 {
            let cp = traj.control_point(i).unwrap();
            assert!((cp[0] - 2.0 * i as Real).abs() < 1e-6, "cp {i} = {}", cp[0]);
        }
    }

    #[test]
    fn dispatch_reports_abort_after_all_callbacks() {
        let mut order = Vec::new();
        {
            let mut callbacks: Vec<Box<dyn IterationCallback + '_>> = Vec::new();
            let order_ref = &mut order;
            callbacks.push(Box::new(|_: &IterationSummary| CallbackReturn::Abort));
            callbacks.push(Box::new(move |s: &IterationSummary| order_ref.push(s.iteration)));
            let summary = IterationSummary {
                iteration: 7,
                cost: 0.0,
                cost_change: 0.0,
                gradient_max_norm: 0.0,
                step_norm: 0.0,
                step_is_successful: true,
                trust_region_radius: 1.0,
            };
            let traj = line();
            let sensors = SensorParams::new();
            let state = IterationState::new(&traj, &sensors);
            assert_eq!(
                dispatch(&mut callbacks, &summary, &state).unwrap(),
                CallbackReturn::Abort
            );
        }
        assert_eq!(order, vec![7]);
    }
}
