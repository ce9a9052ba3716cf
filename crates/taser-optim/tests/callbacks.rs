//! Iteration callback protocol: fan-out, ordering, abort and error propagation.

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use taser_core::{Derivative, ParamStore, Real, Trajectory, UniformBSpline, Vec3};
use taser_optim::{
    CallbackReturn, EstimatorError, IterationCallback, IterationState, IterationSummary,
    PositionMeasurement, SolveOptions, TerminationType, TrajectoryEstimator,
};

fn zero_spline() -> UniformBSpline {
    UniformBSpline::constant(0.5, 0.0, 8, &DVector::zeros(3)).unwrap()
}

/// Noisy samples of a circle; the fit never reaches zero cost.
fn noisy_circle(traj: &UniformBSpline, seed: u64) -> Vec<PositionMeasurement> {
    let mut rng = StdRng::seed_from_u64(seed);
    traj.valid_time()
        .linspace(40)
        .into_iter()
        .map(|t| {
            let p = Vec3::new(t.cos(), t.sin(), 0.2 * t)
                + Vec3::from_fn(|_, _| rng.gen_range(-0.05..0.05));
            PositionMeasurement::new(t, p)
        })
        .collect()
}

fn no_tolerances(max_iterations: usize) -> SolveOptions {
    SolveOptions::default()
        .with_max_iterations(max_iterations)
        .with_tolerances(0.0, 0.0, 0.0)
}

#[test]
fn every_callback_sees_every_iteration() {
    const K: usize = 5;
    let mut traj = zero_spline();
    let measurements = noisy_circle(&traj, 1);
    let mut counts = [0usize; 3];
    {
        let [c0, c1, c2] = &mut counts;
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        estimator.add_measurements(&measurements).unwrap();
        estimator.add_callback(|_: &IterationSummary| *c0 += 1);
        estimator.add_callback(|_: &IterationSummary| {
            *c1 += 1;
            CallbackReturn::Continue
        });
        estimator.add_callback(|_: &IterationSummary| -> anyhow::Result<()> {
            *c2 += 1;
            Ok(())
        });
        assert_eq!(estimator.num_callbacks(), 3);

        let summary = estimator.solve(&no_tolerances(K)).unwrap();
        assert_eq!(summary.termination, TerminationType::NoConvergence);
        assert_eq!(summary.num_iterations(), K);
        assert_eq!(summary.iterations.len(), K + 1);
    }
    assert_eq!(counts, [K + 1; 3]);
}

#[test]
fn callbacks_run_in_registration_order() {
    let mut traj = zero_spline();
    let measurements = noisy_circle(&traj, 2);
    let log = RefCell::new(Vec::new());
    {
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        estimator.add_measurements(&measurements).unwrap();
        for id in 0..3 {
            let log = &log;
            estimator.add_callback(move |s: &IterationSummary| {
                log.borrow_mut().push((s.iteration, id));
            });
        }
        estimator.solve(&no_tolerances(2)).unwrap();
    }
    let expected: Vec<(usize, usize)> = (0..=2)
        .flat_map(|it| (0..3).map(move |id| (it, id)))
        .collect();
    assert_eq!(log.into_inner(), expected);
}

#[test]
fn abort_at_iteration_two_gives_three_calls() {
    let mut traj = zero_spline();
    let mut tokens = Vec::new();
    let summary = {
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        estimator
            .add_measurement(&PositionMeasurement::new(1.0, Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        estimator.add_callback(|s: &IterationSummary| {
            tokens.push(s.iteration);
            if s.iteration == 2 {
                CallbackReturn::Abort
            } else {
                CallbackReturn::Continue
            }
        });
        estimator
            .solve(&SolveOptions::default().with_max_iterations(4))
            .unwrap()
    };
    assert_eq!(tokens, vec![0, 1, 2]);
    assert!(summary.was_aborted());
    assert!(summary.is_solution_usable());
    assert_eq!(summary.num_iterations(), 2);
}

#[test]
fn abort_still_dispatches_to_later_callbacks() {
    let mut traj = zero_spline();
    let measurements = noisy_circle(&traj, 3);
    let mut first = Vec::new();
    let mut second = Vec::new();
    {
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        estimator.add_measurements(&measurements).unwrap();
        estimator.add_callback(|s: &IterationSummary| {
            first.push(s.iteration);
            if s.iteration == 1 {
                CallbackReturn::Abort
            } else {
                CallbackReturn::Continue
            }
        });
        estimator.add_callback(|s: &IterationSummary| second.push(s.iteration));
        let summary = estimator.solve(&no_tolerances(10)).unwrap();
        assert_eq!(summary.termination, TerminationType::UserAbort);
    }
    assert_eq!(first, vec![0, 1]);
    assert_eq!(second, vec![0, 1]);
}

#[test]
fn failing_callback_stops_the_solve() {
    let mut traj = zero_spline();
    let initial = traj.params().clone();
    let measurements = noisy_circle(&traj, 4);
    let mut before = 0;
    let mut after = 0;
    {
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        estimator.add_measurements(&measurements).unwrap();
        estimator.add_callback(|_: &IterationSummary| before += 1);
        estimator.add_callback(|s: &IterationSummary| -> anyhow::Result<CallbackReturn> {
            anyhow::ensure!(s.iteration < 1, "sensor dropped out");
            Ok(CallbackReturn::Continue)
        });
        estimator.add_callback(|_: &IterationSummary| after += 1);

        let err = estimator.solve(&no_tolerances(10)).unwrap_err();
        match err {
            EstimatorError::Callback {
                index,
                iteration,
                source,
            } => {
                assert_eq!((index, iteration), (1, 1));
                assert!(source.to_string().contains("sensor dropped out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(before, 2);
    assert_eq!(after, 1);
    // the update of iteration 1 was committed before the callbacks ran
    assert_ne!(traj.params(), &initial);
}

#[test]
fn struct_callbacks_are_supported() {
    struct CostTrace<'c> {
        costs: &'c mut Vec<Real>,
    }

    impl IterationCallback for CostTrace<'_> {
        fn on_iteration(
            &mut self,
            s: &IterationSummary,
            _state: &IterationState<'_>,
        ) -> anyhow::Result<CallbackReturn> {
            self.costs.push(s.cost);
            Ok(CallbackReturn::Continue)
        }
    }

    let mut traj = zero_spline();
    let measurements = noisy_circle(&traj, 5);
    let mut costs = Vec::new();
    let summary = {
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        estimator.add_measurements(&measurements).unwrap();
        estimator.add_iteration_callback(CostTrace { costs: &mut costs });
        estimator.solve(&SolveOptions::default()).unwrap()
    };
    assert_eq!(costs.len(), summary.iterations.len());
    assert!(costs.windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(costs.last().copied(), Some(summary.final_cost));
}

#[test]
fn repeated_solves_keep_callbacks_and_bindings() {
    let mut traj = zero_spline();
    let measurements = noisy_circle(&traj, 6);
    let mut calls = 0;
    {
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        estimator.add_measurements(&measurements[..20]).unwrap();
        estimator.add_callback(|_: &IterationSummary| calls += 1);
        let first = estimator.solve(&no_tolerances(1)).unwrap();
        estimator.add_measurements(&measurements[20..]).unwrap();
        let second = estimator.solve(&no_tolerances(1)).unwrap();
        assert_eq!(second.num_residual_blocks, 40);
        assert!(second.num_parameters >= first.num_parameters);
    }
    assert_eq!(calls, 4);
}

#[test]
fn invalid_options_fail_before_any_callback() {
    let mut traj = zero_spline();
    let mut calls = 0;
    {
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        estimator
            .add_measurement(&PositionMeasurement::new(0.5, Vec3::zeros()))
            .unwrap();
        estimator.add_callback(|_: &IterationSummary| calls += 1);
        let opts = SolveOptions::default().with_tolerances(-1.0, 0.0, 0.0);
        let err = estimator.solve(&opts).unwrap_err();
        assert!(matches!(err, EstimatorError::InvalidOptions(_)), "{err}");
    }
    assert_eq!(calls, 0);
}

/// Cost of position measurements recomputed from the trajectory alone.
fn position_cost(traj: &dyn Trajectory, measurements: &[PositionMeasurement]) -> Real {
    measurements
        .iter()
        .map(|m| {
            let x = traj.evaluate(m.t, Derivative::Value).unwrap();
            0.5 * (Vec3::new(x[0], x[1], x[2]) - m.position).norm_squared()
        })
        .sum()
}

#[test]
fn state_callbacks_see_the_reported_iteration() {
    let mut traj = zero_spline();
    let measurements = noisy_circle(&traj, 7);
    let mut recomputed = Vec::new();
    let mut reported = Vec::new();
    let mut last_params: Option<ParamStore> = None;
    let summary = {
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        estimator.add_measurements(&measurements).unwrap();
        estimator.add_state_callback(|s: &IterationSummary, state: &IterationState<'_>| {
            recomputed.push(position_cost(state.trajectory(), &measurements));
            reported.push(s.cost);
            last_params = Some(state.trajectory().params().clone());
        });
        estimator.solve(&no_tolerances(6)).unwrap()
    };
    assert_eq!(recomputed.len(), summary.iterations.len());
    for (i, (a, b)) in recomputed.iter().zip(&reported).enumerate() {
        assert!((a - b).abs() <= 1e-9 * b.max(1.0), "iteration {i}: {a} vs {b}");
    }
    assert!(recomputed.last().unwrap() < &recomputed[0]);
    assert_eq!(last_params.as_ref(), Some(traj.params()));
}

#[test]
fn state_and_plain_callbacks_share_the_dispatch_order() {
    let mut traj = zero_spline();
    let measurements = noisy_circle(&traj, 8);
    let log = RefCell::new(Vec::new());
    {
        let mut estimator = TrajectoryEstimator::new(&mut traj);
        estimator.add_measurements(&measurements).unwrap();
        estimator.add_callback(|s: &IterationSummary| log.borrow_mut().push((s.iteration, "plain")));
        estimator.add_state_callback(|s: &IterationSummary, _: &IterationState<'_>| {
            log.borrow_mut().push((s.iteration, "state"));
            if s.iteration == 1 {
                CallbackReturn::Abort
            } else {
                CallbackReturn::Continue
            }
        });
        assert_eq!(estimator.num_callbacks(), 2);
        let summary = estimator.solve(&no_tolerances(10)).unwrap();
        assert!(summary.was_aborted());
    }
    assert_eq!(
        log.into_inner(),
        vec![(0, "plain"), (0, "state"), (1, "plain"), (1, "state")]
    );
}
