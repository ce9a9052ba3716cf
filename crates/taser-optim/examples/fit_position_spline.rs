//! Fit a cubic B-spline to noisy 3D positions.
//!
//! This example walks through the estimator workflow:
//! 1. Sample noisy positions from a helix
//! 2. Bind them to a zero-initialized spline
//! 3. Solve with a callback printing progress
//! 4. Compare the fitted trajectory with the helix
//!
//! Run with: `cargo run -p taser-optim --example fit_position_spline`

use anyhow::Result;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use taser_core::{Derivative, Real, Trajectory, UniformBSpline, Vec3};
use taser_optim::{
    CallbackReturn, IterationSummary, PositionMeasurement, SolveOptions, TrajectoryEstimator,
};

fn helix(t: Real) -> Vec3 {
    Vec3::new(t.cos(), t.sin(), 0.25 * t)
}

fn main() -> Result<()> {
    println!("=== Position Spline Fit ===\n");

    let mut spline = UniformBSpline::constant(0.4, 0.0, 20, &DVector::zeros(3))?;
    let valid = spline.valid_time();
    println!("Spline: {} control points, valid on {}", spline.num_control_points(), valid);

    let mut rng = StdRng::seed_from_u64(2024);
    let measurements: Vec<PositionMeasurement> = valid
        .linspace(200)
        .into_iter()
        .map(|t| {
            let noise = Vec3::from_fn(|_, _| rng.gen_range(-0.02..0.02));
            PositionMeasurement::new(t, helix(t) + noise)
        })
        .collect();
    println!("Measurements: {}\n", measurements.len());

    let summary = {
        let mut estimator = TrajectoryEstimator::new(&mut spline);
        estimator.add_measurements(&measurements)?;
        estimator.add_callback(|s: &IterationSummary| {
            println!(
                "  iter {:>3}  cost {:>12.6e}  {}",
                s.iteration,
                s.cost,
                if s.step_is_successful { "+" } else { "-" }
            );
            // plenty for a linear problem
            if s.iteration >= 20 {
                CallbackReturn::Abort
            } else {
                CallbackReturn::Continue
            }
        });
        estimator.solve(&SolveOptions::default())?
    };
    println!("\n{}", summary.full_report());

    let mut max_err: Real = 0.0;
    for t in valid.linspace(50) {
        let x = spline.evaluate(t, Derivative::Value)?;
        let err = (Vec3::new(x[0], x[1], x[2]) - helix(t)).norm();
        max_err = max_err.max(err);
    }
    println!("Max deviation from the helix: {max_err:.4}");
    Ok(())
}
