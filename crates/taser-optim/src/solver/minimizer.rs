use super::{CallbackReturn, IterationSummary, LeastSquaresProblem, SolveOptions, TerminationType};
use crate::error::EstimatorError;
use log::Level;
use nalgebra::{DMatrix, DVector};
use taser_core::{all_finite, max_abs, Real};

const MIN_DIAGONAL: Real = 1e-6;
const MAX_DIAGONAL: Real = 1e32;

/// Result of a minimization run, before it is folded into a solve summary.
#[derive(Debug, Clone)]
pub struct MinimizerOutcome {
    /// Last accepted free-parameter vector.
    pub x: DVector<Real>,
    pub initial_cost: Real,
    pub final_cost: Real,
    pub iterations: Vec<IterationSummary>,
    pub termination: TerminationType,
    pub message: String,
}

/// Levenberg-Marquardt minimizer with a trust-region radius controlling the damping.
///
/// The hook runs once per iteration, after the step decision, with the summary and the
/// currently accepted parameters. Iteration 0 is the initial evaluation.
#[derive(Debug, Clone)]
pub struct TrustRegionMinimizer {
    options: SolveOptions,
}

struct Linearization {
    r: DVector<Real>,
    j: DMatrix<Real>,
    cost: Real,
    gradient: DVector<Real>,
}

impl Linearization {
    fn new(r: DVector<Real>, j: DMatrix<Real>) -> Option<Self> {
        let cost = 0.5 * r.norm_squared();
        if !cost.is_finite() || !j.iter().all(|v| v.is_finite()) {
            return None;
        }
        let gradient = j.tr_mul(&r);
        Some(Self {
            r,
            j,
            cost,
            gradient,
        })
    }
}

impl TrustRegionMinimizer {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    pub fn minimize<P, H>(
        &self,
        problem: &P,
        x0: DVector<Real>,
        mut hook: H,
    ) -> Result<MinimizerOutcome, EstimatorError>
    where
        P: LeastSquaresProblem + ?Sized,
        H: FnMut(&IterationSummary, &DVector<Real>) -> Result<CallbackReturn, EstimatorError>,
    {
        let opts = &self.options;
        let mut x = x0;
        let (r0, j0) = problem.residuals_and_jacobian(&x);
        let Some(mut lin) = Linearization::new(r0, j0) else {
            log::warn!("initial evaluation is not finite, nothing to minimize");
            return Ok(MinimizerOutcome {
                x,
                initial_cost: Real::NAN,
                final_cost: Real::NAN,
                iterations: Vec::new(),
                termination: TerminationType::Failure,
                message: "Residual or Jacobian evaluation is not finite at the initial point."
                    .to_string(),
            });
        };

        let initial_cost = lin.cost;
        let mut radius = opts.initial_trust_region_radius;
        let mut decrease_factor = 2.0;
        let mut iterations = Vec::new();

        let first = IterationSummary {
            iteration: 0,
            cost: lin.cost,
            cost_change: 0.0,
            gradient_max_norm: max_abs(&lin.gradient),
            step_norm: 0.0,
            step_is_successful: false,
            trust_region_radius: radius,
        };
        self.log_iteration(&first);
        let signal = hook(&first, &x)?;
        let gradient_max_norm = first.gradient_max_norm;
        iterations.push(first);

        let finish = |x: DVector<Real>,
                      cost: Real,
                      iterations: Vec<IterationSummary>,
                      termination: TerminationType,
                      message: String|
         -> Result<MinimizerOutcome, EstimatorError> {
            if termination == TerminationType::Failure {
                log::warn!("minimizer failed: {message}");
            } else {
                log::info!("minimizer finished: {termination} ({message})");
            }
            Ok(MinimizerOutcome {
                x,
                initial_cost,
                final_cost: cost,
                iterations,
                termination,
                message,
            })
        };

        if signal == CallbackReturn::Abort {
            return finish(
                x,
                lin.cost,
                iterations,
                TerminationType::UserAbort,
                "User callback returned Abort.".to_string(),
            );
        }
        if opts.max_iterations == 0 {
            return finish(
                x,
                lin.cost,
                iterations,
                TerminationType::NoConvergence,
                "Maximum number of iterations reached. Number of iterations: 0.".to_string(),
            );
        }
        if gradient_max_norm <= opts.gradient_tolerance {
            return finish(
                x,
                lin.cost,
                iterations,
                TerminationType::Convergence,
                format!(
                    "Gradient tolerance reached. Gradient max norm: {:e} <= {:e}",
                    gradient_max_norm, opts.gradient_tolerance
                ),
            );
        }

        for iteration in 1..=opts.max_iterations {
            let step = solve_damped(&lin, radius);
            let mut step_norm = 0.0;
            let mut accepted = false;
            let mut cost_change = 0.0;

            if let Some(delta) = step {
                step_norm = delta.norm();
                let jd = &lin.j * &delta;
                let model_decrease = -(lin.r.dot(&jd) + 0.5 * jd.norm_squared());
                let x_trial = &x + &delta;
                let r_trial = problem.residuals(&x_trial);
                let cost_trial = 0.5 * r_trial.norm_squared();

                if all_finite(&r_trial) && cost_trial.is_finite() && model_decrease > 0.0 {
                    let rho = (lin.cost - cost_trial) / model_decrease;
                    if rho > opts.min_relative_decrease {
                        let (r, j) = problem.residuals_and_jacobian(&x_trial);
                        if let Some(next) = Linearization::new(r, j) {
                            cost_change = lin.cost - next.cost;
                            lin = next;
                            x = x_trial;
                            accepted = true;
                            let ratio = 1.0 - (2.0 * rho - 1.0).powi(3);
                            radius = (radius / ratio.max(1.0 / 3.0))
                                .min(opts.max_trust_region_radius);
                            decrease_factor = 2.0;
                        }
                    }
                }
            }
            if !accepted {
                radius /= decrease_factor;
                decrease_factor *= 2.0;
            }

            let summary = IterationSummary {
                iteration,
                cost: lin.cost,
                cost_change,
                gradient_max_norm: max_abs(&lin.gradient),
                step_norm,
                step_is_successful: accepted,
                trust_region_radius: radius,
            };
            self.log_iteration(&summary);
            let signal = hook(&summary, &x)?;
            let gradient_max_norm = summary.gradient_max_norm;
            iterations.push(summary);

            if signal == CallbackReturn::Abort {
                return finish(
                    x,
                    lin.cost,
                    iterations,
                    TerminationType::UserAbort,
                    "User callback returned Abort.".to_string(),
                );
            }
            if iteration == opts.max_iterations {
                return finish(
                    x,
                    lin.cost,
                    iterations,
                    TerminationType::NoConvergence,
                    format!("Maximum number of iterations reached. Number of iterations: {iteration}."),
                );
            }
            if accepted {
                if cost_change.abs() <= opts.function_tolerance * lin.cost {
                    return finish(
                        x,
                        lin.cost,
                        iterations,
                        TerminationType::Convergence,
                        format!(
                            "Function tolerance reached. |cost_change|/cost: {:e} <= {:e}",
                            cost_change.abs() / lin.cost,
                            opts.function_tolerance
                        ),
                    );
                }
                if gradient_max_norm <= opts.gradient_tolerance {
                    return finish(
                        x,
                        lin.cost,
                        iterations,
                        TerminationType::Convergence,
                        format!(
                            "Gradient tolerance reached. Gradient max norm: {:e} <= {:e}",
                            gradient_max_norm, opts.gradient_tolerance
                        ),
                    );
                }
                let x_norm = x.norm();
                if step_norm <= opts.parameter_tolerance * (x_norm + opts.parameter_tolerance) {
                    return finish(
                        x,
                        lin.cost,
                        iterations,
                        TerminationType::Convergence,
                        format!(
                            "Parameter tolerance reached. Relative step_norm: {:e} <= {:e}",
                            step_norm / (x_norm + opts.parameter_tolerance),
                            opts.parameter_tolerance
                        ),
                    );
                }
            }
            if radius < opts.min_trust_region_radius {
                return finish(
                    x,
                    lin.cost,
                    iterations,
                    TerminationType::Failure,
                    format!(
                        "Trust region radius {:e} below minimum {:e}.",
                        radius, opts.min_trust_region_radius
                    ),
                );
            }
        }

        // Unreachable for max_iterations >= 1: the last iteration returns above.
        let iteration = iterations.len().saturating_sub(1);
        finish(
            x,
            lin.cost,
            iterations,
            TerminationType::NoConvergence,
            format!("Maximum number of iterations reached. Number of iterations: {iteration}."),
        )
    }

    fn log_iteration(&self, s: &IterationSummary) {
        let level = if self.options.verbose {
            Level::Info
        } else {
            Level::Debug
        };
        log::log!(
            level,
            "iter {:>4}: cost {:.6e}, cost_change {:.3e}, |gradient| {:.3e}, |step| {:.3e}, tr_radius {:.3e}, {}",
            s.iteration,
            s.cost,
            s.cost_change,
            s.gradient_max_norm,
            s.step_norm,
            s.trust_region_radius,
            if s.step_is_successful { "accepted" } else { "rejected" }
        );
    }
}

/// Solves `(J^T J + D / radius) delta = -J^T r` with `D` the clamped diagonal of `J^T J`.
fn solve_damped(lin: &Linearization, radius: Real) -> Option<DVector<Real>> {
    let mut a = lin.j.tr_mul(&lin.j);
    let lambda = 1.0 / radius;
    for i in 0..a.nrows() {
        let d = a[(i, i)].clamp(MIN_DIAGONAL, MAX_DIAGONAL);
        a[(i, i)] += lambda * d;
    }
    let delta = a.cholesky()?.solve(&(-&lin.gradient));
    all_finite(&delta).then_some(delta)
}
