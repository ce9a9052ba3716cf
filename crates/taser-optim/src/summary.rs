//! Solve summaries and their human-readable reports.

use crate::solver::{IterationSummary, TerminationType};
use std::fmt::{self, Write as _};
use std::time::Duration;
use taser_core::Real;

/// Outcome of one `solve()` call.
#[derive(Debug, Clone)]
pub struct SolveSummary {
    /// Distinct parameters referenced by the problem, free or constant.
    pub num_parameters: usize,
    /// Free parameters, `<= num_parameters`.
    pub num_parameters_reduced: usize,
    pub num_residual_blocks: usize,
    pub num_residuals: usize,
    /// Residual block count per measurement kind.
    pub residual_kinds: Vec<(&'static str, usize)>,
    pub initial_cost: Real,
    pub final_cost: Real,
    /// One entry per dispatched iteration, starting with iteration 0.
    pub iterations: Vec<IterationSummary>,
    pub termination: TerminationType,
    pub message: String,
    pub total_time: Duration,
}

impl SolveSummary {
    /// Number of iterations after the initial evaluation.
    pub fn num_iterations(&self) -> usize {
        self.iterations.last().map_or(0, |s| s.iteration)
    }

    pub fn was_aborted(&self) -> bool {
        self.termination == TerminationType::UserAbort
    }

    /// `false` only when the minimizer failed numerically.
    pub fn is_solution_usable(&self) -> bool {
        self.termination != TerminationType::Failure
    }

    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    /// One-line report.
    pub fn brief_report(&self) -> String {
        format!(
            "Trajectory estimation, Initial cost: {:.6e}, Final cost: {:.6e}, Iterations: {}, Termination: {}",
            self.initial_cost,
            self.final_cost,
            self.num_iterations(),
            self.termination
        )
    }

    /// Multi-line report with problem size, per-iteration progress and termination.
    pub fn full_report(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_report(&mut out);
        out
    }

    fn write_report(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Trajectory estimation report")?;
        writeln!(out, "============================")?;
        writeln!(out, "{:<24}{:>12}{:>12}", "", "Original", "Reduced")?;
        writeln!(
            out,
            "{:<24}{:>12}{:>12}",
            "Parameters", self.num_parameters, self.num_parameters_reduced
        )?;
        writeln!(out, "{:<24}{:>12}", "Residual blocks", self.num_residual_blocks)?;
        writeln!(out, "{:<24}{:>12}", "Residuals", self.num_residuals)?;
        for (kind, count) in &self.residual_kinds {
            writeln!(out, "  {:<22}{:>12}", kind, count)?;
        }

        if !self.iterations.is_empty() {
            writeln!(out)?;
            writeln!(
                out,
                "{:>5} {:>14} {:>12} {:>12} {:>12} {:>12} {:>9}",
                "iter", "cost", "cost_change", "|gradient|", "|step|", "tr_radius", "accepted"
            )?;
            for s in &self.iterations {
                writeln!(
                    out,
                    "{:>5} {:>14.6e} {:>12.3e} {:>12.3e} {:>12.3e} {:>12.3e} {:>9}",
                    s.iteration,
                    s.cost,
                    s.cost_change,
                    s.gradient_max_norm,
                    s.step_norm,
                    s.trust_region_radius,
                    s.step_is_successful
                )?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Cost:")?;
        writeln!(out, "{:<24}{:>16.6e}", "Initial", self.initial_cost)?;
        writeln!(out, "{:<24}{:>16.6e}", "Final", self.final_cost)?;
        writeln!(out, "{:<24}{:>16.6e}", "Change", self.initial_cost - self.final_cost)?;
        writeln!(out)?;
        writeln!(out, "{:<24}{:>16}", "Minimizer iterations", self.num_iterations())?;
        writeln!(out, "{:<24}{:>16.3?}", "Total time", self.total_time)?;
        writeln!(out)?;
        writeln!(out, "Termination: {} ({})", self.termination, self.message)
    }
}

impl fmt::Display for SolveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_report())
    }
}
