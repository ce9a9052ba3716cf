use crate::sensors::SensorParams;
use serde::{Deserialize, Serialize};
use taser_core::{Real, Trajectory};

/// Snapshot of one solver iteration, handed to every iteration callback.
///
/// Iteration 0 is the initial evaluation: no step has been taken yet, so
/// `step_is_successful` is false and `step_norm` is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub iteration: usize,
    /// Cost `0.5 * |r|^2` at the current (accepted) parameters.
    pub cost: Real,
    /// Cost decrease achieved by this iteration's step; zero when rejected.
    pub cost_change: Real,
    pub gradient_max_norm: Real,
    pub step_norm: Real,
    pub step_is_successful: bool,
    pub trust_region_radius: Real,
}

/// Signal returned by an iteration callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CallbackReturn {
    #[default]
    Continue,
    /// Stop after the current iteration. Remaining callbacks still see it.
    Abort,
}

/// Values a callback closure may return.
///
/// `()` means continue; `Err` makes the solve fail with the callback's error.
pub trait IntoCallbackReturn {
    fn into_callback_return(self) -> anyhow::Result<CallbackReturn>;
}

impl IntoCallbackReturn for () {
    fn into_callback_return(self) -> anyhow::Result<CallbackReturn> {
        Ok(CallbackReturn::Continue)
    }
}

impl IntoCallbackReturn for CallbackReturn {
    fn into_callback_return(self) -> anyhow::Result<CallbackReturn> {
        Ok(self)
    }
}

impl IntoCallbackReturn for anyhow::Result<()> {
    fn into_callback_return(self) -> anyhow::Result<CallbackReturn> {
        self.map(|()| CallbackReturn::Continue)
    }
}

impl IntoCallbackReturn for anyhow::Result<CallbackReturn> {
    fn into_callback_return(self) -> anyhow::Result<CallbackReturn> {
        self
    }
}

/// Read-only view of the estimated quantities while callbacks run.
///
/// The trajectory and sensor blocks already hold the parameters of the iteration being
/// reported.
#[derive(Clone, Copy)]
pub struct IterationState<'s> {
    trajectory: &'s dyn Trajectory,
    sensors: &'s SensorParams,
}

impl<'s> IterationState<'s> {
    pub fn new(trajectory: &'s dyn Trajectory, sensors: &'s SensorParams) -> Self {
        Self {
            trajectory,
            sensors,
        }
    }

    pub fn trajectory(&self) -> &'s dyn Trajectory {
        self.trajectory
    }

    pub fn sensors(&self) -> &'s SensorParams {
        self.sensors
    }
}

/// Observer invoked synchronously after every solver iteration.
///
/// Implemented for any `FnMut(&IterationSummary) -> R` with `R: IntoCallbackReturn`, so
/// plain closures work; wrap a two-argument closure in [`WithState`] to also read the
/// trajectory. State captured by reference must outlive the estimator the callback is
/// registered with.
pub trait IterationCallback {
    fn on_iteration(
        &mut self,
        summary: &IterationSummary,
        state: &IterationState<'_>,
    ) -> anyhow::Result<CallbackReturn>;
}

impl<F, R> IterationCallback for F
where
    F: FnMut(&IterationSummary) -> R,
    R: IntoCallbackReturn,
{
    fn on_iteration(
        &mut self,
        summary: &IterationSummary,
        _state: &IterationState<'_>,
    ) -> anyhow::Result<CallbackReturn> {
        self(summary).into_callback_return()
    }
}

/// Adapter for closures taking the summary and the current [`IterationState`].
pub struct WithState<F>(F);

impl<F> WithState<F> {
    pub fn new<R>(callback: F) -> Self
    where
        F: FnMut(&IterationSummary, &IterationState<'_>) -> R,
        R: IntoCallbackReturn,
    {
        Self(callback)
    }
}

impl<F, R> IterationCallback for WithState<F>
where
    F: FnMut(&IterationSummary, &IterationState<'_>) -> R,
    R: IntoCallbackReturn,
{
    fn on_iteration(
        &mut self,
        summary: &IterationSummary,
        state: &IterationState<'_>,
    ) -> anyhow::Result<CallbackReturn> {
        (self.0)(summary, state).into_callback_return()
    }
}
