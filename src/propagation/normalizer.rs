//! Fixed-interval output from variable steps.

use std::fmt;

use crate::error::EventError;
use crate::propagation::{StepHandler, StepInterpolator};
use crate::scalar::Scalar;
use crate::state::Timed;

/// Step handler calling `callback(state, is_last)` every `step` seconds.
///
/// Output times are `t0 + k·step` (or `t0 - k·step` backward), computed
/// from the start time so they do not drift. The final state is delivered
/// with `is_last` set unless it coincides with an output time already
/// delivered.
pub struct StepNormalizer<S: Timed, F> {
    step: f64,
    callback: F,
    start: Option<S::Scalar>,
    count: u64,
    last_time: Option<f64>,
}

impl<S, F> StepNormalizer<S, F>
where
    S: Timed,
    F: FnMut(&S, bool),
{
    /// Normalizer with output interval `step` (sign ignored).
    ///
    /// # Errors
    /// [`EventError::InvalidOutputStep`] for a zero or non-finite interval.
    pub fn new(step: f64, callback: F) -> Result<Self, EventError> {
        if !step.is_finite() || step == 0.0 {
            return Err(EventError::InvalidOutputStep(step));
        }
        Ok(Self {
            step: step.abs(),
            callback,
            start: None,
            count: 0,
            last_time: None,
        })
    }

    fn emit(&mut self, state: &S, is_last: bool) {
        self.last_time = Some(state.time().real());
        (self.callback)(state, is_last);
    }
}

impl<S, F> StepHandler<S> for StepNormalizer<S, F>
where
    S: Timed,
    F: FnMut(&S, bool),
{
    fn init(&mut self, _initial_state: &S, _target: S::Scalar) {
        self.start = None;
        self.count = 0;
        self.last_time = None;
    }

    fn handle_step(&mut self, interpolator: &dyn StepInterpolator<S>) {
        let forward = interpolator.is_forward();
        let start = match self.start {
            Some(start) => start,
            None => {
                let first = interpolator.previous_state().clone();
                let start = first.time();
                self.start = Some(start);
                self.emit(&first, false);
                start
            }
        };

        let h = if forward { self.step } else { -self.step };
        let end = interpolator.current_state().time().real();
        loop {
            let next = start + S::Scalar::from_f64((self.count + 1) as f64 * h);
            let inside = if forward {
                next.real() <= end
            } else {
                next.real() >= end
            };
            if !inside {
                break;
            }
            self.count += 1;
            let state = interpolator.interpolated_state(next);
            self.emit(&state, false);
        }
    }

    fn finish(&mut self, final_state: &S) {
        if self.last_time != Some(final_state.time().real()) {
            self.emit(final_state, true);
        }
    }
}

impl<S: Timed, F> fmt::Debug for StepNormalizer<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepNormalizer")
            .field("step", &self.step)
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}
