//! Host propagator for closed-form trajectories.

use std::fmt;

use crate::error::EventError;
use crate::events::{DetectorId, EventDetector, EventScheduler, StepOutcome};
use crate::propagation::{StepHandler, StepInterpolator};
use crate::scalar::Scalar;
use crate::state::Timed;

/// Trajectory known in closed form.
pub trait AnalyticalModel<S: Timed> {
    /// State at time `t`.
    fn state_at(&self, t: S::Scalar) -> S;

    /// Make the trajectory pass through `state` from now on.
    ///
    /// Called when an event handler replaces the state. The default
    /// refuses: most closed forms cannot be re-anchored.
    fn reset(&mut self, _state: &S) -> Result<(), EventError> {
        Err(EventError::ResetUnsupported)
    }
}

/// Model from a closure `t -> state`.
pub struct FnModel<F>(F);

impl<F> FnModel<F> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<S, F> AnalyticalModel<S> for FnModel<F>
where
    S: Timed,
    F: Fn(S::Scalar) -> S,
{
    fn state_at(&self, t: S::Scalar) -> S {
        (self.0)(t)
    }
}

impl<F> fmt::Debug for FnModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnModel")
    }
}

/// Evaluates the model anywhere in the step.
struct ModelInterpolator<'a, S, M> {
    model: &'a M,
    previous: S,
    current: S,
    forward: bool,
}

impl<'a, S: Timed, M: AnalyticalModel<S>> StepInterpolator<S> for ModelInterpolator<'a, S, M> {
    fn previous_state(&self) -> &S {
        &self.previous
    }

    fn current_state(&self) -> &S {
        &self.current
    }

    fn interpolated_state(&self, t: S::Scalar) -> S {
        self.model.state_at(t)
    }

    fn is_forward(&self) -> bool {
        self.forward
    }
}

/// Propagator sampling an [`AnalyticalModel`].
///
/// Without a fixed step, the whole interval is a single step and the
/// detectors' max check intervals alone drive sampling. With a fixed step,
/// step boundaries fall on `start + k·step` and the last step ends exactly
/// at the target.
pub struct AnalyticalPropagator<S: Timed, M> {
    model: M,
    step: Option<f64>,
    events: EventScheduler<S>,
    step_handlers: Vec<Box<dyn StepHandler<S>>>,
}

impl<S: Timed, M: AnalyticalModel<S>> AnalyticalPropagator<S, M> {
    /// Propagator over `model`, one step per run.
    pub fn new(model: M) -> Self {
        Self {
            model,
            step: None,
            events: EventScheduler::new(),
            step_handlers: Vec::new(),
        }
    }

    /// Cut runs into fixed steps of `step` seconds (sign ignored).
    pub fn with_fixed_step(mut self, step: f64) -> Self {
        self.step = Some(step.abs()).filter(|h| *h > 0.0 && h.is_finite());
        self
    }

    /// Underlying model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Register an event detector.
    pub fn add_event_detector(
        &mut self,
        detector: impl EventDetector<S> + 'static,
    ) -> DetectorId {
        self.events.add_detector(detector)
    }

    /// Unregister an event detector.
    pub fn remove_event_detector(
        &mut self,
        id: DetectorId,
    ) -> Option<Box<dyn EventDetector<S>>> {
        self.events.remove_detector(id)
    }

    /// Registered event detectors.
    pub fn events(&self) -> &EventScheduler<S> {
        &self.events
    }

    /// Registered event detectors, mutably.
    pub fn events_mut(&mut self) -> &mut EventScheduler<S> {
        &mut self.events
    }

    /// Register a step handler.
    pub fn add_step_handler(&mut self, handler: impl StepHandler<S> + 'static) {
        self.step_handlers.push(Box::new(handler));
    }

    /// Unregister all step handlers.
    pub fn clear_step_handlers(&mut self) {
        self.step_handlers.clear();
    }

    /// Propagate from `start` to `target`.
    ///
    /// Returns the state at `target`, or the state where a detector
    /// stopped propagation.
    ///
    /// # Errors
    /// Event detection failures, and state resets the model refuses.
    pub fn propagate(&mut self, start: S::Scalar, target: S::Scalar) -> Result<S, EventError> {
        let initial = self.model.state_at(start);
        if start.real() == target.real() {
            return Ok(initial);
        }
        let forward = target.real() > start.real();

        self.events.init(&initial, target);
        for handler in &mut self.step_handlers {
            handler.init(&initial, target);
        }
        tracing::debug!(
            start = start.real(),
            target = target.real(),
            detectors = self.events.len(),
            "starting analytical propagation"
        );

        let signed_step = self.step.map(|h| if forward { h } else { -h });
        let mut origin = start;
        let mut count = 0u64;
        let mut previous = initial;

        loop {
            let next = match signed_step {
                Some(h) => {
                    count += 1;
                    let t = origin + S::Scalar::from_f64(count as f64 * h);
                    let past = if forward {
                        t.real() >= target.real()
                    } else {
                        t.real() <= target.real()
                    };
                    if past {
                        target
                    } else {
                        t
                    }
                }
                None => target,
            };
            let current = self.model.state_at(next);
            let interpolator = ModelInterpolator {
                model: &self.model,
                previous: previous.clone(),
                current: current.clone(),
                forward,
            };

            match self.events.accept_step(&interpolator, &mut self.step_handlers)? {
                StepOutcome::Continue => {
                    previous = current;
                    if next.real() == target.real() {
                        break;
                    }
                }
                StepOutcome::Stop(state) => {
                    tracing::debug!(t = state.time().real(), "propagation stopped by event");
                    self.finish(&state);
                    return Ok(state);
                }
                StepOutcome::ResetState(state) => {
                    self.model.reset(&state)?;
                    origin = state.time();
                    count = 0;
                    previous = state;
                }
                StepOutcome::ResetDerivatives(state) => {
                    origin = state.time();
                    count = 0;
                    previous = state;
                }
            }
        }

        self.finish(&previous);
        tracing::debug!(t = target.real(), "analytical propagation completed");
        Ok(previous)
    }

    fn finish(&mut self, last: &S) {
        for handler in &mut self.step_handlers {
            handler.finish(last);
        }
        self.events.finish(last);
    }
}

impl<S: Timed, M: fmt::Debug> fmt::Debug for AnalyticalPropagator<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticalPropagator")
            .field("model", &self.model)
            .field("step", &self.step)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
