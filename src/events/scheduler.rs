//! Multi-detector orchestration over accepted steps.
//!
//! The propagator hands every accepted step to [`EventScheduler::accept_step`].
//! The scheduler samples all detectors, delivers confirmed events in
//! propagation order and tells the propagator whether to continue, stop,
//! or restart from a new state.

use crate::error::EventError;
use crate::events::action::Action;
use crate::events::detector::EventDetector;
use crate::events::tracker::EventTracker;
use crate::propagation::{RestrictedInterpolator, StepHandler, StepInterpolator};
use crate::scalar::Scalar;
use crate::state::Timed;

/// Handle returned at registration, used to look up or remove a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DetectorId(u64);

/// What the propagator must do after a step was accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<S> {
    /// Go on from the end of the step
    Continue,
    /// Terminate at this state; the rest of the step is discarded
    Stop(S),
    /// A handler replaced the state: discard the rest of the step and
    /// restart from the new state
    ResetState(S),
    /// State unchanged but derivatives must be recomputed: discard the
    /// rest of the step and restart from the event state
    ResetDerivatives(S),
}

struct Slot<S: Timed> {
    id: DetectorId,
    detector: Box<dyn EventDetector<S>>,
}

/// Registered detectors and their run-scoped trackers.
///
/// Trackers live in a table parallel to the detectors, rebuilt by
/// [`init`](Self::init) at the start of each run.
pub struct EventScheduler<S: Timed> {
    slots: Vec<Slot<S>>,
    trackers: Vec<EventTracker<S>>,
    next_id: u64,
    states_initialized: bool,
}

impl<S: Timed> EventScheduler<S> {
    /// Scheduler without detectors.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            trackers: Vec::new(),
            next_id: 0,
            states_initialized: false,
        }
    }

    /// Register a detector. Registration order breaks ties between events
    /// at the same time.
    pub fn add_detector(&mut self, detector: impl EventDetector<S> + 'static) -> DetectorId {
        self.add_boxed(Box::new(detector))
    }

    /// Register an already boxed detector.
    pub fn add_boxed(&mut self, detector: Box<dyn EventDetector<S>>) -> DetectorId {
        let id = DetectorId(self.next_id);
        self.next_id += 1;
        self.slots.push(Slot { id, detector });
        self.trackers.push(EventTracker::new());
        self.states_initialized = false;
        id
    }

    /// Unregister a detector, handing it back.
    pub fn remove_detector(&mut self, id: DetectorId) -> Option<Box<dyn EventDetector<S>>> {
        let index = self.slots.iter().position(|slot| slot.id == id)?;
        self.trackers.remove(index);
        self.states_initialized = false;
        Some(self.slots.remove(index).detector)
    }

    /// Registered detector with this id.
    pub fn detector(&self, id: DetectorId) -> Option<&dyn EventDetector<S>> {
        self.slots
            .iter()
            .find(|slot| slot.id == id)
            .map(|slot| &*slot.detector)
    }

    /// Ids of the registered detectors, in registration order.
    pub fn ids(&self) -> impl Iterator<Item = DetectorId> + '_ {
        self.slots.iter().map(|slot| slot.id)
    }

    /// Number of registered detectors.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True without detectors.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Unregister every detector.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.trackers.clear();
        self.states_initialized = false;
    }

    /// Start a run: initialize every detector and reset all trackers.
    pub fn init(&mut self, initial: &S, target: S::Scalar) {
        self.trackers = self.slots.iter().map(|_| EventTracker::new()).collect();
        for (slot, tracker) in self.slots.iter_mut().zip(self.trackers.iter_mut()) {
            tracker.init(&mut *slot.detector, initial, target);
        }
        self.states_initialized = false;
    }

    /// End a run: forward the final state to every detector.
    pub fn finish(&mut self, final_state: &S) {
        for slot in &mut self.slots {
            slot.detector.finish(final_state);
        }
    }

    /// Process one accepted step.
    ///
    /// Events are delivered in propagation order; events at the same time
    /// go by registration order. Step handlers see the step cut at every
    /// delivered event.
    ///
    /// # Errors
    /// Root-finding failures, invalid adaptive intervals and reset states
    /// not at the event time abort the run.
    pub fn accept_step(
        &mut self,
        interpolator: &dyn StepInterpolator<S>,
        step_handlers: &mut [Box<dyn StepHandler<S>>],
    ) -> Result<StepOutcome<S>, EventError> {
        let forward = interpolator.is_forward();
        let current = interpolator.current_state().clone();
        let mut previous = interpolator.previous_state().clone();
        tracing::trace!(
            start = previous.time().real(),
            end = current.time().real(),
            detectors = self.slots.len(),
            "accepting step"
        );

        let slots = &mut self.slots;
        let trackers = &mut self.trackers;

        if !self.states_initialized {
            for (slot, tracker) in slots.iter().zip(trackers.iter_mut()) {
                tracker.reinitialize_begin(&*slot.detector, interpolator);
            }
            self.states_initialized = true;
        }

        let mut occurring: Vec<usize> = Vec::new();
        let mut reevaluate = true;

        'step: loop {
            if reevaluate {
                occurring.clear();
                let remaining =
                    RestrictedInterpolator::new(interpolator, previous.clone(), current.clone());
                for (index, (slot, tracker)) in slots.iter().zip(trackers.iter_mut()).enumerate() {
                    if tracker.evaluate_step(&*slot.detector, &remaining)? {
                        occurring.push(index);
                    }
                }
                reevaluate = false;
            }

            'events: while let Some(position) = earliest(slots, trackers, &occurring, forward) {
                let index = occurring.remove(position);
                let pending = trackers[index].pending_time().ok_or_else(|| {
                    EventError::NoPendingEvent(slots[index].detector.name().to_string())
                })?;
                // a tie delivered after its partner stays at the partner's time
                let behind = if forward {
                    pending.real() < previous.time().real()
                } else {
                    pending.real() > previous.time().real()
                };
                let event_time = if behind { previous.time() } else { pending };
                let event_state = interpolator.interpolated_state(event_time);

                for other in 0..slots.len() {
                    if other == index {
                        continue;
                    }
                    let detector = &*slots[other].detector;
                    if trackers[other].try_advance(detector, &event_state, interpolator)? {
                        let tied = trackers[other].pending_time().is_some_and(|t| {
                            (t.real() - event_time.real()).abs() <= tie_window(slots, index, other)
                        });
                        if tied && other > index {
                            // same time, registered later: deliver after this one
                            if !occurring.contains(&other) {
                                occurring.push(other);
                            }
                            continue;
                        }
                        // another detector fires first
                        occurring.retain(|&k| k != other);
                        occurring.push(other);
                        occurring.push(index);
                        continue 'events;
                    }
                }

                let before = RestrictedInterpolator::new(
                    interpolator,
                    previous.clone(),
                    event_state.clone(),
                );
                for handler in step_handlers.iter_mut() {
                    handler.handle_step(&before);
                }

                let slot = &mut slots[index];
                let occurrence = trackers[index].do_event(&mut *slot.detector, &event_state)?;
                tracing::debug!(
                    detector = slot.detector.name(),
                    time = event_time.real(),
                    increasing = occurrence.increasing,
                    action = occurrence.action.name(),
                    "event occurred"
                );

                match occurrence.action {
                    Action::Stop => {
                        let stop_state = interpolator.interpolated_state(occurrence.stop_time);
                        let tail = RestrictedInterpolator::new(
                            interpolator,
                            event_state,
                            stop_state.clone(),
                        );
                        for handler in step_handlers.iter_mut() {
                            handler.handle_step(&tail);
                        }
                        return Ok(StepOutcome::Stop(stop_state));
                    }
                    Action::ResetState(new_state) => {
                        if new_state.time().real() != event_time.real() {
                            return Err(EventError::ResetTimeMismatch {
                                detector: slot.detector.name().to_string(),
                                event: event_time.real(),
                                reset: new_state.time().real(),
                            });
                        }
                        self.states_initialized = false;
                        return Ok(StepOutcome::ResetState(new_state));
                    }
                    Action::ResetDerivatives => {
                        self.states_initialized = false;
                        return Ok(StepOutcome::ResetDerivatives(event_state));
                    }
                    Action::ResetEvents => {
                        previous = event_state;
                        reevaluate = true;
                        continue 'step;
                    }
                    Action::Continue => {
                        previous = event_state;
                        let remaining = RestrictedInterpolator::new(
                            interpolator,
                            previous.clone(),
                            current.clone(),
                        );
                        if trackers[index].evaluate_step(&*slot.detector, &remaining)? {
                            occurring.push(index);
                        }
                    }
                }
            }

            // Advance everybody to the end of the step. A new root shows up
            // here only if a handler changed another detector's function.
            occurring.clear();
            let remaining =
                RestrictedInterpolator::new(interpolator, previous.clone(), current.clone());
            for (index, (slot, tracker)) in slots.iter().zip(trackers.iter_mut()).enumerate() {
                if tracker.try_advance(&*slot.detector, &current, &remaining)? {
                    occurring.push(index);
                }
            }
            if occurring.is_empty() {
                break;
            }
        }

        let remaining = RestrictedInterpolator::new(interpolator, previous, current);
        for handler in step_handlers.iter_mut() {
            handler.handle_step(&remaining);
        }
        Ok(StepOutcome::Continue)
    }
}

impl<S: Timed> Default for EventScheduler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Timed> std::fmt::Debug for EventScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|slot| (slot.id, slot.detector.name())))
            .finish()
    }
}

/// Two events of detectors `a` and `b` closer than this are simultaneous.
fn tie_window<S: Timed>(slots: &[Slot<S>], a: usize, b: usize) -> f64 {
    let threshold = |k: usize| slots[k].detector.settings().threshold();
    threshold(a).min(threshold(b))
}

/// Position in `occurring` of the earliest pending event.
///
/// Times within the tighter threshold of each other cannot be told apart;
/// the detector registered first wins.
fn earliest<S: Timed>(
    slots: &[Slot<S>],
    trackers: &[EventTracker<S>],
    occurring: &[usize],
    forward: bool,
) -> Option<usize> {
    let mut best: Option<(usize, f64, usize)> = None;
    for (position, &index) in occurring.iter().enumerate() {
        let Some(time) = trackers[index].pending_time() else {
            continue;
        };
        let time = time.real();
        let better = match best {
            None => true,
            Some((_, best_time, best_index))
                if (time - best_time).abs() <= tie_window(slots, index, best_index) =>
            {
                index < best_index
            }
            Some((_, best_time, _)) => (time < best_time) == forward,
        };
        if better {
            best = Some((position, time, index));
        }
    }
    best.map(|(position, _, _)| position)
}
