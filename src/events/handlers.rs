//! Event handlers: how a confirmed crossing affects propagation.
//!
//! A handler is invoked once per confirmed event with the state at the
//! event, the name of the detector that fired and the direction of the
//! crossing. It answers with an [`Action`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::action::Action;
use crate::events::logger::LoggedEvent;
use crate::state::Timed;

/// Reaction to confirmed events.
pub trait EventHandler<S: Timed> {
    /// Called once at the start of each propagation run.
    fn init(&mut self, _initial_state: &S, _target: S::Scalar) {}

    /// React to an event.
    ///
    /// `increasing` is true when `g` went from negative to positive in
    /// *time* order (independent of the propagation direction).
    fn event_occurred(&mut self, state: &S, detector: &str, increasing: bool) -> Action<S>;

    /// Called once when propagation terminates.
    fn finish(&mut self, _final_state: &S) {}
}

impl<S: Timed, H: EventHandler<S> + ?Sized> EventHandler<S> for Box<H> {
    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        (**self).init(initial_state, target)
    }

    fn event_occurred(&mut self, state: &S, detector: &str, increasing: bool) -> Action<S> {
        (**self).event_occurred(state, detector, increasing)
    }

    fn finish(&mut self, final_state: &S) {
        (**self).finish(final_state)
    }
}

/// Always continue.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueOnEvent;

impl<S: Timed> EventHandler<S> for ContinueOnEvent {
    fn event_occurred(&mut self, _state: &S, _detector: &str, _increasing: bool) -> Action<S> {
        Action::Continue
    }
}

/// Always stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopOnEvent;

impl<S: Timed> EventHandler<S> for StopOnEvent {
    fn event_occurred(&mut self, _state: &S, _detector: &str, _increasing: bool) -> Action<S> {
        Action::Stop
    }
}

/// Stop on increasing crossings, continue on decreasing ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopOnIncreasing;

impl<S: Timed> EventHandler<S> for StopOnIncreasing {
    fn event_occurred(&mut self, _state: &S, _detector: &str, increasing: bool) -> Action<S> {
        if increasing {
            Action::Stop
        } else {
            Action::Continue
        }
    }
}

/// Stop on decreasing crossings, continue on increasing ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct StopOnDecreasing;

impl<S: Timed> EventHandler<S> for StopOnDecreasing {
    fn event_occurred(&mut self, _state: &S, _detector: &str, increasing: bool) -> Action<S> {
        if increasing {
            Action::Continue
        } else {
            Action::Stop
        }
    }
}

/// Restart the propagator at each event without changing the state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResetDerivativesOnEvent;

impl<S: Timed> EventHandler<S> for ResetDerivativesOnEvent {
    fn event_occurred(&mut self, _state: &S, _detector: &str, _increasing: bool) -> Action<S> {
        Action::ResetDerivatives
    }
}

/// Handler backed by a closure `(state, increasing) -> Action`.
pub struct FnHandler<F>(F);

/// Wrap a closure as an [`EventHandler`].
pub fn handler_fn<S, F>(f: F) -> FnHandler<F>
where
    S: Timed,
    F: FnMut(&S, bool) -> Action<S>,
{
    FnHandler(f)
}

impl<S, F> EventHandler<S> for FnHandler<F>
where
    S: Timed,
    F: FnMut(&S, bool) -> Action<S>,
{
    fn event_occurred(&mut self, state: &S, _detector: &str, increasing: bool) -> Action<S> {
        (self.0)(state, increasing)
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnHandler(..)")
    }
}

/// Record every event and continue.
///
/// Clones share the same record, so a clone kept by the caller observes
/// the events seen by the clone handed to a detector.
#[derive(Debug)]
pub struct RecordAndContinue<S> {
    events: Arc<Mutex<Vec<LoggedEvent<S>>>>,
}

impl<S: Timed> RecordAndContinue<S> {
    /// Empty record.
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Copy of the events recorded so far, in delivery order.
    pub fn events(&self) -> Vec<LoggedEvent<S>> {
        self.events.lock().clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl<S: Timed> Default for RecordAndContinue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for RecordAndContinue<S> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<S: Timed> EventHandler<S> for RecordAndContinue<S> {
    fn event_occurred(&mut self, state: &S, detector: &str, increasing: bool) -> Action<S> {
        self.events
            .lock()
            .push(LoggedEvent::new(state.clone(), detector, increasing));
        Action::Continue
    }
}

/// Fan an event out to several handlers.
///
/// Handlers run in insertion order. When one returns
/// [`Action::ResetState`], the following handlers see the replacement
/// state. The combined action is the one with the highest
/// [`Action::priority`]; a reset survives only if no handler asked to stop.
pub struct EventMultipleHandler<S: Timed> {
    handlers: Vec<Box<dyn EventHandler<S>>>,
}

impl<S: Timed> EventMultipleHandler<S> {
    /// No handler yet; reacts with [`Action::Continue`].
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Append a handler.
    pub fn add_handler(mut self, handler: impl EventHandler<S> + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True without handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<S: Timed> Default for EventMultipleHandler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Timed> EventHandler<S> for EventMultipleHandler<S> {
    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        for handler in &mut self.handlers {
            handler.init(initial_state, target);
        }
    }

    fn event_occurred(&mut self, state: &S, detector: &str, increasing: bool) -> Action<S> {
        let mut current = state.clone();
        let mut reset = false;
        let mut combined = Action::Continue;
        for handler in &mut self.handlers {
            let action = handler.event_occurred(&current, detector, increasing);
            if let Action::ResetState(new_state) = &action {
                current = new_state.clone();
                reset = true;
            }
            if action.priority() > combined.priority() {
                combined = action;
            }
        }
        match combined {
            Action::ResetState(_) if reset => Action::ResetState(current),
            other => other,
        }
    }

    fn finish(&mut self, final_state: &S) {
        for handler in &mut self.handlers {
            handler.finish(final_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::OdeState;

    type State = OdeState<1>;

    fn state(t: f64, y: f64) -> State {
        OdeState::new(t, [y])
    }

    #[test]
    fn test_simple_handlers() {
        let s = state(1.0, 0.0);
        assert_eq!(ContinueOnEvent.event_occurred(&s, "d", true), Action::Continue);
        assert_eq!(StopOnEvent.event_occurred(&s, "d", false), Action::Stop);
        assert_eq!(StopOnIncreasing.event_occurred(&s, "d", true), Action::Stop);
        assert_eq!(StopOnIncreasing.event_occurred(&s, "d", false), Action::Continue);
        assert_eq!(StopOnDecreasing.event_occurred(&s, "d", false), Action::Stop);
        assert_eq!(StopOnDecreasing.event_occurred(&s, "d", true), Action::Continue);
        assert_eq!(
            ResetDerivativesOnEvent.event_occurred(&s, "d", true),
            Action::ResetDerivatives
        );
    }

    #[test]
    fn test_record_and_continue_shares_record() {
        let record = RecordAndContinue::new();
        let mut handler = record.clone();
        assert_eq!(handler.event_occurred(&state(2.0, 1.0), "apsis", true), Action::Continue);
        assert_eq!(handler.event_occurred(&state(3.0, 1.0), "apsis", false), Action::Continue);

        let events = record.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].detector, "apsis");
        assert!(events[0].increasing);
        assert_eq!(events[1].state.t, 3.0);

        record.clear();
        assert!(handler.is_empty());
    }

    #[test]
    fn test_multiple_handler_priority() {
        let record = RecordAndContinue::new();
        let mut handler = EventMultipleHandler::new()
            .add_handler(record.clone())
            .add_handler(StopOnIncreasing)
            .add_handler(ContinueOnEvent);
        assert_eq!(handler.len(), 3);

        assert_eq!(handler.event_occurred(&state(1.0, 0.0), "d", true), Action::Stop);
        assert_eq!(handler.event_occurred(&state(2.0, 0.0), "d", false), Action::Continue);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_multiple_handler_chains_resets() {
        let mut handler = EventMultipleHandler::new()
            .add_handler(handler_fn(|s: &State, _| {
                Action::ResetState(OdeState::new(s.t, [s.y[0] + 1.0]))
            }))
            .add_handler(handler_fn(|s: &State, _| {
                Action::ResetState(OdeState::new(s.t, [s.y[0] * 10.0]))
            }))
            .add_handler(ResetDerivativesOnEvent);

        match handler.event_occurred(&state(4.0, 1.0), "d", true) {
            Action::ResetState(s) => assert_eq!(s, state(4.0, 20.0)),
            other => panic!("expected reset, got {:?}", other),
        }
    }

    #[test]
    fn test_stop_discards_reset() {
        let mut handler = EventMultipleHandler::new()
            .add_handler(handler_fn(|s: &State, _| Action::ResetState(*s)))
            .add_handler(StopOnEvent);
        assert_eq!(handler.event_occurred(&state(4.0, 1.0), "d", true), Action::Stop);
    }
}
