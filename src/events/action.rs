//! Directives returned by event handlers.

/// What propagation should do after a confirmed event.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<S> {
    /// Keep propagating; the same step is scanned for later events
    Continue,
    /// Halt propagation at the event
    Stop,
    /// Replace the state; the payload must be at the event time
    ResetState(S),
    /// State unchanged but derivatives must be recomputed (restart there)
    ResetDerivatives,
    /// Re-evaluate every detector over the rest of the step
    ResetEvents,
}

impl<S> Action<S> {
    /// Rank used when several handlers react to one event: the highest wins.
    pub fn priority(&self) -> u8 {
        match self {
            Action::Continue => 0,
            Action::ResetEvents => 1,
            Action::ResetDerivatives => 2,
            Action::ResetState(_) => 3,
            Action::Stop => 4,
        }
    }

    /// Short name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Continue => "continue",
            Action::Stop => "stop",
            Action::ResetState(_) => "reset_state",
            Action::ResetDerivatives => "reset_derivatives",
            Action::ResetEvents => "reset_events",
        }
    }
}
