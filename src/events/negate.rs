//! Negation of a switching function.

use std::fmt;

use crate::events::action::Action;
use crate::events::detector::EventDetector;
use crate::events::handlers::{ContinueOnEvent, EventHandler};
use crate::events::settings::DetectionSettings;
use crate::state::Timed;

/// Detector with the opposite `g` of the one it wraps.
///
/// Events happen at the same times as for the original detector with
/// increasing and decreasing swapped. They go to this detector's own
/// handler ([`ContinueOnEvent`] unless replaced), never to the original's.
pub struct NegateDetector<S: Timed, D> {
    name: String,
    original: D,
    handler: Box<dyn EventHandler<S>>,
}

impl<S: Timed, D: EventDetector<S>> NegateDetector<S, D> {
    /// Negate `original`.
    pub fn new(original: D) -> Self {
        Self {
            name: format!("not({})", original.name()),
            original,
            handler: Box::new(ContinueOnEvent),
        }
    }

    /// Replace the handler.
    pub fn with_handler(mut self, handler: impl EventHandler<S> + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Wrapped detector.
    pub fn original(&self) -> &D {
        &self.original
    }
}

impl<S: Timed, D: EventDetector<S>> EventDetector<S> for NegateDetector<S, D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &DetectionSettings<S> {
        self.original.settings()
    }

    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        self.original.init(initial_state, target);
        self.handler.init(initial_state, target);
    }

    fn g(&self, state: &S) -> S::Scalar {
        -self.original.g(state)
    }

    fn event_occurred(&mut self, state: &S, increasing: bool) -> Action<S> {
        self.handler.event_occurred(state, &self.name, increasing)
    }

    fn finish(&mut self, final_state: &S) {
        self.original.finish(final_state);
        self.handler.finish(final_state);
    }

    fn depends_only_on_time(&self) -> bool {
        self.original.depends_only_on_time()
    }
}

impl<S: Timed, D: fmt::Debug> fmt::Debug for NegateDetector<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegateDetector")
            .field("original", &self.original)
            .finish_non_exhaustive()
    }
}
