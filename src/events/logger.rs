//! Event log shared by any number of monitored detectors.
//!
//! The log is append-only. Readers get an `Arc` snapshot that never
//! changes: appending while a snapshot is alive copies the log first.
//!
//! The lock only guards the swap of the inner `Arc`. A reader holds it
//! for one reference-count increment, never while iterating, and a
//! writer for one push. Snapshots themselves are read without any lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::action::Action;
use crate::events::detector::EventDetector;
use crate::events::settings::DetectionSettings;
use crate::state::Timed;

/// One confirmed event.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedEvent<S> {
    /// State at the event
    pub state: S,
    /// Name of the detector that fired
    pub detector: String,
    /// Crossing direction, in time order
    pub increasing: bool,
}

impl<S> LoggedEvent<S> {
    /// Record of an event of `detector`.
    pub fn new(state: S, detector: impl Into<String>, increasing: bool) -> Self {
        Self {
            state,
            detector: detector.into(),
            increasing,
        }
    }
}

type SharedLog<S> = Arc<RwLock<Arc<Vec<LoggedEvent<S>>>>>;

/// Collector of the events of monitored detectors.
///
/// Clones share the same log.
pub struct EventsLogger<S> {
    log: SharedLog<S>,
}

impl<S: Timed> EventsLogger<S> {
    /// Empty log.
    pub fn new() -> Self {
        Self {
            log: Arc::new(RwLock::new(Arc::new(Vec::new()))),
        }
    }

    /// Wrap `detector` so its events are logged before its own handling.
    pub fn monitor_detector<D: EventDetector<S>>(&self, detector: D) -> LoggingWrapper<S, D> {
        LoggingWrapper {
            detector,
            log: Arc::clone(&self.log),
        }
    }

    /// Snapshot of the events logged so far, in delivery order.
    pub fn logged_events(&self) -> Arc<Vec<LoggedEvent<S>>> {
        Arc::clone(&self.log.read())
    }

    /// Forget everything; existing snapshots are unaffected.
    pub fn clear_logged_events(&self) {
        *self.log.write() = Arc::new(Vec::new());
    }
}

impl<S: Timed> Default for EventsLogger<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for EventsLogger<S> {
    fn clone(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
        }
    }
}

impl<S> fmt::Debug for EventsLogger<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventsLogger")
            .field("logged", &self.log.read().len())
            .finish()
    }
}

/// Detector decorated by an [`EventsLogger`].
///
/// Behaves exactly like the wrapped detector; the wrapped detector's
/// action is returned unchanged.
pub struct LoggingWrapper<S, D> {
    detector: D,
    log: SharedLog<S>,
}

impl<S, D> LoggingWrapper<S, D> {
    /// Wrapped detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }
}

impl<S: Timed, D: EventDetector<S>> EventDetector<S> for LoggingWrapper<S, D> {
    fn name(&self) -> &str {
        self.detector.name()
    }

    fn settings(&self) -> &DetectionSettings<S> {
        self.detector.settings()
    }

    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        self.detector.init(initial_state, target);
    }

    fn g(&self, state: &S) -> S::Scalar {
        self.detector.g(state)
    }

    fn event_occurred(&mut self, state: &S, increasing: bool) -> Action<S> {
        let event = LoggedEvent::new(state.clone(), self.detector.name(), increasing);
        let mut log = self.log.write();
        Arc::make_mut(&mut *log).push(event);
        drop(log);
        self.detector.event_occurred(state, increasing)
    }

    fn finish(&mut self, final_state: &S) {
        self.detector.finish(final_state);
    }

    fn depends_only_on_time(&self) -> bool {
        self.detector.depends_only_on_time()
    }
}

impl<S, D: fmt::Debug> fmt::Debug for LoggingWrapper<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingWrapper")
            .field("detector", &self.detector)
            .finish_non_exhaustive()
    }
}
