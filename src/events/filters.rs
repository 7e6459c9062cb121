//! Filters deciding which confirmed events reach a detector's handler.
//!
//! Both filters keep the wrapped switching function untouched, so roots
//! are located exactly as without the filter. Filtered-out events are
//! answered with [`Action::Continue`].

use std::fmt;

use crate::events::action::Action;
use crate::events::detector::EventDetector;
use crate::events::settings::DetectionSettings;
use crate::state::Timed;

/// Crossing direction kept by a [`SlopeFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Only negative to positive crossings
    IncreasingOnly,
    /// Only positive to negative crossings
    DecreasingOnly,
}

impl FilterType {
    fn accepts(self, increasing: bool) -> bool {
        match self {
            FilterType::IncreasingOnly => increasing,
            FilterType::DecreasingOnly => !increasing,
        }
    }
}

/// Forward events of one crossing direction only.
#[derive(Debug)]
pub struct SlopeFilter<D> {
    raw: D,
    filter: FilterType,
}

impl<D> SlopeFilter<D> {
    /// Keep the `filter` direction of `raw`.
    pub fn new(raw: D, filter: FilterType) -> Self {
        Self { raw, filter }
    }

    /// Wrapped detector.
    pub fn raw(&self) -> &D {
        &self.raw
    }

    /// Direction kept.
    pub fn filter(&self) -> FilterType {
        self.filter
    }
}

impl<S: Timed, D: EventDetector<S>> EventDetector<S> for SlopeFilter<D> {
    fn name(&self) -> &str {
        self.raw.name()
    }

    fn settings(&self) -> &DetectionSettings<S> {
        self.raw.settings()
    }

    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        self.raw.init(initial_state, target);
    }

    fn g(&self, state: &S) -> S::Scalar {
        self.raw.g(state)
    }

    fn event_occurred(&mut self, state: &S, increasing: bool) -> Action<S> {
        if self.filter.accepts(increasing) {
            self.raw.event_occurred(state, increasing)
        } else {
            Action::Continue
        }
    }

    fn finish(&mut self, final_state: &S) {
        self.raw.finish(final_state);
    }

    fn depends_only_on_time(&self) -> bool {
        self.raw.depends_only_on_time()
    }
}

/// Forward events only when a predicate over the event state holds.
pub struct EnablingPredicateFilter<S: Timed, D> {
    raw: D,
    predicate: Box<dyn Fn(&S) -> bool>,
}

impl<S: Timed, D: EventDetector<S>> EnablingPredicateFilter<S, D> {
    /// Gate `raw` with `predicate`.
    pub fn new<P>(raw: D, predicate: P) -> Self
    where
        P: Fn(&S) -> bool + 'static,
    {
        Self {
            raw,
            predicate: Box::new(predicate),
        }
    }

    /// Wrapped detector.
    pub fn raw(&self) -> &D {
        &self.raw
    }
}

impl<S: Timed, D: EventDetector<S>> EventDetector<S> for EnablingPredicateFilter<S, D> {
    fn name(&self) -> &str {
        self.raw.name()
    }

    fn settings(&self) -> &DetectionSettings<S> {
        self.raw.settings()
    }

    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        self.raw.init(initial_state, target);
    }

    fn g(&self, state: &S) -> S::Scalar {
        self.raw.g(state)
    }

    fn event_occurred(&mut self, state: &S, increasing: bool) -> Action<S> {
        if (self.predicate)(state) {
            self.raw.event_occurred(state, increasing)
        } else {
            Action::Continue
        }
    }

    fn finish(&mut self, final_state: &S) {
        self.raw.finish(final_state);
    }

    fn depends_only_on_time(&self) -> bool {
        self.raw.depends_only_on_time()
    }
}

impl<S: Timed, D: fmt::Debug> fmt::Debug for EnablingPredicateFilter<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnablingPredicateFilter")
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}
