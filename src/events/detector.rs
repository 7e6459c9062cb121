//! Switching-function detectors.
//!
//! An event is a zero crossing of a scalar switching function `g` evaluated
//! along the trajectory. Only the sign of `g` matters: a crossing from
//! negative to positive is *increasing*, the opposite is *decreasing*.
//!
//! # Common Applications in Astrodynamics
//!
//! - Periapsis/apoapsis detection (radial velocity = 0)
//! - Reaching a given date
//! - Eclipse entry/exit
//! - Ascending/descending node crossing
//! - Altitude threshold crossing

use std::fmt;

use crate::error::EventError;
use crate::events::action::Action;
use crate::events::handlers::{ContinueOnEvent, EventHandler, StopOnEvent};
use crate::events::settings::DetectionSettings;
use crate::scalar::Scalar;
use crate::state::Timed;

/// Default minimum spacing between the dates of a [`DateDetector`].
pub const DEFAULT_MIN_GAP: f64 = 86400.0;

/// A switching function together with the reaction to its crossings.
///
/// `g` must be deterministic and safe to evaluate at any time of the
/// current run, in any order: the engine samples ahead, goes back to
/// refine brackets and re-evaluates after resets.
///
/// # Example
///
/// ```
/// use zerocross::{Action, DetectionSettings, EventDetector, OdeState};
///
/// // Detect when altitude drops below 100 km
/// struct AltitudeEvent {
///     settings: DetectionSettings<OdeState<6>>,
/// }
///
/// impl EventDetector<OdeState<6>> for AltitudeEvent {
///     fn name(&self) -> &str {
///         "altitude"
///     }
///
///     fn settings(&self) -> &DetectionSettings<OdeState<6>> {
///         &self.settings
///     }
///
///     fn g(&self, s: &OdeState<6>) -> f64 {
///         let r = (s.y[0] * s.y[0] + s.y[1] * s.y[1] + s.y[2] * s.y[2]).sqrt();
///         r - 6478.137
///     }
///
///     fn event_occurred(&mut self, _s: &OdeState<6>, increasing: bool) -> Action<OdeState<6>> {
///         if increasing { Action::Continue } else { Action::Stop }
///     }
/// }
/// ```
pub trait EventDetector<S: Timed> {
    /// Name used in logs, errors and event records.
    fn name(&self) -> &str;

    /// Sampling and convergence settings.
    fn settings(&self) -> &DetectionSettings<S>;

    /// Called once per run (or restart segment) before any evaluation.
    fn init(&mut self, _initial_state: &S, _target: S::Scalar) {}

    /// Switching function.
    fn g(&self, state: &S) -> S::Scalar;

    /// React to a confirmed crossing.
    ///
    /// `increasing` describes the crossing in time order, whatever the
    /// propagation direction.
    fn event_occurred(&mut self, state: &S, increasing: bool) -> Action<S>;

    /// Called once when propagation terminates.
    fn finish(&mut self, _final_state: &S) {}

    /// True when `g` depends on the time of the state only.
    ///
    /// A hint; the engine evaluates such detectors like any other.
    fn depends_only_on_time(&self) -> bool {
        false
    }
}

impl<S: Timed, D: EventDetector<S> + ?Sized> EventDetector<S> for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn settings(&self) -> &DetectionSettings<S> {
        (**self).settings()
    }

    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        (**self).init(initial_state, target)
    }

    fn g(&self, state: &S) -> S::Scalar {
        (**self).g(state)
    }

    fn event_occurred(&mut self, state: &S, increasing: bool) -> Action<S> {
        (**self).event_occurred(state, increasing)
    }

    fn finish(&mut self, final_state: &S) {
        (**self).finish(final_state)
    }

    fn depends_only_on_time(&self) -> bool {
        (**self).depends_only_on_time()
    }
}

/// Detector whose switching function is a closure.
///
/// Continues on every event unless another handler is installed.
pub struct FunctionDetector<S: Timed> {
    name: String,
    function: Box<dyn Fn(&S) -> S::Scalar>,
    settings: DetectionSettings<S>,
    handler: Box<dyn EventHandler<S>>,
    time_only: bool,
}

impl<S: Timed> FunctionDetector<S> {
    /// Detector for the zeros of `g`, with default settings.
    pub fn new<F>(name: impl Into<String>, g: F) -> Self
    where
        F: Fn(&S) -> S::Scalar + 'static,
    {
        Self {
            name: name.into(),
            function: Box::new(g),
            settings: DetectionSettings::default(),
            handler: Box::new(ContinueOnEvent),
            time_only: false,
        }
    }

    /// Replace the detection settings.
    pub fn with_settings(mut self, settings: DetectionSettings<S>) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the handler.
    pub fn with_handler(mut self, handler: impl EventHandler<S> + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Declare that `g` only looks at the time of the state.
    pub fn time_only(mut self) -> Self {
        self.time_only = true;
        self
    }
}

impl<S: Timed> EventDetector<S> for FunctionDetector<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &DetectionSettings<S> {
        &self.settings
    }

    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        self.handler.init(initial_state, target);
    }

    fn g(&self, state: &S) -> S::Scalar {
        (self.function)(state)
    }

    fn event_occurred(&mut self, state: &S, increasing: bool) -> Action<S> {
        self.handler.event_occurred(state, &self.name, increasing)
    }

    fn finish(&mut self, final_state: &S) {
        self.handler.finish(final_state);
    }

    fn depends_only_on_time(&self) -> bool {
        self.time_only
    }
}

impl<S: Timed> fmt::Debug for FunctionDetector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDetector")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Detector firing at one or more fixed dates.
///
/// `g` is `t - d` around odd-ranked dates and `d - t` around even-ranked
/// ones (ranks start at one), where `d` is the date closest to `t`. The
/// function is continuous and crossings alternate between increasing and
/// decreasing. Dates must be spaced by at least the minimum gap, which
/// itself should exceed the max check interval so no pair of dates falls
/// within one sample interval.
///
/// Stops on every event unless another handler is installed.
pub struct DateDetector<S: Timed> {
    name: String,
    dates: Vec<S::Scalar>,
    min_gap: f64,
    settings: DetectionSettings<S>,
    handler: Box<dyn EventHandler<S>>,
}

impl<S: Timed> DateDetector<S> {
    /// Detector without dates; `g` is constantly negative until one is added.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dates: Vec::new(),
            min_gap: DEFAULT_MIN_GAP,
            settings: DetectionSettings::default(),
            handler: Box::new(StopOnEvent),
        }
    }

    /// Detector for a single date.
    pub fn at(name: impl Into<String>, date: S::Scalar) -> Self {
        let mut detector = Self::new(name);
        detector.dates.push(date);
        detector
    }

    /// Change the minimum spacing enforced by [`add_event_date`](Self::add_event_date).
    pub fn with_min_gap(mut self, min_gap: f64) -> Self {
        self.min_gap = min_gap;
        self
    }

    /// Replace the detection settings.
    pub fn with_settings(mut self, settings: DetectionSettings<S>) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the handler.
    pub fn with_handler(mut self, handler: impl EventHandler<S> + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Add a date, keeping dates sorted.
    ///
    /// # Errors
    /// [`EventError::DatesTooClose`] when an existing date is closer than
    /// the minimum gap.
    pub fn add_event_date(&mut self, date: S::Scalar) -> Result<(), EventError> {
        let t = date.real();
        let index = self.dates.partition_point(|d| d.real() < t);
        let neighbours = [index.checked_sub(1), Some(index)];
        for existing in neighbours.into_iter().flatten() {
            if let Some(d) = self.dates.get(existing) {
                if (d.real() - t).abs() < self.min_gap {
                    return Err(EventError::DatesTooClose {
                        first: d.real(),
                        second: t,
                        min_gap: self.min_gap,
                    });
                }
            }
        }
        self.dates.insert(index, date);
        Ok(())
    }

    /// Builder form of [`add_event_date`](Self::add_event_date).
    pub fn with_date(mut self, date: S::Scalar) -> Result<Self, EventError> {
        self.add_event_date(date)?;
        Ok(self)
    }

    /// Registered dates, sorted.
    pub fn dates(&self) -> &[S::Scalar] {
        &self.dates
    }

    fn closest(&self, t: f64) -> Option<usize> {
        let after = self.dates.partition_point(|d| d.real() < t);
        match (after.checked_sub(1), self.dates.get(after)) {
            (None, None) => None,
            (None, Some(_)) => Some(after),
            (Some(before), None) => Some(before),
            (Some(before), Some(next)) => {
                if next.real() - t < t - self.dates[before].real() {
                    Some(after)
                } else {
                    Some(before)
                }
            }
        }
    }
}

impl<S: Timed> EventDetector<S> for DateDetector<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &DetectionSettings<S> {
        &self.settings
    }

    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        self.handler.init(initial_state, target);
    }

    fn g(&self, state: &S) -> S::Scalar {
        let t = state.time();
        match self.closest(t.real()) {
            None => S::Scalar::from_f64(-1.0),
            Some(i) if i % 2 == 0 => t - self.dates[i],
            Some(i) => self.dates[i] - t,
        }
    }

    fn event_occurred(&mut self, state: &S, increasing: bool) -> Action<S> {
        self.handler.event_occurred(state, &self.name, increasing)
    }

    fn finish(&mut self, final_state: &S) {
        self.handler.finish(final_state);
    }

    fn depends_only_on_time(&self) -> bool {
        true
    }
}

impl<S: Timed> fmt::Debug for DateDetector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateDetector")
            .field("name", &self.name)
            .field("dates", &self.dates)
            .field("min_gap", &self.min_gap)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::handlers::StopOnIncreasing;
    use crate::state::OdeState;

    type State = OdeState<1>;

    fn at(t: f64) -> State {
        OdeState::new(t, [0.0])
    }

    #[test]
    fn test_function_detector() {
        let mut detector =
            FunctionDetector::new("half", |s: &State| s.y[0] - 0.5).with_handler(StopOnIncreasing);
        assert_eq!(detector.name(), "half");
        assert_eq!(detector.g(&OdeState::new(0.0, [1.0])), 0.5);
        assert_eq!(detector.event_occurred(&at(1.0), true), Action::Stop);
        assert_eq!(detector.event_occurred(&at(1.0), false), Action::Continue);
        assert!(!detector.depends_only_on_time());
        assert!(detector.time_only().depends_only_on_time());
    }

    #[test]
    fn test_date_detector_alternates() {
        let detector = DateDetector::<State>::new("dates")
            .with_min_gap(10.0)
            .with_date(100.0)
            .unwrap()
            .with_date(200.0)
            .unwrap();

        assert!(detector.g(&at(90.0)) < 0.0);
        assert!(detector.g(&at(110.0)) > 0.0);
        assert!(detector.g(&at(190.0)) > 0.0);
        assert!(detector.g(&at(210.0)) < 0.0);
        // continuous at the midpoint
        assert_eq!(detector.g(&at(150.0)), 50.0);
        assert!((detector.g(&at(150.0 + 1e-6)) - 50.0).abs() < 1e-5);
    }

    #[test]
    fn test_date_detector_keeps_dates_sorted() {
        let mut detector = DateDetector::<State>::new("dates").with_min_gap(1.0);
        detector.add_event_date(30.0).unwrap();
        detector.add_event_date(10.0).unwrap();
        detector.add_event_date(20.0).unwrap();
        assert_eq!(detector.dates(), &[10.0, 20.0, 30.0]);

        assert_eq!(
            detector.add_event_date(20.5),
            Err(EventError::DatesTooClose {
                first: 20.0,
                second: 20.5,
                min_gap: 1.0
            })
        );
        assert_eq!(detector.dates().len(), 3);
    }

    #[test]
    fn test_date_detector_without_dates_never_fires() {
        let detector = DateDetector::<State>::new("empty");
        assert_eq!(detector.g(&at(-1e9)), -1.0);
        assert_eq!(detector.g(&at(1e9)), -1.0);
        assert!(detector.depends_only_on_time());
    }

    #[test]
    fn test_boxed_detector_forwards() {
        let boxed: Box<dyn EventDetector<State>> =
            Box::new(DateDetector::at("epoch", 5.0));
        assert_eq!(boxed.name(), "epoch");
        assert_eq!(boxed.g(&at(7.0)), 2.0);
        assert!(boxed.depends_only_on_time());
    }
}
