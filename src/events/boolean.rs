//! Boolean combination of detectors.
//!
//! A detector is *active* when its `g` is positive. The AND of several
//! detectors is active when all of them are, which is what the minimum of
//! their switching functions expresses; the OR uses the maximum.

use std::fmt;

use crate::error::EventError;
use crate::events::action::Action;
use crate::events::detector::EventDetector;
use crate::events::handlers::{ContinueOnEvent, EventHandler};
use crate::events::settings::{DetectionSettings, MaxCheck};
use crate::scalar::Scalar;
use crate::state::Timed;

/// Logical operator of a [`BooleanDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Active when every sub-detector is active (`min` of the `g`)
    And,
    /// Active when any sub-detector is active (`max` of the `g`)
    Or,
}

/// AND / OR over a non-empty set of detectors.
///
/// Settings are derived from the sub-detectors: the smallest max check
/// and threshold, the largest iteration budget. The handlers of the
/// sub-detectors are never called; events of the combination go to its
/// own handler ([`ContinueOnEvent`] unless replaced).
pub struct BooleanDetector<S: Timed> {
    name: String,
    operator: Operator,
    detectors: Vec<Box<dyn EventDetector<S>>>,
    settings: DetectionSettings<S>,
    handler: Box<dyn EventHandler<S>>,
}

impl<S: Timed> BooleanDetector<S> {
    /// Active when all of `detectors` are active.
    ///
    /// # Errors
    /// [`EventError::EmptyDetectorSet`] for an empty set.
    pub fn and_combine(detectors: Vec<Box<dyn EventDetector<S>>>) -> Result<Self, EventError> {
        Self::combine(Operator::And, detectors)
    }

    /// Active when any of `detectors` is active.
    ///
    /// # Errors
    /// [`EventError::EmptyDetectorSet`] for an empty set.
    pub fn or_combine(detectors: Vec<Box<dyn EventDetector<S>>>) -> Result<Self, EventError> {
        Self::combine(Operator::Or, detectors)
    }

    fn combine(
        operator: Operator,
        detectors: Vec<Box<dyn EventDetector<S>>>,
    ) -> Result<Self, EventError> {
        let max_checks: Vec<&MaxCheck<S>> =
            detectors.iter().map(|d| d.settings().max_check()).collect();
        let max_check = MaxCheck::min_of(&max_checks).ok_or(EventError::EmptyDetectorSet)?;
        let threshold = detectors
            .iter()
            .map(|d| d.settings().threshold())
            .fold(f64::INFINITY, f64::min);
        let max_iterations = detectors
            .iter()
            .map(|d| d.settings().max_iterations())
            .max()
            .unwrap_or_default();
        let settings = DetectionSettings::new(max_check, threshold, max_iterations)?;

        let keyword = match operator {
            Operator::And => "and",
            Operator::Or => "or",
        };
        let names: Vec<&str> = detectors.iter().map(|d| d.name()).collect();
        let name = format!("{}({})", keyword, names.join(", "));

        Ok(Self {
            name,
            operator,
            detectors,
            settings,
            handler: Box::new(ContinueOnEvent),
        })
    }

    /// Replace the handler.
    pub fn with_handler(mut self, handler: impl EventHandler<S> + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// Replace the derived settings.
    pub fn with_settings(mut self, settings: DetectionSettings<S>) -> Self {
        self.settings = settings;
        self
    }

    /// Rename the combination.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Operator of the combination.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Combined detectors.
    pub fn detectors(&self) -> &[Box<dyn EventDetector<S>>] {
        &self.detectors
    }
}

impl<S: Timed> EventDetector<S> for BooleanDetector<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &DetectionSettings<S> {
        &self.settings
    }

    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        for detector in &mut self.detectors {
            detector.init(initial_state, target);
        }
        self.handler.init(initial_state, target);
    }

    fn g(&self, state: &S) -> S::Scalar {
        let mut values = self.detectors.iter().map(|d| d.g(state));
        // construction guarantees at least one detector
        let first = values.next().unwrap_or_else(S::Scalar::zero);
        values.fold(first, |acc, g| {
            let keep_acc = match self.operator {
                Operator::And => acc.real() <= g.real(),
                Operator::Or => acc.real() >= g.real(),
            };
            if keep_acc {
                acc
            } else {
                g
            }
        })
    }

    fn event_occurred(&mut self, state: &S, increasing: bool) -> Action<S> {
        self.handler.event_occurred(state, &self.name, increasing)
    }

    fn finish(&mut self, final_state: &S) {
        for detector in &mut self.detectors {
            detector.finish(final_state);
        }
        self.handler.finish(final_state);
    }

    fn depends_only_on_time(&self) -> bool {
        self.detectors.iter().all(|d| d.depends_only_on_time())
    }
}

impl<S: Timed> fmt::Debug for BooleanDetector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BooleanDetector")
            .field("name", &self.name)
            .field("operator", &self.operator)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
