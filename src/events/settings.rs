//! Detection settings: sampling policy and convergence criteria.

use std::fmt;
use std::sync::Arc;

use crate::error::EventError;

/// Default maximum interval between two samples of `g` (seconds).
pub const DEFAULT_MAX_CHECK: f64 = 600.0;

/// Default convergence threshold on event times (seconds).
pub const DEFAULT_THRESHOLD: f64 = 1.0e-6;

/// Default maximum number of refinement iterations.
pub const DEFAULT_MAX_ITER: usize = 100;

/// Maximum interval between two consecutive samples of a switching function.
///
/// Two roots closer than this interval may be missed. An adaptive interval
/// lets callers sample densely where events cluster (near periapsis, close
/// to a date) and sparsely elsewhere.
pub enum MaxCheck<S> {
    /// Same interval everywhere
    Constant(f64),
    /// Interval computed from the current state and propagation direction
    Adaptive(Arc<dyn Fn(&S, bool) -> f64 + Send + Sync>),
}

impl<S> MaxCheck<S> {
    /// Interval computed by a closure `(state, is_forward) -> duration`.
    pub fn adaptive<F>(f: F) -> Self
    where
        F: Fn(&S, bool) -> f64 + Send + Sync + 'static,
    {
        Self::Adaptive(Arc::new(f))
    }

    /// Interval to use from `state` onwards.
    pub fn current_interval(&self, state: &S, forward: bool) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Adaptive(f) => f(state, forward),
        }
    }
}

impl<S: 'static> MaxCheck<S> {
    /// Pointwise minimum of several intervals.
    ///
    /// Stays a constant when every input is constant. `None` for an empty set.
    pub fn min_of(intervals: &[&MaxCheck<S>]) -> Option<Self> {
        if intervals.is_empty() {
            return None;
        }
        let constants: Option<Vec<f64>> = intervals
            .iter()
            .map(|m| match m {
                MaxCheck::Constant(v) => Some(*v),
                MaxCheck::Adaptive(_) => None,
            })
            .collect();
        if let Some(values) = constants {
            return Some(MaxCheck::Constant(
                values.into_iter().fold(f64::INFINITY, f64::min),
            ));
        }
        let all: Vec<MaxCheck<S>> = intervals.iter().map(|m| (*m).clone()).collect();
        Some(MaxCheck::adaptive(move |s: &S, forward: bool| {
            all.iter()
                .map(|m| m.current_interval(s, forward))
                .fold(f64::INFINITY, f64::min)
        }))
    }
}

impl<S> Clone for MaxCheck<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Constant(value) => Self::Constant(*value),
            Self::Adaptive(f) => Self::Adaptive(Arc::clone(f)),
        }
    }
}

impl<S> fmt::Debug for MaxCheck<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Adaptive(_) => f.write_str("Adaptive(..)"),
        }
    }
}

/// Immutable detection configuration of one detector.
#[derive(Debug)]
pub struct DetectionSettings<S> {
    max_check: MaxCheck<S>,
    threshold: f64,
    max_iterations: usize,
}

impl<S> DetectionSettings<S> {
    /// Settings with an arbitrary check-interval policy.
    ///
    /// # Errors
    /// Rejects a non-positive constant max check, a non-positive or
    /// non-finite threshold and a zero iteration count.
    pub fn new(
        max_check: MaxCheck<S>,
        threshold: f64,
        max_iterations: usize,
    ) -> Result<Self, EventError> {
        if let MaxCheck::Constant(value) = max_check {
            if !(value > 0.0) {
                return Err(EventError::InvalidMaxCheck(value));
            }
        }
        if !(threshold > 0.0) || !threshold.is_finite() {
            return Err(EventError::InvalidThreshold(threshold));
        }
        if max_iterations == 0 {
            return Err(EventError::InvalidMaxIterations);
        }
        Ok(Self {
            max_check,
            threshold,
            max_iterations,
        })
    }

    /// Settings with a constant check interval.
    pub fn constant(
        max_check: f64,
        threshold: f64,
        max_iterations: usize,
    ) -> Result<Self, EventError> {
        Self::new(MaxCheck::Constant(max_check), threshold, max_iterations)
    }

    /// Copy with another check-interval policy.
    pub fn with_max_check(&self, max_check: MaxCheck<S>) -> Result<Self, EventError> {
        Self::new(max_check, self.threshold, self.max_iterations)
    }

    /// Copy with another convergence threshold.
    pub fn with_threshold(&self, threshold: f64) -> Result<Self, EventError> {
        Self::new(self.max_check.clone(), threshold, self.max_iterations)
    }

    /// Copy with another iteration budget.
    pub fn with_max_iterations(&self, max_iterations: usize) -> Result<Self, EventError> {
        Self::new(self.max_check.clone(), self.threshold, max_iterations)
    }

    /// Check-interval policy.
    pub fn max_check(&self) -> &MaxCheck<S> {
        &self.max_check
    }

    /// Convergence threshold on event times.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Maximum number of refinement iterations.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Interval to the next sample from `state`.
    ///
    /// # Errors
    /// [`EventError::InvalidMaxCheck`] when an adaptive policy returns a
    /// non-positive or NaN interval.
    pub fn current_interval(&self, state: &S, forward: bool) -> Result<f64, EventError> {
        let interval = self.max_check.current_interval(state, forward);
        if interval > 0.0 {
            Ok(interval)
        } else {
            tracing::warn!(interval, "adaptive max check returned a non-positive interval");
            Err(EventError::InvalidMaxCheck(interval))
        }
    }
}

impl<S> Clone for DetectionSettings<S> {
    fn clone(&self) -> Self {
        Self {
            max_check: self.max_check.clone(),
            threshold: self.threshold,
            max_iterations: self.max_iterations,
        }
    }
}

impl<S> Default for DetectionSettings<S> {
    fn default() -> Self {
        Self {
            max_check: MaxCheck::Constant(DEFAULT_MAX_CHECK),
            threshold: DEFAULT_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITER,
        }
    }
}
