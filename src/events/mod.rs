//! Event detection during propagation.
//!
//! # Overview
//!
//! A detector exposes a switching function `g(state)`. While a propagator
//! advances, the [`EventScheduler`] samples every registered detector over
//! each accepted step. When the sign of `g` changes, the root is bracketed
//! with Brent's method down to the detector's threshold, and the detector
//! reacts with an [`Action`]: continue, stop, or reset.
//!
//! Combinators build new detectors from existing ones:
//!
//! - [`BooleanDetector`]: AND / OR of several detectors
//! - [`NegateDetector`]: opposite switching function
//! - [`SlopeFilter`]: only one crossing direction reaches the handler
//! - [`EnablingPredicateFilter`]: events reach the handler while a predicate holds
//! - [`EventsLogger`]: records every event of the detectors it monitors

pub mod action;
pub mod boolean;
pub mod brent;
pub mod detector;
pub mod filters;
pub mod handlers;
pub mod logger;
pub mod negate;
pub mod scheduler;
pub mod settings;
mod tracker;

pub use action::Action;
pub use boolean::{BooleanDetector, Operator};
pub use brent::{Bracket, BrentError, BrentSolver};
pub use detector::{DateDetector, EventDetector, FunctionDetector, DEFAULT_MIN_GAP};
pub use filters::{EnablingPredicateFilter, FilterType, SlopeFilter};
pub use handlers::{
    handler_fn, ContinueOnEvent, EventHandler, EventMultipleHandler, FnHandler,
    RecordAndContinue, ResetDerivativesOnEvent, StopOnDecreasing, StopOnEvent, StopOnIncreasing,
};
pub use logger::{EventsLogger, LoggedEvent, LoggingWrapper};
pub use negate::NegateDetector;
pub use scheduler::{DetectorId, EventScheduler, StepOutcome};
pub use settings::{
    DetectionSettings, MaxCheck, DEFAULT_MAX_CHECK, DEFAULT_MAX_ITER, DEFAULT_THRESHOLD,
};
