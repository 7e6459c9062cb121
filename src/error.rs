//! Error types for the detection engine.

use thiserror::Error;

use crate::events::brent::BrentError;

/// Errors raised by detectors, the root isolation engine and the scheduler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    // Configuration errors, rejected at construction
    /// Convergence threshold not strictly positive and finite
    #[error("invalid convergence threshold {0}: must be positive and finite")]
    InvalidThreshold(f64),

    /// Max check interval not strictly positive (constant or adaptive value)
    #[error("invalid max check interval {0}: must be positive")]
    InvalidMaxCheck(f64),

    /// Zero max iteration count
    #[error("max iteration count must be at least 1")]
    InvalidMaxIterations,

    /// Boolean combinator built from no sub-detector
    #[error("a boolean detector needs at least one sub-detector")]
    EmptyDetectorSet,

    /// Output interval of a step normalizer not strictly positive and finite
    #[error("invalid output step {0}: must be positive and finite")]
    InvalidOutputStep(f64),

    /// Two dates of a date detector closer than its minimum gap
    #[error("event dates {first} and {second} are closer than the minimum gap {min_gap}")]
    DatesTooClose {
        /// Existing date
        first: f64,
        /// Rejected date
        second: f64,
        /// Configured minimum gap
        min_gap: f64,
    },

    // Run-time failures
    /// Bracket did not converge, or solver preconditions failed
    #[error("root finding failed for detector `{detector}`: {source}")]
    RootFinding {
        /// Name of the detector whose root could not be isolated
        detector: String,
        /// Solver failure
        #[source]
        source: BrentError,
    },

    /// A handler returned a replacement state at another time than the event
    #[error("detector `{detector}` reset the state at t = {reset} instead of event time {event}")]
    ResetTimeMismatch {
        /// Detector that requested the reset
        detector: String,
        /// Event time
        event: f64,
        /// Time of the replacement state
        reset: f64,
    },

    /// The propagator cannot restart from an arbitrary state
    #[error("state reset is not supported by this propagator")]
    ResetUnsupported,

    /// Scheduler bookkeeping was asked to fire a detector without a pending event
    #[error("detector `{0}` has no pending event")]
    NoPendingEvent(String),
}
