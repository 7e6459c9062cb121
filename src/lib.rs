//! # zerocross: switching-function event detection
//!
//! Detects the instants where a user-defined switching function `g(state)`
//! changes sign along a propagated trajectory, and lets each detector
//! decide what happens next: keep going, stop, or restart from a new state.
//!
//! ## Features
//!
//! - Sign-change sampling with adaptive, state-dependent check intervals
//! - Root isolation with Brent's method down to a per-detector threshold
//! - Multi-detector scheduling: events delivered in time order, exactly once,
//!   ties broken by registration order
//! - Combinators: boolean AND / OR, negation, slope and predicate filters
//! - Shared event logging with immutable snapshots
//! - Generic numeric type: run the same engine on [`Dual`] numbers to get
//!   the sensitivity of event times to a parameter
//! - Two host propagators: an adaptive RKF7(8) integrator ([`Rkf78`]) and a
//!   closed-form one ([`AnalyticalPropagator`])
//!
//! ## Basic Usage
//!
//! ```rust
//! use zerocross::{FunctionDetector, OdeState, OdeSystem, Rkf78, StopOnDecreasing, Tolerances};
//!
//! struct HarmonicOscillator { omega: f64 }
//!
//! impl OdeSystem<2> for HarmonicOscillator {
//!     fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
//!         dydt[0] = y[1];
//!         dydt[1] = -self.omega * self.omega * y[0];
//!     }
//! }
//!
//! let mut solver = Rkf78::new(Tolerances::new(1e-12, 1e-12));
//! solver.set_step_limits(1e-14, 0.2);
//!
//! // stop when x falls through 0.5
//! solver.add_event_detector(
//!     FunctionDetector::new("x = 0.5", |s: &OdeState<2>| s.y[0] - 0.5)
//!         .with_handler(StopOnDecreasing),
//! );
//!
//! let sys = HarmonicOscillator { omega: 1.0 };
//! let result = solver.propagate(&sys, 0.0, &[1.0, 0.0], 10.0, 0.1).unwrap();
//! assert!(result.is_stopped());
//! assert!((result.state().t - std::f64::consts::FRAC_PI_3).abs() < 1e-4);
//! ```
//!
//! ## Combining Detectors
//!
//! ```rust
//! use zerocross::{
//!     AnalyticalPropagator, BooleanDetector, DetectionSettings, EventDetector, EventsLogger,
//!     FnModel, FunctionDetector, OdeState,
//! };
//!
//! type State = OdeState<2>;
//!
//! // x = cos t, y = sin t
//! let model = FnModel::new(|t: f64| OdeState::new(t, [t.cos(), t.sin()]));
//! let settings = || DetectionSettings::constant(0.5, 1e-9, 100).unwrap();
//! let first_quadrant: Vec<Box<dyn EventDetector<State>>> = vec![
//!     Box::new(FunctionDetector::new("x", |s: &State| s.y[0]).with_settings(settings())),
//!     Box::new(FunctionDetector::new("y", |s: &State| s.y[1]).with_settings(settings())),
//! ];
//!
//! let logger = EventsLogger::new();
//! let mut propagator = AnalyticalPropagator::new(model);
//! propagator.add_event_detector(
//!     logger.monitor_detector(BooleanDetector::and_combine(first_quadrant).unwrap()),
//! );
//! propagator.propagate(0.1, 7.0).unwrap();
//!
//! // leaves the first quadrant at π/2 and enters it again at 2π
//! let events = logger.logged_events();
//! assert_eq!(events.len(), 2);
//! assert!(!events[0].increasing);
//! assert!(events[1].increasing);
//! ```
//!
//! ## Writing a Detector
//!
//! Implement [`EventDetector`]: a name, [`DetectionSettings`] (max check
//! interval, convergence threshold, iteration budget), the switching
//! function and the reaction to an event. Closures cover most cases
//! through [`FunctionDetector`] and the handlers in [`events::handlers`].
//!
//! A detector must be safe to evaluate at any time within the current step,
//! in any order: roots are bracketed by going back and forth.
//!
//! ## Threshold Selection
//!
//! The threshold bounds the width of the final bracket around the root, in
//! time units. It must be small compared to the max check interval, which
//! in turn must be smaller than the shortest time between two roots of the
//! same detector: two roots within one check interval cancel out and are
//! never seen.
//!
//! ## Logging
//!
//! The engine emits [`tracing`] events: `debug` for delivered events and
//! propagation start and end, `trace` for accepted steps and bracketed
//! roots. Install any subscriber to see them.
//!
//! ## References
//!
//! 1. Brent, R.P. (1973). "Algorithms for Minimization without
//!    Derivatives". Prentice-Hall.
//!
//! 2. Fehlberg, E. (1968). "Classical Fifth-, Sixth-, Seventh-, and
//!    Eighth-Order Runge-Kutta Formulas with Stepsize Control".
//!    NASA TR R-287.
//!
//! 3. Shampine, L.F., & Thompson, S. (2000). "Event location for ordinary
//!    differential equations". Computers & Mathematics with Applications.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod events;
pub mod propagation;
pub mod scalar;
pub mod state;

pub use error::EventError;
pub use events::{
    handler_fn, Action, BooleanDetector, BrentError, BrentSolver, ContinueOnEvent, DateDetector,
    DetectionSettings, DetectorId, EnablingPredicateFilter, EventDetector, EventHandler,
    EventMultipleHandler, EventScheduler, EventsLogger, FilterType, FunctionDetector, LoggedEvent,
    MaxCheck, NegateDetector, Operator, RecordAndContinue, ResetDerivativesOnEvent, SlopeFilter,
    StepOutcome, StopOnDecreasing, StopOnEvent, StopOnIncreasing,
};
pub use propagation::{
    AnalyticalModel, AnalyticalPropagator, FnModel, IntegrationError, OdeSystem, Rkf78,
    Rkf78Result, StepHandler, StepInterpolator, StepNormalizer, Tolerances,
};
pub use scalar::{Dual, Scalar};
pub use state::{OdeState, Timed};
