//! Runge-Kutta-Fehlberg 7(8) host propagator
//!
//! A 13-stage embedded RK7(8) pair for high-precision integration of ODEs,
//! with event detection through an [`EventScheduler`]. Every accepted step
//! is exposed to the scheduler and to step handlers through a cubic
//! Hermite interpolator built from the states and derivatives at both ends
//! of the step.
//!
//! Reference: NASA TR R-287, Erwin Fehlberg, 1968

use thiserror::Error;

use crate::error::EventError;
use crate::events::{DetectorId, EventDetector, EventScheduler, StepOutcome};
use crate::propagation::tableau::{A, B, B_ERR, C, STAGES};
use crate::propagation::{StepHandler, StepInterpolator};
use crate::state::OdeState;

/// System of ordinary differential equations: dy/dt = f(t, y)
pub trait OdeSystem<const N: usize> {
    /// Evaluate the right-hand side of the ODE system
    ///
    /// # Arguments
    /// * `t` - Current time
    /// * `y` - Current state vector
    /// * `dydt` - Output: derivative dy/dt
    fn rhs(&self, t: f64, y: &[f64; N], dydt: &mut [f64; N]);
}

/// Integration result from a single step
#[derive(Debug, Clone)]
pub struct StepResult<const N: usize> {
    /// New state after the step (8th order solution)
    pub y: [f64; N],
    /// New time value
    pub t: f64,
    /// Normalized error estimate (should be ≤ 1.0 for acceptance)
    pub error: f64,
    /// Suggested step size for next step
    pub h_next: f64,
    /// Whether the step was accepted
    pub accepted: bool,
}

/// Integration statistics for diagnostics
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Total number of function evaluations
    pub fn_evals: u64,
    /// Number of accepted steps
    pub accepted_steps: u64,
    /// Number of rejected steps
    pub rejected_steps: u64,
    /// Number of restarts requested by event handlers
    pub restarts: u64,
}

/// Step-size controller using an I-controller
///
/// h_new = safety * h * error^(-1/8)
#[derive(Debug, Clone)]
pub struct StepController {
    /// Safety factor (0.8-0.9 typical)
    pub safety: f64,
    /// Maximum growth factor per step
    pub max_factor: f64,
    /// Minimum reduction factor per step
    pub min_factor: f64,
    exponent: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: 1.0 / 8.0,
        }
    }
}

impl StepController {
    /// Step size adjustment factor for a normalized error
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }
        (self.safety * error.powf(-self.exponent)).clamp(self.min_factor, self.max_factor)
    }
}

/// Tolerances for error control
///
/// Error is computed as: |y8 - y7| / (atol + rtol * |y8|)
#[derive(Debug, Clone)]
pub struct Tolerances<const N: usize> {
    /// Absolute tolerance per component
    pub atol: [f64; N],
    /// Relative tolerance per component
    pub rtol: [f64; N],
}

impl<const N: usize> Tolerances<N> {
    /// Create tolerances with uniform values
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self {
            atol: [atol; N],
            rtol: [rtol; N],
        }
    }

    /// Create tolerances with per-component values
    pub fn with_components(atol: [f64; N], rtol: [f64; N]) -> Self {
        Self { atol, rtol }
    }
}

/// How a propagation ended
#[derive(Debug, Clone, PartialEq)]
pub enum Rkf78Result<const N: usize> {
    /// Reached the target time
    Completed(OdeState<N>),
    /// An event handler asked to stop
    Stopped(OdeState<N>),
}

impl<const N: usize> Rkf78Result<N> {
    /// Final state, whatever the reason propagation ended.
    pub fn state(&self) -> &OdeState<N> {
        match self {
            Rkf78Result::Completed(state) | Rkf78Result::Stopped(state) => state,
        }
    }

    /// True when an event stopped propagation.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Rkf78Result::Stopped(_))
    }
}

/// Errors that can occur during integration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    /// Step size became too small
    #[error("step size {h} too small at t = {t}")]
    StepSizeTooSmall {
        /// Time at which step size became too small
        t: f64,
        /// Step size that was too small
        h: f64,
    },
    /// Maximum number of steps exceeded
    #[error("maximum number of integration steps exceeded")]
    MaxStepsExceeded,
    /// Invalid input parameters
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the invalid input
        message: String,
    },
    /// Non-finite state detected during integration
    #[error("non-finite state detected at t = {t}")]
    NonFiniteState {
        /// Time at which non-finite state was detected
        t: f64,
    },
    /// Event detection failed
    #[error(transparent)]
    Event(#[from] EventError),
}

/// Cubic Hermite dense output over one step.
///
/// Built from the states and derivatives at both ends; O(h⁴) accurate.
#[derive(Debug, Clone)]
pub struct HermiteInterpolator<const N: usize> {
    previous: OdeState<N>,
    current: OdeState<N>,
    f_previous: [f64; N],
    f_current: [f64; N],
}

impl<const N: usize> HermiteInterpolator<N> {
    /// Interpolator over `[previous, current]` with derivatives at both ends.
    pub fn new(
        previous: OdeState<N>,
        f_previous: [f64; N],
        current: OdeState<N>,
        f_current: [f64; N],
    ) -> Self {
        Self {
            previous,
            current,
            f_previous,
            f_current,
        }
    }
}

impl<const N: usize> StepInterpolator<OdeState<N>> for HermiteInterpolator<N> {
    fn previous_state(&self) -> &OdeState<N> {
        &self.previous
    }

    fn current_state(&self) -> &OdeState<N> {
        &self.current
    }

    fn interpolated_state(&self, t: f64) -> OdeState<N> {
        let dt = self.current.t - self.previous.t;
        if dt == 0.0 {
            return self.previous;
        }
        let alpha = (t - self.previous.t) / dt;
        let a2 = alpha * alpha;
        let a3 = a2 * alpha;
        // Hermite basis functions
        let h00 = 1.0 - 3.0 * a2 + 2.0 * a3;
        let h10 = alpha - 2.0 * a2 + a3;
        let h01 = 3.0 * a2 - 2.0 * a3;
        let h11 = a3 - a2;

        let mut y = [0.0; N];
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = h00 * self.previous.y[i]
                + h10 * dt * self.f_previous[i]
                + h01 * self.current.y[i]
                + h11 * dt * self.f_current[i];
        }
        OdeState::new(t, y)
    }

    fn is_forward(&self) -> bool {
        self.current.t >= self.previous.t
    }
}

/// Runge-Kutta-Fehlberg 7(8) integrator
///
/// # Type Parameters
/// * `N` - Dimension of the state vector
///
/// # Example
/// ```
/// use zerocross::{FunctionDetector, OdeState, OdeSystem, Rkf78, StopOnEvent, Tolerances};
///
/// struct HarmonicOscillator { omega: f64 }
///
/// impl OdeSystem<2> for HarmonicOscillator {
///     fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
///         dydt[0] = y[1];
///         dydt[1] = -self.omega * self.omega * y[0];
///     }
/// }
///
/// let mut solver = Rkf78::new(Tolerances::new(1e-12, 1e-12));
/// solver.add_event_detector(
///     FunctionDetector::new("x = 0", |s: &OdeState<2>| s.y[0]).with_handler(StopOnEvent),
/// );
///
/// let sys = HarmonicOscillator { omega: 1.0 };
/// let result = solver.propagate(&sys, 0.0, &[1.0, 0.0], 10.0, 0.1).unwrap();
/// assert!(result.is_stopped());
/// assert!((result.state().t - std::f64::consts::FRAC_PI_2).abs() < 1e-2);
/// ```
pub struct Rkf78<const N: usize> {
    tol: Tolerances<N>,
    controller: StepController,
    /// Minimum step size
    pub h_min: f64,
    /// Maximum step size
    pub h_max: f64,
    /// Maximum number of integration steps before error
    pub max_steps: u64,
    /// Stage evaluations (pre-allocated workspace)
    k: [[f64; N]; STAGES],
    /// Integration statistics
    pub stats: Stats,
    events: EventScheduler<OdeState<N>>,
    step_handlers: Vec<Box<dyn StepHandler<OdeState<N>>>>,
}

impl<const N: usize> Rkf78<N> {
    /// Create a new RKF78 solver with specified tolerances
    pub fn new(tol: Tolerances<N>) -> Self {
        Self {
            tol,
            controller: StepController::default(),
            h_min: 1e-14,
            h_max: f64::INFINITY,
            max_steps: 10_000_000,
            k: [[0.0; N]; STAGES],
            stats: Stats::default(),
            events: EventScheduler::new(),
            step_handlers: Vec::new(),
        }
    }

    /// Replace the step-size controller
    pub fn with_controller(mut self, controller: StepController) -> Self {
        self.controller = controller;
        self
    }

    /// Set minimum and maximum step sizes
    pub fn set_step_limits(&mut self, h_min: f64, h_max: f64) {
        self.h_min = h_min;
        self.h_max = h_max;
    }

    /// Register an event detector
    pub fn add_event_detector(
        &mut self,
        detector: impl EventDetector<OdeState<N>> + 'static,
    ) -> DetectorId {
        self.events.add_detector(detector)
    }

    /// Unregister an event detector
    pub fn remove_event_detector(
        &mut self,
        id: DetectorId,
    ) -> Option<Box<dyn EventDetector<OdeState<N>>>> {
        self.events.remove_detector(id)
    }

    /// Registered event detectors
    pub fn events(&self) -> &EventScheduler<OdeState<N>> {
        &self.events
    }

    /// Registered event detectors, mutably
    pub fn events_mut(&mut self) -> &mut EventScheduler<OdeState<N>> {
        &mut self.events
    }

    /// Register a step handler
    pub fn add_step_handler(&mut self, handler: impl StepHandler<OdeState<N>> + 'static) {
        self.step_handlers.push(Box::new(handler));
    }

    /// Unregister all step handlers
    pub fn clear_step_handlers(&mut self) {
        self.step_handlers.clear();
    }

    /// Perform a single integration step
    ///
    /// This computes the 13 stages, forms the 8th and 7th order solutions,
    /// estimates the error, and determines if the step should be accepted.
    pub fn step<Sys: OdeSystem<N>>(
        &mut self,
        sys: &Sys,
        t: f64,
        y: &[f64; N],
        h: f64,
    ) -> StepResult<N> {
        let h = h.signum() * h.abs().clamp(self.h_min, self.h_max);

        self.compute_stages(sys, t, y, h);
        let y8 = self.compute_solution(y, h);
        let error = self.compute_error(&y8, h);
        let accepted = error <= 1.0;

        // always a positive magnitude
        let factor = self.controller.compute_factor(error);
        let h_next = (h.abs() * factor).clamp(self.h_min, self.h_max);

        self.stats.fn_evals += STAGES as u64;
        if accepted {
            self.stats.accepted_steps += 1;
        } else {
            self.stats.rejected_steps += 1;
        }

        StepResult {
            y: y8,
            t: t + h,
            error,
            h_next,
            accepted,
        }
    }

    /// Propagate from `t0` to `tf`, detecting events on the way.
    ///
    /// Detectors and step handlers are initialized with the initial state
    /// and `tf`, and notified when propagation ends. A detector action may
    /// stop propagation early or restart it from a new state.
    ///
    /// # Errors
    /// Invalid inputs, step size underflow, too many steps, non-finite
    /// states and event detection failures.
    pub fn propagate<Sys: OdeSystem<N>>(
        &mut self,
        sys: &Sys,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<Rkf78Result<N>, IntegrationError> {
        let initial = OdeState::new(t0, *y0);
        if t0 == tf {
            return Ok(Rkf78Result::Completed(initial));
        }
        self.validate_inputs(t0, y0, tf, h0)?;

        self.events.init(&initial, tf);
        for handler in &mut self.step_handlers {
            handler.init(&initial, tf);
        }
        tracing::debug!(t0, tf, detectors = self.events.len(), "starting propagation");

        let mut t = t0;
        let mut y = *y0;
        let mut h = h0;

        let direction = (tf - t0).signum();
        let mut step_count = 0u64;

        while (tf - t) * direction > self.h_min {
            // Don't overshoot the endpoint
            if (t + h - tf) * direction > 0.0 {
                h = tf - t;
            }

            let result = self.step(sys, t, &y, h);

            if result.accepted {
                if !result.y.iter().all(|v| v.is_finite()) {
                    return Err(IntegrationError::NonFiniteState { t: result.t });
                }
                let f_start = self.k[0];
                let mut f_end = [0.0; N];
                sys.rhs(result.t, &result.y, &mut f_end);
                self.stats.fn_evals += 1;

                let interpolator = HermiteInterpolator::new(
                    OdeState::new(t, y),
                    f_start,
                    OdeState::new(result.t, result.y),
                    f_end,
                );
                tracing::trace!(t = result.t, h = result.t - t, "accepted step");

                match self.events.accept_step(&interpolator, &mut self.step_handlers)? {
                    StepOutcome::Continue => {
                        t = result.t;
                        y = result.y;
                    }
                    StepOutcome::Stop(state) => {
                        tracing::debug!(t = state.t, "propagation stopped by event");
                        self.finish(&state);
                        return Ok(Rkf78Result::Stopped(state));
                    }
                    StepOutcome::ResetState(state) | StepOutcome::ResetDerivatives(state) => {
                        tracing::debug!(t = state.t, "propagation restarted by event");
                        self.stats.restarts += 1;
                        t = state.t;
                        y = state.y;
                    }
                }
            }

            h = result.h_next * direction;

            step_count += 1;
            if step_count > self.max_steps {
                return Err(IntegrationError::MaxStepsExceeded);
            }

            // Rejected at h_min: no way to make progress
            if !result.accepted && result.h_next <= self.h_min && (tf - t) * direction > self.h_min
            {
                return Err(IntegrationError::StepSizeTooSmall {
                    t,
                    h: result.h_next,
                });
            }
        }

        let last = OdeState::new(t, y);
        self.finish(&last);
        tracing::debug!(t, steps = step_count, "propagation completed");
        Ok(Rkf78Result::Completed(last))
    }

    fn finish(&mut self, last: &OdeState<N>) {
        for handler in &mut self.step_handlers {
            handler.finish(last);
        }
        self.events.finish(last);
    }

    /// Compute all 13 stages
    #[allow(clippy::needless_range_loop)]
    fn compute_stages<Sys: OdeSystem<N>>(&mut self, sys: &Sys, t: f64, y: &[f64; N], h: f64) {
        let mut y_temp = [0.0; N];

        sys.rhs(t, y, &mut self.k[0]);

        for i in 1..STAGES {
            // y_temp = y + h * sum_{j<i} a[i][j] * k[j]
            for n in 0..N {
                let mut sum = 0.0;
                for j in 0..i {
                    sum += A[i][j] * self.k[j][n];
                }
                y_temp[n] = y[n] + h * sum;
            }
            sys.rhs(t + C[i] * h, &y_temp, &mut self.k[i]);
        }
    }

    /// Compute the 8th order solution from the stages
    #[allow(clippy::needless_range_loop)]
    fn compute_solution(&self, y: &[f64; N], h: f64) -> [f64; N] {
        let mut y_new = [0.0; N];
        for n in 0..N {
            let mut sum = 0.0;
            for i in 0..STAGES {
                sum += B[i] * self.k[i][n];
            }
            y_new[n] = y[n] + h * sum;
        }
        y_new
    }

    /// Infinity norm of the local error scaled by atol + rtol * |y8|
    #[allow(clippy::needless_range_loop)]
    fn compute_error(&self, y8: &[f64; N], h: f64) -> f64 {
        let mut max_err: f64 = 0.0;
        for n in 0..N {
            let mut err_n = 0.0;
            for i in 0..STAGES {
                err_n += B_ERR[i] * self.k[i][n];
            }
            let scale = self.tol.atol[n] + self.tol.rtol[n] * y8[n].abs();
            max_err = max_err.max((h * err_n).abs() / scale);
        }
        max_err
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    fn validate_inputs(
        &self,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(), IntegrationError> {
        let invalid = |message: String| Err(IntegrationError::InvalidInput { message });

        if !t0.is_finite() || !tf.is_finite() || !h0.is_finite() {
            return invalid("t0, tf, and h0 must be finite".to_string());
        }
        if h0 == 0.0 {
            return invalid("h0 must be non-zero".to_string());
        }
        if h0.signum() != (tf - t0).signum() {
            return invalid("h0 sign must match integration direction (tf - t0)".to_string());
        }
        if let Some(i) = y0.iter().position(|v| !v.is_finite()) {
            return invalid(format!("y0[{}] is not finite", i));
        }
        for (i, (&a, &r)) in self.tol.atol.iter().zip(self.tol.rtol.iter()).enumerate() {
            if !a.is_finite() || a <= 0.0 {
                return invalid(format!("atol[{}] must be positive and finite", i));
            }
            if !r.is_finite() || r < 0.0 {
                return invalid(format!("rtol[{}] must be non-negative and finite", i));
            }
        }
        Ok(())
    }
}

impl<const N: usize> std::fmt::Debug for Rkf78<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rkf78")
            .field("tol", &self.tol)
            .field("controller", &self.controller)
            .field("h_min", &self.h_min)
            .field("h_max", &self.h_max)
            .field("max_steps", &self.max_steps)
            .field("stats", &self.stats)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
