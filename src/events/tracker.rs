//! Per-detector root isolation across steps.
//!
//! An [`EventTracker`] remembers the sign of `g` at the last point known
//! to be free of events (`t0`, `g0`). Over a new step it samples `g` at
//! intervals of at most the detector's max check, and when the sign flips
//! it brackets the root with Brent's method down to the detector
//! threshold. The root is kept *pending* until the scheduler decides
//! whether it is the earliest event of the step.
//!
//! Zeros where `g` touches the axis without changing sign are skipped:
//! the search restarts just past them until a genuine sign reversal is
//! found or the step end is reached.

use crate::error::EventError;
use crate::events::action::Action;
use crate::events::brent::BrentSolver;
use crate::events::detector::EventDetector;
use crate::propagation::StepInterpolator;
use crate::scalar::Scalar;
use crate::state::Timed;

/// Root bracketed but not yet delivered.
#[derive(Debug, Clone, Copy)]
struct Pending<T> {
    /// At or just before the root, in propagation order
    time: T,
    /// Where propagation stops if the handler asks to
    stop_time: T,
    /// Just past the root
    after_time: T,
    /// `g` at `after_time`
    after_g: T,
}

/// Outcome of delivering a pending event to its detector.
#[derive(Debug)]
pub(crate) struct EventOccurrence<S: Timed> {
    pub action: Action<S>,
    pub stop_time: S::Scalar,
    pub increasing: bool,
}

/// Run-scoped sign history of one detector.
#[derive(Debug)]
pub(crate) struct EventTracker<S: Timed> {
    t0: S::Scalar,
    g0: S::Scalar,
    g0_positive: bool,
    forward: bool,
    /// Direction of the last crossing, relative to propagation
    increasing: bool,
    pending: Option<Pending<S::Scalar>>,
    earliest_time_considered: Option<S::Scalar>,
}

impl<S: Timed> EventTracker<S> {
    pub fn new() -> Self {
        let zero = S::Scalar::zero();
        Self {
            t0: zero,
            g0: zero,
            g0_positive: true,
            forward: true,
            increasing: true,
            pending: None,
            earliest_time_considered: None,
        }
    }

    /// Start of a run: forward to the detector and forget any history.
    pub fn init(&mut self, detector: &mut dyn EventDetector<S>, initial: &S, target: S::Scalar) {
        detector.init(initial, target);
        self.t0 = initial.time();
        self.pending = None;
        self.earliest_time_considered = None;
    }

    /// Time of the pending event, if any.
    pub fn pending_time(&self) -> Option<S::Scalar> {
        self.pending.map(|p| p.time)
    }

    /// Establish the sign of `g` at the start of a step.
    ///
    /// After an event inside the previous step (reset or restart), the
    /// start is moved past that event so it is not found a second time.
    /// An exact zero at the start is stepped over by half a threshold.
    /// When `g` stays zero up to the step end, the sign is left undecided
    /// and looked for again in the next step.
    pub fn reinitialize_begin(
        &mut self,
        detector: &dyn EventDetector<S>,
        interpolator: &dyn StepInterpolator<S>,
    ) {
        self.forward = interpolator.is_forward();
        let previous = interpolator.previous_state();
        let current = interpolator.current_state();

        let (t0, g0) = match self.earliest_time_considered {
            Some(earliest) if self.strictly_after(previous.time(), earliest) => {
                let t = self.min_time(earliest, current.time());
                (t, detector.g(&interpolator.interpolated_state(t)))
            }
            _ => (previous.time(), detector.g(previous)),
        };

        self.set_start(detector, interpolator, t0, g0);
        self.pending = None;
    }

    /// Take `(t0, g0)` as the last sample free of events, moving it off an
    /// exact zero of `g` but never past the end of the step.
    ///
    /// Away from the first half threshold the gap doubles at each zero
    /// sample, so a function vanishing over a whole step costs a few dozen
    /// evaluations.
    fn set_start(
        &mut self,
        detector: &dyn EventDetector<S>,
        interpolator: &dyn StepInterpolator<S>,
        mut t0: S::Scalar,
        mut g0: S::Scalar,
    ) {
        let end = interpolator.current_state().time();
        let mut gap = 0.5 * detector.settings().threshold();
        while g0.real() == 0.0 && self.strictly_after(t0, end) {
            let mut start = self.shifted_by(t0, gap);
            if start.real() == t0.real() {
                start = t0.next_after(self.forward);
            }
            t0 = self.min_time(start, end);
            g0 = detector.g(&interpolator.interpolated_state(t0));
            gap *= 2.0;
        }

        self.t0 = t0;
        self.g0 = g0;
        self.g0_positive = g0.real() > 0.0;
        self.increasing = self.g0_positive;
    }

    /// Look for the first root of `g` in the step.
    ///
    /// Returns true when an event is now pending.
    pub fn evaluate_step(
        &mut self,
        detector: &dyn EventDetector<S>,
        interpolator: &dyn StepInterpolator<S>,
    ) -> Result<bool, EventError> {
        self.forward = interpolator.is_forward();
        if self.g0.real() == 0.0 {
            // no sign known yet
            self.set_start(detector, interpolator, self.t0, self.g0);
        }
        let settings = detector.settings();
        let end = interpolator.current_state();
        let t1 = end.time();

        if (t1 - self.t0).real().abs() < settings.threshold() {
            // nothing can be resolved on such a short interval
            self.pending = None;
            return Ok(false);
        }

        let mut ta = self.t0;
        let mut ga = self.g0;
        while ta.real() != t1.real() {
            let sa = interpolator.interpolated_state(ta);
            let interval = settings.current_interval(&sa, self.forward)?;
            let tb = self.min_time(self.shifted_by(ta, interval), t1);
            let gb = if tb.real() == t1.real() {
                detector.g(end)
            } else {
                detector.g(&interpolator.interpolated_state(tb))
            };

            if gb.real() == 0.0 || self.g0_positive != (gb.real() > 0.0) {
                if self.find_root(detector, interpolator, ta, ga, tb, gb)? {
                    return Ok(true);
                }
            }
            ta = tb;
            ga = gb;
        }

        self.pending = None;
        Ok(false)
    }

    /// Bracket a root in `[ta, tb]`, skipping roots that are not sign changes.
    fn find_root(
        &mut self,
        detector: &dyn EventDetector<S>,
        interpolator: &dyn StepInterpolator<S>,
        ta: S::Scalar,
        ga: S::Scalar,
        tb: S::Scalar,
        gb: S::Scalar,
    ) -> Result<bool, EventError> {
        let settings = detector.settings();
        let threshold = settings.threshold();
        let solver = BrentSolver::new(threshold, settings.max_iterations());
        let g_at = |t: S::Scalar| detector.g(&interpolator.interpolated_state(t));

        let mut before_t: Option<S::Scalar> = None;
        let mut before_g = S::Scalar::zero();
        let mut after_t = ta;
        let mut after_g = S::Scalar::zero();

        if ta.real() == tb.real() {
            // both non-zero but at the same time, typically after a reset
            before_t = Some(ta);
            before_g = ga;
            after_t = self.shifted_by(ta, threshold);
            after_g = g_at(after_t);
        } else if ga.real() != 0.0 && gb.real() == 0.0 {
            // look past tb for the sign on the other side
            before_t = Some(tb);
            before_g = gb;
            after_t = self.shifted_by(tb, threshold);
            after_g = g_at(after_t);
        } else if ga.real() != 0.0 {
            let new_ga = g_at(ta);
            if (ga.real() > 0.0) != (new_ga.real() > 0.0) {
                // sign already changed at ta, possibly because of a reset
                let next_t = self.min_time(self.shifted_by(ta, threshold), tb);
                let next_g = g_at(next_t);
                if (next_g.real() > 0.0) != self.g0_positive {
                    before_t = Some(ta);
                    before_g = new_ga;
                    after_t = next_t;
                    after_g = next_g;
                }
            }
        }

        let mut loop_t = ta;
        let mut loop_g = ga;
        let mut zero_gap = threshold;
        while (after_g.real() == 0.0 || (after_g.real() > 0.0) == self.g0_positive)
            && self.strictly_after(after_t, tb)
        {
            if loop_g.real() == 0.0 {
                // root exactly at loop_t: look just past it
                before_t = Some(loop_t);
                before_g = loop_g;
                after_t = self.min_time(self.shifted_by(loop_t, zero_gap), tb);
                after_g = g_at(after_t);
                // loop_t is already a root: widen the look-ahead over flat zeros
                zero_gap *= 2.0;
            } else {
                zero_gap = threshold;
                let bracket = solver
                    .solve_bracket(g_at, loop_t, tb, Some(loop_g), Some(gb))
                    .map_err(|source| EventError::RootFinding {
                        detector: detector.name().to_string(),
                        source,
                    })?;
                tracing::trace!(
                    detector = detector.name(),
                    lower = bracket.lower.real(),
                    upper = bracket.upper.real(),
                    iterations = bracket.iterations,
                    "bracketed root"
                );
                if self.forward {
                    before_t = Some(bracket.lower);
                    before_g = bracket.lower_value;
                    after_t = bracket.upper;
                    after_g = bracket.upper_value;
                } else {
                    before_t = Some(bracket.upper);
                    before_g = bracket.upper_value;
                    after_t = bracket.lower;
                    after_g = bracket.lower_value;
                }
            }

            if before_t.map(|t| t.real()) == Some(after_t.real()) {
                after_t = after_t.next_after(self.forward);
                after_g = g_at(after_t);
            }

            loop_t = after_t;
            loop_g = after_g;
        }

        let crossed = after_g.real() != 0.0 && (after_g.real() > 0.0) != self.g0_positive;
        let before_t = match before_t {
            Some(t) if crossed => t,
            _ => return Ok(false),
        };

        // The bracket ends are plain samples: a secant through them carries
        // the sensitivity of the root when computing with dual numbers.
        let time = if before_g.real() != after_g.real() {
            let secant = before_t - before_g * (after_t - before_t) / (after_g - before_g);
            secant.with_real(before_t.real())
        } else {
            before_t
        };

        self.increasing = !self.g0_positive;
        self.pending = Some(Pending {
            time,
            stop_time: if before_g.real() == 0.0 {
                before_t
            } else {
                after_t
            },
            after_time: after_t,
            after_g,
        });
        Ok(true)
    }

    /// Check whether the detector fires before `state`, an earlier event
    /// of another detector, and move `t0` there otherwise.
    ///
    /// Returns true when this detector now has a pending event before
    /// `state` that was not pending already.
    pub fn try_advance(
        &mut self,
        detector: &dyn EventDetector<S>,
        state: &S,
        interpolator: &dyn StepInterpolator<S>,
    ) -> Result<bool, EventError> {
        let t = state.time();
        let skip = matches!(
            self.earliest_time_considered,
            Some(earliest) if self.strictly_after(t, earliest)
        );

        if self.g0.real() == 0.0 {
            // zero since t0: nothing to bracket against
            return Ok(false);
        }

        let me_first = if skip {
            false
        } else {
            let g = detector.g(state);
            if (g.real() > 0.0) == self.g0_positive {
                self.g0 = g;
                false
            } else {
                let old = self.pending.map(|p| p.time.real());
                let found = self.find_root(detector, interpolator, self.t0, self.g0, t, g)?;
                found && self.pending.map(|p| p.time.real()) != old
            }
        };

        if !me_first {
            self.t0 = t;
        }
        Ok(me_first)
    }

    /// Deliver the pending event to the detector and re-arm past it.
    pub fn do_event(
        &mut self,
        detector: &mut dyn EventDetector<S>,
        state: &S,
    ) -> Result<EventOccurrence<S>, EventError> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| EventError::NoPendingEvent(detector.name().to_string()))?;

        let increasing = self.increasing == self.forward;
        let action = detector.event_occurred(state, increasing);

        self.earliest_time_considered = Some(pending.after_time);
        self.t0 = pending.after_time;
        self.g0 = pending.after_g;
        self.g0_positive = self.increasing;

        Ok(EventOccurrence {
            action,
            stop_time: pending.stop_time,
            increasing,
        })
    }

    /// `t2` comes strictly after `t1` in propagation order.
    fn strictly_after(&self, t1: S::Scalar, t2: S::Scalar) -> bool {
        if self.forward {
            t1.real() < t2.real()
        } else {
            t2.real() < t1.real()
        }
    }

    /// Earlier of two times in propagation order.
    fn min_time(&self, t1: S::Scalar, t2: S::Scalar) -> S::Scalar {
        if self.strictly_after(t1, t2) {
            t1
        } else {
            t2
        }
    }

    fn shifted_by(&self, t: S::Scalar, delta: f64) -> S::Scalar {
        if self.forward {
            t + S::Scalar::from_f64(delta)
        } else {
            t - S::Scalar::from_f64(delta)
        }
    }
}
