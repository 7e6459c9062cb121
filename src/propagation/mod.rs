//! Propagator side of the detection engine.
//!
//! The engine does not integrate anything: a host propagator advances one
//! step, exposes it through a [`StepInterpolator`] and hands it to the
//! [`EventScheduler`](crate::events::EventScheduler). Two hosts ship with
//! the crate:
//!
//! - [`Rkf78`], an adaptive Runge-Kutta-Fehlberg 7(8) integrator;
//! - [`AnalyticalPropagator`], driven by a closed-form model.

pub mod analytical;
pub mod normalizer;
pub mod rkf78;
pub mod tableau;

pub use analytical::{AnalyticalModel, AnalyticalPropagator, FnModel};
pub use normalizer::StepNormalizer;
pub use rkf78::{
    HermiteInterpolator, IntegrationError, OdeSystem, Rkf78, Rkf78Result, Stats, StepController,
    StepResult, Tolerances,
};

use crate::state::Timed;

/// Dense output over one accepted step.
pub trait StepInterpolator<S: Timed> {
    /// State at the start of the step.
    fn previous_state(&self) -> &S;

    /// State at the end of the step.
    fn current_state(&self) -> &S;

    /// State at any time between the two ends (extrapolation is allowed
    /// but not accurate). Repeated calls with the same time must agree.
    fn interpolated_state(&self, t: S::Scalar) -> S;

    /// Direction of propagation.
    fn is_forward(&self) -> bool;
}

/// View of an interpolator limited to a sub-interval of its step.
///
/// Used to report the part of a step before an event, or after it.
#[derive(Debug)]
pub struct RestrictedInterpolator<'a, I: ?Sized, S> {
    inner: &'a I,
    previous: S,
    current: S,
}

impl<'a, I, S> RestrictedInterpolator<'a, I, S>
where
    S: Timed,
    I: StepInterpolator<S> + ?Sized,
{
    /// Restrict `inner` to `[previous, current]`.
    pub fn new(inner: &'a I, previous: S, current: S) -> Self {
        Self {
            inner,
            previous,
            current,
        }
    }
}

impl<'a, I, S> StepInterpolator<S> for RestrictedInterpolator<'a, I, S>
where
    S: Timed,
    I: StepInterpolator<S> + ?Sized,
{
    fn previous_state(&self) -> &S {
        &self.previous
    }

    fn current_state(&self) -> &S {
        &self.current
    }

    fn interpolated_state(&self, t: S::Scalar) -> S {
        self.inner.interpolated_state(t)
    }

    fn is_forward(&self) -> bool {
        self.inner.is_forward()
    }
}

/// Observer of accepted steps.
///
/// Steps are reported in propagation order and never overlap: when an
/// event interrupts a step, the handler sees the part up to the event,
/// then the rest (if propagation continues) as a separate step.
pub trait StepHandler<S: Timed> {
    /// Called once at the start of each propagation run.
    fn init(&mut self, _initial_state: &S, _target: S::Scalar) {}

    /// Observe one (possibly partial) step.
    fn handle_step(&mut self, interpolator: &dyn StepInterpolator<S>);

    /// Called once when propagation terminates.
    fn finish(&mut self, _final_state: &S) {}
}

impl<S: Timed, H: StepHandler<S> + ?Sized> StepHandler<S> for Box<H> {
    fn init(&mut self, initial_state: &S, target: S::Scalar) {
        (**self).init(initial_state, target)
    }

    fn handle_step(&mut self, interpolator: &dyn StepInterpolator<S>) {
        (**self).handle_step(interpolator)
    }

    fn finish(&mut self, final_state: &S) {
        (**self).finish(final_state)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ClosedForm;
    use super::*;
    use crate::state::OdeState;

    #[test]
    fn test_restricted_interpolator_bounds() {
        let full = ClosedForm::new(0.0, 10.0, |t| 2.0 * t);
        let restricted = RestrictedInterpolator::new(
            &full,
            OdeState::new(2.0, [4.0]),
            OdeState::new(5.0, [10.0]),
        );
        assert_eq!(restricted.previous_state().t, 2.0);
        assert_eq!(restricted.current_state().t, 5.0);
        assert_eq!(restricted.interpolated_state(3.0).y[0], 6.0);
        assert!(restricted.is_forward());
    }
}
