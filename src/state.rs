//! Trajectory state seen by detectors.
//!
//! The engine is generic over the state type; it only needs the time stamp
//! of a state. [`OdeState`] is the plain `(t, y)` pair used by the host
//! propagators shipped with this crate.

use std::fmt::Debug;

use crate::scalar::Scalar;

/// A time-stamped trajectory state.
pub trait Timed: Clone + Debug + 'static {
    /// Numeric type of times and switching-function values.
    type Scalar: Scalar;

    /// Time of this state.
    fn time(&self) -> Self::Scalar;
}

/// State vector `y` of dimension `N` at time `t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdeState<const N: usize, T = f64> {
    /// Time
    pub t: T,
    /// State vector
    pub y: [T; N],
}

impl<const N: usize, T: Scalar> OdeState<N, T> {
    /// Build a state.
    pub fn new(t: T, y: [T; N]) -> Self {
        Self { t, y }
    }
}

impl<const N: usize, T: Scalar> Timed for OdeState<N, T> {
    type Scalar = T;

    fn time(&self) -> T {
        self.t
    }
}
