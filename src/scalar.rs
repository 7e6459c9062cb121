//! Numeric abstraction shared by the detection engine.
//!
//! The root isolation engine, the scheduler and every combinator are written
//! once against [`Scalar`]. Two implementations ship with the crate:
//!
//! - `f64`, plain real arithmetic;
//! - [`Dual`], a forward-mode dual number carrying one directional
//!   derivative, used for sensitivity analysis of event times.
//!
//! All *decisions* made by the engine (sign tests, bracket widths, ordering
//! of candidate events) look at [`Scalar::real`] only. Arithmetic that
//! produces times and switching-function values is done in the scalar type
//! itself so derivatives flow through the root finder.

use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Numeric type the engine computes with.
pub trait Scalar:
    Copy
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Lift a constant (zero derivative part).
    fn from_f64(value: f64) -> Self;

    /// Real part, the only thing compared by the engine.
    fn real(&self) -> f64;

    /// Same derivative information, real part replaced by `value`.
    fn with_real(self, value: f64) -> Self;

    /// The additive identity.
    fn zero() -> Self {
        Self::from_f64(0.0)
    }

    /// Absolute value, by the sign of the real part.
    fn abs(self) -> Self {
        if self.real() < 0.0 {
            -self
        } else {
            self
        }
    }

    /// Move the real part by one ulp, upwards when `up` is set.
    fn next_after(self, up: bool) -> Self {
        self.with_real(next_after(self.real(), up))
    }
}

impl Scalar for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }

    fn real(&self) -> f64 {
        *self
    }

    fn with_real(self, value: f64) -> Self {
        value
    }
}

/// Adjacent representable `f64` above (`up`) or below `x`.
pub fn next_after(x: f64, up: bool) -> f64 {
    if x.is_nan() || (x.is_infinite() && (x > 0.0) == up) {
        return x;
    }
    if x == 0.0 {
        let tiny = f64::from_bits(1);
        return if up { tiny } else { -tiny };
    }
    let bits = x.to_bits();
    let next = if (x > 0.0) == up { bits + 1 } else { bits - 1 };
    f64::from_bits(next)
}

/// Forward-mode dual number `value + derivative·ε`, with `ε² = 0`.
///
/// Seeding a parameter with derivative 1 and propagating with `Dual`
/// yields, at every event, the sensitivity of the event time to that
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dual {
    /// Real part
    pub value: f64,
    /// Directional derivative
    pub derivative: f64,
}

impl Dual {
    /// Build a dual number from its parts.
    pub fn new(value: f64, derivative: f64) -> Self {
        Self { value, derivative }
    }

    /// A constant (derivative 0).
    pub fn constant(value: f64) -> Self {
        Self::new(value, 0.0)
    }

    /// An independent variable (derivative 1).
    pub fn variable(value: f64) -> Self {
        Self::new(value, 1.0)
    }

    /// Sine.
    pub fn sin(self) -> Self {
        Self::new(self.value.sin(), self.derivative * self.value.cos())
    }

    /// Cosine.
    pub fn cos(self) -> Self {
        Self::new(self.value.cos(), -self.derivative * self.value.sin())
    }

    /// Exponential.
    pub fn exp(self) -> Self {
        let e = self.value.exp();
        Self::new(e, self.derivative * e)
    }

    /// Square root.
    pub fn sqrt(self) -> Self {
        let r = self.value.sqrt();
        Self::new(r, self.derivative / (2.0 * r))
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.value + rhs.value, self.derivative + rhs.derivative)
    }
}

impl Sub for Dual {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.value - rhs.value, self.derivative - rhs.derivative)
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.value * rhs.value,
            self.derivative * rhs.value + self.value * rhs.derivative,
        )
    }
}

impl Div for Dual {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let v = self.value / rhs.value;
        Self::new(v, (self.derivative - v * rhs.derivative) / rhs.value)
    }
}

impl Neg for Dual {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.value, -self.derivative)
    }
}

impl Scalar for Dual {
    fn from_f64(value: f64) -> Self {
        Self::constant(value)
    }

    fn real(&self) -> f64 {
        self.value
    }

    fn with_real(self, value: f64) -> Self {
        Self::new(value, self.derivative)
    }
}
