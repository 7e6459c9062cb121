//! Bracketing root refinement.
//!
//! Brent's method combining bisection, secant and inverse quadratic
//! interpolation, modified to return the final *bracket* rather than a
//! single abscissa: the event engine needs to know a point on each side of
//! the root so that it can tell "just before the event" from "just after".
//!
//! Reference: Brent, R.P. (1973). "Algorithms for Minimization without
//! Derivatives". Prentice-Hall.

use thiserror::Error;

use crate::scalar::Scalar;

/// Final bracket of a converged root search.
///
/// `lower.real() <= upper.real()` and the root lies in `[lower, upper]`:
/// either the two values have opposite signs or one of them is exactly zero.
#[derive(Debug, Clone, Copy)]
pub struct Bracket<T> {
    /// Lower end of the bracket
    pub lower: T,
    /// Function value at `lower`
    pub lower_value: T,
    /// Upper end of the bracket
    pub upper: T,
    /// Function value at `upper`
    pub upper_value: T,
    /// Number of iterations used
    pub iterations: usize,
}

impl<T: Scalar> Bracket<T> {
    fn between(a: T, fa: T, b: T, fb: T, iterations: usize) -> Self {
        if a.real() <= b.real() {
            Self {
                lower: a,
                lower_value: fa,
                upper: b,
                upper_value: fb,
                iterations,
            }
        } else {
            Self {
                lower: b,
                lower_value: fb,
                upper: a,
                upper_value: fa,
                iterations,
            }
        }
    }

    fn exact(x: T, fx: T, iterations: usize) -> Self {
        Self {
            lower: x,
            lower_value: fx,
            upper: x,
            upper_value: fx,
            iterations,
        }
    }

    /// Width of the bracket.
    pub fn width(&self) -> f64 {
        self.upper.real() - self.lower.real()
    }
}

/// Brent's method with an absolute abscissa tolerance.
#[derive(Debug, Clone, Copy)]
pub struct BrentSolver {
    /// Bracket width at which the search stops
    pub tol: f64,
    /// Maximum iterations
    pub max_iter: usize,
}

impl Default for BrentSolver {
    fn default() -> Self {
        Self {
            tol: 1e-12,
            max_iter: 50,
        }
    }
}

impl BrentSolver {
    /// Create a new Brent solver with specified tolerance
    pub fn new(tol: f64, max_iter: usize) -> Self {
        Self { tol, max_iter }
    }

    /// Shrink `[a, b]` around a root of `f` until it is narrower than `tol`.
    ///
    /// `f(a)` and `f(b)` must not have the same strict sign. Known values
    /// may be passed in `fa` / `fb` to save evaluations. `a` may lie on
    /// either side of `b`.
    ///
    /// # Errors
    /// * [`BrentError::NotBracketed`] if `f(a)` and `f(b)` share a strict sign
    /// * [`BrentError::MaxIterations`] if the bracket is still wider than
    ///   `tol` after `max_iter` iterations
    pub fn solve_bracket<T, F>(
        &self,
        mut f: F,
        mut a: T,
        mut b: T,
        fa: Option<T>,
        fb: Option<T>,
    ) -> Result<Bracket<T>, BrentError>
    where
        T: Scalar,
        F: FnMut(T) -> T,
    {
        let mut fa = match fa {
            Some(v) => v,
            None => f(a),
        };
        let mut fb = match fb {
            Some(v) => v,
            None => f(b),
        };

        if fa.real() * fb.real() > 0.0 {
            return Err(BrentError::NotBracketed {
                a: a.real(),
                b: b.real(),
                fa: fa.real(),
                fb: fb.real(),
            });
        }

        // Ensure |f(a)| >= |f(b)|
        if fa.real().abs() < fb.real().abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }

        let half = T::from_f64(0.5);
        let mut c = a;
        let mut fc = fa;
        let mut mflag = true;
        let mut d = b - a;

        for iter in 0..self.max_iter {
            // b is the best guess
            if fa.real().abs() < fb.real().abs() {
                std::mem::swap(&mut a, &mut b);
                std::mem::swap(&mut fa, &mut fb);
            }

            if fb.real() == 0.0 {
                return Ok(Bracket::exact(b, fb, iter + 1));
            }
            if (b - a).real().abs() <= self.tol {
                return Ok(Bracket::between(a, fa, b, fb, iter + 1));
            }

            let (ra, rb, rc) = (fa.real(), fb.real(), fc.real());
            let s = if ra != rc && rb != rc && ra != rb {
                // Inverse quadratic interpolation
                a * fb * fc / ((fa - fb) * (fa - fc))
                    + b * fa * fc / ((fb - fa) * (fb - fc))
                    + c * fa * fb / ((fc - fa) * (fc - fb))
            } else if rb != ra {
                // Secant
                b - fb * (b - a) / (fb - fa)
            } else {
                (a + b) * half
            };

            let (sr, ar, br, cr, dr) = (s.real(), a.real(), b.real(), c.real(), d.real());
            let use_bisection =
                // s not between (3a+b)/4 and b
                (sr - (3.0 * ar + br) / 4.0) * (sr - br) > 0.0
                || (mflag && (sr - br).abs() >= (br - cr).abs() / 2.0)
                || (!mflag && (sr - br).abs() >= (cr - dr).abs() / 2.0)
                || (mflag && (br - cr).abs() < self.tol)
                || (!mflag && (cr - dr).abs() < self.tol);

            let s = if use_bisection {
                mflag = true;
                (a + b) * half
            } else {
                mflag = false;
                s
            };

            let fs = f(s);
            d = c;
            c = b;
            fc = fb;

            if fa.real() * fs.real() < 0.0 {
                b = s;
                fb = fs;
            } else {
                a = s;
                fa = fs;
            }
        }

        Err(BrentError::MaxIterations {
            lower: a.real().min(b.real()),
            upper: a.real().max(b.real()),
            iterations: self.max_iter,
        })
    }
}

/// Errors from Brent's method
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrentError {
    /// The root is not bracketed by the given interval
    #[error("root not bracketed: f({a}) = {fa}, f({b}) = {fb} (same sign)")]
    NotBracketed {
        /// First endpoint
        a: f64,
        /// Second endpoint
        b: f64,
        /// Function value at `a`
        fa: f64,
        /// Function value at `b`
        fb: f64,
    },
    /// Maximum iterations reached without convergence
    #[error("max iterations ({iterations}) reached, root still within [{lower}, {upper}]")]
    MaxIterations {
        /// Lower end of the last bracket
        lower: f64,
        /// Upper end of the last bracket
        upper: f64,
        /// Number of iterations performed
        iterations: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(bracket: &Bracket<f64>, x: f64, slack: f64) -> bool {
        bracket.lower - slack <= x && x <= bracket.upper + slack
    }

    #[test]
    fn test_brent_simple_root() {
        let solver = BrentSolver::default();

        // f(x) = x^2 - 2, root at sqrt(2)
        let bracket = solver
            .solve_bracket(|x: f64| x * x - 2.0, 0.0, 2.0, None, None)
            .unwrap();

        let expected = 2.0_f64.sqrt();
        assert!(bracket.width() <= 1e-12);
        assert!(
            contains(&bracket, expected, 1e-15),
            "[{}, {}] should contain sqrt(2)",
            bracket.lower,
            bracket.upper
        );
    }

    #[test]
    fn test_brent_trigonometric() {
        let solver = BrentSolver::default();

        let bracket = solver
            .solve_bracket(|x: f64| x.sin(), 3.0, 4.0, None, None)
            .unwrap();

        assert!((bracket.lower - std::f64::consts::PI).abs() < 1e-12);
        assert!((bracket.upper - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_brent_reversed_endpoints() {
        let solver = BrentSolver::default();

        // Backward propagation hands the bracket over as (later, earlier)
        let bracket = solver
            .solve_bracket(|x: f64| x - 0.3, 1.0, 0.0, None, None)
            .unwrap();

        assert!(bracket.lower <= bracket.upper);
        assert!(contains(&bracket, 0.3, 1e-15));
        assert!(bracket.lower_value <= 0.0 && bracket.upper_value >= 0.0);
    }

    #[test]
    fn test_brent_not_bracketed() {
        let solver = BrentSolver::default();

        // f(x) = x^2 + 1, no real roots
        let result = solver.solve_bracket(|x: f64| x * x + 1.0, -1.0, 1.0, None, None);

        assert!(matches!(result, Err(BrentError::NotBracketed { .. })));
    }

    #[test]
    fn test_brent_root_at_endpoint() {
        // f(x) = x + 1, root at the left endpoint
        let solver = BrentSolver::default();
        let bracket = solver
            .solve_bracket(|x: f64| x + 1.0, -1.0, 1.0, None, None)
            .unwrap();
        assert_eq!(bracket.lower, -1.0);
        assert_eq!(bracket.upper, -1.0);
        assert_eq!(bracket.lower_value, 0.0);
    }

    #[test]
    fn test_brent_triple_root() {
        // Triple roots degrade convergence; give the solver more room.
        let solver = BrentSolver::new(1e-12, 200);
        let bracket = solver
            .solve_bracket(|x: f64| (x - 1.0).powi(3), 0.0, 2.0, None, None)
            .unwrap();
        assert!(
            contains(&bracket, 1.0, 1e-12),
            "[{}, {}] should contain 1.0",
            bracket.lower,
            bracket.upper
        );
    }

    #[test]
    fn test_brent_near_zero_bracket() {
        // Bracket already narrower than the tolerance: returned unchanged
        let solver = BrentSolver::default();
        let bracket = solver
            .solve_bracket(|x: f64| x, -1e-15, 1e-15, None, None)
            .unwrap();
        assert!(bracket.lower >= -1e-15 && bracket.upper <= 1e-15);
        assert_eq!(bracket.iterations, 1);
    }

    #[test]
    fn test_brent_known_values_are_not_recomputed() {
        let solver = BrentSolver::default();
        let mut calls = 0;
        let _ = solver
            .solve_bracket(
                |x: f64| {
                    calls += 1;
                    x - 0.5
                },
                0.0,
                1.0,
                Some(-0.5),
                Some(0.5),
            )
            .unwrap();
        let with_values = calls;

        calls = 0;
        let _ = solver
            .solve_bracket(
                |x: f64| {
                    calls += 1;
                    x - 0.5
                },
                0.0,
                1.0,
                None,
                None,
            )
            .unwrap();
        assert_eq!(calls, with_values + 2);
    }

    #[test]
    fn test_brent_max_iterations() {
        let solver = BrentSolver::new(1e-15, 3);
        let result = solver.solve_bracket(|x: f64| x.powi(3) - x - 2.0, 1.0, 2.0, None, None);
        match result {
            Err(BrentError::MaxIterations {
                lower,
                upper,
                iterations,
            }) => {
                assert_eq!(iterations, 3);
                assert!(lower <= 1.5213797068045676 && 1.5213797068045676 <= upper);
            }
            other => panic!("expected MaxIterations, got {:?}", other),
        }
    }

    #[test]
    fn test_brent_cubic() {
        let solver = BrentSolver::default();

        // f(x) = x^3 - x - 2, has a root near 1.52
        let bracket = solver
            .solve_bracket(|x: f64| x.powi(3) - x - 2.0, 1.0, 2.0, None, None)
            .unwrap();

        assert!(contains(&bracket, 1.5213797068045676, 1e-12));
        println!(
            "Cubic root bracketed in [{}, {}] after {} iterations",
            bracket.lower, bracket.upper, bracket.iterations
        );
    }
}
