//! Brent's root-finding algorithm.

use log::debug;

use crate::error::{MathError, MathResult};
use crate::solvers::{evaluate, SolverConfig, SolverResult};

/// Brent's root-finding algorithm.
///
/// Combines bisection with inverse quadratic interpolation. Convergence is
/// reached when the half-width of the bracket falls below
/// `tolerance / 2` (plus a few ulps of the root) or the function is exactly
/// zero.
///
/// Requires: `f(a)` and `f(b)` of opposite sign, or one of them zero.
///
/// # Arguments
///
/// * `f` - The function for which to find a root
/// * `a` - One end of the bracket
/// * `b` - The other end of the bracket
/// * `config` - Solver configuration
///
/// # Errors
///
/// `InvalidBracket` if the signs match, `NonFiniteValue` if `f` returns
/// NaN or infinity, `ConvergenceFailed` when the evaluation budget runs out.
///
/// # Example
///
/// ```rust
/// use strata_math::solvers::{brent, SolverConfig};
///
/// // Find root of x^3 - x - 2
/// let f = |x: f64| x * x * x - x - 2.0;
///
/// let result = brent(f, 1.0, 2.0, &SolverConfig::default()).unwrap();
/// assert!((result.root - 1.521_379_706_804_568).abs() < 1e-10);
/// ```
pub fn brent<F>(mut f: F, a: f64, b: f64, config: &SolverConfig) -> MathResult<SolverResult>
where
    F: FnMut(f64) -> f64,
{
    let fa = evaluate(&mut f, a)?;
    if fa == 0.0 {
        return Ok(SolverResult {
            root: a,
            iterations: 1,
            residual: fa,
        });
    }
    let fb = evaluate(&mut f, b)?;
    if fb == 0.0 {
        return Ok(SolverResult {
            root: b,
            iterations: 2,
            residual: fb,
        });
    }
    if fa.signum() == fb.signum() {
        return Err(MathError::InvalidBracket { a, b, fa, fb });
    }

    solve_bracketed(&mut f, (a, fa), (b, fb), 2, config)
}

/// Brent's algorithm inside fixed bounds, starting from a guess.
///
/// Both bounds are evaluated and must bracket a root; the iteration then
/// starts from `guess` against whichever bound keeps the bracket. A good
/// guess saves most of the evaluations when re-solving a slightly moved
/// problem.
///
/// # Errors
///
/// `InvalidInput` if the guess is outside the bounds, otherwise as
/// [`brent`].
///
/// # Example
///
/// ```rust
/// use strata_math::solvers::{brent_with_guess, SolverConfig};
///
/// let f = |x: f64| x * x - 2.0;
/// let result = brent_with_guess(f, 1.4, 0.0, 10.0, &SolverConfig::default()).unwrap();
/// assert!((result.root - std::f64::consts::SQRT_2).abs() < 1e-10);
/// ```
pub fn brent_with_guess<F>(
    mut f: F,
    guess: f64,
    lower: f64,
    upper: f64,
    config: &SolverConfig,
) -> MathResult<SolverResult>
where
    F: FnMut(f64) -> f64,
{
    if lower >= upper || !(lower..=upper).contains(&guess) {
        return Err(MathError::invalid_input(format!(
            "guess {guess} is not inside [{lower}, {upper}]"
        )));
    }

    let f_lower = evaluate(&mut f, lower)?;
    if f_lower == 0.0 {
        return Ok(SolverResult {
            root: lower,
            iterations: 1,
            residual: f_lower,
        });
    }
    let f_upper = evaluate(&mut f, upper)?;
    if f_upper == 0.0 {
        return Ok(SolverResult {
            root: upper,
            iterations: 2,
            residual: f_upper,
        });
    }
    if f_lower.signum() == f_upper.signum() {
        return Err(MathError::InvalidBracket {
            a: lower,
            b: upper,
            fa: f_lower,
            fb: f_upper,
        });
    }

    let f_guess = evaluate(&mut f, guess)?;
    if f_guess == 0.0 {
        return Ok(SolverResult {
            root: guess,
            iterations: 3,
            residual: f_guess,
        });
    }
    let other = if f_guess.signum() == f_lower.signum() {
        (upper, f_upper)
    } else {
        (lower, f_lower)
    };

    solve_bracketed(&mut f, other, (guess, f_guess), 3, config)
}

/// Brent iteration over a valid bracket.
fn solve_bracketed<F>(
    f: &mut F,
    (x_min, f_min): (f64, f64),
    (x_max, f_max): (f64, f64),
    mut evaluations: u32,
    config: &SolverConfig,
) -> MathResult<SolverResult>
where
    F: FnMut(f64) -> f64,
{
    // `root` is the best estimate, `x_max` the contrapoint, `x_min` the
    // previous iterate.
    let (mut x_min, mut f_min) = (x_min, f_min);
    let (mut x_max, mut f_max) = (x_max, f_max);
    let mut root = x_max;
    let mut f_root = f_max;
    let mut d = 0.0_f64;
    let mut e = 0.0_f64;

    while evaluations <= config.max_iterations {
        if f_root.signum() == f_max.signum() {
            x_max = x_min;
            f_max = f_min;
            d = root - x_min;
            e = d;
        }
        if f_max.abs() < f_root.abs() {
            x_min = root;
            root = x_max;
            x_max = x_min;
            f_min = f_root;
            f_root = f_max;
            f_max = f_min;
        }

        let accuracy = 2.0 * f64::EPSILON * root.abs() + 0.5 * config.tolerance;
        let mid = (x_max - root) / 2.0;
        if mid.abs() <= accuracy || f_root == 0.0 {
            return Ok(SolverResult {
                root,
                iterations: evaluations,
                residual: f_root,
            });
        }

        if e.abs() >= accuracy && f_min.abs() > f_root.abs() {
            let s = f_root / f_min;
            let (mut p, mut q);
            if x_min == x_max {
                p = 2.0 * mid * s;
                q = 1.0 - s;
            } else {
                let qq = f_min / f_max;
                let r = f_root / f_max;
                p = s * (2.0 * mid * qq * (qq - r) - (root - x_min) * (r - 1.0));
                q = (qq - 1.0) * (r - 1.0) * (s - 1.0);
            }
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * mid * q - (accuracy * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = mid;
                e = d;
            }
        } else {
            d = mid;
            e = d;
        }

        x_min = root;
        f_min = f_root;
        if d.abs() > accuracy {
            root += d;
        } else {
            root += accuracy.copysign(mid);
        }
        f_root = evaluate(f, root)?;
        evaluations += 1;
    }

    debug!(
        "brent did not converge after {} evaluations, last root {} residual {:e}",
        evaluations, root, f_root
    );
    Err(MathError::convergence_failed(evaluations, f_root.abs()))
}
