//! Log-linear interpolation.
//!
//! Interpolates the logarithm of values, which is the usual choice for
//! discount factors: values stay positive and the implied instantaneous
//! forward is flat between nodes.

use crate::error::{MathError, MathResult};
use crate::interpolation::{check_range, find_segment, validate_nodes, Interpolator};

/// Log-linear interpolation between data points.
///
/// ```text
/// y(x) = exp(linear_interpolate(x, ln(y)))
/// ```
///
/// # Example
///
/// ```rust
/// use strata_math::interpolation::{LogLinearInterpolator, Interpolator};
///
/// let times = vec![0.0, 1.0, 2.0, 3.0];
/// let discount_factors = vec![1.0, 0.97, 0.94, 0.91];
///
/// let interp = LogLinearInterpolator::new(times, discount_factors).unwrap();
/// let df = interp.interpolate(1.5).unwrap();
/// assert!((df - (0.97f64 * 0.94).sqrt()).abs() < 1e-15);
/// ```
#[derive(Debug, Clone)]
pub struct LogLinearInterpolator {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Slope of ln(y) on each segment.
    log_slopes: Vec<f64>,
    /// Integral from `xs[0]` to each node.
    integrals: Vec<f64>,
}

/// Integral of `y0 * exp(s * u)` for u in `[0, dx]`.
fn segment_integral(y0: f64, s: f64, dx: f64) -> f64 {
    if (s * dx).abs() < 1e-12 {
        y0 * dx * (1.0 + 0.5 * s * dx)
    } else {
        y0 * (s * dx).exp_m1() / s
    }
}

impl LogLinearInterpolator {
    /// Creates a new log-linear interpolator.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than 2 points, lengths differ,
    /// the abscissas are not strictly increasing or any y value is
    /// non-positive.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> MathResult<Self> {
        validate_nodes(&xs, &ys, 2)?;
        if let Some(y) = ys.iter().find(|y| **y <= 0.0) {
            return Err(MathError::invalid_input(format!(
                "log-linear interpolation requires positive values, got {y}"
            )));
        }

        let log_slopes: Vec<f64> = (0..xs.len() - 1)
            .map(|i| (ys[i + 1] / ys[i]).ln() / (xs[i + 1] - xs[i]))
            .collect();

        let mut integrals = Vec::with_capacity(xs.len());
        integrals.push(0.0);
        for i in 0..xs.len() - 1 {
            let area = segment_integral(ys[i], log_slopes[i], xs[i + 1] - xs[i]);
            integrals.push(integrals[i] + area);
        }

        Ok(Self {
            xs,
            ys,
            log_slopes,
            integrals,
        })
    }
}

impl Interpolator for LogLinearInterpolator {
    fn interpolate(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        let i = find_segment(&self.xs, x);
        Ok(self.ys[i] * (self.log_slopes[i] * (x - self.xs[i])).exp())
    }

    fn derivative(&self, x: f64) -> MathResult<f64> {
        let y = self.interpolate(x)?;
        Ok(y * self.log_slopes[find_segment(&self.xs, x)])
    }

    fn primitive(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        let i = find_segment(&self.xs, x);
        Ok(self.integrals[i] + segment_integral(self.ys[i], self.log_slopes[i], x - self.xs[i]))
    }

    fn min_x(&self) -> f64 {
        self.xs[0]
    }

    fn max_x(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_linear_through_points() {
        let xs = vec![0.0, 1.0, 2.0, 5.0];
        let ys = vec![1.0, 0.97, 0.93, 0.85];
        let interp = LogLinearInterpolator::new(xs.clone(), ys.clone()).unwrap();
        for (x, y) in xs.iter().zip(&ys) {
            assert_relative_eq!(interp.interpolate(*x).unwrap(), *y, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_flat_forward_between_nodes() {
        let interp = LogLinearInterpolator::new(vec![0.0, 2.0], vec![1.0, (-0.06f64).exp()]).unwrap();
        for x in [0.3, 1.0, 1.7] {
            let fwd = -interp.derivative(x).unwrap() / interp.interpolate(x).unwrap();
            assert_relative_eq!(fwd, 0.03, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_constant_values_integrate_exactly() {
        let interp = LogLinearInterpolator::new(vec![0.0, 1.0, 4.0], vec![2.0, 2.0, 2.0]).unwrap();
        assert_relative_eq!(interp.primitive(3.0).unwrap(), 6.0, epsilon = 1e-14);
    }

    #[test]
    fn test_negative_value_rejected() {
        assert!(LogLinearInterpolator::new(vec![0.0, 1.0], vec![1.0, -0.5]).is_err());
        assert!(LogLinearInterpolator::new(vec![0.0, 1.0], vec![1.0, 0.0]).is_err());
    }
}
