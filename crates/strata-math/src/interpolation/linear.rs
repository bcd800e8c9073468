//! Linear interpolation.

use crate::error::MathResult;
use crate::interpolation::{check_range, find_segment, validate_nodes, Interpolator};

/// Linear interpolation between data points.
///
/// # Example
///
/// ```rust
/// use strata_math::interpolation::{LinearInterpolator, Interpolator};
///
/// let xs = vec![0.0, 1.0, 2.0, 3.0];
/// let ys = vec![0.0, 1.0, 4.0, 9.0];
///
/// let interp = LinearInterpolator::new(xs, ys).unwrap();
/// assert_eq!(interp.interpolate(1.5).unwrap(), 2.5);
/// assert_eq!(interp.derivative(1.5).unwrap(), 3.0);
/// ```
#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Integral from `xs[0]` to each node.
    integrals: Vec<f64>,
}

impl LinearInterpolator {
    /// Creates a new linear interpolator.
    ///
    /// # Arguments
    ///
    /// * `xs` - X coordinates (must be sorted in ascending order)
    /// * `ys` - Y coordinates
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than 2 points, if lengths differ
    /// or if the abscissas are not strictly increasing.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> MathResult<Self> {
        validate_nodes(&xs, &ys, 2)?;

        let mut integrals = Vec::with_capacity(xs.len());
        integrals.push(0.0);
        for i in 1..xs.len() {
            let area = 0.5 * (ys[i] + ys[i - 1]) * (xs[i] - xs[i - 1]);
            integrals.push(integrals[i - 1] + area);
        }

        Ok(Self { xs, ys, integrals })
    }

    fn slope(&self, i: usize) -> f64 {
        (self.ys[i + 1] - self.ys[i]) / (self.xs[i + 1] - self.xs[i])
    }
}

impl Interpolator for LinearInterpolator {
    fn interpolate(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        let i = find_segment(&self.xs, x);
        Ok(self.ys[i] + (x - self.xs[i]) * self.slope(i))
    }

    fn derivative(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        Ok(self.slope(find_segment(&self.xs, x)))
    }

    fn primitive(&self, x: f64) -> MathResult<f64> {
        check_range(&self.xs, x)?;
        let i = find_segment(&self.xs, x);
        let dx = x - self.xs[i];
        Ok(self.integrals[i] + dx * (self.ys[i] + 0.5 * dx * self.slope(i)))
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
    use crate::error::MathError;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_interpolation() {
        let xs = vec![0.0, 1.0, 2.0, 3.0];
        let ys = vec![0.0, 1.0, 4.0, 9.0];

        let interp = LinearInterpolator::new(xs, ys).unwrap();

        assert_relative_eq!(interp.interpolate(0.0).unwrap(), 0.0, epsilon = 1e-10);
        assert_relative_eq!(interp.interpolate(0.5).unwrap(), 0.5, epsilon = 1e-10);
        assert_relative_eq!(interp.interpolate(2.5).unwrap(), 6.5, epsilon = 1e-10);
        assert_relative_eq!(interp.interpolate(3.0).unwrap(), 9.0, epsilon = 1e-10);
    }

    #[test]
    fn test_primitive() {
        let interp = LinearInterpolator::new(vec![0.0, 1.0, 3.0], vec![1.0, 3.0, 3.0]).unwrap();
        assert_relative_eq!(interp.primitive(1.0).unwrap(), 2.0, epsilon = 1e-14);
        assert_relative_eq!(interp.primitive(0.5).unwrap(), 0.5 * (1.0 + 2.0) * 0.5, epsilon = 1e-14);
        assert_relative_eq!(interp.primitive(3.0).unwrap(), 8.0, epsilon = 1e-14);
    }

    #[test]
    fn test_extrapolation_disabled() {
        let interp = LinearInterpolator::new(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap();
        assert!(matches!(
            interp.interpolate(1.5),
            Err(MathError::ExtrapolationNotAllowed { .. })
        ));
        assert!(interp.derivative(-0.1).is_err());
    }

    #[test]
    fn test_insufficient_points() {
        let result = LinearInterpolator::new(vec![0.0], vec![0.0]);
        assert!(matches!(result, Err(MathError::InsufficientData { .. })));
    }

    #[test]
    fn test_unsorted_error() {
        let result = LinearInterpolator::new(vec![0.0, 2.0, 1.0], vec![0.0, 1.0, 2.0]);
        assert!(result.is_err());
    }
}
