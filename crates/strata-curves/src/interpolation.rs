//! Interpolation of curve nodes.

use serde::{Deserialize, Serialize};
use strata_math::interpolation::{
    BackwardFlatInterpolator, ConvexMonotone, ConvexMonotoneParams, CubicSpline, ExistingSections,
    Interpolator, LinearInterpolator, LogLinearInterpolator,
};
use strata_math::MathResult;

/// Interpolation methods for curve nodes.
///
/// Serialized with a `type` tag:
///
/// ```rust
/// use strata_curves::interpolation::InterpolationMethod;
///
/// let method: InterpolationMethod = serde_json::from_str(
///     r#"{ "type": "convex_monotone", "quadraticity": 0.0, "monotonicity": 1.0, "force_positive": true }"#,
/// ).unwrap();
/// assert!(method.is_global());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterpolationMethod {
    /// Linear in the node values.
    #[default]
    Linear,

    /// Linear in the logarithm of the node values.
    LogLinear,

    /// Each node value held over the period ending at it.
    BackwardFlat,

    /// Natural cubic spline.
    CubicSpline,

    /// Hagan-West convex monotone; node values are period averages.
    ConvexMonotone {
        /// Weight of the quadratic shape.
        quadraticity: f64,
        /// How strictly monotonicity is enforced.
        monotonicity: f64,
        /// Keep the interpolant non-negative.
        force_positive: bool,
    },
}

impl InterpolationMethod {
    /// Convex monotone with the default parameters.
    #[must_use]
    pub fn convex_monotone() -> Self {
        Self::from(ConvexMonotoneParams::default())
    }

    /// Returns true if moving one node changes the curve between other
    /// nodes, which makes a sequential bootstrap iterate.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Self::CubicSpline | Self::ConvexMonotone { .. })
    }

    /// Minimum number of nodes, including the reference node.
    #[must_use]
    pub fn required_points(&self) -> usize {
        2
    }

    /// Checks the method's parameters.
    pub fn validate(&self) -> MathResult<()> {
        match self {
            Self::ConvexMonotone { .. } => self.convex_monotone_params().validate(),
            _ => Ok(()),
        }
    }

    fn convex_monotone_params(&self) -> ConvexMonotoneParams {
        match *self {
            Self::ConvexMonotone {
                quadraticity,
                monotonicity,
                force_positive,
            } => ConvexMonotoneParams::new(quadraticity, monotonicity, force_positive),
            _ => ConvexMonotoneParams::default(),
        }
    }
}

impl From<ConvexMonotoneParams> for InterpolationMethod {
    fn from(params: ConvexMonotoneParams) -> Self {
        Self::ConvexMonotone {
            quadraticity: params.quadraticity,
            monotonicity: params.monotonicity,
            force_positive: params.force_positive,
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Linear => "Linear",
            Self::LogLinear => "Log-Linear",
            Self::BackwardFlat => "Backward-Flat",
            Self::CubicSpline => "Cubic Spline",
            Self::ConvexMonotone { .. } => "Convex Monotone",
        };
        write!(f, "{name}")
    }
}

/// How a windowed rebuild treats the nodes before the window.
///
/// Only convex monotone uses it: settled sections are carried over and the
/// final period stays flat until the curve is complete. Other methods
/// rebuild over all nodes.
#[derive(Debug, Clone, Default)]
pub(crate) struct Localisation {
    existing: ExistingSections,
    flat_final_period: bool,
}

impl Localisation {
    /// Settings for a rebuild over `length` nodes out of `final_size`.
    ///
    /// The first window (`length == localisation + 1`) starts afresh; later
    /// ones keep the settled sections of `previous`.
    pub(crate) fn for_window(
        previous: Option<&NodeInterpolator>,
        length: usize,
        localisation: usize,
        final_size: usize,
    ) -> Self {
        let existing = if length == localisation + 1 {
            ExistingSections::default()
        } else {
            previous
                .and_then(NodeInterpolator::existing_sections)
                .unwrap_or_default()
        };
        Self {
            existing,
            flat_final_period: length != final_size,
        }
    }
}

/// A built interpolator over curve nodes.
#[derive(Debug, Clone)]
pub(crate) enum NodeInterpolator {
    Linear(LinearInterpolator),
    LogLinear(LogLinearInterpolator),
    BackwardFlat(BackwardFlatInterpolator),
    CubicSpline(CubicSpline),
    ConvexMonotone(ConvexMonotone),
}

impl NodeInterpolator {
    /// Builds `method` over the nodes.
    pub(crate) fn build(method: InterpolationMethod, xs: &[f64], ys: &[f64]) -> MathResult<Self> {
        let (xs, ys) = (xs.to_vec(), ys.to_vec());
        Ok(match method {
            InterpolationMethod::Linear => Self::Linear(LinearInterpolator::new(xs, ys)?),
            InterpolationMethod::LogLinear => Self::LogLinear(LogLinearInterpolator::new(xs, ys)?),
            InterpolationMethod::BackwardFlat => {
                Self::BackwardFlat(BackwardFlatInterpolator::new(xs, ys)?)
            }
            InterpolationMethod::CubicSpline => Self::CubicSpline(CubicSpline::new(xs, ys)?),
            InterpolationMethod::ConvexMonotone { .. } => Self::ConvexMonotone(ConvexMonotone::new(
                xs,
                ys,
                method.convex_monotone_params(),
            )?),
        })
    }

    /// Builds `method` over the nodes of a window.
    pub(crate) fn build_local(
        method: InterpolationMethod,
        xs: &[f64],
        ys: &[f64],
        localisation: &Localisation,
    ) -> MathResult<Self> {
        match method {
            InterpolationMethod::ConvexMonotone { .. } => {
                Ok(Self::ConvexMonotone(ConvexMonotone::with_existing(
                    xs.to_vec(),
                    ys.to_vec(),
                    method.convex_monotone_params(),
                    localisation.flat_final_period,
                    localisation.existing.clone(),
                )?))
            }
            _ => Self::build(method, xs, ys),
        }
    }

    fn existing_sections(&self) -> Option<ExistingSections> {
        match self {
            Self::ConvexMonotone(cm) => Some(cm.existing_sections()),
            _ => None,
        }
    }

    pub(crate) fn get(&self) -> &dyn Interpolator {
        match self {
            Self::Linear(i) => i,
            Self::LogLinear(i) => i,
            Self::BackwardFlat(i) => i,
            Self::CubicSpline(i) => i,
            Self::ConvexMonotone(i) => i,
        }
    }
}
