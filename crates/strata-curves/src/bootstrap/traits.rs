//! What each kind of curve stores at its nodes, and how the bootstrap
//! starts and brackets the search for them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::curve::CurveUnderConstruction;
use crate::error::CurveResult;
use crate::traits::Curve;

/// Typical rate used for first guesses.
const AVG_RATE: f64 = 0.05;
/// Largest rate considered when bracketing.
const MAX_RATE: f64 = 1.0;
/// Typical hazard rate used for first guesses.
const AVG_HAZARD_RATE: f64 = 0.01;
/// Largest hazard rate considered when bracketing.
const MAX_HAZARD_RATE: f64 = 1.0;
/// Share of the remaining survival a density node may consume.
const SURVIVAL_BUFFER: f64 = 0.99;

/// Node behaviour of one curve kind during a bootstrap.
///
/// `i` is a node index; node 0 sits at the reference date and is never
/// solved for. `valid_data` is true when the nodes hold a previous
/// solution, in which case guesses and brackets are taken from it.
pub trait BootstrapTraits: Send + Sync + fmt::Debug {
    /// Value every node starts from.
    fn initial_value(&self) -> f64;

    /// Starting point for node `i`.
    fn guess(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool)
        -> CurveResult<f64>;

    /// Lower end of the search for node `i`.
    fn min_value_after(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64;

    /// Upper end of the search for node `i`.
    fn max_value_after(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64;

    /// Stores a trial value for node `i`.
    fn update_guess(&self, data: &mut [f64], value: f64, i: usize) {
        data[i] = value;
    }

    /// Sweeps allowed before a global bootstrap gives up.
    fn max_iterations(&self) -> usize {
        100
    }
}

fn period(curve: &CurveUnderConstruction, i: usize) -> f64 {
    let times = curve.times();
    times[i] - times[i - 1]
}

fn min_data(curve: &CurveUnderConstruction) -> f64 {
    curve.data().iter().copied().fold(f64::INFINITY, f64::min)
}

fn max_data(curve: &CurveUnderConstruction) -> f64 {
    curve.data().iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Rate-like nodes take their first value at the reference node as well.
fn update_with_reference(data: &mut [f64], value: f64, i: usize) {
    data[i] = value;
    if i == 1 {
        data[0] = value;
    }
}

// ============================================================================
// Yield curves
// ============================================================================

/// Nodes are discount factors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discount;

impl BootstrapTraits for Discount {
    fn initial_value(&self) -> f64 {
        1.0
    }

    fn guess(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> CurveResult<f64> {
        if valid_data {
            return Ok(curve.data()[i]);
        }
        if i == 1 {
            return Ok(1.0 / (1.0 + AVG_RATE * curve.times()[1].max(1.0 / 365.0)));
        }
        curve.discount_factor(curve.times()[i])
    }

    fn min_value_after(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64 {
        if valid_data {
            return min_data(curve) / 2.0;
        }
        curve.data()[i - 1] * (-MAX_RATE * period(curve, i)).exp()
    }

    fn max_value_after(&self, i: usize, curve: &CurveUnderConstruction, _valid_data: bool) -> f64 {
        // rates may be negative
        curve.data()[i - 1] * (MAX_RATE * period(curve, i)).exp()
    }
}

/// Nodes are continuously compounded zero rates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroYield;

impl BootstrapTraits for ZeroYield {
    fn initial_value(&self) -> f64 {
        AVG_RATE
    }

    fn guess(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> CurveResult<f64> {
        if valid_data {
            return Ok(curve.data()[i]);
        }
        if i == 1 {
            return Ok(AVG_RATE);
        }
        curve.zero_rate(curve.times()[i])
    }

    fn min_value_after(&self, _i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64 {
        if valid_data {
            let r = min_data(curve);
            return if r < 0.0 { r * 2.0 } else { r / 2.0 };
        }
        -MAX_RATE
    }

    fn max_value_after(&self, _i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64 {
        if valid_data {
            let r = max_data(curve);
            return if r < 0.0 { r / 2.0 } else { r * 2.0 };
        }
        MAX_RATE
    }

    fn update_guess(&self, data: &mut [f64], value: f64, i: usize) {
        update_with_reference(data, value, i);
    }
}

/// Nodes are instantaneous forward rates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardRate;

impl BootstrapTraits for ForwardRate {
    fn initial_value(&self) -> f64 {
        AVG_RATE
    }

    fn guess(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> CurveResult<f64> {
        if valid_data {
            return Ok(curve.data()[i]);
        }
        if i == 1 {
            return Ok(AVG_RATE);
        }
        curve.instantaneous_forward(curve.times()[i])
    }

    fn min_value_after(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64 {
        ZeroYield.min_value_after(i, curve, valid_data)
    }

    fn max_value_after(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64 {
        ZeroYield.max_value_after(i, curve, valid_data)
    }

    fn update_guess(&self, data: &mut [f64], value: f64, i: usize) {
        update_with_reference(data, value, i);
    }
}

// ============================================================================
// Default curves
// ============================================================================

/// Nodes are survival probabilities.
#[derive(Debug, Clone, Copy, Default)]
pub struct SurvivalProbability;

impl BootstrapTraits for SurvivalProbability {
    fn initial_value(&self) -> f64 {
        1.0
    }

    fn guess(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> CurveResult<f64> {
        if valid_data {
            return Ok(curve.data()[i]);
        }
        if i == 1 {
            return Ok(1.0 / (1.0 + AVG_HAZARD_RATE * 0.25));
        }
        curve.discount_factor(curve.times()[i])
    }

    fn min_value_after(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64 {
        if valid_data {
            return min_data(curve) / 2.0;
        }
        curve.data()[i - 1] * (-MAX_HAZARD_RATE * period(curve, i)).exp()
    }

    fn max_value_after(&self, i: usize, curve: &CurveUnderConstruction, _valid_data: bool) -> f64 {
        // survival probabilities never increase
        curve.data()[i - 1]
    }
}

/// Nodes are hazard rates.
#[derive(Debug, Clone, Copy, Default)]
pub struct HazardRate;

impl BootstrapTraits for HazardRate {
    fn initial_value(&self) -> f64 {
        AVG_HAZARD_RATE
    }

    fn guess(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> CurveResult<f64> {
        if valid_data {
            return Ok(curve.data()[i]);
        }
        if i == 1 {
            return Ok(AVG_HAZARD_RATE);
        }
        curve.instantaneous_forward(curve.times()[i])
    }

    fn min_value_after(&self, _i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64 {
        if valid_data {
            return min_data(curve) / 2.0;
        }
        f64::EPSILON
    }

    fn max_value_after(&self, _i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64 {
        if valid_data {
            return max_data(curve) * 2.0;
        }
        MAX_HAZARD_RATE
    }

    fn update_guess(&self, data: &mut [f64], value: f64, i: usize) {
        update_with_reference(data, value, i);
    }
}

/// Nodes are default densities `S(t) h(t)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDensity;

impl BootstrapTraits for DefaultDensity {
    fn initial_value(&self) -> f64 {
        AVG_HAZARD_RATE
    }

    fn guess(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> CurveResult<f64> {
        if valid_data {
            return Ok(curve.data()[i]);
        }
        if i == 1 {
            return Ok(AVG_HAZARD_RATE);
        }
        let t = curve.times()[i];
        Ok(curve.discount_factor(t)? * curve.instantaneous_forward(t)?)
    }

    fn min_value_after(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64 {
        HazardRate.min_value_after(i, curve, valid_data)
    }

    fn max_value_after(&self, i: usize, curve: &CurveUnderConstruction, valid_data: bool) -> f64 {
        let cap = HazardRate.max_value_after(i, curve, valid_data);
        // survival must stay positive at the end of the new period
        let survival = if i == 1 {
            Ok(1.0)
        } else {
            curve.discount_factor(curve.times()[i - 1])
        };
        match survival {
            Ok(s) if s > 0.0 => cap.min(SURVIVAL_BUFFER * s / period(curve, i)),
            _ => cap,
        }
    }

    fn update_guess(&self, data: &mut [f64], value: f64, i: usize) {
        update_with_reference(data, value, i);
    }
}

// ============================================================================
// Curve kinds
// ============================================================================

/// The quantity a curve interpolates.
///
/// Yield kinds produce discount factors; default kinds produce survival
/// probabilities through the same [`Curve`] interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    /// Discount factors.
    #[default]
    Discount,
    /// Continuously compounded zero rates.
    ZeroYield,
    /// Instantaneous forward rates.
    ForwardRate,
    /// Survival probabilities.
    SurvivalProbability,
    /// Hazard rates.
    HazardRate,
    /// Default densities.
    DefaultDensity,
}

impl CurveKind {
    /// Bootstrap behaviour of the kind.
    #[must_use]
    pub fn traits(&self) -> &'static dyn BootstrapTraits {
        match self {
            Self::Discount => &Discount,
            Self::ZeroYield => &ZeroYield,
            Self::ForwardRate => &ForwardRate,
            Self::SurvivalProbability => &SurvivalProbability,
            Self::HazardRate => &HazardRate,
            Self::DefaultDensity => &DefaultDensity,
        }
    }

    /// Whether the nodes hold discount factors or survival probabilities
    /// rather than rates.
    #[must_use]
    pub fn stores_discount_factors(&self) -> bool {
        matches!(self, Self::Discount | Self::SurvivalProbability)
    }

    /// Whether the curve describes default rather than discounting.
    #[must_use]
    pub fn is_default_curve(&self) -> bool {
        matches!(
            self,
            Self::SurvivalProbability | Self::HazardRate | Self::DefaultDensity
        )
    }
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discount => "discount",
            Self::ZeroYield => "zero yield",
            Self::ForwardRate => "forward rate",
            Self::SurvivalProbability => "survival probability",
            Self::HazardRate => "hazard rate",
            Self::DefaultDensity => "default density",
        };
        write!(f, "{name}")
    }
}
