//! Piecewise curves over bootstrapped nodes.
//!
//! [`CurveUnderConstruction`] is the mutable state a bootstrap works on:
//! node times, node values and an interpolator over the nodes solved so far.
//! Once every node is solved it becomes an immutable [`BootstrappedCurve`].
//!
//! # Extrapolation
//!
//! Past the last interpolated node every kind continues with a flat
//! instantaneous forward (or hazard) rate equal to the one at that node, so
//! discount factors and survival probabilities stay continuous.

use strata_core::daycounts::DayCountConvention;
use strata_core::types::Date;

use crate::bootstrap::traits::CurveKind;
use crate::error::{CurveError, CurveResult};
use crate::interpolation::{InterpolationMethod, Localisation, NodeInterpolator};
use crate::traits::Curve;

// ============================================================================
// Node evaluation
// ============================================================================

fn check_time(t: f64) -> CurveResult<()> {
    if t < 0.0 || !t.is_finite() {
        return Err(CurveError::invalid_value(format!(
            "curve time must be finite and non-negative, got {t}"
        )));
    }
    Ok(())
}

fn finite(kind: CurveKind, what: &str, t: f64, value: f64) -> CurveResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CurveError::invalid_value(format!(
            "{kind} curve {what} is not finite at t={t:.6}"
        )))
    }
}

/// Discount factor (survival probability for default kinds) of a kind's
/// nodes. Within the nodes it never reads the forward rate.
fn discount(kind: CurveKind, nodes: &NodeInterpolator, t: f64) -> CurveResult<f64> {
    check_time(t)?;
    let interp = nodes.get();
    let t_max = interp.max_x();
    let beyond = t - t_max;

    let df = match kind {
        CurveKind::Discount | CurveKind::SurvivalProbability => {
            let value = interp.interpolate(t.min(t_max))?;
            if beyond > 0.0 {
                let fwd = -interp.derivative(t_max)? / value;
                value * (-fwd * beyond).exp()
            } else {
                value
            }
        }
        CurveKind::ZeroYield => {
            if beyond > 0.0 {
                let z_max = interp.interpolate(t_max)?;
                let f_max = z_max + t_max * interp.derivative(t_max)?;
                (-(z_max * t_max + f_max * beyond)).exp()
            } else {
                (-interp.interpolate(t)? * t).exp()
            }
        }
        CurveKind::ForwardRate | CurveKind::HazardRate => {
            if beyond > 0.0 {
                let f_max = interp.interpolate(t_max)?;
                (-(interp.primitive(t_max)? + f_max * beyond)).exp()
            } else {
                (-interp.primitive(t)?).exp()
            }
        }
        CurveKind::DefaultDensity => {
            let survival = 1.0 - interp.primitive(t.min(t_max))?;
            if beyond > 0.0 {
                let hazard = interp.interpolate(t_max)? / survival;
                survival * (-hazard * beyond).exp()
            } else {
                survival
            }
        }
    };
    finite(kind, "discount factor", t, df)
}

/// Instantaneous forward (hazard rate for default kinds) of a kind's nodes,
/// held flat past the last node.
fn forward(kind: CurveKind, nodes: &NodeInterpolator, t: f64) -> CurveResult<f64> {
    check_time(t)?;
    let interp = nodes.get();
    let s = t.min(interp.max_x());

    let fwd = match kind {
        CurveKind::Discount | CurveKind::SurvivalProbability => {
            -interp.derivative(s)? / interp.interpolate(s)?
        }
        CurveKind::ZeroYield => interp.interpolate(s)? + s * interp.derivative(s)?,
        CurveKind::ForwardRate | CurveKind::HazardRate => interp.interpolate(s)?,
        CurveKind::DefaultDensity => interp.interpolate(s)? / (1.0 - interp.primitive(s)?),
    };
    finite(kind, "forward", t, fwd)
}

// ============================================================================
// Curve under construction
// ============================================================================

#[derive(Debug, Clone)]
enum BuildMode {
    Full,
    Local(Localisation),
}

/// Curve state mutated by a bootstrap.
///
/// Node 0 sits at the reference date; node `i` at the pillar of the `i`-th
/// helper after sorting. The interpolator covers the leading nodes given to
/// the last [`interpolate_over`](Self::interpolate_over) or
/// [`interpolate_local`](Self::interpolate_local) call and is rebuilt from
/// the current node values by [`refresh`](Self::refresh).
#[derive(Debug, Clone)]
pub struct CurveUnderConstruction {
    kind: CurveKind,
    method: InterpolationMethod,
    reference_date: Date,
    day_count: DayCountConvention,
    dates: Vec<Date>,
    times: Vec<f64>,
    data: Vec<f64>,
    interpolator: Option<NodeInterpolator>,
    active: usize,
    mode: BuildMode,
    reused_previous: bool,
}

impl CurveUnderConstruction {
    /// Lays out the nodes for `pillars`.
    ///
    /// A previous solution of matching size seeds the node values; otherwise
    /// every node starts at the kind's initial value.
    ///
    /// # Errors
    ///
    /// Fails when a pillar is not after the reference date or the pillars
    /// are not strictly increasing.
    pub fn new(
        kind: CurveKind,
        method: InterpolationMethod,
        reference_date: Date,
        day_count: DayCountConvention,
        pillars: &[Date],
        previous: Option<&[f64]>,
    ) -> CurveResult<Self> {
        let mut dates = Vec::with_capacity(pillars.len() + 1);
        dates.push(reference_date);
        for (i, &pillar) in pillars.iter().enumerate() {
            let last = dates[dates.len() - 1];
            if pillar <= last {
                return Err(CurveError::invalid_config(if i == 0 {
                    format!("pillar {pillar} is not after the reference date {reference_date}")
                } else {
                    format!("pillar {pillar} does not follow pillar {last}")
                }));
            }
            dates.push(pillar);
        }
        let times: Vec<f64> = dates
            .iter()
            .map(|d| day_count.year_fraction(reference_date, *d))
            .collect();

        let mut curve = Self {
            kind,
            method,
            reference_date,
            day_count,
            dates,
            times,
            data: Vec::new(),
            interpolator: None,
            active: 0,
            mode: BuildMode::Full,
            reused_previous: false,
        };
        match previous {
            Some(values)
                if values.len() == curve.times.len() && values.iter().all(|v| v.is_finite()) =>
            {
                curve.data = values.to_vec();
                curve.reused_previous = true;
            }
            _ => curve.reset_data(),
        }
        Ok(curve)
    }

    /// Node times, starting with 0.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Node values.
    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Node dates, starting with the reference date.
    #[must_use]
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Quantity stored at the nodes.
    #[must_use]
    pub fn kind(&self) -> CurveKind {
        self.kind
    }

    /// Interpolation between the nodes.
    #[must_use]
    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// Number of solved nodes, excluding the reference node.
    #[must_use]
    pub fn pillar_count(&self) -> usize {
        self.times.len() - 1
    }

    /// Whether the node values come from a previous solution.
    #[must_use]
    pub fn has_previous_data(&self) -> bool {
        self.reused_previous
    }

    /// Discards node values and the interpolator, restarting from the
    /// kind's initial value.
    pub fn reset_data(&mut self) {
        let initial = self.kind.traits().initial_value();
        self.data = vec![initial; self.times.len()];
        self.interpolator = None;
        self.active = 0;
        self.mode = BuildMode::Full;
        self.reused_previous = false;
    }

    /// Stores a trial value for node `i` without rebuilding.
    pub fn set_node(&mut self, i: usize, value: f64) {
        self.kind.traits().update_guess(&mut self.data, value, i);
    }

    /// Builds the interpolator over the first `len` nodes.
    ///
    /// A global method that cannot be built yet is replaced by linear
    /// interpolation until it can.
    pub fn interpolate_over(&mut self, len: usize) -> CurveResult<()> {
        self.check_len(len)?;
        let (xs, ys) = (&self.times[..len], &self.data[..len]);
        let built = match NodeInterpolator::build(self.method, xs, ys) {
            Ok(built) => built,
            Err(err) if self.method.is_global() => {
                tracing::trace!(len, error = %err, "interpolation not usable yet, using linear");
                NodeInterpolator::build(InterpolationMethod::Linear, xs, ys)?
            }
            Err(err) => return Err(err.into()),
        };
        self.interpolator = Some(built);
        self.active = len;
        self.mode = BuildMode::Full;
        Ok(())
    }

    /// Builds the interpolator over the first `len` nodes of a local
    /// bootstrap window.
    pub(crate) fn interpolate_local(&mut self, len: usize, localisation: Localisation) -> CurveResult<()> {
        self.check_len(len)?;
        let built = NodeInterpolator::build_local(
            self.method,
            &self.times[..len],
            &self.data[..len],
            &localisation,
        )?;
        self.interpolator = Some(built);
        self.active = len;
        self.mode = BuildMode::Local(localisation);
        Ok(())
    }

    /// Rebuilds the interpolator over the same nodes from the current values.
    pub fn refresh(&mut self) -> CurveResult<()> {
        match self.mode.clone() {
            _ if self.active == 0 => Err(CurveError::invalid_value(
                "curve has no interpolation to refresh",
            )),
            BuildMode::Full => self.interpolate_over(self.active),
            BuildMode::Local(localisation) => self.interpolate_local(self.active, localisation),
        }
    }

    pub(crate) fn interpolator(&self) -> Option<&NodeInterpolator> {
        self.interpolator.as_ref()
    }

    fn check_len(&self, len: usize) -> CurveResult<()> {
        if len < 2 || len > self.times.len() {
            return Err(CurveError::invalid_value(format!(
                "cannot interpolate over {len} of {} nodes",
                self.times.len()
            )));
        }
        Ok(())
    }

    /// Freezes the solved nodes into a curve.
    ///
    /// # Errors
    ///
    /// Fails unless the interpolator covers every node.
    pub fn finish(self, quote_errors: Vec<f64>) -> CurveResult<BootstrappedCurve> {
        let interpolator = match self.interpolator {
            Some(interp) if self.active == self.times.len() => interp,
            _ => {
                return Err(CurveError::invalid_value(format!(
                    "only {} of {} nodes are interpolated",
                    self.active,
                    self.times.len()
                )))
            }
        };
        Ok(BootstrappedCurve {
            kind: self.kind,
            method: self.method,
            reference_date: self.reference_date,
            day_count: self.day_count,
            dates: self.dates,
            times: self.times,
            data: self.data,
            interpolator,
            quote_errors,
        })
    }

    fn nodes(&self) -> CurveResult<&NodeInterpolator> {
        self.interpolator
            .as_ref()
            .ok_or_else(|| CurveError::invalid_value("curve has no interpolation yet"))
    }
}

impl Curve for CurveUnderConstruction {
    fn reference_date(&self) -> Date {
        self.reference_date
    }

    fn day_count(&self) -> DayCountConvention {
        self.day_count
    }

    fn max_time(&self) -> f64 {
        self.interpolator
            .as_ref()
            .map_or(0.0, |interp| interp.get().max_x())
    }

    fn discount_factor(&self, t: f64) -> CurveResult<f64> {
        discount(self.kind, self.nodes()?, t)
    }

    fn instantaneous_forward(&self, t: f64) -> CurveResult<f64> {
        forward(self.kind, self.nodes()?, t)
    }
}

// ============================================================================
// Bootstrapped curve
// ============================================================================

/// A fully bootstrapped piecewise curve.
///
/// For default kinds the discount factor is the survival probability and
/// the instantaneous forward is the hazard rate.
#[derive(Debug, Clone)]
pub struct BootstrappedCurve {
    kind: CurveKind,
    method: InterpolationMethod,
    reference_date: Date,
    day_count: DayCountConvention,
    dates: Vec<Date>,
    times: Vec<f64>,
    data: Vec<f64>,
    interpolator: NodeInterpolator,
    quote_errors: Vec<f64>,
}

impl BootstrappedCurve {
    /// Node dates, starting with the reference date.
    #[must_use]
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Node times, starting with 0.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Node values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Node dates paired with node values.
    pub fn nodes(&self) -> impl Iterator<Item = (Date, f64)> + '_ {
        self.dates.iter().copied().zip(self.data.iter().copied())
    }

    /// Quantity stored at the nodes.
    #[must_use]
    pub fn kind(&self) -> CurveKind {
        self.kind
    }

    /// Interpolation between the nodes.
    #[must_use]
    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    /// Quote minus implied quote for each helper after sorting.
    #[must_use]
    pub fn quote_errors(&self) -> &[f64] {
        &self.quote_errors
    }

    /// Largest absolute quote error.
    #[must_use]
    pub fn max_quote_error(&self) -> f64 {
        self.quote_errors.iter().fold(0.0, |acc, e| acc.max(e.abs()))
    }

    /// Survival probability to time `t`.
    pub fn survival_probability(&self, t: f64) -> CurveResult<f64> {
        self.discount_factor(t)
    }

    /// Hazard rate at time `t`.
    pub fn hazard_rate(&self, t: f64) -> CurveResult<f64> {
        self.instantaneous_forward(t)
    }

    /// Default probability between times `t1` and `t2`.
    pub fn default_probability(&self, t1: f64, t2: f64) -> CurveResult<f64> {
        if t2 < t1 {
            return Err(CurveError::invalid_value(format!(
                "default period [{t1:.4}, {t2:.4}] is reversed"
            )));
        }
        Ok(self.survival_probability(t1)? - self.survival_probability(t2)?)
    }
}

impl Curve for BootstrappedCurve {
    fn reference_date(&self) -> Date {
        self.reference_date
    }

    fn day_count(&self) -> DayCountConvention {
        self.day_count
    }

    fn max_time(&self) -> f64 {
        self.interpolator.get().max_x()
    }

    fn discount_factor(&self, t: f64) -> CurveResult<f64> {
        discount(self.kind, &self.interpolator, t)
    }

    fn instantaneous_forward(&self, t: f64) -> CurveResult<f64> {
        forward(self.kind, &self.interpolator, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference() -> Date {
        Date::from_ymd(2025, 1, 2).unwrap()
    }

    fn pillars() -> Vec<Date> {
        vec![reference().add_days(365), reference().add_days(730)]
    }

    /// Nodes reproducing a flat 3% continuously compounded curve.
    fn flat_nodes(kind: CurveKind) -> Vec<f64> {
        let r: f64 = 0.03;
        match kind {
            CurveKind::Discount => vec![1.0, (-r).exp(), (-2.0 * r).exp()],
            CurveKind::SurvivalProbability => vec![1.0, (-r).exp(), (-2.0 * r).exp()],
            CurveKind::DefaultDensity => {
                vec![r, r * (-r).exp(), r * (-2.0 * r).exp()]
            }
            _ => vec![r; 3],
        }
    }

    fn built(kind: CurveKind, method: InterpolationMethod) -> CurveUnderConstruction {
        let nodes = flat_nodes(kind);
        let mut curve = CurveUnderConstruction::new(
            kind,
            method,
            reference(),
            DayCountConvention::Act365Fixed,
            &pillars(),
            Some(&nodes),
        )
        .unwrap();
        curve.interpolate_over(3).unwrap();
        curve
    }

    #[test]
    fn test_new_seeds_initial_values() {
        let curve = CurveUnderConstruction::new(
            CurveKind::HazardRate,
            InterpolationMethod::Linear,
            reference(),
            DayCountConvention::Act365Fixed,
            &pillars(),
            None,
        )
        .unwrap();
        assert_eq!(curve.data(), &[0.01, 0.01, 0.01]);
        assert_eq!(curve.times(), &[0.0, 1.0, 2.0]);
        assert!(!curve.has_previous_data());
        assert!(curve.discount_factor(1.0).is_err());
    }

    #[test]
    fn test_previous_of_wrong_size_ignored() {
        let curve = CurveUnderConstruction::new(
            CurveKind::Discount,
            InterpolationMethod::LogLinear,
            reference(),
            DayCountConvention::Act365Fixed,
            &pillars(),
            Some(&[1.0, 0.97]),
        )
        .unwrap();
        assert!(!curve.has_previous_data());
        assert_eq!(curve.data(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_pillars_must_follow_reference() {
        let result = CurveUnderConstruction::new(
            CurveKind::Discount,
            InterpolationMethod::LogLinear,
            reference(),
            DayCountConvention::Act365Fixed,
            &[reference()],
            None,
        );
        assert!(matches!(result, Err(CurveError::InvalidConfig { .. })));
    }

    #[test]
    fn test_all_kinds_agree_on_flat_curve() {
        let kinds = [
            (CurveKind::Discount, InterpolationMethod::LogLinear),
            (CurveKind::ZeroYield, InterpolationMethod::Linear),
            (CurveKind::ForwardRate, InterpolationMethod::BackwardFlat),
            (CurveKind::SurvivalProbability, InterpolationMethod::LogLinear),
            (CurveKind::HazardRate, InterpolationMethod::BackwardFlat),
        ];
        for (kind, method) in kinds {
            let curve = built(kind, method);
            for t in [0.0, 0.5, 1.0, 1.7, 2.0, 3.5] {
                assert_relative_eq!(
                    curve.discount_factor(t).unwrap(),
                    (-0.03 * t).exp(),
                    epsilon = 1e-14
                );
                assert_relative_eq!(curve.instantaneous_forward(t).unwrap(), 0.03, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_default_density_survival() {
        let curve = built(CurveKind::DefaultDensity, InterpolationMethod::Linear);
        // linear density integrates to within O(h^3) of the exact survival
        assert_relative_eq!(curve.discount_factor(2.0).unwrap(), (-0.06f64).exp(), epsilon = 1e-4);
        let s = curve.discount_factor(2.0).unwrap();
        let h = curve.instantaneous_forward(2.0).unwrap();
        assert_relative_eq!(curve.discount_factor(3.0).unwrap(), s * (-h).exp(), epsilon = 1e-14);
    }

    #[test]
    fn test_extrapolation_is_continuous() {
        let mut curve = CurveUnderConstruction::new(
            CurveKind::ZeroYield,
            InterpolationMethod::Linear,
            reference(),
            DayCountConvention::Act365Fixed,
            &pillars(),
            None,
        )
        .unwrap();
        curve.set_node(1, 0.02);
        curve.set_node(2, 0.03);
        curve.interpolate_over(3).unwrap();

        let at = curve.discount_factor(2.0).unwrap();
        let after = curve.discount_factor(2.0 + 1e-9).unwrap();
        assert_relative_eq!(at, after, epsilon = 1e-10);
        // f = z + t z' = 0.03 + 2 * 0.01
        assert_relative_eq!(curve.instantaneous_forward(5.0).unwrap(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_exhausted_density_keeps_discount_factor() {
        let mut curve = CurveUnderConstruction::new(
            CurveKind::DefaultDensity,
            InterpolationMethod::Linear,
            reference(),
            DayCountConvention::Act365Fixed,
            &pillars(),
            None,
        )
        .unwrap();
        // all default mass inside the first year
        curve.set_node(1, 1.0);
        curve.interpolate_over(2).unwrap();
        assert_relative_eq!(curve.discount_factor(0.5).unwrap(), 0.5, epsilon = 1e-14);
        assert_eq!(curve.discount_factor(1.0).unwrap(), 0.0);
        assert!(curve.instantaneous_forward(0.5).is_ok());
        assert!(matches!(
            curve.instantaneous_forward(1.0),
            Err(CurveError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_negative_time_rejected() {
        let curve = built(CurveKind::Discount, InterpolationMethod::LogLinear);
        assert!(curve.discount_factor(-0.1).is_err());
    }

    #[test]
    fn test_refresh_follows_node_changes() {
        let mut curve = built(CurveKind::ZeroYield, InterpolationMethod::Linear);
        curve.set_node(2, 0.05);
        assert_relative_eq!(curve.zero_rate(2.0).unwrap(), 0.03, epsilon = 1e-14);
        curve.refresh().unwrap();
        assert_relative_eq!(curve.zero_rate(2.0).unwrap(), 0.05, epsilon = 1e-14);
    }

    #[test]
    fn test_finish_requires_all_nodes() {
        let mut curve = built(CurveKind::Discount, InterpolationMethod::LogLinear);
        curve.interpolate_over(2).unwrap();
        assert!(curve.clone().finish(vec![]).is_err());

        curve.interpolate_over(3).unwrap();
        let done = curve.finish(vec![1e-13, -2e-13]).unwrap();
        assert_eq!(done.values().len(), 3);
        assert_relative_eq!(done.max_quote_error(), 2e-13);
        assert_relative_eq!(done.zero_rate(1.0).unwrap(), 0.03, epsilon = 1e-14);
        assert_eq!(done.nodes().next(), Some((reference(), 1.0)));
    }

    #[test]
    fn test_default_probability() {
        let mut curve = built(CurveKind::HazardRate, InterpolationMethod::BackwardFlat);
        curve.refresh().unwrap();
        let done = curve.finish(vec![0.0, 0.0]).unwrap();
        assert_relative_eq!(
            done.default_probability(0.0, 1.0).unwrap(),
            1.0 - (-0.03f64).exp(),
            epsilon = 1e-14
        );
        assert!(done.default_probability(1.0, 0.5).is_err());
        assert_relative_eq!(done.hazard_rate(0.5).unwrap(), 0.03);
    }
}
