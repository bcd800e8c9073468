//! Integration tests: piecewise curves bootstrapped from session quotes.
//!
//! Market data used throughout, as of January 2, 2025:
//!
//! | Tenor | Instrument | Quote  |
//! |-------|------------|--------|
//! | 3M    | Deposit    | 2.90%  |
//! | 6M    | Deposit    | 3.00%  |
//! | 1Y    | Swap       | 3.10%  |
//! | 2Y    | Swap       | 3.20%  |
//! | 3Y    | Swap       | 3.30%  |
//! | 5Y    | Swap       | 3.45%  |
//! | 7Y    | Swap       | 3.60%  |
//! | 10Y   | Swap       | 3.75%  |

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use approx::assert_relative_eq;
use proptest::prelude::*;
use strata_core::prelude::*;
use strata_curves::prelude::*;

// ============================================================================
// Fixtures
// ============================================================================

fn today() -> Date {
    Date::from_ymd(2025, 1, 2).unwrap()
}

fn session() -> Session {
    Session::new(SessionConfig::new(today()))
}

/// Routes bootstrap logs to the test output; set `RUST_LOG=debug` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const DEPOSITS: [(i32, f64); 2] = [(3, 0.029), (6, 0.030)];
const SWAPS: [(i32, f64); 6] = [
    (1, 0.031),
    (2, 0.032),
    (3, 0.033),
    (5, 0.0345),
    (7, 0.036),
    (10, 0.0375),
];
const ZEROS: [(i32, f64); 4] = [(1, 0.030), (2, 0.032), (5, 0.035), (10, 0.038)];

fn market_helpers(session: &mut Session) -> (Vec<NodeId>, Vec<Box<dyn BootstrapHelper>>) {
    let mut quotes = Vec::new();
    let mut helpers: Vec<Box<dyn BootstrapHelper>> = Vec::new();
    for (months, rate) in DEPOSITS {
        let quote = session.new_quote(format!("{months}M deposit"), rate);
        let helper = DepositRateHelper::from_tenor(quote, today(), Period::months(months)).unwrap();
        quotes.push(quote);
        helpers.push(Box::new(helper));
    }
    for (years, rate) in SWAPS {
        let quote = session.new_quote(format!("{years}Y swap"), rate);
        let helper =
            SwapRateHelper::from_tenor(quote, today(), Period::years(years), Period::years(1))
                .unwrap();
        quotes.push(quote);
        helpers.push(Box::new(helper));
    }
    (quotes, helpers)
}

fn zero_helpers(
    session: &mut Session,
    rates: &[(i32, f64)],
) -> (Vec<NodeId>, Vec<Box<dyn BootstrapHelper>>) {
    rates
        .iter()
        .map(|&(years, rate)| {
            let quote = session.new_quote(format!("{years}Y zero"), rate);
            let helper = ZeroRateHelper::new(quote, today().add_years(years).unwrap());
            (quote, Box::new(helper) as Box<dyn BootstrapHelper>)
        })
        .unzip()
}

fn assert_reprices(curve: &BootstrappedCurve, tolerance: f64) {
    for (i, error) in curve.quote_errors().iter().enumerate() {
        assert!(
            error.abs() < tolerance,
            "helper {i} misses its quote by {error:e}"
        );
    }
}

/// A lazy object layered on a curve: the 5Y discount factor.
struct FiveYearDiscount {
    node: NodeId,
    curve: PiecewiseCurve,
    value: f64,
    runs: Rc<Cell<usize>>,
}

impl FiveYearDiscount {
    fn new(session: &mut Session, curve: PiecewiseCurve) -> Self {
        let node = session.graph_mut().add_lazy("5Y discount");
        session
            .graph_mut()
            .register_with(node, LazyObject::node(&curve))
            .unwrap();
        Self {
            node,
            curve,
            value: f64::NAN,
            runs: Rc::new(Cell::new(0)),
        }
    }
}

impl LazyObject for FiveYearDiscount {
    type Error = CurveError;

    fn node(&self) -> NodeId {
        self.node
    }

    fn perform_calculations(&mut self, session: &mut Session) -> CurveResult<()> {
        self.runs.set(self.runs.get() + 1);
        let curve = self.curve.curve(session)?;
        self.value = curve.discount_factor(5.0)?;
        Ok(())
    }
}

// ============================================================================
// Repricing
// ============================================================================

#[test]
fn test_sample_scenario() {
    let sample = [(1, 0.01), (2, 0.015), (5, 0.02), (10, 0.025)];
    let mut session = session();
    let (_, helpers) = zero_helpers(&mut session, &sample);
    let mut curve =
        PiecewiseCurve::new(&mut session, "sample", CurveBuildConfig::default(), helpers).unwrap();

    let built = curve.curve(&mut session).unwrap();
    assert_eq!(built.values().len(), sample.len() + 1);
    assert_relative_eq!(built.values()[0], 1.0);
    assert_reprices(&built, 1e-10);

    let t5 = built.time_from_reference(today().add_years(5).unwrap());
    let implied = -built.discount_factor(t5).unwrap().ln() / t5;
    assert!((implied - 0.02).abs() < 1e-10);
}

#[test]
fn test_deposits_and_swaps_iterative() {
    let mut session = session();
    let (_, helpers) = market_helpers(&mut session);
    let mut curve =
        PiecewiseCurve::new(&mut session, "USD", CurveBuildConfig::default(), helpers).unwrap();

    let built = curve.curve(&mut session).unwrap();
    assert_eq!(built.values().len(), DEPOSITS.len() + SWAPS.len() + 1);
    assert_reprices(&built, 1e-10);

    // discount factors decrease along an upward sloping curve
    for pair in built.values().windows(2) {
        assert!(pair[1] < pair[0]);
    }
}

#[test]
fn test_local_matches_iterative() {
    init_tracing();
    let configs = [
        CurveBuildConfig::default(),
        CurveBuildConfig::new(CurveKind::ZeroYield).with_interpolation(InterpolationMethod::Linear),
    ];
    for config in configs {
        let mut session = session();
        let (_, helpers) = market_helpers(&mut session);
        let mut iterative = PiecewiseCurve::new(&mut session, "iterative", config, helpers).unwrap();
        let (_, helpers) = market_helpers(&mut session);
        let local_config = config.with_local(LocalBootstrapConfig::default());
        let mut local = PiecewiseCurve::new(&mut session, "local", local_config, helpers).unwrap();

        let a = iterative.curve(&mut session).unwrap();
        let b = local.curve(&mut session).unwrap();
        assert_reprices(&b, 1e-8);
        for (x, y) in a.values().iter().zip(b.values()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-8);
        }
    }
}

#[test]
fn test_convex_monotone_forwards_local() {
    let mut session = session();
    let (_, helpers) = zero_helpers(&mut session, &ZEROS);
    let config = CurveBuildConfig::new(CurveKind::ForwardRate)
        .with_interpolation(InterpolationMethod::convex_monotone())
        .with_local(LocalBootstrapConfig::default());
    let mut curve = PiecewiseCurve::new(&mut session, "forward", config, helpers).unwrap();

    let built = curve.curve(&mut session).unwrap();
    assert_reprices(&built, 1e-8);
    for t in [0.5, 1.5, 3.0, 7.5, 12.0] {
        assert!(built.instantaneous_forward(t).unwrap() > 0.0);
    }
}

#[test]
fn test_every_curve_kind_reprices() {
    let cases = [
        (CurveKind::Discount, InterpolationMethod::LogLinear),
        (CurveKind::ZeroYield, InterpolationMethod::Linear),
        (CurveKind::ForwardRate, InterpolationMethod::BackwardFlat),
        (CurveKind::SurvivalProbability, InterpolationMethod::LogLinear),
        (CurveKind::HazardRate, InterpolationMethod::BackwardFlat),
        (CurveKind::DefaultDensity, InterpolationMethod::Linear),
    ];
    let hazards = [(1, 0.010), (3, 0.015), (5, 0.020), (10, 0.025)];

    for (kind, method) in cases {
        let mut session = session();
        let rates: &[(i32, f64)] = if kind.is_default_curve() { &hazards } else { &ZEROS };
        let (_, helpers) = zero_helpers(&mut session, rates);
        let config = CurveBuildConfig::new(kind).with_interpolation(method);
        let mut curve = PiecewiseCurve::new(&mut session, kind.to_string(), config, helpers)
            .unwrap();

        let built = curve
            .curve(&mut session)
            .unwrap_or_else(|e| panic!("{kind} with {method}: {e}"));
        assert_eq!(built.kind(), kind);
        assert_reprices(&built, 1e-9);
    }
}

#[test]
fn test_default_density_from_short_hazard_strip() {
    init_tracing();
    let mut session = session();
    let (_, helpers) = zero_helpers(&mut session, &[(1, 0.010), (3, 0.015)]);
    let config = CurveBuildConfig::new(CurveKind::DefaultDensity);
    let mut curve = PiecewiseCurve::new(&mut session, "density", config, helpers).unwrap();

    let built = curve.curve(&mut session).unwrap();
    assert_reprices(&built, 1e-9);
    let t1 = built.times()[1];
    assert_relative_eq!(built.survival_probability(t1).unwrap(), (-0.010 * t1).exp(), epsilon = 1e-9);
    for t in [0.5, 1.0, 2.0, 3.0, 5.0] {
        assert!(built.hazard_rate(t).unwrap().is_finite());
    }
}

#[test]
fn test_default_curve_queries() {
    let mut session = session();
    let (_, helpers) = zero_helpers(&mut session, &[(1, 0.010), (3, 0.015), (5, 0.020)]);
    let config = CurveBuildConfig::new(CurveKind::HazardRate)
        .with_interpolation(InterpolationMethod::BackwardFlat);
    let mut curve = PiecewiseCurve::new(&mut session, "credit", config, helpers).unwrap();
    let built = curve.curve(&mut session).unwrap();

    let t1 = built.times()[1];
    assert_relative_eq!(
        built.survival_probability(t1).unwrap(),
        (-0.010 * t1).exp(),
        epsilon = 1e-10
    );
    assert_relative_eq!(built.hazard_rate(0.5 * t1).unwrap(), 0.010, epsilon = 1e-10);

    let p = built.default_probability(1.0, 2.0).unwrap();
    let expected =
        built.survival_probability(1.0).unwrap() - built.survival_probability(2.0).unwrap();
    assert!(p > 0.0);
    assert_relative_eq!(p, expected, epsilon = 1e-12);
}

// ============================================================================
// Validation before solving
// ============================================================================

#[test]
fn test_duplicate_pillars_rejected_before_solving() {
    let mut session = session();
    let (_, mut helpers) = zero_helpers(&mut session, &ZEROS);
    let deposit = session.new_quote("1Y deposit", 0.03);
    helpers.push(Box::new(
        DepositRateHelper::from_tenor(deposit, today(), Period::years(1)).unwrap(),
    ));
    let nodes = session.graph().node_count();

    let err = PiecewiseCurve::new(&mut session, "dup", CurveBuildConfig::default(), helpers)
        .unwrap_err();
    assert!(matches!(err, CurveError::DuplicatePillar { first: 0, second: 1, .. }));
    assert!(err.is_configuration_error());
    // no lazy node was registered
    assert_eq!(session.graph().node_count(), nodes);
}

#[test]
fn test_empty_helper_set_rejected() {
    let mut session = session();
    let err = PiecewiseCurve::new(&mut session, "empty", CurveBuildConfig::default(), Vec::new())
        .unwrap_err();
    assert_eq!(err, CurveError::EmptyHelperSet);
}

#[test]
fn test_config_from_json_builds_curve() {
    let config = CurveBuildConfig::from_json(
        r#"{
            "kind": "zero_yield",
            "interpolation": { "type": "cubic_spline" },
            "bootstrap": { "method": "iterative", "accuracy": 1e-12 }
        }"#,
    )
    .unwrap();
    let mut session = session();
    let (_, helpers) = zero_helpers(&mut session, &ZEROS);
    let mut curve = PiecewiseCurve::new(&mut session, "spline", config, helpers).unwrap();
    let built = curve.curve(&mut session).unwrap();
    assert_eq!(built.method(), InterpolationMethod::CubicSpline);
    assert_reprices(&built, 1e-9);
}

// ============================================================================
// Laziness
// ============================================================================

#[test]
fn test_quote_change_reaches_dependents() {
    let mut session = session();
    let (quotes, helpers) = zero_helpers(&mut session, &ZEROS);
    let curve =
        PiecewiseCurve::new(&mut session, "zero", CurveBuildConfig::default(), helpers).unwrap();
    let mut pricer = FiveYearDiscount::new(&mut session, curve);

    pricer.calculate(&mut session).unwrap();
    let before = pricer.value;
    assert!(before > 0.8 && before < 1.0);
    assert_eq!(pricer.runs.get(), 1);

    // cached until something changes
    pricer.calculate(&mut session).unwrap();
    assert_eq!(pricer.runs.get(), 1);

    session.set_quote(quotes[2], 0.040).unwrap();
    assert!(!pricer.is_calculated(&session));
    assert!(!pricer.curve.is_calculated(&session));

    pricer.calculate(&mut session).unwrap();
    assert_eq!(pricer.runs.get(), 2);
    assert!(pricer.value < before);
}

#[test]
fn test_unchanged_quote_keeps_cache() {
    let mut session = session();
    let (quotes, helpers) = zero_helpers(&mut session, &ZEROS);
    let mut curve =
        PiecewiseCurve::new(&mut session, "zero", CurveBuildConfig::default(), helpers).unwrap();
    let first = curve.curve(&mut session).unwrap();

    assert!(!session.set_quote(quotes[0], ZEROS[0].1).unwrap());
    assert!(curve.is_calculated(&session));
    assert!(Arc::ptr_eq(&first, &curve.curve(&mut session).unwrap()));
}

#[test]
fn test_evaluation_date_moves_reference() {
    let mut session = session();
    let (_, helpers) = zero_helpers(&mut session, &ZEROS);
    let mut curve =
        PiecewiseCurve::new(&mut session, "zero", CurveBuildConfig::default(), helpers).unwrap();
    curve.curve(&mut session).unwrap();

    let tomorrow = today().add_days(1);
    session.set_evaluation_date(tomorrow).unwrap();
    assert!(!curve.is_calculated(&session));

    let built = curve.curve(&mut session).unwrap();
    assert_eq!(built.reference_date(), tomorrow);
    let t1 = built.time_from_reference(today().add_years(1).unwrap());
    assert_relative_eq!(built.zero_rate(t1).unwrap(), ZEROS[0].1, epsilon = 1e-10);
}

#[test]
fn test_failed_bootstrap_retries_on_next_use() {
    init_tracing();
    let mut session = session();
    let (quotes, helpers) = zero_helpers(&mut session, &ZEROS);
    let mut curve =
        PiecewiseCurve::new(&mut session, "zero", CurveBuildConfig::default(), helpers).unwrap();
    curve.curve(&mut session).unwrap();

    session.reset_quote(quotes[1]).unwrap();
    let err = curve.curve(&mut session).unwrap_err();
    assert!(matches!(err, CurveError::InvalidQuote { index: 1, .. }));
    assert!(!curve.is_calculated(&session));

    session.set_quote(quotes[1], 0.033).unwrap();
    let built = curve.curve(&mut session).unwrap();
    assert_reprices(&built, 1e-10);
}

#[test]
fn test_frozen_curve_keeps_last_result() {
    let mut session = session();
    let (quotes, helpers) = zero_helpers(&mut session, &ZEROS);
    let mut curve =
        PiecewiseCurve::new(&mut session, "zero", CurveBuildConfig::default(), helpers).unwrap();
    let before = curve.curve(&mut session).unwrap();

    curve.freeze(&mut session).unwrap();
    assert!(curve.is_frozen(&session));
    session.set_quote(quotes[0], 0.05).unwrap();
    assert!(Arc::ptr_eq(&before, &curve.curve(&mut session).unwrap()));

    curve.unfreeze(&mut session).unwrap();
    let after = curve.curve(&mut session).unwrap();
    let t1 = after.times()[1];
    assert_relative_eq!(after.zero_rate(t1).unwrap(), 0.05, epsilon = 1e-10);
}

#[test]
fn test_frozen_before_first_use() {
    let mut session = session();
    let (_, helpers) = zero_helpers(&mut session, &ZEROS);
    let mut curve =
        PiecewiseCurve::new(&mut session, "cold", CurveBuildConfig::default(), helpers).unwrap();
    curve.freeze(&mut session).unwrap();

    assert_eq!(
        curve.curve(&mut session).unwrap_err(),
        CurveError::NotCalculated {
            label: "cold".to_string()
        }
    );

    // recalculate ignores the freeze
    curve.recalculate(&mut session).unwrap();
    assert!(curve.curve(&mut session).is_ok());
    assert!(curve.is_frozen(&session));
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_helper_order_does_not_matter(
        order in Just((0..ZEROS.len()).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let mut session = session();
        let (_, sorted) = zero_helpers(&mut session, &ZEROS);
        let shuffled: Vec<(i32, f64)> = order.iter().map(|&i| ZEROS[i]).collect();
        let (_, permuted) = zero_helpers(&mut session, &shuffled);

        let mut a = PiecewiseCurve::new(&mut session, "sorted", CurveBuildConfig::default(), sorted).unwrap();
        let mut b = PiecewiseCurve::new(&mut session, "shuffled", CurveBuildConfig::default(), permuted).unwrap();
        let a = a.curve(&mut session).unwrap();
        let b = b.curve(&mut session).unwrap();

        prop_assert_eq!(a.dates(), b.dates());
        prop_assert_eq!(a.values(), b.values());
    }

    #[test]
    fn prop_flat_zero_curve_recovers_rate(rate in 0.001f64..0.10) {
        let mut session = session();
        let flat: Vec<(i32, f64)> = ZEROS.iter().map(|&(years, _)| (years, rate)).collect();
        let (_, helpers) = zero_helpers(&mut session, &flat);
        let mut curve = PiecewiseCurve::new(&mut session, "flat", CurveBuildConfig::default(), helpers).unwrap();
        let built = curve.curve(&mut session).unwrap();

        for t in [0.25, 1.0, 4.0, 9.0, 15.0] {
            prop_assert!((built.zero_rate(t).unwrap() - rate).abs() < 1e-9);
        }
    }
}
