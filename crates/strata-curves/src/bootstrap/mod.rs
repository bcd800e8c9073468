//! Curve bootstrap algorithms.
//!
//! A bootstrap solves the node values of a [`CurveUnderConstruction`] so
//! that the curve reprices every helper's quote.
//!
//! # Bootstrap Methods
//!
//! - **Iterative Bootstrap**: Solves one node per helper in pillar order
//!   with a bracketed root search. Global interpolations are swept
//!   repeatedly until the nodes settle.
//!
//! - **Local Bootstrap**: Solves a sliding window of nodes jointly with
//!   Levenberg-Marquardt, which keeps the risk of non-local interpolations
//!   such as convex monotone confined to a neighbourhood of each quote.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_curves::bootstrap::{Bootstrap, IterativeBootstrap};
//!
//! IterativeBootstrap::default().bootstrap(&mut curve, &helpers, &quotes)?;
//! ```

mod iterative;
mod local;
pub mod traits;

pub use iterative::{IterativeBootstrap, IterativeBootstrapConfig};
pub use local::{LocalBootstrap, LocalBootstrapConfig};
pub use traits::{BootstrapTraits, CurveKind};

use std::fmt;

use crate::curve::CurveUnderConstruction;
use crate::error::{CurveError, CurveResult};
use crate::helpers::BootstrapHelper;
use crate::traits::Curve;

/// A strategy solving the nodes of a curve.
pub trait Bootstrap: fmt::Debug + Send + Sync {
    /// Solves every node of `curve`.
    ///
    /// `helpers` must be sorted by pillar, one per node after the reference
    /// node, with `quotes` in the same order. On success the curve's
    /// interpolator covers every node.
    fn bootstrap(
        &self,
        curve: &mut CurveUnderConstruction,
        helpers: &[Box<dyn BootstrapHelper>],
        quotes: &[f64],
    ) -> CurveResult<()>;
}

/// Sorts helpers by pillar date, keeping the input order of ties.
pub fn sort_helpers(helpers: &mut [Box<dyn BootstrapHelper>]) {
    helpers.sort_by_key(|h| h.pillar_date());
}

/// Rejects an empty or unsorted helper set and shared pillars.
pub fn check_helpers(helpers: &[Box<dyn BootstrapHelper>]) -> CurveResult<()> {
    if helpers.is_empty() {
        return Err(CurveError::EmptyHelperSet);
    }
    for (i, pair) in helpers.windows(2).enumerate() {
        let (a, b) = (pair[0].pillar_date(), pair[1].pillar_date());
        if a == b {
            return Err(CurveError::DuplicatePillar {
                pillar: a,
                first: i,
                second: i + 1,
            });
        }
        if a > b {
            return Err(CurveError::invalid_config(format!(
                "helpers are not sorted: pillar {a} precedes {b}"
            )));
        }
    }
    Ok(())
}

/// Signed repricing error of every helper against `curve`.
pub fn quote_errors(
    curve: &dyn Curve,
    helpers: &[Box<dyn BootstrapHelper>],
    quotes: &[f64],
) -> CurveResult<Vec<f64>> {
    helpers
        .iter()
        .zip(quotes)
        .map(|(helper, &quote)| helper.quote_error(quote, curve))
        .collect()
}

/// Checks that helpers, quotes and nodes line up.
fn check_inputs(
    curve: &CurveUnderConstruction,
    helpers: &[Box<dyn BootstrapHelper>],
    quotes: &[f64],
) -> CurveResult<()> {
    check_helpers(helpers)?;
    if helpers.len() != quotes.len() || helpers.len() != curve.pillar_count() {
        return Err(CurveError::invalid_config(format!(
            "{} helpers, {} quotes and {} pillars do not match",
            helpers.len(),
            quotes.len(),
            curve.pillar_count()
        )));
    }
    for (helper, date) in helpers.iter().zip(&curve.dates()[1..]) {
        if helper.pillar_date() != *date {
            return Err(CurveError::invalid_config(format!(
                "helper pillar {} does not match curve node {date}",
                helper.pillar_date()
            )));
        }
    }
    Ok(())
}
