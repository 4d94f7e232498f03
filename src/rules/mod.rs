//! Stateless signal rules over an [`AnalysisResult`] snapshot.
//!
//! Every rule returns a [`Signal`]; an unmet rule is a `NEUTRAL` signal,
//! never an error. Thresholds are product contract values.

pub mod basic;
pub mod pro;

use crate::analysis::digit::to_fixed;
use crate::model::analysis::AnalysisResult;
use crate::model::signal::Signal;

/// One-decimal percentage text used in rule messages.
pub(crate) fn pct(value: f64) -> String {
    to_fixed(value, 1)
}

/// even_odd, over_under, matches, differs, rise_fall (in that order).
pub fn evaluate_basic(analysis: &AnalysisResult, recent_quotes: &[f64]) -> Vec<Signal> {
    vec![
        basic::even_odd(analysis),
        basic::over_under(analysis),
        basic::matches(analysis),
        basic::differs(analysis),
        basic::rise_fall(recent_quotes),
    ]
}

/// Pro rules with `NEUTRAL` results dropped.
pub fn evaluate_pro(analysis: &AnalysisResult, recent_digits: &[u8]) -> Vec<Signal> {
    [
        pro::pro_even_odd(analysis, recent_digits),
        pro::pro_over_under(analysis, recent_digits),
        pro::pro_differs(analysis),
        pro::under_7(analysis),
        pro::over_2(analysis),
    ]
    .into_iter()
    .filter(Signal::is_actionable)
    .collect()
}
