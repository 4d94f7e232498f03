use super::pct;
use crate::analysis::stats::least_frequent;
use crate::model::analysis::AnalysisResult;
use crate::model::signal::{Signal, SignalKind, SignalStatus};

/// Quotes considered by the rise/fall trend.
pub const TREND_LOOKBACK: usize = 10;

pub fn even_odd(analysis: &AnalysisResult) -> Signal {
    let even = analysis.even_percentage;
    let odd = analysis.odd_percentage;
    let max = even.max(odd);
    let favored = if even > odd { "even" } else { "odd" };
    let opposite = if favored == "even" { "odd" } else { "even" };

    if max >= 60.0 {
        Signal::new(
            SignalKind::EvenOdd,
            SignalStatus::TradeNow,
            max,
            format!("Strong {} bias detected", favored),
            format!(
                "Wait for 2+ consecutive {} digits, then trade {}",
                opposite, favored
            ),
        )
    } else if max >= 55.0 {
        Signal::new(
            SignalKind::EvenOdd,
            SignalStatus::Wait,
            max,
            format!("Moderate {} bias", favored),
            "Monitor for stronger signal or entry condition",
        )
    } else {
        Signal::neutral(
            SignalKind::EvenOdd,
            max,
            "No clear even/odd bias",
            "Wait for clearer signal",
        )
    }
}

pub fn over_under(analysis: &AnalysisResult) -> Signal {
    let high = analysis.high_percentage;
    let low = analysis.low_percentage;
    let power = analysis.power_index;
    let max = high.max(low);
    let favored = if high > low { "over" } else { "under" };

    if max >= 62.0 && power.gap >= 15.0 {
        Signal::new(
            SignalKind::OverUnder,
            SignalStatus::TradeNow,
            max,
            format!("Strong {} 4.5 signal with {}% gap", favored, pct(power.gap)),
            format!("Trade when digit {} appears", power.strongest),
        )
    } else if max >= 58.0 {
        Signal::new(
            SignalKind::OverUnder,
            SignalStatus::Wait,
            max,
            format!("Moderate {} 4.5 bias", favored),
            "Wait for power gap to increase",
        )
    } else {
        Signal::neutral(
            SignalKind::OverUnder,
            max,
            "No clear over/under bias",
            "Wait for clearer signal",
        )
    }
}

pub fn matches(analysis: &AnalysisResult) -> Signal {
    let top = analysis.frequency(analysis.power_index.strongest);

    if top.percentage >= 15.0 {
        Signal::new(
            SignalKind::Matches,
            SignalStatus::TradeNow,
            top.percentage,
            format!(
                "Digit {} has strong power at {}%",
                top.digit,
                pct(top.percentage)
            ),
            format!("Trade immediately when digit {} appears", top.digit),
        )
        .with_target(top.digit)
    } else if top.percentage >= 12.0 {
        Signal::new(
            SignalKind::Matches,
            SignalStatus::Wait,
            top.percentage,
            format!("Digit {} showing moderate frequency", top.digit),
            "Wait for frequency to increase",
        )
        .with_target(top.digit)
    } else {
        Signal::neutral(
            SignalKind::Matches,
            top.percentage,
            "No dominant digit pattern",
            "Wait for clearer pattern",
        )
    }
}

pub fn differs(analysis: &AnalysisResult) -> Signal {
    let least = least_frequent(&analysis.digit_frequencies);

    if least.percentage < 9.0 {
        Signal::new(
            SignalKind::Differs,
            SignalStatus::TradeNow,
            100.0 - least.percentage,
            format!(
                "Digit {} appears only {}% - Strong differs signal",
                least.digit,
                pct(least.percentage)
            ),
            format!(
                "Wait for digit {} to appear, then trade DIFFERS immediately",
                least.digit
            ),
        )
        .with_target(least.digit)
    } else {
        Signal::neutral(
            SignalKind::Differs,
            50.0,
            "No clear differs pattern",
            "Wait for a digit with <9% frequency",
        )
    }
}

/// Short-term direction from the net move across `recent_quotes`
/// (the trailing [`TREND_LOOKBACK`] quotes, oldest first).
pub fn rise_fall(recent_quotes: &[f64]) -> Signal {
    let (first, last) = match (recent_quotes.first(), recent_quotes.last()) {
        (Some(first), Some(last)) if recent_quotes.len() >= 2 => (*first, *last),
        _ => {
            return Signal::neutral(
                SignalKind::RiseFall,
                50.0,
                "Insufficient data for trend analysis",
                "Wait for more ticks",
            )
        }
    };

    let trend = last - first;
    let direction = if trend > 0.0 { "rise" } else { "fall" };
    // The raw quote delta is scaled straight into confidence points.
    let confidence = (60.0 + trend.abs() * 100.0).min(75.0);

    if confidence >= 60.0 {
        Signal::new(
            SignalKind::RiseFall,
            SignalStatus::TradeNow,
            confidence,
            format!(
                "{} trend detected with {}% confidence",
                direction.to_uppercase(),
                pct(confidence)
            ),
            format!("Trade {} based on current trend", direction),
        )
    } else {
        Signal::neutral(
            SignalKind::RiseFall,
            confidence,
            "No clear directional trend",
            "Wait for stronger trend",
        )
    }
}
