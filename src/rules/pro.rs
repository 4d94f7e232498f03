use super::pct;
use crate::analysis::digit::is_even;
use crate::analysis::stats::{least_frequent, trailing_run};
use crate::model::analysis::{AnalysisResult, DigitFrequency};
use crate::model::signal::{Signal, SignalKind, SignalStatus};

/// Digits of history the pro rules look at.
pub const PRO_LOOKBACK: usize = 20;

fn last_n(digits: &[u8], n: usize) -> &[u8] {
    &digits[digits.len().saturating_sub(n)..]
}

/// Entry digit for the under-7 / over-2 rules: at least two of `group` below
/// 10% and at least one above it. Picks the highest percentage above 10%,
/// ties to the lowest digit.
fn group_entry(analysis: &AnalysisResult, group: [u8; 3]) -> Option<DigitFrequency> {
    let freqs = group.map(|d| analysis.frequency(d));
    let below = freqs.iter().filter(|f| f.percentage < 10.0).count();
    if below < 2 {
        return None;
    }
    freqs
        .into_iter()
        .filter(|f| f.percentage > 10.0)
        .fold(None, |best: Option<DigitFrequency>, f| match best {
            Some(b) if b.percentage >= f.percentage => Some(b),
            _ => Some(f),
        })
}

pub fn pro_even_odd(analysis: &AnalysisResult, recent_digits: &[u8]) -> Signal {
    let strongest = analysis.power_index.strongest;
    let last20 = last_n(recent_digits, PRO_LOOKBACK);

    if analysis.even_percentage >= 55.0 {
        let strong_evens = analysis
            .digit_frequencies
            .iter()
            .filter(|f| is_even(f.digit) && f.percentage >= 11.0)
            .count();
        let even_in_last20 = last20.iter().filter(|&&d| is_even(d)).count();

        if strong_evens >= 2 && is_even(strongest) && even_in_last20 >= 11 {
            let odd_run = trailing_run(recent_digits, |d| !is_even(d));
            if odd_run >= 3 {
                return Signal::new(
                    SignalKind::ProEvenOdd,
                    SignalStatus::TradeNow,
                    analysis.even_percentage,
                    format!(
                        "EVEN STRATEGY: {} consecutive odds detected - Enter EVEN now!",
                        odd_run
                    ),
                    "Enter EVEN immediately after first even digit appears",
                );
            }
            return Signal::new(
                SignalKind::ProEvenOdd,
                SignalStatus::Wait,
                analysis.even_percentage,
                "EVEN conditions met - Waiting for 3+ consecutive ODD digits",
                "Wait for 3+ consecutive ODD digits, then enter EVEN",
            );
        }
    }

    if analysis.odd_percentage >= 70.0 {
        let strong_odds = analysis
            .digit_frequencies
            .iter()
            .filter(|f| !is_even(f.digit) && f.percentage >= 11.0)
            .count();
        let odd_in_last20 = last20.iter().filter(|&&d| !is_even(d)).count();

        if strong_odds >= 2 && !is_even(strongest) && odd_in_last20 >= 14 {
            let even_run = trailing_run(recent_digits, is_even);
            if even_run >= 3 {
                return Signal::new(
                    SignalKind::ProEvenOdd,
                    SignalStatus::TradeNow,
                    analysis.odd_percentage,
                    format!(
                        "ODD STRATEGY: {} consecutive evens detected - Enter ODD now!",
                        even_run
                    ),
                    "Enter ODD immediately after first odd digit appears",
                );
            }
            return Signal::new(
                SignalKind::ProEvenOdd,
                SignalStatus::Wait,
                analysis.odd_percentage,
                "ODD conditions met - Waiting for 3+ consecutive EVEN digits",
                "Wait for 3+ consecutive EVEN digits, then enter ODD",
            );
        }
    }

    Signal::neutral(
        SignalKind::ProEvenOdd,
        analysis.even_percentage.max(analysis.odd_percentage),
        "Pro Even/Odd conditions not met",
        "Wait for stronger signal",
    )
}

pub fn pro_over_under(analysis: &AnalysisResult, recent_digits: &[u8]) -> Signal {
    let weakest = analysis.power_index.weakest;
    let last20 = last_n(recent_digits, PRO_LOOKBACK);
    let freqs = &analysis.digit_frequencies;

    // Over 1
    if freqs[0].percentage < 10.0 && freqs[1].percentage < 10.0 {
        let strong = freqs[2..].iter().filter(|f| f.percentage >= 11.0).count();
        let weakest_in_range = weakest == 0 || weakest == 1;
        if strong >= 3 && weakest_in_range && analysis.high_percentage >= 90.0 {
            let over_in_last20 = last20.iter().filter(|&&d| d > 1).count();
            if over_in_last20 >= 18 {
                return Signal::new(
                    SignalKind::ProOverUnder,
                    SignalStatus::TradeNow,
                    analysis.high_percentage,
                    "OVER 1 STRATEGY: Strong signal - 90%+ win rate detected!",
                    "Wait for 1+ UNDER digits, then enter OVER 1 immediately",
                );
            }
        }
    }

    // Under 8
    if freqs[8].percentage < 10.0 && freqs[9].percentage < 10.0 {
        let strong = freqs[..8].iter().filter(|f| f.percentage >= 11.0).count();
        let weakest_in_range = weakest == 8 || weakest == 9;
        if strong >= 3 && weakest_in_range && analysis.low_percentage >= 90.0 {
            let under_in_last20 = last20.iter().filter(|&&d| d < 8).count();
            if under_in_last20 >= 18 {
                return Signal::new(
                    SignalKind::ProOverUnder,
                    SignalStatus::TradeNow,
                    analysis.low_percentage,
                    "UNDER 8 STRATEGY: Strong signal - 90%+ win rate detected!",
                    "Wait for 1+ OVER digits, then enter UNDER 8 immediately",
                );
            }
        }
    }

    Signal::neutral(
        SignalKind::ProOverUnder,
        analysis.high_percentage.max(analysis.low_percentage),
        "Pro Over/Under conditions not met",
        "Wait for stronger signal",
    )
}

pub fn pro_differs(analysis: &AnalysisResult) -> Signal {
    let least = least_frequent(&analysis.digit_frequencies);

    if least.percentage < 9.0 {
        let win_rate = 100.0 - least.percentage;
        if win_rate >= 88.0 {
            return Signal::new(
                SignalKind::ProDiffers,
                SignalStatus::TradeNow,
                win_rate,
                format!(
                    "PRO DIFFERS: Digit {} at {}% - {}% win rate!",
                    least.digit,
                    pct(least.percentage),
                    pct(win_rate)
                ),
                format!(
                    "Wait for digit {} to appear, then trade DIFFERS immediately",
                    least.digit
                ),
            )
            .with_target(least.digit);
        }
    }

    Signal::neutral(
        SignalKind::ProDiffers,
        50.0,
        "Pro Differs conditions not met",
        "Wait for digit with <9% frequency and 88%+ differs win rate",
    )
}

pub fn under_7(analysis: &AnalysisResult) -> Signal {
    if let Some(entry) = group_entry(analysis, [7, 8, 9]) {
        let probability = 100.0 - entry.percentage;
        if probability >= 85.0 {
            return Signal::new(
                SignalKind::ProOverUnder,
                SignalStatus::TradeNow,
                probability,
                format!(
                    "UNDER 7 STRATEGY: Digit {} at {}% - Enter UNDER 7!",
                    entry.digit,
                    pct(entry.percentage)
                ),
                format!("Trade UNDER 7 when digit {} appears", entry.digit),
            )
            .with_target(entry.digit);
        }
    }

    Signal::neutral(
        SignalKind::ProOverUnder,
        50.0,
        "Under 7 conditions not met",
        "Wait for 2+ digits in 7,8,9 to be <10%",
    )
}

pub fn over_2(analysis: &AnalysisResult) -> Signal {
    if let Some(entry) = group_entry(analysis, [0, 1, 2]) {
        let probability = entry.percentage + 75.0;
        if probability >= 85.0 {
            return Signal::new(
                SignalKind::ProOverUnder,
                SignalStatus::TradeNow,
                probability.min(95.0),
                format!(
                    "OVER 2 STRATEGY: Digit {} at {}% - Enter OVER 2!",
                    entry.digit,
                    pct(entry.percentage)
                ),
                format!("Trade OVER 2 when digit {} appears", entry.digit),
            )
            .with_target(entry.digit);
        }
    }

    Signal::neutral(
        SignalKind::ProOverUnder,
        50.0,
        "Over 2 conditions not met",
        "Wait for 2+ digits in 0,1,2 to be <10%",
    )
}
