use super::digit::{extract_digit, is_even, is_high};
use super::stats;
use super::window::DigitWindow;
use crate::model::analysis::AnalysisResult;
use crate::model::signal::Signal;
use crate::model::tick::Tick;
use crate::rules::{self, basic::TREND_LOOKBACK, pro::PRO_LOOKBACK};

pub const DEFAULT_WINDOW_SIZE: usize = 100;
pub const DEFAULT_PIP_SIZE: u32 = 2;

/// Rolling last-digit statistics over the most recent ticks.
///
/// Ingestion is incremental; `analyze`, `signals` and `pro_signals` are pure
/// reads that return owned snapshots.
#[derive(Debug, Clone)]
pub struct AnalysisEngine {
    window: DigitWindow,
    pip_size: u32,
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

impl AnalysisEngine {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: DigitWindow::new(window_size),
            pip_size: DEFAULT_PIP_SIZE,
        }
    }

    /// Precision used for ticks that carry no pip size of their own.
    pub fn set_pip_size(&mut self, pip_size: u32) {
        self.pip_size = pip_size;
    }

    pub fn pip_size(&self) -> u32 {
        self.pip_size
    }

    /// Resize the window, evicting the oldest ticks if it shrinks.
    pub fn configure(&mut self, window_size: usize) {
        self.window.set_capacity(window_size);
    }

    pub fn window_size(&self) -> usize {
        self.window.capacity()
    }

    /// Record a quote at the given display precision. Returns its last digit.
    pub fn ingest(&mut self, value: f64, precision: u32) -> u8 {
        self.add_tick(Tick::from_quote(value, precision))
    }

    /// Record a tick. Returns its last digit.
    pub fn add_tick(&mut self, tick: Tick) -> u8 {
        let digit = extract_digit(tick.quote, tick.pip_size.unwrap_or(self.pip_size));
        self.window.push(tick, digit);
        digit
    }

    pub fn analyze(&self) -> AnalysisResult {
        let total = self.window.len();
        if total == 0 {
            return AnalysisResult::empty();
        }

        let counts = self.window.counts();
        let digit_frequencies = stats::frequencies(&counts, total);

        let mut even_count = 0;
        let mut high_count = 0;
        for (digit, &count) in counts.iter().enumerate() {
            let digit = digit as u8;
            if is_even(digit) {
                even_count += count;
            }
            if is_high(digit) {
                high_count += count;
            }
        }
        let odd_count = total - even_count;
        let low_count = total - high_count;

        AnalysisResult {
            digit_frequencies,
            even_count,
            odd_count,
            even_percentage: stats::percentage(even_count, total),
            odd_percentage: stats::percentage(odd_count, total),
            high_count,
            low_count,
            high_percentage: stats::percentage(high_count, total),
            low_percentage: stats::percentage(low_count, total),
            entropy: stats::entropy(&counts, total),
            power_index: stats::power_index(&digit_frequencies),
            missing_digits: stats::missing_digits(&digit_frequencies),
            streaks: stats::detect_streaks(self.window.digits()),
            total_ticks: total,
        }
    }

    /// Baseline rules: even_odd, over_under, matches, differs, rise_fall.
    pub fn signals(&self) -> Vec<Signal> {
        let analysis = self.analyze();
        rules::evaluate_basic(&analysis, &self.window.recent_quotes(TREND_LOOKBACK))
    }

    /// Pro rules over the last 20 digits; only non-neutral results.
    pub fn pro_signals(&self) -> Vec<Signal> {
        let analysis = self.analyze();
        rules::evaluate_pro(&analysis, &self.window.recent_digits(PRO_LOOKBACK))
    }

    /// Drop every tick. The window size is kept.
    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn current_digit(&self) -> Option<u8> {
        self.window.last_digit()
    }

    pub fn recent_digits(&self, count: usize) -> Vec<u8> {
        self.window.recent_digits(count)
    }

    pub fn digits(&self) -> Vec<u8> {
        self.window.digits().collect()
    }

    pub fn ticks(&self) -> Vec<Tick> {
        self.window.ticks()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
