use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DigitFrequency {
    pub digit: u8,
    pub count: usize,
    pub percentage: f64,
}

/// Strongest/weakest digit pair and the percentage gap between them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PowerIndex {
    pub strongest: u8,
    pub weakest: u8,
    pub gap: f64,
}

/// Longest run of one digit inside the window (runs of 2 or more only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub digit: u8,
    pub count: usize,
}

/// Immutable snapshot of the digit window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// One entry per digit, ascending.
    pub digit_frequencies: [DigitFrequency; 10],
    pub even_count: usize,
    pub odd_count: usize,
    pub even_percentage: f64,
    pub odd_percentage: f64,
    /// Digits 5-9.
    pub high_count: usize,
    /// Digits 0-4.
    pub low_count: usize,
    pub high_percentage: f64,
    pub low_percentage: f64,
    /// Shannon entropy in bits.
    pub entropy: f64,
    pub power_index: PowerIndex,
    pub missing_digits: Vec<u8>,
    pub streaks: Vec<Streak>,
    pub total_ticks: usize,
}

impl AnalysisResult {
    pub fn empty() -> Self {
        let mut digit_frequencies = [DigitFrequency {
            digit: 0,
            count: 0,
            percentage: 0.0,
        }; 10];
        for (digit, freq) in digit_frequencies.iter_mut().enumerate() {
            freq.digit = digit as u8;
        }
        Self {
            digit_frequencies,
            even_count: 0,
            odd_count: 0,
            even_percentage: 0.0,
            odd_percentage: 0.0,
            high_count: 0,
            low_count: 0,
            high_percentage: 0.0,
            low_percentage: 0.0,
            entropy: 0.0,
            power_index: PowerIndex::default(),
            missing_digits: Vec::new(),
            streaks: Vec::new(),
            total_ticks: 0,
        }
    }

    pub fn frequency(&self, digit: u8) -> DigitFrequency {
        self.digit_frequencies[usize::from(digit.min(9))]
    }

    pub fn percentage(&self, digit: u8) -> f64 {
        self.frequency(digit).percentage
    }

    pub fn is_empty(&self) -> bool {
        self.total_ticks == 0
    }
}
