use crate::model::analysis::{DigitFrequency, PowerIndex, Streak};

/// `(count / total) * 100`, divided first. Thresholds are compared against
/// this exact rounding, so 58 of 100 is just under 58.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64) * 100.0
}

pub fn frequencies(counts: &[usize; 10], total: usize) -> [DigitFrequency; 10] {
    std::array::from_fn(|digit| DigitFrequency {
        digit: digit as u8,
        count: counts[digit],
        percentage: percentage(counts[digit], total),
    })
}

/// Shannon entropy in bits. Zero-count digits contribute nothing.
pub fn entropy(counts: &[usize; 10], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum::<f64>()
        .max(0.0)
}

/// Strongest digit (ties to the lowest digit) and weakest digit (ties to the
/// highest digit), matching a stable descending sort by count.
pub fn power_index(freqs: &[DigitFrequency; 10]) -> PowerIndex {
    let mut strongest = freqs[0];
    let mut weakest = freqs[0];
    for freq in &freqs[1..] {
        if freq.count > strongest.count {
            strongest = *freq;
        }
        if freq.count <= weakest.count {
            weakest = *freq;
        }
    }
    PowerIndex {
        strongest: strongest.digit,
        weakest: weakest.digit,
        gap: strongest.percentage - weakest.percentage,
    }
}

/// Least frequent digit, ties to the lowest digit.
pub fn least_frequent(freqs: &[DigitFrequency; 10]) -> DigitFrequency {
    let mut least = freqs[0];
    for freq in &freqs[1..] {
        if freq.count < least.count {
            least = *freq;
        }
    }
    least
}

pub fn missing_digits(freqs: &[DigitFrequency; 10]) -> Vec<u8> {
    freqs
        .iter()
        .filter(|f| f.count == 0)
        .map(|f| f.digit)
        .collect()
}

/// Longest run per digit (2+ only), longest first. Equal runs keep the order
/// in which the digit first completed a run.
pub fn detect_streaks(digits: impl IntoIterator<Item = u8>) -> Vec<Streak> {
    let mut streaks: Vec<Streak> = Vec::new();
    let mut record = |digit: u8, run: usize| {
        if run < 2 {
            return;
        }
        match streaks.iter_mut().find(|s| s.digit == digit) {
            Some(existing) => existing.count = existing.count.max(run),
            None => streaks.push(Streak { digit, count: run }),
        }
    };

    let mut current: Option<u8> = None;
    let mut run = 0usize;
    for digit in digits {
        if current == Some(digit) {
            run += 1;
        } else {
            if let Some(prev) = current {
                record(prev, run);
            }
            current = Some(digit);
            run = 1;
        }
    }
    if let Some(prev) = current {
        record(prev, run);
    }

    streaks.sort_by(|a, b| b.count.cmp(&a.count));
    streaks
}

/// Length of the run at the end of `digits` whose members satisfy `pred`.
pub fn trailing_run(digits: &[u8], pred: impl Fn(u8) -> bool) -> usize {
    digits.iter().rev().take_while(|&&d| pred(d)).count()
}
