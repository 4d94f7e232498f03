use std::collections::VecDeque;

use crate::model::tick::Tick;

#[derive(Debug, Clone)]
struct WindowEntry {
    tick: Tick,
    digit: u8,
}

/// Bounded FIFO of ticks and their last digits with per-digit counts.
///
/// `counts[d]` always equals the number of entries whose digit is `d`;
/// push and evict are both O(1).
#[derive(Debug, Clone)]
pub struct DigitWindow {
    capacity: usize,
    entries: VecDeque<WindowEntry>,
    counts: [usize; 10],
}

impl DigitWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            counts: [0; 10],
        }
    }

    /// Append an observation, evicting the oldest one when over capacity.
    /// Returns the evicted digit, if any.
    pub fn push(&mut self, tick: Tick, digit: u8) -> Option<u8> {
        let digit = digit.min(9);
        self.entries.push_back(WindowEntry { tick, digit });
        self.counts[usize::from(digit)] += 1;
        if self.entries.len() > self.capacity {
            self.evict_oldest()
        } else {
            None
        }
    }

    /// Change the capacity, evicting oldest entries until the window fits.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) -> Option<u8> {
        let removed = self.entries.pop_front()?;
        let slot = &mut self.counts[usize::from(removed.digit)];
        *slot = slot.saturating_sub(1);
        Some(removed.digit)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.counts = [0; 10];
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn counts(&self) -> [usize; 10] {
        self.counts
    }

    pub fn last_digit(&self) -> Option<u8> {
        self.entries.back().map(|e| e.digit)
    }

    /// Digits oldest first.
    pub fn digits(&self) -> impl DoubleEndedIterator<Item = u8> + ExactSizeIterator + '_ {
        self.entries.iter().map(|e| e.digit)
    }

    /// The trailing `count` digits, oldest first.
    pub fn recent_digits(&self, count: usize) -> Vec<u8> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).map(|e| e.digit).collect()
    }

    /// The trailing `count` quotes, oldest first.
    pub fn recent_quotes(&self, count: usize) -> Vec<f64> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).map(|e| e.tick.quote).collect()
    }

    pub fn ticks(&self) -> Vec<Tick> {
        self.entries.iter().map(|e| e.tick.clone()).collect()
    }
}
