//! Adaptive noise floor: a bounded window of recent difference entropies.
//!
//! The average is always the plain mean of the window as it stood when it was
//! last recomputed. During warm-up (window not yet full) every score is folded
//! in. Once full, only every `interval`-th score is recorded; the scores in
//! between are compared against the held average and otherwise dropped, so a
//! motion run cannot drag the baseline up behind itself.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 10;
pub const DEFAULT_INTERVAL: u32 = 10;

#[derive(Clone, Debug)]
pub struct BaselineTracker {
    window: VecDeque<f64>,
    capacity: usize,
    interval: u32,
    since_record: u32,
    average: f64,
}

impl BaselineTracker {
    /// `capacity` and `interval` are clamped to at least 1.
    pub fn new(capacity: usize, interval: u32) -> Self {
        let capacity = capacity.max(1);
        let interval = interval.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            interval,
            since_record: interval,
            average: 0.0,
        }
    }

    /// Append `score` (evicting the oldest on overflow) and return the mean
    /// of the window contents.
    pub fn record(&mut self, score: f64) -> f64 {
        if self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(score);
        self.average = self.window.iter().sum::<f64>() / self.window.len() as f64;
        self.average
    }

    /// Apply the update cadence: record while warming up or when the interval
    /// has elapsed, otherwise return the held average unchanged.
    pub fn update(&mut self, score: f64) -> f64 {
        self.since_record = self.since_record.saturating_add(1);
        if self.since_record >= self.interval || !self.is_full() {
            self.since_record = 0;
            return self.record(score);
        }
        self.average
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    /// Window contents, oldest first.
    pub fn scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.window.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BaselineTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_INTERVAL)
    }
}
