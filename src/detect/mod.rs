//! Motion decision engine.
//!
//! Each cycle the difference of the current sample pair is scored by its
//! entropy. `MotionEngine` owns the two pieces of rolling state that judge
//! that score: the baseline (noise floor) and the hysteresis run (debounce).

mod baseline;
mod difference;
mod entropy;
mod hysteresis;

pub use baseline::{BaselineTracker, DEFAULT_INTERVAL, DEFAULT_WINDOW};
pub use difference::{difference, DimensionMismatch};
pub use entropy::{histogram_entropy, image_entropy};
pub use hysteresis::{ChangeHysteresis, DEFAULT_CONSECUTIVE_CHANGES};

/// Tuning for the motion decision.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectConfig {
    /// Margin above the baseline a score must exceed to count as a change.
    pub sensitivity: f64,
    /// Consecutive changes required to confirm motion.
    pub consecutive_changes: u32,
    /// Baseline window capacity.
    pub baseline_window: usize,
    /// Cycles between baseline recomputations once the window is full.
    pub baseline_interval: u32,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            sensitivity: 5.0,
            consecutive_changes: DEFAULT_CONSECUTIVE_CHANGES,
            baseline_window: DEFAULT_WINDOW,
            baseline_interval: DEFAULT_INTERVAL,
        }
    }
}

/// What the engine concluded about one score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub score: f64,
    pub average: f64,
    pub run_length: u32,
    pub confirmed: bool,
}

pub struct MotionEngine {
    sensitivity: f64,
    baseline: BaselineTracker,
    hysteresis: ChangeHysteresis,
}

impl MotionEngine {
    pub fn new(config: &DetectConfig) -> Self {
        Self {
            sensitivity: config.sensitivity,
            baseline: BaselineTracker::new(config.baseline_window, config.baseline_interval),
            hysteresis: ChangeHysteresis::new(config.consecutive_changes),
        }
    }

    /// Feed one difference score, in acquisition order.
    pub fn observe(&mut self, score: f64) -> Observation {
        let average = self.baseline.update(score);
        let confirmed = self.hysteresis.evaluate(score, average, self.sensitivity);
        Observation {
            score,
            average,
            run_length: self.hysteresis.run_length(),
            confirmed,
        }
    }

    /// Require a fresh debounce run before the next confirmation.
    pub fn reset_hysteresis(&mut self) {
        self.hysteresis.reset();
    }

    pub fn baseline(&self) -> &BaselineTracker {
        &self.baseline
    }

    pub fn run_length(&self) -> u32 {
        self.hysteresis.run_length()
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }
}
