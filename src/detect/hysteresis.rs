//! Debounce for change detection: motion is confirmed only after a run of
//! consecutive samples above `average + sensitivity`.

pub const DEFAULT_CONSECUTIVE_CHANGES: u32 = 2;

#[derive(Clone, Debug)]
pub struct ChangeHysteresis {
    required: u32,
    run: u32,
}

impl ChangeHysteresis {
    /// `required` is clamped to at least 1.
    pub fn new(required: u32) -> Self {
        Self {
            required: required.max(1),
            run: 0,
        }
    }

    /// Extend or reset the run. Returns true only on the sample where the run
    /// first reaches the required length; the run keeps counting past it.
    pub fn evaluate(&mut self, score: f64, average: f64, sensitivity: f64) -> bool {
        if score > average + sensitivity {
            self.run = self.run.saturating_add(1);
        } else {
            self.run = 0;
        }
        self.run == self.required
    }

    pub fn run_length(&self) -> u32 {
        self.run
    }

    pub fn required(&self) -> u32 {
        self.required
    }

    pub fn reset(&mut self) {
        self.run = 0;
    }
}

impl Default for ChangeHysteresis {
    fn default() -> Self {
        Self::new(DEFAULT_CONSECUTIVE_CHANGES)
    }
}
