//! Shared, read-only view of the detector for other threads.
//!
//! The detection loop is the only writer. Readers (periodic reporters,
//! operator-facing layers) take a cloned snapshot under the lock.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::capture::CaptureState;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WatchStatus {
    pub cycles: u64,
    pub scored: u64,
    pub fetch_failures: u64,
    pub mismatches: u64,
    pub last_score: Option<f64>,
    pub average: f64,
    pub run_length: u32,
    pub capture_state: CaptureState,
    pub sessions_total: u64,
    pub videos_captured: u64,
    pub last_artifact: Option<PathBuf>,
}

#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    inner: Arc<Mutex<WatchStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WatchStatus {
        self.lock().clone()
    }

    pub(crate) fn update(&self, apply: impl FnOnce(&mut WatchStatus)) {
        apply(&mut self.lock());
    }

    fn lock(&self) -> MutexGuard<'_, WatchStatus> {
        // A panicked writer leaves plain counters behind; still worth reading.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
