//! Detection loop.
//!
//! Each cycle: fetch a sample, crop it to the region of interest, pair it
//! with the sample retained from the previous cycle, score the entropy of
//! their difference, feed the score to the motion engine and, on a confirmed
//! event, ask the orchestrator for a capture session.
//!
//! Failures inside a cycle never end the loop:
//! - a failed fetch discards the pair; the next cycle fetches a fresh one
//! - a dimension mismatch is reported and the pair discarded
//! - a settled or abandoned session clears the debounce run and the pair

use chrono::{DateTime, Local};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::capture::{CaptureOrchestrator, SessionReport, TriggerOutcome};
use crate::detect::{difference, image_entropy, MotionEngine, Observation};
use crate::frame::{ImageSample, Region};
use crate::ingest::SampleSource;
use crate::status::StatusBoard;

pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct WatchConfig {
    pub camera: String,
    /// Crop applied to every sample; `None` scores whole frames.
    pub region: Option<Region>,
    /// Delay between the fetches of a pair.
    pub interval: Duration,
    /// Pause after the second fetch of a pair.
    pub settle_delay: Duration,
    /// Save the triggering pair and its difference next to each recording.
    pub debug_snapshots: bool,
}

/// What one cycle amounted to.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    Scored(Observation),
    FetchFailed,
    DimensionMismatch,
}

pub struct Watcher<S> {
    config: WatchConfig,
    source: S,
    engine: MotionEngine,
    orchestrator: CaptureOrchestrator,
    previous: Option<ImageSample>,
    status: StatusBoard,
    started_at: DateTime<Local>,
}

impl<S: SampleSource> Watcher<S> {
    pub fn new(
        config: WatchConfig,
        source: S,
        engine: MotionEngine,
        orchestrator: CaptureOrchestrator,
    ) -> Self {
        Self {
            config,
            source,
            engine,
            orchestrator,
            previous: None,
            status: StatusBoard::new(),
            started_at: Local::now(),
        }
    }

    /// Handle for reading the loop's status from other threads.
    pub fn status(&self) -> StatusBoard {
        self.status.clone()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn engine(&self) -> &MotionEngine {
        &self.engine
    }

    pub fn orchestrator(&self) -> &CaptureOrchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut CaptureOrchestrator {
        &mut self.orchestrator
    }

    /// Whether a sample is held over to pair with the next fetch.
    pub fn has_retained_sample(&self) -> bool {
        self.previous.is_some()
    }

    /// Cycle until `shutdown` is raised, then cancel any active session.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        log::info!(
            "starting motion detection for {} (region {:?})",
            self.config.camera,
            self.config.region
        );
        let mut last_status_log = Instant::now();
        while !shutdown.load(Ordering::SeqCst) {
            self.step();
            if last_status_log.elapsed() >= STATUS_LOG_INTERVAL {
                let status = self.status.snapshot();
                log::info!(
                    "[{}] cycles={} scored={} fetch_failures={} sessions={} videos={} state={:?}",
                    self.config.camera,
                    status.cycles,
                    status.scored,
                    status.fetch_failures,
                    status.sessions_total,
                    status.videos_captured,
                    status.capture_state
                );
                last_status_log = Instant::now();
            }
        }
        log::info!("stopping motion detection for {}", self.config.camera);
        if let Some(report) = self.orchestrator.shutdown() {
            self.on_settled(&report);
        }
        self.publish(None);
    }

    /// One detection cycle.
    pub fn step(&mut self) -> CycleOutcome {
        if let Some(report) = self.orchestrator.poll() {
            self.on_settled(&report);
        }
        let outcome = self.cycle();
        self.publish(Some(&outcome));
        outcome
    }

    fn cycle(&mut self) -> CycleOutcome {
        let previous = match self.previous.take() {
            Some(previous) => {
                pause(self.config.interval);
                previous
            }
            None => {
                let Some(first) = self.fetch() else {
                    return CycleOutcome::FetchFailed;
                };
                pause(self.config.interval);
                first
            }
        };
        let Some(current) = self.fetch() else {
            return CycleOutcome::FetchFailed;
        };
        pause(self.config.settle_delay);

        let diff = match difference(previous.image(), current.image()) {
            Ok(diff) => diff,
            Err(err) => {
                log::error!("[{}] {}; discarding sample pair", self.config.camera, err);
                return CycleOutcome::DimensionMismatch;
            }
        };
        let score = image_entropy(&diff);
        let observation = self.engine.observe(score);
        log::info!(
            "[{}: {}] diff entropy {:.2}, avg {:.2}, num videos {}",
            self.config.camera,
            self.started_at.format("%Y-%m-%d,%H:%M:%S"),
            score,
            observation.average,
            self.orchestrator.videos_captured()
        );

        let keep_sample = if observation.confirmed {
            self.dispatch(&previous, &current, &diff, score)
        } else {
            true
        };
        if keep_sample {
            self.previous = Some(current);
        }
        CycleOutcome::Scored(observation)
    }

    fn fetch(&mut self) -> Option<ImageSample> {
        match self.source.fetch() {
            Ok(sample) => Some(match &self.config.region {
                Some(region) => sample.cropped(region),
                None => sample,
            }),
            Err(err) => {
                log::warn!(
                    "[{}] sample fetch failed: {}; restarting pairing",
                    self.config.camera,
                    err
                );
                None
            }
        }
    }

    /// Returns whether the current sample should be kept for the next pair.
    fn dispatch(
        &mut self,
        previous: &ImageSample,
        current: &ImageSample,
        diff: &RgbImage,
        score: f64,
    ) -> bool {
        match self.orchestrator.trigger(Local::now()) {
            TriggerOutcome::Started(artifact) => {
                if self.config.debug_snapshots {
                    save_debug_snapshots(&artifact, previous, current, diff, score);
                }
                self.status
                    .update(|status| status.last_artifact = Some(artifact));
                true
            }
            TriggerOutcome::Busy => true,
            TriggerOutcome::Abandoned(err) => {
                log::warn!("[{}] capture abandoned: {}", self.config.camera, err);
                self.engine.reset_hysteresis();
                false
            }
        }
    }

    fn on_settled(&mut self, report: &SessionReport) {
        log::info!(
            "[{}] session settled ({}), resuming watch",
            self.config.camera,
            report.artifact.display()
        );
        self.engine.reset_hysteresis();
        self.previous = None;
    }

    fn publish(&self, outcome: Option<&CycleOutcome>) {
        let capture_state = self.orchestrator.state();
        let sessions_total = self.orchestrator.sessions_total();
        let videos_captured = self.orchestrator.videos_captured();
        let run_length = self.engine.run_length();
        self.status.update(|status| {
            match outcome {
                Some(CycleOutcome::Scored(observation)) => {
                    status.cycles += 1;
                    status.scored += 1;
                    status.last_score = Some(observation.score);
                    status.average = observation.average;
                }
                Some(CycleOutcome::FetchFailed) => {
                    status.cycles += 1;
                    status.fetch_failures += 1;
                }
                Some(CycleOutcome::DimensionMismatch) => {
                    status.cycles += 1;
                    status.mismatches += 1;
                }
                None => {}
            }
            status.run_length = run_length;
            status.capture_state = capture_state;
            status.sessions_total = sessions_total;
            status.videos_captured = videos_captured;
        });
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

fn save_debug_snapshots(
    artifact: &Path,
    previous: &ImageSample,
    current: &ImageSample,
    diff: &RgbImage,
    score: f64,
) {
    log::info!(
        "debug snapshot entropies: before {:.3}, after {:.3}, diff {:.3}",
        image_entropy(previous.image()),
        image_entropy(current.image()),
        score
    );
    for (suffix, image) in [
        ("-before.png", previous.image()),
        ("-after.png", current.image()),
        ("-diff.png", diff),
    ] {
        let path = snapshot_path(artifact, suffix);
        if let Err(err) = image.save(&path) {
            log::warn!("failed to save debug snapshot {}: {}", path.display(), err);
        }
    }
}

fn snapshot_path(artifact: &Path, suffix: &str) -> PathBuf {
    let mut name = artifact
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    artifact.with_file_name(name)
}
