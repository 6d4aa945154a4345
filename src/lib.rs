//! Motion Sentry
//!
//! Watches a network camera for motion by comparing consecutive still
//! snapshots and records a short video clip when motion is confirmed.
//!
//! # Pipeline
//!
//! 1. **Sample**: fetch a still image and crop it to the region of interest.
//! 2. **Score**: take the per-pixel absolute difference of two consecutive
//!    samples and measure its Shannon entropy. Motion yields a high-entropy
//!    difference; a static scene yields a near-uniform one.
//! 3. **Baseline**: keep a rolling average of recent scores, refreshed on a
//!    fixed cadence so slow lighting drift is absorbed.
//! 4. **Debounce**: require several consecutive scores above
//!    `baseline + sensitivity` before declaring motion.
//! 5. **Capture**: record a fixed-length clip from the camera stream and
//!    optionally hand it to an uploader.
//!
//! # Module Structure
//!
//! - `frame`: image samples and the region of interest
//! - `ingest`: sample sources (HTTP snapshots)
//! - `detect`: entropy, difference, baseline, hysteresis, `MotionEngine`
//! - `capture`: capture sessions, recorders, uploaders, artifact naming
//! - `watch`: the detection loop
//! - `status`: shared status snapshot
//! - `config`: operator configuration

pub mod camera;
pub mod capture;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod status;
pub mod watch;

pub use camera::CameraEndpoint;
pub use capture::{
    CaptureConfig, CaptureOrchestrator, CaptureState, Recorder, Recording, SessionReport,
    TriggerOutcome, Uploader,
};
pub use config::MotionConfig;
pub use detect::{difference, image_entropy, DetectConfig, MotionEngine, Observation};
pub use frame::{crop, ImageSample, Region};
pub use ingest::{FetchError, HttpSnapshotSource, SampleSource};
pub use status::{StatusBoard, WatchStatus};
pub use watch::{CycleOutcome, WatchConfig, Watcher};
