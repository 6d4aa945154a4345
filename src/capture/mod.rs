//! Capture orchestration.
//!
//! A confirmed motion event becomes one capture session:
//!
//! `Watching -> Triggered -> Recording -> Uploading (optional) -> Watching`
//!
//! The session runs on a supervisor thread so the detection loop keeps
//! sampling while it records. The supervisor stops the recording at its
//! deadline whether or not the recorder reported completion, then hands the
//! artifact to the uploader if uploads are enabled. At most one session is
//! active; triggers arriving while one is active are refused until it settles.
//!
//! Failure policy:
//! - recording cannot be started: the session is abandoned and reported
//! - upload fails: reported, the local artifact is kept

mod naming;
pub mod recorder;
pub mod upload;

pub use naming::{artifact_file_name, ArtifactNamer};
pub use recorder::{
    CaptureError, HttpStreamRecorder, Recorder, Recording, RecordingSummary, DEFAULT_STREAM_PATH,
};
pub use upload::{
    build_uploader, parse_upload_target, DirectoryUploader, HttpUploader, UploadError,
    UploadTarget, Uploader,
};

use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub const DEFAULT_RECORD_SECS: u64 = 30;
pub const DEFAULT_VIDEO_EXTENSION: &str = "asf";
/// Granularity at which the supervisor notices cancellation.
const SUPERVISOR_POLL: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Camera identity, used in artifact names.
    pub camera: String,
    /// Directory receiving recordings.
    pub videos_dir: PathBuf,
    /// Artifact file extension.
    pub extension: String,
    /// Fixed recording length.
    pub duration: Duration,
    /// Whether finished recordings go to the uploader.
    pub upload_enabled: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureState {
    #[default]
    Watching,
    Triggered,
    Recording,
    Uploading,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordingOutcome {
    Succeeded { bytes: u64 },
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Uploads are turned off.
    Disabled,
    /// Not attempted: the recording failed or the session was cancelled.
    Skipped,
    Uploaded,
    Failed(String),
}

/// How the recording came to an end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingEnd {
    /// The recorder finished before the deadline.
    Completed,
    /// The deadline passed and the recording was stopped.
    Deadline,
    /// Shutdown cancelled the session.
    Cancelled,
    /// The supervisor vanished without reporting.
    Lost,
}

/// Everything known about a settled session.
#[derive(Clone, Debug)]
pub struct SessionReport {
    pub artifact: PathBuf,
    pub started_at: DateTime<Local>,
    pub recording: RecordingOutcome,
    pub upload: UploadOutcome,
    pub ended_by: RecordingEnd,
    /// From session start until the recorder was stopped.
    pub recording_elapsed: Duration,
}

impl SessionReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.recording, RecordingOutcome::Succeeded { .. })
    }
}

#[derive(Debug)]
pub enum TriggerOutcome {
    /// A session started; recording into the given artifact.
    Started(PathBuf),
    /// A session is already active; nothing was started.
    Busy,
    /// The recording could not be started; the session was abandoned.
    Abandoned(CaptureError),
}

enum SupervisorEvent {
    Uploading,
    Settled(SessionReport),
}

struct ActiveSession {
    artifact: PathBuf,
    started_at: DateTime<Local>,
    state: CaptureState,
    cancel: Sender<()>,
    events: Receiver<SupervisorEvent>,
    join: Option<JoinHandle<()>>,
}

pub struct CaptureOrchestrator {
    config: CaptureConfig,
    recorder: Arc<dyn Recorder>,
    uploader: Option<Arc<dyn Uploader>>,
    namer: ArtifactNamer,
    active: Option<ActiveSession>,
    sessions_total: u64,
    videos_captured: u64,
}

impl CaptureOrchestrator {
    pub fn new(
        config: CaptureConfig,
        recorder: Arc<dyn Recorder>,
        uploader: Option<Arc<dyn Uploader>>,
    ) -> Self {
        if config.upload_enabled && uploader.is_none() {
            log::warn!("upload enabled but no uploader configured; recordings stay local");
        }
        Self {
            config,
            recorder,
            uploader,
            namer: ArtifactNamer::new(),
            active: None,
            sessions_total: 0,
            videos_captured: 0,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        self.active
            .as_ref()
            .map(|active| active.state)
            .unwrap_or(CaptureState::Watching)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Artifact of the active session, if any.
    pub fn active_artifact(&self) -> Option<&PathBuf> {
        self.active.as_ref().map(|active| &active.artifact)
    }

    /// Sessions that have settled since startup, whatever their outcome.
    pub fn sessions_total(&self) -> u64 {
        self.sessions_total
    }

    /// Settled sessions whose recording succeeded and was not cut short by
    /// shutdown.
    pub fn videos_captured(&self) -> u64 {
        self.videos_captured
    }

    /// Start a session for motion confirmed at `now`.
    pub fn trigger(&mut self, now: DateTime<Local>) -> TriggerOutcome {
        if let Some(active) = &self.active {
            log::debug!(
                "motion confirmed while {} is still in progress; ignoring",
                active.artifact.display()
            );
            return TriggerOutcome::Busy;
        }

        // Triggered: name the artifact, then go straight to Recording.
        let artifact = self.namer.next(
            &self.config.videos_dir,
            &self.config.camera,
            &self.config.extension,
            &now,
        );
        let recording = match self.recorder.start(&artifact, self.config.duration) {
            Ok(recording) => recording,
            Err(err) => {
                log::error!(
                    "failed to start recording {}: {}",
                    artifact.display(),
                    err
                );
                return TriggerOutcome::Abandoned(err);
            }
        };
        log::info!(
            "motion confirmed; recording {} for {}s",
            artifact.display(),
            self.config.duration.as_secs_f64()
        );

        let (cancel_tx, cancel_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let job = SessionJob {
            artifact: artifact.clone(),
            started_at: now,
            duration: self.config.duration,
            uploader: if self.config.upload_enabled {
                self.uploader.clone()
            } else {
                None
            },
        };
        let spawned = std::thread::Builder::new()
            .name("capture-session".to_string())
            .spawn(move || supervise(job, recording, cancel_rx, event_tx));
        match spawned {
            Ok(join) => {
                self.active = Some(ActiveSession {
                    artifact: artifact.clone(),
                    started_at: now,
                    state: CaptureState::Recording,
                    cancel: cancel_tx,
                    events: event_rx,
                    join: Some(join),
                });
                TriggerOutcome::Started(artifact)
            }
            Err(err) => {
                // The unstarted closure owned the recording; dropping it stops the capture.
                log::error!("failed to start capture supervisor: {}", err);
                TriggerOutcome::Abandoned(CaptureError::Spawn(err))
            }
        }
    }

    /// Non-blocking: collect progress of the active session. Returns its
    /// report once it has settled.
    pub fn poll(&mut self) -> Option<SessionReport> {
        let report = {
            let active = self.active.as_mut()?;
            loop {
                match active.events.try_recv() {
                    Ok(SupervisorEvent::Uploading) => active.state = CaptureState::Uploading,
                    Ok(SupervisorEvent::Settled(report)) => break Some(report),
                    Err(TryRecvError::Empty) => break None,
                    Err(TryRecvError::Disconnected) => break Some(lost_report(active)),
                }
            }
        };
        report.map(|report| self.settle(report))
    }

    /// Block until the active session settles.
    pub fn wait_settled(&mut self) -> Option<SessionReport> {
        let report = {
            let active = self.active.as_mut()?;
            loop {
                match active.events.recv() {
                    Ok(SupervisorEvent::Uploading) => active.state = CaptureState::Uploading,
                    Ok(SupervisorEvent::Settled(report)) => break report,
                    Err(_) => break lost_report(active),
                }
            }
        };
        Some(self.settle(report))
    }

    /// Cancel the active session (stopping its recording) and wait for it.
    pub fn shutdown(&mut self) -> Option<SessionReport> {
        let active = self.active.as_ref()?;
        log::info!("cancelling capture session {}", active.artifact.display());
        let _ = active.cancel.send(());
        self.wait_settled()
    }

    fn settle(&mut self, report: SessionReport) -> SessionReport {
        if let Some(mut active) = self.active.take() {
            if let Some(join) = active.join.take() {
                if join.join().is_err() {
                    log::error!("capture session supervisor panicked");
                }
            }
        }
        self.sessions_total += 1;
        if report.succeeded() && report.ended_by != RecordingEnd::Cancelled {
            self.videos_captured += 1;
        }
        match (&report.recording, &report.upload) {
            (RecordingOutcome::Succeeded { bytes }, upload) => log::info!(
                "video captured: {} ({} bytes, {:?}, upload {:?}); videos {}",
                report.artifact.display(),
                bytes,
                report.ended_by,
                upload,
                self.videos_captured
            ),
            (RecordingOutcome::Failed(err), _) => log::warn!(
                "recording {} failed: {}; videos {}",
                report.artifact.display(),
                err,
                self.videos_captured
            ),
        }
        report
    }
}

impl Drop for CaptureOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct SessionJob {
    artifact: PathBuf,
    started_at: DateTime<Local>,
    duration: Duration,
    uploader: Option<Arc<dyn Uploader>>,
}

fn supervise(
    job: SessionJob,
    mut recording: Box<dyn Recording>,
    cancel: Receiver<()>,
    events: Sender<SupervisorEvent>,
) {
    let started = Instant::now();
    let ended_by = wait_for_recording(recording.as_mut(), started + job.duration, &cancel);
    let recording_outcome = match recording.stop() {
        Ok(summary) => RecordingOutcome::Succeeded {
            bytes: summary.bytes,
        },
        Err(err) => RecordingOutcome::Failed(err.to_string()),
    };
    let recording_elapsed = started.elapsed();

    let upload = match job.uploader {
        None => UploadOutcome::Disabled,
        Some(_) if ended_by == RecordingEnd::Cancelled => UploadOutcome::Skipped,
        Some(_) if !matches!(recording_outcome, RecordingOutcome::Succeeded { .. }) => {
            UploadOutcome::Skipped
        }
        Some(uploader) => {
            let _ = events.send(SupervisorEvent::Uploading);
            log::info!(
                "uploading {} to {}",
                job.artifact.display(),
                uploader.destination()
            );
            match uploader.upload(&job.artifact) {
                Ok(()) => UploadOutcome::Uploaded,
                Err(err) => {
                    log::error!(
                        "upload of {} failed: {}; local copy kept",
                        job.artifact.display(),
                        err
                    );
                    UploadOutcome::Failed(err.to_string())
                }
            }
        }
    };

    let _ = events.send(SupervisorEvent::Settled(SessionReport {
        artifact: job.artifact,
        started_at: job.started_at,
        recording: recording_outcome,
        upload,
        ended_by,
        recording_elapsed,
    }));
}

fn wait_for_recording(
    recording: &mut dyn Recording,
    deadline: Instant,
    cancel: &Receiver<()>,
) -> RecordingEnd {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return RecordingEnd::Deadline;
        }
        if recording.wait_timeout((deadline - now).min(SUPERVISOR_POLL)) {
            return RecordingEnd::Completed;
        }
        match cancel.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return RecordingEnd::Cancelled,
            Err(TryRecvError::Empty) => {}
        }
    }
}

fn lost_report(active: &ActiveSession) -> SessionReport {
    SessionReport {
        artifact: active.artifact.clone(),
        started_at: active.started_at,
        recording: RecordingOutcome::Failed("session supervisor exited without a report".into()),
        upload: UploadOutcome::Skipped,
        ended_by: RecordingEnd::Lost,
        recording_elapsed: Duration::ZERO,
    }
}
