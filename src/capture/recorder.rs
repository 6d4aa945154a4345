//! Recording collaborator.
//!
//! `Recorder::start` begins a bounded capture to a local file and returns a
//! `Recording` handle. The capture runs on its own thread; the handle lets the
//! session supervisor wait for it with a timeout and stop it unconditionally.

use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use url::Url;

use crate::camera::{describe_transport, CameraEndpoint};

pub const DEFAULT_STREAM_PATH: &str = "/videostream.asf";
/// Longest a blocked stream read can delay a stop request.
const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(1);
const STREAM_CHUNK_BYTES: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to prepare recording file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to start recording task: {0}")]
    Spawn(std::io::Error),
    #[error("camera stream request failed: {0}")]
    Transport(String),
    #[error("camera answered stream request with HTTP {0}")]
    Status(u16),
    #[error("recording refused: {0}")]
    Refused(String),
    #[error("recording task ended without reporting a result")]
    Aborted,
}

impl From<ureq::Error> for CaptureError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => CaptureError::Status(code),
            ureq::Error::Transport(transport) => {
                CaptureError::Transport(describe_transport(&transport))
            }
        }
    }
}

/// Final accounting of a stopped recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordingSummary {
    pub bytes: u64,
    pub elapsed: Duration,
}

pub trait Recorder: Send + Sync {
    /// Begin capturing to `destination` for at most `duration`. An error means
    /// the capture never started and no artifact was left behind.
    fn start(
        &self,
        destination: &Path,
        duration: Duration,
    ) -> Result<Box<dyn Recording>, CaptureError>;
}

pub trait Recording: Send {
    /// Block up to `timeout` for the capture to end by itself. Returns true
    /// once it has ended.
    fn wait_timeout(&mut self, timeout: Duration) -> bool;

    /// Stop the capture (if still running) and collect its result. Always
    /// called by the supervisor, whether or not the capture ended by itself.
    fn stop(self: Box<Self>) -> Result<RecordingSummary, CaptureError>;
}

/// Records the camera's HTTP video stream straight into the artifact file.
pub struct HttpStreamRecorder {
    agent: ureq::Agent,
    url: Url,
}

impl HttpStreamRecorder {
    pub fn new(endpoint: &CameraEndpoint, stream_path: &str) -> Result<Self> {
        let url = endpoint.resource_url(stream_path)?;
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(STREAM_READ_TIMEOUT)
            .build();
        Ok(Self { agent, url })
    }
}

impl Recorder for HttpStreamRecorder {
    /// Returns once the camera has answered the stream request. A refused or
    /// failed request is reported here and leaves no file behind.
    fn start(
        &self,
        destination: &Path,
        duration: Duration,
    ) -> Result<Box<dyn Recording>, CaptureError> {
        let file = File::create(destination)?;
        let reader = match self.agent.request_url("GET", &self.url).call() {
            Ok(response) => response.into_reader(),
            Err(err) => {
                drop(file);
                if let Err(remove_err) = std::fs::remove_file(destination) {
                    log::warn!(
                        "failed to remove unused recording file {}: {}",
                        destination.display(),
                        remove_err
                    );
                }
                return Err(err.into());
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();
        let stop_flag = stop.clone();
        let join = std::thread::Builder::new()
            .name("recording".to_string())
            .spawn(move || {
                let result = stream_to_file(reader, file, duration, &stop_flag);
                let _ = done_tx.send(result);
            })
            .map_err(CaptureError::Spawn)?;

        Ok(Box::new(HttpRecording {
            stop,
            done: done_rx,
            join: Some(join),
            result: None,
            started: Instant::now(),
        }))
    }
}

struct HttpRecording {
    stop: Arc<AtomicBool>,
    done: Receiver<Result<u64, CaptureError>>,
    join: Option<JoinHandle<()>>,
    result: Option<Result<u64, CaptureError>>,
    started: Instant,
}

impl Recording for HttpRecording {
    fn wait_timeout(&mut self, timeout: Duration) -> bool {
        if self.result.is_some() {
            return true;
        }
        match self.done.recv_timeout(timeout) {
            Ok(result) => {
                self.result = Some(result);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                self.result = Some(Err(CaptureError::Aborted));
                true
            }
        }
    }

    fn stop(mut self: Box<Self>) -> Result<RecordingSummary, CaptureError> {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("recording thread panicked");
            }
        }
        let result = match self.result.take() {
            Some(result) => result,
            None => self.done.try_recv().unwrap_or(Err(CaptureError::Aborted)),
        };
        let elapsed = self.started.elapsed();
        result.map(|bytes| RecordingSummary { bytes, elapsed })
    }
}

impl Drop for HttpRecording {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn stream_to_file(
    mut reader: impl Read,
    file: File,
    duration: Duration,
    stop: &AtomicBool,
) -> Result<u64, CaptureError> {
    let deadline = Instant::now() + duration;
    let mut writer = BufWriter::new(file);
    let mut chunk = vec![0u8; STREAM_CHUNK_BYTES];
    let mut written = 0u64;

    while !stop.load(Ordering::SeqCst) && Instant::now() < deadline {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                continue
            }
            Err(err) => return Err(err.into()),
        };
        writer.write_all(&chunk[..read])?;
        written += read as u64;
    }
    writer.flush()?;
    Ok(written)
}
