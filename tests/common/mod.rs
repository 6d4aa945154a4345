#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use rand::Rng;

use motion_sentry::capture::{
    CaptureError, Recorder, Recording, RecordingSummary, UploadError, Uploader,
};
use motion_sentry::frame::ImageSample;
use motion_sentry::ingest::{FetchError, SampleSource};

pub const WIDTH: u32 = 32;
pub const HEIGHT: u32 = 24;

pub fn gray(level: u8) -> RgbImage {
    RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([level, level, level]))
}

pub fn noise() -> RgbImage {
    let mut rng = rand::thread_rng();
    RgbImage::from_fn(WIDTH, HEIGHT, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]))
}

/// One scripted fetch result.
pub enum Shot {
    Image(RgbImage),
    Noise,
    Fail,
}

/// Replays scripted shots, then keeps answering with `fallback`.
pub struct ScriptedSource {
    script: VecDeque<Shot>,
    fallback: Shot,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Shot>, fallback: Shot) -> Self {
        Self {
            script: script.into(),
            fallback,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Static scene: the same gray frame forever.
    pub fn still() -> Self {
        Self::new(Vec::new(), Shot::Image(gray(128)))
    }

    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }
}

impl SampleSource for ScriptedSource {
    fn fetch(&mut self) -> Result<ImageSample, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let shot = self.script.pop_front();
        let shot = shot.as_ref().unwrap_or(&self.fallback);
        match shot {
            Shot::Image(image) => Ok(ImageSample::now(image.clone())),
            Shot::Noise => Ok(ImageSample::now(noise())),
            Shot::Fail => Err(FetchError::Transport("camera unreachable".to_string())),
        }
    }
}

/// Recorder that writes a placeholder clip and finishes after `finish_after`
/// (or never, leaving the deadline to stop it).
#[derive(Clone, Default)]
pub struct FakeRecorder {
    pub finish_after: Option<Duration>,
    pub refuse: bool,
    pub fail_stop: bool,
    pub starts: Arc<Mutex<Vec<PathBuf>>>,
    pub stops: Arc<AtomicUsize>,
}

impl FakeRecorder {
    pub fn finishing_after(finish_after: Duration) -> Self {
        Self {
            finish_after: Some(finish_after),
            ..Self::default()
        }
    }

    pub fn stalling() -> Self {
        Self::default()
    }

    /// Starts, but the recording reports failure when stopped.
    pub fn failing_on_stop(finish_after: Duration) -> Self {
        Self {
            finish_after: Some(finish_after),
            fail_stop: true,
            ..Self::default()
        }
    }

    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn started(&self) -> Vec<PathBuf> {
        self.starts.lock().unwrap().clone()
    }
}

impl Recorder for FakeRecorder {
    fn start(
        &self,
        destination: &Path,
        _duration: Duration,
    ) -> Result<Box<dyn Recording>, CaptureError> {
        if self.refuse {
            return Err(CaptureError::Refused("camera busy".to_string()));
        }
        std::fs::write(destination, b"fake clip")?;
        self.starts.lock().unwrap().push(destination.to_path_buf());
        Ok(Box::new(FakeRecording {
            started: Instant::now(),
            finish_after: self.finish_after,
            fail_stop: self.fail_stop,
            stops: self.stops.clone(),
        }))
    }
}

struct FakeRecording {
    started: Instant,
    finish_after: Option<Duration>,
    fail_stop: bool,
    stops: Arc<AtomicUsize>,
}

impl Recording for FakeRecording {
    fn wait_timeout(&mut self, timeout: Duration) -> bool {
        match self.finish_after {
            Some(finish_after) => {
                let remaining = finish_after.saturating_sub(self.started.elapsed());
                if remaining <= timeout {
                    std::thread::sleep(remaining);
                    true
                } else {
                    std::thread::sleep(timeout);
                    false
                }
            }
            None => {
                std::thread::sleep(timeout);
                false
            }
        }
    }

    fn stop(self: Box<Self>) -> Result<RecordingSummary, CaptureError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(CaptureError::Transport("stream dropped".to_string()));
        }
        Ok(RecordingSummary {
            bytes: 9,
            elapsed: self.started.elapsed(),
        })
    }
}

/// Uploader that remembers what it was given and can be told to fail.
#[derive(Clone, Default)]
pub struct FakeUploader {
    pub fail: bool,
    pub uploaded: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeUploader {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn uploaded(&self) -> Vec<PathBuf> {
        self.uploaded.lock().unwrap().clone()
    }
}

impl Uploader for FakeUploader {
    fn upload(&self, artifact: &Path) -> Result<(), UploadError> {
        if self.fail {
            return Err(UploadError::Status(503));
        }
        self.uploaded.lock().unwrap().push(artifact.to_path_buf());
        Ok(())
    }

    fn destination(&self) -> String {
        "fake://uploads".to_string()
    }
}
