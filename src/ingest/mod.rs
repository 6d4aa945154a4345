//! Sample acquisition.
//!
//! A `SampleSource` hands the detection loop one decoded still image per call.
//! Sources never cache: every call reaches the camera, and every failure is
//! reported as a `FetchError` the loop can recover from.
//!
//! Sources:
//! - `HttpSnapshotSource`: JPEG snapshots over HTTP (e.g. `/snapshot.cgi`)

pub mod http;

pub use http::{HttpSnapshotSource, SnapshotConfig, SnapshotStats};

use thiserror::Error;

use crate::camera::describe_transport;
use crate::frame::ImageSample;

/// Why a single sample could not be produced.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("snapshot request failed: {0}")]
    Transport(String),
    #[error("camera answered snapshot request with HTTP {0}")]
    Status(u16),
    #[error("camera returned an empty snapshot")]
    Empty,
    #[error("snapshot exceeds {0} bytes")]
    TooLarge(usize),
    #[error("failed to read snapshot body: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] image::ImageError),
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => FetchError::Status(code),
            ureq::Error::Transport(transport) => {
                FetchError::Transport(describe_transport(&transport))
            }
        }
    }
}

/// Fetch collaborator: one still image per call.
pub trait SampleSource {
    fn fetch(&mut self) -> Result<ImageSample, FetchError>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn fetch(&mut self) -> Result<ImageSample, FetchError> {
        (**self).fetch()
    }
}
