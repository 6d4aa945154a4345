//! HTTP snapshot source.
//!
//! Fetches a single JPEG per call from the camera's snapshot resource and
//! decodes it in memory. The decoded sample is handed straight to the
//! detection loop; nothing is written to disk.

use anyhow::Result;
use std::io::Read;
use std::time::{Duration, Instant};

use url::Url;

use super::{FetchError, SampleSource};
use crate::camera::CameraEndpoint;
use crate::frame::ImageSample;

pub const DEFAULT_SNAPSHOT_PATH: &str = "/snapshot.cgi";
const MAX_SNAPSHOT_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for an HTTP snapshot source.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Snapshot resource path on the camera.
    pub path: String,
    /// Upper bound for one complete request.
    pub timeout: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_SNAPSHOT_PATH.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Statistics for a snapshot source.
#[derive(Clone, Debug)]
pub struct SnapshotStats {
    pub samples_fetched: u64,
    pub failures: u64,
    pub host: String,
}

pub struct HttpSnapshotSource {
    agent: ureq::Agent,
    url: Url,
    host: String,
    samples_fetched: u64,
    failures: u64,
    last_sample_at: Option<Instant>,
}

impl HttpSnapshotSource {
    pub fn new(endpoint: &CameraEndpoint, config: SnapshotConfig) -> Result<Self> {
        let url = endpoint.resource_url(&config.path)?;
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self {
            agent,
            url,
            host: endpoint.host(),
            samples_fetched: 0,
            failures: 0,
            last_sample_at: None,
        })
    }

    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            samples_fetched: self.samples_fetched,
            failures: self.failures,
            host: self.host.clone(),
        }
    }

    /// Time since the last successful fetch.
    pub fn since_last_sample(&self) -> Option<Duration> {
        self.last_sample_at.map(|at| at.elapsed())
    }

    fn fetch_inner(&mut self) -> Result<ImageSample, FetchError> {
        let bytes = fetch_snapshot(&self.agent, &self.url)?;
        let image = image::load_from_memory(&bytes)?.into_rgb8();
        Ok(ImageSample::now(image))
    }
}

impl SampleSource for HttpSnapshotSource {
    fn fetch(&mut self) -> Result<ImageSample, FetchError> {
        match self.fetch_inner() {
            Ok(sample) => {
                self.samples_fetched += 1;
                self.last_sample_at = Some(Instant::now());
                Ok(sample)
            }
            Err(err) => {
                self.failures += 1;
                Err(err)
            }
        }
    }
}

fn fetch_snapshot(agent: &ureq::Agent, url: &Url) -> Result<Vec<u8>, FetchError> {
    let response = agent.request_url("GET", url).call()?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_SNAPSHOT_BYTES as u64 + 1)
        .read_to_end(&mut bytes)?;
    check_snapshot_len(bytes.len())?;
    Ok(bytes)
}

fn check_snapshot_len(len: usize) -> Result<(), FetchError> {
    if len == 0 {
        return Err(FetchError::Empty);
    }
    if len > MAX_SNAPSHOT_BYTES {
        return Err(FetchError::TooLarge(MAX_SNAPSHOT_BYTES));
    }
    Ok(())
}
