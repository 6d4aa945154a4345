//! Off-device archival of finished recordings.
//!
//! An `Uploader` is handed the path of a completed artifact at most once per
//! session. The local file is never removed, whatever the outcome.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::camera::describe_transport;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("artifact i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("upload request failed: {0}")]
    Transport(String),
    #[error("upload destination answered HTTP {0}")]
    Status(u16),
    #[error("artifact path {0} has no file name")]
    InvalidArtifact(PathBuf),
}

impl From<ureq::Error> for UploadError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => UploadError::Status(code),
            ureq::Error::Transport(transport) => {
                UploadError::Transport(describe_transport(&transport))
            }
        }
    }
}

pub trait Uploader: Send + Sync {
    fn upload(&self, artifact: &Path) -> Result<(), UploadError>;

    /// Destination for log lines. Must not include credentials.
    fn destination(&self) -> String;
}

/// Where finished recordings are archived.
#[derive(Clone, PartialEq, Eq)]
pub enum UploadTarget {
    /// A mounted directory (synced folder, network share).
    Directory(PathBuf),
    /// An HTTP endpoint accepting `PUT <url>/<file name>`.
    Http { url: Url, token: Option<String> },
}

impl std::fmt::Debug for UploadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadTarget::Directory(path) => f.debug_tuple("Directory").field(path).finish(),
            UploadTarget::Http { url, token } => f
                .debug_struct("Http")
                .field("url", &url.as_str())
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Build the uploader for `target`, checking that it is usable.
pub fn build_uploader(target: &UploadTarget) -> Result<Arc<dyn Uploader>> {
    match target {
        UploadTarget::Directory(path) => Ok(Arc::new(DirectoryUploader::new(path)?)),
        UploadTarget::Http { url, token } => {
            Ok(Arc::new(HttpUploader::new(url.clone(), token.clone())?))
        }
    }
}

/// Copies artifacts into a directory. The copy lands under a temporary name
/// and is renamed into place, so a partial file never carries the final name.
pub struct DirectoryUploader {
    target: PathBuf,
}

impl DirectoryUploader {
    pub fn new(target: &Path) -> Result<Self> {
        if !target.is_dir() {
            return Err(anyhow!(
                "upload directory {} does not exist",
                target.display()
            ));
        }
        Ok(Self {
            target: target.to_path_buf(),
        })
    }
}

impl Uploader for DirectoryUploader {
    fn upload(&self, artifact: &Path) -> Result<(), UploadError> {
        let name = artifact
            .file_name()
            .ok_or_else(|| UploadError::InvalidArtifact(artifact.to_path_buf()))?;
        let final_path = self.target.join(name);
        let mut tmp_name = name.to_os_string();
        tmp_name.push(".partial");
        let tmp_path = self.target.join(tmp_name);
        fs::copy(artifact, &tmp_path)?;
        File::open(&tmp_path)?.sync_all()?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    fn destination(&self) -> String {
        self.target.display().to_string()
    }
}

/// Streams artifacts to an HTTP endpoint with `PUT`.
pub struct HttpUploader {
    agent: ureq::Agent,
    base: Url,
    token: Option<String>,
}

impl HttpUploader {
    pub fn new(mut base: Url, token: Option<String>) -> Result<Self> {
        match base.scheme() {
            "http" | "https" => {}
            other => return Err(anyhow!("unsupported upload scheme '{}'", other)),
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(60))
            .timeout_write(Duration::from_secs(60))
            .build();
        Ok(Self { agent, base, token })
    }

    fn artifact_url(&self, artifact: &Path) -> Result<Url, UploadError> {
        let name = artifact
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| UploadError::InvalidArtifact(artifact.to_path_buf()))?;
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| UploadError::InvalidArtifact(artifact.to_path_buf()))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }
}

impl Uploader for HttpUploader {
    fn upload(&self, artifact: &Path) -> Result<(), UploadError> {
        let url = self.artifact_url(artifact)?;
        let file = File::open(artifact)?;
        let len = file.metadata()?.len();
        let mut request = self
            .agent
            .request_url("PUT", &url)
            .set("Content-Type", "application/octet-stream")
            .set("Content-Length", &len.to_string());
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }
        request.send(file)?;
        Ok(())
    }

    fn destination(&self) -> String {
        self.base.to_string()
    }
}

/// Parse the operator's `kind` / `target` pair.
pub fn parse_upload_target(
    kind: &str,
    target: &str,
    token: Option<String>,
) -> Result<UploadTarget> {
    match kind.trim().to_lowercase().as_str() {
        "directory" | "dir" => Ok(UploadTarget::Directory(PathBuf::from(target))),
        "http" => {
            let url =
                Url::parse(target).with_context(|| format!("invalid upload url {}", target))?;
            Ok(UploadTarget::Http { url, token })
        }
        other => Err(anyhow!(
            "unknown upload kind '{}'; expected directory or http",
            other
        )),
    }
}
