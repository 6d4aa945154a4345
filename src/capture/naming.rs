//! Recording artifact names.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Millisecond resolution keeps names distinct even for back-to-back sessions.
const TIMESTAMP_FORMAT: &str = "%y.%m.%d_%H.%M.%S%.3f";

/// `<camera>_cam_<yy.mm.dd_HH.MM.SS.mmm>.<extension>`
pub fn artifact_file_name(camera: &str, at: &DateTime<Local>, extension: &str) -> String {
    format!("{}.{}", artifact_stem(camera, at), extension)
}

fn artifact_stem(camera: &str, at: &DateTime<Local>) -> String {
    format!("{}_cam_{}", camera, at.format(TIMESTAMP_FORMAT))
}

/// Issues artifact paths that are unique on disk and never repeat the
/// previously issued one.
#[derive(Debug, Default)]
pub struct ArtifactNamer {
    last: Option<PathBuf>,
}

impl ArtifactNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(
        &mut self,
        dir: &Path,
        camera: &str,
        extension: &str,
        at: &DateTime<Local>,
    ) -> PathBuf {
        let stem = artifact_stem(camera, at);
        let mut candidate = dir.join(format!("{}.{}", stem, extension));
        let mut suffix = 1u32;
        while candidate.exists() || self.last.as_ref() == Some(&candidate) {
            candidate = dir.join(format!("{}-{}.{}", stem, suffix, extension));
            suffix += 1;
        }
        self.last = Some(candidate.clone());
        candidate
    }
}
