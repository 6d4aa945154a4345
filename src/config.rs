use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::{CameraEndpoint, DEFAULT_USER};
use crate::capture::{
    parse_upload_target, CaptureConfig, UploadTarget, DEFAULT_RECORD_SECS, DEFAULT_STREAM_PATH,
    DEFAULT_VIDEO_EXTENSION,
};
use crate::detect::{DetectConfig, DEFAULT_CONSECUTIVE_CHANGES, DEFAULT_INTERVAL, DEFAULT_WINDOW};
use crate::frame::Region;
use crate::ingest::http::DEFAULT_SNAPSHOT_PATH;
use crate::watch::WatchConfig;

pub const DEFAULT_CONFIG_PATH: &str = "motion_config.toml";
const DEFAULT_CAPTURE_INTERVAL_SECS: f64 = 1.0;
const DEFAULT_SETTLE_DELAY_MS: u64 = 100;
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    cameras: Option<BTreeMap<String, CameraConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    address: Option<String>,
    user: Option<String>,
    password: Option<String>,
    snapshot_path: Option<String>,
    stream_path: Option<String>,
    sensitivity: Option<f64>,
    capture_interval_secs: Option<f64>,
    consecutive_changes: Option<u32>,
    start_x: Option<u32>,
    start_y: Option<u32>,
    end_x: Option<u32>,
    end_y: Option<u32>,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
    video_record_secs: Option<u64>,
    videos_dir: Option<PathBuf>,
    video_extension: Option<String>,
    baseline_window: Option<usize>,
    baseline_interval: Option<u32>,
    settle_delay_ms: Option<u64>,
    debug_snapshots: Option<bool>,
    upload: Option<UploadConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct UploadConfigFile {
    enabled: Option<bool>,
    kind: Option<String>,
    target: Option<String>,
    token: Option<String>,
}

/// Resolved settings for one camera.
#[derive(Debug, Clone)]
pub struct MotionConfig {
    pub camera: String,
    pub endpoint: CameraEndpoint,
    pub snapshot_path: String,
    pub stream_path: String,
    pub detect: DetectConfig,
    pub capture_interval: Duration,
    pub settle_delay: Duration,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Region of interest. `None` when no corners are configured or they
    /// span the whole frame; samples are then used uncropped at whatever size
    /// the camera delivers.
    pub region: Option<Region>,
    pub record_duration: Duration,
    pub videos_dir: PathBuf,
    pub video_extension: String,
    pub debug_snapshots: bool,
    pub upload: UploadSettings,
}

#[derive(Debug, Clone, Default)]
pub struct UploadSettings {
    pub enabled: bool,
    pub target: Option<UploadTarget>,
}

impl MotionConfig {
    /// Read `path`, select the `[cameras.<camera>]` section, then apply
    /// environment overrides and validate.
    pub fn load(path: &Path, camera: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw, camera)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml_str(raw: &str, camera: &str) -> Result<Self> {
        let file: MotionConfigFile = toml::from_str(raw)?;
        let section = file
            .cameras
            .and_then(|mut cameras| cameras.remove(camera))
            .ok_or_else(|| anyhow!("no [cameras.{}] section configured", camera))?;
        let mut cfg = Self::from_file(camera, section)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(camera: &str, file: CameraConfigFile) -> Result<Self> {
        validate_camera_name(camera)?;
        let address = file
            .address
            .ok_or_else(|| anyhow!("camera {}: address is required", camera))?;
        let password = file
            .password
            .ok_or_else(|| anyhow!("camera {}: password is required", camera))?;
        let sensitivity = file
            .sensitivity
            .ok_or_else(|| anyhow!("camera {}: sensitivity is required", camera))?;

        let frame_width = file.frame_width.unwrap_or(DEFAULT_FRAME_WIDTH);
        let frame_height = file.frame_height.unwrap_or(DEFAULT_FRAME_HEIGHT);
        if frame_width == 0 || frame_height == 0 {
            return Err(anyhow!("frame_width and frame_height must be greater than zero"));
        }
        let corners = [file.start_x, file.start_y, file.end_x, file.end_y];
        let region = if corners.iter().all(Option::is_none) {
            None
        } else {
            // End coordinates past the frame are clamped to its edge.
            let region = Region::from_corners(
                file.start_x.unwrap_or(0),
                file.start_y.unwrap_or(0),
                file.end_x.unwrap_or(frame_width).min(frame_width),
                file.end_y.unwrap_or(frame_height).min(frame_height),
            )
            .with_context(|| format!("camera {}: invalid region of interest", camera))?;
            Some(region).filter(|region| !region.is_full_frame(frame_width, frame_height))
        };

        let capture_interval_secs = file
            .capture_interval_secs
            .unwrap_or(DEFAULT_CAPTURE_INTERVAL_SECS);
        let upload = match file.upload {
            Some(upload) => resolve_upload(upload)?,
            None => UploadSettings::default(),
        };

        let user = file.user.unwrap_or_else(|| DEFAULT_USER.to_string());
        let endpoint = CameraEndpoint::new(&address, &user, &password)
            .with_context(|| format!("camera {}: invalid endpoint", camera))?;

        Ok(Self {
            camera: camera.to_string(),
            endpoint,
            snapshot_path: file
                .snapshot_path
                .unwrap_or_else(|| DEFAULT_SNAPSHOT_PATH.to_string()),
            stream_path: file
                .stream_path
                .unwrap_or_else(|| DEFAULT_STREAM_PATH.to_string()),
            detect: DetectConfig {
                sensitivity,
                consecutive_changes: file
                    .consecutive_changes
                    .unwrap_or(DEFAULT_CONSECUTIVE_CHANGES),
                baseline_window: file.baseline_window.unwrap_or(DEFAULT_WINDOW),
                baseline_interval: file.baseline_interval.unwrap_or(DEFAULT_INTERVAL),
            },
            capture_interval: secs_f64(capture_interval_secs, "capture_interval_secs")?,
            settle_delay: Duration::from_millis(
                file.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS),
            ),
            frame_width,
            frame_height,
            region,
            record_duration: Duration::from_secs(
                file.video_record_secs.unwrap_or(DEFAULT_RECORD_SECS),
            ),
            videos_dir: file
                .videos_dir
                .unwrap_or_else(|| PathBuf::from(format!("./{}_videos", camera))),
            video_extension: file
                .video_extension
                .unwrap_or_else(|| DEFAULT_VIDEO_EXTENSION.to_string()),
            debug_snapshots: file.debug_snapshots.unwrap_or(false),
            upload,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("MOTION_SENSITIVITY") {
            self.detect.sensitivity = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("MOTION_SENSITIVITY must be a number"))?;
        }
        if let Ok(value) = std::env::var("MOTION_CAPTURE_INTERVAL_SECS") {
            let secs: f64 = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("MOTION_CAPTURE_INTERVAL_SECS must be a number of seconds"))?;
            self.capture_interval = secs_f64(secs, "MOTION_CAPTURE_INTERVAL_SECS")?;
        }
        if let Ok(value) = std::env::var("MOTION_UPLOAD") {
            self.upload.enabled = parse_flag(&value)
                .ok_or_else(|| anyhow!("MOTION_UPLOAD must be one of yes, no, true, false"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !self.detect.sensitivity.is_finite() || self.detect.sensitivity <= 0.0 {
            return Err(anyhow!("sensitivity must be a positive number"));
        }
        if self.capture_interval.is_zero() {
            return Err(anyhow!("capture_interval_secs must be greater than zero"));
        }
        if self.detect.consecutive_changes == 0 {
            return Err(anyhow!("consecutive_changes must be greater than zero"));
        }
        if self.detect.baseline_window == 0 {
            return Err(anyhow!("baseline_window must be greater than zero"));
        }
        if self.detect.baseline_interval == 0 {
            return Err(anyhow!("baseline_interval must be greater than zero"));
        }
        if self.record_duration.is_zero() {
            return Err(anyhow!("video_record_secs must be greater than zero"));
        }
        let extension = self.video_extension.trim_start_matches('.');
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(anyhow!(
                "video_extension '{}' must be alphanumeric",
                self.video_extension
            ));
        }
        self.video_extension = extension.to_lowercase();

        if self.upload.enabled {
            match &self.upload.target {
                None => return Err(anyhow!("upload is enabled but no upload target is set")),
                Some(UploadTarget::Directory(path)) if !path.is_dir() => {
                    return Err(anyhow!(
                        "upload directory {} does not exist",
                        path.display()
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            camera: self.camera.clone(),
            region: self.region,
            interval: self.capture_interval,
            settle_delay: self.settle_delay,
            debug_snapshots: self.debug_snapshots,
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            camera: self.camera.clone(),
            videos_dir: self.videos_dir.clone(),
            extension: self.video_extension.clone(),
            duration: self.record_duration,
            upload_enabled: self.upload.enabled,
        }
    }

    /// True when samples are cropped before scoring.
    pub fn crops_frame(&self) -> bool {
        self.region.is_some()
    }
}

fn resolve_upload(file: UploadConfigFile) -> Result<UploadSettings> {
    let enabled = file.enabled.unwrap_or(false);
    let target = match file.target {
        Some(target) if !target.trim().is_empty() => {
            let kind = file.kind.as_deref().unwrap_or("directory");
            Some(parse_upload_target(kind, target.trim(), file.token)?)
        }
        _ => None,
    };
    Ok(UploadSettings { enabled, target })
}

fn validate_camera_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 {
        return Err(anyhow!("camera name must be 1..=64 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(anyhow!(
            "camera name '{}' may only contain letters, digits, '_' and '-'",
            name
        ));
    }
    Ok(())
}

fn secs_f64(secs: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("{} must be a non-negative number of seconds", field))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}
