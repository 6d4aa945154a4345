//! motion_sentry - watch one camera and record clips on motion
//!
//! Usage: `motion_sentry <camera> [--config motion_config.toml]`
//!
//! The camera name selects a `[cameras.<camera>]` section of the config file.
//! Runs until Ctrl-C; an active recording is stopped before exit.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use motion_sentry::capture::{build_uploader, CaptureOrchestrator, HttpStreamRecorder};
use motion_sentry::config::{MotionConfig, DEFAULT_CONFIG_PATH};
use motion_sentry::detect::MotionEngine;
use motion_sentry::ingest::{HttpSnapshotSource, SnapshotConfig};
use motion_sentry::watch::Watcher;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Record camera clips when snapshot differences show motion"
)]
struct Args {
    /// Camera name (a `[cameras.<name>]` section of the config file).
    camera: String,

    /// Path to the TOML configuration file.
    #[arg(long, env = "MOTION_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = MotionConfig::load(&args.config, &args.camera)?;
    std::fs::create_dir_all(&cfg.videos_dir).with_context(|| {
        format!(
            "failed to create videos directory {}",
            cfg.videos_dir.display()
        )
    })?;

    let source = HttpSnapshotSource::new(
        &cfg.endpoint,
        SnapshotConfig {
            path: cfg.snapshot_path.clone(),
            ..SnapshotConfig::default()
        },
    )?;
    let recorder = HttpStreamRecorder::new(&cfg.endpoint, &cfg.stream_path)?;
    let uploader = match (&cfg.upload.target, cfg.upload.enabled) {
        (Some(target), true) => Some(build_uploader(target)?),
        _ => None,
    };
    let orchestrator = CaptureOrchestrator::new(cfg.capture_config(), Arc::new(recorder), uploader);
    let engine = MotionEngine::new(&cfg.detect);
    let mut watcher = Watcher::new(cfg.watch_config(), source, engine, orchestrator);

    log::info!(
        "motion_sentry watching {} at {} (sensitivity {}, interval {:?}, {} consecutive changes)",
        cfg.camera,
        cfg.endpoint.host(),
        cfg.detect.sensitivity,
        cfg.capture_interval,
        cfg.detect.consecutive_changes
    );
    if let Some(region) = &cfg.region {
        log::info!("cropping samples to {:?}", region);
    }
    log::info!("recordings go to {}", cfg.videos_dir.display());
    if let Some(target) = cfg.upload.target.as_ref().filter(|_| cfg.upload.enabled) {
        log::info!("uploading recordings to {:?}", target);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    watcher.run(&shutdown);

    let status = watcher.status().snapshot();
    let stats = watcher.source().stats();
    log::info!(
        "motion_sentry stopped: {} cycles, {} scored, {} fetch failures, {} sessions, {} videos, {} snapshots from {}",
        status.cycles,
        status.scored,
        status.fetch_failures,
        status.sessions_total,
        status.videos_captured,
        stats.samples_fetched,
        stats.host
    );
    Ok(())
}
