mod common;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use rand::Rng;

use motion_sentry::capture::{CaptureConfig, CaptureOrchestrator, CaptureState};
use motion_sentry::detect::{DetectConfig, MotionEngine};
use motion_sentry::frame::Region;
use motion_sentry::watch::{CycleOutcome, WatchConfig, Watcher};

use common::{gray, FakeRecorder, ScriptedSource, Shot, HEIGHT, WIDTH};

fn detect_config() -> DetectConfig {
    DetectConfig {
        sensitivity: 1.0,
        consecutive_changes: 2,
        baseline_window: 10,
        baseline_interval: 10,
    }
}

fn watch_config(
    region: Option<Region>,
    interval: Duration,
    debug_snapshots: bool,
) -> WatchConfig {
    WatchConfig {
        camera: "yard".to_string(),
        region,
        interval,
        settle_delay: Duration::ZERO,
        debug_snapshots,
    }
}

fn watcher(
    source: ScriptedSource,
    recorder: &FakeRecorder,
    videos: &Path,
    config: WatchConfig,
) -> Watcher<ScriptedSource> {
    let orchestrator = CaptureOrchestrator::new(
        CaptureConfig {
            camera: "yard".to_string(),
            videos_dir: videos.to_path_buf(),
            extension: "asf".to_string(),
            duration: Duration::from_secs(30),
            upload_enabled: false,
        },
        Arc::new(recorder.clone()),
        None,
    );
    Watcher::new(
        config,
        source,
        MotionEngine::new(&detect_config()),
        orchestrator,
    )
}

fn full_frame() -> WatchConfig {
    watch_config(None, Duration::ZERO, false)
}

/// Eleven still frames fill the baseline with zeros, then the scene turns to
/// noise for good.
fn still_then_motion() -> ScriptedSource {
    let script = (0..11).map(|_| Shot::Image(gray(128))).collect();
    ScriptedSource::new(script, Shot::Noise)
}

fn scored(outcome: CycleOutcome) -> motion_sentry::detect::Observation {
    match outcome {
        CycleOutcome::Scored(observation) => observation,
        other => panic!("expected a scored cycle, got {:?}", other),
    }
}

/// Drive the ten baseline cycles of `still_then_motion`.
fn settle_baseline(watcher: &mut Watcher<ScriptedSource>) {
    for _ in 0..10 {
        let observation = scored(watcher.step());
        assert_eq!(observation.score, 0.0);
        assert!(!observation.confirmed);
    }
}

#[test]
fn static_scene_never_triggers() {
    let videos = tempfile::tempdir().expect("videos dir");
    let recorder = FakeRecorder::finishing_after(Duration::from_millis(10));
    let mut watcher = watcher(ScriptedSource::still(), &recorder, videos.path(), full_frame());

    for _ in 0..15 {
        let observation = scored(watcher.step());
        assert_eq!(observation.score, 0.0);
        assert!(!observation.confirmed);
    }

    assert!(recorder.started().is_empty());
    let status = watcher.status().snapshot();
    assert_eq!(status.cycles, 15);
    assert_eq!(status.scored, 15);
    assert_eq!(status.last_score, Some(0.0));
    assert_eq!(status.sessions_total, 0);
    assert_eq!(status.capture_state, CaptureState::Watching);
}

#[test]
fn sustained_motion_starts_one_session_per_debounce_run() {
    let videos = tempfile::tempdir().expect("videos dir");
    let recorder = FakeRecorder::finishing_after(Duration::from_millis(50));
    let mut watcher = watcher(still_then_motion(), &recorder, videos.path(), full_frame());
    settle_baseline(&mut watcher);

    let first_change = scored(watcher.step());
    assert!(first_change.score > 1.0);
    assert_eq!(first_change.run_length, 1);
    assert!(!first_change.confirmed);

    let confirmed = scored(watcher.step());
    assert!(confirmed.confirmed);
    assert!(watcher.orchestrator().is_active());
    assert_eq!(recorder.started().len(), 1);
    assert!(recorder.started()[0].exists());
    assert_eq!(
        watcher.status().snapshot().last_artifact,
        Some(recorder.started()[0].clone())
    );

    // Let the session settle; the next cycle picks up its report and starts
    // a fresh debounce run from a fresh pair.
    std::thread::sleep(Duration::from_millis(200));
    let after_session = scored(watcher.step());
    assert!(!watcher.orchestrator().is_active());
    assert_eq!(after_session.run_length, 1);
    assert!(!after_session.confirmed);
    assert_eq!(watcher.status().snapshot().sessions_total, 1);
    assert_eq!(watcher.status().snapshot().videos_captured, 1);

    let second = scored(watcher.step());
    assert!(second.confirmed);
    assert_eq!(recorder.started().len(), 2);
    assert_ne!(recorder.started()[0], recorder.started()[1]);
}

#[test]
fn fetch_failure_discards_the_pair_and_loop_continues() {
    let videos = tempfile::tempdir().expect("videos dir");
    let recorder = FakeRecorder::stalling();
    let source = ScriptedSource::new(
        vec![Shot::Image(gray(128)), Shot::Fail],
        Shot::Image(gray(128)),
    );
    let fetches = source.fetch_counter();
    let mut watcher = watcher(source, &recorder, videos.path(), full_frame());

    assert_eq!(watcher.step(), CycleOutcome::FetchFailed);
    assert!(!watcher.has_retained_sample());
    assert_eq!(fetches.load(Ordering::SeqCst), 2);

    scored(watcher.step());
    assert_eq!(fetches.load(Ordering::SeqCst), 4);
    assert!(watcher.has_retained_sample());

    let status = watcher.status().snapshot();
    assert_eq!(status.cycles, 2);
    assert_eq!(status.fetch_failures, 1);
    assert_eq!(status.scored, 1);
}

#[test]
fn failed_first_fetch_skips_the_cycle() {
    let videos = tempfile::tempdir().expect("videos dir");
    let source = ScriptedSource::new(vec![Shot::Fail], Shot::Image(gray(90)));
    let fetches = source.fetch_counter();
    let mut watcher = watcher(source, &FakeRecorder::stalling(), videos.path(), full_frame());

    assert_eq!(watcher.step(), CycleOutcome::FetchFailed);
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    scored(watcher.step());
}

#[test]
fn mismatched_samples_are_reported_and_dropped() {
    let videos = tempfile::tempdir().expect("videos dir");
    let source = ScriptedSource::new(
        vec![
            Shot::Image(gray(128)),
            Shot::Image(RgbImage::from_pixel(16, 16, Rgb([128, 128, 128]))),
        ],
        Shot::Image(gray(128)),
    );
    let mut watcher = watcher(source, &FakeRecorder::stalling(), videos.path(), full_frame());

    assert_eq!(watcher.step(), CycleOutcome::DimensionMismatch);
    assert!(!watcher.has_retained_sample());
    scored(watcher.step());

    let status = watcher.status().snapshot();
    assert_eq!(status.mismatches, 1);
    assert_eq!(status.scored, 1);
}

#[test]
fn changes_outside_the_region_are_ignored() {
    let videos = tempfile::tempdir().expect("videos dir");
    let mut rng = rand::thread_rng();
    // Noise only in the lower-right quadrant; the region watches the upper-left.
    let busy_corner: Vec<Shot> = (0..12)
        .map(|_| {
            Shot::Image(RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
                if x >= WIDTH / 2 && y >= HEIGHT / 2 {
                    Rgb([rng.gen(), rng.gen(), rng.gen()])
                } else {
                    Rgb([128, 128, 128])
                }
            }))
        })
        .collect();
    let source = ScriptedSource::new(busy_corner, Shot::Image(gray(128)));
    let region = Region::from_corners(0, 0, WIDTH / 2, HEIGHT / 2).expect("region");
    let recorder = FakeRecorder::stalling();
    let mut watcher = watcher(
        source,
        &recorder,
        videos.path(),
        watch_config(Some(region), Duration::ZERO, false),
    );

    for _ in 0..10 {
        let observation = scored(watcher.step());
        assert_eq!(observation.score, 0.0);
    }
    assert!(recorder.started().is_empty());
}

#[test]
fn refused_recording_resets_the_debounce_run() {
    let videos = tempfile::tempdir().expect("videos dir");
    let recorder = FakeRecorder::refusing();
    let mut watcher = watcher(still_then_motion(), &recorder, videos.path(), full_frame());
    settle_baseline(&mut watcher);

    scored(watcher.step());
    let confirmed = scored(watcher.step());
    assert!(confirmed.confirmed);

    assert!(!watcher.orchestrator().is_active());
    assert_eq!(watcher.engine().run_length(), 0);
    assert!(!watcher.has_retained_sample());
    assert_eq!(watcher.status().snapshot().sessions_total, 0);

    let fresh = scored(watcher.step());
    assert_eq!(fresh.run_length, 1);
    assert!(!fresh.confirmed);
}

#[test]
fn debug_snapshots_land_next_to_the_recording() {
    let videos = tempfile::tempdir().expect("videos dir");
    let recorder = FakeRecorder::stalling();
    let mut watcher = watcher(
        still_then_motion(),
        &recorder,
        videos.path(),
        watch_config(None, Duration::ZERO, true),
    );
    settle_baseline(&mut watcher);
    scored(watcher.step());
    assert!(scored(watcher.step()).confirmed);

    let artifact = recorder.started()[0].clone();
    let stem = artifact
        .file_stem()
        .and_then(|stem| stem.to_str())
        .expect("artifact stem")
        .to_string();
    for suffix in ["before", "after", "diff"] {
        let snapshot = videos.path().join(format!("{}-{}.png", stem, suffix));
        let decoded = image::open(&snapshot).expect("decodable snapshot");
        assert_eq!(decoded.width(), WIDTH);
        assert_eq!(decoded.height(), HEIGHT);
    }
}

#[test]
fn run_stops_on_shutdown_and_cancels_the_active_session() {
    let videos = tempfile::tempdir().expect("videos dir");
    let recorder = FakeRecorder::stalling();
    let mut watcher = watcher(
        still_then_motion(),
        &recorder,
        videos.path(),
        watch_config(None, Duration::from_millis(2), false),
    );
    let shutdown = AtomicBool::new(false);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            std::thread::sleep(Duration::from_millis(400));
            shutdown.store(true, Ordering::SeqCst);
        });
        watcher.run(&shutdown);
    });

    assert_eq!(recorder.started().len(), 1);
    assert_eq!(recorder.stops.load(Ordering::SeqCst), 1);
    assert!(!watcher.orchestrator().is_active());
    let status = watcher.status().snapshot();
    assert_eq!(status.sessions_total, 1);
    // Cut short by shutdown, so not counted as a captured video.
    assert_eq!(status.videos_captured, 0);
    assert_eq!(status.capture_state, CaptureState::Watching);
    assert!(status.cycles >= 12);
}
