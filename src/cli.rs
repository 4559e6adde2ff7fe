// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for capture and review
//!
//! This module provides command-line functionality for:
//! - Listing cameras and recorded sessions
//! - Streaming the fused point cloud
//! - Recording sessions
//! - Playing back and reviewing recordings

use depthfuse::backends::camera::synthetic::SyntheticProvider;
#[cfg(feature = "v4l2")]
use depthfuse::backends::camera::v4l2_kinect::KinectProvider;
use depthfuse::backends::camera::{CameraKind, CameraSet, DeviceProvider, Resolution};
use depthfuse::config::Config;
use depthfuse::constants::timing::TICK_INTERVAL;
use depthfuse::gpu::WgpuPointRenderer;
use depthfuse::playback;
use depthfuse::pointcloud::{HeadlessRenderer, PointRenderer};
use depthfuse::recording::RecordingCatalog;
use depthfuse::session::{RepetitionStatus, SessionController, SessionSettings, SessionState};
use depthfuse::skeleton::CenterDetector;
use nalgebra::{Matrix4, Perspective3, Point3, Vector3};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Offscreen target size of the GPU renderer
const RENDER_WIDTH: u32 = 1280;
const RENDER_HEIGHT: u32 = 720;

/// Keypoints produced by the built-in detector
const DETECTOR_JOINTS: usize = 17;

/// Options shared by every command
pub struct GlobalOptions {
    pub root: Option<PathBuf>,
    pub synthetic: usize,
    pub gpu: bool,
}

/// Recording overrides given on the command line
pub struct RecordOptions {
    pub frames: Option<i64>,
    pub seconds: Option<f64>,
    pub countdown: Option<u32>,
    pub repeat: Option<u32>,
    pub skeleton: bool,
    pub stream: bool,
}

fn load_config(options: &GlobalOptions) -> Config {
    let mut config = Config::load();
    if let Some(root) = &options.root {
        config.recording_root = root.clone();
    }
    config
}

fn providers(options: &GlobalOptions) -> Vec<Box<dyn DeviceProvider>> {
    let mut providers: Vec<Box<dyn DeviceProvider>> = Vec::new();
    #[cfg(feature = "v4l2")]
    providers.push(Box::new(KinectProvider));
    if options.synthetic > 0 {
        providers.push(Box::new(SyntheticProvider::new(
            CameraKind::RealSense,
            options.synthetic,
            Resolution::new(640, 480),
        )));
    }
    providers
}

fn renderer(options: &GlobalOptions) -> Result<Box<dyn PointRenderer>, Box<dyn std::error::Error>> {
    if options.gpu {
        let renderer = pollster::block_on(WgpuPointRenderer::new(RENDER_WIDTH, RENDER_HEIGHT))?;
        Ok(Box::new(renderer))
    } else {
        Ok(Box::new(HeadlessRenderer::default()))
    }
}

fn controller(
    options: &GlobalOptions,
    config: &Config,
    params: depthfuse::session::SessionParameters,
) -> Result<SessionController, Box<dyn std::error::Error>> {
    Ok(SessionController::new(
        SessionSettings::from(config),
        params,
        providers(options),
        renderer(options)?,
    ))
}

/// View from the sensor origin along +Z, Y pointing down like image rows
fn view_projection() -> Matrix4<f32> {
    let aspect = RENDER_WIDTH as f32 / RENDER_HEIGHT as f32;
    let projection = Perspective3::new(aspect, 60f32.to_radians(), 0.1, 20.0);
    let view = Matrix4::look_at_rh(
        &Point3::origin(),
        &Point3::new(0.0, 0.0, 1.0),
        &Vector3::new(0.0, -1.0, 0.0),
    );
    projection.to_homogeneous() * view
}

fn stop_flag() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;
    Ok(flag)
}

fn save_snapshot(controller: &SessionController, path: &Path) -> CliResult {
    match controller.renderer().snapshot()? {
        Some(image) => {
            image.save(path)?;
            println!("Snapshot saved: {}", path.display());
        }
        None => println!("Snapshots need the GPU renderer (--gpu)"),
    }
    Ok(())
}

/// Catalog index of a recording given by index or session name
fn resolve_recording(catalog: &RecordingCatalog, recording: &str) -> Result<usize, String> {
    if let Ok(index) = recording.parse::<usize>()
        && index < catalog.len()
    {
        return Ok(index);
    }
    catalog
        .entries()
        .iter()
        .position(|e| e.manifest.name == recording)
        .ok_or_else(|| format!("No recording named {}", recording))
}

/// List all connected depth cameras
pub fn list_cameras(options: &GlobalOptions) -> CliResult {
    let config = load_config(options);
    let mut providers = providers(options);
    let mut cameras = CameraSet::new();
    cameras.open_from(&mut providers, &config.capture_options());

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, slot) in cameras.iter().enumerate() {
        let camera = slot.camera();
        let k = camera.intrinsics();
        println!("  [{}] {}", index, camera.identity().name);
        println!(
            "      Depth: {} at {} m/unit, fx={:.1} fy={:.1} cx={:.1} cy={:.1}",
            camera.resolution(),
            camera.meters_per_unit(),
            k.fx,
            k.fy,
            k.cx,
            k.cy
        );
        println!();
    }
    Ok(())
}

/// List recorded sessions, newest first
pub fn list_recordings(options: &GlobalOptions) -> CliResult {
    let config = load_config(options);
    let catalog = RecordingCatalog::scan(&config.recording_root);

    if catalog.is_empty() {
        println!("No recordings in {}", config.recording_root.display());
        return Ok(());
    }

    println!("Recordings in {}:", config.recording_root.display());
    println!();
    for (index, entry) in catalog.entries().iter().enumerate() {
        let manifest = &entry.manifest;
        let skeleton = if manifest.skeleton.is_some() {
            ", skeletons"
        } else {
            ""
        };
        println!(
            "  [{}] {} ({} frames, {:.1}s, {} cameras{})",
            index,
            manifest.name,
            manifest.frames,
            manifest.duration,
            manifest.cameras.len(),
            skeleton
        );
    }
    Ok(())
}

/// Stream the fused cloud for a while
pub fn stream(options: &GlobalOptions, seconds: u64, snapshot: Option<PathBuf>) -> CliResult {
    let config = load_config(options);
    let mut controller = controller(options, &config, config.session.clone())?;
    if controller.cameras().is_empty() {
        return Err("No cameras found".into());
    }
    let stop = stop_flag()?;
    let vp = view_projection();

    println!("Streaming {} cameras (press Ctrl+C to stop)", controller.cameras().len());
    let start = Instant::now();
    let mut ticks = 0u64;
    while start.elapsed().as_secs() < seconds && !stop.load(Ordering::SeqCst) {
        let report = controller.tick(Instant::now(), &vp);
        ticks += 1;
        if let Some(update) = report.update
            && !update.disabled.is_empty()
        {
            println!();
            println!("Disabled cameras: {:?}", update.disabled);
        }
        print!(
            "\rTicks: {}  enabled cameras: {}",
            ticks,
            controller.cameras().enabled_count()
        );
        std::io::Write::flush(&mut std::io::stdout())?;
        std::thread::sleep(TICK_INTERVAL);
    }
    println!();

    if let Some(path) = snapshot {
        save_snapshot(&controller, &path)?;
    }
    Ok(())
}

/// Record one session, or a whole exercise list with repetitions
pub fn record(options: &GlobalOptions, record: RecordOptions) -> CliResult {
    let config = load_config(options);
    let mut params = config.session.clone();
    if let Some(frames) = record.frames {
        params.limit_frames = true;
        params.frame_limit = frames;
    }
    if let Some(seconds) = record.seconds {
        params.limit_time = true;
        params.time_limit_seconds = seconds;
    }
    if let Some(countdown) = record.countdown {
        params.countdown_seconds = countdown;
    }
    if let Some(repeat) = record.repeat {
        params.repeat_n_times = repeat;
    }
    params.skeleton_mode |= record.skeleton;
    params.stream_while_recording |= record.stream;

    let mut controller = controller(options, &config, params)?;
    if controller.cameras().is_empty() {
        return Err("No cameras found".into());
    }
    if controller.params().skeleton_mode {
        controller.set_detector(Box::new(CenterDetector::new(DETECTOR_JOINTS)));
    }
    let stop = stop_flag()?;
    let vp = view_projection();

    println!("Recording to {}", config.recording_root.display());
    if let Some(exercise) = controller.exercises().current() {
        println!("Exercise: {} - {}", exercise.id, exercise.description);
    }
    controller.prepare_recording()?;
    controller.begin_recording(Instant::now())?;

    loop {
        let now = Instant::now();
        if stop.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            match controller.state() {
                SessionState::Recording => {
                    controller.stop_recording(now)?;
                }
                SessionState::Countdown => {
                    controller.stop_countdown()?;
                    controller.cancel_recording_prep()?;
                }
                _ => {}
            }
            break;
        }

        let report = controller.tick(now, &vp);
        match report.finished {
            Some(RepetitionStatus::NextRepetition { completed, of }) => {
                println!();
                println!("Saved repetition {} of {}", completed, of);
            }
            Some(RepetitionStatus::NextExercise(exercise)) => {
                println!();
                println!("Next exercise: {} - {}", exercise.id, exercise.description);
                controller.begin_recording(Instant::now())?;
            }
            Some(RepetitionStatus::AllDone) => {
                println!();
                println!("Recording saved");
                break;
            }
            None => {}
        }

        match controller.state() {
            SessionState::Countdown => {
                let remaining = controller.countdown_remaining(now).unwrap_or_default();
                print!("\rStarting in {}s   ", remaining.as_secs() + 1);
            }
            SessionState::Recording => {
                print!(
                    "\rRecording: {} frames, {:.1}s   ",
                    controller.recorded_frames(),
                    controller.recorded_seconds()
                );
            }
            SessionState::RecordingPrep => {
                println!();
                return Err("No camera could start recording".into());
            }
            _ => break,
        }
        std::io::Write::flush(&mut std::io::stdout())?;
        std::thread::sleep(TICK_INTERVAL);
    }
    Ok(())
}

/// Play a recording back, optionally reviewing its skeletons
///
/// In review mode every frame's joints are drawn onto the first camera's
/// color frame; with `overlays` set the images are saved there as PNG.
pub fn play(
    options: &GlobalOptions,
    recording: &str,
    review: bool,
    snapshot: Option<PathBuf>,
    overlays: Option<PathBuf>,
) -> CliResult {
    let config = load_config(options);
    let mut controller = controller(options, &config, config.session.clone())?;
    let index = resolve_recording(controller.catalog(), recording)?;
    controller.start_playback(index)?;
    let vp = view_projection();

    let name = controller
        .playback_entry()
        .map(|e| e.manifest.name.clone())
        .unwrap_or_default();
    let total = controller
        .playback_cursor()
        .map_or(0, |c| c.total_frames());
    println!("Playing {} ({} frames)", name, total);

    if review {
        controller.start_correction()?;
        if let Some(dir) = overlays.as_ref() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let stop = stop_flag()?;
    loop {
        let last = controller
            .playback_cursor()
            .is_none_or(|c| c.is_last_frame());
        let frame = controller.playback_cursor().map_or(0, |c| c.frame());
        controller.tick(Instant::now(), &vp);
        if let Some(correction) = controller.correction() {
            let reviewed = correction.frame();
            let persons = correction.persons().len();
            let flagged = correction
                .persons()
                .iter()
                .flat_map(|p| p.joints.iter())
                .filter(|j| j.is_flagged())
                .count();
            let markers =
                match controller.review_frame(config.score_threshold, config.show_uncertainty) {
                    Ok((image, drawn)) => {
                        if let Some(dir) = overlays.as_ref() {
                            image.save(dir.join(format!("frame_{:06}.png", reviewed)))?;
                        }
                        drawn
                    }
                    Err(e) => {
                        tracing::warn!(frame = reviewed, error = %e, "No overlay for frame");
                        0
                    }
                };
            println!(
                "Frame {}: {} persons, {} flagged joints, {} markers",
                reviewed, persons, flagged, markers
            );
        } else {
            print!("\rFrame {} / {}", frame + 1, total);
            std::io::Write::flush(&mut std::io::stdout())?;
        }

        let done = match controller.correction_mut() {
            Some(correction) => !correction.continue_frame(),
            None => last,
        };
        if done || stop.load(Ordering::SeqCst) {
            break;
        }
        std::thread::sleep(TICK_INTERVAL);
    }
    println!();

    if let Some(path) = snapshot {
        save_snapshot(&controller, &path)?;
    }
    controller.stop_playback()?;
    Ok(())
}

/// Detect skeletons over a recorded session and attach the sidecar
pub fn compute_skeletons(options: &GlobalOptions, recording: &str) -> CliResult {
    let config = load_config(options);
    let catalog = RecordingCatalog::scan(&config.recording_root);
    let index = resolve_recording(&catalog, recording)?;
    let entry = catalog
        .get(index)
        .ok_or_else(|| format!("No recording at index {}", index))?;

    let mut detector = CenterDetector::new(DETECTOR_JOINTS);
    let path = playback::compute_skeletons(&config.recording_root, entry, &mut detector)?;
    println!("Skeletons saved: {}", path.display());
    Ok(())
}
