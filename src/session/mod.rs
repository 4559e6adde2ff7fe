// SPDX-License-Identifier: GPL-3.0-only

//! Session state machine
//!
//! ```text
//!            prepare_recording        begin_recording
//! Streaming ─────────────────▶ RecordingPrep ─────────▶ Countdown
//!    ▲  ▲                            ▲                      │ expiry
//!    │  │        next exercise       │                      ▼
//!    │  └────────── stop ◀───────────┴──────────────── Recording
//!    │  all done                   next repetition ──▶ Countdown
//!    ▼
//! Playback (start_playback / stop_playback)
//! ```
//!
//! The host calls [`SessionController::tick`] once per frame with the
//! current instant. Camera failures are handled inside the tick by
//! disabling the camera; nothing a camera does can stop the loop.

pub mod exercise;
pub mod params;

pub use exercise::{Exercise, ExerciseQueue, RepetitionStatus};
pub use params::{Environment, SessionParameters};

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::RgbImage;
use nalgebra::Matrix4;
use tracing::{debug, error, info, warn};

use crate::backends::camera::{
    BackendError, CameraSet, CaptureOptions, DeviceProvider, Resolution,
};
use crate::config::Config;
use crate::constants::recording::SKELETON_FILE_NAME;
use crate::errors::{AppError, AppResult, RecordingError};
use crate::playback::{self, PlaybackCursor, SkeletonCorrection};
use crate::pointcloud::{
    ModelTransform, PointCloud, PointCloudOptions, PointRenderer, UpdateReport,
};
use crate::recording::{CameraRecord, CatalogEntry, RecordingCatalog, RecordingManifest};
use crate::skeleton::{
    DepthLookup, ErrorCatalog, SkeletonData, SkeletonDetector, SkeletonRecorder,
};
use crate::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Streaming,
    RecordingPrep,
    Countdown,
    Recording,
    Playback,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Streaming => "Streaming",
            SessionState::RecordingPrep => "RecordingPrep",
            SessionState::Countdown => "Countdown",
            SessionState::Recording => "Recording",
            SessionState::Playback => "Playback",
        }
    }
}

/// Fixed-length countdown
///
/// Starting a running countdown does nothing; only [`Countdown::stop`]
/// resets it.
#[derive(Debug, Clone, Default)]
pub struct Countdown {
    duration: Duration,
    started: Option<Instant>,
}

impl Countdown {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Change the length; a running countdown keeps its start instant
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Start unless already running; returns whether it started now
    pub fn start(&mut self, now: Instant) -> bool {
        if self.started.is_some() {
            return false;
        }
        self.started = Some(now);
        true
    }

    pub fn stop(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Time left, `None` when not running
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let started = self.started?;
        Some(self.duration.saturating_sub(now.saturating_duration_since(started)))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.remaining(now).is_some_and(|r| r.is_zero())
    }
}

/// Settings fixed for the lifetime of a controller
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub recording_root: PathBuf,
    pub capture: CaptureOptions,
    pub cloud: PointCloudOptions,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            recording_root: config.recording_root.clone(),
            capture: config.capture_options(),
            cloud: config.point_cloud_options(),
        }
    }
}

/// What one tick did
#[derive(Debug, Default)]
pub struct TickReport {
    /// Point cloud update, when the cloud pulled frames
    pub update: Option<UpdateReport>,
    /// A recording frame was captured
    pub captured: bool,
    /// The cloud was drawn
    pub rendered: bool,
    /// A recording stopped during this tick
    pub finished: Option<RepetitionStatus>,
}

struct ActiveRecording {
    session_name: String,
    started: Instant,
    frames: u64,
    seconds: f64,
    records: Vec<CameraRecord>,
    skeleton: Option<SkeletonRecorder>,
}

struct PlaybackState {
    entry: CatalogEntry,
    cursor: PlaybackCursor,
    correction: Option<SkeletonCorrection>,
}

pub struct SessionController {
    settings: SessionSettings,
    params: SessionParameters,
    state: SessionState,
    providers: Vec<Box<dyn DeviceProvider>>,
    cameras: CameraSet,
    cloud: Option<PointCloud>,
    renderer: Box<dyn PointRenderer>,
    transform: ModelTransform,
    session_name: String,
    countdown: Countdown,
    recording: Option<ActiveRecording>,
    exercises: ExerciseQueue,
    catalog: RecordingCatalog,
    error_catalog: ErrorCatalog,
    detector: Option<Box<dyn SkeletonDetector>>,
    playback: Option<PlaybackState>,
}

impl SessionController {
    /// Open every camera of `providers` and build the point cloud
    ///
    /// Exercises and error categories are read from the recording root.
    pub fn new(
        settings: SessionSettings,
        mut params: SessionParameters,
        providers: Vec<Box<dyn DeviceProvider>>,
        renderer: Box<dyn PointRenderer>,
    ) -> Self {
        params.clamp();
        let root = settings.recording_root.clone();
        let exercises = ExerciseQueue::new(exercise::load_exercises(&root));
        let mut controller = Self {
            countdown: Countdown::new(Duration::from_secs(params.countdown_seconds as u64)),
            params,
            state: SessionState::Streaming,
            providers,
            cameras: CameraSet::new(),
            cloud: None,
            renderer,
            transform: ModelTransform::default(),
            session_name: storage::unique_session_name(&root, &storage::session_name_now()),
            recording: None,
            exercises,
            catalog: RecordingCatalog::scan(&root),
            error_catalog: ErrorCatalog::load(&root),
            detector: None,
            playback: None,
            settings,
        };
        controller.init_cameras();
        controller
    }

    pub fn set_detector(&mut self, detector: Box<dyn SkeletonDetector>) {
        info!(detector = detector.name(), "Skeleton detector attached");
        self.detector = Some(detector);
    }

    // ===== Accessors =====

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn recording_root(&self) -> &Path {
        &self.settings.recording_root
    }

    pub fn params(&self) -> &SessionParameters {
        &self.params
    }

    /// Replace the session parameters; rejected while recording
    pub fn set_params(&mut self, mut params: SessionParameters) -> Result<(), RecordingError> {
        if matches!(self.state, SessionState::Countdown | SessionState::Recording) {
            return Err(RecordingError::InvalidState("cannot change parameters while recording"));
        }
        params.clamp();
        self.countdown
            .set_duration(Duration::from_secs(params.countdown_seconds as u64));
        self.params = params;
        Ok(())
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn cameras(&self) -> &CameraSet {
        &self.cameras
    }

    pub fn cameras_mut(&mut self) -> &mut CameraSet {
        &mut self.cameras
    }

    pub fn cloud(&self) -> Option<&PointCloud> {
        self.cloud.as_ref()
    }

    pub fn cloud_mut(&mut self) -> Option<&mut PointCloud> {
        self.cloud.as_mut()
    }

    pub fn renderer(&self) -> &dyn PointRenderer {
        self.renderer.as_ref()
    }

    pub fn catalog(&self) -> &RecordingCatalog {
        &self.catalog
    }

    pub fn exercises(&self) -> &ExerciseQueue {
        &self.exercises
    }

    pub fn error_catalog(&self) -> &ErrorCatalog {
        &self.error_catalog
    }

    pub fn transform(&self) -> &ModelTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: ModelTransform) {
        self.transform = transform;
        if let Some(cloud) = self.cloud.as_mut() {
            cloud.set_transform(transform);
        }
    }

    pub fn countdown_remaining(&self, now: Instant) -> Option<Duration> {
        (self.state == SessionState::Countdown)
            .then(|| self.countdown.remaining(now))
            .flatten()
    }

    /// Frames captured by the running recording
    pub fn recorded_frames(&self) -> u64 {
        self.recording.as_ref().map_or(0, |r| r.frames)
    }

    /// Seconds elapsed in the running recording as of the last tick
    pub fn recorded_seconds(&self) -> f64 {
        self.recording.as_ref().map_or(0.0, |r| r.seconds)
    }

    pub fn playback_cursor(&self) -> Option<&PlaybackCursor> {
        self.playback.as_ref().map(|p| &p.cursor)
    }

    pub fn playback_entry(&self) -> Option<&CatalogEntry> {
        self.playback.as_ref().map(|p| &p.entry)
    }

    pub fn correction(&self) -> Option<&SkeletonCorrection> {
        self.playback.as_ref()?.correction.as_ref()
    }

    pub fn correction_mut(&mut self) -> Option<&mut SkeletonCorrection> {
        self.playback.as_mut()?.correction.as_mut()
    }

    // ===== Cameras and cloud =====

    /// Release all cameras and reopen them from the providers
    pub fn init_cameras(&mut self) {
        self.cloud = None;
        self.cameras.clear();
        let opened = self
            .cameras
            .open_from(&mut self.providers, &self.settings.capture);
        if opened == 0 {
            warn!("No cameras found");
        }
        self.rebuild_cloud();
    }

    fn rebuild_cloud(&mut self) {
        self.cloud = None;
        if self.cameras.is_empty() {
            return;
        }
        match PointCloud::new(&self.cameras, self.renderer.as_mut(), &self.settings.cloud) {
            Ok(mut cloud) => {
                cloud.set_transform(self.transform);
                self.cloud = Some(cloud);
            }
            Err(e) => error!(error = %e, "Failed to build point cloud"),
        }
    }

    // ===== Recording =====

    pub fn prepare_recording(&mut self) -> Result<(), RecordingError> {
        if self.state != SessionState::Streaming {
            return Err(RecordingError::InvalidState("recording prep starts from streaming"));
        }
        self.session_name = storage::unique_session_name(
            &self.settings.recording_root,
            &storage::session_name_now(),
        );
        self.state = SessionState::RecordingPrep;
        info!(session = %self.session_name, "Preparing recording");
        Ok(())
    }

    pub fn cancel_recording_prep(&mut self) -> Result<(), RecordingError> {
        if self.state != SessionState::RecordingPrep {
            return Err(RecordingError::InvalidState("not preparing a recording"));
        }
        self.state = SessionState::Streaming;
        Ok(())
    }

    /// Enable the selected cameras and start the countdown
    pub fn begin_recording(&mut self, now: Instant) -> Result<(), RecordingError> {
        if self.state != SessionState::RecordingPrep {
            return Err(RecordingError::InvalidState("begin recording from recording prep"));
        }
        if !self.cameras.any_selected() {
            return Err(RecordingError::NoCamerasSelected);
        }
        self.arm_countdown(now);
        Ok(())
    }

    /// Start the countdown; polling a running countdown never restarts it
    pub fn start_countdown(&mut self, now: Instant) -> bool {
        self.state == SessionState::Countdown && self.countdown.start(now)
    }

    /// Abort the countdown and go back to recording prep
    pub fn stop_countdown(&mut self) -> Result<(), RecordingError> {
        if self.state != SessionState::Countdown {
            return Err(RecordingError::InvalidState("no countdown running"));
        }
        self.countdown.stop();
        self.state = SessionState::RecordingPrep;
        Ok(())
    }

    fn arm_countdown(&mut self, now: Instant) {
        for slot in self.cameras.iter_mut().filter(|s| s.is_selected()) {
            slot.set_enabled(true);
        }
        if let Some(exercise) = self.exercises.current() {
            exercise.apply_to(&mut self.params.environment);
            info!(exercise = %exercise.id, "Recording exercise");
        }

        self.countdown.stop();
        self.countdown
            .set_duration(Duration::from_secs(self.params.countdown_seconds as u64));
        self.countdown.start(now);
        self.state = SessionState::Countdown;
        debug!(seconds = self.params.countdown_seconds, "Countdown started");

        if self.countdown.is_expired(now) {
            self.start_capture(now);
        }
    }

    fn start_capture(&mut self, now: Instant) {
        self.countdown.stop();
        let root = self.settings.recording_root.clone();
        let session_dir = storage::file_safe_name(&self.session_name);

        let mut records = Vec::new();
        for slot in self.cameras.iter_mut() {
            if !(slot.is_selected() && slot.is_enabled()) {
                continue;
            }
            match slot.camera_mut().start_recording(&root, &session_dir) {
                Ok(record) => records.push(record),
                Err(e) => slot.disable(&e),
            }
        }

        if records.is_empty() {
            error!(session = %self.session_name, "No camera could start recording");
            self.state = SessionState::RecordingPrep;
            return;
        }

        info!(
            session = %self.session_name,
            cameras = records.len(),
            skeleton_mode = self.params.skeleton_mode,
            stream_while_recording = self.params.stream_while_recording,
            "Recording started"
        );
        self.recording = Some(ActiveRecording {
            session_name: self.session_name.clone(),
            started: now,
            frames: 0,
            seconds: 0.0,
            records,
            skeleton: self.params.skeleton_mode.then(SkeletonRecorder::new),
        });
        self.state = SessionState::Recording;
    }

    /// Stop the running recording by hand
    pub fn stop_recording(&mut self, now: Instant) -> Result<RepetitionStatus, RecordingError> {
        if self.state != SessionState::Recording {
            return Err(RecordingError::InvalidState("not recording"));
        }
        Ok(self.finish_recording(now))
    }

    fn finish_recording(&mut self, now: Instant) -> RepetitionStatus {
        let root = self.settings.recording_root.clone();
        if let Some(recording) = self.recording.take() {
            let seconds = now
                .saturating_duration_since(recording.started)
                .as_secs_f64()
                .max(recording.seconds);
            self.persist(&root, recording, seconds);
        }

        self.catalog.refresh();
        self.session_name = storage::unique_session_name(&root, &storage::session_name_now());

        let selected: Vec<String> = self
            .cameras
            .iter()
            .filter(|s| s.is_selected())
            .map(|s| s.camera().identity().name.clone())
            .collect();
        self.init_cameras();
        for slot in self.cameras.iter_mut() {
            let name = &slot.camera().identity().name;
            let keep = selected.contains(name);
            slot.set_selected(keep);
        }

        let status = self.exercises.record_repetition(self.params.repeat_n_times);
        match &status {
            RepetitionStatus::NextRepetition { completed, of } => {
                info!(completed, of, "Next repetition");
                self.arm_countdown(now);
            }
            RepetitionStatus::NextExercise(exercise) => {
                info!(exercise = %exercise.id, "Next exercise");
                self.state = SessionState::RecordingPrep;
            }
            RepetitionStatus::AllDone => {
                self.state = SessionState::Streaming;
            }
        }
        status
    }

    fn persist(&mut self, root: &Path, recording: ActiveRecording, seconds: f64) {
        let ActiveRecording {
            session_name,
            frames,
            records,
            skeleton,
            ..
        } = recording;
        let session_dir = storage::file_safe_name(&session_name);

        let mut manifest = RecordingManifest::new(&session_name, seconds, frames);
        if records.len() > 1 {
            manifest.rotation = Some(self.transform.rotation());
            manifest.translation = Some(self.transform.manifest_translation());
        }
        manifest.cameras = records;
        manifest.session_parameters = self.params.environment.clone();
        if skeleton.is_some() {
            manifest.skeleton = Some(format!("{}/{}", session_dir, SKELETON_FILE_NAME));
        }

        let path = RecordingManifest::path_for(root, &session_name);
        match manifest.save(&path) {
            Ok(()) => info!(path = ?path, frames, seconds, "Recording saved"),
            Err(e) => {
                let e = AppError::from(RecordingError::ManifestWriteFailed(e.to_string()));
                error!(error = %e, "Recording manifest lost");
            }
        }

        for slot in self.cameras.iter_mut() {
            if slot.camera().is_recording()
                && let Err(e) = slot.camera_mut().stop_recording()
            {
                warn!(camera = %slot.camera().identity().name, error = %e, "Failed to close recording");
            }
        }

        if let Some(mut recorder) = skeleton {
            let sidecar = root.join(&session_dir).join(SKELETON_FILE_NAME);
            if let Err(e) = recorder.finish(&sidecar) {
                error!(error = %e, "Failed to write skeleton data");
            }
        }
    }

    // ===== Tick =====

    /// Advance the session by one frame
    pub fn tick(&mut self, now: Instant, view_projection: &Matrix4<f32>) -> TickReport {
        let mut report = TickReport::default();
        match self.state {
            SessionState::Streaming | SessionState::RecordingPrep => {
                self.stream(view_projection, &mut report);
            }
            SessionState::Countdown => {
                self.stream(view_projection, &mut report);
                if self.countdown.is_expired(now) {
                    self.start_capture(now);
                }
            }
            SessionState::Recording => self.record_tick(now, view_projection, &mut report),
            SessionState::Playback => {
                self.stream(view_projection, &mut report);
                if let Some(playback) = self.playback.as_ref()
                    && playback.correction.is_none()
                {
                    playback.cursor.advance();
                }
            }
        }
        report
    }

    fn stream(&mut self, view_projection: &Matrix4<f32>, report: &mut TickReport) {
        let Some(cloud) = self.cloud.as_mut() else {
            return;
        };
        match cloud.update(&mut self.cameras, self.renderer.as_mut()) {
            Ok(update) => report.update = Some(update),
            Err(e) => warn!(error = %e, "Point cloud upload failed"),
        }
        self.render(view_projection, report);
    }

    fn render(&mut self, view_projection: &Matrix4<f32>, report: &mut TickReport) {
        if let Some(cloud) = self.cloud.as_ref() {
            match cloud.render(self.renderer.as_mut(), view_projection) {
                Ok(()) => report.rendered = true,
                Err(e) => warn!(error = %e, "Point cloud draw failed"),
            }
        }
    }

    fn record_tick(&mut self, now: Instant, view_projection: &Matrix4<f32>, report: &mut TickReport) {
        let limit_reached = match self.recording.as_mut() {
            Some(recording) => {
                recording.seconds = now.saturating_duration_since(recording.started).as_secs_f64();
                let reached = self.params.limit_reached(recording.frames, recording.seconds);
                if !reached {
                    recording.frames += 1;
                }
                reached
            }
            None => {
                warn!("Recording state without an active recording");
                true
            }
        };

        if limit_reached {
            info!(
                frames = self.recorded_frames(),
                seconds = self.recorded_seconds(),
                "Recording limit reached"
            );
            report.finished = Some(self.finish_recording(now));
            return;
        }

        if self.params.skeleton_mode || self.params.stream_while_recording {
            self.capture_through_depth(report);
            if self.params.stream_while_recording {
                self.render(view_projection, report);
            }
        } else {
            self.save_frames();
        }
        report.captured = true;
    }

    /// Capture by pulling `depth()`, which appends while recording
    ///
    /// Feeds the live cloud when streaming while recording and the skeleton
    /// recorder in skeleton mode. Skeletons come from the first selected
    /// camera.
    fn capture_through_depth(&mut self, report: &mut TickReport) {
        let stream = self.params.stream_while_recording;
        let skeleton = self.params.skeleton_mode;
        let primary = self
            .cameras
            .iter()
            .position(|s| s.is_enabled() && s.is_selected() && s.camera().is_recording());
        let mut update = UpdateReport::default();
        let mut skeleton_recorded = false;

        for (index, slot) in self.cameras.iter_mut().enumerate() {
            if !slot.is_enabled() || !(slot.is_selected() || stream) {
                continue;
            }
            let wants_skeleton = skeleton && primary == Some(index);
            let mut samples: Option<Vec<u16>> = None;

            let outcome = match slot.camera_mut().depth() {
                Ok(Some(frame)) => {
                    if wants_skeleton {
                        samples = Some(frame.to_vec());
                    }
                    match self.cloud.as_mut() {
                        Some(cloud) if stream => cloud.ingest(index, frame).map(|_| true),
                        _ => Ok(false),
                    }
                }
                Ok(None) => Ok(false),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(true) => {
                    if let Some(cloud) = self.cloud.as_ref()
                        && let Err(e) = cloud.upload_camera(index, self.renderer.as_mut())
                    {
                        warn!(error = %e, "Point cloud upload failed");
                    }
                    update.updated.push(index);
                }
                Ok(false) => {}
                Err(e) => {
                    slot.disable(&e);
                    update.disabled.push(index);
                    continue;
                }
            }

            if wants_skeleton {
                let camera = slot.camera_mut();
                let color = camera.color_frame();
                let detections = match (color.as_ref(), self.detector.as_mut()) {
                    (Some(image), Some(detector)) => detector.detect(image).unwrap_or_else(|e| {
                        warn!(error = %e, "Skeleton detection failed");
                        Vec::new()
                    }),
                    _ => Vec::new(),
                };
                let lookup = samples.as_deref().zip(color.as_ref()).map(|(samples, image)| {
                    DepthLookup {
                        samples,
                        resolution: camera.resolution(),
                        intrinsics: camera.intrinsics(),
                        meters_per_unit: camera.meters_per_unit(),
                        color_size: Resolution::new(image.width(), image.height()),
                    }
                });
                if let Some(recorder) = self.recording.as_mut().and_then(|r| r.skeleton.as_mut()) {
                    recorder.record(&detections, lookup.as_ref());
                    skeleton_recorded = true;
                }
            }
        }

        // Keep sidecar frames aligned with recorded frames
        if skeleton
            && !skeleton_recorded
            && let Some(recorder) = self.recording.as_mut().and_then(|r| r.skeleton.as_mut())
        {
            recorder.record(&[], None);
        }
        report.update = Some(update);
    }

    /// Standard capture: `save_frame()` on every recording camera at once
    fn save_frames(&mut self) {
        let failures: Vec<(usize, BackendError)> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .cameras
                .iter_mut()
                .enumerate()
                .filter(|(_, slot)| {
                    slot.is_enabled() && slot.is_selected() && slot.camera().is_recording()
                })
                .map(|(index, slot)| (index, s.spawn(move || slot.camera_mut().save_frame())))
                .collect();

            handles
                .into_iter()
                .filter_map(|(index, handle)| match handle.join() {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some((index, e)),
                    Err(_) => Some((index, BackendError::Crashed("save thread panicked".into()))),
                })
                .collect()
        });

        for (index, e) in failures {
            if let Some(slot) = self.cameras.get_mut(index) {
                slot.disable(&e);
            }
        }
    }

    // ===== Playback =====

    /// Replace the cameras with the recording at `index` of the catalog
    pub fn start_playback(&mut self, index: usize) -> AppResult<()> {
        if self.state != SessionState::Streaming {
            return Err(RecordingError::InvalidState("playback starts from streaming").into());
        }
        let entry = self
            .catalog
            .get(index)
            .cloned()
            .ok_or_else(|| AppError::Other(format!("no recording at index {}", index)))?;

        self.cloud = None;
        self.cameras.clear();

        let cursor = PlaybackCursor::new(0);
        let opened = playback::open_cameras(
            &self.settings.recording_root,
            &entry.manifest,
            &cursor,
            &mut self.cameras,
        );
        if opened == 0 {
            self.init_cameras();
            return Err(AppError::Other(format!(
                "{} has no playable cameras",
                entry.manifest.name
            )));
        }

        self.transform = ModelTransform::from_manifest(
            entry.manifest.rotation.as_ref(),
            entry.manifest.translation.as_ref(),
        );
        self.rebuild_cloud();
        info!(session = %entry.manifest.name, "Playback started");
        self.playback = Some(PlaybackState {
            entry,
            cursor,
            correction: None,
        });
        self.state = SessionState::Playback;
        Ok(())
    }

    /// Back to live streaming; an open correction is written first
    pub fn stop_playback(&mut self) -> AppResult<()> {
        if self.state != SessionState::Playback {
            return Err(RecordingError::InvalidState("not playing back").into());
        }
        if self.correction().is_some_and(|c| !c.is_finished()) {
            self.finish_correction()?;
        }
        self.playback = None;
        self.transform = ModelTransform::default();
        self.init_cameras();
        self.state = SessionState::Streaming;
        Ok(())
    }

    pub fn set_playback_paused(&mut self, paused: bool) {
        if let Some(playback) = self.playback.as_ref() {
            playback.cursor.set_paused(paused);
        }
    }

    pub fn seek_playback(&mut self, frame: usize) {
        if let Some(playback) = self.playback.as_ref() {
            playback.cursor.seek(frame);
        }
    }

    /// Enter correction mode on the played recording's skeleton data
    pub fn start_correction(&mut self) -> AppResult<()> {
        let root = self.settings.recording_root.clone();
        let catalog = self.error_catalog.clone();
        let playback = self
            .playback
            .as_mut()
            .ok_or(RecordingError::InvalidState("correction needs playback"))?;
        if playback.correction.is_some() {
            return Ok(());
        }
        let path = playback.entry.manifest.skeleton_path(&root).ok_or_else(|| {
            AppError::Other(format!("{} has no skeleton data", playback.entry.manifest.name))
        })?;
        let data = SkeletonData::load(&path)?;
        playback.correction = Some(SkeletonCorrection::start(data, catalog, playback.cursor.clone()));
        Ok(())
    }

    /// Leave correction mode, writing the corrections back once
    pub fn finish_correction(&mut self) -> AppResult<()> {
        let playback = self
            .playback
            .as_mut()
            .ok_or(RecordingError::InvalidState("correction needs playback"))?;
        let correction = playback
            .correction
            .as_mut()
            .ok_or(RecordingError::InvalidState("not correcting"))?;
        correction.finish()?;
        playback.correction = None;
        Ok(())
    }

    /// Color frame of the first played camera with the reviewed joints drawn
    /// onto it, and the number of markers drawn
    pub fn review_frame(
        &mut self,
        threshold: f32,
        show_uncertainty: bool,
    ) -> AppResult<(RgbImage, usize)> {
        let correction = self
            .playback
            .as_ref()
            .and_then(|p| p.correction.as_ref())
            .ok_or(RecordingError::InvalidState("not correcting"))?;
        let mut image = self
            .cameras
            .get_mut(0)
            .and_then(|slot| slot.camera_mut().color_frame())
            .ok_or_else(|| AppError::Other("recording has no color frame here".into()))?;
        let drawn = correction.overlay(&mut image, threshold, show_uncertainty);
        Ok((image, drawn))
    }

    /// Run the detector over a recorded session and attach the result
    pub fn compute_skeletons(&mut self, index: usize) -> AppResult<PathBuf> {
        if matches!(self.state, SessionState::Countdown | SessionState::Recording) {
            return Err(RecordingError::InvalidState("cannot compute skeletons while recording").into());
        }
        let entry = self
            .catalog
            .get(index)
            .cloned()
            .ok_or_else(|| AppError::Other(format!("no recording at index {}", index)))?;
        let detector = self
            .detector
            .as_mut()
            .ok_or_else(|| AppError::Other("no skeleton detector attached".to_string()))?;
        let path = playback::compute_skeletons(
            &self.settings.recording_root,
            &entry,
            detector.as_mut(),
        )?;
        self.catalog.refresh();
        Ok(path)
    }
}
