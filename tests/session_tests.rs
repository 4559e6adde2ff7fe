// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the session state machine

use std::path::Path;
use std::time::{Duration, Instant};

use depthfuse::backends::camera::synthetic::{
    SyntheticColorFactory, SyntheticDepthDevice, SyntheticProvider,
};
use depthfuse::backends::camera::{
    CameraIdentity, CameraKind, CaptureOptions, DepthCamera, DeviceProvider, LiveCamera,
    Resolution,
};
use depthfuse::errors::{AppResult, RecordingError};
use depthfuse::media::{ColorSequenceReader, DepthReader};
use depthfuse::pointcloud::{HeadlessRenderer, PointCloudOptions};
use depthfuse::recording::RecordingManifest;
use depthfuse::session::{
    RepetitionStatus, SessionController, SessionParameters, SessionSettings, SessionState,
};
use depthfuse::skeleton::{DetectedPerson, Keypoint, SkeletonData, SkeletonDetector};
use image::RgbImage;
use nalgebra::Matrix4;

fn settings(root: &Path) -> SessionSettings {
    SessionSettings {
        recording_root: root.to_path_buf(),
        capture: CaptureOptions::default(),
        cloud: PointCloudOptions::default(),
    }
}

fn frame_limited(frames: i64) -> SessionParameters {
    SessionParameters {
        limit_frames: true,
        frame_limit: frames,
        limit_time: false,
        countdown_seconds: 0,
        ..Default::default()
    }
}

fn controller(root: &Path, params: SessionParameters) -> SessionController {
    controller_with(
        root,
        params,
        vec![Box::new(SyntheticProvider::new(
            CameraKind::RealSense,
            2,
            Resolution::new(4, 3),
        ))],
    )
}

fn controller_with(
    root: &Path,
    params: SessionParameters,
    providers: Vec<Box<dyn DeviceProvider>>,
) -> SessionController {
    SessionController::new(
        settings(root),
        params,
        providers,
        Box::new(HeadlessRenderer::new()),
    )
}

/// One good camera followed by one that times out after `frames` frames
struct FlakyProvider {
    frames: usize,
}

impl DeviceProvider for FlakyProvider {
    fn name(&self) -> &str {
        "flaky"
    }

    fn open_all(&mut self, first_id: u32, options: &CaptureOptions) -> Vec<Box<dyn DepthCamera>> {
        let resolution = Resolution::new(4, 3);
        let good = SyntheticDepthDevice::constant(resolution, 1000);
        let flaky = SyntheticDepthDevice::constant(resolution, 1000).failing_after(self.frames);
        [good, flaky]
            .into_iter()
            .enumerate()
            .map(|(n, device)| {
                let camera = LiveCamera::without_color(
                    CameraIdentity::new(CameraKind::Orbbec, first_id + n as u32),
                    Box::new(device),
                    options,
                )
                .unwrap();
                Box::new(camera) as Box<dyn DepthCamera>
            })
            .collect()
    }
}

/// One Kinect whose color frames change shade on every grab
struct ShadedColorProvider;

impl DeviceProvider for ShadedColorProvider {
    fn name(&self) -> &str {
        "shaded"
    }

    fn open_all(&mut self, first_id: u32, options: &CaptureOptions) -> Vec<Box<dyn DepthCamera>> {
        let camera = LiveCamera::with_color(
            CameraIdentity::new(CameraKind::Kinect, first_id),
            Box::new(SyntheticDepthDevice::constant(Resolution::new(4, 3), 1000)),
            Box::new(SyntheticColorFactory::new(vec![0]).sequenced()),
            options,
        )
        .unwrap();
        vec![Box::new(camera)]
    }
}

/// Reports the red value of the top left pixel as the joint's `u`
struct ShadeDetector;

impl SkeletonDetector for ShadeDetector {
    fn name(&self) -> &str {
        "shade"
    }

    fn detect(&mut self, image: &RgbImage) -> AppResult<Vec<DetectedPerson>> {
        let red = image.get_pixel(0, 0)[0] as f32;
        Ok(vec![DetectedPerson {
            keypoints: vec![Keypoint {
                u: red,
                v: 0.0,
                score: 1.0,
            }],
        }])
    }
}

fn ms(t0: Instant, millis: u64) -> Instant {
    t0 + Duration::from_millis(millis)
}

#[test]
fn test_frame_limited_recording_writes_manifest_and_containers() {
    let dir = tempfile::tempdir().unwrap();
    let vp = Matrix4::identity();
    let mut controller = controller(dir.path(), frame_limited(3));
    assert_eq!(controller.state(), SessionState::Streaming);
    assert_eq!(controller.cameras().len(), 2);

    // Streaming ticks update and draw the cloud
    let t0 = Instant::now();
    let report = controller.tick(t0, &vp);
    assert_eq!(report.update.unwrap().updated, vec![0, 1]);
    assert!(report.rendered);

    assert!(matches!(
        controller.begin_recording(t0),
        Err(RecordingError::InvalidState(_))
    ));
    controller.prepare_recording().unwrap();
    let name = controller.session_name().to_string();
    controller.begin_recording(t0).unwrap();
    assert_eq!(controller.state(), SessionState::Recording);

    // The limit is checked before each capture, so frame_limit + 1 frames land
    for i in 1..=4 {
        let report = controller.tick(ms(t0, 10 * i), &vp);
        assert!(report.captured);
        assert!(report.finished.is_none());
        assert_eq!(controller.recorded_frames(), i);
    }
    let report = controller.tick(ms(t0, 50), &vp);
    assert_eq!(report.finished, Some(RepetitionStatus::AllDone));
    assert_eq!(controller.state(), SessionState::Streaming);
    assert_ne!(controller.session_name(), name);

    let manifest = RecordingManifest::load(&RecordingManifest::path_for(dir.path(), &name)).unwrap();
    assert_eq!(manifest.name, name);
    assert_eq!(manifest.frames, 4);
    assert_eq!(manifest.cameras.len(), 2);
    assert!(manifest.rotation.is_some());
    assert!(manifest.translation.is_some());
    assert!(manifest.skeleton.is_none());
    for record in &manifest.cameras {
        let reader = DepthReader::open(&record.depth_path(dir.path())).unwrap();
        assert_eq!(reader.frame_count(), 4);
    }

    assert_eq!(controller.catalog().len(), 1);
    assert_eq!(controller.catalog().entries()[0].manifest.name, name);
    // Cameras were reopened and stay selected
    assert_eq!(controller.cameras().len(), 2);
    assert!(controller.cameras().iter().all(|s| s.is_selected()));
}

#[test]
fn test_single_camera_manifest_has_no_transform() {
    let dir = tempfile::tempdir().unwrap();
    let vp = Matrix4::identity();
    let mut controller = controller(dir.path(), frame_limited(0));
    controller.cameras_mut().get_mut(1).unwrap().set_selected(false);

    let t0 = Instant::now();
    controller.prepare_recording().unwrap();
    let name = controller.session_name().to_string();
    controller.begin_recording(t0).unwrap();
    controller.tick(ms(t0, 10), &vp);
    controller.tick(ms(t0, 20), &vp);
    assert_eq!(controller.state(), SessionState::Streaming);

    let manifest = RecordingManifest::load(&RecordingManifest::path_for(dir.path(), &name)).unwrap();
    assert_eq!(manifest.cameras.len(), 1);
    assert!(manifest.rotation.is_none());
    assert!(manifest.translation.is_none());

    // Selection survives the camera reinit
    assert!(controller.cameras().get(0).unwrap().is_selected());
    assert!(!controller.cameras().get(1).unwrap().is_selected());
}

#[test]
fn test_countdown_is_not_restarted_by_polling() {
    let dir = tempfile::tempdir().unwrap();
    let vp = Matrix4::identity();
    let params = SessionParameters {
        countdown_seconds: 3,
        ..frame_limited(5)
    };
    let mut controller = controller(dir.path(), params);

    let t0 = Instant::now();
    controller.prepare_recording().unwrap();
    controller.begin_recording(t0).unwrap();
    assert_eq!(controller.state(), SessionState::Countdown);
    assert!(!controller.start_countdown(ms(t0, 1000)));
    assert_eq!(
        controller.countdown_remaining(ms(t0, 1000)),
        Some(Duration::from_secs(2))
    );

    controller.tick(ms(t0, 2000), &vp);
    assert_eq!(controller.state(), SessionState::Countdown);
    assert_eq!(controller.recorded_frames(), 0);

    controller.tick(ms(t0, 3000), &vp);
    assert_eq!(controller.state(), SessionState::Recording);
    assert_eq!(controller.countdown_remaining(ms(t0, 3000)), None);
}

#[test]
fn test_stopping_the_countdown_returns_to_prep() {
    let dir = tempfile::tempdir().unwrap();
    let params = SessionParameters {
        countdown_seconds: 5,
        ..frame_limited(5)
    };
    let mut controller = controller(dir.path(), params);

    let t0 = Instant::now();
    controller.prepare_recording().unwrap();
    controller.begin_recording(t0).unwrap();
    controller.stop_countdown().unwrap();
    assert_eq!(controller.state(), SessionState::RecordingPrep);
    assert!(controller.catalog().is_empty());

    controller.cancel_recording_prep().unwrap();
    assert_eq!(controller.state(), SessionState::Streaming);
}

#[test]
fn test_recording_needs_a_selected_camera() {
    let dir = tempfile::tempdir().unwrap();
    let mut controller = controller(dir.path(), frame_limited(1));
    for slot in controller.cameras_mut().iter_mut() {
        slot.set_selected(false);
    }
    controller.prepare_recording().unwrap();
    assert!(matches!(
        controller.begin_recording(Instant::now()),
        Err(RecordingError::NoCamerasSelected)
    ));
    assert_eq!(controller.state(), SessionState::RecordingPrep);
}

#[test]
fn test_time_limit_stops_recording() {
    let dir = tempfile::tempdir().unwrap();
    let vp = Matrix4::identity();
    let params = SessionParameters {
        limit_frames: false,
        limit_time: true,
        time_limit_seconds: 1.0,
        countdown_seconds: 0,
        ..Default::default()
    };
    let mut controller = controller(dir.path(), params);

    let t0 = Instant::now();
    controller.prepare_recording().unwrap();
    controller.begin_recording(t0).unwrap();
    assert!(controller.tick(ms(t0, 500), &vp).captured);
    assert!(controller.tick(ms(t0, 1000), &vp).captured);
    let report = controller.tick(ms(t0, 1001), &vp);
    assert_eq!(report.finished, Some(RepetitionStatus::AllDone));
}

#[test]
fn test_repetitions_rearm_the_countdown() {
    let dir = tempfile::tempdir().unwrap();
    let vp = Matrix4::identity();
    let params = SessionParameters {
        repeat_n_times: 2,
        ..frame_limited(0)
    };
    let mut controller = controller(dir.path(), params);

    let t0 = Instant::now();
    controller.prepare_recording().unwrap();
    controller.begin_recording(t0).unwrap();
    controller.tick(ms(t0, 10), &vp);
    let report = controller.tick(ms(t0, 20), &vp);
    assert_eq!(
        report.finished,
        Some(RepetitionStatus::NextRepetition { completed: 1, of: 2 })
    );
    // Zero countdown goes straight back to recording
    assert_eq!(controller.state(), SessionState::Recording);

    controller.tick(ms(t0, 30), &vp);
    let report = controller.tick(ms(t0, 40), &vp);
    assert_eq!(report.finished, Some(RepetitionStatus::AllDone));
    assert_eq!(controller.state(), SessionState::Streaming);

    let names: Vec<_> = controller
        .catalog()
        .entries()
        .iter()
        .map(|e| e.manifest.name.clone())
        .collect();
    assert_eq!(names.len(), 2);
    assert_ne!(names[0], names[1]);
}

#[test]
fn test_exercise_queue_moves_to_next_exercise() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Exercises.json"),
        r#"{"Exercises": [
            {"Id": "E01a", "Description": "Stand", "Sitting": false},
            {"Id": "E12b", "Description": "Sit", "Sitting": true, "Ankle Weight": true}
        ]}"#,
    )
    .unwrap();
    let vp = Matrix4::identity();
    let mut controller = controller(dir.path(), frame_limited(0));
    assert_eq!(controller.exercises().exercises().len(), 2);

    let t0 = Instant::now();
    controller.prepare_recording().unwrap();
    let first = controller.session_name().to_string();
    controller.begin_recording(t0).unwrap();
    assert_eq!(controller.params().environment.exercise.as_deref(), Some("E01a"));
    controller.tick(ms(t0, 10), &vp);
    let report = controller.tick(ms(t0, 20), &vp);
    match report.finished {
        Some(RepetitionStatus::NextExercise(exercise)) => assert_eq!(exercise.id, "E12b"),
        other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(controller.state(), SessionState::RecordingPrep);

    let manifest =
        RecordingManifest::load(&RecordingManifest::path_for(dir.path(), &first)).unwrap();
    assert_eq!(manifest.session_parameters.exercise.as_deref(), Some("E01a"));
    assert!(!manifest.session_parameters.sitting);

    controller.begin_recording(ms(t0, 30)).unwrap();
    assert!(controller.params().environment.sitting);
    assert!(controller.params().environment.ankle_weight);
    controller.tick(ms(t0, 40), &vp);
    let report = controller.tick(ms(t0, 50), &vp);
    assert_eq!(report.finished, Some(RepetitionStatus::AllDone));
    assert_eq!(controller.state(), SessionState::Streaming);
}

#[test]
fn test_manual_stop() {
    let dir = tempfile::tempdir().unwrap();
    let vp = Matrix4::identity();
    let params = SessionParameters {
        limit_frames: false,
        limit_time: false,
        countdown_seconds: 0,
        ..Default::default()
    };
    let mut controller = controller(dir.path(), params);

    assert!(controller.stop_recording(Instant::now()).is_err());
    let t0 = Instant::now();
    controller.prepare_recording().unwrap();
    let name = controller.session_name().to_string();
    controller.begin_recording(t0).unwrap();
    for i in 1..=3 {
        controller.tick(ms(t0, 100 * i), &vp);
    }
    let status = controller.stop_recording(ms(t0, 1500)).unwrap();
    assert_eq!(status, RepetitionStatus::AllDone);

    let manifest = RecordingManifest::load(&RecordingManifest::path_for(dir.path(), &name)).unwrap();
    assert_eq!(manifest.frames, 3);
    assert!((manifest.duration - 1.5).abs() < 1e-6);
}

#[test]
fn test_failing_camera_does_not_stop_recording() {
    let dir = tempfile::tempdir().unwrap();
    let vp = Matrix4::identity();
    let mut controller = controller_with(
        dir.path(),
        frame_limited(4),
        vec![Box::new(FlakyProvider { frames: 2 })],
    );

    let t0 = Instant::now();
    controller.prepare_recording().unwrap();
    let name = controller.session_name().to_string();
    controller.begin_recording(t0).unwrap();
    for i in 1..=5 {
        assert!(controller.tick(ms(t0, 10 * i), &vp).captured);
    }
    assert!(!controller.cameras().get(1).unwrap().is_enabled());
    assert!(controller.cameras().get(0).unwrap().is_enabled());

    let report = controller.tick(ms(t0, 60), &vp);
    assert_eq!(report.finished, Some(RepetitionStatus::AllDone));

    let manifest = RecordingManifest::load(&RecordingManifest::path_for(dir.path(), &name)).unwrap();
    let frames: Vec<usize> = manifest
        .cameras
        .iter()
        .map(|r| DepthReader::open(&r.depth_path(dir.path())).unwrap().frame_count())
        .collect();
    assert_eq!(frames, vec![5, 2]);
}

#[test]
fn test_streaming_while_recording_updates_the_cloud() {
    let dir = tempfile::tempdir().unwrap();
    let vp = Matrix4::identity();
    let params = SessionParameters {
        stream_while_recording: true,
        ..frame_limited(2)
    };
    let mut controller = controller(dir.path(), params);

    let t0 = Instant::now();
    controller.prepare_recording().unwrap();
    let name = controller.session_name().to_string();
    controller.begin_recording(t0).unwrap();
    let report = controller.tick(ms(t0, 10), &vp);
    assert!(report.captured);
    assert!(report.rendered);
    assert_eq!(report.update.unwrap().updated, vec![0, 1]);

    controller.tick(ms(t0, 20), &vp);
    controller.tick(ms(t0, 30), &vp);
    controller.tick(ms(t0, 40), &vp);
    assert_eq!(controller.state(), SessionState::Streaming);

    let manifest = RecordingManifest::load(&RecordingManifest::path_for(dir.path(), &name)).unwrap();
    for record in &manifest.cameras {
        let reader = DepthReader::open(&record.depth_path(dir.path())).unwrap();
        assert_eq!(reader.frame_count(), 3);
    }
}

#[test]
fn test_parameters_are_locked_while_recording() {
    let dir = tempfile::tempdir().unwrap();
    let params = SessionParameters {
        countdown_seconds: 5,
        ..frame_limited(1)
    };
    let mut controller = controller(dir.path(), params.clone());

    let mut changed = params.clone();
    changed.countdown_seconds = 30;
    controller.set_params(changed).unwrap();
    // Clamped to the maximum countdown
    assert_eq!(controller.params().countdown_seconds, 10);

    controller.prepare_recording().unwrap();
    controller.begin_recording(Instant::now()).unwrap();
    assert!(controller.set_params(params).is_err());
}

#[test]
fn test_skeleton_frames_annotate_the_saved_color_frames() {
    let dir = tempfile::tempdir().unwrap();
    let params = SessionParameters {
        skeleton_mode: true,
        ..frame_limited(1)
    };
    let mut controller = controller_with(dir.path(), params, vec![Box::new(ShadedColorProvider)]);
    controller.set_detector(Box::new(ShadeDetector));

    let t0 = Instant::now();
    let vp = Matrix4::identity();
    controller.prepare_recording().unwrap();
    let name = controller.session_name().to_string();
    controller.begin_recording(t0).unwrap();
    for i in 1..10 {
        if controller.tick(ms(t0, 10 * i), &vp).finished.is_some() {
            break;
        }
    }
    assert_eq!(controller.state(), SessionState::Streaming);

    let manifest =
        RecordingManifest::load(&RecordingManifest::path_for(dir.path(), &name)).unwrap();
    let data = SkeletonData::load(&manifest.skeleton_path(dir.path()).unwrap()).unwrap();
    assert_eq!(data.frame_count(), 2);

    let depth_path = manifest.cameras[0].depth_path(dir.path());
    let stem = depth_path.file_stem().unwrap().to_str().unwrap();
    let color_dir = depth_path.with_file_name(format!("{}_color", stem));
    let colors = ColorSequenceReader::open(&color_dir).unwrap();

    let mut seen = Vec::new();
    for index in 0..2 {
        let saved = colors.frame(index).unwrap().get_pixel(0, 0)[0] as f32;
        let detected = data.frame(index).unwrap()[0].joints[0].u;
        assert!(
            (saved - detected).abs() < 12.0,
            "frame {}: saved {} detected {}",
            index,
            saved,
            detected
        );
        seen.push(detected);
    }
    // One grab per captured frame
    assert_eq!(seen, [0.0, 40.0]);
}
