// SPDX-License-Identifier: GPL-3.0-only

//! Live camera adapter
//!
//! Wraps a vendor [`DepthDevice`] and an optional probed color source into a
//! [`DepthCamera`]. Recording writes a raw depth container plus a JPEG
//! sequence into the session directory.

use std::path::Path;
use std::time::Duration;

use image::RgbImage;
use tracing::{debug, info, warn};

use super::device::{ColorProbe, ColorSourceFactory, DepthDevice};
use super::types::*;
use super::{CaptureOptions, DepthCamera};
use crate::constants::recording::{COLOR_DIR_SUFFIX, DEPTH_EXTENSION};
use crate::media::{ColorSequenceWriter, DepthWriter};
use crate::recording::manifest::CameraRecord;

/// Open containers of a recording camera
struct CameraRecorder {
    depth: DepthWriter,
    color: ColorSequenceWriter,
}

pub struct LiveCamera {
    identity: CameraIdentity,
    device: Box<dyn DepthDevice>,
    color: Option<ColorProbe>,
    resolution: Resolution,
    intrinsics: Intrinsics,
    format: DepthPixelFormat,
    meters_per_unit: f32,
    timeout: Duration,
    frame: Vec<u16>,
    recorder: Option<CameraRecorder>,
    /// Color frame stored with the last recorded depth frame
    last_color: Option<RgbImage>,
}

impl LiveCamera {
    /// Wrap an opened device
    ///
    /// Fails when the device delivers depth in a format that cannot be
    /// converted to meters linearly.
    pub fn new(
        identity: CameraIdentity,
        device: Box<dyn DepthDevice>,
        color: Option<ColorProbe>,
        options: &CaptureOptions,
    ) -> BackendResult<Self> {
        let format = device.pixel_format();
        let meters_per_unit = format.meters_per_unit().ok_or_else(|| {
            BackendError::UnexpectedFormat(format!(
                "{} delivers {:?} depth",
                device.description(),
                format
            ))
        })?;
        let resolution = device.resolution();
        let intrinsics = device.calibration().intrinsics(resolution);
        if !intrinsics.is_valid() {
            return Err(BackendError::UnexpectedFormat(format!(
                "{} reports unusable focal lengths fx={} fy={}",
                device.description(),
                intrinsics.fx,
                intrinsics.fy
            )));
        }

        info!(
            camera = %identity.name,
            device = %device.description(),
            %resolution,
            fx = intrinsics.fx,
            fy = intrinsics.fy,
            meters_per_unit,
            "Live camera opened"
        );

        Ok(Self {
            identity,
            device,
            color,
            resolution,
            intrinsics,
            format,
            meters_per_unit,
            timeout: options.frame_wait_timeout,
            frame: vec![0; resolution.pixel_count()],
            recorder: None,
            last_color: None,
        })
    }

    /// Live camera whose color comes from probing `factory`
    pub fn with_color(
        identity: CameraIdentity,
        device: Box<dyn DepthDevice>,
        factory: Box<dyn ColorSourceFactory>,
        options: &CaptureOptions,
    ) -> BackendResult<Self> {
        let probe = ColorProbe::new(factory, options.color_probe_depth, options.color_size);
        Self::new(identity, device, Some(probe), options)
    }

    /// Live camera without any color stream
    pub fn without_color(
        identity: CameraIdentity,
        device: Box<dyn DepthDevice>,
        options: &CaptureOptions,
    ) -> BackendResult<Self> {
        Self::new(identity, device, None, options)
    }
}

/// Wait for a depth frame and check it matches what the device negotiated
fn wait_checked(
    device: &mut dyn DepthDevice,
    timeout: Duration,
    format: DepthPixelFormat,
    resolution: Resolution,
) -> BackendResult<Vec<u16>> {
    let frame = device.wait_for_frame(timeout)?;
    if frame.format != format {
        return Err(BackendError::UnexpectedFormat(format!(
            "expected {:?}, got {:?}",
            format, frame.format
        )));
    }
    if frame.resolution != resolution || frame.data.len() != resolution.pixel_count() {
        return Err(BackendError::UnexpectedFormat(format!(
            "expected {} frame, got {} with {} samples",
            resolution,
            frame.resolution,
            frame.data.len()
        )));
    }
    Ok(frame.data)
}

impl DepthCamera for LiveCamera {
    fn identity(&self) -> &CameraIdentity {
        &self.identity
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    fn meters_per_unit(&self) -> f32 {
        self.meters_per_unit
    }

    fn depth(&mut self) -> BackendResult<Option<&[u16]>> {
        self.frame = wait_checked(
            self.device.as_mut(),
            self.timeout,
            self.format,
            self.resolution,
        )?;

        if let Some(recorder) = self.recorder.as_mut() {
            let index = recorder.depth.frames_written();
            recorder.depth.append(&self.frame)?;
            self.last_color = self.color.as_mut().and_then(ColorProbe::frame);
            if let Some(image) = self.last_color.as_ref() {
                recorder.color.write(index, image)?;
            }
        }

        Ok(Some(&self.frame))
    }

    /// While recording this is the frame saved with the last depth frame
    fn color_frame(&mut self) -> Option<RgbImage> {
        if self.recorder.is_some() {
            return self.last_color.clone();
        }
        self.color.as_mut().and_then(ColorProbe::frame)
    }

    fn restart_color_search(&mut self) {
        if let Some(probe) = self.color.as_mut() {
            probe.restart();
        }
    }

    fn start_recording(
        &mut self,
        recording_root: &Path,
        session_dir_name: &str,
    ) -> BackendResult<CameraRecord> {
        if self.recorder.is_some() {
            return Err(BackendError::RecordingInProgress);
        }

        let session_dir = recording_root.join(session_dir_name);
        std::fs::create_dir_all(&session_dir)?;

        let stem = self.identity.file_stem();
        let depth_file = format!("{}.{}", stem, DEPTH_EXTENSION);
        let depth = DepthWriter::create(
            &session_dir.join(&depth_file),
            self.resolution,
            self.meters_per_unit,
        )?;
        let color = ColorSequenceWriter::create(
            &session_dir.join(format!("{}{}", stem, COLOR_DIR_SUFFIX)),
        )?;
        self.recorder = Some(CameraRecorder { depth, color });
        self.last_color = None;

        info!(camera = %self.identity.name, dir = ?session_dir, "Recording started");

        Ok(CameraRecord::new(
            &self.identity,
            session_dir_name,
            &depth_file,
            self.intrinsics,
            self.meters_per_unit,
            self.resolution,
        ))
    }

    fn save_frame(&mut self) -> BackendResult<()> {
        let Some(recorder) = self.recorder.as_mut() else {
            return Err(BackendError::NoRecordingInProgress);
        };
        let CameraRecorder {
            depth: depth_writer,
            color: color_writer,
        } = recorder;

        let device = self.device.as_mut();
        let color = &mut self.color;
        let last_color = &mut self.last_color;
        let frame = &mut self.frame;
        let (timeout, format, resolution) = (self.timeout, self.format, self.resolution);
        let index = depth_writer.frames_written();

        let (depth_result, color_result) = std::thread::scope(|s| {
            let depth_task = s.spawn(move || -> BackendResult<()> {
                *frame = wait_checked(device, timeout, format, resolution)?;
                depth_writer.append(frame.as_slice())
            });
            let color_task = s.spawn(move || -> BackendResult<()> {
                *last_color = color.as_mut().and_then(ColorProbe::frame);
                match last_color.as_ref() {
                    Some(image) => color_writer.write(index, image),
                    None => Ok(()),
                }
            });
            (
                depth_task
                    .join()
                    .unwrap_or_else(|_| Err(BackendError::Crashed("depth capture".into()))),
                color_task
                    .join()
                    .unwrap_or_else(|_| Err(BackendError::Crashed("color capture".into()))),
            )
        });

        depth_result?;
        if let Err(e) = color_result {
            warn!(camera = %self.identity.name, error = %e, "Color frame not saved");
        }
        Ok(())
    }

    fn stop_recording(&mut self) -> BackendResult<()> {
        let recorder = self
            .recorder
            .take()
            .ok_or(BackendError::NoRecordingInProgress)?;
        self.last_color = None;
        let color_frames = recorder.color.frames_written();
        let frames = recorder.depth.finish()?;
        info!(
            camera = %self.identity.name,
            frames,
            color_frames,
            "Recording stopped"
        );
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }
}

impl Drop for LiveCamera {
    fn drop(&mut self) {
        if self.recorder.is_some() {
            debug!(camera = %self.identity.name, "Closing recording on drop");
            if let Err(e) = self.stop_recording() {
                warn!(camera = %self.identity.name, error = %e, "Failed to close recording");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::device::Calibration;
    use crate::backends::camera::synthetic::{SyntheticColorFactory, SyntheticDepthDevice};
    use crate::media::{ColorSequenceReader, DepthReader};

    fn camera(device: SyntheticDepthDevice, color: bool) -> LiveCamera {
        let identity = CameraIdentity::new(CameraKind::Kinect, 0);
        let options = CaptureOptions::default();
        if color {
            LiveCamera::with_color(
                identity,
                Box::new(device),
                Box::new(SyntheticColorFactory::new(vec![0])),
                &options,
            )
            .unwrap()
        } else {
            LiveCamera::without_color(identity, Box::new(device), &options).unwrap()
        }
    }

    #[test]
    fn test_depth_returns_frame() {
        let mut cam = camera(SyntheticDepthDevice::constant(Resolution::new(3, 2), 1500), false);
        let frame = cam.depth().unwrap().unwrap();
        assert_eq!(frame, &[1500; 6]);
        assert_eq!(cam.meters_per_unit(), 0.001);
    }

    #[test]
    fn test_timeout_is_reported() {
        let device = SyntheticDepthDevice::constant(Resolution::new(2, 2), 1).failing_after(1);
        let mut cam = camera(device, false);
        assert!(cam.depth().is_ok());
        assert!(matches!(cam.depth(), Err(BackendError::Timeout(_))));
    }

    #[test]
    fn test_disparity_device_is_rejected() {
        let device = SyntheticDepthDevice::constant(Resolution::new(2, 2), 1)
            .with_format(DepthPixelFormat::Disparity);
        let result = LiveCamera::without_color(
            CameraIdentity::new(CameraKind::Kinect, 0),
            Box::new(device),
            &CaptureOptions::default(),
        );
        assert!(matches!(result, Err(BackendError::UnexpectedFormat(_))));
    }

    #[test]
    fn test_save_frame_writes_depth_and_color() {
        let root = tempfile::tempdir().unwrap();
        let mut cam = camera(SyntheticDepthDevice::ramp(Resolution::new(4, 4), 500, 2000), true);

        let record = cam.start_recording(root.path(), "Session_a").unwrap();
        assert_eq!(record.file_name, "Session_a/Kinect_Camera_0.depth");
        assert!(matches!(
            cam.start_recording(root.path(), "Session_a"),
            Err(BackendError::RecordingInProgress)
        ));

        cam.save_frame().unwrap();
        cam.save_frame().unwrap();
        cam.depth().unwrap();
        cam.stop_recording().unwrap();
        assert!(!cam.is_recording());

        let reader = DepthReader::open(&record.depth_path(root.path())).unwrap();
        assert_eq!(reader.frame_count(), 3);

        let colors =
            ColorSequenceReader::open(&root.path().join("Session_a/Kinect_Camera_0_color")).unwrap();
        assert!(colors.frame(0).is_some());
        assert!(colors.frame(2).is_some());
    }

    #[test]
    fn test_color_frame_while_recording_is_the_saved_one() {
        let root = tempfile::tempdir().unwrap();
        let mut cam = LiveCamera::with_color(
            CameraIdentity::new(CameraKind::Kinect, 0),
            Box::new(SyntheticDepthDevice::constant(Resolution::new(4, 4), 1000)),
            Box::new(SyntheticColorFactory::new(vec![0]).sequenced()),
            &CaptureOptions::default(),
        )
        .unwrap();

        cam.start_recording(root.path(), "Session_b").unwrap();
        let mut seen = Vec::new();
        for _ in 0..2 {
            cam.depth().unwrap();
            seen.push(cam.color_frame().unwrap().get_pixel(0, 0)[0]);
            // Asking again does not grab another frame
            assert_eq!(cam.color_frame().unwrap().get_pixel(0, 0)[0], seen[seen.len() - 1]);
        }
        cam.stop_recording().unwrap();
        assert_eq!(seen, [0, 40]);

        let colors =
            ColorSequenceReader::open(&root.path().join("Session_b/Kinect_Camera_0_color")).unwrap();
        for (index, red) in seen.iter().enumerate() {
            let saved = colors.frame(index).unwrap().get_pixel(0, 0)[0];
            assert!((saved as i32 - *red as i32).abs() < 12, "frame {}: {}", index, saved);
        }

        // Outside a recording every request grabs
        assert_eq!(cam.color_frame().unwrap().get_pixel(0, 0)[0], 80);
    }

    #[test]
    fn test_zero_field_of_view_is_rejected() {
        let device = SyntheticDepthDevice::constant(Resolution::new(2, 2), 1).with_calibration(
            Calibration::FieldOfView {
                horizontal: 0.0,
                vertical: 0.0,
            },
        );
        let result = LiveCamera::without_color(
            CameraIdentity::new(CameraKind::RealSense, 0),
            Box::new(device),
            &CaptureOptions::default(),
        );
        assert!(matches!(result, Err(BackendError::UnexpectedFormat(_))));
    }

    #[test]
    fn test_save_frame_requires_recording() {
        let mut cam = camera(SyntheticDepthDevice::constant(Resolution::new(2, 2), 1), false);
        assert!(matches!(
            cam.save_frame(),
            Err(BackendError::NoRecordingInProgress)
        ));
        assert!(matches!(
            cam.stop_recording(),
            Err(BackendError::NoRecordingInProgress)
        ));
    }
}
