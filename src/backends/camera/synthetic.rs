// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic depth and color sources
//!
//! Deterministic devices for running the pipeline without hardware. They
//! back the `--synthetic` CLI mode and the test suites.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{Rgb, RgbImage};
use tracing::debug;

use super::device::{Calibration, ColorSource, ColorSourceFactory, DepthDevice};
use super::live::LiveCamera;
use super::types::*;
use super::{CaptureOptions, DepthCamera, DeviceProvider};

/// Depth pattern produced by [`SyntheticDepthDevice`]
#[derive(Debug, Clone, Copy)]
pub enum SyntheticPattern {
    /// Every pixel has the same value
    Constant(u16),
    /// Values grow linearly from `near` at the first pixel to `far` at the last
    Ramp { near: u16, far: u16 },
}

/// Depth device generating frames from a pattern
#[derive(Debug, Clone)]
pub struct SyntheticDepthDevice {
    resolution: Resolution,
    pattern: SyntheticPattern,
    format: DepthPixelFormat,
    calibration: Calibration,
    fail_after: Option<usize>,
    delivered: usize,
}

impl SyntheticDepthDevice {
    pub fn new(resolution: Resolution, pattern: SyntheticPattern) -> Self {
        Self {
            resolution,
            pattern,
            format: DepthPixelFormat::Millimeter,
            calibration: Calibration::Intrinsics(Intrinsics::kinect(resolution)),
            fail_after: None,
            delivered: 0,
        }
    }

    pub fn constant(resolution: Resolution, value: u16) -> Self {
        Self::new(resolution, SyntheticPattern::Constant(value))
    }

    pub fn ramp(resolution: Resolution, near: u16, far: u16) -> Self {
        Self::new(resolution, SyntheticPattern::Ramp { near, far })
    }

    /// Time out on every wait after `frames` frames were delivered
    pub fn failing_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    pub fn with_format(mut self, format: DepthPixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    fn render(&self) -> Vec<u16> {
        let count = self.resolution.pixel_count();
        match self.pattern {
            SyntheticPattern::Constant(value) => vec![value; count],
            SyntheticPattern::Ramp { near, far } => {
                let span = far as f32 - near as f32;
                let last = count.saturating_sub(1).max(1) as f32;
                (0..count)
                    .map(|i| (near as f32 + span * i as f32 / last).round() as u16)
                    .collect()
            }
        }
    }
}

impl DepthDevice for SyntheticDepthDevice {
    fn description(&self) -> String {
        format!("synthetic {}", self.resolution)
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn pixel_format(&self) -> DepthPixelFormat {
        self.format
    }

    fn calibration(&self) -> Calibration {
        self.calibration
    }

    fn wait_for_frame(&mut self, timeout: Duration) -> BackendResult<DepthFrame> {
        if self.fail_after.is_some_and(|limit| self.delivered >= limit) {
            return Err(BackendError::Timeout(format!(
                "no synthetic frame within {:?}",
                timeout
            )));
        }
        self.delivered += 1;
        Ok(DepthFrame {
            resolution: self.resolution,
            format: self.format,
            data: self.render(),
        })
    }
}

/// Solid color source
///
/// A sequenced source shifts the red channel by 40 on every grab, so each
/// grabbed frame can be told apart.
pub struct SyntheticColorSource {
    image: RgbImage,
    grabs: Option<u8>,
}

impl ColorSource for SyntheticColorSource {
    fn grab(&mut self) -> BackendResult<RgbImage> {
        if let Some(grabs) = self.grabs.as_mut() {
            let shade = grabs.wrapping_mul(40);
            *grabs = grabs.wrapping_add(1);
            for pixel in self.image.pixels_mut() {
                pixel.0[0] = shade;
            }
        }
        Ok(self.image.clone())
    }
}

/// Color factory where only the listed indices open
pub struct SyntheticColorFactory {
    available: Vec<u32>,
    attempts: Arc<AtomicUsize>,
    sequenced: bool,
}

impl SyntheticColorFactory {
    pub fn new(available: Vec<u32>) -> Self {
        Self {
            available,
            attempts: Arc::new(AtomicUsize::new(0)),
            sequenced: false,
        }
    }

    /// Sources opened from here change color on every grab
    pub fn sequenced(mut self) -> Self {
        self.sequenced = true;
        self
    }

    /// Counter of `open` calls, shared with the factory
    pub fn open_attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

impl ColorSourceFactory for SyntheticColorFactory {
    fn open(&mut self, index: u32, size: Resolution) -> Option<Box<dyn ColorSource>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.available.contains(&index) {
            return None;
        }
        let shade = (index as u8).wrapping_mul(40);
        Some(Box::new(SyntheticColorSource {
            image: RgbImage::from_pixel(size.width, size.height, Rgb([shade, 128, 200])),
            grabs: self.sequenced.then_some(0),
        }))
    }
}

/// Provider handing out a fixed number of synthetic cameras
pub struct SyntheticProvider {
    kind: CameraKind,
    count: usize,
    resolution: Resolution,
}

impl SyntheticProvider {
    pub fn new(kind: CameraKind, count: usize, resolution: Resolution) -> Self {
        Self {
            kind,
            count,
            resolution,
        }
    }
}

impl DeviceProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open_all(&mut self, first_id: u32, options: &CaptureOptions) -> Vec<Box<dyn DepthCamera>> {
        (0..self.count as u32)
            .filter_map(|n| {
                let id = first_id + n;
                // Each camera sees a different distance range
                let near = 800 + 400 * n as u16;
                let device = SyntheticDepthDevice::ramp(self.resolution, near, near + 1500);
                let camera = LiveCamera::with_color(
                    CameraIdentity::new(self.kind, id),
                    Box::new(device),
                    Box::new(SyntheticColorFactory::new(vec![0])),
                    options,
                );
                match camera {
                    Ok(camera) => Some(Box::new(camera) as Box<dyn DepthCamera>),
                    Err(e) => {
                        debug!(id, error = %e, "Synthetic camera rejected");
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_endpoints() {
        let mut device = SyntheticDepthDevice::ramp(Resolution::new(3, 3), 1000, 2000);
        let frame = device.wait_for_frame(Duration::ZERO).unwrap();
        assert_eq!(frame.data[0], 1000);
        assert_eq!(frame.data[8], 2000);
        assert_eq!(frame.data.len(), 9);
    }

    #[test]
    fn test_failing_after() {
        let mut device = SyntheticDepthDevice::constant(Resolution::new(1, 1), 5).failing_after(2);
        assert!(device.wait_for_frame(Duration::ZERO).is_ok());
        assert!(device.wait_for_frame(Duration::ZERO).is_ok());
        assert!(device.wait_for_frame(Duration::ZERO).is_err());
    }

    #[test]
    fn test_sequenced_color_changes_per_grab() {
        let mut factory = SyntheticColorFactory::new(vec![0]).sequenced();
        let mut source = factory.open(0, Resolution::new(2, 2)).unwrap();
        let reds: Vec<u8> = (0..3).map(|_| source.grab().unwrap().get_pixel(0, 0)[0]).collect();
        assert_eq!(reds, [0, 40, 80]);
    }
}
