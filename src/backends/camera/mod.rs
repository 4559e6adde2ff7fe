// SPDX-License-Identifier: GPL-3.0-only

//! Depth camera abstraction
//!
//! Every camera the session works with, live or replayed, implements
//! [`DepthCamera`]. The session owns them through a [`CameraSet`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Session / Cloud    │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │      CameraSet      │  ← Ownership, enable/select flags, disabling
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  DepthCamera Trait  │  ← Common interface
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!  ┌─────────┐ ┌──────────┐
//!  │  Live   │ │ Playback │
//!  └────┬────┘ └────┬─────┘
//!       │           │
//!  DepthDevice   depth container
//!  ColorSource   color sequence
//! ```

pub mod device;
pub mod live;
pub mod playback;
pub mod synthetic;
pub mod types;
#[cfg(feature = "v4l2")]
pub mod v4l2_kinect;

pub use device::{Calibration, ColorProbe, ColorSource, ColorSourceFactory, DepthDevice};
pub use live::LiveCamera;
pub use playback::PlaybackCamera;
pub use types::*;

use std::path::Path;
use std::time::Duration;

use image::RgbImage;
use tracing::{error, info};

use crate::recording::manifest::CameraRecord;

/// Complete depth camera trait
///
/// Implemented by live hardware adapters and by playback cameras reading a
/// recorded container. Dropping a camera releases its device or file.
pub trait DepthCamera: Send {
    // ===== Identity =====

    /// Family, numeric id and display name
    fn identity(&self) -> &CameraIdentity;

    /// Depth frame size
    fn resolution(&self) -> Resolution;

    /// Pinhole intrinsics of the depth stream
    fn intrinsics(&self) -> Intrinsics;

    /// Meters represented by one raw depth unit
    fn meters_per_unit(&self) -> f32;

    // ===== Frames =====

    /// Current raw depth frame, row-major in sensor orientation
    ///
    /// # Returns
    /// * `Ok(Some(samples))` - A frame of `resolution().pixel_count()` samples
    /// * `Ok(None)` - No frame available right now
    /// * `Err(BackendError)` - Timeout or unexpected format; the caller disables the camera
    ///
    /// While recording, live cameras also append the frame (and a color frame)
    /// to their containers.
    fn depth(&mut self) -> BackendResult<Option<&[u16]>>;

    /// Latest decoded color frame
    fn color_frame(&mut self) -> Option<RgbImage>;

    /// Forget a cached color source and probe again
    fn restart_color_search(&mut self) {}

    // ===== Recording =====

    /// Start writing containers below `<recording_root>/<session_dir_name>/`
    ///
    /// # Returns
    /// The manifest entry describing the files being written
    fn start_recording(
        &mut self,
        recording_root: &Path,
        session_dir_name: &str,
    ) -> BackendResult<CameraRecord>;

    /// Capture one depth and one color frame concurrently and append both
    fn save_frame(&mut self) -> BackendResult<()>;

    /// Flush and close the containers
    fn stop_recording(&mut self) -> BackendResult<()>;

    fn is_recording(&self) -> bool;

    /// Whether frames come from disk
    fn is_playback(&self) -> bool {
        false
    }
}

/// Capture settings shared by every live camera
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    /// Longest wait for a depth frame
    pub frame_wait_timeout: Duration,
    /// Color indices probed before giving up
    pub color_probe_depth: u32,
    /// Requested color frame size
    pub color_size: Resolution,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            frame_wait_timeout: crate::constants::timing::FRAME_WAIT_TIMEOUT,
            color_probe_depth: crate::constants::color::DEFAULT_PROBE_DEPTH,
            color_size: Resolution::new(
                crate::constants::color::DEFAULT_WIDTH,
                crate::constants::color::DEFAULT_HEIGHT,
            ),
        }
    }
}

/// Enumerates and opens the cameras of one family
pub trait DeviceProvider: Send {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Open every connected device, numbering them from `first_id`
    ///
    /// Devices that fail to open are logged and skipped.
    fn open_all(&mut self, first_id: u32, options: &CaptureOptions) -> Vec<Box<dyn DepthCamera>>;
}

/// A camera together with its session flags
pub struct CameraSlot {
    camera: Box<dyn DepthCamera>,
    enabled: bool,
    selected: bool,
}

impl CameraSlot {
    pub fn camera(&self) -> &dyn DepthCamera {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> &mut dyn DepthCamera {
        self.camera.as_mut()
    }

    /// Whether frames are pulled from this camera
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether this camera is part of the next recording
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Disable after a fatal error; the camera stays listed
    pub fn disable(&mut self, reason: &BackendError) {
        error!(
            camera = %self.camera.identity().name,
            error = %reason,
            "Disabling camera"
        );
        self.enabled = false;
    }
}

/// Cameras owned by the session, in stable order
///
/// The order defines each camera's range in the point cloud buffer.
#[derive(Default)]
pub struct CameraSet {
    slots: Vec<CameraSlot>,
}

impl CameraSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a camera, enabled and selected for recording
    pub fn push(&mut self, camera: Box<dyn DepthCamera>) {
        info!(
            camera = %camera.identity().name,
            resolution = %camera.resolution(),
            "Camera added"
        );
        self.slots.push(CameraSlot {
            camera,
            enabled: true,
            selected: true,
        });
    }

    /// Open every device of every provider with consecutive ids
    pub fn open_from(
        &mut self,
        providers: &mut [Box<dyn DeviceProvider>],
        options: &CaptureOptions,
    ) -> usize {
        let before = self.slots.len();
        for provider in providers.iter_mut() {
            let first_id = self.slots.len() as u32;
            let cameras = provider.open_all(first_id, options);
            info!(provider = provider.name(), count = cameras.len(), "Cameras opened");
            for camera in cameras {
                self.push(camera);
            }
        }
        self.slots.len() - before
    }

    /// Drop every camera, releasing devices and files
    pub fn clear(&mut self) {
        if !self.slots.is_empty() {
            info!(count = self.slots.len(), "Releasing cameras");
        }
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CameraSlot> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut CameraSlot> {
        self.slots.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CameraSlot> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, CameraSlot> {
        self.slots.iter_mut()
    }

    pub fn enabled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.enabled).count()
    }

    /// Whether any camera is selected for recording
    pub fn any_selected(&self) -> bool {
        self.slots.iter().any(|s| s.selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::{SyntheticDepthDevice, SyntheticProvider};

    #[test]
    fn test_open_from_numbers_cameras_consecutively() {
        let mut providers: Vec<Box<dyn DeviceProvider>> = vec![
            Box::new(SyntheticProvider::new(CameraKind::RealSense, 2, Resolution::new(4, 3))),
            Box::new(SyntheticProvider::new(CameraKind::Orbbec, 1, Resolution::new(2, 2))),
        ];
        let mut set = CameraSet::new();
        assert_eq!(set.open_from(&mut providers, &CaptureOptions::default()), 3);

        let names: Vec<_> = set.iter().map(|s| s.camera().identity().name.clone()).collect();
        assert_eq!(
            names,
            ["RealSense Camera 0", "RealSense Camera 1", "Orbbec Camera 2"]
        );
        assert!(set.iter().all(|s| s.is_enabled() && s.is_selected()));
    }

    #[test]
    fn test_disable_keeps_camera_listed() {
        let mut set = CameraSet::new();
        let device = SyntheticDepthDevice::constant(Resolution::new(2, 2), 1000);
        set.push(Box::new(LiveCamera::without_color(
            CameraIdentity::new(CameraKind::Kinect, 0),
            Box::new(device),
            &CaptureOptions::default(),
        ).unwrap()));

        let slot = set.get_mut(0).unwrap();
        slot.disable(&BackendError::Timeout("test".into()));
        assert_eq!(set.len(), 1);
        assert_eq!(set.enabled_count(), 0);

        set.clear();
        assert!(set.is_empty());
    }
}
