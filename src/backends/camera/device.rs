// SPDX-License-Identifier: GPL-3.0-only

//! Vendor device boundary
//!
//! Hardware SDK bindings plug in here. A [`DepthDevice`] delivers raw depth
//! frames with a blocking, timed wait. Color comes from a separate
//! [`ColorSource`] which is found by probing indices through a
//! [`ColorSourceFactory`], the way webcams are enumerated by index.
//!
//! ```text
//!   DepthDevice ──wait_for_frame──┐
//!                                 ├──► LiveCamera ──► DepthCamera
//!   ColorSourceFactory ──probe────┘
//!        └─► ColorSource (cached once found)
//! ```

use std::time::Duration;

use image::RgbImage;
use tracing::{debug, info, warn};

use super::types::{BackendResult, DepthFrame, DepthPixelFormat, Intrinsics, Resolution};

/// How a device reports its optics
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Calibration {
    /// Field of view in radians, principal point at the image center
    FieldOfView { horizontal: f32, vertical: f32 },
    /// Full intrinsics from the SDK
    Intrinsics(Intrinsics),
}

impl Calibration {
    /// Resolve to intrinsics for the given depth resolution
    pub fn intrinsics(&self, resolution: Resolution) -> Intrinsics {
        match *self {
            Calibration::FieldOfView {
                horizontal,
                vertical,
            } => Intrinsics::from_field_of_view(resolution, horizontal, vertical),
            Calibration::Intrinsics(k) => k,
        }
    }
}

/// A depth sensor exposed by a vendor SDK
pub trait DepthDevice: Send {
    /// Human readable device description (serial, URI, path)
    fn description(&self) -> String;

    /// Negotiated depth resolution
    fn resolution(&self) -> Resolution;

    /// Negotiated pixel format; every frame must carry the same format
    fn pixel_format(&self) -> DepthPixelFormat;

    /// Optics of the depth stream
    fn calibration(&self) -> Calibration;

    /// Block until the next frame arrives or the timeout elapses
    fn wait_for_frame(&mut self, timeout: Duration) -> BackendResult<DepthFrame>;
}

/// An opened color stream
pub trait ColorSource: Send {
    /// Grab and decode the next frame
    fn grab(&mut self) -> BackendResult<RgbImage>;
}

/// Opens color sources by index
pub trait ColorSourceFactory: Send {
    /// Try to open the source at `index`, `None` when nothing usable is there
    fn open(&mut self, index: u32, size: Resolution) -> Option<Box<dyn ColorSource>>;
}

enum ProbeState {
    Searching,
    Found {
        index: u32,
        source: Box<dyn ColorSource>,
    },
    Exhausted,
}

/// Finds a color source once and keeps it
///
/// Indices `0..depth` are tried on the first request only. When none opens,
/// a single warning is logged and later requests return `None` without
/// probing again until [`ColorProbe::restart`] is called.
pub struct ColorProbe {
    factory: Box<dyn ColorSourceFactory>,
    depth: u32,
    size: Resolution,
    state: ProbeState,
}

impl ColorProbe {
    pub fn new(factory: Box<dyn ColorSourceFactory>, depth: u32, size: Resolution) -> Self {
        Self {
            factory,
            depth,
            size,
            state: ProbeState::Searching,
        }
    }

    /// Latest color frame, probing for a source if none was found yet
    pub fn frame(&mut self) -> Option<RgbImage> {
        if matches!(self.state, ProbeState::Searching) {
            self.probe();
        }

        match &mut self.state {
            ProbeState::Found { index, source } => match source.grab() {
                Ok(image) => Some(image),
                Err(e) => {
                    debug!(index = *index, error = %e, "Color grab failed");
                    None
                }
            },
            ProbeState::Searching | ProbeState::Exhausted => None,
        }
    }

    /// Index of the cached source
    pub fn found_index(&self) -> Option<u32> {
        match &self.state {
            ProbeState::Found { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Whether probing gave up
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, ProbeState::Exhausted)
    }

    /// Forget the cached source and probe again on the next request
    pub fn restart(&mut self) {
        info!("Restarting color source search");
        self.state = ProbeState::Searching;
    }

    fn probe(&mut self) {
        for index in 0..self.depth {
            if let Some(source) = self.factory.open(index, self.size) {
                info!(index, "Color source found");
                self.state = ProbeState::Found { index, source };
                return;
            }
            debug!(index, "No color source at index");
        }
        warn!(searched = self.depth, "No suitable color camera found");
        self.state = ProbeState::Exhausted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::synthetic::SyntheticColorFactory;

    #[test]
    fn test_probe_caches_found_source() {
        let factory = SyntheticColorFactory::new(vec![2]);
        let opens = factory.open_attempts();
        let mut probe = ColorProbe::new(Box::new(factory), 4, Resolution::new(8, 6));

        assert!(probe.frame().is_some());
        assert_eq!(probe.found_index(), Some(2));
        assert_eq!(opens.load(std::sync::atomic::Ordering::SeqCst), 3);

        // Cached: no further open attempts
        assert!(probe.frame().is_some());
        assert_eq!(opens.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[test]
    fn test_probe_gives_up_once() {
        let factory = SyntheticColorFactory::new(vec![]);
        let opens = factory.open_attempts();
        let mut probe = ColorProbe::new(Box::new(factory), 3, Resolution::new(8, 6));

        assert!(probe.frame().is_none());
        assert!(probe.is_exhausted());
        assert!(probe.frame().is_none());
        assert_eq!(
            opens.load(std::sync::atomic::Ordering::SeqCst),
            3,
            "Exhausted probe must not retry every frame"
        );

        probe.restart();
        assert!(probe.frame().is_none());
        assert_eq!(opens.load(std::sync::atomic::Ordering::SeqCst), 6);
    }

    #[test]
    fn test_calibration_resolves() {
        let k = Intrinsics::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(Calibration::Intrinsics(k).intrinsics(Resolution::new(10, 10)), k);
    }
}
