// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame skeleton capture during a recording

use std::path::Path;

use tracing::{debug, info};

use super::sidecar::save_frames;
use super::{DetectedPerson, Person, SkeletonFrame};
use crate::backends::camera::{Intrinsics, Resolution};
use crate::errors::SkeletonDataError;

/// Depth frame used to lift 2D joints into camera space
///
/// Joint coordinates are in color pixels; they are scaled onto the depth
/// grid, which assumes both streams share a field of view.
pub struct DepthLookup<'a> {
    pub samples: &'a [u16],
    pub resolution: Resolution,
    pub intrinsics: Intrinsics,
    pub meters_per_unit: f32,
    pub color_size: Resolution,
}

impl DepthLookup<'_> {
    /// Depth in meters under color pixel `(u, v)`, `None` if unmeasured
    pub fn depth_at(&self, u: f32, v: f32) -> Option<(f32, f32, f32)> {
        if self.color_size.width == 0 || self.color_size.height == 0 {
            return None;
        }
        let x = u * self.resolution.width as f32 / self.color_size.width as f32;
        let y = v * self.resolution.height as f32 / self.color_size.height as f32;
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (xi, yi) = (x as u32, y as u32);
        if xi >= self.resolution.width || yi >= self.resolution.height {
            return None;
        }
        let raw = *self
            .samples
            .get((yi * self.resolution.width + xi) as usize)?;
        if raw == 0 {
            return None;
        }
        Some((x, y, raw as f32 * self.meters_per_unit))
    }
}

/// Collects detected persons per recorded frame
#[derive(Debug, Default)]
pub struct SkeletonRecorder {
    frames: Vec<SkeletonFrame>,
}

impl SkeletonRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one frame of detections
    ///
    /// With a depth lookup every joint that lands on a measured pixel also
    /// gets its camera-space position `x`, `y`, `z` and depth `d`.
    pub fn record(&mut self, detections: &[DetectedPerson], depth: Option<&DepthLookup<'_>>) {
        let frame: SkeletonFrame = detections
            .iter()
            .enumerate()
            .map(|(i, detection)| {
                let mut person = Person::from_detection(i as i32, detection);
                if let Some(lookup) = depth {
                    for joint in &mut person.joints {
                        if let Some((x, y, d)) = lookup.depth_at(joint.u, joint.v) {
                            let [bx, by] = lookup.intrinsics.back_projection(x, y);
                            joint.x = Some(bx * d);
                            joint.y = Some(by * d);
                            joint.z = Some(d);
                            joint.d = Some(d);
                        }
                    }
                }
                person
            })
            .collect();
        debug!(frame = self.frames.len(), persons = frame.len(), "Skeleton frame recorded");
        self.frames.push(frame);
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[SkeletonFrame] {
        &self.frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Write the sidecar and start over
    pub fn finish(&mut self, path: &Path) -> Result<usize, SkeletonDataError> {
        save_frames(path, &self.frames)?;
        let count = self.frames.len();
        info!(path = %path.display(), frames = count, "Skeleton sidecar written");
        self.frames.clear();
        Ok(count)
    }
}
