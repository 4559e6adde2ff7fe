// SPDX-License-Identifier: GPL-3.0-only

//! Skeleton detection, per-frame sidecar data and correction support
//!
//! Detectors only see a color image and return 2D keypoints with a
//! confidence score. Depth lookup, persistence and review happen here.

pub mod errors_catalog;
pub mod overlay;
pub mod recorder;
pub mod sidecar;

pub use errors_catalog::{ErrorCatalog, ErrorCategory};
pub use overlay::{draw_skeletons, joint_color};
pub use recorder::{DepthLookup, SkeletonRecorder};
pub use sidecar::SkeletonData;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;

/// One keypoint as returned by a detector, in color image pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub u: f32,
    pub v: f32,
    pub score: f32,
}

/// Keypoints of one detected person, indexed by joint id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedPerson {
    pub keypoints: Vec<Keypoint>,
}

/// Pose estimation backend
pub trait SkeletonDetector: Send {
    fn name(&self) -> &str;

    /// Persons visible in `image`
    fn detect(&mut self, image: &RgbImage) -> AppResult<Vec<DetectedPerson>>;
}

/// Recorded joint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawJoint")]
pub struct Joint {
    #[serde(rename = "i")]
    pub index: u32,
    pub u: f32,
    pub v: f32,
    pub score: f32,
    pub error: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<f32>,
}

/// Accepted on-disk joint, including the legacy `valid` flag
#[derive(Deserialize)]
struct RawJoint {
    i: u32,
    #[serde(default)]
    u: f32,
    #[serde(default)]
    v: f32,
    #[serde(default)]
    score: f32,
    error: Option<i32>,
    valid: Option<bool>,
    x: Option<f32>,
    y: Option<f32>,
    z: Option<f32>,
    d: Option<f32>,
}

fn legacy_error(error: Option<i32>, valid: Option<bool>) -> i32 {
    match (error, valid) {
        (Some(e), _) => e,
        (None, Some(false)) => 1,
        _ => 0,
    }
}

impl From<RawJoint> for Joint {
    fn from(raw: RawJoint) -> Self {
        Self {
            index: raw.i,
            u: raw.u,
            v: raw.v,
            score: raw.score,
            error: legacy_error(raw.error, raw.valid),
            x: raw.x,
            y: raw.y,
            z: raw.z,
            d: raw.d,
        }
    }
}

impl Joint {
    pub fn new(index: u32, keypoint: &Keypoint) -> Self {
        Self {
            index,
            u: keypoint.u,
            v: keypoint.v,
            score: keypoint.score,
            error: 0,
            x: None,
            y: None,
            z: None,
            d: None,
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.error != 0
    }
}

/// Recorded person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPerson")]
pub struct Person {
    #[serde(rename = "Index")]
    pub index: i32,
    pub error: i32,
    #[serde(rename = "Skeleton")]
    pub joints: Vec<Joint>,
}

#[derive(Deserialize)]
struct RawPerson {
    #[serde(rename = "Index", alias = "id")]
    index: i32,
    error: Option<i32>,
    valid: Option<bool>,
    #[serde(rename = "Skeleton", default)]
    joints: Vec<Joint>,
}

impl From<RawPerson> for Person {
    fn from(raw: RawPerson) -> Self {
        Self {
            index: raw.index,
            error: legacy_error(raw.error, raw.valid),
            joints: raw.joints,
        }
    }
}

impl Person {
    pub fn from_detection(index: i32, detection: &DetectedPerson) -> Self {
        Self {
            index,
            error: 0,
            joints: detection
                .keypoints
                .iter()
                .enumerate()
                .map(|(i, k)| Joint::new(i as u32, k))
                .collect(),
        }
    }
}

/// Persons of one frame
pub type SkeletonFrame = Vec<Person>;

/// Detector that reports one upright figure in the middle of every image
///
/// Stands in for a pose network in `--synthetic` runs and tests.
#[derive(Debug, Clone)]
pub struct CenterDetector {
    joints: usize,
}

impl CenterDetector {
    pub fn new(joints: usize) -> Self {
        Self { joints }
    }
}

impl SkeletonDetector for CenterDetector {
    fn name(&self) -> &str {
        "center"
    }

    fn detect(&mut self, image: &RgbImage) -> AppResult<Vec<DetectedPerson>> {
        let (w, h) = image.dimensions();
        if self.joints == 0 || w == 0 || h == 0 {
            return Ok(Vec::new());
        }
        let step = h as f32 / (self.joints + 1) as f32;
        let keypoints = (0..self.joints)
            .map(|i| Keypoint {
                u: w as f32 / 2.0,
                v: step * (i + 1) as f32,
                score: 1.0 - i as f32 / self.joints as f32,
            })
            .collect();
        Ok(vec![DetectedPerson { keypoints }])
    }
}
