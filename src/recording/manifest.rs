// SPDX-License-Identifier: GPL-3.0-only

//! Recording manifest
//!
//! One JSON document per recorded session:
//!
//! ```json
//! {
//!   "Version": 2,
//!   "Name": "Session 2024-05-01T10:11:12",
//!   "Duration": 12.5,
//!   "Frames": 375,
//!   "Cameras": [{"Name": "Kinect Camera 0", "Type": "Kinect",
//!                "FileName": "Session_2024-05-01T10-11-12/Kinect_Camera_0.depth",
//!                "Fx": 594.2, "Fy": 591.0, "Cx": 339.5, "Cy": 242.7,
//!                "MeterPerUnit": 0.001, "Width": 640, "Height": 480}],
//!   "Rotation": {"Roll": 0.0, "Pitch": 0.0, "Yaw": 0.0},
//!   "Translation": {"X": 0.0, "Y": 0.0, "Z": 0.0},
//!   "Skeleton": "Session_2024-05-01T10-11-12/Skeleton.json",
//!   "Session Parameters": {"Sitting": true, ...}
//! }
//! ```
//!
//! Manifests written before `Version` existed carry no `Width`/`Height`;
//! the playback container header supplies them instead.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backends::camera::{CameraIdentity, CameraKind, Intrinsics, Resolution};
use crate::constants::recording::MANIFEST_VERSION;
use crate::errors::ManifestError;
use crate::session::params::Environment;
use crate::storage;

/// One recorded camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    #[serde(rename = "Name")]
    pub name: String,
    /// Camera family; unknown values are kept so the manifest still loads
    #[serde(rename = "Type")]
    pub kind: String,
    /// Depth container path relative to the recording root
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "Fx")]
    pub fx: f32,
    #[serde(rename = "Fy")]
    pub fy: f32,
    #[serde(rename = "Cx")]
    pub cx: f32,
    #[serde(rename = "Cy")]
    pub cy: f32,
    #[serde(rename = "MeterPerUnit")]
    pub meters_per_unit: f32,
    #[serde(rename = "Width", default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(rename = "Height", default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl CameraRecord {
    /// Record for a camera about to write into `session_dir_name`
    pub fn new(
        identity: &CameraIdentity,
        session_dir_name: &str,
        file_name: &str,
        intrinsics: Intrinsics,
        meters_per_unit: f32,
        resolution: Resolution,
    ) -> Self {
        Self {
            name: identity.name.clone(),
            kind: identity.kind.as_str().to_string(),
            file_name: format!("{}/{}", session_dir_name, file_name),
            fx: intrinsics.fx,
            fy: intrinsics.fy,
            cx: intrinsics.cx,
            cy: intrinsics.cy,
            meters_per_unit,
            width: Some(resolution.width),
            height: Some(resolution.height),
        }
    }

    /// Camera family, `None` when this build cannot play it back
    pub fn camera_kind(&self) -> Option<CameraKind> {
        CameraKind::from_manifest_type(&self.kind)
    }

    pub fn intrinsics(&self) -> Intrinsics {
        Intrinsics::new(self.fx, self.fy, self.cx, self.cy)
    }

    pub fn resolution(&self) -> Option<Resolution> {
        Some(Resolution::new(self.width?, self.height?))
    }

    /// Absolute path of the depth container
    pub fn depth_path(&self, recording_root: &Path) -> PathBuf {
        recording_root.join(&self.file_name)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.file_name.is_empty() {
            return Err(ManifestError::Invalid(format!(
                "camera {} has no file name",
                self.name
            )));
        }
        if !self.intrinsics().is_valid() {
            return Err(ManifestError::Invalid(format!(
                "camera {} has unusable focal lengths",
                self.name
            )));
        }
        if !(self.meters_per_unit.is_finite() && self.meters_per_unit > 0.0) {
            return Err(ManifestError::Invalid(format!(
                "camera {} has an invalid depth scale",
                self.name
            )));
        }
        Ok(())
    }
}

/// Orientation of the fused cloud, in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    #[serde(rename = "Roll")]
    pub roll: f32,
    #[serde(rename = "Pitch")]
    pub pitch: f32,
    #[serde(rename = "Yaw")]
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    #[serde(rename = "X")]
    pub x: f32,
    #[serde(rename = "Y")]
    pub y: f32,
    #[serde(rename = "Z")]
    pub z: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingManifest {
    #[serde(rename = "Version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(rename = "Name")]
    pub name: String,
    /// Recorded seconds
    #[serde(rename = "Duration")]
    pub duration: f64,
    #[serde(rename = "Frames")]
    pub frames: u64,
    #[serde(rename = "Cameras")]
    pub cameras: Vec<CameraRecord>,
    #[serde(rename = "Rotation", default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    #[serde(rename = "Translation", default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<Translation>,
    /// Skeleton sidecar path relative to the recording root
    #[serde(rename = "Skeleton", default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<String>,
    #[serde(rename = "Session Parameters", default)]
    pub session_parameters: Environment,
}

impl RecordingManifest {
    pub fn new(name: impl Into<String>, duration: f64, frames: u64) -> Self {
        Self {
            version: Some(MANIFEST_VERSION),
            name: name.into(),
            duration,
            frames,
            cameras: Vec::new(),
            rotation: None,
            translation: None,
            skeleton: None,
            session_parameters: Environment::default(),
        }
    }

    /// Read and validate a manifest
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let manifest: Self = serde_json::from_str(&text).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        manifest.validate()?;
        debug!(path = ?path, name = %manifest.name, "Manifest loaded");
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::Invalid("empty session name".to_string()));
        }
        if !(self.duration.is_finite() && self.duration >= 0.0) {
            return Err(ManifestError::Invalid(format!(
                "invalid duration {}",
                self.duration
            )));
        }
        if let Some(version) = self.version
            && version > MANIFEST_VERSION
        {
            return Err(ManifestError::Invalid(format!(
                "manifest version {} is newer than supported {}",
                version, MANIFEST_VERSION
            )));
        }
        self.cameras.iter().try_for_each(CameraRecord::validate)
    }

    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let io_err = |e: std::io::Error| ManifestError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| ManifestError::Invalid(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, text).map_err(io_err)?;
        debug!(path = ?path, "Manifest written");
        Ok(())
    }

    /// File-safe directory name of this session
    pub fn session_dir_name(&self) -> String {
        storage::file_safe_name(&self.name)
    }

    /// Where the manifest of `session_name` lives below the recording root
    pub fn path_for(recording_root: &Path, session_name: &str) -> PathBuf {
        let dir = storage::file_safe_name(session_name);
        recording_root.join(&dir).join(format!("{}.json", dir))
    }

    /// Time the session started, taken from its name
    pub fn recorded_at(&self) -> Option<NaiveDateTime> {
        storage::parse_session_time(&self.name)
    }

    /// Absolute sidecar path, when skeleton data exists
    pub fn skeleton_path(&self, recording_root: &Path) -> Option<PathBuf> {
        self.skeleton.as_ref().map(|s| recording_root.join(s))
    }
}
