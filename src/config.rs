// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `<config dir>/depthfuse/config.json`. Missing fields
//! take their defaults, so older files keep loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backends::camera::{CaptureOptions, Resolution};
use crate::constants::{APP_ID, CONFIG_FILE_NAME, color, point_cloud, skeleton, timing};
use crate::errors::{AppError, AppResult};
use crate::pointcloud::{Colormap, PixelOrder, PointCloudOptions};
use crate::session::params::SessionParameters;
use crate::storage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one subdirectory per recorded session
    pub recording_root: PathBuf,
    /// Longest wait for a depth frame before the camera is disabled
    pub frame_wait_timeout_ms: u64,
    /// Color device indices probed per depth camera
    pub color_probe_depth: u32,
    pub color_width: u32,
    pub color_height: u32,
    /// Depth colormap of the point cloud
    pub colormap: Colormap,
    /// Orientation of depth rows in the point cloud
    pub pixel_order: PixelOrder,
    pub cube_half_width_per_meter: f32,
    /// Joints at or below this score count as uncertain
    pub score_threshold: f32,
    /// Draw uncertain joints too
    pub show_uncertainty: bool,
    /// Defaults for new recording sessions
    pub session: SessionParameters,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recording_root: storage::default_recording_root(),
            frame_wait_timeout_ms: timing::FRAME_WAIT_TIMEOUT.as_millis() as u64,
            color_probe_depth: color::DEFAULT_PROBE_DEPTH,
            color_width: color::DEFAULT_WIDTH,
            color_height: color::DEFAULT_HEIGHT,
            colormap: Colormap::default(),
            pixel_order: PixelOrder::default(),
            cube_half_width_per_meter: point_cloud::CUBE_HALF_WIDTH_PER_METER,
            score_threshold: skeleton::DEFAULT_SCORE_THRESHOLD,
            show_uncertainty: false,
            session: SessionParameters::default(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_ID).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No configuration directory, using defaults");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = ?path, "No configuration file, using defaults");
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => {
                info!(path = ?path, "Configuration loaded");
                config
            }
            Err(e) => {
                warn!(error = %e, "Failed to load configuration, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config: Self = serde_json::from_str(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        config.sanitize();
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = ?path, "Configuration saved");
        Ok(())
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("no configuration directory".to_string()))?;
        self.save_to(&path)
    }

    /// Bring values into range
    pub fn sanitize(&mut self) {
        self.session.clamp();
        self.score_threshold = self.score_threshold.clamp(0.0, 1.0);
        if !(self.cube_half_width_per_meter.is_finite() && self.cube_half_width_per_meter >= 0.0) {
            self.cube_half_width_per_meter = point_cloud::CUBE_HALF_WIDTH_PER_METER;
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            frame_wait_timeout: Duration::from_millis(self.frame_wait_timeout_ms),
            color_probe_depth: self.color_probe_depth,
            color_size: Resolution::new(self.color_width, self.color_height),
        }
    }

    pub fn point_cloud_options(&self) -> PointCloudOptions {
        PointCloudOptions {
            colormap: self.colormap,
            pixel_order: self.pixel_order,
            cube_half_width_per_meter: self.cube_half_width_per_meter,
        }
    }
}
