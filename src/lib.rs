// SPDX-License-Identifier: GPL-3.0-only

//! depthfuse - multi-camera depth capture and point cloud fusion
//!
//! Depth cameras of several families are opened side by side, their frames
//! back-projected into one shared point cloud, recorded to disk and played
//! back with optional skeleton review.
//!
//! # Architecture
//!
//! - [`backends`]: Depth camera abstraction, live and playback cameras
//! - [`pointcloud`]: Shared vertex buffer, colormaps and model transform
//! - [`gpu`]: wgpu point renderer
//! - [`session`]: Streaming/recording state machine and session parameters
//! - [`recording`]: Manifests and the catalog of recorded sessions
//! - [`playback`]: Playback cursor and skeleton correction
//! - [`skeleton`]: Detector seam, sidecar data and overlay drawing
//! - [`media`]: Depth containers and color frame sequences
//! - [`config`]: User configuration handling
//! - [`storage`]: Session naming and recording directory helpers

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod media;
pub mod playback;
pub mod pointcloud;
pub mod recording;
pub mod session;
pub mod skeleton;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use pointcloud::PointCloud;
pub use session::{SessionController, SessionSettings, SessionState};
