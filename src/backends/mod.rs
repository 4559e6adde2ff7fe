// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for depth capture
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          Session / Point Cloud              │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │  Providers  │───▶│   DepthCamera    │    │
//! │  │ (Kinect,    │    │  Live / Playback │    │
//! │  │  synthetic) │    └──────────────────┘    │
//! │  └─────────────┘                            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera trait, device providers and camera set

pub mod camera;
