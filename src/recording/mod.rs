// SPDX-License-Identifier: GPL-3.0-only

//! Recording manifests and the catalog of recorded sessions

pub mod catalog;
pub mod manifest;

pub use catalog::{CatalogEntry, RecordingCatalog};
pub use manifest::{CameraRecord, RecordingManifest, Rotation, Translation};
