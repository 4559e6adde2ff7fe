// SPDX-License-Identifier: GPL-3.0-only

//! Playback camera
//!
//! Replays one recorded camera. Every request seeks to the shared
//! [`PlaybackCursor`] position, so all cameras of a recording show the same
//! frame index. Playback cameras never record.

use std::path::Path;

use image::RgbImage;
use tracing::{debug, info, warn};

use super::types::*;
use super::DepthCamera;
use crate::constants::recording::COLOR_DIR_SUFFIX;
use crate::media::{ColorSequenceReader, DepthReader};
use crate::playback::PlaybackCursor;
use crate::recording::manifest::CameraRecord;

pub struct PlaybackCamera {
    identity: CameraIdentity,
    intrinsics: Intrinsics,
    meters_per_unit: f32,
    reader: DepthReader,
    color: Option<ColorSequenceReader>,
    cursor: PlaybackCursor,
    frame: Vec<u16>,
    loaded: Option<usize>,
}

impl PlaybackCamera {
    /// Open the containers named by a manifest entry
    pub fn open(
        recording_root: &Path,
        id: u32,
        record: &CameraRecord,
        cursor: PlaybackCursor,
    ) -> BackendResult<Self> {
        let kind = record.camera_kind().ok_or_else(|| {
            BackendError::NotAvailable(format!("no playback for camera type {}", record.kind))
        })?;

        let depth_path = record.depth_path(recording_root);
        let reader = DepthReader::open(&depth_path)?;
        if let Some(expected) = record.resolution()
            && expected != reader.resolution()
        {
            return Err(BackendError::UnexpectedFormat(format!(
                "{} holds {} frames, manifest says {}",
                depth_path.display(),
                reader.resolution(),
                expected
            )));
        }

        let color_dir = depth_path.with_file_name(format!(
            "{}{}",
            depth_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default(),
            COLOR_DIR_SUFFIX
        ));
        let color = ColorSequenceReader::open(&color_dir);
        if color.is_none() {
            warn!(camera = %record.name, dir = ?color_dir, "Recording has no color frames");
        }

        info!(
            camera = %record.name,
            frames = reader.frame_count(),
            resolution = %reader.resolution(),
            "Playback camera opened"
        );

        Ok(Self {
            identity: CameraIdentity::with_name(kind, id, record.name.clone()),
            intrinsics: record.intrinsics(),
            meters_per_unit: record.meters_per_unit,
            frame: Vec::with_capacity(reader.resolution().pixel_count()),
            reader,
            color,
            cursor,
            loaded: None,
        })
    }

    /// Frames stored in the depth container
    pub fn frame_count(&self) -> usize {
        self.reader.frame_count()
    }
}

impl DepthCamera for PlaybackCamera {
    fn identity(&self) -> &CameraIdentity {
        &self.identity
    }

    fn resolution(&self) -> Resolution {
        self.reader.resolution()
    }

    fn intrinsics(&self) -> Intrinsics {
        self.intrinsics
    }

    fn meters_per_unit(&self) -> f32 {
        self.meters_per_unit
    }

    fn depth(&mut self) -> BackendResult<Option<&[u16]>> {
        let index = self.cursor.frame();
        if index >= self.reader.frame_count() {
            debug!(camera = %self.identity.name, index, "Frame past end of container");
            return Ok(None);
        }
        if self.loaded != Some(index) {
            self.reader.read_frame(index, &mut self.frame)?;
            self.loaded = Some(index);
        }
        Ok(Some(&self.frame))
    }

    fn color_frame(&mut self) -> Option<RgbImage> {
        self.color.as_ref()?.frame(self.cursor.frame())
    }

    fn start_recording(&mut self, _: &Path, _: &str) -> BackendResult<CameraRecord> {
        Err(BackendError::NotSupported("playback cameras never record"))
    }

    fn save_frame(&mut self) -> BackendResult<()> {
        Err(BackendError::NotSupported("playback cameras never record"))
    }

    fn stop_recording(&mut self) -> BackendResult<()> {
        Err(BackendError::NotSupported("playback cameras never record"))
    }

    fn is_recording(&self) -> bool {
        false
    }

    fn is_playback(&self) -> bool {
        true
    }
}
