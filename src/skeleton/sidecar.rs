// SPDX-License-Identifier: GPL-3.0-only

//! Skeleton sidecar file
//!
//! The sidecar is a JSON array with one entry per recorded frame, each a
//! list of persons. Older recordings wrap the array as
//! `{"Skeletons": [...]}`; both forms load.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use super::{Person, SkeletonFrame};
use crate::errors::SkeletonDataError;

#[derive(Deserialize)]
#[serde(untagged)]
enum SidecarFile {
    Frames(Vec<SkeletonFrame>),
    Wrapped {
        #[serde(rename = "Skeletons")]
        skeletons: Vec<SkeletonFrame>,
    },
}

/// Write `frames` as a sidecar, creating parent directories
pub fn save_frames(path: &Path, frames: &[SkeletonFrame]) -> Result<(), SkeletonDataError> {
    let io_error = |e: std::io::Error| SkeletonDataError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let json = serde_json::to_string_pretty(frames).map_err(|e| SkeletonDataError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(io_error)
}

/// Loaded sidecar, written back at most once
#[derive(Debug)]
pub struct SkeletonData {
    path: PathBuf,
    frames: Vec<SkeletonFrame>,
    written: bool,
}

impl SkeletonData {
    pub fn load(path: &Path) -> Result<Self, SkeletonDataError> {
        let content = std::fs::read_to_string(path).map_err(|e| SkeletonDataError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let file: SidecarFile =
            serde_json::from_str(&content).map_err(|e| SkeletonDataError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let frames = match file {
            SidecarFile::Frames(frames) => frames,
            SidecarFile::Wrapped { skeletons } => skeletons,
        };
        info!(path = %path.display(), frames = frames.len(), "Skeleton data loaded");
        Ok(Self {
            path: path.to_path_buf(),
            frames,
            written: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> Option<&[Person]> {
        self.frames.get(index).map(Vec::as_slice)
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<&mut SkeletonFrame> {
        self.frames.get_mut(index)
    }

    pub fn frames(&self) -> &[SkeletonFrame] {
        &self.frames
    }

    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Overwrite the file this data was loaded from
    ///
    /// Succeeds once; later calls return [`SkeletonDataError::AlreadyWritten`].
    pub fn write_back(&mut self) -> Result<(), SkeletonDataError> {
        if self.written {
            return Err(SkeletonDataError::AlreadyWritten);
        }
        save_frames(&self.path, &self.frames)?;
        self.written = true;
        info!(path = %self.path.display(), "Skeleton corrections written");
        Ok(())
    }
}
