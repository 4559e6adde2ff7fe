// SPDX-License-Identifier: GPL-3.0-only

//! Raw depth container
//!
//! Layout (all little endian):
//!
//! ```text
//! offset  size  field
//!      0     4  magic "DFDC"
//!      4     2  version
//!      6     2  reserved
//!      8     4  width
//!     12     4  height
//!     16     4  meters per unit (f32)
//!     20     .  frames, width * height u16 samples each
//! ```
//!
//! The frame count is derived from the file length, so a container cut short
//! by a crash stays readable up to its last complete frame.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::backends::camera::{BackendError, BackendResult, Resolution};

const MAGIC: &[u8; 4] = b"DFDC";
const VERSION: u16 = 1;

/// Size of the container header in bytes
pub const HEADER_LEN: u64 = 20;

/// Appends depth frames to a container
pub struct DepthWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    resolution: Resolution,
    frames: usize,
    scratch: Vec<u8>,
}

impl DepthWriter {
    /// Create (or truncate) a container and write its header
    pub fn create(path: &Path, resolution: Resolution, meters_per_unit: f32) -> BackendResult<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u16.to_le_bytes())?;
        writer.write_all(&resolution.width.to_le_bytes())?;
        writer.write_all(&resolution.height.to_le_bytes())?;
        writer.write_all(&meters_per_unit.to_le_bytes())?;

        debug!(path = ?path, %resolution, "Depth container created");

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            resolution,
            frames: 0,
            scratch: Vec::with_capacity(resolution.pixel_count() * 2),
        })
    }

    /// Append one frame
    pub fn append(&mut self, samples: &[u16]) -> BackendResult<()> {
        if samples.len() != self.resolution.pixel_count() {
            return Err(BackendError::UnexpectedFormat(format!(
                "frame has {} samples, container expects {}",
                samples.len(),
                self.resolution.pixel_count()
            )));
        }

        self.scratch.clear();
        for sample in samples {
            self.scratch.extend_from_slice(&sample.to_le_bytes());
        }
        self.writer.write_all(&self.scratch)?;
        self.frames += 1;
        Ok(())
    }

    /// Frames appended so far
    pub fn frames_written(&self) -> usize {
        self.frames
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered frames to disk
    pub fn finish(mut self) -> BackendResult<usize> {
        self.writer.flush()?;
        debug!(path = ?self.path, frames = self.frames, "Depth container closed");
        Ok(self.frames)
    }
}

/// Random access reader over a depth container
pub struct DepthReader {
    file: File,
    resolution: Resolution,
    meters_per_unit: f32,
    frame_count: usize,
    scratch: Vec<u8>,
}

impl DepthReader {
    pub fn open(path: &Path) -> BackendResult<Self> {
        let mut file = File::open(path)?;
        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(BackendError::UnexpectedFormat(format!(
                "{} is not a depth container",
                path.display()
            )));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(BackendError::UnexpectedFormat(format!(
                "unsupported depth container version {}",
                version
            )));
        }

        let word = |at: usize| [header[at], header[at + 1], header[at + 2], header[at + 3]];
        let resolution = Resolution::new(u32::from_le_bytes(word(8)), u32::from_le_bytes(word(12)));
        let meters_per_unit = f32::from_le_bytes(word(16));

        let frame_bytes = resolution.pixel_count() as u64 * 2;
        let body = file.metadata()?.len().saturating_sub(HEADER_LEN);
        let frame_count = if frame_bytes == 0 {
            0
        } else {
            if body % frame_bytes != 0 {
                warn!(path = ?path, "Depth container ends with a partial frame");
            }
            (body / frame_bytes) as usize
        };

        Ok(Self {
            file,
            resolution,
            meters_per_unit,
            frame_count,
            scratch: vec![0; frame_bytes as usize],
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn meters_per_unit(&self) -> f32 {
        self.meters_per_unit
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Decode frame `index` into `out`
    pub fn read_frame(&mut self, index: usize, out: &mut Vec<u16>) -> BackendResult<()> {
        if index >= self.frame_count {
            return Err(BackendError::Other(format!(
                "frame {} out of range ({} frames)",
                index, self.frame_count
            )));
        }

        let offset = HEADER_LEN + index as u64 * self.scratch.len() as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut self.scratch)?;

        out.clear();
        out.extend(
            self.scratch
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]])),
        );
        Ok(())
    }
}
