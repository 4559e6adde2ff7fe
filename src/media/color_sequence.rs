// SPDX-License-Identifier: GPL-3.0-only

//! Color frames stored as a numbered JPEG sequence
//!
//! Frame files are named after the depth frame they belong to, so a color
//! frame that could not be grabbed leaves a gap instead of shifting later
//! frames.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use crate::backends::camera::BackendResult;
use crate::constants::color::JPEG_QUALITY;

fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{:06}.jpg", index))
}

/// Writes color frames into a directory
pub struct ColorSequenceWriter {
    dir: PathBuf,
    written: usize,
}

impl ColorSequenceWriter {
    pub fn create(dir: &Path) -> BackendResult<Self> {
        std::fs::create_dir_all(dir)?;
        debug!(dir = ?dir, "Color sequence created");
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    /// Store the color frame belonging to depth frame `index`
    pub fn write(&mut self, index: usize, image: &RgbImage) -> BackendResult<()> {
        let file = File::create(frame_path(&self.dir, index))?;
        let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
        encoder.encode_image(image)?;
        self.written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> usize {
        self.written
    }
}

/// Reads color frames back by index
pub struct ColorSequenceReader {
    dir: PathBuf,
}

impl ColorSequenceReader {
    /// `None` when the recording has no color directory
    pub fn open(dir: &Path) -> Option<Self> {
        dir.is_dir().then(|| Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Decode the frame at `index`, `None` when it was never written
    pub fn frame(&self, index: usize) -> Option<RgbImage> {
        let path = frame_path(&self.dir, index);
        if !path.is_file() {
            return None;
        }
        match image::open(&path) {
            Ok(image) => Some(image.to_rgb8()),
            Err(e) => {
                debug!(path = ?path, error = %e, "Failed to decode color frame");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaps_stay_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let seq_dir = dir.path().join("cam_color");
        let mut writer = ColorSequenceWriter::create(&seq_dir).unwrap();
        let image = RgbImage::from_pixel(16, 8, image::Rgb([200, 10, 10]));
        writer.write(0, &image).unwrap();
        writer.write(2, &image).unwrap();
        assert_eq!(writer.frames_written(), 2);

        let reader = ColorSequenceReader::open(&seq_dir).unwrap();
        let first = reader.frame(0).unwrap();
        assert_eq!(first.dimensions(), (16, 8));
        assert!(first.get_pixel(4, 4)[0] > 150);
        assert!(reader.frame(1).is_none());
        assert!(reader.frame(2).is_some());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ColorSequenceReader::open(&dir.path().join("nope")).is_none());
    }
}
