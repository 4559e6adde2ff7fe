// SPDX-License-Identifier: GPL-3.0-only

//! Playback of recorded sessions and skeleton correction
//!
//! Playback replaces the live cameras with [`PlaybackCamera`]s that all read
//! the frame selected by one shared [`PlaybackCursor`]. Correction mode
//! pauses the cursor and steps it by hand while error codes are edited.

pub mod cursor;

pub use cursor::PlaybackCursor;

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::backends::camera::{CameraSet, DepthCamera, PlaybackCamera, Resolution};
use crate::constants::recording::SKELETON_FILE_NAME;
use crate::errors::{AppError, AppResult, SkeletonDataError};
use crate::recording::{CatalogEntry, RecordingManifest};
use crate::skeleton::{
    DepthLookup, ErrorCatalog, Person, SkeletonData, SkeletonDetector, SkeletonRecorder,
    draw_skeletons,
};

/// Open one playback camera per manifest entry into `cameras`
///
/// Entries that cannot be opened are logged and skipped. The cursor's
/// frame total becomes the longest container.
pub fn open_cameras(
    recording_root: &Path,
    manifest: &RecordingManifest,
    cursor: &PlaybackCursor,
    cameras: &mut CameraSet,
) -> usize {
    let mut longest = 0;
    let mut opened = 0;
    for (id, record) in manifest.cameras.iter().enumerate() {
        match PlaybackCamera::open(recording_root, id as u32, record, cursor.clone()) {
            Ok(camera) => {
                longest = longest.max(camera.frame_count());
                cameras.push(Box::new(camera));
                opened += 1;
            }
            Err(e) => {
                warn!(camera = %record.name, error = %e, "Skipping recorded camera");
            }
        }
    }
    cursor.set_total_frames(longest);
    cursor.seek(0);
    info!(
        session = %manifest.name,
        cameras = opened,
        frames = longest,
        "Playback ready"
    );
    opened
}

/// Run `detector` over every frame of a recorded session
///
/// Detection uses the color frames of the first recorded camera and its
/// depth for joint positions. The sidecar is written next to the camera
/// containers and the manifest is saved again with its `Skeleton` field set.
///
/// # Returns
/// Path of the written sidecar
pub fn compute_skeletons(
    recording_root: &Path,
    entry: &CatalogEntry,
    detector: &mut dyn SkeletonDetector,
) -> AppResult<PathBuf> {
    let manifest = &entry.manifest;
    let record = manifest
        .cameras
        .first()
        .ok_or_else(|| AppError::Other(format!("{} has no cameras", manifest.name)))?;

    let cursor = PlaybackCursor::new(0);
    let mut camera = PlaybackCamera::open(recording_root, 0, record, cursor.clone())?;
    let frames = camera.frame_count();
    cursor.set_total_frames(frames);
    info!(
        session = %manifest.name,
        camera = %record.name,
        detector = detector.name(),
        frames,
        "Computing skeletons"
    );

    let mut recorder = SkeletonRecorder::new();
    for index in 0..frames {
        cursor.seek(index);
        let Some(image) = camera.color_frame() else {
            debug!(frame = index, "No color frame");
            recorder.record(&[], None);
            continue;
        };
        let detections = detector.detect(&image).unwrap_or_else(|e| {
            warn!(frame = index, error = %e, "Skeleton detection failed");
            Vec::new()
        });

        let resolution = camera.resolution();
        let intrinsics = camera.intrinsics();
        let meters_per_unit = camera.meters_per_unit();
        let samples = camera.depth()?;
        let lookup = samples.map(|samples| DepthLookup {
            samples,
            resolution,
            intrinsics,
            meters_per_unit,
            color_size: Resolution::new(image.width(), image.height()),
        });
        recorder.record(&detections, lookup.as_ref());
    }

    let session_dir = manifest.session_dir_name();
    let sidecar = recording_root.join(&session_dir).join(SKELETON_FILE_NAME);
    recorder.finish(&sidecar)?;

    let mut updated = manifest.clone();
    updated.skeleton = Some(format!("{}/{}", session_dir, SKELETON_FILE_NAME));
    updated.save(&entry.path)?;
    info!(path = ?sidecar, "Skeleton data attached");
    Ok(sidecar)
}

/// Frame-by-frame review of recorded skeletons
///
/// Sidecar frame `i` belongs to cursor frame `i`. The cursor stays paused
/// while correcting and only moves on [`SkeletonCorrection::continue_frame`].
#[derive(Debug)]
pub struct SkeletonCorrection {
    data: SkeletonData,
    catalog: ErrorCatalog,
    cursor: PlaybackCursor,
}

impl SkeletonCorrection {
    pub fn start(data: SkeletonData, catalog: ErrorCatalog, cursor: PlaybackCursor) -> Self {
        cursor.set_paused(true);
        info!(
            path = %data.path().display(),
            frame = cursor.frame(),
            "Skeleton correction started"
        );
        Self {
            data,
            catalog,
            cursor,
        }
    }

    pub fn frame(&self) -> usize {
        self.cursor.frame()
    }

    /// Persons of the frame under review
    pub fn persons(&self) -> &[Person] {
        self.data.frame(self.cursor.frame()).unwrap_or(&[])
    }

    pub fn catalog(&self) -> &ErrorCatalog {
        &self.catalog
    }

    pub fn data(&self) -> &SkeletonData {
        &self.data
    }

    fn person_mut(&mut self, person: usize) -> Option<&mut Person> {
        let frame = self.cursor.frame();
        self.data.frame_mut(frame)?.get_mut(person)
    }

    /// Advance a person's error code to the next category
    pub fn cycle_person_error(&mut self, person: usize) -> Option<i32> {
        let catalog = self.catalog.clone();
        let p = self.person_mut(person)?;
        p.error = catalog.next_skeleton_error(p.error);
        Some(p.error)
    }

    /// Advance a joint's error code to the next category
    pub fn cycle_joint_error(&mut self, person: usize, joint: usize) -> Option<i32> {
        let catalog = self.catalog.clone();
        let j = self.person_mut(person)?.joints.get_mut(joint)?;
        j.error = catalog.next_joint_error(j.error);
        Some(j.error)
    }

    pub fn set_person_error(&mut self, person: usize, error: i32) -> bool {
        self.person_mut(person).map(|p| p.error = error).is_some()
    }

    pub fn set_joint_error(&mut self, person: usize, joint: usize, error: i32) -> bool {
        self.person_mut(person)
            .and_then(|p| p.joints.get_mut(joint))
            .map(|j| j.error = error)
            .is_some()
    }

    pub fn is_last_frame(&self) -> bool {
        self.cursor.is_last_frame()
    }

    /// Move to the next frame; stays on the last frame
    ///
    /// Returns whether the cursor moved.
    pub fn continue_frame(&mut self) -> bool {
        if self.cursor.is_last_frame() {
            return false;
        }
        self.cursor.step();
        true
    }

    /// Draw the reviewed frame's joints onto `image`
    pub fn overlay(&self, image: &mut RgbImage, threshold: f32, show_uncertainty: bool) -> usize {
        draw_skeletons(image, self.persons(), threshold, show_uncertainty)
    }

    /// Leave correction mode, overwriting the sidecar once
    pub fn finish(&mut self) -> Result<(), SkeletonDataError> {
        self.data.write_back()?;
        self.cursor.set_paused(false);
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.data.is_written()
    }
}
