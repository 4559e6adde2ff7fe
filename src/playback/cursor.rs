// SPDX-License-Identifier: GPL-3.0-only

//! Shared playback position

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Frame index shared by the playback controller and every playback camera
///
/// Cameras only read it; the controller advances it once per tick.
#[derive(Debug, Clone, Default)]
pub struct PlaybackCursor {
    frame: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    paused: Arc<AtomicBool>,
}

impl PlaybackCursor {
    pub fn new(total_frames: usize) -> Self {
        let cursor = Self::default();
        cursor.total.store(total_frames, Ordering::SeqCst);
        cursor
    }

    /// Current frame index
    pub fn frame(&self) -> usize {
        self.frame.load(Ordering::SeqCst)
    }

    pub fn total_frames(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn set_total_frames(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        if self.frame() >= total {
            self.frame.store(0, Ordering::SeqCst);
        }
    }

    /// Jump to `frame`, wrapping past the end
    pub fn seek(&self, frame: usize) {
        let total = self.total_frames();
        let frame = if total == 0 { 0 } else { frame % total };
        self.frame.store(frame, Ordering::SeqCst);
    }

    /// Move one frame forward unless paused, looping back to 0 after the last frame
    ///
    /// Returns the new index.
    pub fn advance(&self) -> usize {
        if self.is_paused() {
            return self.frame();
        }
        self.step()
    }

    /// Move one frame forward regardless of pause
    pub fn step(&self) -> usize {
        let total = self.total_frames();
        let next = if total == 0 {
            0
        } else {
            (self.frame() + 1) % total
        };
        self.frame.store(next, Ordering::SeqCst);
        next
    }

    /// Whether the cursor sits on the last frame
    pub fn is_last_frame(&self) -> bool {
        let total = self.total_frames();
        total == 0 || self.frame() + 1 >= total
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loops_after_last_frame() {
        let cursor = PlaybackCursor::new(3);
        assert_eq!(cursor.advance(), 1);
        assert_eq!(cursor.advance(), 2);
        assert!(cursor.is_last_frame());
        assert_eq!(cursor.advance(), 0);
    }

    #[test]
    fn test_pause_holds_position_and_clones_share_state() {
        let cursor = PlaybackCursor::new(5);
        let camera_view = cursor.clone();
        cursor.seek(3);
        cursor.set_paused(true);
        assert_eq!(cursor.advance(), 3);
        assert_eq!(camera_view.frame(), 3);
        assert_eq!(cursor.step(), 4);
        assert_eq!(camera_view.frame(), 4);
    }

    #[test]
    fn test_empty_recording_stays_at_zero() {
        let cursor = PlaybackCursor::new(0);
        assert_eq!(cursor.advance(), 0);
        cursor.seek(7);
        assert_eq!(cursor.frame(), 0);
    }
}
