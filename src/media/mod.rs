// SPDX-License-Identifier: GPL-3.0-only

//! On-disk media used by recording and playback
//!
//! Every recorded camera produces two streams inside the session directory:
//!
//! - a raw depth container (`<Camera_Name>.depth`), see [`depth_container`]
//! - a JPEG sequence (`<Camera_Name>_color/`), see [`color_sequence`]
//!
//! Both are addressed by frame index so playback cameras can seek to the
//! shared playback position on every request.

pub mod color_sequence;
pub mod depth_container;

pub use color_sequence::{ColorSequenceReader, ColorSequenceWriter};
pub use depth_container::{DepthReader, DepthWriter};
