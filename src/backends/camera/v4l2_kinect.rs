// SPDX-License-Identifier: GPL-3.0-only

//! Kinect v1 through the V4L2 kernel driver
//!
//! The kernel `kinect` driver exposes two video nodes per sensor that share
//! a `bus_info`:
//!
//! - depth (`Y16 `, 11-bit disparity)
//! - color (`UYVY` or Bayer `GRBG`)
//!
//! Disparity is converted to millimeters on capture so the rest of the
//! pipeline sees a linear depth scale. The color node becomes the first
//! candidate of the camera's color probe; further `/dev/video*` nodes follow.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbImage;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

use super::device::{Calibration, ColorSource, ColorSourceFactory, DepthDevice};
use super::live::LiveCamera;
use super::types::*;
use super::{CaptureOptions, DepthCamera, DeviceProvider};

/// Disparity-to-depth coefficients: `depth_m = 1 / (raw * A + B)`
const DEPTH_COEFF_A: f32 = -0.0030711;
const DEPTH_COEFF_B: f32 = 3.3309495;

/// Disparity value the sensor reports for "no measurement"
const INVALID_DISPARITY: u16 = 2047;

const DEPTH_RESOLUTION: Resolution = Resolution::new(640, 480);
const STREAM_BUFFERS: u32 = 4;

/// Depth and (optional) color node of one physical Kinect
#[derive(Debug, Clone)]
pub struct KinectNodes {
    pub depth_path: String,
    pub color_path: Option<String>,
    pub bus_info: String,
    pub card_name: String,
}

/// Scan `/dev/video*` for Kinect kernel driver nodes, grouped by bus
pub fn find_kinect_nodes() -> Vec<KinectNodes> {
    let fourcc_y16 = FourCC::new(b"Y16 ");
    let fourcc_grbg = FourCC::new(b"GRBG");
    let fourcc_uyvy = FourCC::new(b"UYVY");

    let mut by_bus: HashMap<String, KinectNodes> = HashMap::new();

    for path in video_nodes() {
        let path_str = path.to_string_lossy().to_string();
        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if caps.driver != "kinect" {
            continue;
        }

        let formats: Vec<_> = dev.enum_formats().into_iter().flatten().collect();
        let is_depth = formats.iter().any(|f| f.fourcc == fourcc_y16);
        let is_color = formats
            .iter()
            .any(|f| f.fourcc == fourcc_grbg || f.fourcc == fourcc_uyvy);

        debug!(path = %path_str, bus = %caps.bus, is_depth, is_color, "Found Kinect node");

        let entry = by_bus.entry(caps.bus.clone()).or_insert_with(|| KinectNodes {
            depth_path: String::new(),
            color_path: None,
            bus_info: caps.bus.clone(),
            card_name: caps.card.clone(),
        });
        if is_depth {
            entry.depth_path = path_str;
        } else if is_color {
            entry.color_path = Some(path_str);
        }
    }

    let mut nodes: Vec<_> = by_bus
        .into_values()
        .filter(|n| !n.depth_path.is_empty())
        .collect();
    nodes.sort_by(|a, b| a.depth_path.cmp(&b.depth_path));
    for n in &nodes {
        info!(depth = %n.depth_path, color = ?n.color_path, bus = %n.bus_info, "Kinect found");
    }
    nodes
}

fn video_nodes() -> Vec<PathBuf> {
    let mut nodes: Vec<PathBuf> = std::fs::read_dir("/dev")
        .into_iter()
        .flatten()
        .flatten()
        .map(|e| e.path())
        .filter(|p| is_video_node(p))
        .collect();
    nodes.sort();
    nodes
}

/// Convert one 11-bit disparity sample to millimeters, 0 when invalid
pub fn disparity_to_millimeters(raw: u16) -> u16 {
    if raw >= INVALID_DISPARITY {
        return 0;
    }
    let denom = raw as f32 * DEPTH_COEFF_A + DEPTH_COEFF_B;
    if denom <= 0.0 {
        return 0;
    }
    (1000.0 / denom).round().min(u16::MAX as f32) as u16
}

fn map_stream_error(err: std::io::Error, path: &str) -> BackendError {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => BackendError::Timeout(path.to_string()),
        _ => BackendError::IoError(format!("{}: {}", path, err)),
    }
}

/// Depth node of a Kinect
pub struct KinectDepthDevice {
    path: String,
    stream: Stream<'static>,
    resolution: Resolution,
}

impl KinectDepthDevice {
    pub fn open(path: &str) -> BackendResult<Self> {
        let dev = Device::with_path(path)
            .map_err(|e| BackendError::InitializationFailed(format!("{}: {}", path, e)))?;

        let requested = Format::new(
            DEPTH_RESOLUTION.width,
            DEPTH_RESOLUTION.height,
            FourCC::new(b"Y16 "),
        );
        let actual = dev
            .set_format(&requested)
            .map_err(|e| BackendError::InitializationFailed(format!("{}: {}", path, e)))?;
        if actual.fourcc != FourCC::new(b"Y16 ") {
            return Err(BackendError::UnexpectedFormat(format!(
                "{} negotiated {}",
                path, actual.fourcc
            )));
        }

        let stream = Stream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| BackendError::InitializationFailed(format!("{}: {}", path, e)))?;

        info!(
            path,
            width = actual.width,
            height = actual.height,
            "Kinect depth stream configured"
        );

        Ok(Self {
            path: path.to_string(),
            stream,
            resolution: Resolution::new(actual.width, actual.height),
        })
    }
}

impl DepthDevice for KinectDepthDevice {
    fn description(&self) -> String {
        self.path.clone()
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn pixel_format(&self) -> DepthPixelFormat {
        DepthPixelFormat::Millimeter
    }

    fn calibration(&self) -> Calibration {
        Calibration::Intrinsics(Intrinsics::kinect(self.resolution))
    }

    fn wait_for_frame(&mut self, timeout: Duration) -> BackendResult<DepthFrame> {
        self.stream.set_timeout(timeout);
        let (buf, _meta) = self
            .stream
            .next()
            .map_err(|e| map_stream_error(e, &self.path))?;

        let expected = self.resolution.pixel_count();
        if buf.len() < expected * 2 {
            return Err(BackendError::UnexpectedFormat(format!(
                "short depth buffer ({} bytes)",
                buf.len()
            )));
        }

        let data = buf
            .chunks_exact(2)
            .take(expected)
            .map(|c| disparity_to_millimeters(u16::from_le_bytes([c[0], c[1]])))
            .collect();

        Ok(DepthFrame {
            resolution: self.resolution,
            format: DepthPixelFormat::Millimeter,
            data,
        })
    }
}

/// Convert packed 4:2:2 YUV to RGB (BT.601)
///
/// `luma_first` selects YUYV ordering, otherwise UYVY.
pub fn yuv422_to_rgb(data: &[u8], width: u32, height: u32, luma_first: bool) -> Option<RgbImage> {
    let pixel_count = width as usize * height as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);

    for chunk in data.chunks_exact(4) {
        let (y0, u, y1, v) = if luma_first {
            (chunk[0], chunk[1], chunk[2], chunk[3])
        } else {
            (chunk[1], chunk[0], chunk[3], chunk[2])
        };
        let u = u as f32 - 128.0;
        let v = v as f32 - 128.0;
        for y in [y0 as f32, y1 as f32] {
            if rgb.len() >= pixel_count * 3 {
                break;
            }
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }

    RgbImage::from_raw(width, height, rgb)
}

/// V4L2 color node delivering YUYV or UYVY
pub struct V4l2ColorSource {
    path: String,
    stream: Stream<'static>,
    width: u32,
    height: u32,
    luma_first: bool,
}

impl V4l2ColorSource {
    pub fn open(path: &str, size: Resolution) -> Option<Self> {
        let dev = Device::with_path(path).ok()?;
        let fourcc_uyvy = FourCC::new(b"UYVY");
        let fourcc_yuyv = FourCC::new(b"YUYV");

        let actual = [fourcc_uyvy, fourcc_yuyv].into_iter().find_map(|fourcc| {
            dev.set_format(&Format::new(size.width, size.height, fourcc))
                .ok()
                .filter(|f| f.fourcc == fourcc)
        })?;

        let stream = match Stream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(path, error = %e, "Failed to start color stream");
                return None;
            }
        };

        Some(Self {
            path: path.to_string(),
            stream,
            width: actual.width,
            height: actual.height,
            luma_first: actual.fourcc == fourcc_yuyv,
        })
    }
}

impl ColorSource for V4l2ColorSource {
    fn grab(&mut self) -> BackendResult<RgbImage> {
        let (buf, _meta) = self
            .stream
            .next()
            .map_err(|e| map_stream_error(e, &self.path))?;
        yuv422_to_rgb(buf, self.width, self.height, self.luma_first).ok_or_else(|| {
            BackendError::UnexpectedFormat(format!("short color buffer from {}", self.path))
        })
    }
}

/// Probes the paired Kinect color node first, then the other video nodes
pub struct V4l2ColorFactory {
    candidates: Vec<String>,
}

impl V4l2ColorFactory {
    pub fn new(preferred: Option<&str>, exclude: &str) -> Self {
        let mut candidates: Vec<String> = preferred.map(str::to_string).into_iter().collect();
        for node in video_nodes() {
            let node = node.to_string_lossy().to_string();
            if node != exclude && !candidates.contains(&node) {
                candidates.push(node);
            }
        }
        Self { candidates }
    }
}

impl ColorSourceFactory for V4l2ColorFactory {
    fn open(&mut self, index: u32, size: Resolution) -> Option<Box<dyn ColorSource>> {
        let path = self.candidates.get(index as usize)?;
        V4l2ColorSource::open(path, size).map(|s| Box::new(s) as Box<dyn ColorSource>)
    }
}

/// Opens every Kinect found by [`find_kinect_nodes`]
#[derive(Default)]
pub struct KinectProvider;

impl DeviceProvider for KinectProvider {
    fn name(&self) -> &str {
        "kinect-v4l2"
    }

    fn open_all(&mut self, first_id: u32, options: &CaptureOptions) -> Vec<Box<dyn DepthCamera>> {
        let mut cameras: Vec<Box<dyn DepthCamera>> = Vec::new();
        for nodes in find_kinect_nodes() {
            let id = first_id + cameras.len() as u32;
            let device = match KinectDepthDevice::open(&nodes.depth_path) {
                Ok(device) => device,
                Err(e) => {
                    warn!(path = %nodes.depth_path, error = %e, "Skipping Kinect");
                    continue;
                }
            };
            let factory = V4l2ColorFactory::new(nodes.color_path.as_deref(), &nodes.depth_path);
            match LiveCamera::with_color(
                CameraIdentity::new(CameraKind::Kinect, id),
                Box::new(device),
                Box::new(factory),
                options,
            ) {
                Ok(camera) => cameras.push(Box::new(camera)),
                Err(e) => warn!(path = %nodes.depth_path, error = %e, "Skipping Kinect"),
            }
        }
        cameras
    }
}

/// Whether `path` looks like a V4L2 node
pub fn is_video_node(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("video"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disparity_conversion() {
        assert_eq!(disparity_to_millimeters(INVALID_DISPARITY), 0);
        assert_eq!(disparity_to_millimeters(u16::MAX), 0);
        // Near and far ends of the usable range
        let near = disparity_to_millimeters(400);
        let far = disparity_to_millimeters(1000);
        assert!(near > 400 && near < 600, "near = {}", near);
        assert!(far > 2500 && far < 4000, "far = {}", far);
        assert!(disparity_to_millimeters(500) < disparity_to_millimeters(600));
    }

    #[test]
    fn test_yuv_orderings() {
        // Mid grey, neutral chroma
        let uyvy = [128u8, 100, 128, 100];
        let yuyv = [100u8, 128, 100, 128];
        let a = yuv422_to_rgb(&uyvy, 2, 1, false).unwrap();
        let b = yuv422_to_rgb(&yuyv, 2, 1, true).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get_pixel(1, 0).0, [100, 100, 100]);
        assert!(yuv422_to_rgb(&uyvy, 4, 4, false).is_none());
    }

    #[test]
    fn test_video_node_names() {
        assert!(is_video_node(Path::new("/dev/video3")));
        assert!(!is_video_node(Path::new("/dev/media0")));
    }
}
