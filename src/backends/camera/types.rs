// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Kinect focal lengths and principal point at the 640x480 reference mode
mod kinect {
    pub const FX: f32 = 594.21;
    pub const FY: f32 = 591.04;
    pub const CX: f32 = 339.5;
    pub const CY: f32 = 242.7;
    pub const BASE_WIDTH: f32 = 640.0;
    pub const BASE_HEIGHT: f32 = 480.0;
}

/// Camera family
///
/// The serialized name is what recording manifests store in their `Type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraKind {
    /// Intel RealSense (vendor SDK)
    RealSense,
    /// Orbbec / OpenNI2 devices (vendor SDK)
    Orbbec,
    /// Kinect v1 through the kernel V4L2 driver
    Kinect,
}

impl CameraKind {
    /// Get all camera kinds
    pub const ALL: [CameraKind; 3] = [CameraKind::RealSense, CameraKind::Orbbec, CameraKind::Kinect];

    /// Name used in manifests and display names
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraKind::RealSense => "RealSense",
            CameraKind::Orbbec => "Orbbec",
            CameraKind::Kinect => "Kinect",
        }
    }

    /// Parse a manifest `Type` value, `None` for families this build cannot play back
    pub fn from_manifest_type(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl std::fmt::Display for CameraKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels (and therefore points) per frame
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pinhole intrinsics of a depth sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Intrinsics {
    pub const fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Derive intrinsics from a field of view in radians
    ///
    /// The principal point is assumed to be the image center.
    pub fn from_field_of_view(resolution: Resolution, horizontal: f32, vertical: f32) -> Self {
        let width = resolution.width as f32;
        let height = resolution.height as f32;
        Self {
            fx: width / (2.0 * (horizontal / 2.0).tan()),
            fy: height / (2.0 * (vertical / 2.0).tan()),
            cx: width / 2.0,
            cy: height / 2.0,
        }
    }

    /// Kinect v1 factory calibration scaled to the given resolution
    pub fn kinect(resolution: Resolution) -> Self {
        let sx = resolution.width as f32 / kinect::BASE_WIDTH;
        let sy = resolution.height as f32 / kinect::BASE_HEIGHT;
        Self {
            fx: kinect::FX * sx,
            fy: kinect::FY * sy,
            cx: kinect::CX * sx,
            cy: kinect::CY * sy,
        }
    }

    /// Camera matrix `K`
    pub fn matrix(&self) -> Matrix3<f32> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Read fx, fy, cx, cy back from a camera matrix
    pub fn from_matrix(k: &Matrix3<f32>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    /// Back-projection coefficients of a pixel
    ///
    /// Multiplying both by the depth in meters gives the camera-space x and y.
    pub fn back_projection(&self, x: f32, y: f32) -> [f32; 2] {
        [(x - self.cx) / self.fx, (y - self.cy) / self.fy]
    }

    /// Project a camera-space point back to pixel coordinates
    pub fn project(&self, x: f32, y: f32, z: f32) -> Option<[f32; 2]> {
        if z <= 0.0 {
            return None;
        }
        Some([x / z * self.fx + self.cx, y / z * self.fy + self.cy])
    }

    /// Whether the focal lengths can be divided by
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite() && self.fy.is_finite() && self.fx > 0.0 && self.fy > 0.0
    }
}

/// Pixel format of a raw depth frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthPixelFormat {
    /// One unit is one millimeter
    Millimeter,
    /// One unit is 100 micrometers
    HundredMicrometer,
    /// Device specific linear scale in meters per unit
    Scaled(f32),
    /// Raw disparity, cannot be converted linearly
    Disparity,
}

impl DepthPixelFormat {
    /// Meters represented by one raw unit, `None` for non-linear formats
    pub fn meters_per_unit(&self) -> Option<f32> {
        match self {
            DepthPixelFormat::Millimeter => Some(0.001),
            DepthPixelFormat::HundredMicrometer => Some(0.0001),
            DepthPixelFormat::Scaled(scale) if *scale > 0.0 => Some(*scale),
            DepthPixelFormat::Scaled(_) | DepthPixelFormat::Disparity => None,
        }
    }
}

/// One raw depth frame as delivered by a device
#[derive(Debug, Clone)]
pub struct DepthFrame {
    pub resolution: Resolution,
    pub format: DepthPixelFormat,
    /// Row-major samples in sensor orientation
    pub data: Vec<u16>,
}

/// Identity of an open camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraIdentity {
    pub kind: CameraKind,
    pub id: u32,
    pub name: String,
}

impl CameraIdentity {
    /// Identity with the display name `"<Kind> Camera <id>"`
    pub fn new(kind: CameraKind, id: u32) -> Self {
        Self {
            kind,
            id,
            name: format!("{} Camera {}", kind, id),
        }
    }

    /// Identity that keeps a name recorded earlier
    pub fn with_name(kind: CameraKind, id: u32, name: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            name: name.into(),
        }
    }

    /// Name usable as a file stem
    pub fn file_stem(&self) -> String {
        self.name.replace(' ', "_")
    }
}

/// Backend error type
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize device
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Frame did not arrive within the wait timeout
    Timeout(String),
    /// Frame arrived in a format the pipeline cannot use
    UnexpectedFormat(String),
    /// Operation not supported by this camera
    NotSupported(&'static str),
    /// Recording already in progress
    RecordingInProgress,
    /// No recording in progress
    NoRecordingInProgress,
    /// A capture thread panicked
    Crashed(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::Timeout(msg) => write!(f, "Timed out waiting for frame: {}", msg),
            BackendError::UnexpectedFormat(msg) => write!(f, "Unexpected frame format: {}", msg),
            BackendError::NotSupported(what) => write!(f, "Not supported: {}", what),
            BackendError::RecordingInProgress => write!(f, "Recording already in progress"),
            BackendError::NoRecordingInProgress => write!(f, "No recording in progress"),
            BackendError::Crashed(msg) => write!(f, "Capture crashed: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

impl From<image::ImageError> for BackendError {
    fn from(err: image::ImageError) -> Self {
        BackendError::IoError(err.to_string())
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;
