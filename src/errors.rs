// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture, recording and review pipeline
//!
//! Camera adapter failures use [`crate::backends::camera::BackendError`].
//! Everything that crosses a module boundary is folded into [`AppError`],
//! which is what the CLI reports.

use std::fmt;
use std::path::PathBuf;

use crate::backends::camera::BackendError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug)]
pub enum AppError {
    /// Camera adapter errors
    Camera(BackendError),
    /// Recording session errors
    Recording(RecordingError),
    /// Manifest read/validation errors
    Manifest(ManifestError),
    /// Skeleton sidecar and catalog errors
    Skeleton(SkeletonDataError),
    /// Renderer errors
    Render(String),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Recording-specific errors
#[derive(Debug)]
pub enum RecordingError {
    /// No camera is selected for recording
    NoCamerasSelected,
    /// The session is not in a state that allows the request
    InvalidState(&'static str),
    /// Writing the recording manifest failed
    ManifestWriteFailed(String),
}

/// Errors raised while loading or validating a recording manifest
#[derive(Debug)]
pub enum ManifestError {
    /// File could not be read
    Io { path: PathBuf, message: String },
    /// File is not a manifest
    Parse { path: PathBuf, message: String },
    /// Manifest parsed but its content is inconsistent
    Invalid(String),
}

/// Errors raised by skeleton sidecars and error catalogs
#[derive(Debug)]
pub enum SkeletonDataError {
    /// File could not be read or written
    Io { path: PathBuf, message: String },
    /// File content is malformed
    Parse { path: PathBuf, message: String },
    /// The correction flow already wrote its result back
    AlreadyWritten,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Recording(e) => write!(f, "Recording error: {}", e),
            AppError::Manifest(e) => write!(f, "Manifest error: {}", e),
            AppError::Skeleton(e) => write!(f, "Skeleton data error: {}", e),
            AppError::Render(msg) => write!(f, "Render error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::NoCamerasSelected => write!(f, "No camera selected for recording"),
            RecordingError::InvalidState(expected) => {
                write!(f, "Session must be in {} state", expected)
            }
            RecordingError::ManifestWriteFailed(msg) => {
                write!(f, "Failed to write manifest: {}", msg)
            }
        }
    }
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::Io { path, message } => {
                write!(f, "{}: {}", path.display(), message)
            }
            ManifestError::Parse { path, message } => {
                write!(f, "{} is not a recording manifest: {}", path.display(), message)
            }
            ManifestError::Invalid(msg) => write!(f, "Invalid manifest: {}", msg),
        }
    }
}

impl fmt::Display for SkeletonDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkeletonDataError::Io { path, message } => {
                write!(f, "{}: {}", path.display(), message)
            }
            SkeletonDataError::Parse { path, message } => {
                write!(f, "{} is malformed: {}", path.display(), message)
            }
            SkeletonDataError::AlreadyWritten => {
                write!(f, "Corrected skeleton data was already written")
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for RecordingError {}
impl std::error::Error for ManifestError {}
impl std::error::Error for SkeletonDataError {}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Camera(err)
    }
}

impl From<RecordingError> for AppError {
    fn from(err: RecordingError) -> Self {
        AppError::Recording(err)
    }
}

impl From<ManifestError> for AppError {
    fn from(err: ManifestError) -> Self {
        AppError::Manifest(err)
    }
}

impl From<SkeletonDataError> for AppError {
    fn from(err: SkeletonDataError) -> Self {
        AppError::Skeleton(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(format!("JSON: {}", err))
    }
}
