// SPDX-License-Identifier: GPL-3.0-only

//! Error categories used while correcting skeletons
//!
//! Categories are read from `JointErrors.json` and `SkeletonErrors.json` in
//! the recording root. Id 0 always means "no error".

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::recording::{JOINT_ERRORS_FILE_NAME, SKELETON_ERRORS_FILE_NAME};
use crate::errors::SkeletonDataError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCategory {
    #[serde(rename = "Id")]
    pub id: i32,
    #[serde(rename = "Name")]
    pub name: String,
}

impl ErrorCategory {
    fn new(id: i32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }
}

fn default_joint_errors() -> Vec<ErrorCategory> {
    vec![
        ErrorCategory::new(0, "Valid"),
        ErrorCategory::new(1, "Misplaced"),
        ErrorCategory::new(2, "Occluded"),
        ErrorCategory::new(3, "Swapped"),
    ]
}

fn default_skeleton_errors() -> Vec<ErrorCategory> {
    vec![
        ErrorCategory::new(0, "Valid"),
        ErrorCategory::new(1, "Not a person"),
        ErrorCategory::new(2, "Wrong person"),
    ]
}

fn load_categories(path: &Path) -> Result<Vec<ErrorCategory>, SkeletonDataError> {
    let content = std::fs::read_to_string(path).map_err(|e| SkeletonDataError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut categories: Vec<ErrorCategory> =
        serde_json::from_str(&content).map_err(|e| SkeletonDataError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    if !categories.iter().any(|c| c.id == 0) {
        categories.insert(0, ErrorCategory::new(0, "Valid"));
    }
    Ok(categories)
}

/// Joint and person error categories
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorCatalog {
    joint: Vec<ErrorCategory>,
    skeleton: Vec<ErrorCategory>,
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self {
            joint: default_joint_errors(),
            skeleton: default_skeleton_errors(),
        }
    }
}

impl ErrorCatalog {
    pub fn new(joint: Vec<ErrorCategory>, skeleton: Vec<ErrorCategory>) -> Self {
        Self { joint, skeleton }
    }

    /// Load both category files from the recording root
    ///
    /// A missing or unreadable file falls back to the built-in categories.
    pub fn load(recording_root: &Path) -> Self {
        let mut catalog = Self::default();
        for (file, target) in [
            (JOINT_ERRORS_FILE_NAME, &mut catalog.joint),
            (SKELETON_ERRORS_FILE_NAME, &mut catalog.skeleton),
        ] {
            let path = recording_root.join(file);
            if !path.exists() {
                continue;
            }
            match load_categories(&path) {
                Ok(categories) => {
                    info!(path = %path.display(), count = categories.len(), "Error categories loaded");
                    *target = categories;
                }
                Err(e) => warn!(error = %e, "Using built-in error categories"),
            }
        }
        catalog
    }

    pub fn joint_errors(&self) -> &[ErrorCategory] {
        &self.joint
    }

    pub fn skeleton_errors(&self) -> &[ErrorCategory] {
        &self.skeleton
    }

    /// Code following `current` among the joint categories, wrapping
    pub fn next_joint_error(&self, current: i32) -> i32 {
        next_id(&self.joint, current)
    }

    /// Code following `current` among the person categories, wrapping
    pub fn next_skeleton_error(&self, current: i32) -> i32 {
        next_id(&self.skeleton, current)
    }

    pub fn joint_error_name(&self, id: i32) -> Option<&str> {
        self.joint.iter().find(|c| c.id == id).map(|c| c.name.as_str())
    }

    pub fn skeleton_error_name(&self, id: i32) -> Option<&str> {
        self.skeleton.iter().find(|c| c.id == id).map(|c| c.name.as_str())
    }
}

fn next_id(categories: &[ErrorCategory], current: i32) -> i32 {
    match categories.iter().position(|c| c.id == current) {
        Some(i) => categories[(i + 1) % categories.len()].id,
        None => categories.first().map_or(0, |c| c.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycling_wraps_to_valid() {
        let catalog = ErrorCatalog::default();
        assert_eq!(catalog.next_joint_error(0), 1);
        assert_eq!(catalog.next_joint_error(3), 0);
        assert_eq!(catalog.next_skeleton_error(2), 0);
        // Unknown codes restart the cycle
        assert_eq!(catalog.next_joint_error(42), 0);
    }

    #[test]
    fn test_load_from_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(JOINT_ERRORS_FILE_NAME),
            r#"[{"Id": 5, "Name": "Jitter"}, {"Id": 7, "Name": "Outside"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join(SKELETON_ERRORS_FILE_NAME), "not json").unwrap();

        let catalog = ErrorCatalog::load(dir.path());
        let ids: Vec<_> = catalog.joint_errors().iter().map(|c| c.id).collect();
        assert_eq!(ids, [0, 5, 7]);
        assert_eq!(catalog.joint_error_name(7), Some("Outside"));
        assert_eq!(catalog.next_joint_error(7), 0);
        assert_eq!(catalog.skeleton_errors(), ErrorCatalog::default().skeleton_errors());
    }
}
