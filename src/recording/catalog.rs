// SPDX-License-Identifier: GPL-3.0-only

//! Catalog of recordings below the recording root
//!
//! Manifests are looked up in the root itself (older layout) and in each
//! session directory. Files whose name contains one of
//! [`EXCLUDED_NAME_PATTERNS`] are sidecars, not manifests.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::manifest::RecordingManifest;
use crate::constants::recording::EXCLUDED_NAME_PATTERNS;
use crate::storage;

/// A parsed manifest and where it was found
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub manifest: RecordingManifest,
}

fn is_excluded(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    EXCLUDED_NAME_PATTERNS.iter().any(|p| name.contains(p))
}

#[derive(Debug, Clone)]
pub struct RecordingCatalog {
    root: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl RecordingCatalog {
    /// Empty catalog; call [`RecordingCatalog::refresh`] to scan
    pub fn new(recording_root: impl Into<PathBuf>) -> Self {
        Self {
            root: recording_root.into(),
            entries: Vec::new(),
        }
    }

    /// Catalog scanned once
    pub fn scan(recording_root: impl Into<PathBuf>) -> Self {
        let mut catalog = Self::new(recording_root);
        catalog.refresh();
        catalog
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-scan the recording root
    ///
    /// Files that fail to parse are logged and left out. The result is in
    /// reverse discovery order, then stably sorted newest first by the
    /// timestamp in the session name; entries without one keep their
    /// position relative to each other at the end.
    pub fn refresh(&mut self) -> usize {
        let mut candidates = storage::json_files(&self.root);
        for dir in storage::subdirectories(&self.root) {
            candidates.extend(storage::json_files(&dir));
        }

        let mut entries: Vec<CatalogEntry> = candidates
            .into_iter()
            .filter(|path| !is_excluded(path))
            .filter_map(|path| match RecordingManifest::load(&path) {
                Ok(manifest) => Some(CatalogEntry { path, manifest }),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable recording");
                    None
                }
            })
            .collect();

        entries.reverse();
        entries.sort_by(|a, b| {
            match (a.manifest.recorded_at(), b.manifest.recorded_at()) {
                (Some(ta), Some(tb)) => tb.cmp(&ta),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });

        info!(root = ?self.root, recordings = entries.len(), "Recording catalog refreshed");
        self.entries = entries;
        self.entries.len()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    /// Entry whose session name matches `name` exactly
    pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.manifest.name == name)
    }
}
