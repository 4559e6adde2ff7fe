// SPDX-License-Identifier: GPL-3.0-only

//! Storage utilities for recording directories and session names

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use tracing::debug;

/// Prefix of every session name
pub const SESSION_PREFIX: &str = "Session ";

const SESSION_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const FILE_SAFE_TIME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Session name for a recording started at `time`, e.g. `Session 2024-05-01T10:11:12`
pub fn session_name<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}{}", SESSION_PREFIX, time.format(SESSION_TIME_FORMAT))
}

/// Session name for the current local time
pub fn session_name_now() -> String {
    session_name(&Local::now())
}

/// Name usable as a file or directory name on every platform
pub fn file_safe_name(name: &str) -> String {
    name.replace(':', "-").replace(' ', "_")
}

/// Timestamp embedded in a session name, accepting both display and file-safe forms
pub fn parse_session_time(name: &str) -> Option<NaiveDateTime> {
    let rest = name
        .strip_prefix(SESSION_PREFIX)
        .or_else(|| name.strip_prefix("Session_"))?;
    // Anything after the timestamp is a repetition suffix
    let rest = rest.get(..19)?;
    NaiveDateTime::parse_from_str(rest, SESSION_TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(rest, FILE_SAFE_TIME_FORMAT))
        .ok()
}

/// `base`, or `base #2`, `base #3`, ... if a session directory of that
/// name already exists below `recording_root`
pub fn unique_session_name(recording_root: &Path, base: &str) -> String {
    let mut name = base.to_string();
    let mut n = 2;
    while recording_root.join(file_safe_name(&name)).exists() {
        name = format!("{} #{}", base, n);
        n += 1;
    }
    name
}

/// Default recording root: `~/Videos/depthfuse`, falling back to the home directory
pub fn default_recording_root() -> PathBuf {
    dirs::video_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(crate::constants::APP_ID)
}

/// JSON files directly inside `dir`, in directory order
///
/// Only regular files are returned; directories named `*.json` are skipped.
pub fn json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            let is_json = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if is_file && is_json {
                files.push(path);
            }
        }
    }
    debug!(dir = ?dir, count = files.len(), "Scanned for JSON files");
    files
}

/// Subdirectories directly inside `dir`
pub fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_session_names() {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 10, 11, 12).unwrap();
        let name = session_name(&time);
        assert_eq!(name, "Session 2024-05-01T10:11:12");
        assert_eq!(file_safe_name(&name), "Session_2024-05-01T10-11-12");
    }

    #[test]
    fn test_parse_session_time_both_forms() {
        let expected = NaiveDateTime::parse_from_str("2024-05-01T10:11:12", SESSION_TIME_FORMAT).unwrap();
        assert_eq!(parse_session_time("Session 2024-05-01T10:11:12"), Some(expected));
        assert_eq!(parse_session_time("Session_2024-05-01T10-11-12"), Some(expected));
        assert_eq!(parse_session_time("Session 2024-05-01T10:11:12 #3"), Some(expected));
        assert_eq!(parse_session_time("Squats"), None);
    }

    #[test]
    fn test_unique_session_name() {
        let dir = tempfile::tempdir().unwrap();
        let base = "Session 2024-05-01T10:11:12";
        assert_eq!(unique_session_name(dir.path(), base), base);
        std::fs::create_dir(dir.path().join(file_safe_name(base))).unwrap();
        assert_eq!(
            unique_session_name(dir.path(), base),
            "Session 2024-05-01T10:11:12 #2"
        );
    }

    #[test]
    fn test_json_files_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("c.json")).unwrap();
        let files = json_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.json"));
    }
}
