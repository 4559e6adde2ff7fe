// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use std::time::Duration;

use depthfuse::Config;
use depthfuse::pointcloud::{Colormap, PixelOrder};
use depthfuse::session::SessionSettings;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.pixel_order, PixelOrder::VerticalFlip);
    assert_eq!(config.colormap, Colormap::default());
    assert!(
        config.recording_root.ends_with("depthfuse"),
        "Recordings should default to an app folder"
    );
    assert!(config.session.countdown_seconds <= 10);
    assert_eq!(config.session.repeat_n_times, 1);
}

#[test]
fn test_config_feeds_session_settings() {
    let config = Config {
        frame_wait_timeout_ms: 250,
        color_width: 320,
        color_height: 240,
        pixel_order: PixelOrder::Native,
        ..Default::default()
    };
    let settings = SessionSettings::from(&config);

    assert_eq!(settings.recording_root, config.recording_root);
    assert_eq!(settings.capture.frame_wait_timeout, Duration::from_millis(250));
    assert_eq!(settings.capture.color_size.width, 320);
    assert_eq!(settings.capture.color_size.height, 240);
    assert_eq!(settings.cloud.pixel_order, PixelOrder::Native);
}

#[test]
fn test_out_of_range_values_are_sanitized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"score_threshold": 3.0, "cube_half_width_per_meter": -1.0,
            "session": {"countdown_seconds": 99, "repeat_n_times": 0,
                        "time_limit_seconds": -5.0, "limit_time": true}}"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.score_threshold, 1.0);
    assert_eq!(config.cube_half_width_per_meter, 0.0015);
    assert_eq!(config.session.countdown_seconds, 10);
    assert_eq!(config.session.repeat_n_times, 1);
    assert!(!config.session.limit_time);
}
