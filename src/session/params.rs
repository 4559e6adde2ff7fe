// SPDX-License-Identifier: GPL-3.0-only

//! Recording session parameters

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::session::{
    DEFAULT_COUNTDOWN_SECONDS, DEFAULT_FRAME_LIMIT, DEFAULT_TIME_LIMIT_SECONDS,
    MAX_COUNTDOWN_SECONDS,
};

/// Recording conditions echoed verbatim into every manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(rename = "Sitting")]
    pub sitting: bool,
    #[serde(rename = "Background close")]
    pub background_close: bool,
    #[serde(rename = "Cramped")]
    pub cramped: bool,
    #[serde(rename = "Dark Clothing")]
    pub dark_clothing: bool,
    #[serde(rename = "Holding Weight")]
    pub holding_weight: bool,
    #[serde(rename = "Ankle Weight")]
    pub ankle_weight: bool,
    /// Height of the participant in meters
    #[serde(rename = "Height")]
    pub height: f32,
    /// Camera tilt in degrees
    #[serde(rename = "Angle")]
    pub angle: f32,
    /// Participant distance in meters, when measured
    #[serde(rename = "Distance", default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    /// Id of the exercise being recorded
    #[serde(rename = "Exercise", default, skip_serializing_if = "Option::is_none")]
    pub exercise: Option<String>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            sitting: true,
            background_close: true,
            cramped: false,
            dark_clothing: true,
            holding_weight: false,
            ankle_weight: false,
            height: 1.8,
            angle: 20.0,
            distance: None,
            exercise: None,
        }
    }
}

/// Limits, timing and mode switches of a recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionParameters {
    /// Stop after `frame_limit` frames
    pub limit_frames: bool,
    pub frame_limit: i64,
    /// Stop after `time_limit_seconds`
    pub limit_time: bool,
    pub time_limit_seconds: f64,
    /// Countdown between pressing record and the first frame, 0 starts at once
    pub countdown_seconds: u32,
    /// Recordings per exercise before moving on
    pub repeat_n_times: u32,
    /// Keep updating and rendering the live cloud while recording
    pub stream_while_recording: bool,
    /// Route frames through the skeleton detector
    pub skeleton_mode: bool,
    pub environment: Environment,
}

impl Default for SessionParameters {
    fn default() -> Self {
        Self {
            limit_frames: false,
            frame_limit: DEFAULT_FRAME_LIMIT,
            limit_time: true,
            time_limit_seconds: DEFAULT_TIME_LIMIT_SECONDS,
            countdown_seconds: DEFAULT_COUNTDOWN_SECONDS,
            repeat_n_times: 1,
            stream_while_recording: false,
            skeleton_mode: false,
            environment: Environment::default(),
        }
    }
}

impl SessionParameters {
    /// Bring user supplied values into range
    ///
    /// A negative limit becomes 0 and switches its limit off.
    pub fn clamp(&mut self) {
        if self.frame_limit < 0 {
            warn!(frame_limit = self.frame_limit, "Negative frame limit, disabling");
            self.frame_limit = 0;
            self.limit_frames = false;
        }
        if self.time_limit_seconds < 0.0 || !self.time_limit_seconds.is_finite() {
            warn!(time_limit = self.time_limit_seconds, "Invalid time limit, disabling");
            self.time_limit_seconds = 0.0;
            self.limit_time = false;
        }
        self.countdown_seconds = self.countdown_seconds.min(MAX_COUNTDOWN_SECONDS);
        self.repeat_n_times = self.repeat_n_times.max(1);
    }

    /// Whether a recording at `frames` / `seconds` has run past its limits
    pub fn limit_reached(&self, frames: u64, seconds: f64) -> bool {
        let over_frames = self.limit_frames && frames as i64 > self.frame_limit;
        let over_time = self.limit_time && seconds > self.time_limit_seconds;
        over_frames || over_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_limits_are_clamped_and_disabled() {
        let mut params = SessionParameters {
            limit_frames: true,
            frame_limit: -5,
            limit_time: true,
            time_limit_seconds: -1.0,
            countdown_seconds: 60,
            repeat_n_times: 0,
            ..Default::default()
        };
        params.clamp();
        assert_eq!(params.frame_limit, 0);
        assert!(!params.limit_frames);
        assert_eq!(params.time_limit_seconds, 0.0);
        assert!(!params.limit_time);
        assert_eq!(params.countdown_seconds, MAX_COUNTDOWN_SECONDS);
        assert_eq!(params.repeat_n_times, 1);
    }

    #[test]
    fn test_limits_are_exclusive() {
        let params = SessionParameters {
            limit_frames: true,
            frame_limit: 10,
            limit_time: false,
            ..Default::default()
        };
        assert!(!params.limit_reached(10, 1000.0));
        assert!(params.limit_reached(11, 0.0));

        let timed = SessionParameters::default();
        assert!(!timed.limit_reached(10_000, 30.0));
        assert!(timed.limit_reached(0, 30.01));
    }

    #[test]
    fn test_environment_json_keys() {
        let json = serde_json::to_value(Environment::default()).unwrap();
        assert_eq!(json["Background close"], true);
        assert_eq!(json["Dark Clothing"], true);
        assert_eq!(json["Height"], 1.8f32 as f64);
        assert!(json.get("Exercise").is_none());
    }
}
