// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Application identifier used for the config directory
pub const APP_ID: &str = "depthfuse";

/// Config file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Camera timing constants
pub mod timing {
    use super::Duration;

    /// Default wait for a single depth frame before the camera is considered failed
    pub const FRAME_WAIT_TIMEOUT: Duration = Duration::from_millis(100);

    /// Tick period of the headless CLI loop (about 30 fps)
    pub const TICK_INTERVAL: Duration = Duration::from_millis(33);
}

/// Point cloud rendering constants
pub mod point_cloud {
    /// Depth in meters mapped to the top of every colormap
    pub const DEPTH_COLOR_RANGE_M: f32 = 6.0;

    /// Number of discrete entries sampled from a colormap
    pub const NUM_COLORS: usize = 100;

    /// Cube vertices drawn for each point
    pub const VERTICES_PER_POINT: usize = 8;

    /// Cube half width per meter of depth
    pub const CUBE_HALF_WIDTH_PER_METER: f32 = 0.0015;

    /// Unit cube corners, scaled by the half width in the vertex shader
    ///
    /// 0..4 on the low-y face (x-,z-), (x+,z-), (x+,z+), (x-,z+), 4..8 the
    /// same on the high-y face.
    pub const CUBE_CORNERS: [[f32; 3]; VERTICES_PER_POINT] = [
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, -1.0, 1.0],
        [-1.0, -1.0, 1.0],
        [-1.0, 1.0, -1.0],
        [1.0, 1.0, -1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ];

    /// Triangle list describing one point cube, 12 triangles over 8 vertices
    pub const CUBE_INDICES: [u32; 36] = [
        0, 1, 2, 0, 2, 3, 0, 1, 5, 0, 5, 4, 0, 3, 7, 0, 7, 4, 1, 2, 6, 1, 6, 5, 2, 3, 7, 2, 7, 6,
        4, 5, 6, 4, 6, 7,
    ];

    /// Tree levels whose subtrees are built on their own thread
    pub const KD_PARALLEL_DEPTH: usize = 2;
}

/// Recording directory layout
pub mod recording {
    /// Extension of the raw depth container
    pub const DEPTH_EXTENSION: &str = "depth";

    /// Suffix of the per-camera color frame directory
    pub const COLOR_DIR_SUFFIX: &str = "_color";

    /// Skeleton sidecar file name inside a session directory
    pub const SKELETON_FILE_NAME: &str = "Skeleton.json";

    /// Exercise definitions in the recording root
    pub const EXERCISES_FILE_NAME: &str = "Exercises.json";

    /// Joint error categories in the recording root
    pub const JOINT_ERRORS_FILE_NAME: &str = "JointErrors.json";

    /// Skeleton error categories in the recording root
    pub const SKELETON_ERRORS_FILE_NAME: &str = "SkeletonErrors.json";

    /// JSON files whose names contain one of these are never manifests
    pub const EXCLUDED_NAME_PATTERNS: [&str; 3] = ["Skeleton", "Exercise", "Errors"];

    /// Current manifest schema version
    pub const MANIFEST_VERSION: u32 = 2;
}

/// Session parameter limits
pub mod session {
    /// Longest allowed countdown in seconds
    pub const MAX_COUNTDOWN_SECONDS: u32 = 10;

    /// Default countdown before recording starts
    pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 10;

    /// Default frame limit
    pub const DEFAULT_FRAME_LIMIT: i64 = 100;

    /// Default time limit in seconds
    pub const DEFAULT_TIME_LIMIT_SECONDS: f64 = 30.0;
}

/// Color probing
pub mod color {
    /// Number of color source indices tried before giving up
    pub const DEFAULT_PROBE_DEPTH: u32 = 4;

    /// Default color frame size requested from probed sources
    pub const DEFAULT_WIDTH: u32 = 640;
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// JPEG quality for recorded color frames
    pub const JPEG_QUALITY: u8 = 90;
}

/// Skeleton review defaults
pub mod skeleton {
    /// Joints with a lower score are drawn as uncertain
    pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;

    /// Radius of joint markers in the overlay
    pub const JOINT_RADIUS: i32 = 4;
}
