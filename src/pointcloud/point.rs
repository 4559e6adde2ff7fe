// SPDX-License-Identifier: GPL-3.0-only

//! Per-pixel point state and its GPU record

/// GPU instance record, one per point
///
/// The shader reconstructs the camera-space position as
/// `(coefficients * depth, depth)` and draws a cube around it whose half
/// width grows with the depth.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointVertex {
    pub coefficients: [f32; 2],
    pub depth: f32,
    pub color: [f32; 3],
    pub camera_id: u32,
}

/// One depth pixel of one camera
///
/// The back-projection coefficients are fixed at construction; only the
/// depth and the color derived from it change per frame.
#[derive(Debug, Clone)]
pub struct Point {
    coefficients: [f32; 2],
    camera_id: u32,
    depth: f32,
    color: [f32; 3],
}

impl Point {
    pub fn new(coefficients: [f32; 2], camera_id: u32) -> Self {
        Self {
            coefficients,
            camera_id,
            depth: 0.0,
            color: [0.0; 3],
        }
    }

    pub fn coefficients(&self) -> [f32; 2] {
        self.coefficients
    }

    pub fn camera_id(&self) -> u32 {
        self.camera_id
    }

    /// Depth in meters
    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn color(&self) -> [f32; 3] {
        self.color
    }

    /// Camera-space position in meters
    pub fn position(&self) -> [f32; 3] {
        [
            self.coefficients[0] * self.depth,
            self.coefficients[1] * self.depth,
            self.depth,
        ]
    }

    /// Whether the sensor measured this pixel
    pub fn is_valid(&self) -> bool {
        self.depth > 0.0
    }

    pub fn set_depth(&mut self, depth: f32, color: [f32; 3]) {
        self.depth = depth;
        self.color = color;
    }

    pub fn vertex(&self) -> PointVertex {
        PointVertex {
            coefficients: self.coefficients,
            depth: self.depth,
            color: self.color,
            camera_id: self.camera_id,
        }
    }
}
