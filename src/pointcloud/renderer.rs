// SPDX-License-Identifier: GPL-3.0-only

//! Renderer boundary of the point cloud
//!
//! The cloud owns the CPU side of the vertex data and hands it to a
//! [`PointRenderer`] in three steps: one allocation per rebuild, partial
//! uploads per camera, and one draw call per frame.

use image::RgbaImage;
use nalgebra::Matrix4;

use super::point::PointVertex;

/// Renderer errors are reported as strings, like the GPU helpers
pub type RenderResult<T> = Result<T, String>;

/// Per-draw uniform block
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniforms {
    /// Column-major view-projection matrix
    pub view_projection: [[f32; 4]; 4],
    /// Column-major model matrix
    pub model: [[f32; 4]; 4],
    /// Point cube half width per meter of depth
    pub cube_half_width_per_meter: f32,
    pub _padding: [f32; 3],
}

impl DrawUniforms {
    pub fn new(
        view_projection: &Matrix4<f32>,
        model: &Matrix4<f32>,
        cube_half_width_per_meter: f32,
    ) -> Self {
        Self {
            view_projection: (*view_projection).into(),
            model: (*model).into(),
            cube_half_width_per_meter,
            _padding: [0.0; 3],
        }
    }
}

pub trait PointRenderer {
    /// Replace all buffers; called whenever the camera set changes
    fn allocate(
        &mut self,
        vertices: &[PointVertex],
        indices: &[u32],
    ) -> RenderResult<()>;

    /// Overwrite the vertices starting at element `first`
    fn upload(
        &mut self,
        first: usize,
        vertices: &[PointVertex],
    ) -> RenderResult<()>;

    /// One draw call over the points behind the first `index_count` indices
    fn draw(&mut self, uniforms: &DrawUniforms, index_count: u32) -> RenderResult<()>;

    /// Image of the last draw, for renderers that produce one
    fn snapshot(&self) -> RenderResult<Option<RgbaImage>> {
        Ok(None)
    }
}

/// Renderer without a GPU
///
/// Keeps a mirror of the vertex buffer and records every upload and draw,
/// so the CLI can run on machines without Vulkan.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    vertices: Vec<PointVertex>,
    indices: Vec<u32>,
    uploads: Vec<(usize, usize)>,
    draws: Vec<(DrawUniforms, u32)>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertices(&self) -> &[PointVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// `(first, len)` of every upload since the last allocation
    pub fn uploads(&self) -> &[(usize, usize)] {
        &self.uploads
    }

    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    pub fn last_draw(&self) -> Option<&(DrawUniforms, u32)> {
        self.draws.last()
    }
}

impl PointRenderer for HeadlessRenderer {
    fn allocate(
        &mut self,
        vertices: &[PointVertex],
        indices: &[u32],
    ) -> RenderResult<()> {
        self.vertices = vertices.to_vec();
        self.indices = indices.to_vec();
        self.uploads.clear();
        Ok(())
    }

    fn upload(
        &mut self,
        first: usize,
        vertices: &[PointVertex],
    ) -> RenderResult<()> {
        let end = first + vertices.len();
        let len = self.vertices.len();
        let target = self.vertices.get_mut(first..end).ok_or_else(|| {
            format!(
                "Upload range {}..{} exceeds vertex buffer of {}",
                first, end, len
            )
        })?;
        target.copy_from_slice(vertices);
        self.uploads.push((first, vertices.len()));
        Ok(())
    }

    fn draw(&mut self, uniforms: &DrawUniforms, index_count: u32) -> RenderResult<()> {
        if index_count as usize > self.indices.len() {
            return Err(format!(
                "Draw of {} indices exceeds index buffer of {}",
                index_count,
                self.indices.len()
            ));
        }
        self.draws.push((*uniforms, index_count));
        Ok(())
    }
}
