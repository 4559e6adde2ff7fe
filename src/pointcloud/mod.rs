// SPDX-License-Identifier: GPL-3.0-only

//! Fused point cloud of every camera in the session
//!
//! Each camera contributes one point per depth pixel. The per-camera point
//! arrays are concatenated in camera order into a single vertex buffer; the
//! offset table records where each camera's range starts:
//!
//! ```text
//! offsets: [0, n0, n0+n1, ..., total, total + 1]
//!           │   │                │      └ sentinel
//!           │   │                └ end of the last camera
//!           │   └ start of camera 1
//!           └ start of camera 0
//! ```
//!
//! Every frame only the ranges of cameras that produced a frame are
//! uploaded, followed by one draw over the whole index buffer.

pub mod bounds;
pub mod colormap;
pub mod kdtree;
pub mod point;
pub mod renderer;

pub use bounds::BoundingBox;
pub use colormap::{ColorTable, Colormap};
pub use kdtree::KdTree;
pub use point::{Point, PointVertex};
pub use renderer::{DrawUniforms, HeadlessRenderer, PointRenderer, RenderResult};

use std::ops::Range;

use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backends::camera::{BackendError, CameraSet, Resolution};
use crate::constants::point_cloud::CUBE_HALF_WIDTH_PER_METER;
use crate::recording::manifest::{Rotation, Translation};

/// How point rows map onto sensor rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelOrder {
    /// Point `i` reads sample `i`
    Native,
    /// Point row `r` reads sensor row `h - 1 - r`
    #[default]
    VerticalFlip,
    /// Point `i` reads sample `w*h - 1 - i`
    Rotate180,
}

impl PixelOrder {
    /// Sensor sample index feeding point `index` of a camera
    pub fn source_index(self, index: usize, resolution: Resolution) -> usize {
        let width = resolution.width as usize;
        let count = resolution.pixel_count();
        match self {
            PixelOrder::Native => index,
            PixelOrder::VerticalFlip => {
                let (row, col) = (index / width, index % width);
                let rows = count / width;
                (rows - 1 - row) * width + col
            }
            PixelOrder::Rotate180 => count - 1 - index,
        }
    }
}

/// Whether `update` pulls new frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    Stream,
    Paused,
}

/// Shared model transform of the fused cloud, angles in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTransform {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub translation: Vector3<f32>,
    pub scale: f32,
}

impl Default for ModelTransform {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            translation: Vector3::zeros(),
            scale: 1.0,
        }
    }
}

impl ModelTransform {
    pub fn from_manifest(rotation: Option<&Rotation>, translation: Option<&Translation>) -> Self {
        let mut transform = Self::default();
        if let Some(r) = rotation {
            transform.yaw = r.yaw;
            transform.pitch = r.pitch;
            transform.roll = r.roll;
        }
        if let Some(t) = translation {
            transform.translation = Vector3::new(t.x, t.y, t.z);
        }
        transform
    }

    pub fn rotation(&self) -> Rotation {
        Rotation {
            roll: self.roll,
            pitch: self.pitch,
            yaw: self.yaw,
        }
    }

    pub fn manifest_translation(&self) -> Translation {
        Translation {
            x: self.translation.x,
            y: self.translation.y,
            z: self.translation.z,
        }
    }

    /// Rotation (yaw about Y, then pitch about X, then roll about Z), then
    /// translation, then uniform scale
    pub fn matrix(&self) -> Matrix4<f32> {
        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), self.yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.pitch)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), self.roll);
        Matrix4::new_scaling(self.scale)
            * Matrix4::new_translation(&self.translation)
            * rotation.to_homogeneous()
    }
}

/// Construction options
#[derive(Debug, Clone, Copy)]
pub struct PointCloudOptions {
    pub colormap: Colormap,
    pub pixel_order: PixelOrder,
    pub cube_half_width_per_meter: f32,
}

impl Default for PointCloudOptions {
    fn default() -> Self {
        Self {
            colormap: Colormap::default(),
            pixel_order: PixelOrder::default(),
            cube_half_width_per_meter: CUBE_HALF_WIDTH_PER_METER,
        }
    }
}

/// Outcome of one [`PointCloud::update`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Cameras whose range was refreshed
    pub updated: Vec<usize>,
    /// Cameras disabled during this update
    pub disabled: Vec<usize>,
}

#[derive(Debug, Clone)]
struct CameraRange {
    name: String,
    resolution: Resolution,
    meters_per_unit: f32,
}

pub struct PointCloud {
    cameras: Vec<CameraRange>,
    offsets: Vec<usize>,
    points: Vec<Point>,
    vertices: Vec<PointVertex>,
    bounds: Vec<BoundingBox>,
    colors: ColorTable,
    pixel_order: PixelOrder,
    half_width_per_meter: f32,
    transform: ModelTransform,
    state: StreamState,
}

impl PointCloud {
    /// Build the points of every camera in `cameras` and allocate the
    /// renderer buffers
    ///
    /// Disabled cameras still get their range so the layout matches the
    /// camera order; their points stay at zero depth.
    pub fn new(
        cameras: &CameraSet,
        renderer: &mut dyn PointRenderer,
        options: &PointCloudOptions,
    ) -> RenderResult<Self> {
        let mut ranges = Vec::with_capacity(cameras.len());
        let mut offsets = Vec::with_capacity(cameras.len() + 2);
        let mut points = Vec::new();
        offsets.push(0);

        for slot in cameras.iter() {
            let camera = slot.camera();
            let resolution = camera.resolution();
            let intrinsics = camera.intrinsics();
            let camera_id = camera.identity().id;

            points.reserve(resolution.pixel_count());
            for y in 0..resolution.height {
                for x in 0..resolution.width {
                    let coefficients = intrinsics.back_projection(x as f32, y as f32);
                    points.push(Point::new(coefficients, camera_id));
                }
            }
            offsets.push(points.len());
            ranges.push(CameraRange {
                name: camera.identity().name.clone(),
                resolution,
                meters_per_unit: camera.meters_per_unit(),
            });
        }
        let total = points.len();
        offsets.push(total + 1);

        let vertices: Vec<PointVertex> = points.iter().map(Point::vertex).collect();
        let indices: Vec<u32> = (0..total as u32).collect();
        renderer.allocate(&vertices, &indices)?;

        info!(
            cameras = ranges.len(),
            points = total,
            pixel_order = ?options.pixel_order,
            colormap = options.colormap.display_name(),
            "Point cloud built"
        );

        Ok(Self {
            bounds: vec![BoundingBox::default(); ranges.len()],
            cameras: ranges,
            offsets,
            points,
            vertices,
            colors: ColorTable::new(options.colormap),
            pixel_order: options.pixel_order,
            half_width_per_meter: options.cube_half_width_per_meter,
            transform: ModelTransform::default(),
            state: StreamState::Stream,
        })
    }

    /// Pull one frame from every enabled camera and upload what changed
    ///
    /// A camera whose `depth()` fails is disabled and skipped from then on;
    /// the remaining cameras keep updating.
    pub fn update(
        &mut self,
        cameras: &mut CameraSet,
        renderer: &mut dyn PointRenderer,
    ) -> RenderResult<UpdateReport> {
        let mut report = UpdateReport::default();
        if self.state == StreamState::Paused {
            return Ok(report);
        }

        let count = self.cameras.len();
        for (index, slot) in cameras.iter_mut().enumerate().take(count) {
            if !slot.is_enabled() {
                continue;
            }

            let outcome = match slot.camera_mut().depth() {
                Ok(Some(frame)) => self.ingest(index, frame).map(|_| true),
                Ok(None) => Ok(false),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(true) => {
                    self.upload_camera(index, renderer)?;
                    report.updated.push(index);
                }
                Ok(false) => {
                    debug!(camera = %self.cameras[index].name, "No depth frame");
                }
                Err(e) => {
                    slot.disable(&e);
                    report.disabled.push(index);
                }
            }
        }

        Ok(report)
    }

    /// Recompute the points of camera `index` from a raw depth frame
    ///
    /// Only the CPU side changes; follow with [`PointCloud::upload_camera`].
    pub fn ingest(&mut self, index: usize, frame: &[u16]) -> Result<(), BackendError> {
        let camera = self
            .cameras
            .get(index)
            .ok_or_else(|| BackendError::Other(format!("camera {} is not in the cloud", index)))?;
        let expected = camera.resolution.pixel_count();
        if frame.len() != expected {
            return Err(BackendError::UnexpectedFormat(format!(
                "{} samples, expected {}",
                frame.len(),
                expected
            )));
        }
        self.apply_frame(index, frame);
        Ok(())
    }

    /// Push the vertex range of camera `index` to the renderer
    pub fn upload_camera(&self, index: usize, renderer: &mut dyn PointRenderer) -> RenderResult<()> {
        let range = self
            .camera_range(index)
            .ok_or_else(|| format!("camera {} is not in the cloud", index))?;
        renderer.upload(range.start, &self.vertices[range])
    }

    fn apply_frame(&mut self, index: usize, frame: &[u16]) {
        let range = self.offsets[index]..self.offsets[index + 1];
        let CameraRange {
            resolution,
            meters_per_unit,
            ..
        } = self.cameras[index];
        let bounds = &mut self.bounds[index];
        bounds.reset();

        for (k, point) in self.points[range.clone()].iter_mut().enumerate() {
            let raw = frame[self.pixel_order.source_index(k, resolution)];
            let depth = raw as f32 * meters_per_unit;
            point.set_depth(depth, self.colors.color_for_depth(depth));
            if point.is_valid() {
                bounds.extend(point.position());
            }
            self.vertices[range.start + k] = point.vertex();
        }
    }

    /// Draw the whole cloud with the current model transform
    pub fn render(
        &self,
        renderer: &mut dyn PointRenderer,
        view_projection: &Matrix4<f32>,
    ) -> RenderResult<()> {
        let uniforms = DrawUniforms::new(
            view_projection,
            &self.transform.matrix(),
            self.half_width_per_meter,
        );
        renderer.draw(&uniforms, self.total_elements() as u32)
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// Cumulative offsets with the trailing `total + 1` sentinel
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn total_elements(&self) -> usize {
        self.offsets[self.cameras.len()]
    }

    pub fn camera_range(&self, index: usize) -> Option<Range<usize>> {
        (index < self.cameras.len()).then(|| self.offsets[index]..self.offsets[index + 1])
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn camera_points(&self, index: usize) -> Option<&[Point]> {
        self.camera_range(index).map(|r| &self.points[r])
    }

    pub fn vertices(&self) -> &[PointVertex] {
        &self.vertices
    }

    /// Bounding box of the measured points of one camera
    pub fn bounds(&self, index: usize) -> Option<&BoundingBox> {
        self.bounds.get(index)
    }

    pub fn stream_state(&self) -> StreamState {
        self.state
    }

    pub fn pause_stream(&mut self) {
        self.state = StreamState::Paused;
    }

    pub fn resume_stream(&mut self) {
        self.state = StreamState::Stream;
    }

    pub fn transform(&self) -> &ModelTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: ModelTransform) {
        self.transform = transform;
    }

    pub fn colormap(&self) -> Colormap {
        self.colors.colormap()
    }

    /// Switch colormap; takes effect with the next frame of each camera
    pub fn set_colormap(&mut self, colormap: Colormap) {
        self.colors = ColorTable::new(colormap);
    }

    /// Mean distance from camera `b`'s measured points, moved by
    /// `b_to_a`, to their nearest measured point of camera `a`
    ///
    /// Returns `None` when either camera has no measured points.
    pub fn alignment_residual(&self, a: usize, b: usize, b_to_a: &Matrix4<f32>) -> Option<f32> {
        let reference: Vec<[f32; 3]> = self
            .camera_points(a)?
            .iter()
            .filter(|p| p.is_valid())
            .map(Point::position)
            .collect();
        if reference.is_empty() {
            return None;
        }
        let tree = KdTree::build(reference);

        let mut sum = 0.0f64;
        let mut count = 0usize;
        for p in self.camera_points(b)?.iter().filter(|p| p.is_valid()) {
            let [x, y, z] = p.position();
            let moved = b_to_a.transform_point(&Point3::new(x, y, z));
            if let Some((_, d2)) = tree.nearest(&[moved.x, moved.y, moved.z]) {
                sum += (d2 as f64).sqrt();
                count += 1;
            }
        }
        if count == 0 {
            warn!(camera = %self.cameras[b].name, "No measured points to align");
            return None;
        }
        Some((sum / count as f64) as f32)
    }
}
