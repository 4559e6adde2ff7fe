// SPDX-License-Identifier: GPL-3.0-only

//! GPU point renderer
//!
//! Draws the fused cloud into an offscreen color target with a depth
//! buffer. Every point is one instance of a small cube: the instance buffer
//! holds the [`PointVertex`] records, the cube corners and triangle indices
//! are shared by all instances. The instance buffer is sized once per
//! camera-set rebuild and refreshed per camera range with
//! `Queue::write_buffer`.

use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

use crate::constants::point_cloud::{CUBE_CORNERS, CUBE_INDICES};
use crate::pointcloud::{DrawUniforms, PointRenderer, PointVertex, RenderResult};

/// Information about the created GPU device
#[derive(Debug)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
}

const SHADER: &str = include_str!("point_cloud.wgsl");
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Create a wgpu device and queue for offscreen rendering.
///
/// # Arguments
///
/// * `label` - A label for the device (for debugging)
///
/// # Returns
///
/// A tuple of (Device, Queue, GpuDeviceInfo) or an error message
pub async fn create_device(
    label: &str,
) -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>, GpuDeviceInfo), String> {
    info!(label = label, "Creating GPU device");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::VULKAN,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| format!("Failed to find suitable GPU adapter: {}", e))?;

    let adapter_info = adapter.get_info();

    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "GPU adapter selected"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| format!("Failed to create GPU device: {}", e))?;

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
    };

    Ok((Arc::new(device), Arc::new(queue), info))
}

struct Buffers {
    instances: wgpu::Buffer,
    instance_count: usize,
    /// Length of the cloud's point index list; bounds the instance range
    index_count: usize,
}

/// Offscreen wgpu implementation of [`PointRenderer`]
pub struct WgpuPointRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    corner_buffer: wgpu::Buffer,
    cube_index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    color_target: wgpu::Texture,
    depth_target: wgpu::Texture,
    width: u32,
    height: u32,
    buffers: Option<Buffers>,
}

impl WgpuPointRenderer {
    /// Create a renderer drawing into a `width`×`height` target
    pub async fn new(width: u32, height: u32) -> Result<Self, String> {
        let (device, queue, gpu_info) = create_device("depthfuse_point_renderer").await?;

        info!(
            adapter_name = %gpu_info.adapter_name,
            adapter_backend = ?gpu_info.backend,
            width,
            height,
            "GPU device created for point rendering"
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("point_cloud_shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("point_cloud_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("point_cloud_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let instance_attributes = wgpu::vertex_attr_array![
            0 => Float32x2,
            1 => Float32,
            2 => Float32x3,
            3 => Uint32
        ];
        let corner_attributes = wgpu::vertex_attr_array![4 => Float32x3];
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("point_cloud_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 3]>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &corner_attributes,
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<PointVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &instance_attributes,
                    },
                ],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        let corner_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("point_cloud_cube_corners"),
            contents: bytemuck::cast_slice(&CUBE_CORNERS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let cube_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("point_cloud_cube_indices"),
            contents: bytemuck::cast_slice(&CUBE_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("point_cloud_uniform_buffer"),
            size: std::mem::size_of::<DrawUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("point_cloud_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color_target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("point_cloud_color_target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth_target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("point_cloud_depth_target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            corner_buffer,
            cube_index_buffer,
            uniform_buffer,
            bind_group,
            color_target,
            depth_target,
            width,
            height,
            buffers: None,
        })
    }

    /// Read back the last drawn frame
    pub fn read_back(&self) -> Result<RgbaImage, String> {
        let unpadded = self.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("point_cloud_staging_buffer"),
            size: (padded * self.height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("point_cloud_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color_target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        receiver
            .recv()
            .map_err(|_| "Failed to receive staging buffer mapping")?
            .map_err(|e| format!("Failed to map staging buffer: {:?}", e))?;

        let mut rgba = Vec::with_capacity((unpadded * self.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded as usize) {
                rgba.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        staging.unmap();

        RgbaImage::from_raw(self.width, self.height, rgba)
            .ok_or_else(|| "Readback size mismatch".to_string())
    }
}

impl PointRenderer for WgpuPointRenderer {
    fn allocate(&mut self, vertices: &[PointVertex], indices: &[u32]) -> RenderResult<()> {
        debug!(
            instances = vertices.len(),
            indices = indices.len(),
            "Allocating point cloud buffers"
        );
        // Zero-sized buffers are not allowed
        let instance_size = (std::mem::size_of_val(vertices) as u64).max(4);

        let instances = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("point_cloud_instance_buffer"),
            size: instance_size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&instances, 0, bytemuck::cast_slice(vertices));

        self.buffers = Some(Buffers {
            instances,
            instance_count: vertices.len(),
            index_count: indices.len(),
        });
        Ok(())
    }

    fn upload(&mut self, first: usize, vertices: &[PointVertex]) -> RenderResult<()> {
        let buffers = self.buffers.as_ref().ok_or("Instance buffer not allocated")?;
        if first + vertices.len() > buffers.instance_count {
            return Err(format!(
                "Upload range {}..{} exceeds instance buffer of {}",
                first,
                first + vertices.len(),
                buffers.instance_count
            ));
        }
        let offset = (first * std::mem::size_of::<PointVertex>()) as u64;
        self.queue
            .write_buffer(&buffers.instances, offset, bytemuck::cast_slice(vertices));
        Ok(())
    }

    fn draw(&mut self, uniforms: &DrawUniforms, index_count: u32) -> RenderResult<()> {
        let buffers = self.buffers.as_ref().ok_or("Instance buffer not allocated")?;
        if index_count as usize > buffers.index_count.min(buffers.instance_count) {
            return Err(format!(
                "Draw of {} indices exceeds index buffer of {}",
                index_count, buffers.index_count
            ));
        }

        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let color_view = self
            .color_target
            .create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = self
            .depth_target
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("point_cloud_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("point_cloud_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, Some(&self.bind_group), &[]);
            pass.set_vertex_buffer(0, self.corner_buffer.slice(..));
            pass.set_vertex_buffer(1, buffers.instances.slice(..));
            pass.set_index_buffer(self.cube_index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..CUBE_INDICES.len() as u32, 0, 0..index_count);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn snapshot(&self) -> RenderResult<Option<RgbaImage>> {
        self.read_back().map(Some)
    }
}
