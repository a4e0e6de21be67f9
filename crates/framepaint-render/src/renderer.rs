//! GPU brush stamping and display compositing.
//!
//! The renderer owns the surface cache and the two fixed pipelines. A
//! stamp draws one alpha-blended quad into the target frame's
//! accumulation surface; compositing draws that surface into the host's
//! display target through the current viewport transform. Stamps are
//! consumed immediately — once rasterized, only pixels remain.

use std::sync::Arc;

use glam::Vec2;
use wgpu::util::DeviceExt;

use framepaint_core::{
    BrushTipShape, FrameIndex, StampRequest, StampSink, ViewportGeometry, image_to_screen,
};

use crate::context::GraphicsContext;
use crate::program::{BRUSH_STAMP, COMPOSITE, ProgramManager, ShaderError};
use crate::surface::{SURFACE_FORMAT, SurfaceCache, SurfaceError};
use crate::tips::TipAtlas;

/// One corner of the unit stamp quad.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadVertex {
    corner: [f32; 2],
}

impl QuadVertex {
    fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![
            0 => Float32x2,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

// Triangle strip covering -0.5..0.5 in both axes.
const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        corner: [-0.5, -0.5],
    },
    QuadVertex { corner: [0.5, -0.5] },
    QuadVertex { corner: [-0.5, 0.5] },
    QuadVertex { corner: [0.5, 0.5] },
];

/// Per-stamp instance data, matching the stamp shader's locations 1-4.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct StampInstance {
    center: [f32; 2],
    size_opacity: [f32; 2],
    color: [f32; 4],
    hardness_tip: [f32; 2],
}

impl StampInstance {
    fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
            1 => Float32x2,
            2 => Float32x2,
            3 => Float32x4,
            4 => Float32x2,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<StampInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }

    fn from_request(request: &StampRequest) -> Self {
        Self {
            center: request.position.to_array(),
            // Flow folds into per-stamp alpha so overlapping stamps
            // within a stroke build up gradually.
            size_opacity: [request.size, request.opacity * request.flow],
            color: request.color.to_array(),
            hardness_tip: [
                request.hardness,
                if request.tip.is_some() { 1.0 } else { 0.0 },
            ],
        }
    }
}

/// Composite quad corner in display NDC with surface UVs.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

impl CompositeVertex {
    fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
            0 => Float32x2,
            1 => Float32x2,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CompositeVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeUniform {
    global_opacity: f32,
    _pad: [f32; 3],
}

/// Renders stamps into per-frame surfaces and composites them for
/// display.
pub struct BrushRenderer {
    context: Arc<GraphicsContext>,
    surfaces: SurfaceCache,
    tips: TipAtlas,
    stamp_pipeline: wgpu::RenderPipeline,
    stamp_bind_layout: wgpu::BindGroupLayout,
    composite_pipeline: wgpu::RenderPipeline,
    composite_bind_layout: wgpu::BindGroupLayout,
    composite_sampler: wgpu::Sampler,
    composite_uniform: wgpu::Buffer,
    quad_vertices: wgpu::Buffer,
}

impl BrushRenderer {
    /// Build the renderer for a media resolution and display format.
    ///
    /// Shader failures here are fatal: the host must disable painting
    /// rather than run with a broken pipeline.
    pub fn new(
        context: Arc<GraphicsContext>,
        media_width: u32,
        media_height: u32,
        display_format: wgpu::TextureFormat,
    ) -> Result<Self, ShaderError> {
        let mut programs = ProgramManager::new(Arc::clone(&context));
        let stamp_module = programs.get(BRUSH_STAMP)?;
        let composite_module = programs.get(COMPOSITE)?;

        let device = context.device();

        let stamp_bind_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Stamp Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let stamp_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Stamp Pipeline Layout"),
            bind_group_layouts: &[&stamp_bind_layout],
            push_constant_ranges: &[],
        });

        let stamp_pipeline = programs.link_pipeline(
            BRUSH_STAMP,
            &wgpu::RenderPipelineDescriptor {
                label: Some("Stamp Pipeline"),
                layout: Some(&stamp_layout),
                vertex: wgpu::VertexState {
                    module: &stamp_module,
                    entry_point: Some("vs_main"),
                    buffers: &[QuadVertex::vertex_layout(), StampInstance::vertex_layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &stamp_module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: SURFACE_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
                cache: None,
            },
        )?;

        let composite_bind_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Composite Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let composite_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Composite Pipeline Layout"),
            bind_group_layouts: &[&composite_bind_layout],
            push_constant_ranges: &[],
        });

        let composite_pipeline = programs.link_pipeline(
            COMPOSITE,
            &wgpu::RenderPipelineDescriptor {
                label: Some("Composite Pipeline"),
                layout: Some(&composite_layout),
                vertex: wgpu::VertexState {
                    module: &composite_module,
                    entry_point: Some("vs_main"),
                    buffers: &[CompositeVertex::vertex_layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &composite_module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: display_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
                cache: None,
            },
        )?;

        let composite_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Composite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let composite_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Composite Uniform"),
            size: std::mem::size_of::<CompositeUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let quad_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Stamp Quad Vertices"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Ok(Self {
            surfaces: SurfaceCache::new(Arc::clone(&context), media_width, media_height),
            tips: TipAtlas::new(Arc::clone(&context)),
            context,
            stamp_pipeline,
            stamp_bind_layout,
            composite_pipeline,
            composite_bind_layout,
            composite_sampler,
            composite_uniform,
            quad_vertices,
        })
    }

    /// The surface cache, for persistence access and cache control.
    pub fn surfaces(&mut self) -> &mut SurfaceCache {
        &mut self.surfaces
    }

    /// Rasterize one stamp onto `frame`'s accumulation surface.
    pub fn render_stamp(
        &mut self,
        frame: FrameIndex,
        request: &StampRequest,
    ) -> Result<(), SurfaceError> {
        let instance = StampInstance::from_request(request);
        let tip = request.tip;

        let view = self.surfaces.surface_for(frame)?.view().clone();
        let bind_group = self.stamp_bind_group(tip);

        let device = self.context.device();
        let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Stamp Instances"),
            contents: bytemuck::bytes_of(&instance),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Stamp Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Stamp Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.stamp_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, self.quad_vertices.slice(..));
            pass.set_vertex_buffer(1, instances.slice(..));
            pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
        }
        self.context.queue().submit(std::iter::once(encoder.finish()));
        self.surfaces.mark_dirty(frame);
        Ok(())
    }

    /// Draw `frame`'s surface into the display target.
    ///
    /// Quiet when there is nothing to show: a frame with no surface, or
    /// one that has never been stamped since its last clear, costs no
    /// draw call. Degenerate viewport geometry skips the draw with a
    /// warning instead of producing garbage coordinates.
    pub fn composite_to_display(
        &mut self,
        frame: FrameIndex,
        geometry: &ViewportGeometry,
        global_opacity: f32,
        target: &wgpu::TextureView,
    ) {
        let Some(surface) = self.surfaces.get(frame) else {
            return;
        };
        if !surface.is_dirty() {
            return;
        }
        let Some(vertices) = composite_corners(geometry) else {
            tracing::warn!(
                "Degenerate viewport geometry, skipping composite of frame {}",
                frame
            );
            return;
        };
        let surface_view = surface.view().clone();

        let device = self.context.device();
        let queue = self.context.queue();
        queue.write_buffer(
            &self.composite_uniform,
            0,
            bytemuck::bytes_of(&CompositeUniform {
                global_opacity: global_opacity.clamp(0.0, 1.0),
                _pad: [0.0; 3],
            }),
        );

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Composite Vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Bind Group"),
            layout: &self.composite_bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&surface_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.composite_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.composite_uniform.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Composite Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.composite_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.draw(0..4, 0..1);
        }
        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Wipe one frame's paint. Idempotent; missing frames are ignored.
    pub fn clear_frame(&mut self, frame: FrameIndex) {
        self.surfaces.clear(frame);
    }

    /// Wipe the paint on every cached frame.
    pub fn clear_all_frames(&mut self) {
        self.surfaces.clear_all();
    }

    /// Notify the renderer that the source media resolution changed.
    pub fn set_media_size(&mut self, width: u32, height: u32) {
        self.surfaces.set_media_size(width, height);
    }

    fn stamp_bind_group(&mut self, tip: Option<BrushTipShape>) -> wgpu::BindGroup {
        let view = self.tips.view_for(tip).clone();
        self.context
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Stamp Bind Group"),
                layout: &self.stamp_bind_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(self.tips.sampler()),
                    },
                ],
            })
    }
}

impl StampSink for BrushRenderer {
    fn stamp(&mut self, frame: FrameIndex, request: &StampRequest) {
        if let Err(e) = self.render_stamp(frame, request) {
            // A dropped stamp degrades the stroke but never aborts it.
            tracing::warn!("Dropping stamp on frame {}: {}", frame, e);
        }
    }
}

/// Corners of the image rectangle in display NDC with surface UVs.
///
/// Returns `None` when the viewport transform is degenerate. The
/// surface's texel row 0 holds the image's top row, so UV `v` is flipped
/// relative to bottom-left-origin image space.
fn composite_corners(geometry: &ViewportGeometry) -> Option<[CompositeVertex; 4]> {
    let viewport = geometry.viewport_size;
    if !(viewport.x > 0.0 && viewport.y > 0.0) {
        return None;
    }
    // Strip order: bottom-left, bottom-right, top-left, top-right.
    let image_corners = [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 1.0),
    ];
    let mut vertices = [CompositeVertex {
        position: [0.0; 2],
        uv: [0.0; 2],
    }; 4];
    for (vertex, corner) in vertices.iter_mut().zip(image_corners) {
        let screen = image_to_screen(corner, geometry)?;
        vertex.position = [
            screen.x / viewport.x * 2.0 - 1.0,
            screen.y / viewport.y * 2.0 - 1.0,
        ];
        vertex.uv = [corner.x, 1.0 - corner.y];
    }
    Some(vertices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use framepaint_core::Color;

    fn identity_geometry() -> ViewportGeometry {
        ViewportGeometry {
            viewport_size: Vec2::new(800.0, 600.0),
            image_size: Vec2::new(800.0, 600.0),
            pan: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            device_pixel_ratio: 1.0,
        }
    }

    #[test]
    fn instance_packs_flow_into_alpha() {
        let request = StampRequest {
            position: Vec2::new(0.25, 0.75),
            size: 0.1,
            opacity: 0.5,
            flow: 0.5,
            hardness: 0.8,
            color: Color::WHITE,
            tip: None,
        };
        let instance = StampInstance::from_request(&request);
        assert_eq!(instance.center, [0.25, 0.75]);
        assert!((instance.size_opacity[1] - 0.25).abs() < 1e-6);
        assert_eq!(instance.hardness_tip[1], 0.0);
    }

    #[test]
    fn instance_flags_tip_usage() {
        let request = StampRequest {
            position: Vec2::ZERO,
            size: 0.1,
            opacity: 1.0,
            flow: 1.0,
            hardness: 0.5,
            color: Color::BLACK,
            tip: Some(BrushTipShape::Noise),
        };
        assert_eq!(StampInstance::from_request(&request).hardness_tip[1], 1.0);
    }

    #[test]
    fn composite_corners_fill_viewport_at_identity() {
        let corners = composite_corners(&identity_geometry()).unwrap();
        assert_eq!(corners[0].position, [-1.0, -1.0]);
        assert_eq!(corners[3].position, [1.0, 1.0]);
        // Bottom-left image corner samples the last texel row.
        assert_eq!(corners[0].uv, [0.0, 1.0]);
        assert_eq!(corners[3].uv, [1.0, 0.0]);
    }

    #[test]
    fn composite_corners_reject_zero_zoom() {
        let geometry = ViewportGeometry {
            zoom: 0.0,
            ..identity_geometry()
        };
        assert!(composite_corners(&geometry).is_none());
    }

    #[test]
    fn stamp_instance_layout_matches_shader_stride() {
        assert_eq!(std::mem::size_of::<StampInstance>(), 40);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 8);
        assert_eq!(std::mem::size_of::<CompositeVertex>(), 16);
    }
}
