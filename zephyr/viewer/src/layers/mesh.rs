//! Coastlines, lakes and the optional graticule.
//!
//! Polylines are split into lon/lat segments once per data epoch. A segment is drawn only
//! when both endpoints project and it does not jump across more than half the viewport,
//! which drops the seams of flat maps and the limb of the globe.

use std::sync::Arc;

use egui::{Color32, ColorImage};
use wgpu::util::DeviceExt;
use zephyr_geo::{Projection, Viewport};

use super::View;
use crate::backend::{BackendError, Drawable, Layer, Release};
use crate::composite::LayerKind;
use crate::gpu::GpuContext;
use crate::raster;
use crate::raster_gpu::{hardware_kind, layer_texture, shader_source, ProjectionUniforms, MESH_WGSL};

pub const COASTLINE_COLOR: [u8; 4] = [255, 255, 255, 255];
pub const LAKE_COLOR: [u8; 4] = [200, 225, 255, 255];
pub const GRATICULE_COLOR: [u8; 4] = [255, 255, 255, 48];

/// Polylines in (lon, lat) degrees.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub coastlines: Vec<Vec<[f64; 2]>>,
    pub lakes: Vec<Vec<[f64; 2]>>,
}

/// Meridians and parallels every `step` degrees, sampled every 2°.
pub fn graticule(step: f64) -> Vec<Vec<[f64; 2]>> {
    if !step.is_finite() || step <= 0.0 || step > 90.0 {
        return Vec::new();
    }
    let mut lines = Vec::new();
    let meridians = (360.0 / step).round() as i32;
    for m in 0..meridians {
        let lon = -180.0 + f64::from(m) * step;
        lines.push((-45..=45).map(|k| [lon, f64::from(k) * 2.0]).collect());
    }
    let parallels = (180.0 / step).round() as i32;
    for p in 1..parallels {
        let lat = -90.0 + f64::from(p) * step;
        lines.push((-90..=90).map(|k| [f64::from(k) * 2.0, lat]).collect());
    }
    lines
}

/// One line segment as uploaded to the vertex shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshSegment {
    /// lon0, lat0, lon1, lat1
    pub ends: [f32; 4],
    pub color: [u8; 4],
}

#[derive(Clone, Debug, Default)]
pub struct MeshInput {
    pub data: Option<Arc<MeshData>>,
    /// Graticule spacing in degrees; `None` hides it.
    pub graticule_step: Option<f64>,
}

impl MeshInput {
    /// Every segment of every polyline, graticule first so coastlines draw on top.
    pub fn segments(&self) -> Vec<MeshSegment> {
        let mut out = Vec::new();
        let mut push = |lines: &[Vec<[f64; 2]>], color: [u8; 4]| {
            for line in lines {
                for w in line.windows(2) {
                    let ([a0, a1], [b0, b1]) = (w[0], w[1]);
                    out.push(MeshSegment { ends: [a0 as f32, a1 as f32, b0 as f32, b1 as f32], color });
                }
            }
        };
        if let Some(step) = self.graticule_step {
            push(&graticule(step), GRATICULE_COLOR);
        }
        if let Some(data) = &self.data {
            push(&data.lakes, LAKE_COLOR);
            push(&data.coastlines, COASTLINE_COLOR);
        }
        out
    }
}

/// Screen segments `(from, to, color)` that survive projection.
pub fn project_segments(
    segments: &[MeshSegment],
    projection: &Projection,
    viewport: Viewport,
) -> Vec<([f32; 2], [f32; 2], [u8; 4])> {
    let half_w = f64::from(viewport.width) / 2.0;
    let half_h = f64::from(viewport.height) / 2.0;
    segments
        .iter()
        .filter_map(|s| {
            let [a0, a1, b0, b1] = s.ends.map(f64::from);
            let a = projection.forward(a0, a1)?;
            let b = projection.forward(b0, b1)?;
            if (a[0] - b[0]).abs() > half_w || (a[1] - b[1]).abs() > half_h {
                return None;
            }
            Some(([a[0] as f32, a[1] as f32], [b[0] as f32, b[1] as f32], s.color))
        })
        .collect()
}

pub struct MeshHardware {
    ctx: Arc<GpuContext>,
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instances: wgpu::Buffer,
    count: u32,
    texture: Arc<wgpu::Texture>,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl Release for MeshHardware {
    fn release(self) {
        self.uniforms.destroy();
        self.instances.destroy();
        self.texture.destroy();
    }
}

pub struct MeshCanvas {
    segments: Vec<MeshSegment>,
    image: ColorImage,
}

pub struct MeshLayer;

impl Layer for MeshLayer {
    const KIND: LayerKind = LayerKind::Mesh;

    type Input = MeshInput;
    type Hardware = MeshHardware;
    type Software = MeshCanvas;
    type Frame<'a> = View<'a>;

    fn hardware_support(input: &MeshInput, projection: &Projection) -> Result<(), BackendError> {
        let empty = input.data.as_ref().map_or(true, |d| d.coastlines.is_empty() && d.lakes.is_empty());
        if empty && input.graticule_step.is_none() {
            return Err(BackendError::DataUnavailable);
        }
        hardware_kind(projection.kind()).map(|_| ())
    }

    fn init_hardware(
        gpu: Option<&Arc<GpuContext>>,
        input: &MeshInput,
        viewport: Viewport,
    ) -> Result<MeshHardware, BackendError> {
        let ctx = gpu.ok_or(BackendError::NoDevice)?;
        let segments = input.segments();
        if segments.is_empty() {
            return Err(BackendError::DataUnavailable);
        }
        let hw = ctx.scoped(BackendError::InitFailure, |device, _| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("mesh"),
                source: wgpu::ShaderSource::Wgsl(shader_source(MESH_WGSL).into()),
            });
            let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("mesh bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
            let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh uniforms"),
                contents: bytemuck::bytes_of(&ProjectionUniforms::default()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("mesh bg"),
                layout: &bgl,
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: uniforms.as_entire_binding() }],
            });
            let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh segments"),
                contents: bytemuck::cast_slice(&segments),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("mesh pl"),
                bind_group_layouts: &[&bgl],
                push_constant_ranges: &[],
            });
            let vertex_buffers = [wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<MeshSegment>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &[
                    wgpu::VertexAttribute {
                        shader_location: 0,
                        format: wgpu::VertexFormat::Float32x4,
                        offset: 0,
                    },
                    wgpu::VertexAttribute {
                        shader_location: 1,
                        format: wgpu::VertexFormat::Unorm8x4,
                        offset: 16,
                    },
                ],
            }];
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("mesh pipeline"),
                layout: Some(&pl),
                vertex: wgpu::VertexState { module: &module, entry_point: "vs_main", buffers: &vertex_buffers },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::LineList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });
            let texture = layer_texture(device, "mesh", viewport, wgpu::TextureUsages::RENDER_ATTACHMENT);
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            MeshHardware {
                ctx: ctx.clone(),
                pipeline,
                uniforms,
                bind_group,
                instances,
                count: segments.len() as u32,
                texture: Arc::new(texture),
                view,
                width: viewport.width.max(1),
                height: viewport.height.max(1),
            }
        })?;
        log::info!("[mesh] uploaded {} segments", hw.count);
        Ok(hw)
    }

    fn init_software(input: &MeshInput, viewport: Viewport) -> MeshCanvas {
        MeshCanvas { segments: input.segments(), image: raster::blank(viewport.width, viewport.height) }
    }

    fn render_hardware(
        hw: &mut MeshHardware,
        _input: &MeshInput,
        view: &View<'_>,
    ) -> Result<Option<Drawable>, BackendError> {
        let u = ProjectionUniforms::new(view.projection, view.viewport)?;
        hw.ctx.scoped(BackendError::RenderFailure, |device, queue| {
            queue.write_buffer(&hw.uniforms, 0, bytemuck::bytes_of(&u));
            let mut enc =
                device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("mesh enc") });
            {
                let mut rpass = enc.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("mesh pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &hw.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                rpass.set_pipeline(&hw.pipeline);
                rpass.set_bind_group(0, &hw.bind_group, &[]);
                rpass.set_vertex_buffer(0, hw.instances.slice(..));
                rpass.draw(0..2, 0..hw.count);
            }
            queue.submit(std::iter::once(enc.finish()));
        })?;
        let surface = crate::backend::GpuSurface::new(hw.ctx.clone(), hw.texture.clone(), hw.width, hw.height);
        Ok(Some(Drawable::Surface(Arc::new(surface))))
    }

    fn render_software(sw: &mut MeshCanvas, _input: &MeshInput, view: &View<'_>) -> Option<Drawable> {
        if sw.segments.is_empty() {
            return None;
        }
        sw.image.pixels.fill(Color32::TRANSPARENT);
        for (a, b, [r, g, bl, al]) in project_segments(&sw.segments, view.projection, view.viewport) {
            raster::draw_line(&mut sw.image, a, b, Color32::from_rgba_unmultiplied(r, g, bl, al));
        }
        Some(Drawable::Pixels(Arc::new(sw.image.clone())))
    }
}
