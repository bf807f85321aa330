//! Compute-shader rasterization for the overlay and planet layers, plus the uniform block
//! every hardware shader shares.

use std::sync::Arc;

use wgpu::util::DeviceExt;
use zephyr_geo::{Projection, ProjectionKind, Viewport};

use crate::backend::{BackendError, GpuSurface, Release};
use crate::gpu::GpuContext;

pub const PROJECTION_WGSL: &str = include_str!("../shaders/projection.wgsl");
pub const OVERLAY_WGSL: &str = include_str!("../shaders/overlay.wgsl");
pub const PLANET_WGSL: &str = include_str!("../shaders/planet.wgsl");
pub const MESH_WGSL: &str = include_str!("../shaders/mesh.wgsl");

/// Grid cells without data in uploaded value buffers.
pub const GRID_HOLE: f32 = -3.0e38;

/// Full shader source: the shared projection code followed by `body`.
pub fn shader_source(body: &str) -> String {
    format!("{PROJECTION_WGSL}\n{body}")
}

/// Shader-side projection id. Only the kinds implemented in `projection.wgsl` are accepted.
pub fn hardware_kind(kind: ProjectionKind) -> Result<u32, BackendError> {
    match kind {
        ProjectionKind::Orthographic => Ok(0),
        ProjectionKind::Stereographic => Ok(1),
        ProjectionKind::AzimuthalEquidistant => Ok(2),
        ProjectionKind::Equirectangular => Ok(3),
        other => Err(BackendError::ProjectionUnsupported(other)),
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProjectionUniforms {
    pub width: u32,
    pub height: u32,
    pub kind: u32,
    pub mode: u32,
    pub scale: f32,
    pub tx: f32,
    pub ty: f32,
    pub alpha: f32,
    /// d_lambda, phi, gamma in radians; clip cosine
    pub rot: [f32; 4],
    /// lon0, lat0, dlon, dlat
    pub grid: [f32; 4],
    /// ni, nj, lut_len, unused
    pub dims: [u32; 4],
    /// overlay value range
    pub params: [f32; 4],
}

impl ProjectionUniforms {
    pub fn new(projection: &Projection, viewport: Viewport) -> Result<Self, BackendError> {
        let kind = hardware_kind(projection.kind())?;
        let [l, p, g] = projection.rotate();
        let clip = projection.kind().clip_angle_deg().map_or(-2.0, |a| a.to_radians().cos());
        let [tx, ty] = projection.translate();
        Ok(Self {
            width: viewport.width,
            height: viewport.height,
            kind,
            scale: projection.scale() as f32,
            tx: tx as f32,
            ty: ty as f32,
            alpha: 1.0,
            rot: [
                zephyr_geo::wrap_lon_deg(l).to_radians() as f32,
                p.to_radians() as f32,
                g.to_radians() as f32,
                clip as f32,
            ],
            ..Self::default()
        })
    }
}

/// Output texture for a viewport-sized layer.
pub fn layer_texture(device: &wgpu::Device, label: &str, viewport: Viewport, usage: wgpu::TextureUsages) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: viewport.width.max(1),
            height: viewport.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: usage | wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn storage_init(device: &wgpu::Device, label: &str, bytes: &[u8]) -> wgpu::Buffer {
    // Zero-sized storage bindings are invalid
    let padded;
    let contents = if bytes.len() < 4 {
        padded = [0u8; 4];
        &padded[..]
    } else {
        bytes
    };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
    })
}

/// Compute pipeline writing one pixel per invocation into a storage texture.
///
/// Bindings: 0 uniforms, 1 data (read-only storage), 2 aux (read-only storage),
/// 3 output texture.
pub struct ComputeRaster {
    pipeline: wgpu::ComputePipeline,
    uniforms: wgpu::Buffer,
    data: wgpu::Buffer,
    aux: wgpu::Buffer,
    texture: Arc<wgpu::Texture>,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

impl ComputeRaster {
    /// Compile `body` and upload the static `data` and `aux` buffers.
    pub fn new(
        ctx: &GpuContext,
        label: &str,
        body: &str,
        viewport: Viewport,
        data: &[u8],
        aux: &[u8],
    ) -> Result<Self, BackendError> {
        ctx.scoped(BackendError::InitFailure, |device, _| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(shader_source(body).into()),
            });
            let storage = |binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            };
            let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("raster bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    storage(1),
                    storage(2),
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: wgpu::TextureFormat::Rgba8Unorm,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                        count: None,
                    },
                ],
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("raster pl"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: "main",
            });

            let texture = layer_texture(device, label, viewport, wgpu::TextureUsages::STORAGE_BINDING);
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("raster uniforms"),
                contents: bytemuck::bytes_of(&ProjectionUniforms::default()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let data = storage_init(device, "raster data", data);
            let aux = storage_init(device, "raster aux", aux);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("raster bg"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: uniforms.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 1, resource: data.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 2, resource: aux.as_entire_binding() },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                ],
            });
            Self {
                pipeline,
                uniforms,
                data,
                aux,
                texture: Arc::new(texture),
                bind_group,
                width: viewport.width.max(1),
                height: viewport.height.max(1),
            }
        })
    }

    /// Upload `u` and run one pass over the whole texture.
    pub fn dispatch(&self, ctx: &GpuContext, u: &ProjectionUniforms) -> Result<(), BackendError> {
        ctx.scoped(BackendError::RenderFailure, |device, queue| {
            queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(u));
            let gx = self.width.div_ceil(8);
            let gy = self.height.div_ceil(8);
            let mut enc = device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("raster enc") });
            {
                let mut cpass = enc.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("raster pass"),
                    timestamp_writes: None,
                });
                cpass.set_pipeline(&self.pipeline);
                cpass.set_bind_group(0, &self.bind_group, &[]);
                cpass.dispatch_workgroups(gx, gy, 1);
            }
            queue.submit(std::iter::once(enc.finish()));
        })
    }

    pub fn surface(&self, ctx: &Arc<GpuContext>) -> GpuSurface {
        GpuSurface::new(ctx.clone(), self.texture.clone(), self.width, self.height)
    }
}

impl Release for ComputeRaster {
    fn release(self) {
        self.uniforms.destroy();
        self.data.destroy();
        self.aux.destroy();
        self.texture.destroy();
    }
}

/// Little-endian RGBA packing read by `unpack4x8unorm` in the shaders.
pub fn pack_rgba(c: [u8; 4]) -> u32 {
    u32::from_le_bytes(c)
}
