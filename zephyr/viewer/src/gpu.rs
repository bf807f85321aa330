//! GPU device/queue helper shared by the hardware backends.

use std::sync::{Arc, OnceLock};

use egui::{Color32, ColorImage};
use wgpu::{Device, Instance, Queue};

use crate::backend::BackendError;

/// Device and queue shared by every hardware backend.
pub struct GpuContext {
    /// Instance used to create adapters
    pub instance: Instance,
    /// Logical device
    pub device: Device,
    /// Submission queue
    pub queue: Queue,
}

impl GpuContext {
    /// Create a new GPU context using the default instance and a high-performance adapter.
    /// Fails with `NoDevice` on machines without a usable adapter.
    pub async fn new() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(BackendError::NoDevice)?;
        // Storage textures and buffers fit in the default limits.
        let required_limits = wgpu::Limits::default();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("zephyr-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                },
                None,
            )
            .await
            .map_err(|e| BackendError::InitFailure(format!("request device: {e}")))?;
        log::info!("[gpu] adapter: {}", adapter.get_info().name);
        Ok(Self { instance, device, queue })
    }

    /// Run `f` inside a validation error scope; a validation error becomes `Err(wrap(msg))`.
    pub fn scoped<T>(
        &self,
        wrap: fn(String) -> BackendError,
        f: impl FnOnce(&Device, &Queue) -> T,
    ) -> Result<T, BackendError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f(&self.device, &self.queue);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(e) => Err(wrap(e.to_string())),
            None => Ok(out),
        }
    }

    /// Copy an `Rgba8Unorm` texture into a premultiplied `ColorImage`.
    pub fn read_rgba(
        &self,
        texture: &wgpu::Texture,
        width: u32,
        height: u32,
    ) -> Result<ColorImage, BackendError> {
        let unpadded = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback staging"),
            size: u64::from(padded) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut enc = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback enc") });
        enc.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        self.queue.submit(std::iter::once(enc.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BackendError::RenderFailure(format!("map readback: {e}"))),
            Err(_) => return Err(BackendError::RenderFailure("readback dropped".to_string())),
        }

        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize).take(height as usize) {
                for px in row[..unpadded as usize].chunks_exact(4) {
                    pixels.push(Color32::from_rgba_premultiplied(px[0], px[1], px[2], px[3]));
                }
            }
        }
        staging.unmap();
        staging.destroy();
        Ok(ColorImage { size: [width as usize, height as usize], pixels })
    }
}

/// Global persistent GPU context to avoid per-epoch device creation overhead.
static GPU_CTX: OnceLock<Option<Arc<GpuContext>>> = OnceLock::new();

/// Shared `GpuContext`, created on first use. `None` when no adapter is available; the
/// failure is remembered so later callers don't retry.
pub fn persistent() -> Option<Arc<GpuContext>> {
    GPU_CTX
        .get_or_init(|| match pollster::block_on(GpuContext::new()) {
            Ok(ctx) => Some(Arc::new(ctx)),
            Err(e) => {
                log::warn!("[gpu] hardware path unavailable: {e}");
                None
            }
        })
        .clone()
}
