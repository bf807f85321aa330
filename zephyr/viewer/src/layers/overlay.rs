//! Scalar overlay coloured by the product palette.
//!
//! Software: samples the product at the field stride and fills stride×stride blocks on
//! visible pixels. Hardware: the product is resampled once per data epoch onto a 0.5° grid
//! and inverse-projected per pixel in a compute shader.

use std::sync::Arc;
use std::time::Instant;

use egui::{Color32, ColorImage};
use engine::{GridHeader, WeatherProduct};
use zephyr_geo::{Projection, Viewport};

use super::View;
use crate::backend::{BackendError, Drawable, Layer, Release};
use crate::colormap::{self, Palette, LUT_LEN};
use crate::composite::LayerKind;
use crate::gpu::GpuContext;
use crate::raster;
use crate::raster_gpu::{hardware_kind, pack_rgba, ComputeRaster, ProjectionUniforms, GRID_HOLE, OVERLAY_WGSL};

/// Spacing of the grid uploaded to the hardware path, degrees.
pub const RESAMPLE_STEP: f64 = 0.5;

#[derive(Clone)]
pub struct OverlayInput {
    /// `None` when the overlay is off or its data is missing.
    pub product: Option<Arc<dyn WeatherProduct>>,
    pub alpha: f32,
    pub stride: u32,
}

/// Product magnitudes on a global grid starting at (180°W, 90°N); holes are `GRID_HOLE`.
pub fn resample(product: &dyn WeatherProduct, step: f64) -> (GridHeader, Vec<f32>) {
    let header = GridHeader {
        lon0: -180.0,
        lat0: 90.0,
        dlon: step,
        dlat: step,
        ni: (360.0 / step).round() as usize,
        nj: (180.0 / step).round() as usize + 1,
    };
    let mut values = Vec::with_capacity(header.len());
    for j in 0..header.nj {
        let lat = header.lat0 - j as f64 * step;
        for i in 0..header.ni {
            let lon = header.lon0 + i as f64 * step;
            let v = product
                .interpolate(lon, lat)
                .map(|s| s.magnitude())
                .filter(|m| m.is_finite())
                .map_or(GRID_HOLE, |m| m as f32);
            values.push(v);
        }
    }
    (header, values)
}

fn palette_for(product: &dyn WeatherProduct) -> Result<&'static Palette, BackendError> {
    colormap::builtin(product.scale().palette).map_err(|e| BackendError::InitFailure(e.to_string()))
}

pub struct OverlayHardware {
    ctx: Arc<GpuContext>,
    raster: ComputeRaster,
    header: GridHeader,
    range: [f32; 2],
}

impl Release for OverlayHardware {
    fn release(self) {
        self.raster.release();
    }
}

pub struct OverlayCanvas {
    palette: Option<&'static Palette>,
    image: ColorImage,
}

pub struct OverlayLayer;

impl Layer for OverlayLayer {
    const KIND: LayerKind = LayerKind::Overlay;

    type Input = OverlayInput;
    type Hardware = OverlayHardware;
    type Software = OverlayCanvas;
    type Frame<'a> = View<'a>;

    fn hardware_support(input: &OverlayInput, projection: &Projection) -> Result<(), BackendError> {
        if input.product.is_none() {
            return Err(BackendError::DataUnavailable);
        }
        hardware_kind(projection.kind()).map(|_| ())
    }

    fn init_hardware(
        gpu: Option<&Arc<GpuContext>>,
        input: &OverlayInput,
        viewport: Viewport,
    ) -> Result<OverlayHardware, BackendError> {
        let ctx = gpu.ok_or(BackendError::NoDevice)?;
        let product = input.product.as_deref().ok_or(BackendError::DataUnavailable)?;
        let palette = palette_for(product)?;
        let t0 = Instant::now();
        let (header, values) = resample(product, RESAMPLE_STEP);
        let lut: Vec<u32> = colormap::lut(palette, LUT_LEN).into_iter().map(pack_rgba).collect();
        let raster = ComputeRaster::new(
            ctx,
            "overlay",
            OVERLAY_WGSL,
            viewport,
            bytemuck::cast_slice(&values),
            bytemuck::cast_slice(&lut),
        )?;
        log::info!(
            "[overlay] {} uploaded {}x{} grid in {} ms",
            product.name(),
            header.ni,
            header.nj,
            t0.elapsed().as_millis()
        );
        let scale = product.scale();
        Ok(OverlayHardware {
            ctx: ctx.clone(),
            raster,
            header,
            range: [scale.min as f32, scale.max as f32],
        })
    }

    fn init_software(input: &OverlayInput, viewport: Viewport) -> OverlayCanvas {
        let palette = input.product.as_deref().and_then(|p| match palette_for(p) {
            Ok(pal) => Some(pal),
            Err(e) => {
                log::warn!("[overlay] {e}");
                None
            }
        });
        OverlayCanvas { palette, image: raster::blank(viewport.width, viewport.height) }
    }

    fn render_hardware(
        hw: &mut OverlayHardware,
        input: &OverlayInput,
        view: &View<'_>,
    ) -> Result<Option<Drawable>, BackendError> {
        let mut u = ProjectionUniforms::new(view.projection, view.viewport)?;
        let h = &hw.header;
        u.alpha = input.alpha;
        u.grid = [h.lon0 as f32, h.lat0 as f32, h.dlon as f32, h.dlat as f32];
        u.dims = [h.ni as u32, h.nj as u32, LUT_LEN as u32, 0];
        u.params = [hw.range[0], hw.range[1], 0.0, 0.0];
        hw.raster.dispatch(&hw.ctx, &u)?;
        Ok(Some(Drawable::Surface(Arc::new(hw.raster.surface(&hw.ctx)))))
    }

    fn render_software(sw: &mut OverlayCanvas, input: &OverlayInput, view: &View<'_>) -> Option<Drawable> {
        let product = input.product.as_deref()?;
        let palette = sw.palette?;
        if !view.mask.matches(view.projection, view.viewport) {
            log::debug!("[overlay] stale mask, frame skipped");
            return None;
        }
        let t0 = Instant::now();
        sw.image.pixels.fill(Color32::TRANSPARENT);
        let scale = product.scale();
        let b = view.mask.bounds();
        let stride = input.stride.max(1) as i32;
        let mask = view.mask;
        let mut y = b.y;
        while y <= b.y_max {
            let mut x = b.x;
            while x <= b.x_max {
                if mask.is_visible(x, y) {
                    let m = view
                        .projection
                        .invert(f64::from(x), f64::from(y))
                        .and_then(|[lon, lat]| product.interpolate(lon, lat))
                        .map(|s| s.magnitude())
                        .filter(|m| m.is_finite());
                    if let Some(m) = m {
                        let rgb = colormap::sample_linear_srgb(palette, palette.value_at(scale.normalize(m) as f32));
                        let color = raster::with_alpha(rgb, input.alpha);
                        raster::fill_block(&mut sw.image, x, y, stride, color, |px, py| mask.is_visible(px, py));
                    }
                }
                x += stride;
            }
            y += stride;
        }
        log::debug!("[overlay] software frame in {} ms", t0.elapsed().as_millis());
        Some(Drawable::Pixels(Arc::new(sw.image.clone())))
    }
}
