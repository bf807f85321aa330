//! Planet imagery: an equirectangular RGBA image draped over the projection.
//!
//! The host decodes images wherever it likes and hands the result to the sending half of a
//! [`PlanetLoader`]; the globe polls it each frame and starts a new planet epoch once the
//! image arrives. Nothing here blocks or starts a thread.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use egui::{Color32, ColorImage};
use zephyr_geo::{floor_mod, Projection, Viewport};

use super::View;
use crate::backend::{BackendError, Drawable, Layer, Release};
use crate::composite::LayerKind;
use crate::gpu::GpuContext;
use crate::raster;
use crate::raster_gpu::{hardware_kind, pack_rgba, ComputeRaster, ProjectionUniforms, PLANET_WGSL};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanetError {
    #[error("image has {got} pixels, expected {expected}")]
    SizeMismatch { expected: usize, got: usize },
    #[error("planet image could not be loaded: {0}")]
    Loader(String),
}

/// Equirectangular image covering 180°W..180°E, 90°N..90°S; row 0 is the north edge.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanetImage {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl PlanetImage {
    pub fn new(width: u32, height: u32, pixels: Vec<[u8; 4]>) -> Result<Self, PlanetError> {
        let expected = width as usize * height as usize;
        if expected == 0 || pixels.len() != expected {
            return Err(PlanetError::SizeMismatch { expected, got: pixels.len() });
        }
        Ok(Self { width, height, pixels })
    }

    pub fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    /// Nearest pixel at `(lon, lat)` degrees, unmultiplied RGBA.
    pub fn sample(&self, lon: f64, lat: f64) -> [u8; 4] {
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        let i = (floor_mod(lon + 180.0, 360.0) / 360.0 * w).floor().max(0.0) as usize % self.width as usize;
        let j = ((90.0 - lat) / 180.0 * h).floor().clamp(0.0, h - 1.0) as usize;
        self.pixels[j * self.width as usize + i]
    }
}

/// Pending planet image: receiving half of a one-shot channel.
pub struct PlanetLoader {
    rx: Receiver<Result<PlanetImage, PlanetError>>,
}

const ABANDONED: &str = "loader dropped without a result";

impl PlanetLoader {
    /// One-shot channel. The host sends exactly one result; extra sends fail.
    pub fn channel() -> (Sender<Result<PlanetImage, PlanetError>>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (tx, Self { rx })
    }

    /// Non-blocking: `None` while the host has not delivered.
    pub fn poll(&self) -> Option<Result<PlanetImage, PlanetError>> {
        match self.rx.try_recv() {
            Ok(r) => Some(r),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PlanetError::Loader(ABANDONED.to_string()))),
        }
    }

    /// Block until the host delivers.
    pub fn wait(self) -> Result<PlanetImage, PlanetError> {
        self.rx.recv().unwrap_or_else(|_| Err(PlanetError::Loader(ABANDONED.to_string())))
    }
}

#[derive(Clone, Debug, Default)]
pub struct PlanetInput {
    pub image: Option<Arc<PlanetImage>>,
}

pub struct PlanetHardware {
    ctx: Arc<GpuContext>,
    raster: ComputeRaster,
    image_size: [u32; 2],
}

impl Release for PlanetHardware {
    fn release(self) {
        self.raster.release();
    }
}

pub struct PlanetCanvas {
    image: ColorImage,
}

pub struct PlanetLayer;

impl Layer for PlanetLayer {
    const KIND: LayerKind = LayerKind::Planet;

    type Input = PlanetInput;
    type Hardware = PlanetHardware;
    type Software = PlanetCanvas;
    type Frame<'a> = View<'a>;

    fn hardware_support(input: &PlanetInput, projection: &Projection) -> Result<(), BackendError> {
        if input.image.is_none() {
            return Err(BackendError::DataUnavailable);
        }
        hardware_kind(projection.kind()).map(|_| ())
    }

    fn init_hardware(
        gpu: Option<&Arc<GpuContext>>,
        input: &PlanetInput,
        viewport: Viewport,
    ) -> Result<PlanetHardware, BackendError> {
        let ctx = gpu.ok_or(BackendError::NoDevice)?;
        let image = input.image.as_deref().ok_or(BackendError::DataUnavailable)?;
        let packed: Vec<u32> = image.pixels.iter().copied().map(pack_rgba).collect();
        let raster = ComputeRaster::new(ctx, "planet", PLANET_WGSL, viewport, bytemuck::cast_slice(&packed), &[])?;
        log::info!("[planet] uploaded {}x{} image", image.width, image.height);
        Ok(PlanetHardware { ctx: ctx.clone(), raster, image_size: image.size() })
    }

    fn init_software(_input: &PlanetInput, viewport: Viewport) -> PlanetCanvas {
        PlanetCanvas { image: raster::blank(viewport.width, viewport.height) }
    }

    fn render_hardware(
        hw: &mut PlanetHardware,
        _input: &PlanetInput,
        view: &View<'_>,
    ) -> Result<Option<Drawable>, BackendError> {
        let mut u = ProjectionUniforms::new(view.projection, view.viewport)?;
        u.dims = [hw.image_size[0], hw.image_size[1], 0, 0];
        hw.raster.dispatch(&hw.ctx, &u)?;
        Ok(Some(Drawable::Surface(Arc::new(hw.raster.surface(&hw.ctx)))))
    }

    fn render_software(sw: &mut PlanetCanvas, input: &PlanetInput, view: &View<'_>) -> Option<Drawable> {
        let image = input.image.as_deref()?;
        if !view.mask.matches(view.projection, view.viewport) {
            log::debug!("[planet] stale mask, frame skipped");
            return None;
        }
        sw.image.pixels.fill(Color32::TRANSPARENT);
        let b = view.mask.bounds();
        let w = sw.image.size[0];
        if !b.is_empty() {
            for y in b.y..=b.y_max {
                for x in b.x..=b.x_max {
                    if !view.mask.is_visible(x, y) {
                        continue;
                    }
                    if let Some([lon, lat]) = view.projection.invert(f64::from(x), f64::from(y)) {
                        let [r, g, bl, a] = image.sample(lon, lat);
                        sw.image.pixels[y as usize * w + x as usize] = Color32::from_rgba_unmultiplied(r, g, bl, a);
                    }
                }
            }
        }
        Some(Drawable::Pixels(Arc::new(sw.image.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_rejects_wrong_length() {
        assert_eq!(
            PlanetImage::new(4, 2, vec![[0; 4]; 7]),
            Err(PlanetError::SizeMismatch { expected: 8, got: 7 })
        );
        assert!(PlanetImage::new(0, 0, Vec::new()).is_err());
    }

    #[test]
    fn sample_picks_nearest_cell() {
        // west half red, east half blue
        let px = (0..8).map(|k| if k % 4 < 2 { [255, 0, 0, 255] } else { [0, 0, 255, 255] }).collect();
        let img = PlanetImage::new(4, 2, px).unwrap();
        assert_eq!(img.sample(-100.0, 45.0), [255, 0, 0, 255]);
        assert_eq!(img.sample(100.0, -45.0), [0, 0, 255, 255]);
        // 180°E wraps to the west edge
        assert_eq!(img.sample(180.0, 0.0), [255, 0, 0, 255]);
        assert_eq!(img.sample(0.0, -90.0), [0, 0, 255, 255]);
    }

    #[test]
    fn loader_delivers_once() {
        let (tx, loader) = PlanetLoader::channel();
        assert!(loader.poll().is_none());
        tx.send(PlanetImage::new(1, 1, vec![[1, 2, 3, 4]])).unwrap();
        assert!(tx.try_send(Err(PlanetError::Loader("late".into()))).is_err());
        let img = loader.wait().unwrap();
        assert_eq!(img.sample(0.0, 0.0), [1, 2, 3, 4]);

        let (tx, failing) = PlanetLoader::channel();
        tx.send(Err(PlanetError::Loader("missing".into()))).unwrap();
        assert_eq!(failing.wait(), Err(PlanetError::Loader("missing".into())));
    }

    #[test]
    fn dropped_sender_reports_loader_error() {
        let (tx, loader) = PlanetLoader::channel();
        drop(tx);
        assert_eq!(loader.poll(), Some(Err(PlanetError::Loader(ABANDONED.to_string()))));
    }
}
