//! Particle trails. Software only: each frame fades the previous trails and draws this
//! tick's bucket segments, one colour per bucket. Trails never outlive the projection they
//! were drawn in: a new field key wipes the canvas.

use std::convert::Infallible;
use std::sync::Arc;

use egui::{Color32, ColorImage};
use engine::ParticleEngine;
use zephyr_geo::{Projection, ProjectionKey, Viewport};

use crate::backend::{BackendError, Drawable, Layer};
use crate::composite::LayerKind;
use crate::gpu::GpuContext;
use crate::raster;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleInput {
    /// Per-frame multiplier applied to existing trails.
    pub trail_fade: f32,
}

pub struct ParticleView<'a> {
    pub engine: &'a ParticleEngine,
}

pub struct TrailCanvas {
    image: ColorImage,
    /// Projection of the field the trails were drawn in.
    key: Option<ProjectionKey>,
}

pub struct ParticleLayer;

impl Layer for ParticleLayer {
    const KIND: LayerKind = LayerKind::Particles;
    const HARDWARE: bool = false;

    type Input = ParticleInput;
    type Hardware = Infallible;
    type Software = TrailCanvas;
    type Frame<'a> = ParticleView<'a>;

    fn hardware_support(_input: &ParticleInput, projection: &Projection) -> Result<(), BackendError> {
        Err(BackendError::ProjectionUnsupported(projection.kind()))
    }

    fn init_hardware(
        _gpu: Option<&Arc<GpuContext>>,
        _input: &ParticleInput,
        _viewport: Viewport,
    ) -> Result<Infallible, BackendError> {
        Err(BackendError::InitFailure("particles have no hardware path".to_string()))
    }

    fn init_software(_input: &ParticleInput, viewport: Viewport) -> TrailCanvas {
        TrailCanvas { image: raster::blank(viewport.width, viewport.height), key: None }
    }

    fn render_hardware(
        hw: &mut Infallible,
        _input: &ParticleInput,
        _frame: &ParticleView<'_>,
    ) -> Result<Option<Drawable>, BackendError> {
        match *hw {}
    }

    fn render_software(
        sw: &mut TrailCanvas,
        input: &ParticleInput,
        frame: &ParticleView<'_>,
    ) -> Option<Drawable> {
        let engine = frame.engine;
        let Some(field) = engine.field().filter(|_| !engine.colors().is_empty()) else {
            // Nothing is advecting: drop the trails instead of fading them out
            sw.image.pixels.fill(Color32::TRANSPARENT);
            sw.key = None;
            return None;
        };
        if sw.key != Some(field.key()) {
            sw.image.pixels.fill(Color32::TRANSPARENT);
            sw.key = Some(field.key());
            if engine.buckets().iter().all(Vec::is_empty) {
                return None;
            }
        } else {
            raster::fade(&mut sw.image, input.trail_fade);
        }
        for (bucket, &[r, g, b, a]) in engine.buckets().iter().zip(engine.colors()) {
            let color = Color32::from_rgba_unmultiplied(r, g, b, a);
            for s in bucket {
                raster::draw_line(&mut sw.image, s.from, s.to, color);
            }
        }
        Some(Drawable::Pixels(Arc::new(sw.image.clone())))
    }
}
