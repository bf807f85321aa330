//! The globe: projection, mask, field and particles plus the four layers, driven by the host
//! through explicit `handle_*` calls and a cooperative tick loop.
//!
//! Rebuild order is fixed: projection, then mask, then field, then particles, then layers.
//! Every layer draws against the mask built in the same call, so nothing ever renders
//! against a mask keyed to an older projection or viewport.

pub mod tick;

use std::sync::Arc;
use std::time::{Duration, Instant};

use engine::{
    AnimationParams, DisplayMode, EpochConfig, Field, FieldSampler, IntensityScale, OverlayType, ParticleEngine,
    ParticleType, WeatherProduct,
};
use zephyr_geo::{Projection, Viewport, VisibilityMask};

use crate::backend::{BackendKind, Drawable, DualPathRenderer};
use crate::composite::{eligible, CompositeFrame, CompositeFrameBuilder, LayerKind};
use crate::gpu::GpuContext;
use crate::layers::{
    MeshData, MeshInput, MeshLayer, OverlayInput, OverlayLayer, ParticleInput, ParticleLayer, ParticleView,
    PlanetInput, PlanetLayer, PlanetLoader, View,
};
use crate::notify;

pub use tick::TickLoop;

/// Graticule spacing when enabled, degrees.
pub const GRATICULE_STEP: f64 = 10.0;

/// Payload of one data epoch. Missing products are `None`; the affected layers are
/// skipped, not failed.
#[derive(Default)]
pub struct GlobeData {
    /// Vector product the particles advect through.
    pub particles: Option<Arc<dyn WeatherProduct>>,
    /// Product coloured by the overlay.
    pub overlay: Option<Arc<dyn WeatherProduct>>,
    pub mesh: Option<Arc<MeshData>>,
    /// Pending planet imagery.
    pub planet: Option<PlanetLoader>,
}

pub struct Globe {
    params: AnimationParams,
    config: EpochConfig,
    viewport: Viewport,
    projection: Projection,
    mask: VisibilityMask,
    particle_product: Option<Arc<dyn WeatherProduct>>,
    engine: ParticleEngine,
    planet: DualPathRenderer<PlanetLayer>,
    mesh: DualPathRenderer<MeshLayer>,
    overlay: DualPathRenderer<OverlayLayer>,
    particles: DualPathRenderer<ParticleLayer>,
    planet_loader: Option<PlanetLoader>,
    compositor: CompositeFrameBuilder,
    ticks: TickLoop,
    gesture: bool,
    loaded: bool,
}

impl Globe {
    /// Empty globe; nothing is drawn until the first [`Globe::handle_data_change`].
    pub fn new(viewport: Viewport, config: EpochConfig, params: AnimationParams, gpu: Option<Arc<GpuContext>>) -> Self {
        let projection = Projection::new(config.projection_params(), viewport);
        let mask = VisibilityMask::build(&projection, viewport);
        let (planet_tx, planet_rx) = notify::channel(LayerKind::Planet);
        let (mesh_tx, mesh_rx) = notify::channel(LayerKind::Mesh);
        let (overlay_tx, overlay_rx) = notify::channel(LayerKind::Overlay);
        let (particles_tx, particles_rx) = notify::channel(LayerKind::Particles);
        Self {
            params,
            config,
            viewport,
            projection,
            mask,
            particle_product: None,
            engine: ParticleEngine::new(params),
            planet: DualPathRenderer::new(gpu.clone(), planet_tx),
            mesh: DualPathRenderer::new(gpu.clone(), mesh_tx),
            overlay: DualPathRenderer::new(gpu.clone(), overlay_tx),
            particles: DualPathRenderer::new(gpu, particles_tx),
            planet_loader: None,
            compositor: CompositeFrameBuilder::new(planet_rx, mesh_rx, overlay_rx, particles_rx),
            ticks: TickLoop::new(Duration::from_millis(params.frame_period_ms)),
            gesture: false,
            loaded: false,
        }
    }

    /// New data epoch: rebuild everything for `config` and `viewport`, reseed the particles
    /// and re-initialize every eligible layer.
    pub fn handle_data_change(&mut self, data: GlobeData, config: EpochConfig, viewport: Viewport, now: Instant) {
        let t0 = Instant::now();
        self.ticks.stop();
        self.config = config;
        self.viewport = viewport;
        self.projection = Projection::new(config.projection_params(), viewport);
        self.mask = VisibilityMask::build(&self.projection, viewport);

        let layers = eligible(config.mode);
        let animate = layers.contains(&LayerKind::Particles) && config.particles != ParticleType::Off;
        self.particle_product = if animate { data.particles } else { None };
        self.reseed();

        let view = View { projection: &self.projection, mask: &self.mask, viewport };

        if layers.contains(&LayerKind::Mesh) {
            let input = MeshInput { data: data.mesh, graticule_step: config.show_graticule.then_some(GRATICULE_STEP) };
            self.mesh.handle_data_change(input, &self.projection, viewport, &view);
        } else {
            self.mesh.dispose();
        }

        if layers.contains(&LayerKind::Overlay) && config.overlay != OverlayType::Off {
            let input = OverlayInput {
                product: data.overlay,
                alpha: self.params.overlay_alpha,
                stride: self.params.sample_stride,
            };
            self.overlay.handle_data_change(input, &self.projection, viewport, &view);
        } else {
            self.overlay.dispose();
        }

        if self.particle_product.is_some() {
            let input = ParticleInput { trail_fade: self.params.trail_fade };
            let frame = ParticleView { engine: &self.engine };
            self.particles.handle_data_change(input, &self.projection, viewport, &frame);
        } else {
            self.particles.dispose();
        }

        // Imagery arrives later through the loader; until then the layer has nothing to show
        self.planet.dispose();
        self.planet_loader = if layers.contains(&LayerKind::Planet) && config.planet.is_some() {
            data.planet
        } else {
            None
        };

        self.loaded = true;
        log::info!(
            "[globe] {} epoch on {}x{} ready in {} ms",
            config.projection,
            viewport.width,
            viewport.height,
            t0.elapsed().as_millis()
        );
        if !self.gesture {
            self.ticks.start(now);
        }
    }

    /// Same data, new orientation (and optionally scale): rebuild mask and field and redraw
    /// every layer with its existing backend. A pure rotation keeps the particle population
    /// and drops its trails; a zoom, or any change of the visible bounds, reseeds it.
    pub fn handle_rotation(&mut self, orientation: [f64; 3], scale: Option<f64>, now: Instant) {
        self.ticks.stop();
        let mut params = self.projection.params();
        params.rotate = orientation;
        let zoomed = scale.is_some_and(|s| s != self.projection.scale());
        if let Some(s) = scale {
            params.scale = Some(s);
        }
        self.config.orientation = Some(orientation);
        let old_bounds = self.mask.bounds();
        self.projection = Projection::new(params, self.viewport);
        self.mask = VisibilityMask::build(&self.projection, self.viewport);
        if zoomed || self.mask.bounds() != old_bounds {
            // population is sized from the bounds
            self.reseed();
        } else if let Some(field) = self.build_field() {
            self.engine.replace_field(field);
        }

        let view = View { projection: &self.projection, mask: &self.mask, viewport: self.viewport };
        self.planet.handle_rotation(&view);
        self.mesh.handle_rotation(&view);
        self.overlay.handle_rotation(&view);
        self.particles.handle_rotation(&ParticleView { engine: &self.engine });

        if !self.gesture && self.loaded {
            self.ticks.start(now);
        }
    }

    /// New viewport, same data: refit the projection and start a fresh particle population
    /// sized for the new bounds.
    pub fn resize(&mut self, viewport: Viewport, now: Instant) {
        self.ticks.stop();
        self.viewport = viewport;
        let mut params = self.config.projection_params();
        params.rotate = self.projection.rotate();
        self.projection = Projection::new(params, viewport);
        self.mask = VisibilityMask::build(&self.projection, viewport);
        self.reseed();

        let view = View { projection: &self.projection, mask: &self.mask, viewport };
        self.planet.handle_state_change(&self.projection, viewport, &view);
        self.mesh.handle_state_change(&self.projection, viewport, &view);
        self.overlay.handle_state_change(&self.projection, viewport, &view);
        self.particles.handle_state_change(&self.projection, viewport, &ParticleView { engine: &self.engine });

        if !self.gesture && self.loaded {
            self.ticks.start(now);
        }
    }

    /// A drag or pinch started: animation pauses until [`Globe::end_gesture`].
    pub fn begin_gesture(&mut self) {
        self.gesture = true;
        self.ticks.stop();
    }

    pub fn end_gesture(&mut self, now: Instant) {
        self.gesture = false;
        if self.loaded {
            self.ticks.start(now);
        }
    }

    /// Advance the host clock. Returns a frame when a tick fired, planet imagery arrived or
    /// any layer redrew since the last frame (rotations during a gesture included).
    pub fn frame(&mut self, now: Instant) -> Option<CompositeFrame> {
        let arrived = self.poll_planet();
        let ticked = self.ticks.poll(now);
        if ticked {
            self.engine.tick();
            self.particles.generate_frame(&ParticleView { engine: &self.engine });
        }
        let changed = self.compositor.receive();
        (arrived || ticked || changed).then(|| self.compositor.build(self.config.mode))
    }

    /// Composite of the latest drawables, without ticking.
    pub fn composite(&mut self) -> CompositeFrame {
        self.compositor.build(self.config.mode)
    }

    /// Markers supplied by the host, drawn above everything else.
    pub fn set_foreground(&mut self, drawable: Option<Drawable>) {
        self.compositor.set_foreground(drawable);
    }

    /// True once a data epoch is installed, requested imagery has arrived and every layer
    /// holding data has a live backend.
    pub fn is_ready(&self) -> bool {
        let layer_ready = |has_input: bool, ready: bool| !has_input || ready;
        self.loaded
            && self.planet_loader.is_none()
            && layer_ready(self.planet.input().is_some(), self.planet.is_ready())
            && layer_ready(self.mesh.input().is_some(), self.mesh.is_ready())
            && layer_ready(self.overlay.input().is_some(), self.overlay.is_ready())
            && layer_ready(self.particles.input().is_some(), self.particles.is_ready())
    }

    /// Release every backend and drop all data. The globe can be reused with a new
    /// [`Globe::handle_data_change`].
    pub fn dispose(&mut self) {
        self.ticks.stop();
        self.planet.dispose();
        self.mesh.dispose();
        self.overlay.dispose();
        self.particles.dispose();
        self.engine.clear();
        self.particle_product = None;
        self.planet_loader = None;
        self.loaded = false;
        log::info!("[globe] disposed");
    }

    pub fn backend(&self, layer: LayerKind) -> Option<BackendKind> {
        match layer {
            LayerKind::Planet => self.planet.backend(),
            LayerKind::Mesh => self.mesh.backend(),
            LayerKind::Overlay => self.overlay.backend(),
            LayerKind::Particles => self.particles.backend(),
            LayerKind::Foreground => None,
        }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn mask(&self) -> &VisibilityMask {
        &self.mask
    }

    pub fn engine(&self) -> &ParticleEngine {
        &self.engine
    }

    pub fn config(&self) -> &EpochConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn ticks(&self) -> &TickLoop {
        &self.ticks
    }

    pub fn mode(&self) -> DisplayMode {
        self.config.mode
    }

    fn build_field(&self) -> Option<Arc<Field>> {
        let product = self.particle_product.as_deref()?;
        match FieldSampler::new(product, &self.projection, &self.mask, self.viewport, self.params) {
            Ok(sampler) => Some(Arc::new(sampler.build())),
            Err(e) => {
                log::warn!("[globe] field not rebuilt: {e}");
                None
            }
        }
    }

    fn reseed(&mut self) {
        let meta = self.particle_product.as_deref().and_then(|p| p.particles());
        match (self.build_field(), meta) {
            (Some(field), Some(meta)) => {
                let scale = IntensityScale::new(self.params.intensity_step, meta.max_intensity);
                self.engine.reseed(field, scale, self.config.form_factor);
            }
            _ => self.engine.clear(),
        }
    }

    /// Start the planet epoch once the loader delivers. True when the layer changed.
    fn poll_planet(&mut self) -> bool {
        let Some(result) = self.planet_loader.as_ref().and_then(PlanetLoader::poll) else {
            return false;
        };
        self.planet_loader = None;
        match result {
            Ok(image) => {
                let input = PlanetInput { image: Some(Arc::new(image)) };
                let view = View { projection: &self.projection, mask: &self.mask, viewport: self.viewport };
                self.planet.handle_data_change(input, &self.projection, self.viewport, &view);
                true
            }
            Err(e) => {
                log::warn!("[planet] {e}");
                false
            }
        }
    }
}
