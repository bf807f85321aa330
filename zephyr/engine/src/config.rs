//! Configuration types shared by the field sampler, the particle engine and the viewer.
//!
//! `EpochConfig` is the read-only snapshot the embedding application hands to every
//! `handle_*` call; nothing in the core stores or mutates configuration on its own.

use zephyr_geo::{ProjectionKind, ProjectionParams};

/// Which family of layers the globe shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayMode {
    /// Atmosphere: wind particles and weather overlays.
    #[default]
    Air,
    /// Ocean: current particles and ocean overlays.
    Ocean,
    /// Planet imagery only.
    Planet,
}

/// Scalar overlay drawn under the particles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OverlayType {
    /// No overlay.
    Off,
    /// Magnitude of the animated product (wind or current speed).
    #[default]
    Default,
    /// Surface temperature.
    Temperature,
}

/// Vector product that drives the particles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ParticleType {
    /// No animation.
    Off,
    /// Surface wind.
    #[default]
    Wind,
    /// Ocean currents.
    Currents,
}

/// Device class; constrained devices animate fewer particles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FormFactor {
    /// Desktop-class device.
    #[default]
    Desktop,
    /// Phone or other constrained device.
    Constrained,
}

/// Read-only configuration for one epoch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpochConfig {
    /// Active display mode.
    pub mode: DisplayMode,
    /// Overlay selection.
    pub overlay: OverlayType,
    /// Particle selection.
    pub particles: ParticleType,
    /// Projection kind.
    pub projection: ProjectionKind,
    /// d3 rotation triple in degrees; `None` uses the projection default.
    pub orientation: Option<[f64; 3]>,
    /// Device class.
    pub form_factor: FormFactor,
    /// Draw the graticule in the mesh layer.
    pub show_graticule: bool,
    /// Month (1-12) of the planet imagery; `None` disables the planet layer.
    pub planet: Option<u8>,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Air,
            overlay: OverlayType::Default,
            particles: ParticleType::Wind,
            projection: ProjectionKind::Orthographic,
            orientation: None,
            form_factor: FormFactor::Desktop,
            show_graticule: false,
            planet: None,
        }
    }
}

impl EpochConfig {
    /// Projection parameters for this snapshot; scale and translation are fitted by the
    /// projection itself.
    pub fn projection_params(&self) -> ProjectionParams {
        let mut params = ProjectionParams::new(self.projection);
        if let Some(rotate) = self.orientation {
            params.rotate = rotate;
        }
        params
    }

    /// True when switching from `self` to `next` needs new data (product, mode or projection
    /// kind) rather than a redraw.
    pub fn needs_rebuild(&self, next: &EpochConfig) -> bool {
        self.mode != next.mode
            || self.overlay != next.overlay
            || self.particles != next.particles
            || self.projection != next.projection
            || self.form_factor != next.form_factor
            || self.show_graticule != next.show_graticule
            || self.planet != next.planet
    }
}

/// Animation tunables.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationParams {
    /// Ticks a particle lives before it is respawned.
    pub max_particle_age: u32,
    /// Particles per pixel of bounds width.
    pub particle_multiplier: f64,
    /// Population factor on constrained devices.
    pub constrained_reduction: f64,
    /// Grayscale step of the intensity scale (85..=255).
    pub intensity_step: u8,
    /// Tick period in milliseconds.
    pub frame_period_ms: u64,
    /// Screen-space displacement (pixels per tick) treated as numerically degenerate.
    pub degenerate_magnitude_px: f64,
    /// Per-frame multiplier applied to existing trail pixels.
    pub trail_fade: f32,
    /// Opacity of the scalar overlay.
    pub overlay_alpha: f32,
    /// Sampling stride of the field and the software overlay, in pixels.
    pub sample_stride: u32,
    /// Seed for particle placement.
    pub seed: u64,
}

impl Default for AnimationParams {
    fn default() -> Self {
        Self {
            max_particle_age: 100,
            particle_multiplier: 7.0,
            constrained_reduction: 0.75,
            intensity_step: 10,
            frame_period_ms: 40,
            degenerate_magnitude_px: 200.0,
            trail_fade: 0.97,
            overlay_alpha: 0.4,
            sample_stride: 2,
            seed: 0x5EED_2E47,
        }
    }
}

impl AnimationParams {
    /// Population size for a field whose bounds are `bounds_width` pixels wide.
    pub fn particle_count(&self, bounds_width: i32, form_factor: FormFactor) -> usize {
        let mut n = f64::from(bounds_width.max(0)) * self.particle_multiplier;
        if form_factor == FormFactor::Constrained {
            n *= self.constrained_reduction;
        }
        n.round() as usize
    }
}
