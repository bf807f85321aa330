//! Particle advection through a [`Field`] and per-tick intensity bucketing.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{AnimationParams, FormFactor};
use crate::field::{Field, Particle};

/// Monotonic grayscale intensity scale. Bucket `i` is drawn with `colors()[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct IntensityScale {
    max: f64,
    colors: Vec<[u8; 4]>,
}

impl IntensityScale {
    /// Grays from 85 to 255 in steps of `step`, saturating at `max_intensity`.
    pub fn new(step: u8, max_intensity: f64) -> Self {
        let step = usize::from(step.max(1));
        let colors = (85..=255usize).step_by(step).map(|g| [g as u8, g as u8, g as u8, 255]).collect();
        Self { max: max_intensity, colors }
    }

    /// Bucket index for magnitude `m`, proportional up to the max and clamped at both ends.
    pub fn index_for(&self, m: f64) -> usize {
        if self.colors.is_empty() || self.max <= 0.0 || m.is_nan() || m <= 0.0 {
            return 0;
        }
        let last = self.colors.len() - 1;
        let i = (m.min(self.max) / self.max * last as f64).floor();
        (i as usize).min(last)
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// True when the scale has no buckets.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Bucket colours, RGBA.
    pub fn colors(&self) -> &[[u8; 4]] {
        &self.colors
    }

    /// Saturation magnitude.
    pub fn max_intensity(&self) -> f64 {
        self.max
    }
}

/// Screen segment travelled by one particle this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    /// Start pixel.
    pub from: [f32; 2],
    /// End pixel.
    pub to: [f32; 2],
}

/// Per-tick counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Particles whose target was defined; equals the total bucket size.
    pub drawn: usize,
    /// Particles that moved without drawing.
    pub coasting: usize,
    /// Particles respawned at the start of the tick.
    pub respawned: usize,
    /// Particles that hit an undefined sample and were aged out.
    pub escaped: usize,
}

/// Owns the particle population and advances it one tick at a time.
pub struct ParticleEngine {
    params: AnimationParams,
    rng: StdRng,
    field: Option<Arc<Field>>,
    scale: Option<IntensityScale>,
    particles: Vec<Particle>,
    buckets: Vec<Vec<Segment>>,
    epoch: u64,
}

impl ParticleEngine {
    /// Empty engine; ticks are no-ops until [`ParticleEngine::reseed`].
    pub fn new(params: AnimationParams) -> Self {
        Self {
            params,
            rng: StdRng::seed_from_u64(params.seed),
            field: None,
            scale: None,
            particles: Vec::new(),
            buckets: Vec::new(),
            epoch: 0,
        }
    }

    /// New data epoch: replace the field and scale and respawn the whole population,
    /// sized from the field bounds.
    pub fn reseed(&mut self, field: Arc<Field>, scale: IntensityScale, form_factor: FormFactor) {
        let count = self.params.particle_count(field.bounds().width, form_factor);
        let max_age = self.params.max_particle_age;
        let expired = Particle { age: max_age + 1, x: 0.0, y: 0.0, target: None };
        self.particles.clear();
        self.particles.reserve(count);
        for _ in 0..count {
            let p = field.randomize(&mut self.rng, max_age).unwrap_or(expired);
            self.particles.push(p);
        }
        self.buckets = vec![Vec::new(); scale.len()];
        self.scale = Some(scale);
        self.epoch += 1;
        log::info!(
            "[particles] epoch {}: {} particles over {} valid positions",
            self.epoch,
            count,
            field.valid_positions().len()
        );
        self.field = Some(field);
    }

    /// Same data, rotated projection: swap the field and keep every particle where it is.
    /// This tick's segments belong to the old screen space and are dropped.
    pub fn replace_field(&mut self, field: Arc<Field>) {
        self.field = Some(field);
        self.clear_buckets();
    }

    /// Empty every bucket; the next tick refills them.
    pub fn clear_buckets(&mut self) {
        self.buckets.iter_mut().for_each(Vec::clear);
    }

    /// Drop field and scale; subsequent ticks draw nothing.
    pub fn clear(&mut self) {
        self.field = None;
        self.scale = None;
        self.particles.clear();
        self.clear_buckets();
    }

    /// Advance every particle one tick and rebuild the buckets.
    pub fn tick(&mut self) -> TickStats {
        self.clear_buckets();
        let mut stats = TickStats::default();
        let (Some(field), Some(scale)) = (self.field.as_ref(), self.scale.as_ref()) else {
            return stats;
        };
        let max_age = self.params.max_particle_age;

        for p in &mut self.particles {
            if let Some((xt, yt)) = p.target.take() {
                p.x = xt;
                p.y = yt;
            }
            if p.age > max_age {
                if let Some(fresh) = field.randomize(&mut self.rng, max_age) {
                    *p = fresh;
                }
                stats.respawned += 1;
            } else {
                let v = field.get(p.x, p.y);
                match v.magnitude {
                    None => {
                        p.age = max_age;
                        stats.escaped += 1;
                    }
                    Some(m) => {
                        let xt = p.x + f64::from(v.dx);
                        let yt = p.y + f64::from(v.dy);
                        if field.is_defined(xt, yt) {
                            p.target = Some((xt, yt));
                            self.buckets[scale.index_for(f64::from(m))].push(Segment {
                                from: [p.x as f32, p.y as f32],
                                to: [xt as f32, yt as f32],
                            });
                            stats.drawn += 1;
                        } else {
                            p.x = xt;
                            p.y = yt;
                            stats.coasting += 1;
                        }
                    }
                }
            }
            p.age += 1;
        }
        log::debug!(
            "[particles] tick: drawn={} coasting={} respawned={} escaped={}",
            stats.drawn,
            stats.coasting,
            stats.respawned,
            stats.escaped
        );
        stats
    }

    /// Segments drawn this tick, grouped by intensity bucket.
    pub fn buckets(&self) -> &[Vec<Segment>] {
        &self.buckets
    }

    /// Bucket colours of the current scale.
    pub fn colors(&self) -> &[[u8; 4]] {
        match &self.scale {
            Some(s) => s.colors(),
            None => &[],
        }
    }

    /// Read-only view of the population.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Field the particles currently advect through.
    pub fn field(&self) -> Option<&Arc<Field>> {
        self.field.as_ref()
    }

    /// Number of reseeds so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Tunables this engine was built with.
    pub fn params(&self) -> &AnimationParams {
        &self.params
    }
}
