//! Screen-space vector field sampled from a weather product.
//!
//! The field covers the projection bounds at a fixed stride; each sample is copied to its
//! right and lower neighbours so any pixel resolves to the nearest stride sample. Samples
//! hold the product vector already scaled and distorted into pixels per tick, plus the raw
//! product magnitude used for colouring.

use std::time::Instant;

use rand::Rng;
use zephyr_geo::{Bounds, Projection, ProjectionKey, Viewport, VisibilityMask};

use crate::config::AnimationParams;
use crate::product::{Sample, WeatherProduct};

/// Field value at one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldVector {
    /// Screen-space displacement along x, pixels per tick.
    pub dx: f32,
    /// Screen-space displacement along y, pixels per tick.
    pub dy: f32,
    /// Product magnitude; `None` where the field is undefined.
    pub magnitude: Option<f32>,
}

impl FieldVector {
    /// Undefined value returned off the globe and outside the bounds.
    pub const NULL: Self = Self { dx: f32::NAN, dy: f32::NAN, magnitude: None };
}

/// One animated particle, in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    /// Ticks since (re)spawn.
    pub age: u32,
    /// Current x.
    pub x: f64,
    /// Current y.
    pub y: f64,
    /// Position the particle is moving to this tick, committed on the next tick.
    pub target: Option<(f64, f64)>,
}

/// Errors from building a field.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// The mask was built for another projection or viewport.
    #[error("visibility mask is stale for the current projection/viewport")]
    StaleMask,
}

/// Immutable field for one (product, projection, viewport) epoch.
#[derive(Clone, Debug)]
pub struct Field {
    key: ProjectionKey,
    viewport: Viewport,
    bounds: Bounds,
    cells: Vec<FieldVector>,
    valid: Vec<(i32, i32)>,
}

impl Field {
    /// Field with no defined samples, keyed to `mask`.
    pub fn empty(mask: &VisibilityMask) -> Self {
        Self {
            key: mask.key(),
            viewport: mask.viewport(),
            bounds: Bounds::EMPTY,
            cells: Vec::new(),
            valid: Vec::new(),
        }
    }

    /// Value at the pixel nearest to `(x, y)`.
    #[inline]
    pub fn get(&self, x: f64, y: f64) -> FieldVector {
        if !x.is_finite() || !y.is_finite() {
            return FieldVector::NULL;
        }
        let (xi, yi) = (x.round(), y.round());
        let b = &self.bounds;
        if b.is_empty()
            || xi < f64::from(b.x)
            || xi > f64::from(b.x_max)
            || yi < f64::from(b.y)
            || yi > f64::from(b.y_max)
        {
            return FieldVector::NULL;
        }
        let col = xi as i32 - b.x;
        let row = yi as i32 - b.y;
        self.cells[row as usize * b.width as usize + col as usize]
    }

    /// True when the nearest stride sample has a magnitude.
    #[inline]
    pub fn is_defined(&self, x: f64, y: f64) -> bool {
        self.get(x, y).magnitude.is_some()
    }

    /// New particle at a uniformly chosen valid position with age in `[0, max_age)`.
    /// `None` when the field has no valid positions.
    pub fn randomize<R: Rng>(&self, rng: &mut R, max_age: u32) -> Option<Particle> {
        if self.valid.is_empty() {
            return None;
        }
        let (x, y) = self.valid[rng.gen_range(0..self.valid.len())];
        Some(Particle {
            age: rng.gen_range(0..max_age.max(1)),
            x: f64::from(x),
            y: f64::from(y),
            target: None,
        })
    }

    /// Stride sample positions with a defined magnitude.
    pub fn valid_positions(&self) -> &[(i32, i32)] {
        &self.valid
    }

    /// Rectangle the field covers.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Key of the projection the field was built for.
    pub fn key(&self) -> ProjectionKey {
        self.key
    }

    /// Viewport the field was built for.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// True when this field was built for `projection` on `viewport`.
    pub fn matches(&self, projection: &Projection, viewport: Viewport) -> bool {
        self.key == projection.key() && self.viewport == viewport
    }
}

/// Builds fields from a product, a projection and its mask.
pub struct FieldSampler<'a> {
    product: &'a dyn WeatherProduct,
    projection: &'a Projection,
    mask: &'a VisibilityMask,
    params: AnimationParams,
    velocity_scale: f64,
}

impl<'a> FieldSampler<'a> {
    /// Fails with [`FieldError::StaleMask`] unless `mask` was built for `projection` on
    /// `viewport`.
    pub fn new(
        product: &'a dyn WeatherProduct,
        projection: &'a Projection,
        mask: &'a VisibilityMask,
        viewport: Viewport,
        params: AnimationParams,
    ) -> Result<Self, FieldError> {
        if !mask.matches(projection, viewport) {
            return Err(FieldError::StaleMask);
        }
        let meta = product.particles().unwrap_or_default();
        let velocity_scale = f64::from(mask.bounds().height) * meta.velocity_scale;
        Ok(Self { product, projection, mask, params, velocity_scale })
    }

    /// Pixels-per-tick factor: the product velocity scale times the bounds height.
    pub fn velocity_scale(&self) -> f64 {
        self.velocity_scale
    }

    /// Screen-space sample at pixel `(x, y)`; `None` when invisible, off the sphere, without
    /// data, or numerically degenerate.
    pub fn sample(&self, x: i32, y: i32) -> Option<FieldVector> {
        if !self.mask.is_visible(x, y) {
            return None;
        }
        let (fx, fy) = (f64::from(x), f64::from(y));
        let [lon, lat] = self.projection.invert(fx, fy)?;
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        let value = self.product.interpolate(lon, lat)?;
        let (u, v, m) = match value {
            Sample::Vector { u, v, magnitude } => (u, v, magnitude),
            Sample::Scalar(s) => (0.0, 0.0, s),
        };
        if !m.is_finite() {
            return None;
        }
        let d = self.projection.distortion(lon, lat, fx, fy)?;
        let (dx, dy) = d.apply(u * self.velocity_scale, v * self.velocity_scale);
        if !dx.is_finite() || !dy.is_finite() || dx.hypot(dy) >= self.params.degenerate_magnitude_px {
            return None;
        }
        Some(FieldVector { dx: dx as f32, dy: dy as f32, magnitude: Some(m as f32) })
    }

    /// Sample the whole bounds rectangle.
    pub fn build(&self) -> Field {
        let started = Instant::now();
        let bounds = self.mask.bounds();
        let viewport = self.mask.viewport();
        if bounds.is_empty() {
            return Field::empty(self.mask);
        }
        let (w, h) = (bounds.width as usize, bounds.height as usize);
        let mut cells = vec![FieldVector::NULL; w * h];
        let mut valid = Vec::new();
        let stride = self.params.sample_stride.max(1) as usize;

        for row in (0..h).step_by(stride) {
            for col in (0..w).step_by(stride) {
                let (x, y) = (bounds.x + col as i32, bounds.y + row as i32);
                let Some(v) = self.sample(x, y) else { continue };
                valid.push((x, y));
                for r in row..(row + stride).min(h) {
                    for c in col..(col + stride).min(w) {
                        let (xr, yr) = (bounds.x + c as i32, bounds.y + r as i32);
                        // Replicated neighbours still honour the mask
                        if self.mask.is_visible(xr, yr) {
                            cells[r * w + c] = v;
                        }
                    }
                }
            }
        }

        log::info!(
            "[field] {} {}x{} built in {} ms: {} valid positions",
            self.product.name(),
            w,
            h,
            started.elapsed().as_millis(),
            valid.len()
        );
        Field { key: self.mask.key(), viewport, bounds, cells, valid }
    }
}
