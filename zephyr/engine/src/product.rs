//! Weather products: the `interpolate(lon, lat)` capability the field sampler and overlay
//! consume, and a regular lat/lon grid implementing it.

use zephyr_geo::floor_mod;

use crate::units::Unit;

/// One interpolated value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    /// Geographic vector (eastward `u`, northward `v`) and its magnitude.
    Vector {
        /// Eastward component.
        u: f64,
        /// Northward component.
        v: f64,
        /// `|(u, v)|`.
        magnitude: f64,
    },
    /// Scalar value (e.g. temperature in K).
    Scalar(f64),
}

impl Sample {
    /// Vector magnitude or the scalar value.
    pub fn magnitude(&self) -> f64 {
        match *self {
            Sample::Vector { magnitude, .. } => magnitude,
            Sample::Scalar(s) => s,
        }
    }
}

/// Particle animation parameters declared by a vector product.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleMeta {
    /// Converts product units into pixels per frame once multiplied by the bounds height.
    pub velocity_scale: f64,
    /// Magnitude at which the intensity scale saturates.
    pub max_intensity: f64,
}

impl Default for ParticleMeta {
    fn default() -> Self {
        Self { velocity_scale: 1.0 / 60_000.0, max_intensity: 17.0 }
    }
}

/// Overlay colour scale: the value range mapped onto a named palette.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorScale {
    /// Value mapped to the first palette stop.
    pub min: f64,
    /// Value mapped to the last palette stop.
    pub max: f64,
    /// Palette name resolved by the renderer.
    pub palette: &'static str,
}

impl ColorScale {
    /// Position of `value` inside the range, clamped to [0, 1].
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 || !value.is_finite() {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

/// Capability the core consumes from the external data collaborator.
pub trait WeatherProduct: Send + Sync {
    /// Human-readable product name, used in log lines.
    fn name(&self) -> &str;
    /// Value at `(lon, lat)` in degrees, or `None` where the product has no data.
    fn interpolate(&self, lon: f64, lat: f64) -> Option<Sample>;
    /// Display units, first entry is the default.
    fn units(&self) -> &[Unit];
    /// Overlay colour scale.
    fn scale(&self) -> ColorScale;
    /// Particle metadata; `None` for products that cannot drive particles.
    fn particles(&self) -> Option<ParticleMeta>;
}

/// Errors from constructing gridded products.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProductError {
    /// Grid has no rows or columns
    #[error("grid has zero size ({ni}x{nj})")]
    ZeroSize {
        /// Columns.
        ni: usize,
        /// Rows.
        nj: usize,
    },
    /// Spacing is zero, negative or non-finite
    #[error("bad grid spacing dlon={dlon} dlat={dlat}")]
    BadSpacing {
        /// Longitude step in degrees.
        dlon: f64,
        /// Latitude step in degrees.
        dlat: f64,
    },
    /// Payload length differs from `ni * nj`
    #[error("data length {got} does not match grid size {expected}")]
    LengthMismatch {
        /// `ni * nj`.
        expected: usize,
        /// Supplied length.
        got: usize,
    },
}

/// Regular lat/lon grid geometry. Row 0 lies at `lat0`, rows run south.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridHeader {
    /// Longitude of column 0 in degrees.
    pub lon0: f64,
    /// Latitude of row 0 in degrees.
    pub lat0: f64,
    /// Column spacing in degrees.
    pub dlon: f64,
    /// Row spacing in degrees.
    pub dlat: f64,
    /// Number of columns.
    pub ni: usize,
    /// Number of rows.
    pub nj: usize,
}

impl GridHeader {
    /// Global grid at `step` degrees starting at (0°E, 90°N).
    pub fn global(step: f64) -> Self {
        let ni = (360.0 / step).round() as usize;
        let nj = (180.0 / step).round() as usize + 1;
        Self { lon0: 0.0, lat0: 90.0, dlon: step, dlat: step, ni, nj }
    }

    /// Grid covers all longitudes, so column `ni` wraps to column 0.
    pub fn is_continuous(&self) -> bool {
        (self.ni as f64 * self.dlon).floor() >= 360.0
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.ni * self.nj
    }

    /// True when the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self, len: usize) -> Result<(), ProductError> {
        if self.ni == 0 || self.nj == 0 {
            return Err(ProductError::ZeroSize { ni: self.ni, nj: self.nj });
        }
        let ok = |d: f64| d.is_finite() && d > 0.0;
        if !ok(self.dlon) || !ok(self.dlat) {
            return Err(ProductError::BadSpacing { dlon: self.dlon, dlat: self.dlat });
        }
        if len != self.len() {
            return Err(ProductError::LengthMismatch { expected: self.len(), got: len });
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
enum Payload {
    Vector(Vec<Option<[f32; 2]>>),
    Scalar(Vec<Option<f32>>),
}

/// Gridded product with bilinear interpolation. `None` cells are holes.
#[derive(Clone, Debug)]
pub struct GridProduct {
    name: String,
    header: GridHeader,
    payload: Payload,
    units: Vec<Unit>,
    scale: ColorScale,
    particles: Option<ParticleMeta>,
}

impl GridProduct {
    /// Vector product from separate `u` and `v` rows (row-major, `ni` per row).
    pub fn vector(
        name: impl Into<String>,
        header: GridHeader,
        u: &[Option<f32>],
        v: &[Option<f32>],
    ) -> Result<Self, ProductError> {
        header.validate(u.len())?;
        header.validate(v.len())?;
        let cells = u
            .iter()
            .zip(v)
            .map(|(a, b)| match (a, b) {
                (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some([*a, *b]),
                _ => None,
            })
            .collect();
        Ok(Self {
            name: name.into(),
            header,
            payload: Payload::Vector(cells),
            units: Unit::SPEED.to_vec(),
            scale: ColorScale { min: 0.0, max: 100.0, palette: "wind" },
            particles: Some(ParticleMeta::default()),
        })
    }

    /// Scalar product (row-major, `ni` per row).
    pub fn scalar(
        name: impl Into<String>,
        header: GridHeader,
        values: &[Option<f32>],
    ) -> Result<Self, ProductError> {
        header.validate(values.len())?;
        let cells = values.iter().map(|c| c.filter(|x| x.is_finite())).collect();
        Ok(Self {
            name: name.into(),
            header,
            payload: Payload::Scalar(cells),
            units: Unit::TEMPERATURE.to_vec(),
            scale: ColorScale { min: 193.0, max: 328.0, palette: "temperature" },
            particles: None,
        })
    }

    /// Replace the particle metadata.
    pub fn with_particles(mut self, meta: Option<ParticleMeta>) -> Self {
        self.particles = meta;
        self
    }

    /// Replace the overlay colour scale.
    pub fn with_scale(mut self, scale: ColorScale) -> Self {
        self.scale = scale;
        self
    }

    /// Replace the display units.
    pub fn with_units(mut self, units: Vec<Unit>) -> Self {
        self.units = units;
        self
    }

    /// Grid geometry.
    pub fn header(&self) -> GridHeader {
        self.header
    }

    fn cell(&self, i: usize, j: usize) -> Option<[f64; 2]> {
        let k = j * self.header.ni + i;
        match &self.payload {
            Payload::Vector(c) => c[k].map(|[u, v]| [f64::from(u), f64::from(v)]),
            Payload::Scalar(c) => c[k].map(|s| [f64::from(s), 0.0]),
        }
    }
}

impl WeatherProduct for GridProduct {
    fn name(&self) -> &str {
        &self.name
    }

    fn interpolate(&self, lon: f64, lat: f64) -> Option<Sample> {
        let h = &self.header;
        let i = floor_mod(lon - h.lon0, 360.0) / h.dlon;
        let j = (h.lat0 - lat) / h.dlat;
        if !i.is_finite() || !j.is_finite() || j < 0.0 {
            return None;
        }
        let (fi, fj) = (i.floor(), j.floor());
        let (ci, cj) = (fi as usize, fj as usize);
        if cj >= h.nj {
            return None;
        }
        let continuous = h.is_continuous();
        let wrap_col = |c: usize| -> Option<usize> {
            if c < h.ni {
                Some(c)
            } else if continuous {
                Some(c - h.ni)
            } else {
                None
            }
        };
        let c0 = wrap_col(ci)?;
        let c1 = wrap_col(ci + 1).unwrap_or(c0);
        let (x, y) = (i - fi, j - fj);
        // Last row is only reachable exactly on it
        let r1 = if cj + 1 < h.nj {
            cj + 1
        } else if y == 0.0 {
            cj
        } else {
            return None;
        };

        let g00 = self.cell(c0, cj)?;
        let g10 = self.cell(c1, cj)?;
        let g01 = self.cell(c0, r1)?;
        let g11 = self.cell(c1, r1)?;
        let rx = 1.0 - x;
        let ry = 1.0 - y;
        let (a, b, c, d) = (rx * ry, x * ry, rx * y, x * y);
        let lerp = |k: usize| g00[k] * a + g10[k] * b + g01[k] * c + g11[k] * d;
        match self.payload {
            Payload::Vector(_) => {
                let (u, v) = (lerp(0), lerp(1));
                Some(Sample::Vector { u, v, magnitude: u.hypot(v) })
            }
            Payload::Scalar(_) => Some(Sample::Scalar(lerp(0))),
        }
    }

    fn units(&self) -> &[Unit] {
        &self.units
    }

    fn scale(&self) -> ColorScale {
        self.scale
    }

    fn particles(&self) -> Option<ParticleMeta> {
        self.particles
    }
}

/// Surface wind (u/v at 10 m), animated with the default particle parameters.
pub fn wind(header: GridHeader, u: &[Option<f32>], v: &[Option<f32>]) -> Result<GridProduct, ProductError> {
    GridProduct::vector("wind", header, u, v)
}

/// Surface ocean currents: slow flow, so a much larger velocity scale.
pub fn ocean_currents(
    header: GridHeader,
    u: &[Option<f32>],
    v: &[Option<f32>],
) -> Result<GridProduct, ProductError> {
    Ok(GridProduct::vector("currents", header, u, v)?
        .with_particles(Some(ParticleMeta { velocity_scale: 1.0 / 4_400.0, max_intensity: 0.7 }))
        .with_scale(ColorScale { min: 0.0, max: 1.5, palette: "currents" })
        .with_units(vec![Unit::MetersPerSecond, Unit::KilometersPerHour, Unit::Knots, Unit::MilesPerHour]))
}

/// Surface temperature in K.
pub fn temperature(header: GridHeader, values: &[Option<f32>]) -> Result<GridProduct, ProductError> {
    GridProduct::scalar("temp", header, values)
}
