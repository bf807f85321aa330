//! Forward/inverse projections for the two modelled families.
//!
//! Conventions follow the d3 projection model: raw projections work on the unit sphere in
//! radians with +y up, screen pixels are `(tx + k·x, ty − k·y)`, and the rotation triple is
//! given in degrees as `[λ, φ, γ]` (`[-lon, -lat, 0]` centres the view on `(lon, lat)`).
//! Public coordinates are degrees for geography and pixels for the screen.

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use crate::math::{sph_to_unit, unit_to_sph, wrap_lon_deg, wrap_lon_rad, Vec2};
use crate::octa::{build_butterfly, pick_face, OctaFace};

/// Projection family. Sphere-like projections have an invalid region (back hemisphere or the
/// antipode); flat maps cover the whole lon/lat rectangle and wrap in longitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    SphereLike,
    FlatMap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    Orthographic,
    Stereographic,
    AzimuthalEquidistant,
    ConicEquidistant,
    Equirectangular,
    /// Mollweide re-centred on the Atlantic.
    Atlantis,
    /// Octahedral butterfly with gnomonic faces.
    Waterman,
    Winkel3,
}

impl ProjectionKind {
    pub const ALL: [Self; 8] = [
        Self::Orthographic,
        Self::Stereographic,
        Self::AzimuthalEquidistant,
        Self::ConicEquidistant,
        Self::Equirectangular,
        Self::Atlantis,
        Self::Waterman,
        Self::Winkel3,
    ];

    #[must_use]
    pub fn family(self) -> Family {
        match self {
            Self::Orthographic
            | Self::Stereographic
            | Self::AzimuthalEquidistant
            | Self::ConicEquidistant => Family::SphereLike,
            Self::Equirectangular | Self::Atlantis | Self::Waterman | Self::Winkel3 => {
                Family::FlatMap
            }
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Orthographic => "orthographic",
            Self::Stereographic => "stereographic",
            Self::AzimuthalEquidistant => "azimuthal_equidistant",
            Self::ConicEquidistant => "conic_equidistant",
            Self::Equirectangular => "equirectangular",
            Self::Atlantis => "atlantis",
            Self::Waterman => "waterman",
            Self::Winkel3 => "winkel3",
        }
    }

    /// Rotation applied when the caller does not choose an orientation.
    #[must_use]
    pub fn default_rotate(self) -> [f64; 3] {
        match self {
            Self::Atlantis => [30.0, -45.0, 90.0],
            Self::AzimuthalEquidistant => [0.0, -90.0, 0.0],
            _ => [0.0, 0.0, 0.0],
        }
    }

    /// Angular radius (degrees) beyond which points are clipped; `None` for flat maps and
    /// the conic.
    pub fn clip_angle_deg(self) -> Option<f64> {
        match self {
            Self::Orthographic => Some(90.0),
            Self::Stereographic => Some(180.0 - 0.01),
            Self::AzimuthalEquidistant => Some(180.0 - 0.001),
            _ => None,
        }
    }

    /// Angular radius (degrees) the default scale is fitted to.
    fn fit_angle_deg(self) -> Option<f64> {
        match self {
            Self::Orthographic | Self::Stereographic => Some(90.0),
            Self::AzimuthalEquidistant => Some(180.0 - 0.001),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from resolving projection names.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// Name does not match any modelled projection
    #[error("unknown projection '{0}'")]
    Unknown(String),
}

impl FromStr for ProjectionKind {
    type Err = ProjectionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProjectionError::Unknown(s.to_string()))
    }
}

/// Drawing surface size in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }
}

/// Pixel rectangle enclosing the visible part of the globe, clamped to the viewport.
/// `x_max`/`y_max` are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub x_max: i32,
    pub y_max: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub const EMPTY: Self = Self { x: 0, y: 0, x_max: -1, y_max: -1, width: 0, height: 0 };

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x <= self.x_max && y >= self.y && y <= self.y_max
    }
}

/// Caller-facing projection parameters. Unset scale/translate are fitted to the viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionParams {
    pub kind: ProjectionKind,
    /// d3 rotation triple in degrees.
    pub rotate: [f64; 3],
    pub scale: Option<f64>,
    pub translate: Option<[f64; 2]>,
}

impl ProjectionParams {
    #[must_use]
    pub fn new(kind: ProjectionKind) -> Self {
        Self { kind, rotate: kind.default_rotate(), scale: None, translate: None }
    }

    /// Orientation that puts `(lon, lat)` at the view centre.
    #[must_use]
    pub fn centered_on(kind: ProjectionKind, lon: f64, lat: f64) -> Self {
        Self { rotate: [-lon, -lat, 0.0], ..Self::new(kind) }
    }
}

impl Default for ProjectionParams {
    fn default() -> Self {
        Self::new(ProjectionKind::Orthographic)
    }
}

/// Jacobian-like factors turning a geographic (east, north) vector into screen pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Distortion {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Distortion {
    #[inline]
    #[must_use]
    pub fn apply(&self, u: f64, v: f64) -> (f64, f64) {
        (self.a * u + self.c * v, self.b * u + self.d * v)
    }
}

/// Identity of a resolved projection; two projections with equal keys map every pixel the
/// same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProjectionKey {
    pub kind: ProjectionKind,
    bits: [u64; 6],
}

#[derive(Clone, Copy, Debug)]
struct Rotation {
    d_lambda: f64,
    rotates_pole: bool,
    cos_phi: f64,
    sin_phi: f64,
    cos_gamma: f64,
    sin_gamma: f64,
}

impl Rotation {
    fn new(rotate_deg: [f64; 3]) -> Self {
        let (sin_phi, cos_phi) = rotate_deg[1].to_radians().sin_cos();
        let (sin_gamma, cos_gamma) = rotate_deg[2].to_radians().sin_cos();
        Self {
            d_lambda: wrap_lon_deg(rotate_deg[0]).to_radians(),
            rotates_pole: rotate_deg[1] != 0.0 || rotate_deg[2] != 0.0,
            cos_phi,
            sin_phi,
            cos_gamma,
            sin_gamma,
        }
    }

    fn forward(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let lambda = wrap_lon_rad(lambda + self.d_lambda);
        if !self.rotates_pole {
            return (lambda, phi);
        }
        let cp = phi.cos();
        let x = lambda.cos() * cp;
        let y = lambda.sin() * cp;
        let z = phi.sin();
        let k = z * self.cos_phi + x * self.sin_phi;
        (
            (y * self.cos_gamma - k * self.sin_gamma).atan2(x * self.cos_phi - z * self.sin_phi),
            (k * self.cos_gamma + y * self.sin_gamma).clamp(-1.0, 1.0).asin(),
        )
    }

    fn invert(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let (lambda, phi) = if self.rotates_pole {
            let cp = phi.cos();
            let x = lambda.cos() * cp;
            let y = lambda.sin() * cp;
            let z = phi.sin();
            let k = z * self.cos_gamma - y * self.sin_gamma;
            (
                (y * self.cos_gamma + z * self.sin_gamma).atan2(x * self.cos_phi + k * self.sin_phi),
                (k * self.cos_phi - x * self.sin_phi).clamp(-1.0, 1.0).asin(),
            )
        } else {
            (lambda, phi)
        };
        (wrap_lon_rad(lambda - self.d_lambda), phi)
    }
}

// Conic standard parallels (d3 defaults: 0° and 60°).
const CONIC_PHI0: f64 = 0.0;
const CONIC_PHI1: f64 = PI / 3.0;

fn conic_constants() -> (f64, f64) {
    let cos0 = CONIC_PHI0.cos();
    let n = (cos0 - CONIC_PHI1.cos()) / (CONIC_PHI1 - CONIC_PHI0);
    (n, cos0 / n + CONIC_PHI0)
}

const MOLLWEIDE_CX: f64 = 2.0 * std::f64::consts::SQRT_2 / PI;
const MOLLWEIDE_CY: f64 = std::f64::consts::SQRT_2;

fn mollweide_theta(phi: f64) -> f64 {
    let target = PI * phi.sin();
    let mut t = phi;
    for _ in 0..30 {
        let denom = 1.0 + t.cos();
        if denom.abs() < 1e-12 {
            break;
        }
        let delta = (t + t.sin() - target) / denom;
        t -= delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }
    t / 2.0
}

fn sinci(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        x / x.sin()
    }
}

fn winkel3(lambda: f64, phi: f64) -> (f64, f64) {
    let cp = phi.cos();
    let half = lambda / 2.0;
    let s = sinci((cp * half.cos()).clamp(-1.0, 1.0).acos());
    let ax = 2.0 * cp * half.sin() * s;
    let ay = phi.sin() * s;
    ((ax + lambda / FRAC_PI_2) / 2.0, (ay + phi) / 2.0)
}

fn winkel3_invert(x: f64, y: f64) -> Option<(f64, f64)> {
    // x(λ, 0) = λ·(1 + 2/π)/2
    let mut lambda = x / ((1.0 + 2.0 / PI) / 2.0);
    let mut phi = y;
    let h = 1e-7;
    for _ in 0..40 {
        let (fx, fy) = winkel3(lambda, phi);
        let (ex, ey) = (fx - x, fy - y);
        if ex.abs() < 1e-10 && ey.abs() < 1e-10 {
            return Some((lambda, phi));
        }
        let (ax, ay) = winkel3(lambda + h, phi);
        let (bx, by) = winkel3(lambda, phi - h);
        let j11 = (ax - fx) / h;
        let j21 = (ay - fy) / h;
        let j12 = (fx - bx) / h;
        let j22 = (fy - by) / h;
        let det = j11 * j22 - j12 * j21;
        if det.abs() < 1e-14 || !det.is_finite() {
            return None;
        }
        lambda -= (j22 * ex - j12 * ey) / det;
        phi -= (j11 * ey - j21 * ex) / det;
        phi = phi.clamp(-FRAC_PI_2, FRAC_PI_2);
        lambda = lambda.clamp(-2.0 * PI, 2.0 * PI);
    }
    let (fx, fy) = winkel3(lambda, phi);
    ((fx - x).hypot(fy - y) < 1e-7).then_some((lambda, phi))
}

fn azimuthal_invert(x: f64, y: f64, rho: f64, c: f64) -> (f64, f64) {
    let (sc, cc) = c.sin_cos();
    let lambda = (x * sc).atan2(rho * cc);
    let phi = if rho == 0.0 { 0.0 } else { (y * sc / rho).clamp(-1.0, 1.0).asin() };
    (lambda, phi)
}

fn in_domain(lambda: f64, phi: f64) -> bool {
    const EPS: f64 = 1e-9;
    lambda.is_finite()
        && phi.is_finite()
        && lambda.abs() <= PI + EPS
        && phi.abs() <= FRAC_PI_2 + EPS
}

/// A fully resolved projection bound to a scale and translation.
#[derive(Clone, Debug)]
pub struct Projection {
    kind: ProjectionKind,
    rotate: [f64; 3],
    rotation: Rotation,
    scale: f64,
    translate: [f64; 2],
    clip_cos: Option<f64>,
    faces: Vec<OctaFace>,
}

impl Projection {
    /// Resolve `params` for `viewport`, fitting scale and translation when unset.
    #[must_use]
    pub fn new(params: ProjectionParams, viewport: Viewport) -> Self {
        let kind = params.kind;
        let faces = if kind == ProjectionKind::Waterman { build_butterfly() } else { Vec::new() };
        let mut p = Self {
            kind,
            rotate: params.rotate,
            rotation: Rotation::new(params.rotate),
            scale: 1.0,
            translate: [f64::from(viewport.width) / 2.0, f64::from(viewport.height) / 2.0],
            clip_cos: kind.clip_angle_deg().map(|a| a.to_radians().cos()),
            faces,
        };
        p.scale = params.scale.unwrap_or_else(|| p.fit_scale(viewport));
        if let Some(t) = params.translate {
            p.translate = t;
        }
        p
    }

    /// Same scale and translation, new orientation.
    #[must_use]
    pub fn rotated(&self, rotate: [f64; 3]) -> Self {
        Self { rotate, rotation: Rotation::new(rotate), ..self.clone() }
    }

    #[must_use]
    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }
    #[must_use]
    pub fn family(&self) -> Family {
        self.kind.family()
    }
    #[must_use]
    pub fn rotate(&self) -> [f64; 3] {
        self.rotate
    }
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }
    #[must_use]
    pub fn translate(&self) -> [f64; 2] {
        self.translate
    }

    /// Parameters that reproduce exactly this projection.
    #[must_use]
    pub fn params(&self) -> ProjectionParams {
        ProjectionParams {
            kind: self.kind,
            rotate: self.rotate,
            scale: Some(self.scale),
            translate: Some(self.translate),
        }
    }

    #[must_use]
    pub fn key(&self) -> ProjectionKey {
        ProjectionKey {
            kind: self.kind,
            bits: [
                self.rotate[0].to_bits(),
                self.rotate[1].to_bits(),
                self.rotate[2].to_bits(),
                self.scale.to_bits(),
                self.translate[0].to_bits(),
                self.translate[1].to_bits(),
            ],
        }
    }

    /// Project `(lon, lat)` in degrees to a pixel. `None` for clipped, antipodal or
    /// non-finite points.
    #[must_use]
    pub fn forward(&self, lon: f64, lat: f64) -> Option<[f64; 2]> {
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
            return None;
        }
        let lambda = wrap_lon_deg(lon).to_radians();
        let (lambda, phi) = self.rotation.forward(lambda, lat.to_radians());
        let (x, y) = self.raw_forward(lambda, phi)?;
        let px = [self.translate[0] + self.scale * x, self.translate[1] - self.scale * y];
        (px[0].is_finite() && px[1].is_finite()).then_some(px)
    }

    /// Pixel to `(lon, lat)` in degrees, longitude wrapped into [-180, 180).
    #[must_use]
    pub fn invert(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let rx = (x - self.translate[0]) / self.scale;
        let ry = (self.translate[1] - y) / self.scale;
        if !rx.is_finite() || !ry.is_finite() {
            return None;
        }
        let (lambda, phi) = self.raw_invert(rx, ry)?;
        let (lambda, phi) = self.rotation.invert(lambda, phi);
        let lon = wrap_lon_deg(lambda.to_degrees());
        let lat = phi.to_degrees();
        (lon.is_finite() && lat.is_finite()).then_some([lon, lat])
    }

    /// Pixel rectangle enclosing the projected sphere, clamped to `viewport`.
    #[must_use]
    pub fn bounds(&self, viewport: Viewport) -> Bounds {
        if viewport.width == 0 || viewport.height == 0 {
            return Bounds::EMPTY;
        }
        let Some((x0, y0, x1, y1)) = self.outline_box(self.kind.clip_angle_deg()) else {
            return Bounds::EMPTY;
        };
        let sx0 = self.translate[0] + self.scale * x0;
        let sx1 = self.translate[0] + self.scale * x1;
        let sy0 = self.translate[1] - self.scale * y1;
        let sy1 = self.translate[1] - self.scale * y0;
        let w = i64::from(viewport.width);
        let h = i64::from(viewport.height);
        let clamp = |v: f64, lo: i64, hi: i64| -> i64 {
            if v.is_nan() {
                lo
            } else {
                (v.clamp(-1.0e9, 1.0e9) as i64).clamp(lo, hi)
            }
        };
        let x = clamp(sx0.floor(), 0, w);
        let y = clamp(sy0.floor(), 0, h);
        let x_max = clamp(sx1.ceil(), -1, w - 1);
        let y_max = clamp(sy1.ceil(), -1, h - 1);
        if x_max < x || y_max < y {
            return Bounds::EMPTY;
        }
        Bounds {
            x: x as i32,
            y: y as i32,
            x_max: x_max as i32,
            y_max: y_max as i32,
            width: (x_max - x + 1) as i32,
            height: (y_max - y + 1) as i32,
        }
    }

    /// Finite-difference distortion at `(lon, lat)` whose projection is pixel `(x, y)`.
    /// Columns are the screen images of a unit eastward and a unit northward step; the
    /// eastward column is divided by the meridian scale factor cos φ.
    #[must_use]
    pub fn distortion(&self, lon: f64, lat: f64, x: f64, y: f64) -> Option<Distortion> {
        const H: f64 = 0.000_036;
        let h_lambda = if lon < 0.0 { H } else { -H };
        let h_phi = if lat < 0.0 { H } else { -H };
        let p_lambda = self.forward(lon + h_lambda, lat)?;
        let p_phi = self.forward(lon, lat + h_phi)?;
        let k = lat.to_radians().cos();
        let d = Distortion {
            a: (p_lambda[0] - x) / h_lambda / k,
            b: (p_lambda[1] - y) / h_lambda / k,
            c: (p_phi[0] - x) / h_phi,
            d: (p_phi[1] - y) / h_phi,
        };
        [d.a, d.b, d.c, d.d].iter().all(|v| v.is_finite()).then_some(d)
    }

    fn raw_forward(&self, lambda: f64, phi: f64) -> Option<(f64, f64)> {
        if let Some(clip) = self.clip_cos {
            if phi.cos() * lambda.cos() < clip {
                return None;
            }
        }
        let (sl, cl) = lambda.sin_cos();
        let (sp, cp) = phi.sin_cos();
        let out = match self.kind {
            ProjectionKind::Orthographic => (cp * sl, sp),
            ProjectionKind::Stereographic => {
                let k = 1.0 / (1.0 + cp * cl);
                (k * cp * sl, k * sp)
            }
            ProjectionKind::AzimuthalEquidistant => {
                let c = (cp * cl).clamp(-1.0, 1.0).acos();
                let k = if c == 0.0 { 1.0 } else { c / c.sin() };
                (k * cp * sl, k * sp)
            }
            ProjectionKind::ConicEquidistant => {
                let (n, g) = conic_constants();
                let rho = g - phi;
                (rho * (n * lambda).sin(), g - rho * (n * lambda).cos())
            }
            ProjectionKind::Equirectangular => (lambda, phi),
            ProjectionKind::Atlantis => {
                let theta = mollweide_theta(phi);
                (MOLLWEIDE_CX * lambda * theta.cos(), MOLLWEIDE_CY * theta.sin())
            }
            ProjectionKind::Waterman => {
                let p = sph_to_unit(lambda, phi);
                let face = &self.faces[pick_face(p, &self.faces)];
                let q = face.to_layout(face.weights(p));
                (q.x, q.y)
            }
            ProjectionKind::Winkel3 => winkel3(lambda, phi),
        };
        (out.0.is_finite() && out.1.is_finite()).then_some(out)
    }

    fn raw_invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let rho = x.hypot(y);
        let (lambda, phi) = match self.kind {
            ProjectionKind::Orthographic => {
                if rho > 1.0 {
                    return None;
                }
                azimuthal_invert(x, y, rho, rho.asin())
            }
            ProjectionKind::Stereographic => azimuthal_invert(x, y, rho, 2.0 * rho.atan()),
            ProjectionKind::AzimuthalEquidistant => {
                if rho > PI {
                    return None;
                }
                azimuthal_invert(x, y, rho, rho)
            }
            ProjectionKind::ConicEquidistant => {
                let (n, g) = conic_constants();
                let rho0_y = g - y;
                let r = n.signum() * x.hypot(rho0_y);
                (x.atan2(rho0_y) / n, g - r)
            }
            ProjectionKind::Equirectangular => (x, y),
            ProjectionKind::Atlantis => {
                let s = y / MOLLWEIDE_CY;
                if s.abs() > 1.0 {
                    return None;
                }
                let theta = s.asin();
                let ct = theta.cos();
                let lambda = if ct.abs() < 1e-12 {
                    if x.abs() > 1e-9 {
                        return None;
                    }
                    0.0
                } else {
                    x / (MOLLWEIDE_CX * ct)
                };
                let phi = ((2.0 * theta + (2.0 * theta).sin()) / PI).clamp(-1.0, 1.0).asin();
                (lambda, phi)
            }
            ProjectionKind::Waterman => {
                let q = Vec2::new(x, y);
                let p = self.faces.iter().find_map(|f| f.from_layout(q))?;
                unit_to_sph(p)
            }
            ProjectionKind::Winkel3 => winkel3_invert(x, y)?,
        };
        if !in_domain(lambda, phi) {
            return None;
        }
        if let Some(clip) = self.clip_cos {
            if phi.cos() * lambda.cos() < clip {
                return None;
            }
        }
        Some((lambda, phi))
    }

    /// Raw-plane bounding box of the projection outline: the circle at `angle_deg` around
    /// the view centre, or the edges of the lon/lat domain when unclipped.
    fn outline_box(&self, angle_deg: Option<f64>) -> Option<(f64, f64, f64, f64)> {
        let mut pts: Vec<(f64, f64)> = Vec::with_capacity(1100);
        match angle_deg {
            Some(a) => {
                let c = (a.to_radians() - 1e-6).max(0.0);
                let (sc, cc) = c.sin_cos();
                for t in 0..360 {
                    let theta = f64::from(t).to_radians();
                    let p = crate::math::Vec3::new(cc, sc * theta.cos(), sc * theta.sin());
                    let (lambda, phi) = unit_to_sph(p);
                    pts.extend(self.raw_forward(lambda, phi));
                }
            }
            None => {
                let e = 1e-9;
                for i in 0..=180 {
                    let phi = (-FRAC_PI_2 + PI * f64::from(i) / 180.0).clamp(-FRAC_PI_2 + e, FRAC_PI_2 - e);
                    pts.extend(self.raw_forward(-PI + e, phi));
                    pts.extend(self.raw_forward(PI - e, phi));
                }
                for i in 0..=360 {
                    let lambda = (-PI + 2.0 * PI * f64::from(i) / 360.0).clamp(-PI + e, PI - e);
                    pts.extend(self.raw_forward(lambda, FRAC_PI_2 - e));
                    pts.extend(self.raw_forward(lambda, -FRAC_PI_2 + e));
                }
            }
        }
        if pts.is_empty() {
            return None;
        }
        let mut b = (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in pts {
            b.0 = b.0.min(x);
            b.1 = b.1.min(y);
            b.2 = b.2.max(x);
            b.3 = b.3.max(y);
        }
        Some(b)
    }

    /// Scale that fits the projection outline into 90 % of the viewport.
    fn fit_scale(&self, viewport: Viewport) -> f64 {
        let fallback = f64::from(viewport.width.min(viewport.height).max(1)) / 2.0;
        let angle = match (self.kind.fit_angle_deg(), self.kind.clip_angle_deg()) {
            (Some(f), Some(c)) => Some(f.min(c)),
            (f, _) => f,
        };
        let Some((x0, y0, x1, y1)) = self.outline_box(angle) else {
            return fallback;
        };
        let (w, h) = (x1 - x0, y1 - y0);
        if w <= 0.0 || h <= 0.0 {
            return fallback;
        }
        (f64::from(viewport.width) / w).min(f64::from(viewport.height) / h) * 0.9
    }
}
