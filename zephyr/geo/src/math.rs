// Keep imports minimal; everything here is plain f64 arithmetic.

/// Tolerance used when testing planar containment on polyhedral faces.
pub const EPS_CONTAIN: f64 = 1.0e-9;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
    #[must_use]
    pub fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
    #[must_use]
    pub fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
    #[must_use]
    pub fn mul(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }
    #[must_use]
    pub fn dot(self, o: Self) -> f64 {
        self.x * o.x + self.y * o.y + self.z * o.z
    }
    #[must_use]
    pub fn cross(self, o: Self) -> Self {
        Self::new(
            self.y * o.z - self.z * o.y,
            self.z * o.x - self.x * o.z,
            self.x * o.y - self.y * o.x,
        )
    }
    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }
    #[must_use]
    pub fn normalized(self) -> Self {
        let l = self.length();
        if l == 0.0 {
            self
        } else {
            self.mul(1.0 / l)
        }
    }
}

/// Planar point used by polyhedral layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
    #[must_use]
    pub fn from_polar(r: f64, angle_rad: f64) -> Self {
        Self::new(r * angle_rad.cos(), r * angle_rad.sin())
    }
    #[must_use]
    pub fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y)
    }
    #[must_use]
    pub fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y)
    }
    #[must_use]
    pub fn mul(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }
}

/// Unit vector for (lon, lat) in radians: +x toward (0°, 0°), +z toward the north pole.
#[inline]
#[must_use]
pub fn sph_to_unit(lon: f64, lat: f64) -> Vec3 {
    let (sl, cl) = lat.sin_cos();
    let (so, co) = lon.sin_cos();
    Vec3::new(cl * co, cl * so, sl)
}

/// Inverse of [`sph_to_unit`]; returns (lon, lat) in radians.
#[inline]
#[must_use]
pub fn unit_to_sph(p: Vec3) -> (f64, f64) {
    let p = p.normalized();
    (p.y.atan2(p.x), p.z.clamp(-1.0, 1.0).asin())
}

/// Planar barycentrics of `p` with respect to triangle (a, b, c), or `None` for a
/// degenerate triangle.
#[inline]
#[must_use]
pub fn barycentrics_2d(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> Option<[f64; 3]> {
    let v0 = b.sub(a);
    let v1 = c.sub(a);
    let v2 = p.sub(a);
    let denom = v0.x * v1.y - v1.x * v0.y;
    if denom.abs() < 1e-20 {
        return None;
    }
    let u = (v2.x * v1.y - v1.x * v2.y) / denom;
    let v = (v0.x * v2.y - v2.x * v0.y) / denom;
    Some([1.0 - u - v, u, v])
}

/// Modulo whose result takes the sign of the divisor: `floor_mod(-190, 360) == 170`.
#[inline]
#[must_use]
pub fn floor_mod(a: f64, n: f64) -> f64 {
    a - n * (a / n).floor()
}

/// Wrap a longitude in degrees into [-180, 180).
#[inline]
#[must_use]
pub fn wrap_lon_deg(lon: f64) -> f64 {
    floor_mod(lon + 180.0, 360.0) - 180.0
}

/// Wrap a longitude in radians into [-π, π].
#[inline]
#[must_use]
pub fn wrap_lon_rad(lon: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    if lon > PI {
        lon - TAU
    } else if lon < -PI {
        lon + TAU
    } else {
        lon
    }
}
