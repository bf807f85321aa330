use super::math::{barycentrics_2d, Vec2, Vec3, EPS_CONTAIN};

/// One octahedron face: three mutually orthogonal unit vertices on the sphere and
/// their positions in the unfolded planar layout.
#[derive(Clone, Copy, Debug)]
pub struct OctaFace {
    /// CCW from outside. Unit-length vertices on the sphere.
    pub verts: [Vec3; 3],
    /// Outward unit normal of the face plane.
    pub n: Vec3,
    /// Layout position of each vertex, same order as `verts`.
    pub layout: [Vec2; 3],
}

impl OctaFace {
    #[must_use]
    fn ensure_outward_ccw(mut self) -> Self {
        let ab = self.verts[1].sub(self.verts[0]);
        let ac = self.verts[2].sub(self.verts[0]);
        let mut n = ab.cross(ac).normalized();
        let centroid = self.verts[0].add(self.verts[1]).add(self.verts[2]);
        if n.dot(centroid) < 0.0 {
            // Flip winding B <-> C, layout follows the vertices
            self.verts.swap(1, 2);
            self.layout.swap(1, 2);
            n = self.verts[1].sub(self.verts[0]).cross(self.verts[2].sub(self.verts[0])).normalized();
        }
        self.n = n;
        self
    }

    /// Central-projection weights of `p` on this face (sum to 1). The face vertices are
    /// orthonormal, so the raw weights are plain dot products.
    #[inline]
    #[must_use]
    pub fn weights(&self, p: Vec3) -> [f64; 3] {
        let w = [p.dot(self.verts[0]), p.dot(self.verts[1]), p.dot(self.verts[2])];
        let s = w[0] + w[1] + w[2];
        if s.abs() < 1e-15 {
            return [1.0 / 3.0; 3];
        }
        [w[0] / s, w[1] / s, w[2] / s]
    }

    #[inline]
    #[must_use]
    pub fn to_layout(&self, w: [f64; 3]) -> Vec2 {
        self.layout[0].mul(w[0]).add(self.layout[1].mul(w[1])).add(self.layout[2].mul(w[2]))
    }

    /// Layout point back to the sphere if it falls inside this face.
    #[must_use]
    pub fn from_layout(&self, q: Vec2) -> Option<Vec3> {
        let w = barycentrics_2d(q, self.layout[0], self.layout[1], self.layout[2])?;
        if w.iter().any(|&c| c < -EPS_CONTAIN) {
            return None;
        }
        let p = self.verts[0].mul(w[0]).add(self.verts[1].mul(w[1])).add(self.verts[2].mul(w[2]));
        Some(p.normalized())
    }
}

/// Build the eight octahedron faces unfolded as a butterfly: the four northern faces fan
/// out below the north pole (240° of fan), each southern face hangs off the equator edge of
/// its northern partner. The cut runs along the antimeridian and the southern meridians
/// at -90°, 0° and 90°.
#[must_use]
pub fn build_butterfly() -> Vec<OctaFace> {
    let side = std::f64::consts::SQRT_2;
    let north = Vec3::new(0.0, 0.0, 1.0);
    let south = Vec3::new(0.0, 0.0, -1.0);
    // Equator vertices at lon -180, -90, 0, 90, 180
    let equator = |k: usize| -> Vec3 {
        let lon = (-180.0 + 90.0 * k as f64).to_radians();
        Vec3::new(lon.cos(), lon.sin(), 0.0)
    };
    // Layout: north pole at origin, lon -180 at 150°, sweeping CCW to lon 180 at 390°
    let equator_l = |k: usize| -> Vec2 {
        Vec2::from_polar(side, (150.0 + 60.0 * k as f64).to_radians())
    };
    let north_l = Vec2::new(0.0, 0.0);

    let mut faces = Vec::with_capacity(8);
    for i in 0..4usize {
        let (e0, e1) = (equator(i), equator(i + 1));
        let (l0, l1) = (equator_l(i), equator_l(i + 1));
        faces.push(
            OctaFace { verts: [north, e0, e1], n: Vec3::ZERO, layout: [north_l, l0, l1] }
                .ensure_outward_ccw(),
        );
        // Reflect the pole across the shared equator edge
        let south_l = l0.add(l1).sub(north_l);
        faces.push(
            OctaFace { verts: [south, e0, e1], n: Vec3::ZERO, layout: [south_l, l0, l1] }
                .ensure_outward_ccw(),
        );
    }
    faces
}

/// Argmax `dot(n_f, p)`; ties resolve to the lower face index.
#[inline]
#[must_use]
pub fn pick_face(p: Vec3, faces: &[OctaFace]) -> usize {
    let mut best_i = 0usize;
    let mut best_d = f64::NEG_INFINITY;
    for (i, f) in faces.iter().enumerate() {
        let d = f.n.dot(p);
        if d > best_d {
            best_d = d;
            best_i = i;
        }
    }
    best_i
}
