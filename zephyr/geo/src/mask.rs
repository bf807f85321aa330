//! Per-pixel visibility bitmap for one (projection, viewport) pair.

use crate::projection::{Bounds, Projection, ProjectionKey, Viewport};

/// Immutable on/off-globe bitmap. Built once per projection and viewport, replaced wholesale
/// when either changes.
#[derive(Clone, Debug)]
pub struct VisibilityMask {
    key: ProjectionKey,
    viewport: Viewport,
    bounds: Bounds,
    bits: Vec<u64>,
    visible: usize,
}

impl VisibilityMask {
    /// Invert every pixel inside the projection bounds; a pixel is visible when it maps back
    /// to a finite point on the sphere.
    #[must_use]
    pub fn build(projection: &Projection, viewport: Viewport) -> Self {
        let bounds = projection.bounds(viewport);
        let n = viewport.width as usize * viewport.height as usize;
        let mut bits = vec![0u64; n.div_ceil(64)];
        let mut visible = 0usize;
        if !bounds.is_empty() {
            for y in bounds.y..=bounds.y_max {
                for x in bounds.x..=bounds.x_max {
                    if projection.invert(f64::from(x), f64::from(y)).is_some() {
                        let i = y as usize * viewport.width as usize + x as usize;
                        bits[i >> 6] |= 1u64 << (i & 63);
                        visible += 1;
                    }
                }
            }
        }
        Self { key: projection.key(), viewport, bounds, bits, visible }
    }

    /// O(1); pixels outside the viewport are never visible.
    #[inline]
    #[must_use]
    pub fn is_visible(&self, x: i32, y: i32) -> bool {
        if !self.viewport.contains(x, y) {
            return false;
        }
        let i = y as usize * self.viewport.width as usize + x as usize;
        self.bits[i >> 6] & (1u64 << (i & 63)) != 0
    }

    /// True when this mask was built for exactly `projection` and `viewport`.
    #[must_use]
    pub fn matches(&self, projection: &Projection, viewport: Viewport) -> bool {
        self.key == projection.key() && self.viewport == viewport
    }

    #[must_use]
    pub fn key(&self) -> ProjectionKey {
        self.key
    }
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
    /// Number of visible pixels.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.visible
    }
}
