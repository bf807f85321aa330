//! Layer eligibility per display mode and z-ordered compositing.

use std::time::Instant;

use egui::ColorImage;
use engine::DisplayMode;
use smallvec::SmallVec;
use zephyr_geo::Viewport;

use crate::backend::Drawable;
use crate::notify::Subscription;
use crate::raster;

/// Compositing slots, bottom to top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    Planet,
    Mesh,
    Overlay,
    Particles,
    /// Markers supplied by the embedding application.
    Foreground,
}

impl LayerKind {
    pub const Z_ORDER: [LayerKind; 5] =
        [LayerKind::Planet, LayerKind::Mesh, LayerKind::Overlay, LayerKind::Particles, LayerKind::Foreground];

    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Planet => "planet",
            LayerKind::Mesh => "mesh",
            LayerKind::Overlay => "overlay",
            LayerKind::Particles => "particles",
            LayerKind::Foreground => "foreground",
        }
    }
}

/// Layers that may contribute in `mode`, in z-order. Planet mode shows the imagery alone
/// (plus foreground markers).
pub fn eligible(mode: DisplayMode) -> SmallVec<[LayerKind; 5]> {
    LayerKind::Z_ORDER
        .into_iter()
        .filter(|&k| match (mode, k) {
            (_, LayerKind::Foreground) => true,
            (DisplayMode::Planet, k) => k == LayerKind::Planet,
            (DisplayMode::Air | DisplayMode::Ocean, k) => k != LayerKind::Planet,
        })
        .collect()
}

/// Drawables of one presented frame, bottom to top.
pub struct CompositeFrame {
    pub mode: DisplayMode,
    pub layers: SmallVec<[(LayerKind, Drawable); 5]>,
}

impl CompositeFrame {
    pub fn kinds(&self) -> SmallVec<[LayerKind; 5]> {
        self.layers.iter().map(|(k, _)| *k).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Blend every layer over a transparent canvas. A surface that cannot be read back is
    /// skipped.
    pub fn flatten(&self, viewport: Viewport) -> ColorImage {
        let t0 = Instant::now();
        let mut out = raster::blank(viewport.width, viewport.height);
        for (kind, drawable) in &self.layers {
            match drawable.to_image() {
                Ok(img) => raster::blend_over(&mut out, &img),
                Err(e) => log::warn!("[composite] skipping {}: {e}", kind.name()),
            }
        }
        log::debug!(
            "[composite] flattened {} layers in {} ms",
            self.layers.len(),
            t0.elapsed().as_millis()
        );
        out
    }
}

/// Collects layer notifications and assembles frames.
pub struct CompositeFrameBuilder {
    planet: Subscription,
    mesh: Subscription,
    overlay: Subscription,
    particles: Subscription,
    foreground: Option<Drawable>,
}

impl CompositeFrameBuilder {
    pub fn new(planet: Subscription, mesh: Subscription, overlay: Subscription, particles: Subscription) -> Self {
        Self { planet, mesh, overlay, particles, foreground: None }
    }

    pub fn set_foreground(&mut self, drawable: Option<Drawable>) {
        self.foreground = drawable;
    }

    /// Take in pending notifications. True when any layer changed.
    pub fn receive(&mut self) -> bool {
        // Every subscription must drain, so no short-circuiting here
        let changes =
            [self.planet.drain(), self.mesh.drain(), self.overlay.drain(), self.particles.drain()];
        changes.contains(&true)
    }

    fn drawable(&self, kind: LayerKind) -> Option<&Drawable> {
        match kind {
            LayerKind::Planet => self.planet.drawable(),
            LayerKind::Mesh => self.mesh.drawable(),
            LayerKind::Overlay => self.overlay.drawable(),
            LayerKind::Particles => self.particles.drawable(),
            LayerKind::Foreground => self.foreground.as_ref(),
        }
    }

    /// Eligible layers for `mode` that have a drawable, in z-order. Layers that have not
    /// produced anything yet are left out.
    pub fn build(&mut self, mode: DisplayMode) -> CompositeFrame {
        self.receive();
        let layers = eligible(mode)
            .into_iter()
            .filter_map(|k| self.drawable(k).map(|d| (k, d.clone())))
            .collect();
        CompositeFrame { mode, layers }
    }
}
