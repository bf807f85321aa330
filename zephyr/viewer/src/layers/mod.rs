//! The four layers rendered through `DualPathRenderer`.

pub mod mesh;
pub mod overlay;
pub mod particles;
pub mod planet;

use zephyr_geo::{Projection, Viewport, VisibilityMask};

pub use mesh::{MeshData, MeshInput, MeshLayer};
pub use overlay::{OverlayInput, OverlayLayer};
pub use particles::{ParticleInput, ParticleLayer, ParticleView};
pub use planet::{PlanetError, PlanetImage, PlanetInput, PlanetLayer, PlanetLoader};

/// Projection state a geographic layer is drawn against.
#[derive(Clone, Copy)]
pub struct View<'a> {
    pub projection: &'a Projection,
    pub mask: &'a VisibilityMask,
    pub viewport: Viewport,
}
