#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::dbg_macro)]

mod mask;
mod math;
pub mod octa;
mod projection;

pub use mask::VisibilityMask;
pub use math::{floor_mod, sph_to_unit, unit_to_sph, wrap_lon_deg, Vec2, Vec3};
pub use projection::{
    Bounds, Distortion, Family, Projection, ProjectionError, ProjectionKey, ProjectionKind,
    ProjectionParams, Viewport,
};

/// Resolve a projection for `viewport` in one call.
#[must_use]
pub fn project(params: ProjectionParams, viewport: Viewport) -> Projection {
    Projection::new(params, viewport)
}
