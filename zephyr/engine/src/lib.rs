//! Zephyr engine: weather products, the screen-space field and particle advection.
//! No GPU; everything here is plain CPU code driven by the viewer's tick loop.
#![deny(missing_docs)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::dbg_macro, clippy::large_enum_variant)]

pub mod config;
pub mod field;
pub mod particles;
pub mod product;
pub mod units;

pub use config::{AnimationParams, DisplayMode, EpochConfig, FormFactor, OverlayType, ParticleType};
pub use field::{Field, FieldError, FieldSampler, FieldVector, Particle};
pub use particles::{IntensityScale, ParticleEngine, Segment, TickStats};
pub use product::{ColorScale, GridHeader, GridProduct, ParticleMeta, ProductError, Sample, WeatherProduct};
pub use units::Unit;

