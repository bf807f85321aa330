#![deny(clippy::unwrap_used, clippy::expect_used, clippy::dbg_macro, clippy::large_enum_variant)]

pub mod backend;
pub mod colormap;
pub mod composite;
pub mod globe;
pub mod gpu;
pub mod layers;
pub mod notify;
pub mod raster;
pub mod raster_gpu;

pub use backend::{BackendError, BackendKind, Drawable, DualPathRenderer, Layer};
pub use composite::{CompositeFrame, CompositeFrameBuilder, LayerKind};
pub use globe::{Globe, GlobeData, TickLoop};
pub use gpu::GpuContext;
