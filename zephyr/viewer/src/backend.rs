//! Dual-path layer rendering: every layer has a hardware (wgpu) and a software
//! (`egui::ColorImage`) backend behind one lifecycle.
//!
//! The renderer picks a backend per data epoch, owns exactly one live backend at a time and
//! degrades to software for the rest of the epoch on any hardware failure. Failures never
//! leave the layer: they become a `warn` line and a software frame.

use std::sync::Arc;

use egui::ColorImage;
use zephyr_geo::{Projection, ProjectionKind, Viewport};

use crate::composite::LayerKind;
use crate::gpu::GpuContext;
use crate::notify::Notifier;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("projection {0} has no hardware implementation")]
    ProjectionUnsupported(ProjectionKind),
    #[error("no GPU device available")]
    NoDevice,
    #[error("backend init failed: {0}")]
    InitFailure(String),
    #[error("render failed: {0}")]
    RenderFailure(String),
    #[error("layer data unavailable")]
    DataUnavailable,
}

/// Rendered output of one layer.
#[derive(Clone)]
pub enum Drawable {
    Pixels(Arc<ColorImage>),
    Surface(Arc<GpuSurface>),
}

impl Drawable {
    /// CPU copy of the drawable; surfaces are read back from the GPU.
    pub fn to_image(&self) -> Result<Arc<ColorImage>, BackendError> {
        match self {
            Drawable::Pixels(img) => Ok(img.clone()),
            Drawable::Surface(s) => s.read().map(Arc::new),
        }
    }

    pub fn is_surface(&self) -> bool {
        matches!(self, Drawable::Surface(_))
    }

    pub fn size(&self) -> [usize; 2] {
        match self {
            Drawable::Pixels(img) => img.size,
            Drawable::Surface(s) => [s.width as usize, s.height as usize],
        }
    }
}

/// Rgba8 texture produced by a hardware backend, premultiplied alpha.
pub struct GpuSurface {
    ctx: Arc<GpuContext>,
    texture: Arc<wgpu::Texture>,
    width: u32,
    height: u32,
}

impl GpuSurface {
    pub fn new(ctx: Arc<GpuContext>, texture: Arc<wgpu::Texture>, width: u32, height: u32) -> Self {
        Self { ctx, texture, width, height }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Read the texture back. Fails if the owning backend has been released since.
    pub fn read(&self) -> Result<ColorImage, BackendError> {
        self.ctx
            .scoped(BackendError::RenderFailure, |_, _| {
                self.ctx.read_rgba(&self.texture, self.width, self.height)
            })
            .and_then(|r| r)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Hardware,
    Software,
}

/// Explicit disposal of backend resources (GPU buffers, textures, pipelines).
pub trait Release {
    fn release(self);
}

impl Release for std::convert::Infallible {
    fn release(self) {
        match self {}
    }
}

/// The live backend of one layer.
pub enum LayerBackendState<H, S> {
    Hardware(H),
    Software(S),
}

impl<H, S> LayerBackendState<H, S> {
    pub fn kind(&self) -> BackendKind {
        match self {
            LayerBackendState::Hardware(_) => BackendKind::Hardware,
            LayerBackendState::Software(_) => BackendKind::Software,
        }
    }
}

impl<H: Release, S> Release for LayerBackendState<H, S> {
    fn release(self) {
        match self {
            LayerBackendState::Hardware(h) => h.release(),
            LayerBackendState::Software(s) => drop(s),
        }
    }
}

/// Holds at most one backend. A new one can only be installed into an empty slot, and the
/// held backend is released when the slot is dropped.
pub struct BackendSlot<H: Release, S> {
    state: Option<LayerBackendState<H, S>>,
}

impl<H: Release, S> Default for BackendSlot<H, S> {
    fn default() -> Self {
        Self { state: None }
    }
}

impl<H: Release, S> BackendSlot<H, S> {
    /// Install `state`; hands it back untouched if a backend is still live.
    pub fn install(&mut self, state: LayerBackendState<H, S>) -> Result<(), LayerBackendState<H, S>> {
        if self.state.is_some() {
            return Err(state);
        }
        self.state = Some(state);
        Ok(())
    }

    /// Release the live backend, if any.
    pub fn release(&mut self) {
        if let Some(state) = self.state.take() {
            state.release();
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut LayerBackendState<H, S>> {
        self.state.as_mut()
    }

    pub fn kind(&self) -> Option<BackendKind> {
        self.state.as_ref().map(LayerBackendState::kind)
    }

    pub fn is_live(&self) -> bool {
        self.state.is_some()
    }
}

impl<H: Release, S> Drop for BackendSlot<H, S> {
    fn drop(&mut self) {
        self.release();
    }
}

/// One visual layer with a hardware and a software implementation.
pub trait Layer {
    const KIND: LayerKind;
    /// False for layers that only have a software path.
    const HARDWARE: bool = true;

    /// Per-epoch data (product, mesh, imagery); static for the life of a backend.
    type Input;
    type Hardware: Release;
    type Software;
    /// Per-frame view: projection state or simulation output.
    type Frame<'a>;

    /// Whether the hardware path can handle this data under `projection`.
    fn hardware_support(input: &Self::Input, projection: &Projection) -> Result<(), BackendError>;

    /// Compile programs and upload static resources.
    fn init_hardware(
        gpu: Option<&Arc<GpuContext>>,
        input: &Self::Input,
        viewport: Viewport,
    ) -> Result<Self::Hardware, BackendError>;

    /// Size the CPU buffers. Never fails.
    fn init_software(input: &Self::Input, viewport: Viewport) -> Self::Software;

    fn render_hardware(
        hw: &mut Self::Hardware,
        input: &Self::Input,
        frame: &Self::Frame<'_>,
    ) -> Result<Option<Drawable>, BackendError>;

    fn render_software(
        sw: &mut Self::Software,
        input: &Self::Input,
        frame: &Self::Frame<'_>,
    ) -> Option<Drawable>;
}

fn log_fallback(layer: LayerKind, e: &BackendError) {
    match e {
        BackendError::DataUnavailable => log::debug!("[{}] no data, software path", layer.name()),
        BackendError::NoDevice => log::info!("[{}] no GPU device, software path", layer.name()),
        e => log::warn!("[{}] falling back to software: {e}", layer.name()),
    }
}

/// Lifecycle owner for one layer.
pub struct DualPathRenderer<L: Layer> {
    gpu: Option<Arc<GpuContext>>,
    notifier: Notifier,
    input: Option<L::Input>,
    slot: BackendSlot<L::Hardware, L::Software>,
    viewport: Viewport,
    degraded: bool,
    epoch: u64,
}

impl<L: Layer> DualPathRenderer<L> {
    pub fn new(gpu: Option<Arc<GpuContext>>, notifier: Notifier) -> Self {
        Self {
            gpu,
            notifier,
            input: None,
            slot: BackendSlot::default(),
            viewport: Viewport::new(0, 0),
            degraded: false,
            epoch: 0,
        }
    }

    /// Backend `initialize` would pick for `projection`; a pure function of the layer,
    /// its data and the projection family, plus any failure earlier in this epoch.
    pub fn decide(&self, projection: &Projection) -> Result<BackendKind, BackendError> {
        if !L::HARDWARE {
            return Ok(BackendKind::Software);
        }
        if self.degraded {
            return Ok(BackendKind::Software);
        }
        let input = self.input.as_ref().ok_or(BackendError::DataUnavailable)?;
        L::hardware_support(input, projection).map(|()| BackendKind::Hardware)
    }

    /// Dispose the live backend, then build the selected one. Hardware failure falls back
    /// to software, which always succeeds.
    pub fn initialize(&mut self, projection: &Projection, viewport: Viewport) -> BackendKind {
        self.slot.release();
        self.viewport = viewport;
        let decision = self.decide(projection);
        if let Ok(BackendKind::Hardware) = decision {
            match self.initialize_hardware(viewport) {
                Ok(()) => return BackendKind::Hardware,
                Err(e) => {
                    log_fallback(L::KIND, &e);
                    self.degraded = true;
                }
            }
        } else if let Err(e) = &decision {
            log_fallback(L::KIND, e);
        }
        self.initialize_software(viewport);
        BackendKind::Software
    }

    /// Build the hardware backend into the (empty) slot.
    pub fn initialize_hardware(&mut self, viewport: Viewport) -> Result<(), BackendError> {
        self.slot.release();
        let input = self.input.as_ref().ok_or(BackendError::DataUnavailable)?;
        let hw = L::init_hardware(self.gpu.as_ref(), input, viewport)?;
        self.install(LayerBackendState::Hardware(hw));
        log::debug!("[{}] hardware backend ready", L::KIND.name());
        Ok(())
    }

    /// Build the software backend into the (empty) slot.
    pub fn initialize_software(&mut self, viewport: Viewport) {
        self.slot.release();
        let Some(input) = self.input.as_ref() else { return };
        let sw = L::init_software(input, viewport);
        self.install(LayerBackendState::Software(sw));
    }

    fn install(&mut self, state: LayerBackendState<L::Hardware, L::Software>) {
        if let Err(rejected) = self.slot.install(state) {
            log::warn!("[{}] backend still live, discarding new one", L::KIND.name());
            rejected.release();
        }
    }

    /// Render the current backend and notify subscribers. No setup is repeated here.
    pub fn generate_frame(&mut self, frame: &L::Frame<'_>) -> Option<Drawable> {
        let input = self.input.as_ref()?;
        let result = match self.slot.get_mut()? {
            LayerBackendState::Hardware(hw) => L::render_hardware(hw, input, frame),
            LayerBackendState::Software(sw) => Ok(L::render_software(sw, input, frame)),
        };
        let drawable = match result {
            Ok(d) => d,
            Err(e) => {
                log_fallback(L::KIND, &e);
                self.degraded = true;
                self.initialize_software(self.viewport);
                match (self.slot.get_mut(), self.input.as_ref()) {
                    (Some(LayerBackendState::Software(sw)), Some(input)) => {
                        L::render_software(sw, input, frame)
                    }
                    _ => None,
                }
            }
        };
        self.notifier.send(self.epoch, drawable.clone());
        drawable
    }

    /// New data: starts an epoch, fully re-initializes and redraws.
    pub fn handle_data_change(
        &mut self,
        input: L::Input,
        projection: &Projection,
        viewport: Viewport,
        frame: &L::Frame<'_>,
    ) -> Option<Drawable> {
        self.slot.release();
        self.epoch += 1;
        self.degraded = false;
        self.input = Some(input);
        self.initialize(projection, viewport);
        self.generate_frame(frame)
    }

    /// Rotation or zoom: redraw with the existing backend.
    pub fn handle_rotation(&mut self, frame: &L::Frame<'_>) -> Option<Drawable> {
        self.generate_frame(frame)
    }

    /// Same data, new view state. A viewport change re-initializes since buffers are sized
    /// from it; anything else is a plain redraw.
    pub fn handle_state_change(
        &mut self,
        projection: &Projection,
        viewport: Viewport,
        frame: &L::Frame<'_>,
    ) -> Option<Drawable> {
        if viewport != self.viewport && self.input.is_some() {
            self.initialize(projection, viewport);
        }
        self.generate_frame(frame)
    }

    /// Release the backend and data and withdraw the drawable.
    pub fn dispose(&mut self) {
        let had_backend = self.slot.is_live();
        self.slot.release();
        self.input = None;
        if had_backend {
            self.notifier.send(self.epoch, None);
        }
    }

    pub fn backend(&self) -> Option<BackendKind> {
        self.slot.kind()
    }

    /// True once a backend is live.
    pub fn is_ready(&self) -> bool {
        self.slot.is_live()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn input(&self) -> Option<&L::Input> {
        self.input.as_ref()
    }
}
