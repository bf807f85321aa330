use std::cell::Cell;
use std::sync::Arc;

use engine::{product, GridHeader};
use viewer::backend::{BackendError, BackendKind, Drawable, DualPathRenderer, Layer, Release};
use viewer::composite::LayerKind;
use viewer::gpu::GpuContext;
use viewer::layers::{MeshInput, MeshLayer, OverlayInput, OverlayLayer, ParticleInput, ParticleLayer, View};
use viewer::notify;
use viewer::raster;
use viewer::raster_gpu::hardware_kind;
use zephyr_geo::{Projection, ProjectionKind, ProjectionParams, Viewport, VisibilityMask};

thread_local! {
    static LIVE: Cell<i32> = Cell::new(0);
    static PEAK: Cell<i32> = Cell::new(0);
    static HW_INITS: Cell<u32> = Cell::new(0);
}

fn live() -> i32 {
    LIVE.with(Cell::get)
}

fn peak() -> i32 {
    PEAK.with(Cell::get)
}

/// Hardware "resources" that count themselves.
struct ProbeHw;

impl ProbeHw {
    fn acquire() -> Self {
        LIVE.with(|l| l.set(l.get() + 1));
        PEAK.with(|p| p.set(p.get().max(live())));
        HW_INITS.with(|n| n.set(n.get() + 1));
        ProbeHw
    }
}

impl Release for ProbeHw {
    fn release(self) {
        LIVE.with(|l| l.set(l.get() - 1));
    }
}

struct ProbeInput {
    fail_render: bool,
}

struct Probe;

fn pixels() -> Option<Drawable> {
    Some(Drawable::Pixels(Arc::new(raster::blank(2, 2))))
}

impl Layer for Probe {
    const KIND: LayerKind = LayerKind::Overlay;

    type Input = ProbeInput;
    type Hardware = ProbeHw;
    type Software = ();
    type Frame<'a> = ();

    fn hardware_support(_input: &ProbeInput, projection: &Projection) -> Result<(), BackendError> {
        hardware_kind(projection.kind()).map(|_| ())
    }

    fn init_hardware(
        _gpu: Option<&Arc<GpuContext>>,
        _input: &ProbeInput,
        _viewport: Viewport,
    ) -> Result<ProbeHw, BackendError> {
        Ok(ProbeHw::acquire())
    }

    fn init_software(_input: &ProbeInput, _viewport: Viewport) {}

    fn render_hardware(_hw: &mut ProbeHw, input: &ProbeInput, _frame: &()) -> Result<Option<Drawable>, BackendError> {
        if input.fail_render {
            return Err(BackendError::RenderFailure("context lost".into()));
        }
        Ok(pixels())
    }

    fn render_software(_sw: &mut (), _input: &ProbeInput, _frame: &()) -> Option<Drawable> {
        pixels()
    }
}

fn vp() -> Viewport {
    Viewport::new(160, 120)
}

fn proj(kind: ProjectionKind) -> Projection {
    Projection::new(ProjectionParams::new(kind), vp())
}

fn probe() -> (DualPathRenderer<Probe>, notify::Subscription) {
    let (tx, rx) = notify::channel(LayerKind::Overlay);
    (DualPathRenderer::new(None, tx), rx)
}

#[test]
fn at_most_one_backend_alive_across_epochs() {
    let (mut r, _rx) = probe();
    let ortho = proj(ProjectionKind::Orthographic);
    for _ in 0..3 {
        r.handle_data_change(ProbeInput { fail_render: false }, &ortho, vp(), &());
        assert_eq!(r.backend(), Some(BackendKind::Hardware));
        assert_eq!(live(), 1);
    }
    // re-initialize without new data also releases first
    r.initialize(&ortho, vp());
    assert_eq!(live(), 1);
    assert_eq!(peak(), 1);
    assert_eq!(HW_INITS.with(Cell::get), 4);
    r.dispose();
    assert_eq!(live(), 0);
    assert!(!r.is_ready());
}

#[test]
fn dropping_the_renderer_releases_hardware() {
    let (mut r, _rx) = probe();
    r.handle_data_change(ProbeInput { fail_render: false }, &proj(ProjectionKind::Stereographic), vp(), &());
    assert_eq!(live(), 1);
    drop(r);
    assert_eq!(live(), 0);
}

#[test]
fn selection_is_deterministic() {
    let (mut r, _rx) = probe();
    let ortho = proj(ProjectionKind::Orthographic);
    let winkel = proj(ProjectionKind::Winkel3);
    assert_eq!(r.decide(&ortho), Err(BackendError::DataUnavailable));
    r.handle_data_change(ProbeInput { fail_render: false }, &ortho, vp(), &());
    for _ in 0..3 {
        assert_eq!(r.decide(&ortho), Ok(BackendKind::Hardware));
        assert_eq!(r.decide(&winkel), Err(BackendError::ProjectionUnsupported(ProjectionKind::Winkel3)));
    }
    assert_eq!(r.initialize(&winkel, vp()), BackendKind::Software);
    assert_eq!(live(), 0);
    assert_eq!(r.initialize(&ortho, vp()), BackendKind::Hardware);
    assert_eq!(live(), 1);
}

#[test]
fn render_failure_degrades_for_the_epoch() {
    let (mut r, mut rx) = probe();
    let ortho = proj(ProjectionKind::Orthographic);
    let out = r.handle_data_change(ProbeInput { fail_render: true }, &ortho, vp(), &());
    assert!(out.is_some(), "software frame replaces the failed one");
    assert_eq!(r.backend(), Some(BackendKind::Software));
    assert_eq!(live(), 0);
    assert_eq!(r.decide(&ortho), Ok(BackendKind::Software));
    assert!(rx.drain());
    assert!(rx.drawable().is_some());

    // a new epoch gets another chance at hardware
    r.handle_data_change(ProbeInput { fail_render: false }, &ortho, vp(), &());
    assert_eq!(r.backend(), Some(BackendKind::Hardware));
    assert_eq!(r.epoch(), 2);
}

#[test]
fn dispose_withdraws_the_drawable() {
    let (mut r, mut rx) = probe();
    assert!(r.generate_frame(&()).is_none());
    r.handle_data_change(ProbeInput { fail_render: false }, &proj(ProjectionKind::Orthographic), vp(), &());
    rx.drain();
    assert!(rx.drawable().is_some());
    r.dispose();
    assert!(rx.drain());
    assert!(rx.drawable().is_none());
    assert_eq!(rx.latest().map(|c| c.layer), Some(LayerKind::Overlay));
}

fn temperature() -> Arc<dyn engine::WeatherProduct> {
    let h = GridHeader::global(1.0);
    let vals: Vec<Option<f32>> = (0..h.len()).map(|k| Some(250.0 + (k % h.ni) as f32 / 10.0)).collect();
    Arc::new(product::temperature(h, &vals).unwrap())
}

#[test]
fn overlay_without_device_falls_back_to_software() {
    let (tx, mut rx) = notify::channel(LayerKind::Overlay);
    let mut r: DualPathRenderer<OverlayLayer> = DualPathRenderer::new(None, tx);
    let ortho = proj(ProjectionKind::Orthographic);
    let mask = VisibilityMask::build(&ortho, vp());
    let view = View { projection: &ortho, mask: &mask, viewport: vp() };
    let input = OverlayInput { product: Some(temperature()), alpha: 0.4, stride: 2 };
    assert_eq!(r.decide(&ortho), Err(BackendError::DataUnavailable));
    let out = r.handle_data_change(input, &ortho, vp(), &view).unwrap();
    assert_eq!(r.backend(), Some(BackendKind::Software));
    assert_eq!(out.size(), [160, 120]);
    let img = out.to_image().unwrap();
    let [cx, cy] = [80usize, 60usize];
    assert!(img.pixels[cy * 160 + cx].a() > 0, "globe centre is coloured");
    assert_eq!(img.pixels[0].a(), 0, "corner is off the globe");
    assert!(rx.drain());

    // no device counts as a hardware failure: software for the rest of the epoch
    let winkel = proj(ProjectionKind::Winkel3);
    assert_eq!(r.decide(&ortho), Ok(BackendKind::Software));
    assert_eq!(r.decide(&winkel), Ok(BackendKind::Software));
}

#[test]
fn overlay_declines_unsupported_projections() {
    let (tx, _rx) = notify::channel(LayerKind::Overlay);
    let mut r: DualPathRenderer<OverlayLayer> = DualPathRenderer::new(None, tx);
    let winkel = proj(ProjectionKind::Winkel3);
    let mask = VisibilityMask::build(&winkel, vp());
    let view = View { projection: &winkel, mask: &mask, viewport: vp() };
    let input = OverlayInput { product: Some(temperature()), alpha: 0.4, stride: 2 };
    assert_eq!(r.handle_data_change(input, &winkel, vp(), &view).map(|d| d.is_surface()), Some(false));
    assert_eq!(r.decide(&winkel), Err(BackendError::ProjectionUnsupported(ProjectionKind::Winkel3)));
}

#[test]
fn overlay_skips_missing_product() {
    let (tx, _rx) = notify::channel(LayerKind::Overlay);
    let mut r: DualPathRenderer<OverlayLayer> = DualPathRenderer::new(None, tx);
    let ortho = proj(ProjectionKind::Orthographic);
    let mask = VisibilityMask::build(&ortho, vp());
    let view = View { projection: &ortho, mask: &mask, viewport: vp() };
    let out = r.handle_data_change(OverlayInput { product: None, alpha: 0.4, stride: 2 }, &ortho, vp(), &view);
    assert!(out.is_none());
    assert!(r.is_ready());
}

#[test]
fn overlay_refuses_a_stale_mask() {
    let (tx, _rx) = notify::channel(LayerKind::Overlay);
    let mut r: DualPathRenderer<OverlayLayer> = DualPathRenderer::new(None, tx);
    let ortho = proj(ProjectionKind::Orthographic);
    let old = VisibilityMask::build(&ortho.rotated([40.0, 0.0, 0.0]), vp());
    let view = View { projection: &ortho, mask: &old, viewport: vp() };
    let input = OverlayInput { product: Some(temperature()), alpha: 0.4, stride: 2 };
    assert!(r.handle_data_change(input, &ortho, vp(), &view).is_none());
}

#[test]
fn mesh_graticule_draws_in_software() {
    let (tx, _rx) = notify::channel(LayerKind::Mesh);
    let mut r: DualPathRenderer<MeshLayer> = DualPathRenderer::new(None, tx);
    let eq = proj(ProjectionKind::Equirectangular);
    let mask = VisibilityMask::build(&eq, vp());
    let view = View { projection: &eq, mask: &mask, viewport: vp() };
    let input = MeshInput { data: None, graticule_step: Some(30.0) };
    let img = r.handle_data_change(input, &eq, vp(), &view).unwrap().to_image().unwrap();
    assert_eq!(r.backend(), Some(BackendKind::Software));
    assert!(img.pixels.iter().any(|p| p.a() > 0));

    let empty = MeshInput { data: None, graticule_step: None };
    assert!(r.handle_data_change(empty, &eq, vp(), &view).is_none());
}

#[test]
fn particles_always_choose_software() {
    let (tx, _rx) = notify::channel(LayerKind::Particles);
    let mut r: DualPathRenderer<ParticleLayer> = DualPathRenderer::new(None, tx);
    let engine = engine::ParticleEngine::new(engine::AnimationParams::default());
    let frame = viewer::layers::ParticleView { engine: &engine };
    let ortho = proj(ProjectionKind::Orthographic);
    assert_eq!(r.decide(&ortho), Ok(BackendKind::Software));
    // an engine without a field draws nothing
    assert!(r.handle_data_change(ParticleInput { trail_fade: 0.97 }, &ortho, vp(), &frame).is_none());
    assert_eq!(r.backend(), Some(BackendKind::Software));
}

#[test]
fn overlay_on_a_real_device_if_present() {
    let Some(gpu) = viewer::gpu::persistent() else {
        return;
    };
    let (tx, _rx) = notify::channel(LayerKind::Overlay);
    let mut r: DualPathRenderer<OverlayLayer> = DualPathRenderer::new(Some(gpu), tx);
    let ortho = proj(ProjectionKind::Orthographic);
    let mask = VisibilityMask::build(&ortho, vp());
    let view = View { projection: &ortho, mask: &mask, viewport: vp() };
    let input = OverlayInput { product: Some(temperature()), alpha: 0.4, stride: 2 };
    let out = r.handle_data_change(input, &ortho, vp(), &view);
    // either path is acceptable; both must produce a viewport-sized frame
    assert!(r.backend().is_some());
    let out = out.unwrap();
    assert_eq!(out.size(), [160, 120]);
    if let Ok(img) = out.to_image() {
        assert_eq!(img.size, [160, 120]);
    }
}
