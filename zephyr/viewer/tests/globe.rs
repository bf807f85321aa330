use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use engine::{
    product, AnimationParams, ColorScale, DisplayMode, EpochConfig, FormFactor, GridHeader, OverlayType, ParticleMeta,
    Sample, Unit, WeatherProduct,
};
use viewer::backend::BackendKind;
use viewer::composite::{CompositeFrame, LayerKind};
use viewer::globe::{Globe, GlobeData};
use viewer::layers::{MeshData, PlanetImage, PlanetLoader};
use zephyr_geo::{ProjectionKind, Viewport};

struct NullProduct;

impl WeatherProduct for NullProduct {
    fn name(&self) -> &str {
        "null"
    }
    fn interpolate(&self, _lon: f64, _lat: f64) -> Option<Sample> {
        None
    }
    fn units(&self) -> &[Unit] {
        &Unit::SPEED
    }
    fn scale(&self) -> ColorScale {
        ColorScale { min: 0.0, max: 100.0, palette: "wind" }
    }
    fn particles(&self) -> Option<ParticleMeta> {
        Some(ParticleMeta::default())
    }
}

fn eastward(speed: f32) -> Arc<dyn WeatherProduct> {
    let h = GridHeader::global(1.0);
    let u = vec![Some(speed); h.len()];
    let v = vec![Some(0.0f32); h.len()];
    Arc::new(product::wind(h, &u, &v).unwrap())
}

const VP: Viewport = Viewport { width: 200, height: 150 };

fn globe(config: EpochConfig) -> Globe {
    Globe::new(VP, config, AnimationParams::default(), None)
}

fn tick_n(g: &mut Globe, t0: Instant, n: u32) -> Option<CompositeFrame> {
    let mut last = None;
    for k in 0..n {
        last = g.frame(t0 + Duration::from_millis(40 * u64::from(k))).or(last);
    }
    last
}

#[test]
fn null_product_is_ready_with_empty_buckets() {
    let mut g = globe(EpochConfig::default());
    assert!(!g.is_ready());
    let t0 = Instant::now();
    let data = GlobeData { particles: Some(Arc::new(NullProduct)), overlay: Some(Arc::new(NullProduct)), ..Default::default() };
    g.handle_data_change(data, EpochConfig::default(), VP, t0);
    assert!(g.is_ready());
    assert!(g.engine().field().unwrap().valid_positions().is_empty());

    let frame = tick_n(&mut g, t0, 5).unwrap();
    assert!(g.engine().buckets().iter().all(Vec::is_empty));
    // mesh has nothing to draw and is omitted; the others are present but empty
    assert!(!frame.kinds().contains(&LayerKind::Mesh));
    assert!(frame.kinds().contains(&LayerKind::Particles));
    assert!(frame.flatten(VP).pixels.iter().all(|p| p.a() == 0));
}

#[test]
fn rotation_keeps_particles_and_data_change_reseeds() {
    let mut g = globe(EpochConfig::default());
    let t0 = Instant::now();
    let data = || GlobeData { particles: Some(eastward(10.0)), ..Default::default() };
    g.handle_data_change(data(), EpochConfig::default(), VP, t0);
    tick_n(&mut g, t0, 3);
    let epoch = g.engine().epoch();
    let before = g.engine().particles().to_vec();
    assert!(!before.is_empty());

    g.handle_rotation([25.0, -10.0, 0.0], None, t0);
    assert_eq!(g.engine().epoch(), epoch);
    assert_eq!(g.engine().particles(), &before[..]);
    assert!(g.mask().matches(g.projection(), VP));
    assert!(g.engine().field().unwrap().matches(g.projection(), VP));
    assert_eq!(g.config().orientation, Some([25.0, -10.0, 0.0]));

    g.handle_data_change(data(), EpochConfig::default(), VP, t0);
    assert_eq!(g.engine().epoch(), epoch + 1);
}

#[test]
fn rotation_drops_old_trails_until_next_tick() {
    let mut g = globe(EpochConfig::default());
    let t0 = Instant::now();
    g.handle_data_change(GlobeData { particles: Some(eastward(10.0)), ..Default::default() }, EpochConfig::default(), VP, t0);
    let frame = tick_n(&mut g, t0, 10).unwrap();
    assert!(frame.kinds().contains(&LayerKind::Particles));
    assert!(g.engine().buckets().iter().any(|b| !b.is_empty()));

    g.begin_gesture();
    g.handle_rotation([90.0, 0.0, 0.0], None, t0);
    assert!(g.engine().buckets().iter().all(Vec::is_empty));
    assert!(!g.composite().kinds().contains(&LayerKind::Particles), "trails from the old view survived");

    g.end_gesture(t0);
    let frame = g.frame(t0).unwrap();
    assert!(frame.kinds().contains(&LayerKind::Particles));
}

#[test]
fn zoom_reseeds_for_the_new_bounds() {
    let mut g = globe(EpochConfig::default());
    let t0 = Instant::now();
    g.handle_data_change(GlobeData { particles: Some(eastward(10.0)), ..Default::default() }, EpochConfig::default(), VP, t0);
    tick_n(&mut g, t0, 3);
    let epoch = g.engine().epoch();
    let width = g.mask().bounds().width;
    let expected = |w: i32| AnimationParams::default().particle_count(w, FormFactor::Desktop);
    assert_eq!(g.engine().particles().len(), expected(width));

    let zoomed = g.projection().scale() * 3.0;
    g.handle_rotation([0.0, 0.0, 0.0], Some(zoomed), t0);
    assert_eq!(g.engine().epoch(), epoch + 1);
    assert_ne!(g.mask().bounds().width, width);
    assert_eq!(g.engine().particles().len(), expected(g.mask().bounds().width));
    assert!(g.engine().field().unwrap().matches(g.projection(), VP));
}

#[test]
fn rotations_during_a_gesture_still_composite() {
    let cfg = EpochConfig { show_graticule: true, ..EpochConfig::default() };
    let mut g = globe(cfg);
    let t0 = Instant::now();
    g.handle_data_change(GlobeData { particles: Some(eastward(10.0)), ..Default::default() }, cfg, VP, t0);
    tick_n(&mut g, t0, 2);

    g.begin_gesture();
    for k in 0..50 {
        g.handle_rotation([f64::from(k) * 3.0, 10.0, 0.0], None, t0);
    }
    let frame = g.frame(t0 + Duration::from_secs(5)).unwrap();
    assert!(frame.kinds().contains(&LayerKind::Mesh));
    assert!(!g.ticks().is_running());
}

#[test]
fn projection_switch_rebuilds_mask_first() {
    let mut g = globe(EpochConfig::default());
    let t0 = Instant::now();
    let cfg = EpochConfig { projection: ProjectionKind::Equirectangular, ..EpochConfig::default() };
    g.handle_data_change(GlobeData { particles: Some(eastward(5.0)), ..Default::default() }, cfg, VP, t0);
    assert_eq!(g.projection().kind(), ProjectionKind::Equirectangular);
    assert!(g.mask().matches(g.projection(), VP));
    assert!(g.engine().field().unwrap().matches(g.projection(), VP));
    // flat map: the whole fitted rectangle is visible
    assert!(g.mask().visible_count() > g.mask().bounds().width as usize);
}

#[test]
fn gestures_pause_the_tick_loop() {
    let mut g = globe(EpochConfig::default());
    let t0 = Instant::now();
    g.handle_data_change(GlobeData { particles: Some(eastward(10.0)), ..Default::default() }, EpochConfig::default(), VP, t0);
    assert!(g.ticks().is_running());
    g.begin_gesture();
    assert!(!g.ticks().is_running());
    g.handle_rotation([10.0, 0.0, 0.0], Some(80.0), t0);
    assert!(!g.ticks().is_running());
    // the redraw is delivered once, then nothing changes until the gesture ends
    assert!(g.frame(t0 + Duration::from_secs(1)).is_some());
    assert!(g.frame(t0 + Duration::from_secs(2)).is_none());
    assert!((g.projection().scale() - 80.0).abs() < 1e-9);
    g.end_gesture(t0);
    assert!(g.ticks().is_running());
    assert!(g.frame(t0).is_some());
}

#[test]
fn mesh_and_overlay_fall_back_without_device() {
    let mut g = globe(EpochConfig::default());
    let coast = vec![vec![[-20.0, 0.0], [0.0, 10.0], [20.0, 0.0]]];
    let cfg = EpochConfig { show_graticule: true, overlay: OverlayType::Default, ..EpochConfig::default() };
    let data = GlobeData {
        particles: Some(eastward(10.0)),
        overlay: Some(eastward(10.0)),
        mesh: Some(Arc::new(MeshData { coastlines: coast, lakes: Vec::new() })),
        planet: None,
    };
    let t0 = Instant::now();
    g.handle_data_change(data, cfg, VP, t0);
    assert_eq!(g.backend(LayerKind::Mesh), Some(BackendKind::Software));
    assert_eq!(g.backend(LayerKind::Overlay), Some(BackendKind::Software));
    assert_eq!(g.backend(LayerKind::Particles), Some(BackendKind::Software));
    assert_eq!(g.backend(LayerKind::Planet), None);

    let frame = tick_n(&mut g, t0, 2).unwrap();
    assert_eq!(frame.kinds().as_slice(), &[LayerKind::Mesh, LayerKind::Overlay, LayerKind::Particles]);
    let flat = frame.flatten(VP);
    assert_eq!(flat.size, [200, 150]);
    assert!(flat.pixels[75 * 200 + 100].a() > 0);
}

#[test]
fn planet_mode_waits_for_imagery() {
    let cfg = EpochConfig { mode: DisplayMode::Planet, planet: Some(1), ..EpochConfig::default() };
    let mut g = globe(cfg);
    let (tx, loader) = PlanetLoader::channel();
    let decoder = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        tx.send(PlanetImage::new(8, 4, vec![[20, 60, 140, 255]; 32])).unwrap();
    });
    let t0 = Instant::now();
    let data = GlobeData { particles: Some(eastward(10.0)), planet: Some(loader), ..Default::default() };
    g.handle_data_change(data, cfg, VP, t0);
    assert!(!g.is_ready());
    assert!(g.engine().field().is_none(), "no particles in planet mode");

    let mut frame = None;
    for k in 0..300 {
        if let Some(f) = g.frame(t0 + Duration::from_millis(40 * k)) {
            if f.kinds().contains(&LayerKind::Planet) {
                frame = Some(f);
                break;
            }
        }
        thread::sleep(Duration::from_millis(10));
    }
    decoder.join().unwrap();
    let frame = frame.unwrap();
    assert_eq!(frame.kinds().as_slice(), &[LayerKind::Planet]);
    assert!(g.is_ready());
    assert_eq!(g.backend(LayerKind::Planet), Some(BackendKind::Software));
}

#[test]
fn dispose_releases_everything() {
    let mut g = globe(EpochConfig::default());
    let t0 = Instant::now();
    g.handle_data_change(GlobeData { particles: Some(eastward(10.0)), ..Default::default() }, EpochConfig::default(), VP, t0);
    g.dispose();
    assert!(!g.is_ready());
    assert!(!g.ticks().is_running());
    assert!(LayerKind::Z_ORDER.iter().all(|k| g.backend(*k).is_none()));
    assert!(g.engine().particles().is_empty());
    assert!(g.composite().is_empty());
}
