use std::sync::Arc;

use engine::field::{Field, FieldSampler};
use engine::product::{self, GridHeader, Sample, WeatherProduct};
use engine::{AnimationParams, ColorScale, FormFactor, IntensityScale, ParticleEngine, ParticleMeta, Unit};
use zephyr_geo::{Projection, ProjectionKind, ProjectionParams, Viewport, VisibilityMask};

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

fn build_field(product: &dyn WeatherProduct, projection: &Projection, vp: Viewport) -> Arc<Field> {
    let mask = VisibilityMask::build(projection, vp);
    Arc::new(FieldSampler::new(product, projection, &mask, vp, AnimationParams::default()).unwrap().build())
}

fn ortho(vp: Viewport) -> Projection {
    Projection::new(ProjectionParams::new(ProjectionKind::Orthographic), vp)
}

/// Northward flow defined only south of 20°N, fast enough to leave the data within a few ticks.
fn capped_northward() -> engine::GridProduct {
    let h = GridHeader::global(1.0);
    let u = vec![Some(0.0f32); h.len()];
    let v: Vec<Option<f32>> = (0..h.len())
        .map(|k| {
            let lat = 90.0 - (k / h.ni) as f64;
            (lat <= 20.0).then_some(10.0)
        })
        .collect();
    product::wind(h, &u, &v)
        .unwrap()
        .with_particles(Some(ParticleMeta { velocity_scale: 1.0 / 600.0, max_intensity: 17.0 }))
}

fn engine_with(field: Arc<Field>, seed: u64) -> ParticleEngine {
    let params = AnimationParams { seed, ..AnimationParams::default() };
    let mut e = ParticleEngine::new(params);
    e.reseed(field, IntensityScale::new(params.intensity_step, 17.0), FormFactor::Desktop);
    e
}

#[test]
fn population_follows_bounds_width() {
    let vp = Viewport::new(800, 600);
    let p = ortho(vp);
    let field = build_field(&capped_northward(), &p, vp);
    let width = field.bounds().width;
    let e = engine_with(field.clone(), 1);
    assert_eq!(e.particles().len(), (f64::from(width) * 7.0).round() as usize);

    let params = AnimationParams::default();
    let mut small = ParticleEngine::new(params);
    small.reseed(field, IntensityScale::new(10, 17.0), FormFactor::Constrained);
    assert_eq!(small.particles().len(), (f64::from(width) * 7.0 * 0.75).round() as usize);
}

#[test]
fn bucket_sizes_equal_defined_targets() {
    let vp = Viewport::new(400, 300);
    let field = build_field(&capped_northward(), &ortho(vp), vp);
    let mut e = engine_with(field, 3);
    let total = e.particles().len();
    for _ in 0..30 {
        let stats = e.tick();
        let bucketed: usize = e.buckets().iter().map(Vec::len).sum();
        assert_eq!(bucketed, stats.drawn);
        let pending = e.particles().iter().filter(|p| p.target.is_some()).count();
        assert_eq!(pending, stats.drawn);
        assert_eq!(stats.drawn + stats.coasting + stats.respawned + stats.escaped, total);
    }
}

#[test]
fn ages_only_reset_through_respawn() {
    let vp = Viewport::new(400, 300);
    let field = build_field(&capped_northward(), &ortho(vp), vp);
    let mut e = engine_with(field, 11);
    let max_age = e.params().max_particle_age;
    for _ in 0..250 {
        let before: Vec<_> = e.particles().to_vec();
        e.tick();
        for (old, new) in before.iter().zip(e.particles()) {
            if old.age > max_age {
                // respawned: fresh age in [0, max) plus this tick
                assert!(new.age >= 1 && new.age <= max_age);
            } else {
                assert!(new.age > old.age, "age went {} -> {}", old.age, new.age);
            }
        }
    }
}

#[test]
fn null_sample_forces_expiry_then_respawn() {
    let vp = Viewport::new(400, 300);
    let field = build_field(&capped_northward(), &ortho(vp), vp);
    let mut e = engine_with(field.clone(), 5);
    let max_age = e.params().max_particle_age;
    let mut escaped_seen = 0;
    for _ in 0..40 {
        let before: Vec<_> = e.particles().to_vec();
        let stats = e.tick();
        escaped_seen += stats.escaped;
        for (old, new) in before.iter().zip(e.particles()) {
            if old.age > max_age {
                continue;
            }
            let (x, y) = old.target.unwrap_or((old.x, old.y));
            if !field.is_defined(x, y) {
                assert_eq!(new.age, max_age + 1);
                assert_eq!((new.x, new.y), (x, y), "escaped particle must not move");
                assert!(new.target.is_none());
            }
        }
    }
    assert!(escaped_seen > 0, "flow never left the data");
}

#[test]
fn null_product_keeps_buckets_empty() {
    let vp = Viewport::new(800, 600);
    let field = build_field(&NullProduct, &ortho(vp), vp);
    assert!(field.valid_positions().is_empty());
    let mut e = engine_with(field, 9);
    assert!(!e.particles().is_empty());
    for _ in 0..3 {
        let stats = e.tick();
        assert_eq!(stats.drawn, 0);
        assert_eq!(stats.respawned, e.particles().len());
        assert!(e.buckets().iter().all(Vec::is_empty));
    }
}

#[test]
fn eastward_particles_draw_rightward_segments() {
    let vp = Viewport::new(800, 600);
    let h = GridHeader::global(1.0);
    let wind = product::wind(h, &vec![Some(10.0); h.len()], &vec![Some(0.0); h.len()]).unwrap();
    let field = build_field(&wind, &ortho(vp), vp);
    let mut e = engine_with(field, 21);
    let mut drawn = 0;
    for _ in 0..5 {
        e.tick();
        for bucket in e.buckets() {
            for s in bucket {
                assert!(s.to[0] > s.from[0]);
                drawn += 1;
            }
        }
    }
    assert!(drawn > 0);
    // 10 m/s of a 17 m/s scale lands in bucket floor(10/17 * 17) = 10.
    assert!(e.buckets().iter().enumerate().all(|(i, b)| i == 10 || b.is_empty()));
}

#[test]
fn rotation_preserves_population_data_change_reseeds() {
    let vp = Viewport::new(400, 300);
    let wind = capped_northward();
    let p = ortho(vp);
    let mut e = engine_with(build_field(&wind, &p, vp), 13);
    for _ in 0..5 {
        e.tick();
    }
    let snapshot: Vec<_> = e.particles().to_vec();
    let epoch = e.epoch();

    let rotated = p.rotated([25.0, -10.0, 0.0]);
    assert!(e.buckets().iter().any(|b| !b.is_empty()));
    e.replace_field(build_field(&wind, &rotated, vp));
    assert!(e.buckets().iter().all(Vec::is_empty), "old-view segments are dropped");
    assert_eq!(e.particles(), &snapshot[..]);
    assert_eq!(e.epoch(), epoch);
    assert!(e.field().is_some_and(|f| f.matches(&rotated, vp)));

    let field = build_field(&wind, &rotated, vp);
    e.reseed(field, IntensityScale::new(10, 17.0), FormFactor::Desktop);
    assert_eq!(e.epoch(), epoch + 1);
    assert_ne!(e.particles(), &snapshot[..]);
}

#[test]
fn same_seed_same_population() {
    let vp = Viewport::new(300, 200);
    let field = build_field(&capped_northward(), &ortho(vp), vp);
    let mut a = engine_with(field.clone(), 42);
    let mut b = engine_with(field, 42);
    for _ in 0..10 {
        assert_eq!(a.tick(), b.tick());
    }
    assert_eq!(a.particles(), b.particles());
}

#[test]
fn cleared_engine_stops_drawing() {
    let vp = Viewport::new(300, 200);
    let field = build_field(&capped_northward(), &ortho(vp), vp);
    let mut e = engine_with(field, 2);
    e.tick();
    e.clear();
    assert_eq!(e.tick(), engine::TickStats::default());
    assert!(e.buckets().iter().all(Vec::is_empty));
}
