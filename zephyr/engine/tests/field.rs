use engine::field::{FieldError, FieldSampler};
use engine::product::{self, GridHeader, GridProduct, WeatherProduct};
use engine::AnimationParams;
use rand::SeedableRng;
use zephyr_geo::{Projection, ProjectionKind, ProjectionParams, Viewport, VisibilityMask};

fn uniform_wind(u: f32, v: f32) -> GridProduct {
    let h = GridHeader::global(1.0);
    let n = h.len();
    product::wind(h, &vec![Some(u); n], &vec![Some(v); n]).unwrap()
}

fn setup(kind: ProjectionKind, w: u32, h: u32) -> (Projection, VisibilityMask, Viewport) {
    let vp = Viewport::new(w, h);
    let p = Projection::new(ProjectionParams::new(kind), vp);
    let m = VisibilityMask::build(&p, vp);
    (p, m, vp)
}

#[test]
fn invisible_pixels_are_undefined() {
    let wind = uniform_wind(5.0, -3.0);
    for kind in [ProjectionKind::Orthographic, ProjectionKind::Equirectangular, ProjectionKind::Winkel3] {
        let (p, m, vp) = setup(kind, 200, 150);
        let field = FieldSampler::new(&wind, &p, &m, vp, AnimationParams::default()).unwrap().build();
        assert!(!field.valid_positions().is_empty(), "{kind}");
        for y in 0..150 {
            for x in 0..200 {
                if !m.is_visible(x, y) {
                    assert!(
                        field.get(f64::from(x), f64::from(y)).magnitude.is_none(),
                        "{kind}: ({x}, {y}) is off the globe but defined"
                    );
                }
            }
        }
        for &(x, y) in field.valid_positions() {
            assert!(m.is_visible(x, y));
            assert!(field.is_defined(f64::from(x), f64::from(y)));
        }
    }
}

#[test]
fn samples_are_replicated_to_odd_neighbours() {
    let wind = uniform_wind(5.0, 0.0);
    let (p, m, vp) = setup(ProjectionKind::Orthographic, 200, 150);
    let field = FieldSampler::new(&wind, &p, &m, vp, AnimationParams::default()).unwrap().build();
    let b = field.bounds();
    // Stride positions are bounds-relative even offsets.
    for &(x, y) in field.valid_positions() {
        assert_eq!((x - b.x) % 2, 0);
        assert_eq!((y - b.y) % 2, 0);
    }
    let (cx, cy) = (b.x + 2 * ((b.width / 2) / 2), b.y + 2 * ((b.height / 2) / 2));
    let s = field.get(f64::from(cx), f64::from(cy));
    assert_eq!(field.get(f64::from(cx + 1), f64::from(cy)), s);
    assert_eq!(field.get(f64::from(cx), f64::from(cy + 1)), s);
    assert_eq!(field.get(f64::from(cx + 1), f64::from(cy + 1)), s);
    // Rounds to the nearest pixel.
    assert_eq!(field.get(f64::from(cx) + 0.3, f64::from(cy) - 0.4), s);
}

#[test]
fn eastward_wind_drifts_right_and_slows_at_the_limb() {
    let wind = uniform_wind(10.0, 0.0);
    let (p, m, vp) = setup(ProjectionKind::Orthographic, 800, 600);
    let params = AnimationParams::default();
    let sampler = FieldSampler::new(&wind, &p, &m, vp, params).unwrap();
    let b = m.bounds();
    assert!((sampler.velocity_scale() - f64::from(b.height) / 60_000.0).abs() < 1e-12);
    let field = sampler.build();

    for &(x, y) in field.valid_positions() {
        let v = field.get(f64::from(x), f64::from(y));
        assert!(v.dx > 0.0, "({x}, {y}) dx={}", v.dx);
        // Away from the poles the eastward step has no vertical component.
        if (y - 300).abs() < 200 {
            assert!(v.dy.abs() < 1e-3, "({x}, {y}) dy={}", v.dy);
        }
        assert_eq!(v.magnitude, Some(10.0));
    }

    let centre = field.get(400.0, 300.0);
    let expected = 10.0 * f64::from(b.height) / 60_000.0 * p.scale().to_radians();
    assert!((f64::from(centre.dx) - expected).abs() / expected < 1e-3, "{} vs {expected}", centre.dx);

    let limb = field
        .valid_positions()
        .iter()
        .filter(|&&(_, y)| y == 300)
        .min_by_key(|&&(x, _)| x)
        .copied()
        .unwrap();
    let edge = field.get(f64::from(limb.0), 300.0);
    assert!(edge.dx < centre.dx * 0.5, "limb {limb:?} dx={} centre={}", edge.dx, centre.dx);
}

#[test]
fn degenerate_vectors_are_excluded() {
    // Fast enough that everything but a thin rim at the limb exceeds the sanity bound.
    let wind = uniform_wind(10.0, 0.0).with_particles(Some(engine::ParticleMeta {
        velocity_scale: 1.0,
        max_intensity: 17.0,
    }));
    let (p, m, vp) = setup(ProjectionKind::Orthographic, 200, 150);
    let params = AnimationParams::default();
    let field = FieldSampler::new(&wind, &p, &m, vp, params).unwrap().build();
    assert!(!field.is_defined(100.0, 75.0));
    assert!(field.valid_positions().len() < m.visible_count() / 16);
    for &(x, y) in field.valid_positions() {
        let v = field.get(f64::from(x), f64::from(y));
        assert!(f64::from(v.dx.hypot(v.dy)) < params.degenerate_magnitude_px);
    }
}

#[test]
fn randomize_picks_valid_positions_and_ages() {
    let wind = uniform_wind(3.0, 3.0);
    let (p, m, vp) = setup(ProjectionKind::Stereographic, 160, 120);
    let field = FieldSampler::new(&wind, &p, &m, vp, AnimationParams::default()).unwrap().build();
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    for _ in 0..500 {
        let q = field.randomize(&mut rng, 100).unwrap();
        assert!(q.age < 100);
        assert!(q.target.is_none());
        assert!(field.valid_positions().contains(&(q.x as i32, q.y as i32)));
    }
}

#[test]
fn stale_mask_blocks_rebuild() {
    let wind = uniform_wind(1.0, 0.0);
    let (p, m, vp) = setup(ProjectionKind::Orthographic, 120, 90);
    let switched = Projection::new(ProjectionParams::new(ProjectionKind::Equirectangular), vp);
    assert_eq!(
        FieldSampler::new(&wind, &switched, &m, vp, AnimationParams::default()).err(),
        Some(FieldError::StaleMask)
    );
    assert!(FieldSampler::new(&wind, &p, &m, Viewport::new(121, 90), AnimationParams::default()).is_err());
    let fresh = VisibilityMask::build(&switched, vp);
    let field = FieldSampler::new(&wind, &switched, &fresh, vp, AnimationParams::default()).unwrap().build();
    assert!(field.matches(&switched, vp));
    assert!(!field.matches(&p, vp));
    assert_eq!(wind.name(), "wind");
}
