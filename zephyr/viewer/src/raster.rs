//! Software raster primitives on premultiplied `egui::ColorImage` buffers.

use egui::{Color32, ColorImage};

/// Fully transparent image.
pub fn blank(width: u32, height: u32) -> ColorImage {
    ColorImage::new([width as usize, height as usize], Color32::TRANSPARENT)
}

/// Multiply every channel (premultiplied, so alpha too) by `f`.
pub fn fade(img: &mut ColorImage, f: f32) {
    let f = f.clamp(0.0, 1.0);
    for px in &mut img.pixels {
        let [r, g, b, a] = px.to_array();
        let s = |c: u8| (f32::from(c) * f) as u8;
        *px = Color32::from_rgba_premultiplied(s(r), s(g), s(b), s(a));
    }
}

#[inline]
fn put(img: &mut ColorImage, x: i64, y: i64, color: Color32) {
    let [w, h] = img.size;
    if x < 0 || y < 0 || x as usize >= w || y as usize >= h {
        return;
    }
    img.pixels[y as usize * w + x as usize] = color;
}

/// One-pixel DDA line from `from` to `to`; pixels outside the image are skipped.
pub fn draw_line(img: &mut ColorImage, from: [f32; 2], to: [f32; 2], color: Color32) {
    let (dx, dy) = (to[0] - from[0], to[1] - from[1]);
    if !dx.is_finite() || !dy.is_finite() {
        return;
    }
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0);
    // Guard against runaway segments; callers never pass more than a viewport diagonal
    if steps > 16_384.0 {
        return;
    }
    let n = steps as i64;
    let (sx, sy) = (dx / steps, dy / steps);
    for i in 0..=n {
        let t = i as f32;
        let x = (from[0] + sx * t).round() as i64;
        let y = (from[1] + sy * t).round() as i64;
        put(img, x, y, color);
    }
}

/// Fill the `size`×`size` block whose top-left corner is `(x, y)`, clipped to the image,
/// touching only pixels `keep` accepts.
pub fn fill_block(
    img: &mut ColorImage,
    x: i32,
    y: i32,
    size: i32,
    color: Color32,
    keep: impl Fn(i32, i32) -> bool,
) {
    for yy in y..y + size {
        for xx in x..x + size {
            if keep(xx, yy) {
                put(img, i64::from(xx), i64::from(yy), color);
            }
        }
    }
}

/// Premultiplied source-over: `dst = src + dst·(1 − src.a)`. Only the overlapping region
/// of differently sized images is touched.
pub fn blend_over(dst: &mut ColorImage, src: &ColorImage) {
    let w = dst.size[0].min(src.size[0]);
    let h = dst.size[1].min(src.size[1]);
    for y in 0..h {
        for x in 0..w {
            let s = src.pixels[y * src.size[0] + x];
            if s.a() == 0 {
                continue;
            }
            let d = &mut dst.pixels[y * dst.size[0] + x];
            if s.a() == 255 {
                *d = s;
                continue;
            }
            let inv = 255 - u16::from(s.a());
            let mix = |sc: u8, dc: u8| -> u8 {
                let v = u16::from(sc) + (u16::from(dc) * inv + 127) / 255;
                v.min(255) as u8
            };
            *d = Color32::from_rgba_premultiplied(
                mix(s.r(), d.r()),
                mix(s.g(), d.g()),
                mix(s.b(), d.b()),
                mix(s.a(), d.a()),
            );
        }
    }
}

/// Premultiplied colour from an sRGB triplet and an opacity in [0, 1].
pub fn with_alpha(rgb: [u8; 3], alpha: f32) -> Color32 {
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(rgb[0], rgb[1], rgb[2], a)
}
