//! Palette loaders and sampling.
//!
//! - `.pal` continuous palette with linear-sRGB interpolation
//! - 256-entry RGBA lookup tables for the hardware backends
//!
//! Assets are embedded with include_str! so there is no runtime IO.

use std::sync::OnceLock;

/// A single color stop along a 1D value domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    /// Domain value in product units (m/s, K)
    pub v: f32,
    /// sRGB 8-bit triplet
    pub rgb: [u8; 3],
}

/// Continuous palette: strictly increasing stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub stops: Vec<ColorStop>,
    pub vmin: f32,
    pub vmax: f32,
}

impl Palette {
    /// Domain value at fraction `t` of the palette range.
    pub fn value_at(&self, t: f32) -> f32 {
        self.vmin + t.clamp(0.0, 1.0) * (self.vmax - self.vmin)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PaletteError {
    #[error(".pal: line {0} missing value")]
    MissingValue(usize),
    #[error(".pal: line {line} bad value '{token}'")]
    BadValue { line: usize, token: String },
    #[error(".pal: line {0} missing color")]
    MissingColor(usize),
    #[error(".pal: line {line} {reason}")]
    BadHex { line: usize, reason: &'static str },
    #[error(".pal: values must be strictly increasing at index {0}")]
    NotIncreasing(usize),
    #[error(".pal: no stops")]
    Empty,
    #[error("unknown palette '{0}'")]
    Unknown(String),
}

/// Embedded default assets
pub const WIND_STR: &str = include_str!("../assets/palettes/wind.pal");
pub const TEMPERATURE_STR: &str = include_str!("../assets/palettes/temperature.pal");
pub const CURRENTS_STR: &str = include_str!("../assets/palettes/currents.pal");

/// Entries in a hardware lookup table.
pub const LUT_LEN: usize = 256;

/// Parse a `.pal` continuous palette.
///
/// Format: lines of `value  #RRGGBB`, blank lines and `#` comments are ignored.
pub fn parse_pal(src: &str) -> Result<Palette, PaletteError> {
    let mut stops: Vec<ColorStop> = Vec::new();
    for (lineno, raw) in src.lines().enumerate() {
        let line = raw.trim();
        let n = lineno + 1;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // Value tokens come before the first '#'; anything after the colour is ignored
        let mut toks = line.split_whitespace();
        let v_str = toks.next().ok_or(PaletteError::MissingValue(n))?;
        let v: f32 = v_str
            .parse::<f32>()
            .map_err(|_| PaletteError::BadValue { line: n, token: v_str.to_string() })?;
        let col_tok = toks.find(|t| t.starts_with('#')).ok_or(PaletteError::MissingColor(n))?;
        let rgb = parse_hex_rgb(col_tok).map_err(|reason| PaletteError::BadHex { line: n, reason })?;
        stops.push(ColorStop { v, rgb });
    }
    if stops.is_empty() {
        return Err(PaletteError::Empty);
    }
    for i in 1..stops.len() {
        if stops[i].v.partial_cmp(&stops[i - 1].v) != Some(std::cmp::Ordering::Greater) {
            return Err(PaletteError::NotIncreasing(i));
        }
    }
    let vmin = stops[0].v;
    let vmax = stops[stops.len() - 1].v;
    Ok(Palette { stops, vmin, vmax })
}

#[inline]
fn parse_hex_rgb(tok: &str) -> Result<[u8; 3], &'static str> {
    let hex = tok.trim().strip_prefix('#').ok_or("expected #RRGGBB")?;
    if hex.len() != 6 || !hex.is_ascii() {
        return Err("expected 6 hex digits");
    }
    let r = u8::from_str_radix(&hex[0..2], 16).map_err(|_| "bad R")?;
    let g = u8::from_str_radix(&hex[2..4], 16).map_err(|_| "bad G")?;
    let b = u8::from_str_radix(&hex[4..6], 16).map_err(|_| "bad B")?;
    Ok([r, g, b])
}

#[inline]
fn srgb_u8_to_linear(rgb: [u8; 3]) -> [f32; 3] {
    [srgb_to_linear(rgb[0]), srgb_to_linear(rgb[1]), srgb_to_linear(rgb[2])]
}

#[inline]
fn srgb_to_linear(c: u8) -> f32 {
    let x = (c as f32) / 255.0;
    if x <= 0.04045 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_to_srgb_u8(c: f32) -> u8 {
    let y = if c <= 0.003_130_8 { 12.92 * c } else { 1.055 * c.powf(1.0 / 2.4) - 0.055 };
    (y.clamp(0.0, 1.0) * 255.0 + 0.5).floor() as u8
}

/// Sample palette at x with linear-RGB interpolation (gamma-correct).
/// Values are clamped to [vmin, vmax].
pub fn sample_linear_srgb(p: &Palette, x: f32) -> [u8; 3] {
    let n = p.stops.len();
    if n == 0 {
        return [0, 0, 0];
    }
    if n == 1 || x.is_nan() {
        return p.stops[0].rgb;
    }
    let x = x.clamp(p.vmin, p.vmax);
    // Find segment [i, i+1] such that v_i <= x <= v_{i+1}
    let i = p.stops[1..n - 1].iter().take_while(|s| x > s.v).count();
    let a = p.stops[i];
    let b = p.stops[i + 1];
    let t = if b.v > a.v { (x - a.v) / (b.v - a.v) } else { 0.0 };
    let la = srgb_u8_to_linear(a.rgb);
    let lb = srgb_u8_to_linear(b.rgb);
    let lr =
        [la[0] + t * (lb[0] - la[0]), la[1] + t * (lb[1] - la[1]), la[2] + t * (lb[2] - la[2])];
    [linear_to_srgb_u8(lr[0]), linear_to_srgb_u8(lr[1]), linear_to_srgb_u8(lr[2])]
}

/// `len` opaque colours spanning the palette range evenly, first entry at `vmin`.
pub fn lut(p: &Palette, len: usize) -> Vec<[u8; 4]> {
    let last = len.saturating_sub(1).max(1) as f32;
    (0..len)
        .map(|i| {
            let [r, g, b] = sample_linear_srgb(p, p.value_at(i as f32 / last));
            [r, g, b, 255]
        })
        .collect()
}

static WIND: OnceLock<Result<Palette, PaletteError>> = OnceLock::new();
static TEMPERATURE: OnceLock<Result<Palette, PaletteError>> = OnceLock::new();
static CURRENTS: OnceLock<Result<Palette, PaletteError>> = OnceLock::new();

/// Embedded palette by the name a product's colour scale carries.
pub fn builtin(name: &str) -> Result<&'static Palette, PaletteError> {
    let (cell, src) = match name {
        "wind" => (&WIND, WIND_STR),
        "temperature" => (&TEMPERATURE, TEMPERATURE_STR),
        "currents" => (&CURRENTS, CURRENTS_STR),
        other => return Err(PaletteError::Unknown(other.to_string())),
    };
    cell.get_or_init(|| parse_pal(src)).as_ref().map_err(Clone::clone)
}
