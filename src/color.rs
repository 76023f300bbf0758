use std::collections::{BTreeMap, BTreeSet};

use palette::{Hsl, IntoColor, Srgb};

use crate::data::value::Scalar;

/// 8-bit sRGB colour handed to plot surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const GRAY: Rgb = Rgb(160, 160, 160);
    pub const STEEL_BLUE: Rgb = Rgb(70, 130, 180);
    pub const CRIMSON: Rgb = Rgb(220, 20, 60);
    pub const FOREST_GREEN: Rgb = Rgb(34, 139, 34);
}

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| from_hsl(Hsl::new((i as f32 / n as f32) * 360.0, 0.75, 0.55)))
        .collect()
}

/// Blue-to-red ramp over `t` in `[0, 1]`; values outside clamp and NaN is
/// blue.
pub fn value_color(t: f64) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    from_hsl(Hsl::new(240.0 * (1.0 - t as f32), 0.8, 0.5))
}

fn from_hsl(hsl: Hsl) -> Rgb {
    let rgb: Srgb = hsl.into_color();
    Rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

// ---------------------------------------------------------------------------
// Color mapping: cell value → Rgb
// ---------------------------------------------------------------------------

/// Maps the distinct values of a grouping column (cycle number, specimen
/// id, …) to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<Scalar, Rgb>,
    default_color: Rgb,
}

impl ColorMap {
    pub fn new(unique_values: &BTreeSet<Scalar>) -> Self {
        let palette = generate_palette(unique_values.len());
        let mapping = unique_values.iter().cloned().zip(palette).collect();
        ColorMap {
            mapping,
            default_color: Rgb::GRAY,
        }
    }

    /// Colour for `value`; missing or unknown values get the default.
    pub fn color_for(&self, value: Option<&Scalar>) -> Rgb {
        value
            .and_then(|v| self.mapping.get(v))
            .copied()
            .unwrap_or(self.default_color)
    }
}
