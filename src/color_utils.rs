//! Color utility functions shared across the analysers.
//!
//! This module provides color conversion, hex parsing/formatting and the
//! class palette used by segmentation and classification maps.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constants::PALETTE_SEED;

/// An 8-bit RGB triple.
pub type Rgb = [u8; 3];

/// Built-in colors used before the palette is extended.
pub const BASE_PALETTE: [Rgb; 10] = [
    [31, 119, 180],
    [255, 127, 14],
    [44, 160, 44],
    [214, 39, 40],
    [148, 103, 189],
    [140, 86, 75],
    [227, 119, 194],
    [127, 127, 127],
    [188, 189, 34],
    [23, 190, 207],
];

/// Convert HSV to RGB.
///
/// # Arguments
/// * `h` - Hue in degrees (0-360)
/// * `s` - Saturation (0.0-1.0)
/// * `v` - Value/brightness (0.0-1.0)
///
/// # Returns
/// RGB tuple with values in range 0.0-1.0
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (r + m, g + m, b + m)
}

fn unit_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// `count` display colors: the built-in palette first, then colors drawn
/// from a generator seeded with [`PALETTE_SEED`]. Identical for every call.
pub fn palette(count: usize) -> Vec<Rgb> {
    let mut colors: Vec<Rgb> = BASE_PALETTE.iter().copied().take(count).collect();
    if count <= BASE_PALETTE.len() {
        return colors;
    }

    let mut rng = StdRng::seed_from_u64(PALETTE_SEED);
    while colors.len() < count {
        let hue = rng.random_range(0.0f32..360.0);
        let saturation = rng.random_range(0.5f32..0.9);
        let value = rng.random_range(0.6f32..0.95);
        let (r, g, b) = hsv_to_rgb(hue, saturation, value);
        colors.push([unit_to_u8(r), unit_to_u8(g), unit_to_u8(b)]);
    }
    colors
}

/// Parse `#rrggbb` or `#rgb` (leading `#` optional).
pub fn parse_hex_color(text: &str) -> Option<Rgb> {
    let hex = text.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if !hex.is_ascii() {
        return None;
    }

    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };

    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// Format as lowercase `#rrggbb`.
pub fn format_hex_color(color: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}
