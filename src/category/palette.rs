//! Per-category colors
//!
//! Generated base colors are evenly spaced hues at fixed saturation and
//! lightness; each entry also carries a darker and a brighter variant for
//! strokes and highlights.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::parser::CategorySet;

const SATURATION: f64 = 0.65;
const LIGHTNESS: f64 = 0.5;
const SHADE_STEP: f64 = 0.15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub color: String,
    pub darken: String,
    pub brighten: String,
}

/// Category name to colors
pub type Palette = BTreeMap<String, PaletteEntry>;

/// Assign one palette entry per category, honouring explicit overrides
#[must_use]
pub fn build_palette(categories: &CategorySet) -> Palette {
    let n = categories.len().max(1) as f64;
    categories
        .iter()
        .enumerate()
        .map(|(i, category)| {
            let (h, s, l) = category
                .color_override
                .as_deref()
                .and_then(parse_hex)
                .map_or((360.0 * i as f64 / n, SATURATION, LIGHTNESS), |(r, g, b)| {
                    rgb_to_hsl(r, g, b)
                });
            let color = category
                .color_override
                .clone()
                .unwrap_or_else(|| hsl_to_hex(h, s, l));
            let entry = PaletteEntry {
                color,
                darken: hsl_to_hex(h, s, (l - SHADE_STEP).max(0.0)),
                brighten: hsl_to_hex(h, s, (l + SHADE_STEP).min(1.0)),
            };
            (category.name.clone(), entry)
        })
        .collect()
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let (r, g, b) = (f64::from(r) / 255.0, f64::from(g) / 255.0, f64::from(b) / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d == 0.0 {
        return (0.0, 0.0, l);
    }
    let s = d / (1.0 - (2.0 * l - 1.0).abs());
    let h = if max == r {
        60.0 * (((g - b) / d).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / d + 2.0)
    } else {
        60.0 * ((r - g) / d + 4.0)
    };
    (h, s, l)
}

fn hsl_to_hex(h: f64, s: f64, l: f64) -> String {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", to_byte(r1), to_byte(g1), to_byte(b1))
}
