use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            to_color32(rgb)
        })
        .collect()
}

fn to_color32(rgb: Srgb) -> Color32 {
    Color32::from_rgb(
        (rgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

pub fn rgb(c: [u8; 3]) -> Color32 {
    Color32::from_rgb(c[0], c[1], c[2])
}

// ---------------------------------------------------------------------------
// Station colours
// ---------------------------------------------------------------------------

/// Maps each station to a distinct colour, stable for the loaded dataset.
#[derive(Debug, Clone)]
pub struct StationColors {
    mapping: BTreeMap<String, Color32>,
    default_color: Color32,
}

impl StationColors {
    /// Assign colours in the given station order.
    pub fn new(stations: &[String]) -> Self {
        let palette = generate_palette(stations.len());
        let mapping = stations
            .iter()
            .cloned()
            .zip(palette)
            .collect();

        StationColors {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    pub fn color_for(&self, station: &str) -> Color32 {
        self.mapping
            .get(station)
            .copied()
            .unwrap_or(self.default_color)
    }
}

// ---------------------------------------------------------------------------
// Heatmap scale
// ---------------------------------------------------------------------------

/// White-to-green scale; `t` is clamped to [0, 1].
pub fn heat_color(t: f64) -> Color32 {
    let white = LinSrgb::new(1.0_f32, 1.0, 1.0);
    let green = LinSrgb::new(0.0_f32, 1.0, 0.0);
    let mixed = white.mix(green, t.clamp(0.0, 1.0) as f32);
    to_color32(Srgb::from_linear(mixed))
}

/// Position of `value` within `[lo, hi]`; a degenerate range maps to 1.
pub fn normalize(value: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        (value - lo) / (hi - lo)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        let p = generate_palette(6);
        assert_eq!(p.len(), 6);
        assert_ne!(p[0], p[3]);
    }

    #[test]
    fn stations_get_distinct_colors() {
        let colors = StationColors::new(&["A".to_string(), "B".to_string()]);
        assert_ne!(colors.color_for("A"), colors.color_for("B"));
        assert_eq!(colors.color_for("missing"), Color32::GRAY);
    }

    #[test]
    fn heat_scale_endpoints() {
        assert_eq!(heat_color(0.0), Color32::WHITE);
        assert_eq!(heat_color(1.0), Color32::from_rgb(0, 255, 0));
        assert_eq!(heat_color(7.0), heat_color(1.0));
    }

    #[test]
    fn normalize_handles_flat_range() {
        assert_eq!(normalize(0.5, 0.0, 1.0), 0.5);
        assert_eq!(normalize(3.0, 3.0, 3.0), 1.0);
    }
}
