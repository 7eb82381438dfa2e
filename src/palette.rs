// Fixed colour configuration for the figures.
use plotters::style::{Color, HSLColor, RGBColor};

pub const GREEN: RGBColor = RGBColor(0, 128, 0);
pub const RED: RGBColor = RGBColor(255, 0, 0);
pub const ORANGE: RGBColor = RGBColor(255, 165, 0);
pub const PURPLE: RGBColor = RGBColor(128, 0, 128);
pub const TEAL: RGBColor = RGBColor(0, 128, 128);
pub const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
pub const BLUE: RGBColor = RGBColor(0, 0, 255);
pub const BLACK: RGBColor = RGBColor(0, 0, 0);

/// Default cycle for multi-series bars: first and second series.
pub const CYCLE: [RGBColor; 2] = [RGBColor(31, 119, 180), RGBColor(255, 127, 14)];

pub const SET2: [RGBColor; 8] = [
    RGBColor(102, 194, 165),
    RGBColor(252, 141, 98),
    RGBColor(141, 160, 203),
    RGBColor(231, 138, 195),
    RGBColor(166, 216, 84),
    RGBColor(255, 217, 47),
    RGBColor(229, 196, 148),
    RGBColor(179, 179, 179),
];

pub const MUTED: [RGBColor; 10] = [
    RGBColor(72, 120, 208),
    RGBColor(238, 133, 74),
    RGBColor(106, 204, 100),
    RGBColor(214, 95, 95),
    RGBColor(149, 108, 180),
    RGBColor(140, 97, 60),
    RGBColor(220, 126, 192),
    RGBColor(121, 121, 121),
    RGBColor(213, 187, 103),
    RGBColor(130, 198, 226),
];

/// `n` evenly spaced hues at fixed saturation and lightness.
pub fn husl(n: usize) -> Vec<RGBColor> {
    (0..n)
        .map(|i| {
            let hue = (0.01 + i as f64 / n as f64) % 1.0;
            let c = HSLColor(hue, 0.65, 0.6).to_backend_color();
            RGBColor(c.rgb.0, c.rgb.1, c.rgb.2)
        })
        .collect()
}
