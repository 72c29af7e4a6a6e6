//! Seeded HSL palette styles.
//!
//! Each style maps a scene seed and a color index to an HSL triple in CSS
//! units (degrees, percent, percent); [`Hsl::to_rgb`] applies the same
//! wrapping and clamping a CSS parser would before converting.

/// HSL color in CSS units: hue in degrees, saturation/lightness in percent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Hsl {
    pub fn new(h: f32, s: f32, l: f32) -> Self {
        Self { h, s, l }
    }

    /// Normalizes (hue wrapped into [0, 360), saturation/lightness clamped)
    /// and converts to linear RGB components in [0, 1].
    pub fn to_rgb(self) -> [f32; 3] {
        let mut h = self.h % 360.0;
        if h < 0.0 {
            h += 360.0;
        }
        let s = self.s.clamp(0.0, 100.0);
        let l = self.l.clamp(0.0, 100.0);
        hsl_to_rgb(h / 360.0, s / 100.0, l / 100.0)
    }
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

/// Converts unit-range HSL to RGB.
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    if s == 0.0 {
        // Achromatic.
        return [l, l, l];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    [
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    ]
}

pub fn cool_warm(seed: f32, index: usize) -> Hsl {
    let seed = seed % 90.0;
    match index {
        1 => Hsl::new(seed % 360.0, 80.0, 45.0),
        3 => Hsl::new((160.0 + seed) % 360.0, 10.0, 50.0),
        4 => Hsl::new((seed + 30.0) % 360.0, 90.0, 90.0),
        0 => Hsl::new(seed + 10.0, 90.0, 10.0),
        _ => Hsl::new((seed + 180.0) % 360.0, 70.0, 45.0),
    }
}

pub fn oil_paint(seed: f32, index: usize) -> Hsl {
    match index {
        1 => Hsl::new(seed % 240.0, 80.0, 45.0),
        3 => Hsl::new((160.0 + 8_418_839.0 * seed) % 360.0, 10.0, 50.0),
        4 => Hsl::new(((seed % 39.0) + 30.0) % 360.0, 90.0, 95.0),
        0 => Hsl::new(seed % 30.0, 90.0, 10.0),
        _ => Hsl::new((seed + 180.0) % 240.0, 70.0, 45.0),
    }
}

pub fn highlight(seed: f32, index: usize) -> Hsl {
    let i = index as f32;
    if index == 4 {
        return Hsl::new((seed * 471_721.0) % 360.0, 100.0, 55.0);
    }
    Hsl::new(
        170.0 + ((seed + i) * 20.0) % 360.0,
        5.0 + 5.0 * ((seed + i) % 10.0),
        ((seed + i) % 10.0) * 5.0 + 30.0,
    )
}

pub fn high_key(seed: f32, index: usize) -> Hsl {
    let i = index as f32;
    Hsl::new(
        ((seed + i) * 30.0) % 360.0,
        10.0 + 10.0 * i,
        ((seed + i) % 10.0) * 3.5 + 60.0,
    )
}

pub fn low_key(seed: f32, index: usize) -> Hsl {
    let i = index as f32;
    Hsl::new(
        ((seed + i) * 30.0) % 360.0,
        15.0 + 5.0 * i,
        ((seed + i) % 10.0) * 5.0 + 20.0,
    )
}

pub fn muted(seed: f32, index: usize) -> Hsl {
    let seed = seed % 90.0;
    match index {
        1 => Hsl::new(seed % 360.0, 30.0, 45.0),
        3 => Hsl::new((160.0 + seed) % 360.0, 10.0, 50.0),
        4 => Hsl::new((seed + 30.0) % 360.0, 30.0, 70.0),
        0 => Hsl::new(seed - 20.0, 20.0, 30.0),
        _ => Hsl::new((seed + 140.0) % 360.0, 30.0, 45.0),
    }
}

pub fn rainbow(seed: f32, index: usize) -> Hsl {
    let i = index as f32;
    Hsl::new((seed + i * 40.0) % 360.0, 70.0 + 5.0 * i, 35.0 + 5.0 * i)
}

/// Picks one of ten palette styles from the seed's fractional spread, then
/// evaluates it at the given color index.
pub fn palette_color(seed: f32, index: usize) -> Hsl {
    let i = index as f32;
    let style = (seed * 10_000.0).abs() % 10_000.0;
    if style < 1_000.0 {
        cool_warm(seed, index)
    } else if style < 2_000.0 {
        Hsl::new(
            seed + ((i / 10.0) * 180.0) % 360.0,
            15.0 + 15.0 * i,
            (seed * 109_481.0 + i * 189_231.0) % 100.0,
        )
    } else if style < 3_000.0 {
        Hsl::new(
            seed + (((index / 2) as f32) * 180.0) % 360.0,
            10.0 + 40.0 * ((index % 2) as f32),
            50.0,
        )
    } else if style < 4_000.0 {
        Hsl::new(
            (seed + i * 10.0) % 360.0,
            50.0 + 10.0 * i,
            30.0 + 5.0 * i + (seed % 50.0),
        )
    } else if style < 5_000.0 {
        oil_paint(seed, index)
    } else if style < 6_000.0 {
        highlight(seed, index)
    } else if style < 7_000.0 {
        high_key(seed, index)
    } else if style < 8_000.0 {
        low_key(seed, index)
    } else if style < 9_000.0 {
        muted(seed, index)
    } else {
        rainbow(seed, index)
    }
}

/// Builds an `n`-color RGB palette for a seed.
pub fn create_palette(seed: f32, n: usize) -> Vec<[f32; 3]> {
    (0..n).map(|index| palette_color(seed, index).to_rgb()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rgb_close(actual: [f32; 3], expected: [f32; 3]) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1.0e-5, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn achromatic_and_primaries() {
        assert_rgb_close(hsl_to_rgb(0.37, 0.0, 0.42), [0.42, 0.42, 0.42]);
        assert_rgb_close(Hsl::new(0.0, 100.0, 50.0).to_rgb(), [1.0, 0.0, 0.0]);
        assert_rgb_close(Hsl::new(120.0, 100.0, 50.0).to_rgb(), [0.0, 1.0, 0.0]);
        assert_rgb_close(Hsl::new(240.0, 100.0, 50.0).to_rgb(), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn negative_hue_wraps_like_css() {
        assert_rgb_close(
            Hsl::new(-120.0, 100.0, 50.0).to_rgb(),
            Hsl::new(240.0, 100.0, 50.0).to_rgb(),
        );
    }

    #[test]
    fn out_of_range_saturation_and_lightness_clamp() {
        assert_rgb_close(Hsl::new(10.0, 250.0, 120.0).to_rgb(), [1.0, 1.0, 1.0]);
        assert_rgb_close(Hsl::new(10.0, -5.0, 50.0).to_rgb(), [0.5, 0.5, 0.5]);
    }

    #[test]
    fn palette_components_stay_in_unit_range() {
        for seed in [0.0313, 0.1441, 0.2987, 0.4242, 0.5555, 0.6106, 0.7777, 0.8383, 0.9119] {
            for color in create_palette(seed, 5) {
                for component in color {
                    assert!((0.0..=1.0).contains(&component), "seed {seed}: {color:?}");
                }
            }
        }
    }

    #[test]
    fn style_selection_is_stable() {
        // 0.05 lands in the cool/warm bucket.
        assert_eq!(palette_color(0.05, 1), cool_warm(0.05, 1));
        // 0.45 lands in the oil-paint bucket.
        assert_eq!(palette_color(0.45, 0), oil_paint(0.45, 0));
        // 0.95 lands in the rainbow bucket.
        assert_eq!(palette_color(0.95, 2), rainbow(0.95, 2));
    }
}
