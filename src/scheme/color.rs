//! Colors for classification codes
//!
//! Top-level codes each own a hue from a distinguishable palette; descendants
//! reuse the hue with an alpha that grows with their position in the subtree.

use serde::{Deserialize, Serialize};

/// An RGBA color. Channels are 0-255, alpha is 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from RGB channels
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Same hue, different alpha (clamped to 0.0-1.0)
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: alpha.clamp(0.0, 1.0),
            ..self
        }
    }

    /// True if both colors share the same RGB channels, regardless of alpha
    pub fn same_hue(&self, other: &Rgba) -> bool {
        self.r == other.r && self.g == other.g && self.b == other.b
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::new(255, 255, 255, 1.0)
    }
}

impl std::fmt::Display for Rgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgba({},{},{},{:.3})", self.r, self.g, self.b, self.a)
    }
}

/// Alpha bounds used when ramping a subtree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSettings {
    pub min_alpha: f32,
    pub max_alpha: f32,
}

impl ColorSettings {
    pub fn new(min_alpha: f32, max_alpha: f32) -> Self {
        let min_alpha = min_alpha.clamp(0.0, 1.0);
        let max_alpha = max_alpha.clamp(min_alpha, 1.0);
        Self { min_alpha, max_alpha }
    }

    /// Alpha of the descendant at `position` (0-based) among `total` descendants
    pub fn ramp(&self, position: usize, total: usize) -> f32 {
        if total == 0 {
            return self.min_alpha;
        }
        let step = (self.max_alpha - self.min_alpha) / total as f32;
        (self.min_alpha + step * (position + 1) as f32).min(self.max_alpha)
    }
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self::new(0.5, 1.0)
    }
}

/// Source of pairwise distinguishable colors.
pub trait Palette: Send + Sync + std::fmt::Debug {
    /// Return `n` colors that are visually distinguishable from each other
    fn distinguishable_colors(&self, n: usize) -> Vec<Rgba>;
}

/// Spaces `n` hues evenly around the HSL wheel at fixed saturation/lightness.
#[derive(Debug, Clone, Copy)]
pub struct HuePalette {
    saturation: f32,
    lightness: f32,
}

impl HuePalette {
    pub fn new() -> Self {
        Self {
            saturation: 0.75,
            lightness: 0.55,
        }
    }
}

impl Default for HuePalette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette for HuePalette {
    fn distinguishable_colors(&self, n: usize) -> Vec<Rgba> {
        (0..n)
            .map(|i| {
                let hue = 360.0 * i as f32 / n as f32;
                hsl_to_rgb(hue, self.saturation, self.lightness)
            })
            .collect()
    }
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> Rgba {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = hue / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let channel = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba::rgb(channel(r), channel(g), channel(b))
}
