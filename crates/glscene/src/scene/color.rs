//! RGB colors with components in [0, 1]

use serde::{Deserialize, Serialize};

/// Linear RGB color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRgb {
    /// Red component
    pub r: f32,
    /// Green component
    pub g: f32,
    /// Blue component
    pub b: f32,
}

impl ColorRgb {
    /// Opaque white, the engine's fallback diffuse color
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);
    /// Black, the fallback emissive color
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);

    /// Create a color from components
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Create a gray color
    pub const fn gray(value: f32) -> Self {
        Self::new(value, value, value)
    }

    /// Alpha implied by a transparency color
    ///
    /// Transparency colors store per-channel opacity; white means fully
    /// opaque. The alpha used for blending is the channel average.
    pub fn transparency_alpha(&self) -> f32 {
        (self.r + self.g + self.b) / 3.0
    }

    /// True if every channel is a finite number
    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite()
    }

    /// True if the color is black (no emission)
    pub fn is_black(&self) -> bool {
        self.r <= 0.0 && self.g <= 0.0 && self.b <= 0.0
    }

    /// Component-wise scale
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    /// Component array for GPU upload
    pub const fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for ColorRgb {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 3]> for ColorRgb {
    fn from(c: [f32; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_transparency_is_opaque() {
        assert_eq!(ColorRgb::WHITE.transparency_alpha(), 1.0);
        assert_eq!(ColorRgb::gray(0.5).transparency_alpha(), 0.5);
    }

    #[test]
    fn test_black_detection() {
        assert!(ColorRgb::BLACK.is_black());
        assert!(!ColorRgb::new(0.0, 0.1, 0.0).is_black());
    }
}
