//! Rendering styles
//!
//! Styles are scoped state set by style nodes during traversal. The view
//! restores the previous value when the enclosing group ends.

use super::color::ColorRgb;

/// Shading interpolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpolationStyle {
    /// Flat shading, one normal per face
    None,
    /// Lighting computed per vertex and interpolated
    #[default]
    Vertex,
    /// Lighting computed per fragment
    Pixel,
}

/// Treatment of faces pointing away from the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackfacingStyle {
    /// Draw both sides
    #[default]
    Both,
    /// Cull back faces
    RemoveBack,
    /// Cull front faces
    RemoveFront,
    /// Draw both sides, lighting back faces with flipped normals
    Flip,
}

/// How filled primitives are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillStyle {
    /// Solid faces
    #[default]
    Filled,
    /// Outlines only
    Edges,
    /// Vertices only
    Points,
}

/// Winding that marks a front face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrientationStyle {
    /// Counter-clockwise faces are front faces
    #[default]
    CounterClockwise,
    /// Clockwise faces are front faces
    Clockwise,
}

/// Fog density function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FogMode {
    /// Linear ramp between start and end distances
    #[default]
    Linear,
    /// `exp(-density * d)`
    Exponential,
    /// `exp(-(density * d)²)`
    ExponentialSquared,
}

/// Fog settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogStyleData {
    /// Whether fog is enabled
    pub state: bool,
    /// Density function
    pub mode: FogMode,
    /// Start distance of linear fog
    pub fog_start: f32,
    /// End distance of linear fog
    pub fog_end: f32,
    /// Density for the exponential modes
    pub density: f32,
    /// Fog color
    pub color: ColorRgb,
}

impl FogStyleData {
    /// Fog turned off
    pub const OFF: Self = Self {
        state: false,
        mode: FogMode::Linear,
        fog_start: 0.0,
        fog_end: 1.0,
        density: 0.0,
        color: ColorRgb::BLACK,
    };
}

impl Default for FogStyleData {
    fn default() -> Self {
        Self::OFF
    }
}

/// Which primitives anti-aliasing applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AntiAliasMode {
    /// Lines and edges
    #[default]
    Edges,
    /// Filled primitives
    Filled,
    /// Both
    All,
}

/// Anti-aliasing settings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AntiAliasStyleData {
    /// Whether anti-aliasing is requested
    pub state: bool,
    /// Primitives it applies to
    pub mode: AntiAliasMode,
    /// Requested quality in [0, 1]
    pub quality: f32,
}
