//! Attribute sets
//!
//! An [`AttributeSet`] carries optional values for each shading channel.
//! Sets appear at several levels (vertex, face, geometry, view) and every
//! channel is resolved independently: a geometry may set its own diffuse
//! color while inheriting transparency from the view.

use std::sync::Arc;

use super::color::ColorRgb;
use super::texture::TextureImage;
use crate::foundation::math::{Vec2, Vec3};

/// How texture coordinates outside [0, 1] are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UvBoundary {
    /// Repeat the texture
    #[default]
    Wrap,
    /// Clamp to the edge texels
    Clamp,
}

/// Texture-mapping surface shader
#[derive(Debug, Clone)]
pub struct TextureShader {
    /// Image to map onto the surface
    pub texture: Arc<TextureImage>,
    /// Horizontal boundary mode
    pub u_boundary: UvBoundary,
    /// Vertical boundary mode
    pub v_boundary: UvBoundary,
}

impl TextureShader {
    /// Wrap-mode shader for an image
    pub fn new(texture: Arc<TextureImage>) -> Self {
        Self {
            texture,
            u_boundary: UvBoundary::Wrap,
            v_boundary: UvBoundary::Wrap,
        }
    }
}

impl PartialEq for TextureShader {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.texture, &other.texture)
            && self.u_boundary == other.u_boundary
            && self.v_boundary == other.v_boundary
    }
}

/// Illumination model selected by an illumination shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Illumination {
    /// Unlit: the diffuse color is the final color
    Nil,
    /// Diffuse-only lighting
    Lambert,
    /// Diffuse plus specular highlights
    #[default]
    Phong,
}

/// Optional per-channel attribute values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    /// Diffuse color
    pub diffuse_color: Option<ColorRgb>,
    /// Specular color
    pub specular_color: Option<ColorRgb>,
    /// Transparency color (white = opaque)
    pub transparency_color: Option<ColorRgb>,
    /// Emissive color
    pub emissive_color: Option<ColorRgb>,
    /// Specular exponent
    pub specular_control: Option<f32>,
    /// Metallic factor in [0, 1]
    pub metallic: Option<f32>,
    /// Whether the highlight style applies
    pub highlight_state: Option<bool>,
    /// Surface normal
    pub normal: Option<Vec3>,
    /// Texture coordinate
    pub surface_uv: Option<Vec2>,
    /// Texture shader
    pub surface_shader: Option<TextureShader>,
}

impl AttributeSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the diffuse color
    pub fn with_diffuse(mut self, color: ColorRgb) -> Self {
        self.diffuse_color = Some(color);
        self
    }

    /// Builder: set the transparency color
    pub fn with_transparency(mut self, color: ColorRgb) -> Self {
        self.transparency_color = Some(color);
        self
    }

    /// Builder: set the emissive color
    pub fn with_emissive(mut self, color: ColorRgb) -> Self {
        self.emissive_color = Some(color);
        self
    }

    /// Builder: set the specular color
    pub fn with_specular(mut self, color: ColorRgb) -> Self {
        self.specular_color = Some(color);
        self
    }

    /// Builder: set the normal
    pub fn with_normal(mut self, normal: Vec3) -> Self {
        self.normal = Some(normal);
        self
    }

    /// Builder: set the texture coordinate
    pub fn with_uv(mut self, uv: Vec2) -> Self {
        self.surface_uv = Some(uv);
        self
    }

    /// Builder: set the highlight state
    pub fn with_highlight(mut self, on: bool) -> Self {
        self.highlight_state = Some(on);
        self
    }

    /// Builder: set the texture shader
    pub fn with_surface_shader(mut self, shader: TextureShader) -> Self {
        self.surface_shader = Some(shader);
        self
    }

    /// True if no channel is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Channels of `self` win; unset channels are taken from `base`
    pub fn overlay(&self, base: &Self) -> Self {
        Self {
            diffuse_color: self.diffuse_color.or(base.diffuse_color),
            specular_color: self.specular_color.or(base.specular_color),
            transparency_color: self.transparency_color.or(base.transparency_color),
            emissive_color: self.emissive_color.or(base.emissive_color),
            specular_control: self.specular_control.or(base.specular_control),
            metallic: self.metallic.or(base.metallic),
            highlight_state: self.highlight_state.or(base.highlight_state),
            normal: self.normal.or(base.normal),
            surface_uv: self.surface_uv.or(base.surface_uv),
            surface_shader: self.surface_shader.clone().or_else(|| base.surface_shader.clone()),
        }
    }

    /// Overlay where either side may be missing
    pub fn overlay_opt(top: Option<&Self>, base: Option<&Self>) -> Option<Self> {
        match (top, base) {
            (Some(t), Some(b)) => Some(t.overlay(b)),
            (Some(t), None) => Some(t.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_resolves_channels_independently() {
        let geometry = AttributeSet::new().with_diffuse(ColorRgb::new(1.0, 0.0, 0.0));
        let view = AttributeSet::new()
            .with_diffuse(ColorRgb::new(0.0, 1.0, 0.0))
            .with_transparency(ColorRgb::gray(0.5));

        let resolved = geometry.overlay(&view);
        assert_eq!(resolved.diffuse_color, Some(ColorRgb::new(1.0, 0.0, 0.0)));
        assert_eq!(resolved.transparency_color, Some(ColorRgb::gray(0.5)));
    }

    #[test]
    fn test_overlay_opt_handles_missing_sides() {
        let set = AttributeSet::new().with_highlight(true);
        assert_eq!(AttributeSet::overlay_opt(None, Some(&set)), Some(set.clone()));
        assert_eq!(AttributeSet::overlay_opt(Some(&set), None), Some(set));
        assert_eq!(AttributeSet::overlay_opt(None, None), None);
    }

    #[test]
    fn test_empty_set() {
        assert!(AttributeSet::new().is_empty());
        assert!(!AttributeSet::new().with_normal(Vec3::z()).is_empty());
    }
}
