//! Renderer vertices and attribute resolution
//!
//! Each color channel of a vertex is resolved independently by taking the
//! first value found along the chain
//!
//! `vertex set → face set → geometry set → view state → white, opaque`
//!
//! The geometry and view levels are already folded into a [`ColorState`]
//! when a handler starts, so resolving a vertex only overlays the face and
//! vertex sets on top of it.

use super::gpu::GpuVertex;
use super::matrix::MatrixState;
use super::state::ColorState;
use crate::foundation::math::{utils, Point3, Vec2, Vec3};
use crate::scene::{AttributeSet, ColorRgb, OrientationStyle, Vertex3D};

/// A vertex with every channel resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Local-space position
    pub point: Point3,
    /// Local-space normal, if one was supplied
    pub normal: Option<Vec3>,
    /// Texture coordinate
    pub uv: Option<Vec2>,
    /// Diffuse color
    pub diffuse: ColorRgb,
    /// Opacity
    pub alpha: f32,
    /// Emissive color
    pub emissive: ColorRgb,
}

/// Overlay attribute sets on a base state, most specific set first
pub fn resolve_color(chain: &[Option<&AttributeSet>], base: &ColorState) -> ColorState {
    chain.iter().rev().fold(*base, |state, set| state.with_overrides(*set))
}

impl Vertex {
    /// Vertex with colors taken from a resolved state
    pub fn from_state(point: Point3, normal: Option<Vec3>, uv: Option<Vec2>, color: &ColorState) -> Self {
        Self {
            point,
            normal,
            uv,
            diffuse: color.diffuse,
            alpha: color.alpha(),
            emissive: color.emissive,
        }
    }

    /// Resolve a scene vertex
    ///
    /// # Arguments
    /// * `vertex` - Scene vertex with optional attributes
    /// * `face` - Attributes of the face or segment the vertex belongs to
    /// * `geometry` - Geometry-level state, view defaults already applied
    pub fn resolve(vertex: &Vertex3D, face: Option<&AttributeSet>, geometry: &ColorState) -> Self {
        let attributes = vertex.attributes.as_ref();
        let color = resolve_color(&[attributes, face], geometry);
        let normal = attributes.and_then(|a| a.normal).or_else(|| face.and_then(|f| f.normal));
        let uv = attributes.and_then(|a| a.surface_uv);
        Self::from_state(vertex.point, normal, uv, &color)
    }

    /// True if position and colors are finite
    pub fn is_finite(&self) -> bool {
        utils::is_finite_point(&self.point)
            && self.normal.map_or(true, |n| n.iter().all(|c| c.is_finite()))
            && self.diffuse.is_finite()
            && self.emissive.is_finite()
            && self.alpha.is_finite()
    }

    /// True if the vertex needs no blending
    pub fn is_opaque(&self) -> bool {
        self.alpha >= 1.0
    }

    fn color(&self) -> [f32; 4] {
        [self.diffuse.r, self.diffuse.g, self.diffuse.b, self.alpha]
    }

    /// GPU vertex in local space
    pub fn to_local_gpu(&self, fallback_normal: Vec3) -> GpuVertex {
        GpuVertex {
            position: self.point.coords.into(),
            normal: self.normal.unwrap_or(fallback_normal).into(),
            uv: self.uv.map_or([0.0; 2], Into::into),
            color: self.color(),
            emissive: self.emissive.to_array(),
        }
    }

    /// GPU vertex in camera space, for buffered drawing
    pub fn to_camera_gpu(&self, matrices: &MatrixState, fallback_normal: Vec3) -> GpuVertex {
        let normal = matrices.normal_to_camera(&self.normal.unwrap_or(fallback_normal));
        GpuVertex {
            position: matrices.point_to_camera(&self.point).coords.into(),
            normal: normal.into(),
            ..self.to_local_gpu(fallback_normal)
        }
    }
}

/// Face normal of a triangle under the given orientation style
///
/// Returns `None` for degenerate triangles.
pub fn flat_normal(a: &Point3, b: &Point3, c: &Point3, orientation: OrientationStyle) -> Option<Vec3> {
    let n = (b - a).cross(&(c - a)).try_normalize(f32::EPSILON)?;
    Some(match orientation {
        OrientationStyle::CounterClockwise => n,
        OrientationStyle::Clockwise => -n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use approx::assert_relative_eq;

    #[test]
    fn test_face_color_beats_geometry_and_view() {
        let view = ColorState { diffuse: ColorRgb::new(0.0, 0.0, 1.0), ..ColorState::default() };
        let face = AttributeSet::new().with_diffuse(ColorRgb::new(1.0, 0.0, 0.0));
        let vertex = Vertex3D::new(Point3::origin());

        let resolved = Vertex::resolve(&vertex, Some(&face), &view);
        assert_eq!(resolved.diffuse, ColorRgb::new(1.0, 0.0, 0.0));
        assert_eq!(resolved.alpha, 1.0);
    }

    #[test]
    fn test_vertex_level_wins_per_channel() {
        let geometry = ColorState { transparency: ColorRgb::gray(0.5), ..ColorState::default() };
        let face = AttributeSet::new()
            .with_diffuse(ColorRgb::new(1.0, 0.0, 0.0))
            .with_emissive(ColorRgb::new(0.0, 0.2, 0.0));
        let vertex = Vertex3D::with_attributes(
            Point3::origin(),
            AttributeSet::new().with_diffuse(ColorRgb::new(0.0, 1.0, 0.0)).with_normal(Vec3::z()),
        );

        let resolved = Vertex::resolve(&vertex, Some(&face), &geometry);
        assert_eq!(resolved.diffuse, ColorRgb::new(0.0, 1.0, 0.0));
        assert_eq!(resolved.emissive, ColorRgb::new(0.0, 0.2, 0.0));
        assert_relative_eq!(resolved.alpha, 0.5);
        assert_eq!(resolved.normal, Some(Vec3::z()));
        assert!(!resolved.is_opaque());
    }

    #[test]
    fn test_flat_normal_respects_orientation() {
        let (a, b, c) = (Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0));
        assert_eq!(flat_normal(&a, &b, &c, OrientationStyle::CounterClockwise), Some(Vec3::z()));
        assert_eq!(flat_normal(&a, &b, &c, OrientationStyle::Clockwise), Some(-Vec3::z()));
        assert_eq!(flat_normal(&a, &a, &c, OrientationStyle::CounterClockwise), None);
    }

    #[test]
    fn test_camera_space_conversion() {
        let mut matrices = MatrixState::new();
        matrices.set_local_to_camera(Mat4::new_translation(&Vec3::new(0.0, 0.0, -3.0)));
        let vertex = Vertex::from_state(Point3::new(1.0, 0.0, 0.0), None, None, &ColorState::default());

        let gpu = vertex.to_camera_gpu(&matrices, Vec3::z());
        assert_eq!(gpu.position, [1.0, 0.0, -3.0]);
        assert_eq!(gpu.normal, [0.0, 0.0, 1.0]);
        assert_eq!(gpu.color, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_non_finite_vertex_detected() {
        let vertex = Vertex::from_state(Point3::new(f32::NAN, 0.0, 0.0), None, None, &ColorState::default());
        assert!(!vertex.is_finite());
    }
}
