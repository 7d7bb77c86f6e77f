//! Triangle handler

use crate::render::error::{RenderResult, RenderWarning};
use crate::render::gpu::GpuDevice;
use crate::render::renderer::Renderer;
use crate::render::vertex::Vertex;
use crate::scene::{GeometryKind, TriangleData};

impl<D: GpuDevice> Renderer<D> {
    /// Submit a single triangle
    pub fn submit_triangle(&mut self, data: &TriangleData) -> RenderResult<bool> {
        self.ensure_in_pass()?;
        let attributes = data.triangle_attributes.as_deref();
        let color = self.geometry_color(attributes);

        let corners = [
            Vertex::resolve(&data.vertices[0], None, &color),
            Vertex::resolve(&data.vertices[1], None, &color),
            Vertex::resolve(&data.vertices[2], None, &color),
        ];
        if !corners.iter().all(Vertex::is_finite) {
            self.warnings.post(RenderWarning::NonFiniteVertex { kind: GeometryKind::Triangle, skipped: 1 });
            return Ok(true);
        }

        let texture = self.geometry_texture(attributes);
        self.emit_resolved_triangle(corners, attributes.and_then(|a| a.normal), &color, texture);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::RendererConfig;
    use crate::foundation::math::{Point3, Vec3};
    use crate::render::error::RenderWarning;
    use crate::render::gpu::recording::RecordingDevice;
    use crate::render::renderer::Renderer;
    use crate::scene::{
        AttributeSet, Camera, ColorRgb, DrawContextData, InterpolationStyle, TriangleData, Vertex3D,
    };

    fn in_pass() -> Renderer<RecordingDevice> {
        let mut r = Renderer::new(RecordingDevice::new(), RendererConfig::default()).unwrap();
        r.start_frame(&DrawContextData::new(32, 32)).unwrap();
        let camera = Camera::perspective(Point3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        r.start_pass(&camera, &[]).unwrap();
        r
    }

    fn triangle(attributes: Option<AttributeSet>) -> TriangleData {
        TriangleData {
            vertices: [
                Vertex3D::new(Point3::new(0.0, 0.0, 0.0)),
                Vertex3D::new(Point3::new(1.0, 0.0, 0.0)),
                Vertex3D::new(Point3::new(0.0, 1.0, 0.0)),
            ],
            triangle_attributes: attributes.map(Arc::new),
        }
    }

    #[test]
    fn test_opaque_triangle_is_batched() {
        let mut r = in_pass();
        assert!(r.submit_triangle(&triangle(None)).unwrap());
        assert_eq!(r.queued_opaque_triangles(), 1);
        assert!(r.queued_transparent().is_empty());
        assert_eq!(r.stats().primitives, 1);
    }

    #[test]
    fn test_transparent_triangle_is_sorted_later() {
        let mut r = in_pass();
        let attributes = AttributeSet::new().with_transparency(ColorRgb::gray(0.5));
        r.submit_triangle(&triangle(Some(attributes))).unwrap();
        assert_eq!(r.queued_opaque_triangles(), 0);
        assert_eq!(r.queued_transparent().len(), 1);
    }

    #[test]
    fn test_flat_interpolation_uses_face_normal() {
        let mut r = in_pass();
        r.update_interpolation_style(InterpolationStyle::None);
        let mut data = triangle(None);
        data.vertices[0] = Vertex3D::with_attributes(Point3::origin(), AttributeSet::new().with_normal(Vec3::x()));
        r.submit_triangle(&data).unwrap();
        r.end_pass().unwrap();

        let triangles = r.device().rasterize();
        assert_eq!(triangles.len(), 1);
        for v in triangles[0].vertices {
            assert_eq!(v.normal, Vec3::z());
        }
    }

    #[test]
    fn test_nan_triangle_skipped_with_warning() {
        let mut r = in_pass();
        let mut data = triangle(None);
        data.vertices[1].point.x = f32::NAN;
        assert!(r.submit_triangle(&data).unwrap());
        assert_eq!(r.queued_opaque_triangles(), 0);
        assert!(matches!(r.warnings()[0], RenderWarning::NonFiniteVertex { skipped: 1, .. }));
    }
}
