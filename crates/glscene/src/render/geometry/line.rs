//! Line handler

use crate::render::error::{RenderResult, RenderWarning};
use crate::render::gpu::{GpuDevice, Primitive};
use crate::render::renderer::Renderer;
use crate::render::vertex::Vertex;
use crate::scene::{GeometryKind, LineData};

impl<D: GpuDevice> Renderer<D> {
    /// Submit a line segment
    ///
    /// The line is lit only when both ends carry a normal.
    pub fn submit_line(&mut self, data: &LineData) -> RenderResult<bool> {
        self.ensure_in_pass()?;
        let color = self.geometry_color(data.line_attributes.as_deref());
        let ends = [
            Vertex::resolve(&data.vertices[0], None, &color),
            Vertex::resolve(&data.vertices[1], None, &color),
        ];
        if !ends.iter().all(Vertex::is_finite) {
            self.warnings.post(RenderWarning::NonFiniteVertex { kind: GeometryKind::Line, skipped: 1 });
            return Ok(true);
        }

        let lit = ends.iter().all(|v| v.normal.is_some());
        self.emit_segments(Primitive::Lines, &ends, &color, lit);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::RendererConfig;
    use crate::foundation::math::{Point3, Vec3};
    use crate::render::gpu::recording::RecordingDevice;
    use crate::render::gpu::{GpuCommand, Primitive, ShaderProgram};
    use crate::render::renderer::Renderer;
    use crate::scene::{AttributeSet, Camera, ColorRgb, DrawContextData, Illumination, LineData, Vertex3D};

    fn in_pass() -> Renderer<RecordingDevice> {
        let mut r = Renderer::new(RecordingDevice::new(), RendererConfig::default()).unwrap();
        r.start_frame(&DrawContextData::new(32, 32)).unwrap();
        let camera = Camera::perspective(Point3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        r.start_pass(&camera, &[]).unwrap();
        r
    }

    fn programs(r: &Renderer<RecordingDevice>) -> Vec<ShaderProgram> {
        r.device()
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::UseProgram(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_opaque_line_draws_immediately_unlit() {
        let mut r = in_pass();
        let line = LineData {
            vertices: [Vertex3D::new(Point3::origin()), Vertex3D::new(Point3::new(1.0, 0.0, 0.0))],
            line_attributes: Some(Arc::new(AttributeSet::new().with_diffuse(ColorRgb::new(1.0, 0.0, 0.0)))),
        };
        r.submit_line(&line).unwrap();

        let drawn = r.device().commands().iter().find_map(|c| match c {
            GpuCommand::DrawVertices { primitive: Primitive::Lines, vertices } => Some(vertices.clone()),
            _ => None,
        });
        let vertices = drawn.unwrap();
        assert_eq!(vertices[1].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(programs(&r).last().unwrap().illumination, Illumination::Nil);
    }

    #[test]
    fn test_line_with_normals_is_lit() {
        let mut r = in_pass();
        let with_normal = |p| Vertex3D::with_attributes(p, AttributeSet::new().with_normal(Vec3::y()));
        let line = LineData {
            vertices: [with_normal(Point3::origin()), with_normal(Point3::new(1.0, 0.0, 0.0))],
            line_attributes: None,
        };
        r.submit_line(&line).unwrap();
        assert_eq!(programs(&r).last().unwrap().illumination, Illumination::Phong);
    }

    #[test]
    fn test_transparent_line_is_queued() {
        let mut r = in_pass();
        let line = LineData {
            vertices: [Vertex3D::new(Point3::origin()), Vertex3D::new(Point3::new(0.0, 0.0, -2.0))],
            line_attributes: Some(Arc::new(AttributeSet::new().with_transparency(ColorRgb::gray(0.25)))),
        };
        r.submit_line(&line).unwrap();
        assert_eq!(r.device().draw_count(), 0);
        assert_eq!(r.queued_transparent().len(), 1);
        assert_eq!(r.queued_transparent()[0].primitive, Primitive::Lines);
    }
}
