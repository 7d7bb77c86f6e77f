//! Point handler

use crate::render::error::{RenderResult, RenderWarning};
use crate::render::gpu::{GpuDevice, Primitive};
use crate::render::renderer::Renderer;
use crate::render::vertex::Vertex;
use crate::scene::{GeometryKind, PointData};

impl<D: GpuDevice> Renderer<D> {
    /// Submit a point; points are never lit
    pub fn submit_point(&mut self, data: &PointData) -> RenderResult<bool> {
        self.ensure_in_pass()?;
        let color = self.geometry_color(data.point_attributes.as_deref());
        let vertex = Vertex::from_state(data.point, None, None, &color);
        if !vertex.is_finite() {
            self.warnings.post(RenderWarning::NonFiniteVertex { kind: GeometryKind::Point, skipped: 1 });
            return Ok(true);
        }
        self.emit_segments(Primitive::Points, &[vertex], &color, false);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::RendererConfig;
    use crate::foundation::math::Point3;
    use crate::render::error::RenderWarning;
    use crate::render::gpu::recording::RecordingDevice;
    use crate::render::gpu::{GpuCommand, Primitive};
    use crate::render::renderer::Renderer;
    use crate::scene::{Camera, DrawContextData, PointData};

    fn in_pass() -> Renderer<RecordingDevice> {
        let mut r = Renderer::new(RecordingDevice::new(), RendererConfig::default()).unwrap();
        r.start_frame(&DrawContextData::new(32, 32)).unwrap();
        let camera = Camera::perspective(Point3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        r.start_pass(&camera, &[]).unwrap();
        r
    }

    #[test]
    fn test_point_sets_size_and_draws() {
        let mut r = in_pass();
        r.update_line_width_style(3.0);
        r.submit_point(&PointData { point: Point3::new(0.5, 0.5, 0.0), point_attributes: None }).unwrap();

        let commands = r.device().commands();
        assert!(commands.contains(&GpuCommand::PointSize(3.0)));
        assert!(commands.iter().any(|c| matches!(c, GpuCommand::DrawVertices { primitive: Primitive::Points, .. })));
        assert_eq!(r.stats().primitives, 1);
    }

    #[test]
    fn test_infinite_point_skipped() {
        let mut r = in_pass();
        r.submit_point(&PointData { point: Point3::new(f32::INFINITY, 0.0, 0.0), point_attributes: None }).unwrap();
        assert_eq!(r.device().draw_count(), 0);
        assert!(matches!(r.warnings()[0], RenderWarning::NonFiniteVertex { .. }));
    }
}
