//! PolyLine handler
//!
//! Without segment attributes the whole polyline is one strip. With them,
//! each segment resolves its ends against its own attribute set and the
//! polyline is drawn as independent segments.

use crate::render::error::{RenderResult, RenderWarning};
use crate::render::gpu::{GpuDevice, Primitive};
use crate::render::renderer::Renderer;
use crate::render::vertex::Vertex;
use crate::scene::{GeometryKind, PolyLineData};

impl<D: GpuDevice> Renderer<D> {
    /// Submit a polyline
    pub fn submit_poly_line(&mut self, data: &PolyLineData) -> RenderResult<bool> {
        self.ensure_in_pass()?;
        if data.vertices.len() < 2 {
            self.warnings.post(RenderWarning::DegenerateGeometry { kind: GeometryKind::PolyLine });
            return Ok(true);
        }

        let color = self.geometry_color(data.poly_line_attributes.as_deref());
        let segments = data.vertices.len() - 1;
        let segment_attributes = match &data.segment_attributes {
            Some(sets) if sets.len() == segments => Some(sets.as_slice()),
            Some(sets) => {
                self.warnings.post(RenderWarning::SegmentAttributeMismatch { segments, actual: sets.len() });
                None
            }
            None => None,
        };

        let (primitive, vertices): (Primitive, Vec<Vertex>) = match segment_attributes {
            None => (
                Primitive::LineStrip,
                data.vertices.iter().map(|v| Vertex::resolve(v, None, &color)).collect(),
            ),
            Some(sets) => (
                Primitive::Lines,
                data.vertices
                    .windows(2)
                    .zip(sets)
                    .flat_map(|(ends, set)| ends.iter().map(move |v| (v, set)))
                    .map(|(v, set)| Vertex::resolve(v, Some(set), &color))
                    .collect(),
            ),
        };

        if !vertices.iter().all(Vertex::is_finite) {
            self.warnings.post(RenderWarning::NonFiniteVertex { kind: GeometryKind::PolyLine, skipped: segments });
            return Ok(true);
        }
        let lit = vertices.iter().all(|v| v.normal.is_some());
        self.emit_segments(primitive, &vertices, &color, lit);
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
    use crate::scene::{AttributeSet, Camera, ColorRgb, DrawContextData, PolyLineData, Vertex3D};

    fn in_pass() -> Renderer<RecordingDevice> {
        let mut r = Renderer::new(RecordingDevice::new(), RendererConfig::default()).unwrap();
        r.start_frame(&DrawContextData::new(32, 32)).unwrap();
        let camera = Camera::perspective(Point3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        r.start_pass(&camera, &[]).unwrap();
        r
    }

    fn zigzag(n: usize) -> Vec<Vertex3D> {
        (0..n).map(|i| Vertex3D::new(Point3::new(i as f32, (i % 2) as f32, 0.0))).collect()
    }

    fn drawn(r: &Renderer<RecordingDevice>) -> Vec<(Primitive, usize)> {
        r.device()
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::DrawVertices { primitive, vertices } => Some((*primitive, vertices.len())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_plain_polyline_is_one_strip() {
        let mut r = in_pass();
        let data = PolyLineData { vertices: zigzag(4), segment_attributes: None, poly_line_attributes: None };
        r.submit_poly_line(&data).unwrap();
        assert_eq!(drawn(&r), vec![(Primitive::LineStrip, 4)]);
        assert_eq!(r.stats().primitives, 3);
    }

    #[test]
    fn test_segment_colors_split_into_lines() {
        let mut r = in_pass();
        let red = AttributeSet::new().with_diffuse(ColorRgb::new(1.0, 0.0, 0.0));
        let blue = AttributeSet::new().with_diffuse(ColorRgb::new(0.0, 0.0, 1.0));
        let data = PolyLineData {
            vertices: zigzag(3),
            segment_attributes: Some(vec![red, blue]),
            poly_line_attributes: None,
        };
        r.submit_poly_line(&data).unwrap();

        assert_eq!(drawn(&r), vec![(Primitive::Lines, 4)]);
        let colors: Vec<[f32; 4]> = r
            .device()
            .commands()
            .iter()
            .find_map(|c| match c {
                GpuCommand::DrawVertices { vertices, .. } => Some(vertices.iter().map(|v| v.color).collect()),
                _ => None,
            })
            .unwrap();
        assert_eq!(colors[1], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(colors[2], [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mismatched_segment_attributes_ignored() {
        let mut r = in_pass();
        let data = PolyLineData {
            vertices: zigzag(4),
            segment_attributes: Some(vec![AttributeSet::new()]),
            poly_line_attributes: None,
        };
        r.submit_poly_line(&data).unwrap();
        assert_eq!(drawn(&r), vec![(Primitive::LineStrip, 4)]);
        assert!(matches!(
            r.warnings()[0],
            RenderWarning::SegmentAttributeMismatch { segments: 3, actual: 1 }
        ));
    }

    #[test]
    fn test_single_vertex_polyline_is_degenerate() {
        let mut r = in_pass();
        let data = PolyLineData { vertices: zigzag(1), segment_attributes: None, poly_line_attributes: None };
        assert!(r.submit_poly_line(&data).unwrap());
        assert_eq!(r.device().draw_count(), 0);
        assert!(matches!(r.warnings()[0], RenderWarning::DegenerateGeometry { .. }));
    }
}
