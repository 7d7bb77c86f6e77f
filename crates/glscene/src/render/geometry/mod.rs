//! # Geometry Submission
//!
//! One handler per geometry kind the renderer draws natively. Dispatch is a
//! closed match over [`Geometry`]; kinds without a handler (Polygon, Box,
//! Cylinder) are declined so the view can decompose them into TriMesh parts
//! and submit those instead.
//!
//! Every handler resolves colors through the chain
//! `vertex → face → geometry → view → white` and routes each primitive to
//! the opaque batch buffer, the transparent sorter, or an immediate draw.
//! Per-primitive problems are posted as warnings and never fail the pass.

mod line;
mod point;
mod polyline;
mod triangle;
pub mod trimesh;

pub use trimesh::{find_tri_mesh_data, SlowPathMask};

use super::error::RenderResult;
use super::gpu::{GpuDevice, TextureBinding};
use super::renderer::Renderer;
use super::state::ColorState;
use super::vbo_cache::CacheKey;
use super::vertex::{flat_normal, Vertex};
use crate::foundation::math::Vec3;
use crate::scene::{DecomposedPart, Geometry, GeometryObject, InterpolationStyle};

impl<D: GpuDevice> Renderer<D> {
    /// Submit a geometry object
    ///
    /// # Returns
    /// `Ok(true)` if the renderer drew (or deliberately skipped) the
    /// geometry, `Ok(false)` if it has no handler for the kind and the
    /// caller should decompose it.
    pub fn submit_geometry(&mut self, object: &GeometryObject) -> RenderResult<bool> {
        self.ensure_in_pass()?;
        match object.geometry() {
            Geometry::Triangle(data) => self.submit_triangle(data),
            Geometry::Line(data) => self.submit_line(data),
            Geometry::Point(data) => self.submit_point(data),
            Geometry::PolyLine(data) => self.submit_poly_line(data),
            Geometry::TriMesh(data) => self.submit_tri_mesh(CacheKey::whole(object.id()), object.edit_index(), data),
            Geometry::Polygon(_) | Geometry::Box(_) | Geometry::Cylinder(_) => {
                log::trace!("No handler for {:?} {:?}", object.geometry().kind(), object.id());
                Ok(false)
            }
        }
    }

    /// Submit one TriMesh part of a decomposed geometry
    ///
    /// The part is cached under the parent's identity and edit index, so
    /// editing the parent invalidates every part.
    pub fn submit_decomposed(&mut self, parent: &GeometryObject, part: &DecomposedPart) -> RenderResult<bool> {
        let key = CacheKey { object: parent.id(), part: part.part };
        self.submit_tri_mesh(key, parent.edit_index(), &part.mesh)
    }

    /// Queue a resolved local-space triangle
    ///
    /// Vertices without a normal get the face normal, or the computed flat
    /// normal. Flat interpolation replaces every vertex normal.
    pub(super) fn emit_resolved_triangle(
        &mut self,
        corners: [Vertex; 3],
        face_normal: Option<Vec3>,
        color: &ColorState,
        texture: Option<TextureBinding>,
    ) {
        let [a, b, c] = &corners;
        let flat = face_normal.or_else(|| flat_normal(&a.point, &b.point, &c.point, self.style.orientation));
        let fallback = flat.unwrap_or_else(Vec3::z);
        let corners = if self.style.interpolation == InterpolationStyle::None {
            corners.map(|v| Vertex { normal: Some(fallback), ..v })
        } else {
            corners
        };

        let program = self.program(true, texture.is_some(), true);
        let key = self.state_key(program, texture, color, false);
        let opaque = corners.iter().all(Vertex::is_opaque);
        let camera = corners.map(|v| v.to_camera_gpu(&self.matrices, fallback));
        self.emit_triangle(key, camera, opaque);
    }
}
