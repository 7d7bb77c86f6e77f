//! # TriMesh Handler
//!
//! A TriMesh is validated once per submission and classified by a
//! [`SlowPathMask`]. An empty mask means the mesh can be drawn straight
//! from a cached vertex buffer in local space, with the geometry color
//! supplied as material uniforms. Any set bit sends it down the slow path,
//! which resolves every face corner in software and feeds camera-space
//! triangles to the opaque and transparent buffers.
//!
//! Both paths produce the same fragments for meshes the fast path accepts.
//! Flat interpolation always takes the slow path, which gives every corner
//! of a face the same normal.

use bitflags::bitflags;

use crate::foundation::math::utils;
use crate::render::error::{RenderResult, RenderWarning};
use crate::render::gpu::{GpuCommand, GpuDevice, GpuVertex, Primitive, TextureBinding};
use crate::render::renderer::Renderer;
use crate::render::state::ColorState;
use crate::render::vbo_cache::CacheKey;
use crate::render::vertex::{resolve_color, Vertex};
use crate::scene::{AttributeSet, ColorRgb, GeometryKind, InterpolationStyle, ObjectId, TriMeshData};

bitflags! {
    /// Fast-path assumptions a TriMesh violates
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SlowPathMask: u32 {
        /// Some vertex has no normal
        const NO_VERTEX_NORMALS = 1 << 0;
        /// Faces carry their own diffuse colors
        const FACE_COLORS = 1 << 1;
        /// The mesh or some of its vertices or faces are not opaque
        const TRANSPARENCY = 1 << 2;
        /// Vertices or faces carry their own emissive colors
        const EMISSIVE_COLOR = 1 << 3;
        /// Faces carry their own textures
        const FACE_TEXTURES = 1 << 4;
        /// Flat interpolation is active, so faces need one shared normal
        const FLAT_INTERPOLATION = 1 << 5;
    }
}

impl SlowPathMask {
    /// No violations
    pub const FAST_PATH: Self = Self::empty();

    /// True if the mesh can use the cached-buffer path
    pub fn is_fast_path(self) -> bool {
        self == Self::FAST_PATH
    }
}

fn any_translucent(colors: Option<&Vec<ColorRgb>>) -> bool {
    colors.is_some_and(|v| v.iter().any(|c| c.transparency_alpha() < 1.0))
}

fn check_len<T>(
    object: ObjectId,
    array: &'static str,
    values: Option<&Vec<T>>,
    expected: usize,
) -> Result<(), RenderWarning> {
    match values {
        Some(v) if v.len() != expected => Err(RenderWarning::MalformedAttributeArray {
            object,
            array,
            expected,
            actual: v.len(),
        }),
        _ => Ok(()),
    }
}

/// Validate a mesh and compute its slow-path mask
///
/// Only the mesh data is inspected here. Style-dependent bits such as
/// [`SlowPathMask::FLAT_INTERPOLATION`] are added by the renderer.
///
/// # Arguments
/// * `data` - Mesh to classify
/// * `object` - Identity reported in warnings
/// * `color` - Geometry-level color state, for mesh-wide transparency
///
/// # Returns
/// The mask, or the warning describing why the mesh cannot be drawn.
pub fn find_tri_mesh_data(
    data: &TriMeshData,
    object: ObjectId,
    color: &ColorState,
) -> Result<SlowPathMask, RenderWarning> {
    let point_count = data.points.len();
    let face_count = data.triangles.len();

    let bad_index = data
        .triangles
        .iter()
        .flatten()
        .chain(data.edges.iter().flat_map(|e| e.points.iter()))
        .find(|&&i| i as usize >= point_count);
    if let Some(&index) = bad_index {
        return Err(RenderWarning::InvalidTriMeshIndex { object, index, point_count });
    }

    check_len(object, "vertex_normals", data.vertex_normals.as_ref(), point_count)?;
    check_len(object, "vertex_uvs", data.vertex_uvs.as_ref(), point_count)?;
    check_len(object, "vertex_colors", data.vertex_colors.as_ref(), point_count)?;
    check_len(object, "vertex_transparency", data.vertex_transparency.as_ref(), point_count)?;
    check_len(object, "vertex_emissive", data.vertex_emissive.as_ref(), point_count)?;
    check_len(object, "face_normals", data.face_normals.as_ref(), face_count)?;
    check_len(object, "face_colors", data.face_colors.as_ref(), face_count)?;
    check_len(object, "face_transparency", data.face_transparency.as_ref(), face_count)?;
    check_len(object, "face_emissive", data.face_emissive.as_ref(), face_count)?;
    check_len(object, "face_surface_shaders", data.face_surface_shaders.as_ref(), face_count)?;
    check_len(object, "edge_colors", data.edge_colors.as_ref(), data.edges.len())?;

    let mut mask = SlowPathMask::FAST_PATH;
    if data.vertex_normals.is_none() {
        mask |= SlowPathMask::NO_VERTEX_NORMALS;
    }
    if data.face_colors.is_some() {
        mask |= SlowPathMask::FACE_COLORS;
    }
    if !color.is_opaque()
        || any_translucent(data.vertex_transparency.as_ref())
        || any_translucent(data.face_transparency.as_ref())
    {
        mask |= SlowPathMask::TRANSPARENCY;
    }
    if data.vertex_emissive.is_some() || data.face_emissive.is_some() {
        mask |= SlowPathMask::EMISSIVE_COLOR;
    }
    if data.face_surface_shaders.as_ref().is_some_and(|s| s.iter().any(Option::is_some)) {
        mask |= SlowPathMask::FACE_TEXTURES;
    }
    Ok(mask)
}

/// Local-space vertex stream for the cached buffer
///
/// Returns `None` if any value is not finite.
fn fast_path_stream(data: &TriMeshData) -> Option<(Vec<GpuVertex>, Vec<u32>)> {
    let normals = data.vertex_normals.as_ref()?;
    let mut vertices = Vec::with_capacity(data.points.len());
    for (i, point) in data.points.iter().enumerate() {
        let normal = normals.get(i)?;
        let uv = data.vertex_uvs.as_ref().and_then(|uvs| uvs.get(i)).copied();
        let color = data.vertex_colors.as_ref().and_then(|c| c.get(i)).copied();
        let finite = utils::is_finite_point(point)
            && normal.iter().all(|c| c.is_finite())
            && uv.map_or(true, |uv| uv.iter().all(|c| c.is_finite()))
            && color.map_or(true, |c| c.is_finite());
        if !finite {
            return None;
        }
        vertices.push(GpuVertex {
            position: point.coords.into(),
            normal: (*normal).into(),
            uv: uv.map_or([0.0; 2], Into::into),
            color: color.map_or([1.0; 4], |c| [c.r, c.g, c.b, 1.0]),
            emissive: [0.0; 3],
        });
    }
    let indices = data.triangles.iter().flatten().copied().collect();
    Some((vertices, indices))
}

/// Vertex-level attribute set of mesh point `i`
fn vertex_set(data: &TriMeshData, i: usize) -> AttributeSet {
    AttributeSet {
        diffuse_color: data.vertex_colors.as_ref().and_then(|v| v.get(i)).copied(),
        transparency_color: data.vertex_transparency.as_ref().and_then(|v| v.get(i)).copied(),
        emissive_color: data.vertex_emissive.as_ref().and_then(|v| v.get(i)).copied(),
        normal: data.vertex_normals.as_ref().and_then(|v| v.get(i)).copied(),
        surface_uv: data.vertex_uvs.as_ref().and_then(|v| v.get(i)).copied(),
        ..AttributeSet::default()
    }
}

/// Face-level attribute set of triangle `f`
fn face_set(data: &TriMeshData, f: usize) -> AttributeSet {
    AttributeSet {
        diffuse_color: data.face_colors.as_ref().and_then(|v| v.get(f)).copied(),
        transparency_color: data.face_transparency.as_ref().and_then(|v| v.get(f)).copied(),
        emissive_color: data.face_emissive.as_ref().and_then(|v| v.get(f)).copied(),
        normal: data.face_normals.as_ref().and_then(|v| v.get(f)).copied(),
        ..AttributeSet::default()
    }
}

impl<D: GpuDevice> Renderer<D> {
    /// Submit a TriMesh
    ///
    /// # Arguments
    /// * `key` - Cache identity of the mesh
    /// * `edit_index` - Edit index of the object owning the mesh data
    /// * `data` - Mesh data, borrowed for this call only
    pub fn submit_tri_mesh(&mut self, key: CacheKey, edit_index: u32, data: &TriMeshData) -> RenderResult<bool> {
        self.ensure_in_pass()?;
        let attributes = data.tri_mesh_attributes.as_deref();
        let color = self.geometry_color(attributes);

        let mut mask = match find_tri_mesh_data(data, key.object, &color) {
            Ok(mask) => mask,
            Err(warning) => {
                self.warnings.post(warning);
                return Ok(true);
            }
        };
        if self.style.interpolation == InterpolationStyle::None {
            mask |= SlowPathMask::FLAT_INTERPOLATION;
        }

        if self.style.explicit_edges && !data.edges.is_empty() {
            self.render_tri_mesh_edges(data, &color);
            return Ok(true);
        }

        let texture = self.geometry_texture(attributes);
        if mask.is_fast_path() && self.render_fast_path_tri_mesh(key, edit_index, data, &color, texture) {
            return Ok(true);
        }
        log::trace!("TriMesh {:?} on slow path ({:?})", key, mask);
        self.render_slow_path_tri_mesh(data, &color, texture);
        Ok(true)
    }

    /// Draw a mesh from its cached vertex buffer
    ///
    /// Returns false without drawing if the mesh data is not finite, so the
    /// slow path can skip the offending faces.
    pub(crate) fn render_fast_path_tri_mesh(
        &mut self,
        key: CacheKey,
        edit_index: u32,
        data: &TriMeshData,
        color: &ColorState,
        texture: Option<TextureBinding>,
    ) -> bool {
        let program = self.program(true, texture.is_some(), data.vertex_colors.is_some());
        let state_key = self.state_key(program, texture, color, false);
        let diffuse = color.diffuse;
        let material = state_key.material([diffuse.r, diffuse.g, diffuse.b, 1.0], color.emissive.to_array());

        let cached = match self.vbo_cache.lookup(&mut self.device, key, edit_index) {
            Some(cached) => Ok(cached),
            None => {
                let Some((vertices, indices)) = fast_path_stream(data) else {
                    return false;
                };
                self.vbo_cache
                    .insert(&mut self.device, key, edit_index, &vertices, &indices)
                    .map_err(|e| (e, vertices, indices))
            }
        };

        let fog = self.style.gpu_fog(state_key.fog);
        self.tracker.apply_key(&mut self.device, &state_key, material, fog);
        self.tracker
            .apply(&mut self.device, GpuCommand::LoadModelView(*self.matrices.local_to_camera()));
        match cached {
            Ok(cached) => self.tracker.draw(
                &mut self.device,
                GpuCommand::DrawBuffer { buffer: cached.buffer, primitive: Primitive::Triangles, count: cached.index_count },
            ),
            Err((error, vertices, indices)) => {
                self.warnings.post(RenderWarning::BufferAllocationFailed { reason: error.to_string() });
                let expanded = indices.iter().filter_map(|&i| vertices.get(i as usize).copied()).collect();
                self.tracker.draw(
                    &mut self.device,
                    GpuCommand::DrawVertices { primitive: Primitive::Triangles, vertices: expanded },
                );
            }
        }
        self.stats.primitives += data.triangles.len();
        true
    }

    /// Resolve every face corner and queue camera-space triangles
    pub(crate) fn render_slow_path_tri_mesh(
        &mut self,
        data: &TriMeshData,
        color: &ColorState,
        texture: Option<TextureBinding>,
    ) {
        let vertex_sets: Vec<AttributeSet> = (0..data.points.len()).map(|i| vertex_set(data, i)).collect();
        let mut skipped = 0;

        for (f, triangle) in data.triangles.iter().enumerate() {
            let face = face_set(data, f);
            let corners = triangle.map(|i| {
                let i = i as usize;
                let set = &vertex_sets[i];
                let resolved = resolve_color(&[Some(set), Some(&face)], color);
                Vertex::from_state(data.points[i], set.normal.or(face.normal), set.surface_uv, &resolved)
            });
            if !corners.iter().all(Vertex::is_finite) {
                skipped += 1;
                continue;
            }

            let face_texture = match data.face_surface_shaders.as_ref().and_then(|s| s.get(f)) {
                Some(Some(shader)) => self.texture_binding(shader),
                _ => texture,
            };
            self.emit_resolved_triangle(corners, face.normal, color, face_texture);
        }

        if skipped > 0 {
            self.warnings.post(RenderWarning::NonFiniteVertex { kind: GeometryKind::TriMesh, skipped });
        }
    }

    /// Draw only the mesh's explicit edges
    fn render_tri_mesh_edges(&mut self, data: &TriMeshData, color: &ColorState) {
        let mut vertices = Vec::with_capacity(data.edges.len() * 2);
        for (e, edge) in data.edges.iter().enumerate() {
            let edge_color = data.edge_colors.as_ref().and_then(|c| c.get(e)).copied();
            for &i in &edge.points {
                let mut set = vertex_set(data, i as usize);
                if edge_color.is_some() {
                    set.diffuse_color = edge_color;
                }
                let resolved = resolve_color(&[Some(&set)], color);
                vertices.push(Vertex::from_state(data.points[i as usize], set.normal, None, &resolved));
            }
        }

        if !vertices.iter().all(Vertex::is_finite) {
            self.warnings.post(RenderWarning::NonFiniteVertex { kind: GeometryKind::TriMesh, skipped: data.edges.len() });
            return;
        }
        let lit = data.vertex_normals.is_some();
        self.emit_segments(Primitive::Lines, &vertices, color, lit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Point3, Vec3};
    use crate::scene::{ObjectKind, ObjectRegistry, TriMeshEdge};

    fn quad() -> TriMeshData {
        let mut data = TriMeshData::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        );
        data.vertex_normals = Some(vec![Vec3::z(); 4]);
        data
    }

    fn object() -> ObjectId {
        ObjectRegistry::new().register(ObjectKind::Geometry)
    }

    #[test]
    fn test_plain_mesh_with_normals_is_fast() {
        let mask = find_tri_mesh_data(&quad(), object(), &ColorState::default()).unwrap();
        assert_eq!(mask, SlowPathMask::FAST_PATH);
        assert!(mask.is_fast_path());
    }

    #[test]
    fn test_each_violation_sets_its_bit() {
        let id = object();
        let opaque = ColorState::default();

        let mut data = quad();
        data.vertex_normals = None;
        assert_eq!(find_tri_mesh_data(&data, id, &opaque), Ok(SlowPathMask::NO_VERTEX_NORMALS));

        let mut data = quad();
        data.face_colors = Some(vec![ColorRgb::WHITE; 2]);
        assert_eq!(find_tri_mesh_data(&data, id, &opaque), Ok(SlowPathMask::FACE_COLORS));

        let translucent = ColorState { transparency: ColorRgb::gray(0.5), ..ColorState::default() };
        assert_eq!(find_tri_mesh_data(&quad(), id, &translucent), Ok(SlowPathMask::TRANSPARENCY));

        let mut data = quad();
        data.face_emissive = Some(vec![ColorRgb::BLACK; 2]);
        assert_eq!(find_tri_mesh_data(&data, id, &opaque), Ok(SlowPathMask::EMISSIVE_COLOR));
    }

    #[test]
    fn test_opaque_transparency_array_stays_fast() {
        let mut data = quad();
        data.vertex_transparency = Some(vec![ColorRgb::WHITE; 4]);
        assert!(find_tri_mesh_data(&data, object(), &ColorState::default()).unwrap().is_fast_path());
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut data = quad();
        data.triangles.push([0, 1, 9]);
        let result = find_tri_mesh_data(&data, object(), &ColorState::default());
        assert!(matches!(result, Err(RenderWarning::InvalidTriMeshIndex { index: 9, point_count: 4, .. })));
    }

    #[test]
    fn test_short_attribute_array_rejected() {
        let mut data = quad();
        data.vertex_colors = Some(vec![ColorRgb::WHITE; 3]);
        data.edges = vec![TriMeshEdge { points: [0, 1] }];
        let result = find_tri_mesh_data(&data, object(), &ColorState::default());
        assert!(matches!(
            result,
            Err(RenderWarning::MalformedAttributeArray { array: "vertex_colors", expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_fast_path_stream_rejects_nan() {
        let mut data = quad();
        assert_eq!(fast_path_stream(&data).map(|(v, i)| (v.len(), i.len())), Some((4, 6)));
        data.points[2].y = f32::INFINITY;
        assert!(fast_path_stream(&data).is_none());
    }
}
