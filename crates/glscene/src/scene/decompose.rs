//! Decomposition of higher-level geometry into TriMesh parts
//!
//! The renderer draws triangles, lines and points natively. Polygons, boxes
//! and cylinders are turned into one or more [`TriMeshData`] parts which
//! the view then submits in place of the original. Part numbers are stable
//! for a given geometry so that per-part GPU caches survive across frames.

use std::sync::Arc;

use thiserror::Error;

use super::attributes::AttributeSet;
use super::color::ColorRgb;
use super::geometry::{BoxData, CylinderData, EndCaps, Geometry, GeometryKind, PolygonData, TriMeshData};
use crate::config::DecompositionConfig;
use crate::foundation::math::{constants, Point3, Vec2, Vec3};

/// Part number of a cylinder's side surface
pub const CYLINDER_SIDE_PART: u32 = 0;
/// Part number of a cylinder's top cap
pub const CYLINDER_TOP_PART: u32 = 1;
/// Part number of a cylinder's bottom cap
pub const CYLINDER_BOTTOM_PART: u32 = 2;
/// Part number of a cylinder's interior faces
pub const CYLINDER_INTERIOR_PART: u32 = 3;

/// One TriMesh produced from a decomposed geometry
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedPart {
    /// Stable part number within the parent geometry
    pub part: u32,
    /// Part geometry
    pub mesh: TriMeshData,
}

/// Reasons a geometry produced no parts
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecomposeError {
    /// The kind is drawn natively and has no decomposition
    #[error("{0:?} is not decomposed")]
    NotDecomposable(GeometryKind),

    /// Too few vertices to form a surface
    #[error("{kind:?} has {count} vertices, at least 3 are required")]
    TooFewVertices {
        /// Geometry kind
        kind: GeometryKind,
        /// Vertices supplied
        count: usize,
    },
}

/// Colors for polygon vertices that lack a channel other vertices supply
///
/// These are the values the vertex would resolve to without its own
/// attribute: the geometry level, then the view, then the defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelFill {
    /// Resolved diffuse color
    pub diffuse: ColorRgb,
    /// Resolved transparency, white is opaque
    pub transparency: ColorRgb,
    /// Resolved emissive color
    pub emissive: ColorRgb,
}

impl Default for ChannelFill {
    fn default() -> Self {
        Self {
            diffuse: ColorRgb::WHITE,
            transparency: ColorRgb::WHITE,
            emissive: ColorRgb::BLACK,
        }
    }
}

/// Decompose a geometry the renderer does not draw natively
///
/// `fill` is only consulted for polygons whose vertices supply a channel
/// partially.
pub fn decompose(
    geometry: &Geometry,
    config: &DecompositionConfig,
    fill: &ChannelFill,
) -> Result<Vec<DecomposedPart>, DecomposeError> {
    match geometry {
        Geometry::Polygon(data) => {
            let mesh = polygon_to_tri_mesh(data, fill)?;
            Ok(vec![DecomposedPart { part: 0, mesh }])
        }
        Geometry::Box(data) => Ok(box_to_tri_meshes(data)),
        Geometry::Cylinder(data) => Ok(cylinder_to_tri_meshes(data, config.cylinder_subdivisions)),
        other => Err(DecomposeError::NotDecomposable(other.kind())),
    }
}

fn merged(top: Option<&Arc<AttributeSet>>, base: Option<&Arc<AttributeSet>>) -> Option<Arc<AttributeSet>> {
    AttributeSet::overlay_opt(top.map(|s| &**s), base.map(|s| &**s)).map(Arc::new)
}

/// Collect a per-vertex channel if any vertex provides it
///
/// Vertices without a value get `fill`.
fn gather<T: Copy, F>(count: usize, fill: T, f: F) -> Option<Vec<T>>
where
    F: Fn(usize) -> Option<T>,
{
    let values: Vec<Option<T>> = (0..count).map(f).collect();
    if values.iter().all(Option::is_none) {
        return None;
    }
    Some(values.into_iter().map(|v| v.unwrap_or(fill)).collect())
}

/// Newell normal of a polygon outline, counterclockwise front
fn polygon_normal(points: &[Point3]) -> Vec3 {
    let mut normal = Vec3::zeros();
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z)
}

/// Fan-triangulate a convex polygon, keeping its vertex attributes
///
/// A channel supplied by only some vertices is completed from `fill`, the
/// polygon's plane normal, or a zero texture coordinate.
pub fn polygon_to_tri_mesh(data: &PolygonData, fill: &ChannelFill) -> Result<TriMeshData, DecomposeError> {
    let n = data.vertices.len();
    if n < 3 {
        return Err(DecomposeError::TooFewVertices { kind: GeometryKind::Polygon, count: n });
    }

    let points: Vec<Point3> = data.vertices.iter().map(|v| v.point).collect();
    let triangles = (1..n - 1)
        .map(|i| [0, i as u32, i as u32 + 1])
        .collect();
    let attr = |i: usize| data.vertices[i].attributes.as_ref();
    let plane_normal = polygon_normal(&points);

    Ok(TriMeshData {
        vertex_normals: gather(n, plane_normal, |i| attr(i)?.normal),
        vertex_uvs: gather(n, Vec2::zeros(), |i| attr(i)?.surface_uv),
        vertex_colors: gather(n, fill.diffuse, |i| attr(i)?.diffuse_color),
        vertex_transparency: gather(n, fill.transparency, |i| attr(i)?.transparency_color),
        vertex_emissive: gather(n, fill.emissive, |i| attr(i)?.emissive_color),
        tri_mesh_attributes: data.polygon_attributes.clone(),
        ..TriMeshData::new(points, triangles)
    })
}

/// Build a flat quad part facing away from `inside`
fn quad_part(corners: [Point3; 4], inside: Point3, attributes: Option<Arc<AttributeSet>>) -> TriMeshData {
    let mut normal = (corners[1] - corners[0]).cross(&(corners[2] - corners[0]));
    let center = corners.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords) / 4.0;
    let outward = center - inside.coords;

    let triangles = if normal.dot(&outward) >= 0.0 {
        vec![[0, 1, 2], [0, 2, 3]]
    } else {
        normal = -normal;
        vec![[0, 2, 1], [0, 3, 2]]
    };
    let normal = normal.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z);

    TriMeshData {
        vertex_normals: Some(vec![normal; 4]),
        vertex_uvs: Some(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ]),
        tri_mesh_attributes: attributes,
        ..TriMeshData::new(corners.to_vec(), triangles)
    }
}

/// Six flat quads, one part per face: left, right, front, back, top, bottom
pub fn box_to_tri_meshes(data: &BoxData) -> Vec<DecomposedPart> {
    let corner = |a: f32, b: f32, c: f32| {
        data.origin + data.major_axis * a + data.orientation * b + data.minor_axis * c
    };
    let center = corner(0.5, 0.5, 0.5);

    // Each face fixes one axis; the other two sweep the quad
    let faces: [[Point3; 4]; 6] = [
        [corner(0.0, 0.0, 0.0), corner(0.0, 0.0, 1.0), corner(0.0, 1.0, 1.0), corner(0.0, 1.0, 0.0)],
        [corner(1.0, 0.0, 0.0), corner(1.0, 0.0, 1.0), corner(1.0, 1.0, 1.0), corner(1.0, 1.0, 0.0)],
        [corner(0.0, 0.0, 1.0), corner(1.0, 0.0, 1.0), corner(1.0, 1.0, 1.0), corner(0.0, 1.0, 1.0)],
        [corner(0.0, 0.0, 0.0), corner(1.0, 0.0, 0.0), corner(1.0, 1.0, 0.0), corner(0.0, 1.0, 0.0)],
        [corner(0.0, 1.0, 0.0), corner(1.0, 1.0, 0.0), corner(1.0, 1.0, 1.0), corner(0.0, 1.0, 1.0)],
        [corner(0.0, 0.0, 0.0), corner(1.0, 0.0, 0.0), corner(1.0, 0.0, 1.0), corner(0.0, 0.0, 1.0)],
    ];

    faces
        .into_iter()
        .zip(data.face_attributes.iter())
        .enumerate()
        .map(|(i, (quad, face_set))| DecomposedPart {
            part: i as u32,
            mesh: quad_part(quad, center, merged(face_set.as_ref(), data.box_attributes.as_ref())),
        })
        .collect()
}

struct CylinderFrame<'a> {
    data: &'a CylinderData,
}

impl CylinderFrame<'_> {
    fn angle(u: f32) -> f32 {
        u * constants::TAU
    }

    fn radial(&self, u: f32) -> Vec3 {
        let a = Self::angle(u);
        self.data.major_radius * a.cos() + self.data.minor_radius * a.sin()
    }

    fn tangent(&self, u: f32) -> Vec3 {
        let a = Self::angle(u);
        self.data.minor_radius * a.cos() - self.data.major_radius * a.sin()
    }

    fn axis_point(&self, v: f32) -> Point3 {
        self.data.origin + self.data.orientation * v
    }

    fn surface_point(&self, u: f32, v: f32) -> Point3 {
        self.axis_point(v) + self.radial(u)
    }

    fn side_normal(&self, u: f32) -> Vec3 {
        let n = self.tangent(u).cross(&self.data.orientation);
        let n = if n.dot(&self.radial(u)) < 0.0 { -n } else { n };
        n.try_normalize(f32::EPSILON).unwrap_or_else(|| self.radial(u))
    }
}

/// Orient every triangle so its geometric normal agrees with `expected`
fn orient(points: &[Point3], triangles: &mut [[u32; 3]], expected: impl Fn(usize) -> Vec3) {
    for (t, tri) in triangles.iter_mut().enumerate() {
        let [a, b, c] = tri.map(|i| points[i as usize]);
        if (b - a).cross(&(c - a)).dot(&expected(t)) < 0.0 {
            tri.swap(1, 2);
        }
    }
}

/// Side strip, caps and interior faces of a cylinder
///
/// `subdivisions` is the segment count for a full turn; partial cylinders
/// get a proportional share, never fewer than one segment.
pub fn cylinder_to_tri_meshes(data: &CylinderData, subdivisions: u32) -> Vec<DecomposedPart> {
    let frame = CylinderFrame { data };
    let (u0, u1) = (data.u_min, data.u_max);
    let (v0, v1) = (data.v_min, data.v_max);
    let span = (u1 - u0).abs().min(1.0);
    let segments = ((subdivisions as f32 * span).ceil() as usize).max(1);
    let full_turn = span >= 1.0;
    let u_at = |i: usize| u0 + (u1 - u0) * i as f32 / segments as f32;

    let mut parts = Vec::new();

    // Side: two rings of segments + 1 points
    {
        let mut points = Vec::with_capacity((segments + 1) * 2);
        let mut normals = Vec::with_capacity(points.capacity());
        let mut uvs = Vec::with_capacity(points.capacity());
        for i in 0..=segments {
            let u = u_at(i);
            for v in [v0, v1] {
                points.push(frame.surface_point(u, v));
                normals.push(frame.side_normal(u));
                uvs.push(Vec2::new((u - u0) / (u1 - u0).max(f32::EPSILON), v));
            }
        }
        let mut triangles = Vec::with_capacity(segments * 2);
        for i in 0..segments as u32 {
            let (b0, t0, b1, t1) = (2 * i, 2 * i + 1, 2 * i + 2, 2 * i + 3);
            triangles.push([b0, b1, t1]);
            triangles.push([b0, t1, t0]);
        }
        orient(&points, &mut triangles, |t| frame.side_normal(u_at(t / 2) * 0.5 + u_at(t / 2 + 1) * 0.5));

        parts.push(DecomposedPart {
            part: CYLINDER_SIDE_PART,
            mesh: TriMeshData {
                vertex_normals: Some(normals),
                vertex_uvs: Some(uvs),
                tri_mesh_attributes: merged(data.face_attributes.as_ref(), data.cylinder_attributes.as_ref()),
                ..TriMeshData::new(points, triangles)
            },
        });
    }

    let cap = |v: f32, outward: Vec3, set: Option<&Arc<AttributeSet>>| {
        let mut points = vec![frame.axis_point(v)];
        points.extend((0..=segments).map(|i| frame.surface_point(u_at(i), v)));
        let mut triangles: Vec<[u32; 3]> = (1..=segments as u32).map(|i| [0, i, i + 1]).collect();
        orient(&points, &mut triangles, |_| outward);
        let normal = outward.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z);
        let count = points.len();
        TriMeshData {
            vertex_normals: Some(vec![normal; count]),
            tri_mesh_attributes: merged(set, data.cylinder_attributes.as_ref()),
            ..TriMeshData::new(points, triangles)
        }
    };

    if data.caps.contains(EndCaps::TOP) {
        parts.push(DecomposedPart {
            part: CYLINDER_TOP_PART,
            mesh: cap(v1, data.orientation, data.top_attributes.as_ref()),
        });
    }
    if data.caps.contains(EndCaps::BOTTOM) {
        parts.push(DecomposedPart {
            part: CYLINDER_BOTTOM_PART,
            mesh: cap(v0, -data.orientation, data.bottom_attributes.as_ref()),
        });
    }

    // Interior walls close the wedge cut out of a partial cylinder
    if data.caps.contains(EndCaps::INTERIOR) && !full_turn {
        let mut points = Vec::with_capacity(8);
        let mut normals = Vec::with_capacity(8);
        let mut triangles = Vec::with_capacity(4);
        for (u, sign) in [(u0, -1.0f32), (u1, 1.0)] {
            let outward = frame.tangent(u) * sign * (u1 - u0).signum();
            let base = points.len() as u32;
            points.extend([
                frame.axis_point(v0),
                frame.surface_point(u, v0),
                frame.surface_point(u, v1),
                frame.axis_point(v1),
            ]);
            let normal = outward.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z);
            normals.extend([normal; 4]);
            let mut quad = vec![[base, base + 1, base + 2], [base, base + 2, base + 3]];
            orient(&points, &mut quad, |_| outward);
            triangles.extend(quad);
        }
        parts.push(DecomposedPart {
            part: CYLINDER_INTERIOR_PART,
            mesh: TriMeshData {
                vertex_normals: Some(normals),
                tri_mesh_attributes: merged(data.interior_attributes.as_ref(), data.cylinder_attributes.as_ref()),
                ..TriMeshData::new(points, triangles)
            },
        });
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::color::ColorRgb;
    use crate::scene::geometry::Vertex3D;
    use approx::assert_relative_eq;

    fn unit_cylinder(caps: EndCaps) -> CylinderData {
        CylinderData {
            caps,
            ..CylinderData::new(Point3::origin(), Vec3::z(), Vec3::x(), Vec3::y())
        }
    }

    fn triangle_normal(mesh: &TriMeshData, t: usize) -> Vec3 {
        let [a, b, c] = mesh.triangles[t].map(|i| mesh.points[i as usize]);
        (b - a).cross(&(c - a))
    }

    #[test]
    fn test_polygon_fan() {
        let polygon = PolygonData {
            vertices: (0..5)
                .map(|i| {
                    let a = i as f32 * constants::TAU / 5.0;
                    Vertex3D::new(Point3::new(a.cos(), a.sin(), 0.0))
                })
                .collect(),
            polygon_attributes: None,
        };
        let mesh = polygon_to_tri_mesh(&polygon, &ChannelFill::default()).unwrap();
        assert_eq!(mesh.triangles, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
        assert!(mesh.vertex_normals.is_none());
    }

    #[test]
    fn test_polygon_keeps_complete_vertex_channels() {
        let red = AttributeSet::new().with_diffuse(ColorRgb::new(1.0, 0.0, 0.0));
        let polygon = PolygonData {
            vertices: vec![
                Vertex3D::with_attributes(Point3::new(0.0, 0.0, 0.0), red.clone()),
                Vertex3D::with_attributes(Point3::new(1.0, 0.0, 0.0), red.clone()),
                Vertex3D::with_attributes(Point3::new(0.0, 1.0, 0.0), red),
            ],
            polygon_attributes: None,
        };
        let mesh = polygon_to_tri_mesh(&polygon, &ChannelFill::default()).unwrap();
        assert_eq!(mesh.vertex_colors.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_polygon_partial_vertex_colors_filled_from_resolved_color() {
        let red = ColorRgb::new(1.0, 0.0, 0.0);
        let polygon = PolygonData {
            vertices: vec![
                Vertex3D::with_attributes(Point3::new(0.0, 0.0, 0.0), AttributeSet::new().with_diffuse(red)),
                Vertex3D::new(Point3::new(1.0, 0.0, 0.0)),
                Vertex3D::with_attributes(Point3::new(0.0, 1.0, 0.0), AttributeSet::new().with_normal(Vec3::y())),
            ],
            polygon_attributes: None,
        };
        let fill = ChannelFill { diffuse: ColorRgb::gray(0.3), ..ChannelFill::default() };
        let mesh = polygon_to_tri_mesh(&polygon, &fill).unwrap();

        assert_eq!(mesh.vertex_colors, Some(vec![red, ColorRgb::gray(0.3), ColorRgb::gray(0.3)]));
        assert_eq!(mesh.vertex_normals, Some(vec![Vec3::z(), Vec3::z(), Vec3::y()]));
        assert!(mesh.vertex_transparency.is_none());
        assert!(mesh.vertex_uvs.is_none());
    }

    #[test]
    fn test_degenerate_polygon_is_rejected() {
        let polygon = PolygonData { vertices: vec![Vertex3D::new(Point3::origin())], polygon_attributes: None };
        assert_eq!(
            polygon_to_tri_mesh(&polygon, &ChannelFill::default()),
            Err(DecomposeError::TooFewVertices { kind: GeometryKind::Polygon, count: 1 })
        );
    }

    #[test]
    fn test_box_faces_point_outward() {
        let data = BoxData {
            origin: Point3::origin(),
            orientation: Vec3::y(),
            major_axis: Vec3::x(),
            minor_axis: Vec3::z(),
            face_attributes: Default::default(),
            box_attributes: None,
        };
        let parts = box_to_tri_meshes(&data);
        assert_eq!(parts.len(), 6);

        let center = Point3::new(0.5, 0.5, 0.5);
        for part in &parts {
            assert_eq!(part.mesh.triangles.len(), 2);
            for t in 0..2 {
                let [a, ..] = part.mesh.triangles[t].map(|i| part.mesh.points[i as usize]);
                assert!(triangle_normal(&part.mesh, t).dot(&(a - center)) > 0.0);
            }
        }
    }

    #[test]
    fn test_box_face_attributes_override_box_attributes() {
        let mut data = BoxData {
            origin: Point3::origin(),
            orientation: Vec3::y(),
            major_axis: Vec3::x(),
            minor_axis: Vec3::z(),
            face_attributes: Default::default(),
            box_attributes: Some(Arc::new(AttributeSet::new().with_diffuse(ColorRgb::gray(0.2)))),
        };
        data.face_attributes[4] = Some(Arc::new(AttributeSet::new().with_diffuse(ColorRgb::WHITE)));

        let parts = box_to_tri_meshes(&data);
        let diffuse = |i: usize| parts[i].mesh.tri_mesh_attributes.as_ref().and_then(|s| s.diffuse_color);
        assert_eq!(diffuse(4), Some(ColorRgb::WHITE));
        assert_eq!(diffuse(0), Some(ColorRgb::gray(0.2)));
    }

    #[test]
    fn test_cylinder_without_caps_is_side_only() {
        let parts = cylinder_to_tri_meshes(&unit_cylinder(EndCaps::empty()), 16);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].part, CYLINDER_SIDE_PART);
        assert_eq!(parts[0].mesh.triangles.len(), 32);
    }

    #[test]
    fn test_cylinder_side_faces_outward() {
        let parts = cylinder_to_tri_meshes(&unit_cylinder(EndCaps::empty()), 12);
        let side = &parts[0].mesh;
        for t in 0..side.triangles.len() {
            let [a, ..] = side.triangles[t].map(|i| side.points[i as usize]);
            let radial = Vec3::new(a.x, a.y, 0.0);
            assert!(triangle_normal(side, t).dot(&radial) > 0.0);
        }
        for n in side.vertex_normals.as_ref().unwrap() {
            assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_cylinder_caps_face_along_axis() {
        let parts = cylinder_to_tri_meshes(&unit_cylinder(EndCaps::TOP | EndCaps::BOTTOM), 8);
        assert_eq!(parts.len(), 3);

        let top = parts.iter().find(|p| p.part == CYLINDER_TOP_PART).unwrap();
        let bottom = parts.iter().find(|p| p.part == CYLINDER_BOTTOM_PART).unwrap();
        for t in 0..top.mesh.triangles.len() {
            assert!(triangle_normal(&top.mesh, t).z > 0.0);
            assert!(triangle_normal(&bottom.mesh, t).z < 0.0);
        }
    }

    #[test]
    fn test_partial_cylinder_interior() {
        let mut data = unit_cylinder(EndCaps::INTERIOR);
        data.u_max = 0.5;
        let parts = cylinder_to_tri_meshes(&data, 16);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].mesh.triangles.len(), 16);
        assert_eq!(parts[1].part, CYLINDER_INTERIOR_PART);
        assert_eq!(parts[1].mesh.triangles.len(), 4);
    }

    #[test]
    fn test_decompose_ignores_native_kinds() {
        let point = Geometry::Point(crate::scene::geometry::PointData {
            point: Point3::origin(),
            point_attributes: None,
        });
        assert_eq!(
            decompose(&point, &DecompositionConfig::default(), &ChannelFill::default()),
            Err(DecomposeError::NotDecomposable(GeometryKind::Point))
        );
    }
}
