//! # Geometry Data
//!
//! Declarative geometry consumed by the renderer. The renderer handles a
//! closed set of kinds, so dispatch is a plain `match` over [`Geometry`].
//!
//! ## Ownership
//!
//! Geometry data is owned by the application through [`GeometryObject`].
//! The renderer borrows it for a single submission and never keeps
//! references; anything it caches is keyed by [`ObjectId`] and validated
//! against the object's edit index.

use std::sync::Arc;

use bitflags::bitflags;

use super::attributes::{AttributeSet, TextureShader};
use super::color::ColorRgb;
use super::object::{EditIndex, ObjectId, ObjectKind, ObjectRegistry};
use crate::foundation::math::{Point3, Vec2, Vec3};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Point3,
    /// Maximum corner
    pub max: Point3,
}

impl BoundingBox {
    /// Smallest box containing every point, `None` for an empty slice
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bounds = Self { min: first, max: first };
        for p in iter {
            bounds.min = bounds.min.inf(p);
            bounds.max = bounds.max.sup(p);
        }
        Some(bounds)
    }

    /// The eight corners of the box
    pub fn corners(&self) -> [Point3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
        ]
    }
}

/// A point with optional per-vertex attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex3D {
    /// Position in local coordinates
    pub point: Point3,
    /// Vertex-level attributes
    pub attributes: Option<AttributeSet>,
}

impl Vertex3D {
    /// Vertex without attributes
    pub fn new(point: Point3) -> Self {
        Self { point, attributes: None }
    }

    /// Vertex with attributes
    pub fn with_attributes(point: Point3, attributes: AttributeSet) -> Self {
        Self { point, attributes: Some(attributes) }
    }
}

/// A single triangle
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleData {
    /// Corner vertices
    pub vertices: [Vertex3D; 3],
    /// Face-level attributes
    pub triangle_attributes: Option<Arc<AttributeSet>>,
}

/// A line segment
#[derive(Debug, Clone, PartialEq)]
pub struct LineData {
    /// End points
    pub vertices: [Vertex3D; 2],
    /// Geometry-level attributes
    pub line_attributes: Option<Arc<AttributeSet>>,
}

/// A single point
#[derive(Debug, Clone, PartialEq)]
pub struct PointData {
    /// Location
    pub point: Point3,
    /// Geometry-level attributes
    pub point_attributes: Option<Arc<AttributeSet>>,
}

/// Connected line segments
#[derive(Debug, Clone, PartialEq)]
pub struct PolyLineData {
    /// Vertices, at least two
    pub vertices: Vec<Vertex3D>,
    /// Per-segment attributes, one per segment when present
    pub segment_attributes: Option<Vec<AttributeSet>>,
    /// Geometry-level attributes
    pub poly_line_attributes: Option<Arc<AttributeSet>>,
}

/// An explicit TriMesh edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriMeshEdge {
    /// Indices of the two end points
    pub points: [u32; 2],
}

/// Indexed triangle mesh with optional attribute arrays
///
/// Every per-vertex array must have one entry per point and every
/// per-face array one entry per triangle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMeshData {
    /// Vertex positions
    pub points: Vec<Point3>,
    /// Triangles as point indices
    pub triangles: Vec<[u32; 3]>,
    /// Per-vertex normals
    pub vertex_normals: Option<Vec<Vec3>>,
    /// Per-vertex texture coordinates
    pub vertex_uvs: Option<Vec<Vec2>>,
    /// Per-vertex diffuse colors
    pub vertex_colors: Option<Vec<ColorRgb>>,
    /// Per-vertex transparency colors
    pub vertex_transparency: Option<Vec<ColorRgb>>,
    /// Per-vertex emissive colors
    pub vertex_emissive: Option<Vec<ColorRgb>>,
    /// Per-face normals
    pub face_normals: Option<Vec<Vec3>>,
    /// Per-face diffuse colors
    pub face_colors: Option<Vec<ColorRgb>>,
    /// Per-face transparency colors
    pub face_transparency: Option<Vec<ColorRgb>>,
    /// Per-face emissive colors
    pub face_emissive: Option<Vec<ColorRgb>>,
    /// Per-face texture shaders
    pub face_surface_shaders: Option<Vec<Option<TextureShader>>>,
    /// Explicit edges
    pub edges: Vec<TriMeshEdge>,
    /// Per-edge colors
    pub edge_colors: Option<Vec<ColorRgb>>,
    /// Geometry-level attributes
    pub tri_mesh_attributes: Option<Arc<AttributeSet>>,
}

impl TriMeshData {
    /// Mesh with positions and triangles only
    pub fn new(points: Vec<Point3>, triangles: Vec<[u32; 3]>) -> Self {
        Self { points, triangles, ..Self::default() }
    }

    /// Bounds of the mesh points
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.points)
    }
}

/// A planar convex polygon
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonData {
    /// Vertices in order, at least three
    pub vertices: Vec<Vertex3D>,
    /// Geometry-level attributes
    pub polygon_attributes: Option<Arc<AttributeSet>>,
}

/// A parallelepiped spanned by three axes from an origin
#[derive(Debug, Clone, PartialEq)]
pub struct BoxData {
    /// Corner the axes start from
    pub origin: Point3,
    /// Axis along the box height
    pub orientation: Vec3,
    /// Axis along the box width
    pub major_axis: Vec3,
    /// Axis along the box depth
    pub minor_axis: Vec3,
    /// Attributes for each face, in the order
    /// left, right, front, back, top, bottom
    pub face_attributes: [Option<Arc<AttributeSet>>; 6],
    /// Geometry-level attributes
    pub box_attributes: Option<Arc<AttributeSet>>,
}

bitflags! {
    /// Which end caps a cylinder has
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EndCaps: u32 {
        /// Cap at the `origin + orientation` end
        const TOP = 1 << 0;
        /// Cap at the origin end
        const BOTTOM = 1 << 1;
        /// Interior faces of a partial cylinder
        const INTERIOR = 1 << 2;
    }
}

/// Elliptical cylinder
#[derive(Debug, Clone, PartialEq)]
pub struct CylinderData {
    /// Center of the bottom end
    pub origin: Point3,
    /// Axis from bottom to top
    pub orientation: Vec3,
    /// First radius vector
    pub major_radius: Vec3,
    /// Second radius vector
    pub minor_radius: Vec3,
    /// Start of the angular range, in [0, 1]
    pub u_min: f32,
    /// End of the angular range, in [0, 1]
    pub u_max: f32,
    /// Start of the height range, in [0, 1]
    pub v_min: f32,
    /// End of the height range, in [0, 1]
    pub v_max: f32,
    /// Which caps to generate
    pub caps: EndCaps,
    /// Attributes of interior faces
    pub interior_attributes: Option<Arc<AttributeSet>>,
    /// Attributes of the top cap
    pub top_attributes: Option<Arc<AttributeSet>>,
    /// Attributes of the side face
    pub face_attributes: Option<Arc<AttributeSet>>,
    /// Attributes of the bottom cap
    pub bottom_attributes: Option<Arc<AttributeSet>>,
    /// Geometry-level attributes
    pub cylinder_attributes: Option<Arc<AttributeSet>>,
}

impl CylinderData {
    /// Full unit-range cylinder without caps or attributes
    pub fn new(origin: Point3, orientation: Vec3, major_radius: Vec3, minor_radius: Vec3) -> Self {
        Self {
            origin,
            orientation,
            major_radius,
            minor_radius,
            u_min: 0.0,
            u_max: 1.0,
            v_min: 0.0,
            v_max: 1.0,
            caps: EndCaps::empty(),
            interior_attributes: None,
            top_attributes: None,
            face_attributes: None,
            bottom_attributes: None,
            cylinder_attributes: None,
        }
    }
}

/// Discriminant of [`Geometry`], used in logs and statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// Triangle
    Triangle,
    /// Line
    Line,
    /// Point
    Point,
    /// PolyLine
    PolyLine,
    /// TriMesh
    TriMesh,
    /// Polygon
    Polygon,
    /// Box
    Box,
    /// Cylinder
    Cylinder,
}

/// All geometry kinds the renderer understands
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Single triangle
    Triangle(TriangleData),
    /// Line segment
    Line(LineData),
    /// Single point
    Point(PointData),
    /// Connected segments
    PolyLine(PolyLineData),
    /// Indexed triangle mesh
    TriMesh(TriMeshData),
    /// Convex polygon
    Polygon(PolygonData),
    /// Box
    Box(BoxData),
    /// Cylinder
    Cylinder(CylinderData),
}

impl Geometry {
    /// Kind of this geometry
    pub const fn kind(&self) -> GeometryKind {
        match self {
            Self::Triangle(_) => GeometryKind::Triangle,
            Self::Line(_) => GeometryKind::Line,
            Self::Point(_) => GeometryKind::Point,
            Self::PolyLine(_) => GeometryKind::PolyLine,
            Self::TriMesh(_) => GeometryKind::TriMesh,
            Self::Polygon(_) => GeometryKind::Polygon,
            Self::Box(_) => GeometryKind::Box,
            Self::Cylinder(_) => GeometryKind::Cylinder,
        }
    }

    /// Geometry-level attribute set
    pub fn attributes(&self) -> Option<&AttributeSet> {
        let set = match self {
            Self::Triangle(d) => &d.triangle_attributes,
            Self::Line(d) => &d.line_attributes,
            Self::Point(d) => &d.point_attributes,
            Self::PolyLine(d) => &d.poly_line_attributes,
            Self::TriMesh(d) => &d.tri_mesh_attributes,
            Self::Polygon(d) => &d.polygon_attributes,
            Self::Box(d) => &d.box_attributes,
            Self::Cylinder(d) => &d.cylinder_attributes,
        };
        set.as_deref()
    }

    /// Conservative local-space bounds
    pub fn bounds(&self) -> Option<BoundingBox> {
        match self {
            Self::Triangle(d) => BoundingBox::from_points(d.vertices.iter().map(|v| &v.point)),
            Self::Line(d) => BoundingBox::from_points(d.vertices.iter().map(|v| &v.point)),
            Self::Point(d) => BoundingBox::from_points(std::iter::once(&d.point)),
            Self::PolyLine(d) => BoundingBox::from_points(d.vertices.iter().map(|v| &v.point)),
            Self::TriMesh(d) => d.bounds(),
            Self::Polygon(d) => BoundingBox::from_points(d.vertices.iter().map(|v| &v.point)),
            Self::Box(d) => {
                let o = d.origin;
                let corners = [
                    o,
                    o + d.orientation,
                    o + d.major_axis,
                    o + d.minor_axis,
                    o + d.orientation + d.major_axis,
                    o + d.orientation + d.minor_axis,
                    o + d.major_axis + d.minor_axis,
                    o + d.orientation + d.major_axis + d.minor_axis,
                ];
                BoundingBox::from_points(&corners)
            }
            Self::Cylinder(d) => {
                let radius = d.major_radius.abs() + d.minor_radius.abs();
                let mut corners = Vec::with_capacity(4);
                for end in [d.origin, d.origin + d.orientation] {
                    corners.push(end - radius);
                    corners.push(end + radius);
                }
                BoundingBox::from_points(&corners)
            }
        }
    }
}

/// A geometry registered with an [`ObjectRegistry`]
///
/// Mutations go through [`GeometryObject::edit`], which bumps the edit
/// index so renderer caches notice the change on the next submission.
#[derive(Debug, Clone)]
pub struct GeometryObject {
    id: ObjectId,
    edit_index: EditIndex,
    geometry: Geometry,
}

impl GeometryObject {
    /// Register a new geometry object
    pub fn new(registry: &mut ObjectRegistry, geometry: Geometry) -> Self {
        Self {
            id: registry.register(ObjectKind::Geometry),
            edit_index: EditIndex::new(),
            geometry,
        }
    }

    /// Object identity
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Current edit index value
    pub const fn edit_index(&self) -> u32 {
        self.edit_index.get()
    }

    /// Edit tracker, for locking around batched edits
    pub fn edit_tracker(&mut self) -> &mut EditIndex {
        &mut self.edit_index
    }

    /// Borrow the geometry
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Mutate the geometry and record the edit
    pub fn edit<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Geometry) -> R,
    {
        let result = f(&mut self.geometry);
        self.edit_index.edited();
        result
    }
}
