//! # Scene Input Model
//!
//! Plain data consumed by the renderer: geometry, attribute sets, styles,
//! cameras, lights, draw contexts and textures. The renderer only borrows
//! these values for the duration of one call; ownership stays with the
//! application.

pub mod color;
pub mod attributes;
pub mod object;
pub mod geometry;
pub mod decompose;
pub mod camera;
pub mod light;
pub mod style;
pub mod draw_context;
pub mod texture;
pub mod group;

pub use color::ColorRgb;
pub use attributes::{AttributeSet, Illumination, TextureShader, UvBoundary};
pub use object::{EditIndex, ObjectId, ObjectKind, ObjectRegistry};
pub use geometry::{
    BoundingBox, BoxData, CylinderData, EndCaps, Geometry, GeometryKind, GeometryObject,
    LineData, PointData, PolyLineData, PolygonData, TriMeshData, TriMeshEdge, TriangleData,
    Vertex3D,
};
pub use decompose::{ChannelFill, DecomposeError, DecomposedPart};
pub use camera::{Camera, CameraPlacement, CameraRange, CameraViewPort, Projection};
pub use light::{Attenuation, Light, LightKind};
pub use style::{
    AntiAliasMode, AntiAliasStyleData, BackfacingStyle, FillStyle, FogMode, FogStyleData,
    InterpolationStyle, OrientationStyle,
};
pub use draw_context::{ClearMethod, DrawContextData};
pub use texture::TextureImage;
pub use group::{SceneNode, StyleNode};
