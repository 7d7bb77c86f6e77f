//! # glscene
//!
//! A retained-mode 3D scene graph with an interactive OpenGL renderer.
//!
//! ## Features
//!
//! - **Retained scene model**: geometries, attribute sets, styles, cameras
//!   and lights as plain data
//! - **Attribute resolution**: colors resolve vertex → face → geometry →
//!   view, falling back to white
//! - **Batched drawing**: opaque triangles grouped by draw state, transparent
//!   primitives sorted back to front
//! - **Buffer caching**: unedited meshes are uploaded once and redrawn from
//!   GPU memory under a byte budget
//! - **Headless testing**: a recording device replays draws into triangles
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glscene::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = ObjectRegistry::new();
//!     let mesh = TriMeshData::new(
//!         vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
//!         vec![[0, 1, 2]],
//!     );
//!     let root = SceneNode::group(vec![SceneNode::Geometry(GeometryObject::new(
//!         &mut registry,
//!         Geometry::TriMesh(mesh),
//!     ))]);
//!
//!     let mut renderer = Renderer::new(RecordingDevice::new(), RendererConfig::default())?;
//!     let camera = Camera::perspective(Point3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
//!     let stats = SceneView::new().render(&mut renderer, &DrawContextData::new(640, 480), &camera, &[], &root)?;
//!     println!("{} primitives", stats.primitives);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod scene;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, DecompositionConfig, RendererConfig},
        foundation::math::{Mat4, Point3, Vec2, Vec3},
        render::{
            FrameStats, GpuDevice, RecordingDevice, RenderError, RenderResult, RenderWarning, Renderer,
            SceneView, ViewStatus,
        },
        scene::{
            AttributeSet, Camera, ColorRgb, DrawContextData, FillStyle, Geometry, GeometryObject,
            Light, ObjectRegistry, SceneNode, StyleNode, TriMeshData, Vertex3D,
        },
    };
}
