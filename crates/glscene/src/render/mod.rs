//! # Interactive Renderer
//!
//! Draws a retained scene through OpenGL-style commands, one frame at a time.
//!
//! ## Architecture
//!
//! - **Renderer**: frame and pass driver, owner of all per-frame state
//! - **Geometry handlers**: resolve attributes and route primitives
//! - **Batching**: opaque triangles grouped by draw state, transparent
//!   primitives sorted back to front after the final pass
//! - **Caches**: vertex buffers keyed by object and edit index, textures by
//!   image identity, both bounded and evicted least-recently-used first
//! - **GPU layer**: a state tracker that drops redundant changes in front of
//!   a [`gpu::GpuDevice`]
//!
//! ## Frame Protocol
//!
//! ```text
//! start_frame → (start_pass → submit* → end_pass)+ → end_frame
//! ```
//!
//! `end_pass` returns [`ViewStatus::Retraverse`] while more passes are
//! needed (one per shadow-casting light). [`view::SceneView`] runs the loop
//! for a [`crate::scene::SceneNode`] graph.

pub mod error;
pub mod gpu;
pub mod state;
pub mod matrix;
pub mod lights;
pub mod textures;
pub mod vbo_cache;
pub mod opaque_buffer;
pub mod trans_buffer;
pub mod vertex;
pub mod geometry;
pub mod renderer;
pub mod view;


pub use error::{RenderError, RenderResult, RenderWarning, ViewStatus};
pub use gpu::{DeviceError, GpuCommand, GpuDevice};
pub use gpu::glow_device::GlowDevice;
pub use gpu::recording::RecordingDevice;
pub use geometry::{find_tri_mesh_data, SlowPathMask};
pub use renderer::{FramePhase, FrameStats, Renderer, RendererSnapshot};
pub use vbo_cache::{CacheKey, VboCacheStats};
pub use view::SceneView;
