//! # GPU Emission Layer
//!
//! The renderer never calls OpenGL directly. It computes state changes and
//! draw requests as [`GpuCommand`] values and hands them to a
//! [`GpuDevice`]. Two devices exist:
//!
//! - [`glow_device::GlowDevice`] issues real OpenGL 3.3 core calls
//! - [`recording::RecordingDevice`] records commands for tests and headless
//!   runs, and can replay them into rasterizable triangles
//!
//! Only resource creation is fallible at this level. Everything else is a
//! fire-and-forget command, matching how OpenGL reports errors lazily.

pub mod glow_device;
pub mod recording;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::foundation::math::Mat4;
use crate::scene::{DrawContextData, FogMode, Illumination, TextureImage, UvBoundary};

/// Device-level failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The context could not be created or is unsuitable
    #[error("Context creation failed: {0}")]
    ContextCreation(String),

    /// A vertex or index buffer could not be allocated
    #[error("Buffer allocation failed: {0}")]
    BufferAllocation(String),

    /// A texture could not be created or uploaded
    #[error("Texture upload failed: {0}")]
    TextureUpload(String),

    /// A shader variant failed to compile or link
    #[error("Shader compilation failed: {0}")]
    ShaderCompile(String),
}

/// Interleaved vertex as uploaded to the GPU
///
/// Colors carry alpha in the fourth component. `emissive` is added on top
/// of the lit color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GpuVertex {
    /// Position
    pub position: [f32; 3],
    /// Normal, zero when the primitive is unlit
    pub normal: [f32; 3],
    /// Texture coordinate
    pub uv: [f32; 2],
    /// Diffuse color and alpha
    pub color: [f32; 4],
    /// Emissive color
    pub emissive: [f32; 3],
}

impl GpuVertex {
    /// Size of one vertex in bytes
    pub const STRIDE: usize = std::mem::size_of::<Self>();
}

/// Device handle of a vertex/index buffer pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Device handle of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Independent points
    Points,
    /// Independent line segments
    Lines,
    /// Connected line segments
    LineStrip,
    /// Independent triangles
    Triangles,
}

/// Toggleable pipeline capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Depth testing
    DepthTest,
    /// Color blending
    Blend,
    /// Face culling
    CullFace,
    /// Line anti-aliasing
    LineSmooth,
}

/// Blend equations in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// `src * alpha + dst * (1 - alpha)`
    Alpha,
    /// `src + dst`, used for per-light additive passes
    Additive,
}

/// Depth comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    /// Pass if closer
    Less,
    /// Pass if closer or equal
    LessEqual,
}

/// Faces removed by culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// Cull back faces
    Back,
    /// Cull front faces
    Front,
}

/// Winding of front faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    /// Counter-clockwise
    Ccw,
    /// Clockwise
    Cw,
}

/// Rasterization of filled primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    /// Solid
    Fill,
    /// Outlines
    Line,
    /// Vertices
    Point,
}

/// How lighting is interpolated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadingMode {
    /// One color per face
    Flat,
    /// Per-vertex lighting
    Gouraud,
    /// Per-fragment lighting
    PerPixel,
}

/// Shader program variant
///
/// Each combination of flags is a distinct program on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderProgram {
    /// Lighting model
    pub illumination: Illumination,
    /// Interpolation
    pub shading: ShadingMode,
    /// Whether the bound texture modulates the diffuse color
    pub textured: bool,
    /// Whether vertex colors replace the material diffuse color
    pub vertex_colors: bool,
    /// Whether fog is applied
    pub fog: bool,
    /// Whether back faces are lit with flipped normals
    pub two_sided: bool,
}

impl Default for ShaderProgram {
    fn default() -> Self {
        Self {
            illumination: Illumination::Phong,
            shading: ShadingMode::Gouraud,
            textured: false,
            vertex_colors: false,
            fog: false,
            two_sided: false,
        }
    }
}

/// Material uniforms
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpuMaterial {
    /// Diffuse color and alpha, used when vertex colors are off
    pub diffuse: [f32; 4],
    /// Specular color
    pub specular: [f32; 3],
    /// Emissive color, added to every vertex
    pub emissive: [f32; 3],
    /// Specular exponent
    pub specular_control: f32,
    /// Metallic factor
    pub metallic: f32,
}

/// Light source type as seen by the shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuLightKind {
    /// Parallel rays
    Directional,
    /// Omnidirectional point
    Point,
    /// Cone
    Spot,
}

/// Light slot contents, in eye space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuLight {
    /// Light type
    pub kind: GpuLightKind,
    /// Color times brightness
    pub color: [f32; 3],
    /// Eye-space position (point and spot)
    pub position: [f32; 3],
    /// Eye-space direction the light travels (directional and spot)
    pub direction: [f32; 3],
    /// Constant, linear and quadratic attenuation
    pub attenuation: [f32; 3],
    /// Cosine of the fully lit half-angle
    pub spot_cos_inner: f32,
    /// Cosine of the cutoff half-angle
    pub spot_cos_outer: f32,
}

/// Fog uniforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuFog {
    /// Density function
    pub mode: FogMode,
    /// Linear start distance
    pub start: f32,
    /// Linear end distance
    pub end: f32,
    /// Exponential density
    pub density: f32,
    /// Fog color
    pub color: [f32; 3],
}

/// Texture bound for sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureBinding {
    /// Texture handle
    pub texture: TextureId,
    /// Horizontal wrap
    pub u_boundary: UvBoundary,
    /// Vertical wrap
    pub v_boundary: UvBoundary,
}

/// One state change or draw request
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Clear the framebuffer
    Clear {
        /// Clear color, `None` to keep the color buffer
        color: Option<[f32; 4]>,
        /// Whether to clear depth
        depth: bool,
    },
    /// Set the viewport to the full pane
    Viewport {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Enable or disable a capability
    SetCapability {
        /// Capability to change
        capability: Capability,
        /// New state
        enabled: bool,
    },
    /// Enable or disable depth writes
    DepthMask(bool),
    /// Depth comparison
    DepthFunc(DepthFunc),
    /// Blend equation
    BlendFunc(BlendMode),
    /// Faces to cull
    CullFace(CullMode),
    /// Front-face winding
    FrontFace(FrontFace),
    /// Polygon rasterization mode
    PolygonMode(PolygonMode),
    /// Line width in pixels
    LineWidth(f32),
    /// Point size in pixels
    PointSize(f32),
    /// Camera-to-clip matrix
    LoadProjection(Mat4),
    /// Local-to-camera matrix
    LoadModelView(Mat4),
    /// Fill or clear a light slot
    SetLight {
        /// Slot index
        slot: usize,
        /// Slot contents, `None` to disable
        light: Option<GpuLight>,
    },
    /// Summed ambient light
    SetAmbient([f32; 3]),
    /// Material uniforms
    SetMaterial(GpuMaterial),
    /// Fog uniforms, `None` to disable
    SetFog(Option<GpuFog>),
    /// Texture for sampling, `None` to unbind
    BindTexture(Option<TextureBinding>),
    /// Select a program variant
    UseProgram(ShaderProgram),
    /// Discard fragments with alpha at or below the threshold
    AlphaTest(f32),
    /// Draw an indexed cached buffer
    DrawBuffer {
        /// Buffer to draw
        buffer: BufferId,
        /// Topology
        primitive: Primitive,
        /// Number of indices
        count: u32,
    },
    /// Draw vertices supplied inline
    DrawVertices {
        /// Topology
        primitive: Primitive,
        /// Vertex data
        vertices: Vec<GpuVertex>,
    },
}

impl GpuCommand {
    /// True for draw requests
    pub const fn is_draw(&self) -> bool {
        matches!(self, Self::DrawBuffer { .. } | Self::DrawVertices { .. })
    }
}

/// Thin GPU backend
///
/// Implementations translate commands one-to-one into API calls; all
/// redundancy elimination happens before a command reaches the device.
pub trait GpuDevice {
    /// Bind or create the context for a draw context
    ///
    /// Called at the start of a frame whenever the draw context changed.
    fn open(&mut self, context: &DrawContextData) -> Result<(), DeviceError>;

    /// Execute one command
    fn execute(&mut self, command: GpuCommand);

    /// Upload an indexed vertex buffer
    fn create_buffer(&mut self, vertices: &[GpuVertex], indices: &[u32]) -> Result<BufferId, DeviceError>;

    /// Release a buffer
    fn delete_buffer(&mut self, buffer: BufferId);

    /// Upload a texture image
    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId, DeviceError>;

    /// Release a texture
    fn delete_texture(&mut self, texture: TextureId);

    /// Present the finished frame
    fn present(&mut self);

    /// Number of light slots the device supports
    fn max_lights(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_has_no_padding() {
        assert_eq!(GpuVertex::STRIDE, 15 * std::mem::size_of::<f32>());
        let vertices = [GpuVertex::default(); 2];
        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 2 * GpuVertex::STRIDE);
    }

    #[test]
    fn test_draw_classification() {
        assert!(GpuCommand::DrawVertices { primitive: Primitive::Points, vertices: vec![] }.is_draw());
        assert!(!GpuCommand::DepthMask(true).is_draw());
    }
}
