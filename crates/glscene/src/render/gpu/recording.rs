//! Headless recording device
//!
//! Records every command it receives and keeps uploaded buffers in memory.
//! Used by the test-suite and the headless demo. Failures can be injected
//! to exercise the renderer's degraded paths.
//!
//! [`RecordingDevice::rasterize`] replays the recorded commands into
//! eye-space triangles with fully resolved colors, which is what the
//! fragment stage would see. Two command streams that rasterize to the
//! same triangles produce the same image.

use std::collections::HashMap;

use super::{
    BufferId, CullMode, DeviceError, FrontFace, GpuCommand, GpuDevice, GpuMaterial, GpuVertex,
    PolygonMode, Primitive, ShaderProgram, ShadingMode, TextureBinding, TextureId,
};
use crate::foundation::math::{utils, Mat4, Point3, Vec3};
use crate::scene::{DrawContextData, Illumination, TextureImage};

/// Default number of light slots
pub const DEFAULT_LIGHT_SLOTS: usize = 8;

/// Fragment-relevant state of a rasterized triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterState {
    /// Lighting model
    pub illumination: Illumination,
    /// Interpolation
    pub shading: ShadingMode,
    /// Bound texture, if the program samples one
    pub texture: Option<TextureBinding>,
    /// Fog enabled
    pub fog: bool,
    /// Two-sided lighting
    pub two_sided: bool,
    /// Specular color
    pub specular: [f32; 3],
    /// Specular exponent
    pub specular_control: f32,
    /// Metallic factor
    pub metallic: f32,
    /// Culling, `None` when disabled
    pub cull: Option<CullMode>,
    /// Front-face winding
    pub front_face: FrontFace,
    /// Polygon mode
    pub polygon_mode: PolygonMode,
    /// Blending enabled
    pub blend: bool,
}

/// Fully resolved vertex in eye space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterVertex {
    /// Eye-space position
    pub position: Point3,
    /// Unit eye-space normal, zero for unlit geometry
    pub normal: Vec3,
    /// Texture coordinate
    pub uv: [f32; 2],
    /// Diffuse color and alpha
    pub color: [f32; 4],
    /// Emissive color
    pub emissive: [f32; 3],
}

/// A triangle as the rasterizer receives it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterTriangle {
    /// Corners
    pub vertices: [RasterVertex; 3],
    /// Pipeline state
    pub state: RasterState,
}

impl RasterTriangle {
    /// Equality up to floating-point noise
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.state == other.state
            && self.vertices.iter().zip(&other.vertices).all(|(a, b)| {
                close(a.position.coords.as_slice(), b.position.coords.as_slice(), epsilon)
                    && close(a.normal.as_slice(), b.normal.as_slice(), epsilon)
                    && close(a.uv.as_slice(), b.uv.as_slice(), epsilon)
                    && close(a.color.as_slice(), b.color.as_slice(), epsilon)
                    && close(a.emissive.as_slice(), b.emissive.as_slice(), epsilon)
            })
    }
}

fn close(a: &[f32], b: &[f32], epsilon: f32) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= epsilon)
}

#[derive(Debug, Clone)]
struct StoredBuffer {
    vertices: Vec<GpuVertex>,
    indices: Vec<u32>,
}

/// Device that records commands instead of drawing
#[derive(Debug)]
pub struct RecordingDevice {
    commands: Vec<GpuCommand>,
    buffers: HashMap<BufferId, StoredBuffer>,
    retired: HashMap<BufferId, StoredBuffer>,
    textures: HashMap<TextureId, (u32, u32)>,
    next_handle: u32,
    light_slots: usize,
    open_count: usize,
    buffer_uploads: usize,
    texture_uploads: usize,
    frames_presented: usize,
    /// Make the next `open` calls fail
    pub fail_open: bool,
    /// Make buffer allocations fail
    pub fail_buffer_allocations: bool,
    /// Make texture uploads fail
    pub fail_texture_uploads: bool,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    /// Create a device with the default number of light slots
    pub fn new() -> Self {
        Self::with_light_slots(DEFAULT_LIGHT_SLOTS)
    }

    /// Create a device with a specific number of light slots
    pub fn with_light_slots(light_slots: usize) -> Self {
        Self {
            commands: Vec::new(),
            buffers: HashMap::new(),
            retired: HashMap::new(),
            textures: HashMap::new(),
            next_handle: 1,
            light_slots,
            open_count: 0,
            buffer_uploads: 0,
            texture_uploads: 0,
            frames_presented: 0,
            fail_open: false,
            fail_buffer_allocations: false,
            fail_texture_uploads: false,
        }
    }

    fn next_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Commands recorded since the last `take_commands`
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Remove and return the recorded commands
    ///
    /// Contents of buffers deleted during the recorded range are dropped
    /// along with the commands that referenced them.
    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        self.retired.clear();
        std::mem::take(&mut self.commands)
    }

    /// Number of recorded draw commands
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    /// Successful `open` calls
    pub const fn open_count(&self) -> usize {
        self.open_count
    }

    /// Successful buffer uploads
    pub const fn buffer_uploads(&self) -> usize {
        self.buffer_uploads
    }

    /// Successful texture uploads
    pub const fn texture_uploads(&self) -> usize {
        self.texture_uploads
    }

    /// Buffers currently alive
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Textures currently alive
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Frames presented
    pub const fn frames_presented(&self) -> usize {
        self.frames_presented
    }

    /// Replay recorded commands into eye-space triangles
    ///
    /// Only triangle draws are expanded. Commands issued before the
    /// recorded range are not known, so state starts at GL defaults.
    pub fn rasterize(&self) -> Vec<RasterTriangle> {
        let mut model_view = Mat4::identity();
        let mut program = ShaderProgram::default();
        let mut material = GpuMaterial::default();
        let mut texture = None;
        let mut cull_enabled = false;
        let mut cull = CullMode::Back;
        let mut front_face = FrontFace::Ccw;
        let mut polygon_mode = PolygonMode::Fill;
        let mut blend = false;
        let mut out = Vec::new();

        for command in &self.commands {
            let vertices: Vec<GpuVertex> = match command {
                GpuCommand::LoadModelView(m) => {
                    model_view = *m;
                    continue;
                }
                GpuCommand::UseProgram(p) => {
                    program = *p;
                    continue;
                }
                GpuCommand::SetMaterial(m) => {
                    material = *m;
                    continue;
                }
                GpuCommand::BindTexture(t) => {
                    texture = *t;
                    continue;
                }
                GpuCommand::SetCapability { capability, enabled } => {
                    match capability {
                        super::Capability::CullFace => cull_enabled = *enabled,
                        super::Capability::Blend => blend = *enabled,
                        _ => {}
                    }
                    continue;
                }
                GpuCommand::CullFace(c) => {
                    cull = *c;
                    continue;
                }
                GpuCommand::FrontFace(f) => {
                    front_face = *f;
                    continue;
                }
                GpuCommand::PolygonMode(m) => {
                    polygon_mode = *m;
                    continue;
                }
                GpuCommand::DrawBuffer { buffer, primitive: Primitive::Triangles, count } => {
                    let Some(stored) = self.buffers.get(buffer).or_else(|| self.retired.get(buffer)) else {
                        continue;
                    };
                    stored
                        .indices
                        .iter()
                        .take(*count as usize)
                        .filter_map(|i| stored.vertices.get(*i as usize).copied())
                        .collect()
                }
                GpuCommand::DrawVertices { primitive: Primitive::Triangles, vertices } => vertices.clone(),
                _ => continue,
            };

            let normal_matrix = utils::normal_matrix(&model_view);
            let state = RasterState {
                illumination: program.illumination,
                shading: program.shading,
                texture: if program.textured { texture } else { None },
                fog: program.fog,
                two_sided: program.two_sided,
                specular: material.specular,
                specular_control: material.specular_control,
                metallic: material.metallic,
                cull: cull_enabled.then_some(cull),
                front_face,
                polygon_mode,
                blend,
            };
            let resolve = |v: &GpuVertex| RasterVertex {
                position: model_view.transform_point(&Point3::from(v.position)),
                normal: (normal_matrix * Vec3::from(v.normal))
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vec3::zeros),
                uv: v.uv,
                color: if program.vertex_colors { v.color } else { material.diffuse },
                emissive: [
                    material.emissive[0] + v.emissive[0],
                    material.emissive[1] + v.emissive[1],
                    material.emissive[2] + v.emissive[2],
                ],
            };
            for tri in vertices.chunks_exact(3) {
                out.push(RasterTriangle {
                    vertices: [resolve(&tri[0]), resolve(&tri[1]), resolve(&tri[2])],
                    state,
                });
            }
        }
        out
    }
}

impl GpuDevice for RecordingDevice {
    fn open(&mut self, context: &DrawContextData) -> Result<(), DeviceError> {
        if self.fail_open {
            return Err(DeviceError::ContextCreation("injected context failure".to_string()));
        }
        if context.pane_width == 0 || context.pane_height == 0 {
            return Err(DeviceError::ContextCreation(format!(
                "pane size {}x{} is empty",
                context.pane_width, context.pane_height
            )));
        }
        self.open_count += 1;
        Ok(())
    }

    fn execute(&mut self, command: GpuCommand) {
        self.commands.push(command);
    }

    fn create_buffer(&mut self, vertices: &[GpuVertex], indices: &[u32]) -> Result<BufferId, DeviceError> {
        if self.fail_buffer_allocations {
            return Err(DeviceError::BufferAllocation("injected allocation failure".to_string()));
        }
        let id = BufferId(self.next_handle());
        self.buffers.insert(
            id,
            StoredBuffer { vertices: vertices.to_vec(), indices: indices.to_vec() },
        );
        self.buffer_uploads += 1;
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        // Recorded draws may still reference the contents
        if let Some(stored) = self.buffers.remove(&buffer) {
            self.retired.insert(buffer, stored);
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId, DeviceError> {
        if self.fail_texture_uploads {
            return Err(DeviceError::TextureUpload("injected upload failure".to_string()));
        }
        let id = TextureId(self.next_handle());
        self.textures.insert(id, (image.width(), image.height()));
        self.texture_uploads += 1;
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn present(&mut self) {
        self.frames_presented += 1;
    }

    fn max_lights(&self) -> usize {
        self.light_slots
    }
}
