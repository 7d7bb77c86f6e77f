//! OpenGL 3.3 core device over `glow`
//!
//! The application owns the window and hands over a loaded
//! [`glow::Context`]. Shader variants are compiled on first use from one
//! GLSL source with `#define` switches; uniforms are cached on the CPU and
//! re-sent whenever a different variant is bound.

#![allow(unsafe_code)]

use std::collections::HashMap;

use glow::{HasContext, PixelUnpackData, UniformLocation};

use super::{
    BlendMode, BufferId, Capability, CullMode, DepthFunc, DeviceError, FrontFace, GpuCommand,
    GpuDevice, GpuFog, GpuLight, GpuLightKind, GpuMaterial, GpuVertex, PolygonMode, Primitive,
    ShaderProgram, ShadingMode, TextureBinding, TextureId,
};
use crate::foundation::math::{utils, Mat4};
use crate::scene::{DrawContextData, FogMode, Illumination, TextureImage, UvBoundary};

const COMMON_SOURCE: &str = include_str!("shaders/common.glsl");
const VERTEX_SOURCE: &str = include_str!("shaders/scene.vert");
const FRAGMENT_SOURCE: &str = include_str!("shaders/scene.frag");

/// Light slots compiled into the shaders
pub const MAX_SHADER_LIGHTS: usize = 8;

struct LightLocations {
    kind: Option<UniformLocation>,
    color: Option<UniformLocation>,
    position: Option<UniformLocation>,
    direction: Option<UniformLocation>,
    attenuation: Option<UniformLocation>,
    cos_inner: Option<UniformLocation>,
    cos_outer: Option<UniformLocation>,
}

struct Locations {
    projection: Option<UniformLocation>,
    model_view: Option<UniformLocation>,
    normal_matrix: Option<UniformLocation>,
    point_size: Option<UniformLocation>,
    ambient: Option<UniformLocation>,
    diffuse: Option<UniformLocation>,
    specular: Option<UniformLocation>,
    emissive: Option<UniformLocation>,
    specular_control: Option<UniformLocation>,
    metallic: Option<UniformLocation>,
    texture: Option<UniformLocation>,
    alpha_threshold: Option<UniformLocation>,
    fog_mode: Option<UniformLocation>,
    fog_start: Option<UniformLocation>,
    fog_end: Option<UniformLocation>,
    fog_density: Option<UniformLocation>,
    fog_color: Option<UniformLocation>,
    lights: Vec<LightLocations>,
}

impl Locations {
    fn query(gl: &glow::Context, program: glow::Program) -> Self {
        let loc = |name: &str| unsafe { gl.get_uniform_location(program, name) };
        Self {
            projection: loc("u_projection"),
            model_view: loc("u_model_view"),
            normal_matrix: loc("u_normal_matrix"),
            point_size: loc("u_point_size"),
            ambient: loc("u_ambient"),
            diffuse: loc("u_diffuse"),
            specular: loc("u_specular"),
            emissive: loc("u_emissive"),
            specular_control: loc("u_specular_control"),
            metallic: loc("u_metallic"),
            texture: loc("u_texture"),
            alpha_threshold: loc("u_alpha_threshold"),
            fog_mode: loc("u_fog_mode"),
            fog_start: loc("u_fog_start"),
            fog_end: loc("u_fog_end"),
            fog_density: loc("u_fog_density"),
            fog_color: loc("u_fog_color"),
            lights: (0..MAX_SHADER_LIGHTS)
                .map(|i| LightLocations {
                    kind: loc(&format!("u_lights[{i}].kind")),
                    color: loc(&format!("u_lights[{i}].color")),
                    position: loc(&format!("u_lights[{i}].position")),
                    direction: loc(&format!("u_lights[{i}].direction")),
                    attenuation: loc(&format!("u_lights[{i}].attenuation")),
                    cos_inner: loc(&format!("u_lights[{i}].cos_inner")),
                    cos_outer: loc(&format!("u_lights[{i}].cos_outer")),
                })
                .collect(),
        }
    }
}

struct CompiledProgram {
    program: glow::Program,
    locations: Locations,
}

/// CPU copy of every uniform value
struct UniformCache {
    projection: Mat4,
    model_view: Mat4,
    point_size: f32,
    ambient: [f32; 3],
    material: GpuMaterial,
    lights: [Option<GpuLight>; MAX_SHADER_LIGHTS],
    fog: Option<GpuFog>,
    alpha_threshold: f32,
}

impl Default for UniformCache {
    fn default() -> Self {
        Self {
            projection: Mat4::identity(),
            model_view: Mat4::identity(),
            point_size: 1.0,
            ambient: [0.0; 3],
            material: GpuMaterial::default(),
            lights: [None; MAX_SHADER_LIGHTS],
            fog: None,
            alpha_threshold: 0.0,
        }
    }
}

struct GlBuffer {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    ibo: glow::Buffer,
}

struct StreamBuffer {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
}

/// Hook called to swap buffers at the end of a frame
pub type PresentHook = Box<dyn FnMut()>;

/// OpenGL device
pub struct GlowDevice {
    gl: glow::Context,
    programs: HashMap<ShaderProgram, Option<CompiledProgram>>,
    current: Option<ShaderProgram>,
    uniforms: UniformCache,
    buffers: HashMap<BufferId, GlBuffer>,
    textures: HashMap<TextureId, glow::Texture>,
    stream: Option<StreamBuffer>,
    next_handle: u32,
    present_hook: Option<PresentHook>,
}

impl std::fmt::Debug for GlowDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowDevice")
            .field("programs", &self.programs.len())
            .field("buffers", &self.buffers.len())
            .field("textures", &self.textures.len())
            .finish_non_exhaustive()
    }
}

/// Source prefix selecting a program variant
fn variant_header(program: &ShaderProgram) -> String {
    let mut header = String::from("#version 330 core\n");
    let mut define = |name: &str| {
        header.push_str("#define ");
        header.push_str(name);
        header.push('\n');
    };
    match program.illumination {
        Illumination::Nil => define("ILLUMINATION_NIL"),
        Illumination::Lambert => define("ILLUMINATION_LAMBERT"),
        Illumination::Phong => define("ILLUMINATION_PHONG"),
    }
    match program.shading {
        ShadingMode::Flat => define("FLAT_SHADING"),
        ShadingMode::Gouraud => {}
        ShadingMode::PerPixel => define("PER_PIXEL"),
    }
    if program.textured {
        define("TEXTURED");
    }
    if program.vertex_colors {
        define("VERTEX_COLORS");
    }
    if program.fog {
        define("FOG");
    }
    if program.two_sided {
        define("TWO_SIDED");
    }
    header
}

fn compile_variant(gl: &glow::Context, variant: &ShaderProgram) -> Result<CompiledProgram, DeviceError> {
    let header = variant_header(variant);
    unsafe {
        let program = gl.create_program().map_err(DeviceError::ShaderCompile)?;
        let compile = |ty, body: &str| -> Result<glow::Shader, String> {
            let sh = gl.create_shader(ty)?;
            let source = format!("{header}{COMMON_SOURCE}\n{body}");
            gl.shader_source(sh, &source);
            gl.compile_shader(sh);
            if !gl.get_shader_compile_status(sh) {
                let log = gl.get_shader_info_log(sh);
                gl.delete_shader(sh);
                return Err(log);
            }
            Ok(sh)
        };

        let vert = compile(glow::VERTEX_SHADER, VERTEX_SOURCE).map_err(DeviceError::ShaderCompile)?;
        let frag = match compile(glow::FRAGMENT_SHADER, FRAGMENT_SOURCE) {
            Ok(frag) => frag,
            Err(log) => {
                gl.delete_shader(vert);
                gl.delete_program(program);
                return Err(DeviceError::ShaderCompile(log));
            }
        };

        gl.attach_shader(program, vert);
        gl.attach_shader(program, frag);
        gl.link_program(program);
        let linked = gl.get_program_link_status(program);
        gl.detach_shader(program, vert);
        gl.detach_shader(program, frag);
        gl.delete_shader(vert);
        gl.delete_shader(frag);
        if !linked {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(DeviceError::ShaderCompile(log));
        }

        let locations = Locations::query(gl, program);
        Ok(CompiledProgram { program, locations })
    }
}

/// Bind the interleaved [`GpuVertex`] layout to the currently bound VAO/VBO
unsafe fn configure_vertex_layout(gl: &glow::Context) {
    let stride = GpuVertex::STRIDE as i32;
    let float = std::mem::size_of::<f32>() as i32;
    // (location, components, offset in floats)
    for (index, size, offset) in [(0, 3, 0), (1, 3, 3), (2, 2, 6), (3, 4, 8), (4, 3, 12)] {
        gl.enable_vertex_attrib_array(index);
        gl.vertex_attrib_pointer_f32(index, size, glow::FLOAT, false, stride, offset * float);
    }
}

const fn gl_primitive(primitive: Primitive) -> u32 {
    match primitive {
        Primitive::Points => glow::POINTS,
        Primitive::Lines => glow::LINES,
        Primitive::LineStrip => glow::LINE_STRIP,
        Primitive::Triangles => glow::TRIANGLES,
    }
}

const fn gl_wrap(boundary: UvBoundary) -> i32 {
    match boundary {
        UvBoundary::Wrap => glow::REPEAT as i32,
        UvBoundary::Clamp => glow::CLAMP_TO_EDGE as i32,
    }
}

impl GlowDevice {
    /// Wrap a loaded OpenGL context
    pub fn new(gl: glow::Context) -> Self {
        Self {
            gl,
            programs: HashMap::new(),
            current: None,
            uniforms: UniformCache::default(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            stream: None,
            next_handle: 1,
            present_hook: None,
        }
    }

    /// Builder: call `hook` after each frame to swap buffers
    pub fn with_present_hook(mut self, hook: PresentHook) -> Self {
        self.present_hook = Some(hook);
        self
    }

    fn next_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn current_program(&self) -> Option<&CompiledProgram> {
        self.current.and_then(|p| self.programs.get(&p)).and_then(Option::as_ref)
    }

    fn use_program(&mut self, variant: ShaderProgram) {
        if !self.programs.contains_key(&variant) {
            let compiled = match compile_variant(&self.gl, &variant) {
                Ok(compiled) => {
                    log::debug!("Compiled shader variant {:?}", variant);
                    Some(compiled)
                }
                Err(e) => {
                    log::error!("Shader variant {:?} unavailable: {}", variant, e);
                    None
                }
            };
            self.programs.insert(variant, compiled);
        }
        self.current = Some(variant);
        let program = self.current_program().map(|p| p.program);
        unsafe { self.gl.use_program(program) };
        self.upload_all();
    }

    fn upload_all(&self) {
        self.upload_matrices();
        self.upload_point_size();
        self.upload_ambient();
        self.upload_material();
        for slot in 0..MAX_SHADER_LIGHTS {
            self.upload_light(slot);
        }
        self.upload_fog();
        self.upload_alpha_threshold();
        if let Some(p) = self.current_program() {
            unsafe { self.gl.uniform_1_i32(p.locations.texture.as_ref(), 0) };
        }
    }

    fn upload_matrices(&self) {
        let Some(p) = self.current_program() else { return };
        let normal = utils::normal_matrix(&self.uniforms.model_view);
        unsafe {
            self.gl.uniform_matrix_4_f32_slice(
                p.locations.projection.as_ref(),
                false,
                self.uniforms.projection.as_slice(),
            );
            self.gl.uniform_matrix_4_f32_slice(
                p.locations.model_view.as_ref(),
                false,
                self.uniforms.model_view.as_slice(),
            );
            self.gl.uniform_matrix_3_f32_slice(p.locations.normal_matrix.as_ref(), false, normal.as_slice());
        }
    }

    fn upload_point_size(&self) {
        let Some(p) = self.current_program() else { return };
        unsafe { self.gl.uniform_1_f32(p.locations.point_size.as_ref(), self.uniforms.point_size) };
    }

    fn upload_ambient(&self) {
        let Some(p) = self.current_program() else { return };
        let [r, g, b] = self.uniforms.ambient;
        unsafe { self.gl.uniform_3_f32(p.locations.ambient.as_ref(), r, g, b) };
    }

    fn upload_material(&self) {
        let Some(p) = self.current_program() else { return };
        let m = &self.uniforms.material;
        let loc = &p.locations;
        unsafe {
            self.gl.uniform_4_f32_slice(loc.diffuse.as_ref(), &m.diffuse);
            self.gl.uniform_3_f32_slice(loc.specular.as_ref(), &m.specular);
            self.gl.uniform_3_f32_slice(loc.emissive.as_ref(), &m.emissive);
            self.gl.uniform_1_f32(loc.specular_control.as_ref(), m.specular_control);
            self.gl.uniform_1_f32(loc.metallic.as_ref(), m.metallic);
        }
    }

    fn upload_light(&self, slot: usize) {
        let Some(p) = self.current_program() else { return };
        let Some(loc) = p.locations.lights.get(slot) else { return };
        unsafe {
            match &self.uniforms.lights[slot] {
                None => self.gl.uniform_1_i32(loc.kind.as_ref(), -1),
                Some(light) => {
                    let kind = match light.kind {
                        GpuLightKind::Directional => 0,
                        GpuLightKind::Point => 1,
                        GpuLightKind::Spot => 2,
                    };
                    self.gl.uniform_1_i32(loc.kind.as_ref(), kind);
                    self.gl.uniform_3_f32_slice(loc.color.as_ref(), &light.color);
                    self.gl.uniform_3_f32_slice(loc.position.as_ref(), &light.position);
                    self.gl.uniform_3_f32_slice(loc.direction.as_ref(), &light.direction);
                    self.gl.uniform_3_f32_slice(loc.attenuation.as_ref(), &light.attenuation);
                    self.gl.uniform_1_f32(loc.cos_inner.as_ref(), light.spot_cos_inner);
                    self.gl.uniform_1_f32(loc.cos_outer.as_ref(), light.spot_cos_outer);
                }
            }
        }
    }

    fn upload_fog(&self) {
        let Some(p) = self.current_program() else { return };
        let Some(fog) = self.uniforms.fog else { return };
        let loc = &p.locations;
        let mode = match fog.mode {
            FogMode::Linear => 0,
            FogMode::Exponential => 1,
            FogMode::ExponentialSquared => 2,
        };
        unsafe {
            self.gl.uniform_1_i32(loc.fog_mode.as_ref(), mode);
            self.gl.uniform_1_f32(loc.fog_start.as_ref(), fog.start);
            self.gl.uniform_1_f32(loc.fog_end.as_ref(), fog.end);
            self.gl.uniform_1_f32(loc.fog_density.as_ref(), fog.density);
            self.gl.uniform_3_f32_slice(loc.fog_color.as_ref(), &fog.color);
        }
    }

    fn upload_alpha_threshold(&self) {
        let Some(p) = self.current_program() else { return };
        unsafe { self.gl.uniform_1_f32(p.locations.alpha_threshold.as_ref(), self.uniforms.alpha_threshold) };
    }

    fn set_capability(&self, capability: Capability, enabled: bool) {
        let cap = match capability {
            Capability::DepthTest => glow::DEPTH_TEST,
            Capability::Blend => glow::BLEND,
            Capability::CullFace => glow::CULL_FACE,
            Capability::LineSmooth => glow::LINE_SMOOTH,
        };
        unsafe {
            if enabled {
                self.gl.enable(cap);
            } else {
                self.gl.disable(cap);
            }
        }
    }

    fn bind_texture(&self, binding: Option<TextureBinding>) {
        let texture = binding.and_then(|b| self.textures.get(&b.texture).copied());
        unsafe {
            self.gl.active_texture(glow::TEXTURE0);
            self.gl.bind_texture(glow::TEXTURE_2D, texture);
            if let (Some(b), Some(_)) = (binding, texture) {
                self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, gl_wrap(b.u_boundary));
                self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, gl_wrap(b.v_boundary));
            }
        }
    }

    fn draw_vertices(&mut self, primitive: Primitive, vertices: &[GpuVertex]) {
        if vertices.is_empty() || self.current_program().is_none() {
            return;
        }
        if self.stream.is_none() {
            let created = unsafe {
                self.gl.create_vertex_array().and_then(|vao| {
                    let vbo = self.gl.create_buffer()?;
                    self.gl.bind_vertex_array(Some(vao));
                    self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
                    configure_vertex_layout(&self.gl);
                    self.gl.bind_vertex_array(None);
                    Ok(StreamBuffer { vao, vbo })
                })
            };
            match created {
                Ok(stream) => self.stream = Some(stream),
                Err(e) => {
                    log::error!("Failed to create streaming vertex buffer: {}", e);
                    return;
                }
            }
        }
        let Some(stream) = &self.stream else { return };
        unsafe {
            self.gl.bind_vertex_array(Some(stream.vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(stream.vbo));
            self.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(vertices), glow::STREAM_DRAW);
            self.gl.draw_arrays(gl_primitive(primitive), 0, vertices.len() as i32);
            self.gl.bind_vertex_array(None);
        }
    }

    fn draw_buffer(&self, buffer: BufferId, primitive: Primitive, count: u32) {
        let Some(b) = self.buffers.get(&buffer) else {
            log::warn!("Draw of unknown buffer {:?} ignored", buffer);
            return;
        };
        if self.current_program().is_none() {
            return;
        }
        unsafe {
            self.gl.bind_vertex_array(Some(b.vao));
            self.gl.draw_elements(gl_primitive(primitive), count as i32, glow::UNSIGNED_INT, 0);
            self.gl.bind_vertex_array(None);
        }
    }
}

impl GpuDevice for GlowDevice {
    fn open(&mut self, context: &DrawContextData) -> Result<(), DeviceError> {
        let version = self.gl.version();
        if version.is_embedded || (version.major, version.minor) < (3, 3) {
            return Err(DeviceError::ContextCreation(format!(
                "OpenGL 3.3 core required, context reports {}.{}",
                version.major, version.minor
            )));
        }
        log::info!(
            "OpenGL {}.{} context opened for {}x{} pane",
            version.major,
            version.minor,
            context.pane_width,
            context.pane_height
        );
        unsafe {
            self.gl.enable(glow::PROGRAM_POINT_SIZE);
            self.gl.viewport(0, 0, context.pane_width as i32, context.pane_height as i32);
        }
        Ok(())
    }

    fn execute(&mut self, command: GpuCommand) {
        match command {
            GpuCommand::Clear { color, depth } => unsafe {
                let mut mask = 0;
                if let Some([r, g, b, a]) = color {
                    self.gl.clear_color(r, g, b, a);
                    mask |= glow::COLOR_BUFFER_BIT;
                }
                if depth {
                    mask |= glow::DEPTH_BUFFER_BIT;
                }
                if mask != 0 {
                    self.gl.clear(mask);
                }
            },
            GpuCommand::Viewport { width, height } => unsafe {
                self.gl.viewport(0, 0, width as i32, height as i32);
            },
            GpuCommand::SetCapability { capability, enabled } => self.set_capability(capability, enabled),
            GpuCommand::DepthMask(on) => unsafe { self.gl.depth_mask(on) },
            GpuCommand::DepthFunc(func) => unsafe {
                self.gl.depth_func(match func {
                    DepthFunc::Less => glow::LESS,
                    DepthFunc::LessEqual => glow::LEQUAL,
                });
            },
            GpuCommand::BlendFunc(mode) => unsafe {
                match mode {
                    BlendMode::Alpha => self.gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA),
                    BlendMode::Additive => self.gl.blend_func(glow::ONE, glow::ONE),
                }
            },
            GpuCommand::CullFace(mode) => unsafe {
                self.gl.cull_face(match mode {
                    CullMode::Back => glow::BACK,
                    CullMode::Front => glow::FRONT,
                });
            },
            GpuCommand::FrontFace(face) => unsafe {
                self.gl.front_face(match face {
                    FrontFace::Ccw => glow::CCW,
                    FrontFace::Cw => glow::CW,
                });
            },
            GpuCommand::PolygonMode(mode) => unsafe {
                let mode = match mode {
                    PolygonMode::Fill => glow::FILL,
                    PolygonMode::Line => glow::LINE,
                    PolygonMode::Point => glow::POINT,
                };
                self.gl.polygon_mode(glow::FRONT_AND_BACK, mode);
            },
            GpuCommand::LineWidth(width) => unsafe { self.gl.line_width(width) },
            GpuCommand::PointSize(size) => {
                self.uniforms.point_size = size;
                self.upload_point_size();
            }
            GpuCommand::LoadProjection(m) => {
                self.uniforms.projection = m;
                self.upload_matrices();
            }
            GpuCommand::LoadModelView(m) => {
                self.uniforms.model_view = m;
                self.upload_matrices();
            }
            GpuCommand::SetLight { slot, light } => {
                if slot < MAX_SHADER_LIGHTS {
                    self.uniforms.lights[slot] = light;
                    self.upload_light(slot);
                }
            }
            GpuCommand::SetAmbient(color) => {
                self.uniforms.ambient = color;
                self.upload_ambient();
            }
            GpuCommand::SetMaterial(material) => {
                self.uniforms.material = material;
                self.upload_material();
            }
            GpuCommand::SetFog(fog) => {
                self.uniforms.fog = fog;
                self.upload_fog();
            }
            GpuCommand::BindTexture(binding) => self.bind_texture(binding),
            GpuCommand::UseProgram(program) => self.use_program(program),
            GpuCommand::AlphaTest(threshold) => {
                self.uniforms.alpha_threshold = threshold;
                self.upload_alpha_threshold();
            }
            GpuCommand::DrawBuffer { buffer, primitive, count } => self.draw_buffer(buffer, primitive, count),
            GpuCommand::DrawVertices { primitive, vertices } => self.draw_vertices(primitive, &vertices),
        }
    }

    fn create_buffer(&mut self, vertices: &[GpuVertex], indices: &[u32]) -> Result<BufferId, DeviceError> {
        let buffer = unsafe {
            let vao = self.gl.create_vertex_array().map_err(DeviceError::BufferAllocation)?;
            let vbo = self.gl.create_buffer().map_err(DeviceError::BufferAllocation)?;
            let ibo = self.gl.create_buffer().map_err(DeviceError::BufferAllocation)?;

            self.gl.bind_vertex_array(Some(vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            self.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(vertices), glow::STATIC_DRAW);
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
            self.gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(indices), glow::STATIC_DRAW);
            configure_vertex_layout(&self.gl);
            self.gl.bind_vertex_array(None);

            if self.gl.get_error() == glow::OUT_OF_MEMORY {
                self.gl.delete_vertex_array(vao);
                self.gl.delete_buffer(vbo);
                self.gl.delete_buffer(ibo);
                return Err(DeviceError::BufferAllocation(format!(
                    "out of memory uploading {} vertices",
                    vertices.len()
                )));
            }
            GlBuffer { vao, vbo, ibo }
        };
        let id = BufferId(self.next_handle());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(b) = self.buffers.remove(&buffer) {
            unsafe {
                self.gl.delete_vertex_array(b.vao);
                self.gl.delete_buffer(b.vbo);
                self.gl.delete_buffer(b.ibo);
            }
        }
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureId, DeviceError> {
        let texture = unsafe {
            let t = self.gl.create_texture().map_err(DeviceError::TextureUpload)?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(t));
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                image.width() as i32,
                image.height() as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(image.pixels())),
            );
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            if self.gl.get_error() == glow::OUT_OF_MEMORY {
                self.gl.delete_texture(t);
                return Err(DeviceError::TextureUpload(format!(
                    "out of memory uploading {}x{} texture",
                    image.width(),
                    image.height()
                )));
            }
            t
        };
        let id = TextureId(self.next_handle());
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(t) = self.textures.remove(&texture) {
            unsafe { self.gl.delete_texture(t) };
        }
    }

    fn present(&mut self) {
        unsafe { self.gl.flush() };
        if let Some(hook) = self.present_hook.as_mut() {
            hook();
        }
    }

    fn max_lights(&self) -> usize {
        MAX_SHADER_LIGHTS
    }
}

impl Drop for GlowDevice {
    fn drop(&mut self) {
        let buffers: Vec<BufferId> = self.buffers.keys().copied().collect();
        for buffer in buffers {
            self.delete_buffer(buffer);
        }
        let textures: Vec<TextureId> = self.textures.keys().copied().collect();
        for texture in textures {
            self.delete_texture(texture);
        }
        unsafe {
            if let Some(stream) = self.stream.take() {
                self.gl.delete_vertex_array(stream.vao);
                self.gl.delete_buffer(stream.vbo);
            }
            for program in self.programs.values().flatten() {
                self.gl.delete_program(program.program);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_header_defines() {
        let program = ShaderProgram {
            illumination: Illumination::Lambert,
            shading: ShadingMode::Flat,
            textured: true,
            vertex_colors: false,
            fog: true,
            two_sided: false,
        };
        let header = variant_header(&program);
        assert!(header.starts_with("#version 330 core\n"));
        assert!(header.contains("#define ILLUMINATION_LAMBERT\n"));
        assert!(header.contains("#define FLAT_SHADING\n"));
        assert!(header.contains("#define TEXTURED\n"));
        assert!(header.contains("#define FOG\n"));
        assert!(!header.contains("VERTEX_COLORS"));
    }

    #[test]
    fn test_shader_light_count_matches_source() {
        assert!(COMMON_SOURCE.contains(&format!("#define MAX_LIGHTS {MAX_SHADER_LIGHTS}")));
    }
}
