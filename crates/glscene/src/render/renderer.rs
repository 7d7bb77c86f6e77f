//! # Renderer Core
//!
//! [`Renderer`] is driven by a view through a fixed protocol:
//!
//! ```text
//! start_frame → { start_pass → submit_* / update_* … → end_pass } → end_frame
//! ```
//!
//! `end_pass` returns [`ViewStatus::Retraverse`] while more passes are
//! planned (one additive pass per shadow-casting light) and
//! [`ViewStatus::Done`] after the last one. Opaque triangles are batched
//! per pass; transparent primitives are collected during the final pass and
//! drawn back-to-front when it ends.
//!
//! `update_*` calls only change the renderer's declarative state. GPU state
//! is brought up to date lazily when something is drawn, through the
//! [`GlStateTracker`], so an update that changes nothing costs nothing.
//!
//! Calls made out of protocol order are contract violations: they assert in
//! debug builds and return [`RenderError::InvalidState`] otherwise.

use super::error::{contract_violation, RenderError, RenderResult, RenderWarning, ViewStatus, WarningLog};
use super::gpu::{
    BlendMode, Capability, DepthFunc, GpuCommand, GpuDevice, GpuVertex, Primitive, ShaderProgram,
    TextureBinding,
};
use super::lights::LightState;
use super::matrix::MatrixState;
use super::opaque_buffer::OpaqueTriBuffer;
use super::state::{ColorState, GlStateTracker, GpuStateKey, StyleState};
use super::textures::TextureCache;
use super::trans_buffer::{TransBuffer, TransPrimitive};
use super::vbo_cache::{VboCache, VboCacheStats};
use super::vertex::Vertex;
use crate::config::RendererConfig;
use crate::foundation::math::{Mat4, Vec3};
use crate::scene::{
    AntiAliasStyleData, AttributeSet, BackfacingStyle, BoundingBox, Camera, ChannelFill, ClearMethod, ColorRgb,
    DrawContextData, FillStyle, FogStyleData, Illumination, InterpolationStyle, Light,
    OrientationStyle, TextureShader,
};

/// Counters for the current (or last completed) frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Passes started
    pub passes: usize,
    /// Primitives drawn or queued (triangles, segments, points)
    pub primitives: usize,
    /// Draw commands issued
    pub draw_calls: usize,
    /// State commands issued
    pub state_changes: usize,
    /// Redundant state commands dropped
    pub state_changes_avoided: usize,
    /// VBO cache hits
    pub vbo_hits: u64,
    /// VBO cache misses
    pub vbo_misses: u64,
    /// VBO cache evictions
    pub vbo_evictions: u64,
    /// Opaque batches flushed
    pub opaque_batches: usize,
    /// Transparent primitives flushed
    pub transparent_primitives: usize,
}

/// Position in the frame protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Between frames
    Idle,
    /// Inside a frame, between passes
    InFrame,
    /// Inside a pass
    InPass,
    /// The last pass has ended; only `end_frame` is valid
    PassesDone,
}

/// Comparable copy of the renderer's observable state
#[derive(Debug, Clone, PartialEq)]
pub struct RendererSnapshot {
    /// Protocol phase
    pub phase: FramePhase,
    /// Frames started
    pub frame_count: u64,
    /// Current pass
    pub pass_index: usize,
    /// Edit index of the draw context the device was opened for
    pub context_edit_index: Option<u32>,
    /// Frame counters
    pub stats: FrameStats,
    /// Transforms
    pub matrices: MatrixState,
    /// Lights and pass plan
    pub lights: LightState,
    /// View-level color state
    pub view_color: ColorState,
    /// Style state
    pub style: StyleState,
    /// Resident VBOs
    pub cached_buffers: usize,
    /// Resident textures
    pub cached_textures: usize,
    /// Queued opaque triangles
    pub queued_opaque: usize,
    /// Queued transparent primitives
    pub queued_transparent: usize,
    /// Warnings not yet taken
    pub pending_warnings: usize,
}

/// Interactive renderer over a GPU device
pub struct Renderer<D: GpuDevice> {
    pub(super) device: D,
    pub(super) config: RendererConfig,
    pub(super) tracker: GlStateTracker,
    pub(super) matrices: MatrixState,
    pub(super) lights: LightState,
    pub(super) textures: TextureCache,
    pub(super) vbo_cache: VboCache,
    pub(super) opaque: OpaqueTriBuffer,
    pub(super) trans: TransBuffer,
    pub(super) view_color: ColorState,
    pub(super) view_texture: Option<TextureShader>,
    pub(super) illumination: Illumination,
    pub(super) style: StyleState,
    pub(super) warnings: WarningLog,
    pub(super) stats: FrameStats,
    phase: FramePhase,
    pass_index: usize,
    frame_count: u64,
    context_edit_index: Option<u32>,
    vbo_stats_at_frame_start: VboCacheStats,
}

impl<D: GpuDevice> std::fmt::Debug for Renderer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("phase", &self.phase)
            .field("frame_count", &self.frame_count)
            .field("pass_index", &self.pass_index)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<D: GpuDevice> Renderer<D> {
    /// Create a renderer
    ///
    /// # Arguments
    /// * `device` - GPU device to draw through
    /// * `config` - Renderer settings, validated here
    pub fn new(device: D, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        log::info!(
            "Renderer created: {} light slots, {} KiB VBO budget, shadows {}",
            config.max_lights.min(device.max_lights()),
            config.vbo_budget_bytes / 1024,
            if config.shadows_enabled { "on" } else { "off" }
        );
        Ok(Self {
            vbo_cache: VboCache::new(config.vbo_budget_bytes),
            device,
            config,
            tracker: GlStateTracker::new(),
            matrices: MatrixState::new(),
            lights: LightState::new(),
            textures: TextureCache::new(),
            opaque: OpaqueTriBuffer::new(),
            trans: TransBuffer::new(),
            view_color: ColorState::default(),
            view_texture: None,
            illumination: Illumination::default(),
            style: StyleState::default(),
            warnings: WarningLog::new(),
            stats: FrameStats::default(),
            phase: FramePhase::Idle,
            pass_index: 0,
            frame_count: 0,
            context_edit_index: None,
            vbo_stats_at_frame_start: VboCacheStats::default(),
        })
    }

    /// The device
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Mutable device access
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Settings
    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Protocol phase
    pub const fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Index of the current pass
    pub const fn pass_index(&self) -> usize {
        self.pass_index
    }

    /// True during the first pass, which owns depth writes and ambient light
    pub const fn is_first_pass(&self) -> bool {
        self.pass_index == 0
    }

    /// True during the last planned pass
    pub fn is_final_pass(&self) -> bool {
        self.pass_index + 1 >= self.lights.pass_count()
    }

    /// Counters for the current or last frame
    pub fn stats(&self) -> FrameStats {
        let vbo = self.vbo_cache.stats();
        let start = self.vbo_stats_at_frame_start;
        FrameStats {
            draw_calls: self.tracker.draw_calls(),
            state_changes: self.tracker.state_changes(),
            state_changes_avoided: self.tracker.state_changes_avoided(),
            vbo_hits: vbo.hits - start.hits,
            vbo_misses: vbo.misses - start.misses,
            vbo_evictions: vbo.evictions - start.evictions,
            ..self.stats
        }
    }

    /// VBO cache, for inspection
    pub const fn vbo_cache(&self) -> &VboCache {
        &self.vbo_cache
    }

    /// Transparent primitives queued for the end of the pass
    pub fn queued_transparent(&self) -> &[TransPrimitive] {
        self.trans.primitives()
    }

    /// Opaque triangles queued for the end of the pass
    pub fn queued_opaque_triangles(&self) -> usize {
        self.opaque.triangle_count()
    }

    /// Warnings posted since the last call
    pub fn take_warnings(&mut self) -> Vec<RenderWarning> {
        self.warnings.take()
    }

    /// Warnings posted and not yet taken
    pub fn warnings(&self) -> &[RenderWarning] {
        self.warnings.warnings()
    }

    /// Capture the observable state
    pub fn snapshot(&self) -> RendererSnapshot {
        RendererSnapshot {
            phase: self.phase,
            frame_count: self.frame_count,
            pass_index: self.pass_index,
            context_edit_index: self.context_edit_index,
            stats: self.stats(),
            matrices: self.matrices,
            lights: self.lights.clone(),
            view_color: self.view_color,
            style: self.style.clone(),
            cached_buffers: self.vbo_cache.len(),
            cached_textures: self.textures.len(),
            queued_opaque: self.opaque.triangle_count(),
            queued_transparent: self.trans.len(),
            pending_warnings: self.warnings.len(),
        }
    }

    fn expect_phase(&self, phase: FramePhase, what: &'static str) -> RenderResult<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(contract_violation(what))
        }
    }

    pub(super) fn ensure_in_pass(&self) -> RenderResult<()> {
        self.expect_phase(FramePhase::InPass, "geometry submitted outside a pass")
    }

    /// Begin a frame
    ///
    /// Opens the device for the draw context if it changed since the last
    /// frame, then clears the framebuffer. If the device cannot be opened
    /// the renderer is left exactly as it was.
    pub fn start_frame(&mut self, context: &DrawContextData) -> RenderResult<()> {
        self.expect_phase(FramePhase::Idle, "start_frame called inside a frame")?;

        if self.context_edit_index != Some(context.edit_index) {
            self.device.open(context).map_err(RenderError::ContextCreationFailed)?;
            if self.context_edit_index.is_some() {
                // The context was rebuilt; device resources are gone
                log::info!("Draw context changed to {}x{}", context.pane_width, context.pane_height);
                self.vbo_cache.clear(&mut self.device);
                self.textures.clear(&mut self.device);
            }
            self.tracker.invalidate();
            self.context_edit_index = Some(context.edit_index);
        }

        self.frame_count += 1;
        self.pass_index = 0;
        self.stats = FrameStats::default();
        self.tracker.reset_counters();
        self.vbo_stats_at_frame_start = self.vbo_cache.stats();
        self.opaque.reset_frame();
        self.trans.clear();
        self.matrices.reset();
        log::trace!("Frame {} started", self.frame_count);

        self.tracker.apply(
            &mut self.device,
            GpuCommand::Viewport { width: context.pane_width, height: context.pane_height },
        );
        self.tracker.apply(&mut self.device, GpuCommand::DepthMask(true));
        let color = match context.clear_method {
            ClearMethod::WithColor => {
                let c = context.clear_color;
                Some([c.r, c.g, c.b, context.clear_alpha])
            }
            ClearMethod::None => None,
        };
        self.device.execute(GpuCommand::Clear { color, depth: context.clear_depth });

        self.phase = FramePhase::InFrame;
        Ok(())
    }

    /// Begin a pass
    ///
    /// The first pass of a frame resolves the light group and plans any
    /// shadow passes. Every pass resets styles and view colors to their
    /// defaults and installs the camera.
    pub fn start_pass(&mut self, camera: &Camera, lights: &[Light]) -> RenderResult<()> {
        self.expect_phase(FramePhase::InFrame, "start_pass called outside a frame or inside a pass")?;

        let world_to_camera = camera.world_to_view();
        self.matrices.set_camera(world_to_camera, camera.view_to_frustum());
        if self.pass_index == 0 {
            let slots = self.config.max_lights.min(self.device.max_lights());
            self.lights
                .configure(lights, &world_to_camera, slots, self.config.shadows_enabled, &mut self.warnings);
        }
        self.stats.passes += 1;

        self.view_color = ColorState::default();
        self.view_texture = None;
        self.illumination = Illumination::default();
        self.style = StyleState::default();

        let additive = self.lights.pass(self.pass_index).is_some_and(|p| p.additive);
        let device = &mut self.device;
        let tracker = &mut self.tracker;
        tracker.set_capability(device, Capability::DepthTest, true);
        if additive {
            tracker.apply(device, GpuCommand::DepthFunc(DepthFunc::LessEqual));
            tracker.apply(device, GpuCommand::DepthMask(false));
            tracker.set_capability(device, Capability::Blend, true);
            tracker.apply(device, GpuCommand::BlendFunc(BlendMode::Additive));
        } else {
            tracker.apply(device, GpuCommand::DepthFunc(DepthFunc::Less));
            tracker.apply(device, GpuCommand::DepthMask(true));
            tracker.set_capability(device, Capability::Blend, false);
        }
        tracker.apply(device, GpuCommand::LoadProjection(*self.matrices.camera_to_frustum()));
        tracker.apply(device, GpuCommand::AlphaTest(self.config.alpha_threshold));
        self.lights.emit_pass(device, tracker, self.pass_index);

        log::trace!("Pass {} of {} started", self.pass_index + 1, self.lights.pass_count());
        self.phase = FramePhase::InPass;
        Ok(())
    }

    /// End a pass, drawing everything buffered
    ///
    /// # Returns
    /// [`ViewStatus::Retraverse`] if the scene must be submitted again for
    /// another pass, [`ViewStatus::Done`] after the last pass.
    pub fn end_pass(&mut self) -> RenderResult<ViewStatus> {
        self.expect_phase(FramePhase::InPass, "end_pass called outside a pass")?;

        self.stats.opaque_batches +=
            self.opaque.flush(&mut self.device, &mut self.tracker, &self.style, &mut self.warnings);

        if self.is_final_pass() {
            if !self.trans.is_empty() {
                self.lights.emit_all(&mut self.device, &mut self.tracker);
                self.stats.transparent_primitives +=
                    self.trans.flush(&mut self.device, &mut self.tracker, &self.style);
            }
            self.phase = FramePhase::PassesDone;
            Ok(ViewStatus::Done)
        } else {
            self.pass_index += 1;
            self.phase = FramePhase::InFrame;
            Ok(ViewStatus::Retraverse)
        }
    }

    /// Finish the frame and present it
    pub fn end_frame(&mut self) -> RenderResult<()> {
        self.expect_phase(FramePhase::PassesDone, "end_frame called before the last pass ended")?;
        self.device.present();
        self.opaque.clear();
        self.trans.clear();
        self.phase = FramePhase::Idle;

        let stats = self.stats();
        log::trace!(
            "Frame {} done: {} primitives, {} draws, {} state changes avoided",
            self.frame_count,
            stats.primitives,
            stats.draw_calls,
            stats.state_changes_avoided
        );
        Ok(())
    }

    /// Abandon the current frame without presenting
    pub fn abort_frame(&mut self) {
        if self.phase != FramePhase::Idle {
            log::warn!("Frame {} aborted in pass {}", self.frame_count, self.pass_index);
        }
        self.opaque.clear();
        self.trans.clear();
        self.phase = FramePhase::Idle;
    }

    /// Release every cached device resource
    pub fn release_resources(&mut self) {
        self.vbo_cache.clear(&mut self.device);
        self.textures.clear(&mut self.device);
    }

    // Matrices

    /// Set the local-to-camera transform for following submissions
    pub fn update_local_to_camera(&mut self, matrix: Mat4) {
        self.matrices.set_local_to_camera(matrix);
    }

    /// Replace the projection
    pub fn update_camera_to_frustum(&mut self, matrix: Mat4) {
        if self.matrices.set_camera_to_frustum(matrix) && self.phase == FramePhase::InPass {
            log::trace!("Projection updated mid-pass");
            self.tracker.apply(&mut self.device, GpuCommand::LoadProjection(matrix));
        }
    }

    /// World-to-camera transform of the current pass
    pub fn world_to_camera(&self) -> Mat4 {
        *self.matrices.world_to_camera()
    }

    /// Whether a local bounding box can be on screen
    pub fn is_bounding_box_visible(&self, bounds: &BoundingBox) -> bool {
        self.matrices.is_bounding_box_visible(bounds)
    }

    // View colors. `None` restores the default for the channel.

    /// Set the view diffuse color
    pub fn update_diffuse_color(&mut self, color: Option<ColorRgb>) {
        self.view_color.diffuse = color.unwrap_or(ColorState::default().diffuse);
    }

    /// Set the view specular color
    pub fn update_specular_color(&mut self, color: Option<ColorRgb>) {
        self.view_color.specular = color.unwrap_or(ColorState::default().specular);
    }

    /// Set the view transparency color
    pub fn update_transparency_color(&mut self, color: Option<ColorRgb>) {
        self.view_color.transparency = color.unwrap_or(ColorState::default().transparency);
    }

    /// Set the view emissive color
    pub fn update_emissive_color(&mut self, color: Option<ColorRgb>) {
        self.view_color.emissive = color.unwrap_or(ColorState::default().emissive);
    }

    /// Set the view specular exponent
    pub fn update_specular_control(&mut self, value: Option<f32>) {
        self.view_color.specular_control = value.unwrap_or(ColorState::default().specular_control);
    }

    /// Set the view metallic factor
    pub fn update_metallic(&mut self, value: Option<f32>) {
        self.view_color.metallic = value.unwrap_or(ColorState::default().metallic);
    }

    /// Set the view highlight state
    pub fn update_hilite_state(&mut self, on: Option<bool>) {
        self.view_color.highlight = on.unwrap_or(false);
    }

    /// Replace every view color channel from an attribute set
    pub fn update_view_attributes(&mut self, attributes: &AttributeSet) {
        self.update_diffuse_color(attributes.diffuse_color);
        self.update_specular_color(attributes.specular_color);
        self.update_transparency_color(attributes.transparency_color);
        self.update_emissive_color(attributes.emissive_color);
        self.update_specular_control(attributes.specular_control);
        self.update_metallic(attributes.metallic);
        self.update_hilite_state(attributes.highlight_state);
    }

    /// View-level color state
    pub const fn view_color(&self) -> &ColorState {
        &self.view_color
    }

    // Shaders

    /// Set the view texture
    pub fn update_surface_shader(&mut self, shader: Option<TextureShader>) {
        self.view_texture = shader;
    }

    /// Set the illumination model
    pub fn update_illumination_shader(&mut self, illumination: Illumination) {
        self.illumination = illumination;
    }

    // Styles

    /// Set the interpolation style
    pub fn update_interpolation_style(&mut self, style: InterpolationStyle) {
        self.style.interpolation = style;
    }

    /// Set the backfacing style
    pub fn update_backfacing_style(&mut self, style: BackfacingStyle) {
        self.style.backfacing = style;
    }

    /// Set the fill style
    pub fn update_fill_style(&mut self, style: FillStyle) {
        self.style.set_fill(style);
    }

    /// Set the orientation style
    pub fn update_orientation_style(&mut self, style: OrientationStyle) {
        self.style.orientation = style;
    }

    /// Set the attributes applied to highlighted geometry
    pub fn update_highlight_style(&mut self, highlight: Option<AttributeSet>) {
        self.style.highlight = highlight;
    }

    /// Set the anti-alias style
    pub fn update_anti_alias_style(&mut self, style: AntiAliasStyleData) {
        self.style.anti_alias = style;
    }

    /// Set the fog style
    pub fn update_fog_style(&mut self, fog: FogStyleData) {
        self.style.set_fog(fog);
    }

    /// Set the cast-shadows style
    pub fn update_cast_shadows_style(&mut self, on: bool) {
        self.style.cast_shadows = on;
    }

    /// Set the receive-shadows style
    pub fn update_receive_shadows_style(&mut self, on: bool) {
        self.style.receive_shadows = on;
    }

    /// Set the line width style
    pub fn update_line_width_style(&mut self, width: f32) {
        self.style.line_width = width.max(0.0);
    }

    /// Current styles
    pub const fn style(&self) -> &StyleState {
        &self.style
    }

    // Shared by the geometry handlers

    /// Color state of a geometry: view state with the geometry's set
    /// overlaid, then the highlight style if the geometry is highlighted
    pub(super) fn geometry_color(&self, attributes: Option<&AttributeSet>) -> ColorState {
        let color = self.view_color.with_overrides(attributes);
        match &self.style.highlight {
            Some(highlight) if color.highlight => color.with_overrides(Some(highlight)),
            _ => color,
        }
    }

    /// Resolved colors for decomposed vertices that lack their own
    pub fn channel_fill(&self, attributes: Option<&AttributeSet>) -> ChannelFill {
        let color = self.geometry_color(attributes);
        ChannelFill {
            diffuse: color.diffuse,
            transparency: color.transparency,
            emissive: color.emissive,
        }
    }

    /// Record a warning found outside the renderer, such as while
    /// decomposing geometry
    pub fn post_warning(&mut self, warning: RenderWarning) {
        self.warnings.post(warning);
    }

    /// Texture of a geometry: its own surface shader, else the view's
    pub(super) fn geometry_texture(&mut self, attributes: Option<&AttributeSet>) -> Option<TextureBinding> {
        let shader = attributes
            .and_then(|a| a.surface_shader.clone())
            .or_else(|| self.view_texture.clone())?;
        self.textures.binding(&mut self.device, &shader, &mut self.warnings)
    }

    pub(super) fn texture_binding(&mut self, shader: &TextureShader) -> Option<TextureBinding> {
        self.textures.binding(&mut self.device, shader, &mut self.warnings)
    }

    /// Program variant for the current state
    pub(super) fn program(&self, lit: bool, textured: bool, vertex_colors: bool) -> ShaderProgram {
        ShaderProgram {
            illumination: if lit { self.illumination } else { Illumination::Nil },
            shading: self.style.shading(),
            textured,
            vertex_colors,
            fog: self.style.current_fog().is_some(),
            two_sided: self.style.two_sided(),
        }
    }

    /// Batch key for the current state
    pub(super) fn state_key(
        &self,
        program: ShaderProgram,
        texture: Option<TextureBinding>,
        color: &ColorState,
        lines: bool,
    ) -> GpuStateKey {
        let smooth = lines && self.config.line_smoothing && self.style.smooth_lines();
        GpuStateKey::new(program, texture, &self.style, color, smooth)
    }

    /// Queue a camera-space triangle
    ///
    /// Transparent triangles are only kept during the final pass, where
    /// they are drawn once with every light enabled.
    pub(super) fn emit_triangle(&mut self, key: GpuStateKey, vertices: [GpuVertex; 3], opaque: bool) {
        self.stats.primitives += 1;
        if opaque {
            if self.opaque.is_immediate() {
                OpaqueTriBuffer::draw_immediate(&mut self.device, &mut self.tracker, &self.style, &key, &vertices);
            } else {
                self.opaque.add_triangle(key, vertices);
            }
        } else if self.is_final_pass() {
            self.trans.add_primitive(TransPrimitive::new(Primitive::Triangles, vertices.to_vec(), key));
        }
    }

    /// Draw points or line segments
    ///
    /// Opaque primitives are drawn right away in local space. Transparent
    /// ones are queued per primitive in camera space.
    ///
    /// # Arguments
    /// * `primitive` - Points, Lines or LineStrip
    /// * `vertices` - Resolved local-space vertices
    /// * `color` - Geometry color state, for specular terms
    /// * `lit` - Whether every vertex carries a normal
    pub(super) fn emit_segments(&mut self, primitive: Primitive, vertices: &[Vertex], color: &ColorState, lit: bool) {
        let program = self.program(lit, false, true);
        let key = self.state_key(program, None, color, primitive != Primitive::Points);
        let fallback = Vec3::zeros();

        self.stats.primitives += match primitive {
            Primitive::Points => vertices.len(),
            Primitive::Lines => vertices.len() / 2,
            Primitive::LineStrip => vertices.len().saturating_sub(1),
            Primitive::Triangles => vertices.len() / 3,
        };

        if vertices.iter().all(Vertex::is_opaque) {
            let local: Vec<GpuVertex> = vertices.iter().map(|v| v.to_local_gpu(fallback)).collect();
            let fog = self.style.gpu_fog(key.fog);
            self.tracker.apply_key(&mut self.device, &key, key.baked_material(), fog);
            self.tracker.apply(&mut self.device, GpuCommand::LoadModelView(*self.matrices.local_to_camera()));
            if primitive == Primitive::Points {
                self.tracker.apply(&mut self.device, GpuCommand::PointSize(self.style.line_width.max(1.0)));
            }
            self.tracker.draw(&mut self.device, GpuCommand::DrawVertices { primitive, vertices: local });
            return;
        }

        if !self.is_final_pass() {
            return;
        }
        let camera: Vec<GpuVertex> = vertices.iter().map(|v| v.to_camera_gpu(&self.matrices, fallback)).collect();
        match primitive {
            Primitive::Points => {
                for v in camera {
                    self.trans.add_primitive(TransPrimitive::new(Primitive::Points, vec![v], key));
                }
            }
            Primitive::Lines => {
                for pair in camera.chunks_exact(2) {
                    self.trans.add_primitive(TransPrimitive::new(Primitive::Lines, pair.to_vec(), key));
                }
            }
            Primitive::LineStrip => {
                for pair in camera.windows(2) {
                    self.trans.add_primitive(TransPrimitive::new(Primitive::Lines, pair.to_vec(), key));
                }
            }
            Primitive::Triangles => {
                for tri in camera.chunks_exact(3) {
                    self.trans.add_primitive(TransPrimitive::new(Primitive::Triangles, tri.to_vec(), key));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;
    use crate::render::gpu::recording::RecordingDevice;
    use crate::scene::Attenuation;

    fn renderer() -> Renderer<RecordingDevice> {
        Renderer::new(RecordingDevice::new(), RendererConfig::default()).unwrap()
    }

    fn camera() -> Camera {
        Camera::perspective(Point3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RendererConfig { vbo_budget_bytes: 0, ..RendererConfig::default() };
        assert!(matches!(
            Renderer::new(RecordingDevice::new(), config),
            Err(RenderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_single_pass_frame_protocol() {
        let mut r = renderer();
        let context = DrawContextData::new(64, 48);
        r.start_frame(&context).unwrap();
        r.start_pass(&camera(), &[]).unwrap();
        assert_eq!(r.end_pass().unwrap(), ViewStatus::Done);
        r.end_frame().unwrap();

        assert_eq!(r.phase(), FramePhase::Idle);
        assert_eq!(r.device().frames_presented(), 1);
        assert_eq!(r.stats().passes, 1);
    }

    #[test]
    fn test_device_opened_only_when_context_changes() {
        let mut r = renderer();
        let mut context = DrawContextData::new(64, 48);
        for _ in 0..3 {
            r.start_frame(&context).unwrap();
            r.start_pass(&camera(), &[]).unwrap();
            r.end_pass().unwrap();
            r.end_frame().unwrap();
        }
        assert_eq!(r.device().open_count(), 1);

        context.resize(128, 96);
        r.start_frame(&context).unwrap();
        assert_eq!(r.device().open_count(), 2);
    }

    #[test]
    fn test_clear_follows_draw_context() {
        let mut r = renderer();
        let mut context = DrawContextData::new(8, 8);
        context.clear_method = ClearMethod::WithColor;
        context.clear_color = ColorRgb::new(0.1, 0.2, 0.3);
        r.start_frame(&context).unwrap();

        assert!(r.device().commands().iter().any(|c| matches!(
            c,
            GpuCommand::Clear { color: Some([r, g, b, _]), depth: true }
                if (*r, *g, *b) == (0.1, 0.2, 0.3)
        )));
    }

    #[test]
    fn test_shadow_lights_request_retraversal() {
        let config = RendererConfig { shadows_enabled: true, ..RendererConfig::default() };
        let mut r = Renderer::new(RecordingDevice::new(), config).unwrap();
        let lights = [
            Light::point(Point3::new(0.0, 5.0, 0.0), ColorRgb::WHITE, 1.0, Attenuation::None).with_shadows(true),
            Light::directional(-Vec3::y(), ColorRgb::WHITE, 1.0),
        ];

        r.start_frame(&DrawContextData::new(8, 8)).unwrap();
        r.start_pass(&camera(), &lights).unwrap();
        assert!(r.is_first_pass());
        assert_eq!(r.end_pass().unwrap(), ViewStatus::Retraverse);

        r.start_pass(&camera(), &lights).unwrap();
        assert!(!r.is_first_pass());
        assert!(r.is_final_pass());
        assert_eq!(r.end_pass().unwrap(), ViewStatus::Done);
        r.end_frame().unwrap();

        let commands = r.device().commands();
        assert!(commands.contains(&GpuCommand::BlendFunc(BlendMode::Additive)));
        assert!(commands.contains(&GpuCommand::DepthFunc(DepthFunc::LessEqual)));
        assert_eq!(r.stats().passes, 2);
    }

    #[test]
    fn test_view_color_updates_and_reset() {
        let mut r = renderer();
        r.update_diffuse_color(Some(ColorRgb::new(1.0, 0.0, 0.0)));
        r.update_transparency_color(Some(ColorRgb::gray(0.5)));
        assert_eq!(r.view_color().diffuse, ColorRgb::new(1.0, 0.0, 0.0));
        assert!(!r.view_color().is_opaque());

        r.update_diffuse_color(None);
        assert_eq!(r.view_color().diffuse, ColorRgb::WHITE);
    }

    #[test]
    fn test_highlight_overlays_geometry_color() {
        let mut r = renderer();
        r.update_highlight_style(Some(AttributeSet::new().with_diffuse(ColorRgb::new(1.0, 1.0, 0.0))));

        let plain = AttributeSet::new().with_diffuse(ColorRgb::new(0.0, 0.0, 1.0));
        assert_eq!(r.geometry_color(Some(&plain)).diffuse, ColorRgb::new(0.0, 0.0, 1.0));

        let lit = plain.clone().with_highlight(true);
        assert_eq!(r.geometry_color(Some(&lit)).diffuse, ColorRgb::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_unchanged_style_costs_no_commands() {
        let mut r = renderer();
        r.start_frame(&DrawContextData::new(8, 8)).unwrap();
        r.start_pass(&camera(), &[]).unwrap();
        let before = r.device().commands().len();
        r.update_backfacing_style(BackfacingStyle::Both);
        r.update_fill_style(FillStyle::Filled);
        assert_eq!(r.device().commands().len(), before);
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_out_of_order_calls_fail_in_release() {
        let mut r = renderer();
        assert!(matches!(r.end_pass(), Err(RenderError::InvalidState(_))));
        assert!(matches!(r.end_frame(), Err(RenderError::InvalidState(_))));
        assert!(matches!(r.start_pass(&camera(), &[]), Err(RenderError::InvalidState(_))));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_out_of_order_calls_assert_in_debug() {
        let mut r = renderer();
        let _ = r.end_pass();
    }
}
