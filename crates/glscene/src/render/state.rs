//! # Renderer State
//!
//! The declarative side of the pipeline state machine:
//!
//! - [`ColorState`] holds resolved material channels. The renderer keeps a
//!   view-level instance, and each geometry derives its own by overlaying
//!   its attribute set.
//! - [`StyleState`] holds the current styles set by `Update*Style` calls.
//! - [`GpuStateKey`] is the subset of state that must match for primitives
//!   to share a draw call.
//!
//! [`GlStateTracker`] is the pure state-diff layer. Every state command
//! passes through it on the way to the device, and commands that would not
//! change anything are dropped and counted.

use std::collections::HashMap;

use super::gpu::{
    Capability, CullMode, FrontFace, GpuCommand, GpuDevice, GpuFog, GpuMaterial, PolygonMode,
    ShaderProgram, ShadingMode, TextureBinding,
};
use crate::scene::{
    AntiAliasMode, AntiAliasStyleData, AttributeSet, BackfacingStyle, ColorRgb, FillStyle,
    FogStyleData, InterpolationStyle, OrientationStyle,
};

/// Default specular exponent
pub const DEFAULT_SPECULAR_CONTROL: f32 = 4.0;

/// Resolved material channels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorState {
    /// Diffuse color
    pub diffuse: ColorRgb,
    /// Specular color
    pub specular: ColorRgb,
    /// Per-channel opacity, white is opaque
    pub transparency: ColorRgb,
    /// Emissive color
    pub emissive: ColorRgb,
    /// Specular exponent
    pub specular_control: f32,
    /// Metallic factor
    pub metallic: f32,
    /// Highlight state
    pub highlight: bool,
}

impl Default for ColorState {
    fn default() -> Self {
        Self {
            diffuse: ColorRgb::WHITE,
            specular: ColorRgb::WHITE,
            transparency: ColorRgb::WHITE,
            emissive: ColorRgb::BLACK,
            specular_control: DEFAULT_SPECULAR_CONTROL,
            metallic: 0.0,
            highlight: false,
        }
    }
}

impl ColorState {
    /// Alpha implied by the transparency color
    pub fn alpha(&self) -> f32 {
        self.transparency.transparency_alpha()
    }

    /// True if primitives drawn with this state need no blending
    pub fn is_opaque(&self) -> bool {
        self.alpha() >= 1.0
    }

    /// Replace every channel the attribute set specifies
    ///
    /// Channels are resolved independently: a set with only a diffuse color
    /// leaves transparency, emissive and the rest untouched.
    pub fn with_overrides(&self, attributes: Option<&AttributeSet>) -> Self {
        let Some(set) = attributes else { return *self };
        Self {
            diffuse: set.diffuse_color.unwrap_or(self.diffuse),
            specular: set.specular_color.unwrap_or(self.specular),
            transparency: set.transparency_color.unwrap_or(self.transparency),
            emissive: set.emissive_color.unwrap_or(self.emissive),
            specular_control: set.specular_control.unwrap_or(self.specular_control),
            metallic: set.metallic.unwrap_or(self.metallic),
            highlight: set.highlight_state.unwrap_or(self.highlight),
        }
    }
}

/// Current style values
#[derive(Debug, Clone, PartialEq)]
pub struct StyleState {
    /// Shading interpolation
    pub interpolation: InterpolationStyle,
    /// Back-face handling
    pub backfacing: BackfacingStyle,
    /// Fill mode
    pub fill: FillStyle,
    /// Front-face winding
    pub orientation: OrientationStyle,
    /// Attributes overlaid on highlighted geometry
    pub highlight: Option<AttributeSet>,
    /// Anti-aliasing request
    pub anti_alias: AntiAliasStyleData,
    /// Whether geometry casts shadows
    pub cast_shadows: bool,
    /// Whether geometry receives shadows
    pub receive_shadows: bool,
    /// Line width in pixels
    pub line_width: f32,
    /// TriMesh explicit edges replace triangle outlines
    pub explicit_edges: bool,
    fogs: Vec<FogStyleData>,
    current_fog: usize,
}

impl Default for StyleState {
    fn default() -> Self {
        Self {
            interpolation: InterpolationStyle::default(),
            backfacing: BackfacingStyle::default(),
            fill: FillStyle::default(),
            orientation: OrientationStyle::default(),
            highlight: None,
            anti_alias: AntiAliasStyleData::default(),
            cast_shadows: true,
            receive_shadows: true,
            line_width: 1.0,
            explicit_edges: false,
            fogs: vec![FogStyleData::OFF],
            current_fog: 0,
        }
    }
}

impl StyleState {
    /// Set the fill style
    pub fn set_fill(&mut self, fill: FillStyle) {
        self.fill = fill;
        self.explicit_edges = fill == FillStyle::Edges;
    }

    /// Make `fog` current, returning its index in the fog list
    ///
    /// Identical fog styles share one entry.
    pub fn set_fog(&mut self, fog: FogStyleData) -> usize {
        let index = match self.fogs.iter().position(|f| *f == fog) {
            Some(index) => index,
            None => {
                self.fogs.push(fog);
                self.fogs.len() - 1
            }
        };
        self.current_fog = index;
        index
    }

    /// Index of the current fog style, `None` when fog is off
    pub fn current_fog(&self) -> Option<usize> {
        self.fogs.get(self.current_fog).filter(|f| f.state).map(|_| self.current_fog)
    }

    /// Number of distinct fog styles seen this pass
    pub fn fog_count(&self) -> usize {
        self.fogs.len()
    }

    /// Fog uniforms for a fog index
    pub fn gpu_fog(&self, index: Option<usize>) -> Option<GpuFog> {
        let fog = self.fogs.get(index?).filter(|f| f.state)?;
        Some(GpuFog {
            mode: fog.mode,
            start: fog.fog_start,
            end: fog.fog_end,
            density: fog.density,
            color: fog.color.to_array(),
        })
    }

    /// Shading mode implied by the interpolation style
    pub const fn shading(&self) -> ShadingMode {
        match self.interpolation {
            InterpolationStyle::None => ShadingMode::Flat,
            InterpolationStyle::Vertex => ShadingMode::Gouraud,
            InterpolationStyle::Pixel => ShadingMode::PerPixel,
        }
    }

    /// Faces to cull, `None` to draw both sides
    pub const fn cull(&self) -> Option<CullMode> {
        match self.backfacing {
            BackfacingStyle::RemoveBack => Some(CullMode::Back),
            BackfacingStyle::RemoveFront => Some(CullMode::Front),
            BackfacingStyle::Both | BackfacingStyle::Flip => None,
        }
    }

    /// Whether back faces are lit with flipped normals
    pub fn two_sided(&self) -> bool {
        self.backfacing == BackfacingStyle::Flip
    }

    /// Front-face winding
    pub const fn front_face(&self) -> FrontFace {
        match self.orientation {
            OrientationStyle::CounterClockwise => FrontFace::Ccw,
            OrientationStyle::Clockwise => FrontFace::Cw,
        }
    }

    /// Polygon rasterization mode
    pub const fn polygon_mode(&self) -> PolygonMode {
        match self.fill {
            FillStyle::Filled => PolygonMode::Fill,
            FillStyle::Edges => PolygonMode::Line,
            FillStyle::Points => PolygonMode::Point,
        }
    }

    /// Whether lines and edges should be smoothed
    pub fn smooth_lines(&self) -> bool {
        self.anti_alias.state && matches!(self.anti_alias.mode, AntiAliasMode::Edges | AntiAliasMode::All)
    }
}

/// Draw-call-level state shared by every primitive of a batch
///
/// Float fields are stored as bit patterns so keys can be hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuStateKey {
    /// Program variant
    pub program: ShaderProgram,
    /// Bound texture, if the program samples one
    pub texture: Option<TextureBinding>,
    /// Culling
    pub cull: Option<CullMode>,
    /// Front-face winding
    pub front_face: FrontFace,
    /// Polygon mode
    pub polygon_mode: PolygonMode,
    /// Line smoothing
    pub line_smooth: bool,
    /// Index into the pass's fog list
    pub fog: Option<usize>,
    line_width: u32,
    specular: [u32; 3],
    specular_control: u32,
    metallic: u32,
}

impl GpuStateKey {
    /// Build a key from the current styles and a resolved color state
    pub fn new(
        program: ShaderProgram,
        texture: Option<TextureBinding>,
        style: &StyleState,
        color: &ColorState,
        line_smooth: bool,
    ) -> Self {
        let specular = color.specular.to_array();
        Self {
            program,
            texture: texture.filter(|_| program.textured),
            cull: style.cull(),
            front_face: style.front_face(),
            polygon_mode: style.polygon_mode(),
            line_smooth,
            fog: style.current_fog().filter(|_| program.fog),
            line_width: style.line_width.to_bits(),
            specular: specular.map(f32::to_bits),
            specular_control: color.specular_control.to_bits(),
            metallic: color.metallic.to_bits(),
        }
    }

    /// Line width in pixels
    pub fn line_width(&self) -> f32 {
        f32::from_bits(self.line_width)
    }

    /// Material for a draw whose vertices carry color and emission
    pub fn baked_material(&self) -> GpuMaterial {
        self.material([1.0; 4], [0.0; 3])
    }

    /// Material with the key's specular terms and the given colors
    pub fn material(&self, diffuse: [f32; 4], emissive: [f32; 3]) -> GpuMaterial {
        GpuMaterial {
            diffuse,
            specular: self.specular.map(f32::from_bits),
            emissive,
            specular_control: f32::from_bits(self.specular_control),
            metallic: f32::from_bits(self.metallic),
        }
    }
}

/// Piece of device state a command overwrites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StateSlot {
    Viewport,
    Capability(Capability),
    DepthMask,
    DepthFunc,
    BlendFunc,
    CullFace,
    FrontFace,
    PolygonMode,
    LineWidth,
    PointSize,
    Projection,
    ModelView,
    Light(usize),
    Ambient,
    Material,
    Fog,
    Texture,
    Program,
    AlphaTest,
}

impl StateSlot {
    /// Slot written by a command, `None` for clears and draws
    const fn of(command: &GpuCommand) -> Option<Self> {
        Some(match command {
            GpuCommand::Viewport { .. } => Self::Viewport,
            GpuCommand::SetCapability { capability, .. } => Self::Capability(*capability),
            GpuCommand::DepthMask(_) => Self::DepthMask,
            GpuCommand::DepthFunc(_) => Self::DepthFunc,
            GpuCommand::BlendFunc(_) => Self::BlendFunc,
            GpuCommand::CullFace(_) => Self::CullFace,
            GpuCommand::FrontFace(_) => Self::FrontFace,
            GpuCommand::PolygonMode(_) => Self::PolygonMode,
            GpuCommand::LineWidth(_) => Self::LineWidth,
            GpuCommand::PointSize(_) => Self::PointSize,
            GpuCommand::LoadProjection(_) => Self::Projection,
            GpuCommand::LoadModelView(_) => Self::ModelView,
            GpuCommand::SetLight { slot, .. } => Self::Light(*slot),
            GpuCommand::SetAmbient(_) => Self::Ambient,
            GpuCommand::SetMaterial(_) => Self::Material,
            GpuCommand::SetFog(_) => Self::Fog,
            GpuCommand::BindTexture(_) => Self::Texture,
            GpuCommand::UseProgram(_) => Self::Program,
            GpuCommand::AlphaTest(_) => Self::AlphaTest,
            GpuCommand::Clear { .. } | GpuCommand::DrawBuffer { .. } | GpuCommand::DrawVertices { .. } => {
                return None
            }
        })
    }
}

/// Last state sent to the device, per slot
#[derive(Debug, Default)]
pub struct GlStateTracker {
    current: HashMap<StateSlot, GpuCommand>,
    emitted: usize,
    avoided: usize,
    draws: usize,
}

impl GlStateTracker {
    /// Create a tracker that knows nothing about device state
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all known state, so every next command is emitted
    ///
    /// Required whenever the device context is (re)created.
    pub fn invalidate(&mut self) {
        self.current.clear();
    }

    /// Reset the per-frame counters
    pub fn reset_counters(&mut self) {
        self.emitted = 0;
        self.avoided = 0;
        self.draws = 0;
    }

    /// Decide whether a command changes device state
    ///
    /// Returns the command if it must be sent, `None` if the device is
    /// already in that state.
    pub fn filter(&mut self, command: GpuCommand) -> Option<GpuCommand> {
        let Some(slot) = StateSlot::of(&command) else {
            return Some(command);
        };
        if self.current.get(&slot) == Some(&command) {
            self.avoided += 1;
            return None;
        }
        self.current.insert(slot, command.clone());
        self.emitted += 1;
        Some(command)
    }

    /// Send a command if it changes anything
    pub fn apply<D: GpuDevice + ?Sized>(&mut self, device: &mut D, command: GpuCommand) {
        if let Some(command) = self.filter(command) {
            device.execute(command);
        }
    }

    /// Send a draw request
    pub fn draw<D: GpuDevice + ?Sized>(&mut self, device: &mut D, command: GpuCommand) {
        debug_assert!(command.is_draw());
        self.draws += 1;
        device.execute(command);
    }

    /// Enable or disable a capability
    pub fn set_capability<D: GpuDevice + ?Sized>(&mut self, device: &mut D, capability: Capability, enabled: bool) {
        self.apply(device, GpuCommand::SetCapability { capability, enabled });
    }

    /// Bring every piece of state named by a key up to date
    ///
    /// # Arguments
    /// * `device` - Target device
    /// * `key` - Batch state
    /// * `material` - Material uniforms for the draw
    /// * `fog` - Resolved fog for the key's fog index
    pub fn apply_key<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        key: &GpuStateKey,
        material: GpuMaterial,
        fog: Option<GpuFog>,
    ) {
        self.apply(device, GpuCommand::UseProgram(key.program));
        self.apply(device, GpuCommand::SetMaterial(material));
        self.apply(device, GpuCommand::BindTexture(key.texture));
        self.apply(device, GpuCommand::SetFog(fog));
        self.set_capability(device, Capability::CullFace, key.cull.is_some());
        if let Some(mode) = key.cull {
            self.apply(device, GpuCommand::CullFace(mode));
        }
        self.apply(device, GpuCommand::FrontFace(key.front_face));
        self.apply(device, GpuCommand::PolygonMode(key.polygon_mode));
        self.apply(device, GpuCommand::LineWidth(key.line_width()));
        self.set_capability(device, Capability::LineSmooth, key.line_smooth);
    }

    /// State commands sent since the counters were reset
    pub const fn state_changes(&self) -> usize {
        self.emitted
    }

    /// Redundant state commands dropped since the counters were reset
    pub const fn state_changes_avoided(&self) -> usize {
        self.avoided
    }

    /// Draw commands sent since the counters were reset
    pub const fn draw_calls(&self) -> usize {
        self.draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gpu::recording::RecordingDevice;
    use crate::scene::FogMode;

    #[test]
    fn test_color_state_channels_resolve_independently() {
        let view = ColorState {
            transparency: ColorRgb::gray(0.5),
            ..ColorState::default()
        };
        let geometry = AttributeSet::new().with_diffuse(ColorRgb::new(1.0, 0.0, 0.0));

        let resolved = view.with_overrides(Some(&geometry));
        assert_eq!(resolved.diffuse, ColorRgb::new(1.0, 0.0, 0.0));
        // Transparency is inherited from the view
        assert!((resolved.alpha() - 0.5).abs() < 1e-6);
        assert!(!resolved.is_opaque());
        assert_eq!(view.with_overrides(None), view);
    }

    #[test]
    fn test_tracker_drops_redundant_state() {
        let mut device = RecordingDevice::new();
        let mut tracker = GlStateTracker::new();

        tracker.apply(&mut device, GpuCommand::DepthMask(true));
        tracker.apply(&mut device, GpuCommand::DepthMask(true));
        tracker.apply(&mut device, GpuCommand::DepthMask(false));
        tracker.set_capability(&mut device, Capability::Blend, false);
        tracker.set_capability(&mut device, Capability::Blend, false);

        assert_eq!(device.commands().len(), 3);
        assert_eq!(tracker.state_changes(), 3);
        assert_eq!(tracker.state_changes_avoided(), 2);
    }

    #[test]
    fn test_tracker_invalidate_forces_reemission() {
        let mut tracker = GlStateTracker::new();
        assert!(tracker.filter(GpuCommand::LineWidth(2.0)).is_some());
        assert!(tracker.filter(GpuCommand::LineWidth(2.0)).is_none());
        tracker.invalidate();
        assert!(tracker.filter(GpuCommand::LineWidth(2.0)).is_some());
    }

    #[test]
    fn test_clears_and_draws_always_pass() {
        let mut tracker = GlStateTracker::new();
        let clear = GpuCommand::Clear { color: None, depth: true };
        assert!(tracker.filter(clear.clone()).is_some());
        assert!(tracker.filter(clear).is_some());
        assert_eq!(tracker.state_changes_avoided(), 0);
    }

    #[test]
    fn test_light_slots_are_tracked_separately() {
        let mut tracker = GlStateTracker::new();
        assert!(tracker.filter(GpuCommand::SetLight { slot: 0, light: None }).is_some());
        assert!(tracker.filter(GpuCommand::SetLight { slot: 1, light: None }).is_some());
        assert!(tracker.filter(GpuCommand::SetLight { slot: 0, light: None }).is_none());
    }

    #[test]
    fn test_fog_list_deduplicates() {
        let mut style = StyleState::default();
        assert_eq!(style.current_fog(), None);

        let fog = FogStyleData {
            state: true,
            mode: FogMode::Exponential,
            density: 0.2,
            ..FogStyleData::OFF
        };
        let first = style.set_fog(fog);
        let second = style.set_fog(fog);
        assert_eq!(first, second);
        assert_eq!(style.fog_count(), 2);
        assert_eq!(style.current_fog(), Some(first));
        assert_eq!(style.gpu_fog(Some(first)).map(|f| f.mode), Some(FogMode::Exponential));

        style.set_fog(FogStyleData::OFF);
        assert_eq!(style.current_fog(), None);
    }

    #[test]
    fn test_key_distinguishes_line_width_and_specular() {
        let style = StyleState::default();
        let color = ColorState::default();
        let program = ShaderProgram::default();
        let base = GpuStateKey::new(program, None, &style, &color, false);

        let wide = StyleState { line_width: 3.0, ..StyleState::default() };
        assert_ne!(base, GpuStateKey::new(program, None, &wide, &color, false));

        let shiny = ColorState { specular_control: 64.0, ..color };
        let key = GpuStateKey::new(program, None, &style, &shiny, false);
        assert_ne!(base, key);
        assert_eq!(key.baked_material().specular_control, 64.0);
    }

    #[test]
    fn test_key_ignores_texture_for_untextured_program() {
        let style = StyleState::default();
        let binding = TextureBinding {
            texture: crate::render::gpu::TextureId(7),
            u_boundary: crate::scene::UvBoundary::Wrap,
            v_boundary: crate::scene::UvBoundary::Wrap,
        };
        let key = GpuStateKey::new(ShaderProgram::default(), Some(binding), &style, &ColorState::default(), false);
        assert_eq!(key.texture, None);
    }
}
