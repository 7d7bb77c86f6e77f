//! # Scene View
//!
//! [`SceneView`] drives a [`Renderer`] over a [`SceneNode`] tree. It owns
//! the traversal state the renderer deliberately does not: the
//! local-to-world transform, the accumulated attribute set and every style
//! value. Groups are lexical scopes; when a group ends the view restores the
//! enclosing state and re-issues the corresponding `update_*` calls.
//!
//! Geometry the renderer declines is decomposed into TriMesh parts here.
//! Decompositions are kept until the geometry's edit index changes.

use std::collections::HashMap;

use super::error::{RenderResult, RenderWarning, ViewStatus};
use super::gpu::GpuDevice;
use super::renderer::{FrameStats, Renderer};
use crate::config::DecompositionConfig;
use crate::foundation::math::Mat4;
use crate::scene::{
    decompose::decompose, AntiAliasStyleData, AttributeSet, BackfacingStyle, Camera, ChannelFill,
    DecomposedPart, DrawContextData, FillStyle, FogStyleData, Geometry, GeometryObject, Illumination,
    InterpolationStyle, Light, ObjectId, OrientationStyle, SceneNode, StyleNode, TextureShader,
};

/// Everything a group scope can change
#[derive(Debug, Clone)]
struct ViewState {
    local_to_world: Mat4,
    attributes: AttributeSet,
    surface_shader: Option<TextureShader>,
    illumination: Illumination,
    interpolation: InterpolationStyle,
    backfacing: BackfacingStyle,
    fill: FillStyle,
    orientation: OrientationStyle,
    highlight: Option<AttributeSet>,
    anti_alias: AntiAliasStyleData,
    fog: FogStyleData,
    cast_shadows: bool,
    receive_shadows: bool,
    line_width: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            local_to_world: Mat4::identity(),
            attributes: AttributeSet::default(),
            surface_shader: None,
            illumination: Illumination::default(),
            interpolation: InterpolationStyle::default(),
            backfacing: BackfacingStyle::default(),
            fill: FillStyle::default(),
            orientation: OrientationStyle::default(),
            highlight: None,
            anti_alias: AntiAliasStyleData::default(),
            fog: FogStyleData::OFF,
            cast_shadows: true,
            receive_shadows: true,
            line_width: 1.0,
        }
    }
}

impl ViewState {
    /// Push every value to the renderer
    fn restore<D: GpuDevice>(&self, renderer: &mut Renderer<D>, world_to_camera: &Mat4) {
        renderer.update_local_to_camera(world_to_camera * self.local_to_world);
        renderer.update_view_attributes(&self.attributes);
        renderer.update_surface_shader(self.surface_shader.clone());
        renderer.update_illumination_shader(self.illumination);
        renderer.update_interpolation_style(self.interpolation);
        renderer.update_backfacing_style(self.backfacing);
        renderer.update_fill_style(self.fill);
        renderer.update_orientation_style(self.orientation);
        renderer.update_highlight_style(self.highlight.clone());
        renderer.update_anti_alias_style(self.anti_alias);
        renderer.update_fog_style(self.fog);
        renderer.update_cast_shadows_style(self.cast_shadows);
        renderer.update_receive_shadows_style(self.receive_shadows);
        renderer.update_line_width_style(self.line_width);
    }

    fn apply_style<D: GpuDevice>(&mut self, renderer: &mut Renderer<D>, style: &StyleNode) {
        match style {
            StyleNode::Interpolation(s) => {
                self.interpolation = *s;
                renderer.update_interpolation_style(*s);
            }
            StyleNode::Backfacing(s) => {
                self.backfacing = *s;
                renderer.update_backfacing_style(*s);
            }
            StyleNode::Fill(s) => {
                self.fill = *s;
                renderer.update_fill_style(*s);
            }
            StyleNode::Orientation(s) => {
                self.orientation = *s;
                renderer.update_orientation_style(*s);
            }
            StyleNode::Highlight(s) => {
                self.highlight = s.clone();
                renderer.update_highlight_style(s.clone());
            }
            StyleNode::AntiAlias(s) => {
                self.anti_alias = *s;
                renderer.update_anti_alias_style(*s);
            }
            StyleNode::Fog(s) => {
                self.fog = *s;
                renderer.update_fog_style(*s);
            }
            StyleNode::CastShadows(on) => {
                self.cast_shadows = *on;
                renderer.update_cast_shadows_style(*on);
            }
            StyleNode::ReceiveShadows(on) => {
                self.receive_shadows = *on;
                renderer.update_receive_shadows_style(*on);
            }
            StyleNode::LineWidth(width) => {
                self.line_width = *width;
                renderer.update_line_width_style(*width);
            }
        }
    }
}

struct Decomposition {
    edit_index: u32,
    fill: Option<ChannelFill>,
    parts: Vec<DecomposedPart>,
}

/// Reference view driver
#[derive(Default)]
pub struct SceneView {
    decompositions: HashMap<ObjectId, Decomposition>,
    culled: usize,
}

impl std::fmt::Debug for SceneView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneView")
            .field("decompositions", &self.decompositions.len())
            .field("culled", &self.culled)
            .finish()
    }
}

impl SceneView {
    /// Create a view with no cached decompositions
    pub fn new() -> Self {
        Self::default()
    }

    /// Geometries skipped by bounding-box culling in the last frame
    pub const fn culled(&self) -> usize {
        self.culled
    }

    /// Number of geometries with a cached decomposition
    pub fn cached_decompositions(&self) -> usize {
        self.decompositions.len()
    }

    /// Drop every cached decomposition
    pub fn clear_cache(&mut self) {
        self.decompositions.clear();
    }

    /// Render one frame of a scene
    ///
    /// Runs every pass the renderer asks for. If a pass fails the frame is
    /// aborted and the error returned; nothing is presented.
    ///
    /// # Arguments
    /// * `renderer` - Renderer to drive
    /// * `context` - Draw context for this frame
    /// * `camera` - Camera for every pass
    /// * `lights` - Light group
    /// * `root` - Scene root
    ///
    /// # Returns
    /// The frame's statistics.
    pub fn render<D: GpuDevice>(
        &mut self,
        renderer: &mut Renderer<D>,
        context: &DrawContextData,
        camera: &Camera,
        lights: &[Light],
        root: &SceneNode,
    ) -> RenderResult<FrameStats> {
        renderer.start_frame(context)?;
        self.culled = 0;

        if let Err(e) = self.render_passes(renderer, camera, lights, root) {
            renderer.abort_frame();
            return Err(e);
        }
        renderer.end_frame()?;
        Ok(renderer.stats())
    }

    fn render_passes<D: GpuDevice>(
        &mut self,
        renderer: &mut Renderer<D>,
        camera: &Camera,
        lights: &[Light],
        root: &SceneNode,
    ) -> RenderResult<()> {
        let decomposition = renderer.config().decomposition.clone();
        loop {
            renderer.start_pass(camera, lights)?;
            let world_to_camera = renderer.world_to_camera();
            let mut state = ViewState::default();
            self.walk(renderer, root, &mut state, &world_to_camera, &decomposition)?;

            if renderer.end_pass()? == ViewStatus::Done {
                return Ok(());
            }
            log::trace!("Retraversing scene for pass {}", renderer.pass_index() + 1);
        }
    }

    fn walk<D: GpuDevice>(
        &mut self,
        renderer: &mut Renderer<D>,
        node: &SceneNode,
        state: &mut ViewState,
        world_to_camera: &Mat4,
        decomposition: &DecompositionConfig,
    ) -> RenderResult<()> {
        match node {
            SceneNode::Group(children) => {
                let saved = state.clone();
                for child in children {
                    self.walk(renderer, child, state, world_to_camera, decomposition)?;
                }
                *state = saved;
                state.restore(renderer, world_to_camera);
            }
            SceneNode::Transform(matrix) => {
                state.local_to_world = state.local_to_world * matrix;
                renderer.update_local_to_camera(world_to_camera * state.local_to_world);
            }
            SceneNode::Attributes(set) => {
                state.attributes = set.overlay(&state.attributes);
                renderer.update_view_attributes(&state.attributes);
                if let Some(shader) = &set.surface_shader {
                    state.surface_shader = Some(shader.clone());
                    renderer.update_surface_shader(Some(shader.clone()));
                }
            }
            SceneNode::SurfaceShader(shader) => {
                state.surface_shader = shader.clone();
                renderer.update_surface_shader(shader.clone());
            }
            SceneNode::Illumination(illumination) => {
                state.illumination = *illumination;
                renderer.update_illumination_shader(*illumination);
            }
            SceneNode::Style(style) => state.apply_style(renderer, style),
            SceneNode::Geometry(object) => self.submit(renderer, object, decomposition)?,
        }
        Ok(())
    }

    fn submit<D: GpuDevice>(
        &mut self,
        renderer: &mut Renderer<D>,
        object: &GeometryObject,
        config: &DecompositionConfig,
    ) -> RenderResult<()> {
        if let Some(bounds) = object.geometry().bounds() {
            if !renderer.is_bounding_box_visible(&bounds) {
                self.culled += 1;
                return Ok(());
            }
        }
        if renderer.submit_geometry(object)? {
            return Ok(());
        }

        let fill = match object.geometry() {
            Geometry::Polygon(data) => Some(renderer.channel_fill(data.polygon_attributes.as_deref())),
            _ => None,
        };
        let stale = self
            .decompositions
            .get(&object.id())
            .map_or(true, |d| d.edit_index != object.edit_index() || d.fill != fill);
        if stale {
            match decompose(object.geometry(), config, &fill.unwrap_or_default()) {
                Ok(parts) => {
                    let kind = object.geometry().kind();
                    log::debug!("Decomposed {:?} {:?} into {} parts", kind, object.id(), parts.len());
                    self.decompositions
                        .insert(object.id(), Decomposition { edit_index: object.edit_index(), fill, parts });
                }
                Err(e) => {
                    log::debug!("Could not decompose {:?}: {}", object.id(), e);
                    self.decompositions.remove(&object.id());
                    renderer.post_warning(RenderWarning::DegenerateGeometry { kind: object.geometry().kind() });
                    return Ok(());
                }
            }
        }
        if let Some(decomposed) = self.decompositions.get(&object.id()) {
            for part in &decomposed.parts {
                renderer.submit_decomposed(object, part)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::foundation::math::{Point3, Vec3};
    use crate::render::gpu::recording::RecordingDevice;
    use crate::scene::{ColorRgb, Geometry, GeometryKind, ObjectRegistry, PolygonData, TriMeshData, Vertex3D};

    fn camera() -> Camera {
        Camera::perspective(Point3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0)
    }

    fn renderer() -> Renderer<RecordingDevice> {
        Renderer::new(RecordingDevice::new(), RendererConfig::default()).unwrap()
    }

    fn mesh(registry: &mut ObjectRegistry, offset: Vec3) -> GeometryObject {
        let mut data = TriMeshData::new(
            vec![
                Point3::from(offset),
                Point3::from(offset + Vec3::x()),
                Point3::from(offset + Vec3::y()),
            ],
            vec![[0, 1, 2]],
        );
        data.vertex_normals = Some(vec![Vec3::z(); 3]);
        GeometryObject::new(registry, Geometry::TriMesh(data))
    }

    #[test]
    fn test_group_scope_restores_attributes() {
        let mut registry = ObjectRegistry::new();
        let red = AttributeSet::new().with_diffuse(ColorRgb::new(1.0, 0.0, 0.0));
        let root = SceneNode::group(vec![
            SceneNode::group(vec![SceneNode::Attributes(red), SceneNode::Geometry(mesh(&mut registry, Vec3::zeros()))]),
            SceneNode::Geometry(mesh(&mut registry, Vec3::new(-1.0, 0.0, 0.0))),
        ]);

        let mut r = renderer();
        let mut view = SceneView::new();
        view.render(&mut r, &DrawContextData::new(32, 32), &camera(), &[], &root).unwrap();

        let triangles = r.device().rasterize();
        assert_eq!(triangles.len(), 2);
        assert_eq!(triangles[0].vertices[0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(triangles[1].vertices[0].color, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_transform_moves_geometry() {
        let mut registry = ObjectRegistry::new();
        let root = SceneNode::group(vec![
            SceneNode::Transform(Mat4::new_translation(&Vec3::new(0.0, 0.0, -2.0))),
            SceneNode::Geometry(mesh(&mut registry, Vec3::zeros())),
        ]);

        let mut r = renderer();
        SceneView::new().render(&mut r, &DrawContextData::new(32, 32), &camera(), &[], &root).unwrap();

        let triangles = r.device().rasterize();
        approx::assert_relative_eq!(triangles[0].vertices[0].position.z, -7.0, epsilon = 1e-5);
    }

    #[test]
    fn test_offscreen_geometry_is_culled() {
        let mut registry = ObjectRegistry::new();
        let root = SceneNode::group(vec![
            SceneNode::Geometry(mesh(&mut registry, Vec3::zeros())),
            SceneNode::Geometry(mesh(&mut registry, Vec3::new(500.0, 0.0, 0.0))),
        ]);

        let mut r = renderer();
        let mut view = SceneView::new();
        view.render(&mut r, &DrawContextData::new(32, 32), &camera(), &[], &root).unwrap();
        assert_eq!(view.culled(), 1);
        assert_eq!(r.device().rasterize().len(), 1);
    }

    #[test]
    fn test_polygon_decomposition_is_cached_until_edited() {
        let mut registry = ObjectRegistry::new();
        let square = Geometry::Polygon(PolygonData {
            vertices: [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
                .into_iter()
                .map(|(x, y)| Vertex3D::with_attributes(Point3::new(x, y, 0.0), AttributeSet::new().with_normal(Vec3::z())))
                .collect(),
            polygon_attributes: None,
        });
        let object = GeometryObject::new(&mut registry, square);
        let id = object.id();
        let mut root = SceneNode::group(vec![SceneNode::Geometry(object)]);

        let mut r = renderer();
        let mut view = SceneView::new();
        let context = DrawContextData::new(32, 32);
        view.render(&mut r, &context, &camera(), &[], &root).unwrap();
        view.render(&mut r, &context, &camera(), &[], &root).unwrap();
        assert_eq!(view.cached_decompositions(), 1);
        assert_eq!(r.stats().primitives, 2);
        assert_eq!(r.stats().vbo_hits, 1);

        if let Some(object) = root.geometry_mut(id) {
            object.edit(|_| ());
        }
        let stats = view.render(&mut r, &context, &camera(), &[], &root).unwrap();
        assert_eq!(stats.vbo_misses, 1);
    }

    #[test]
    fn test_polygon_vertex_color_survives_partial_channel() {
        let mut registry = ObjectRegistry::new();
        let red = ColorRgb::new(1.0, 0.0, 0.0);
        let polygon = Geometry::Polygon(PolygonData {
            vertices: vec![
                Vertex3D::with_attributes(Point3::new(0.0, 0.0, 0.0), AttributeSet::new().with_diffuse(red)),
                Vertex3D::new(Point3::new(1.0, 0.0, 0.0)),
                Vertex3D::new(Point3::new(0.0, 1.0, 0.0)),
            ],
            polygon_attributes: None,
        });
        let root = SceneNode::group(vec![
            SceneNode::Attributes(AttributeSet::new().with_diffuse(ColorRgb::new(0.0, 1.0, 0.0))),
            SceneNode::Geometry(GeometryObject::new(&mut registry, polygon)),
        ]);

        let mut r = renderer();
        SceneView::new().render(&mut r, &DrawContextData::new(32, 32), &camera(), &[], &root).unwrap();

        let triangles = r.device().rasterize();
        assert_eq!(triangles.len(), 1);
        let [v0, v1, v2] = triangles[0].vertices;
        assert_eq!(v0.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(v1.color, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(v2.color, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_degenerate_polygon_posts_warning() {
        let mut registry = ObjectRegistry::new();
        let line_like = Geometry::Polygon(PolygonData {
            vertices: vec![Vertex3D::new(Point3::origin()), Vertex3D::new(Point3::new(1.0, 0.0, 0.0))],
            polygon_attributes: None,
        });
        let root = SceneNode::group(vec![
            SceneNode::Geometry(GeometryObject::new(&mut registry, line_like)),
            SceneNode::Geometry(mesh(&mut registry, Vec3::zeros())),
        ]);

        let mut r = renderer();
        let mut view = SceneView::new();
        view.render(&mut r, &DrawContextData::new(32, 32), &camera(), &[], &root).unwrap();

        assert_eq!(r.warnings(), [RenderWarning::DegenerateGeometry { kind: GeometryKind::Polygon }]);
        assert_eq!(view.cached_decompositions(), 0);
        assert_eq!(r.device().rasterize().len(), 1);
    }
}
