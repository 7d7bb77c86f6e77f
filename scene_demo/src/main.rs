//! Headless scene demo
//!
//! Builds a small scene, renders a handful of frames through the recording
//! device and logs what the renderer did each frame. Useful for watching the
//! buffer cache and the transparent sorter at work without a window.
//!
//! ```text
//! RUST_LOG=debug cargo run -p scene_demo -- [renderer.toml|renderer.ron]
//! ```

use std::sync::Arc;

use glscene::foundation::logging;
use glscene::foundation::math::{Mat4, Point3, Vec3};
use glscene::prelude::*;
use glscene::scene::light::indoor_warm;
use glscene::scene::{BoxData, CylinderData, EndCaps, ObjectId, PolyLineData, TriangleData};

const FRAMES: usize = 6;
const EDIT_FRAME: usize = 3;
const GRID: usize = 16;

/// Height field over [-1, 1]², offset by `phase`
fn wave_mesh(phase: f32) -> TriMeshData {
    let mut points = Vec::with_capacity((GRID + 1) * (GRID + 1));
    let mut normals = Vec::with_capacity(points.capacity());
    let mut colors = Vec::with_capacity(points.capacity());
    for j in 0..=GRID {
        for i in 0..=GRID {
            let x = i as f32 / GRID as f32 * 2.0 - 1.0;
            let z = j as f32 / GRID as f32 * 2.0 - 1.0;
            let y = 0.15 * (3.0 * x + phase).sin() * (3.0 * z).cos();
            let dx = 0.45 * (3.0 * x + phase).cos() * (3.0 * z).cos();
            let dz = -0.45 * (3.0 * x + phase).sin() * (3.0 * z).sin();
            points.push(Point3::new(x, y, z));
            normals.push(Vec3::new(-dx, 1.0, -dz).normalize());
            colors.push(ColorRgb::new(0.5 + 0.5 * x, 0.6, 0.5 - 0.5 * z));
        }
    }

    let row = GRID as u32 + 1;
    let mut triangles = Vec::with_capacity(GRID * GRID * 2);
    for j in 0..GRID as u32 {
        for i in 0..GRID as u32 {
            let a = j * row + i;
            let (b, c, d) = (a + 1, a + row, a + row + 1);
            triangles.push([a, c, b]);
            triangles.push([b, c, d]);
        }
    }

    let mut mesh = TriMeshData::new(points, triangles);
    mesh.vertex_normals = Some(normals);
    mesh.vertex_colors = Some(colors);
    mesh
}

struct DemoScene {
    root: SceneNode,
    wave: ObjectId,
}

fn build_scene(registry: &mut ObjectRegistry) -> DemoScene {
    let wave = GeometryObject::new(registry, Geometry::TriMesh(wave_mesh(0.0)));
    let wave_id = wave.id();

    let glass = TriangleData {
        vertices: [
            Vertex3D::new(Point3::new(-0.8, 0.0, 0.6)),
            Vertex3D::new(Point3::new(0.8, 0.0, 0.6)),
            Vertex3D::new(Point3::new(0.0, 1.2, 0.6)),
        ],
        triangle_attributes: Some(Arc::new(
            AttributeSet::new()
                .with_diffuse(ColorRgb::new(0.2, 0.4, 1.0))
                .with_transparency(ColorRgb::gray(0.4)),
        )),
    };

    let mut cylinder = CylinderData::new(Point3::new(1.2, -0.5, 0.0), Vec3::y(), Vec3::x() * 0.3, Vec3::z() * 0.3);
    cylinder.caps = EndCaps::TOP | EndCaps::BOTTOM;
    cylinder.cylinder_attributes = Some(Arc::new(AttributeSet::new().with_diffuse(ColorRgb::new(0.9, 0.3, 0.2))));

    let crate_box = BoxData {
        origin: Point3::new(-1.6, -0.5, -0.3),
        orientation: Vec3::y() * 0.6,
        major_axis: Vec3::z() * 0.6,
        minor_axis: Vec3::x() * 0.6,
        face_attributes: Default::default(),
        box_attributes: Some(Arc::new(AttributeSet::new().with_diffuse(ColorRgb::new(0.7, 0.6, 0.3)))),
    };

    let axes = PolyLineData {
        vertices: vec![
            Vertex3D::new(Point3::new(1.5, 0.0, 0.0)),
            Vertex3D::new(Point3::origin()),
            Vertex3D::new(Point3::new(0.0, 1.5, 0.0)),
        ],
        segment_attributes: Some(vec![
            AttributeSet::new().with_diffuse(ColorRgb::new(1.0, 0.0, 0.0)),
            AttributeSet::new().with_diffuse(ColorRgb::new(0.0, 1.0, 0.0)),
        ]),
        poly_line_attributes: None,
    };

    let root = SceneNode::group(vec![
        SceneNode::Transform(Mat4::identity()),
        SceneNode::Geometry(wave),
        SceneNode::Geometry(GeometryObject::new(registry, Geometry::Cylinder(cylinder))),
        SceneNode::Geometry(GeometryObject::new(registry, Geometry::Box(crate_box))),
        SceneNode::group(vec![
            SceneNode::Style(StyleNode::LineWidth(2.0)),
            SceneNode::Geometry(GeometryObject::new(registry, Geometry::PolyLine(axes))),
        ]),
        SceneNode::Geometry(GeometryObject::new(registry, Geometry::Triangle(glass))),
    ]);

    DemoScene { root, wave: wave_id }
}

/// Spin the whole scene around Y
fn set_spin(root: &mut SceneNode, angle: f32) {
    if let SceneNode::Group(children) = root {
        if let Some(SceneNode::Transform(m)) = children.first_mut() {
            *m = Mat4::from_axis_angle(&nalgebra::Vector3::y_axis(), angle);
        }
    }
}

fn load_config() -> Result<RendererConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading renderer config from {}", path);
            RendererConfig::load_from_file(&path)
        }
        None => Ok(RendererConfig { shadows_enabled: true, ..RendererConfig::default() }),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    log::info!("Starting headless scene demo");

    let config = load_config()?;
    let mut renderer = Renderer::new(RecordingDevice::new(), config)?;
    let mut view = SceneView::new();
    let mut registry = ObjectRegistry::new();
    let mut scene = build_scene(&mut registry);

    let context = DrawContextData::new(800, 600);
    let mut camera = Camera::perspective(Point3::new(0.0, 1.5, 5.0), 45.0, context.aspect_ratio(), 0.1, 100.0);
    camera.look_at(Point3::origin(), Vec3::y());
    let mut lights = indoor_warm();
    if let Some(key_light) = lights.last_mut() {
        key_light.casts_shadows = true;
    }

    for frame in 0..FRAMES {
        set_spin(&mut scene.root, frame as f32 * 0.2);
        if frame == EDIT_FRAME {
            if let Some(wave) = scene.root.geometry_mut(scene.wave) {
                wave.edit(|geometry| *geometry = Geometry::TriMesh(wave_mesh(1.0)));
                log::info!("Edited wave mesh before frame {}", frame);
            }
        }

        let stats = view.render(&mut renderer, &context, &camera, &lights, &scene.root)?;
        log::info!(
            "Frame {}: {} passes, {} primitives, {} draws, {} batches, {} transparent, VBO {} hit / {} miss / {} evicted, {} state changes avoided",
            frame,
            stats.passes,
            stats.primitives,
            stats.draw_calls,
            stats.opaque_batches,
            stats.transparent_primitives,
            stats.vbo_hits,
            stats.vbo_misses,
            stats.vbo_evictions,
            stats.state_changes_avoided
        );
        for warning in renderer.take_warnings() {
            log::warn!("Frame {}: {}", frame, warning);
        }
        renderer.device_mut().take_commands();
    }

    log::info!(
        "{} cached buffers, {} cached decompositions, {} frames presented",
        renderer.vbo_cache().len(),
        view.cached_decompositions(),
        renderer.device().frames_presented()
    );
    renderer.release_resources();
    log::info!("Scene demo finished");
    Ok(())
}
