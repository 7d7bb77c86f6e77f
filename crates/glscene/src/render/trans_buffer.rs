//! # Transparent Primitive Buffer
//!
//! Transparent primitives are drawn after all opaque geometry, farthest
//! first. Each primitive records the camera-space depth of its farthest
//! vertex, measured along the view direction rather than as a distance
//! from the eye.
//!
//! The sort is stable: primitives at equal depth keep submission order.
//! Coplanar transparent surfaces can therefore still pop as the camera
//! moves, but the result is the same on every frame.
//!
//! Each primitive gets its own draw call with blending on, depth testing on
//! and depth writes off.

use super::gpu::{BlendMode, Capability, GpuCommand, GpuDevice, GpuVertex, Primitive};
use super::state::{GlStateTracker, GpuStateKey, StyleState};
use crate::foundation::math::Mat4;

/// A buffered transparent primitive
#[derive(Debug, Clone, PartialEq)]
pub struct TransPrimitive {
    /// Topology of `vertices`
    pub primitive: Primitive,
    /// Camera-space vertices with baked colors
    pub vertices: Vec<GpuVertex>,
    /// Draw state
    pub key: GpuStateKey,
    /// Depth of the farthest vertex along the view direction
    pub depth: f32,
}

impl TransPrimitive {
    /// Build a primitive, deriving depth from its camera-space vertices
    pub fn new(primitive: Primitive, vertices: Vec<GpuVertex>, key: GpuStateKey) -> Self {
        let depth = vertices
            .iter()
            .map(|v| -v.position[2])
            .fold(f32::NEG_INFINITY, f32::max);
        Self { primitive, vertices, key, depth }
    }
}

/// Per-frame transparent primitives
#[derive(Debug, Default)]
pub struct TransBuffer {
    primitives: Vec<TransPrimitive>,
}

impl TransBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a primitive
    pub fn add_primitive(&mut self, primitive: TransPrimitive) {
        self.primitives.push(primitive);
    }

    /// Number of primitives waiting
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// True if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Primitives in submission order
    pub fn primitives(&self) -> &[TransPrimitive] {
        &self.primitives
    }

    /// Drop everything waiting
    pub fn clear(&mut self) {
        self.primitives.clear();
    }

    /// Sort farthest first, keeping submission order for ties
    pub fn sort(&mut self) {
        self.primitives.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    }

    /// Draw and clear every primitive
    ///
    /// Leaves blending enabled and depth writes disabled; the next pass
    /// sets its own state.
    ///
    /// # Returns
    /// The number of primitives drawn.
    pub fn flush<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        tracker: &mut GlStateTracker,
        style: &StyleState,
    ) -> usize {
        if self.primitives.is_empty() {
            return 0;
        }
        self.sort();

        tracker.set_capability(device, Capability::DepthTest, true);
        tracker.set_capability(device, Capability::Blend, true);
        tracker.apply(device, GpuCommand::BlendFunc(BlendMode::Alpha));
        tracker.apply(device, GpuCommand::DepthMask(false));
        tracker.apply(device, GpuCommand::LoadModelView(Mat4::identity()));

        let primitives = std::mem::take(&mut self.primitives);
        let count = primitives.len();
        for prim in primitives {
            tracker.apply_key(device, &prim.key, prim.key.baked_material(), style.gpu_fog(prim.key.fog));
            tracker.draw(device, GpuCommand::DrawVertices { primitive: prim.primitive, vertices: prim.vertices });
        }
        log::trace!("Flushed {} transparent primitives", count);
        count
    }
}
