//! # Opaque Triangle Buffer
//!
//! Collects opaque triangles during a pass and draws them grouped by
//! [`GpuStateKey`], one draw call per distinct key. Batches are flushed in
//! the order their key was first used.
//!
//! Vertices arrive in camera space with colors baked in, so every batch is
//! drawn with an identity model-view matrix.
//!
//! If a batch buffer cannot be allocated, that batch and every later one
//! are drawn triangle by triangle, and the buffer stays in immediate mode
//! until the next frame.

use std::collections::HashMap;

use super::error::{RenderWarning, WarningLog};
use super::gpu::{GpuCommand, GpuDevice, GpuVertex, Primitive};
use super::state::{GlStateTracker, GpuStateKey, StyleState};
use crate::foundation::math::Mat4;

#[derive(Debug)]
struct Batch {
    key: GpuStateKey,
    vertices: Vec<GpuVertex>,
}

/// Per-pass opaque triangle batches
#[derive(Debug, Default)]
pub struct OpaqueTriBuffer {
    batches: Vec<Batch>,
    lookup: HashMap<GpuStateKey, usize>,
    immediate: bool,
}

impl OpaqueTriBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a triangle to the batch for its key
    pub fn add_triangle(&mut self, key: GpuStateKey, vertices: [GpuVertex; 3]) {
        let index = *self.lookup.entry(key).or_insert_with(|| {
            self.batches.push(Batch { key, vertices: Vec::new() });
            self.batches.len() - 1
        });
        self.batches[index].vertices.extend_from_slice(&vertices);
    }

    /// True once an allocation failure has switched to per-triangle drawing
    pub const fn is_immediate(&self) -> bool {
        self.immediate
    }

    /// Leave immediate mode; called at the start of each frame
    pub fn reset_frame(&mut self) {
        self.immediate = false;
        self.clear();
    }

    /// Number of batches waiting
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Number of triangles waiting
    pub fn triangle_count(&self) -> usize {
        self.batches.iter().map(|b| b.vertices.len() / 3).sum()
    }

    /// True if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Drop everything waiting
    pub fn clear(&mut self) {
        self.batches.clear();
        self.lookup.clear();
    }

    /// Draw one camera-space triangle right away
    pub fn draw_immediate<D: GpuDevice + ?Sized>(
        device: &mut D,
        tracker: &mut GlStateTracker,
        style: &StyleState,
        key: &GpuStateKey,
        vertices: &[GpuVertex],
    ) {
        tracker.apply_key(device, key, key.baked_material(), style.gpu_fog(key.fog));
        tracker.apply(device, GpuCommand::LoadModelView(Mat4::identity()));
        for tri in vertices.chunks_exact(3) {
            tracker.draw(device, GpuCommand::DrawVertices { primitive: Primitive::Triangles, vertices: tri.to_vec() });
        }
    }

    /// Draw and clear every batch
    ///
    /// # Returns
    /// The number of batches drawn.
    pub fn flush<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        tracker: &mut GlStateTracker,
        style: &StyleState,
        warnings: &mut WarningLog,
    ) -> usize {
        let batches = std::mem::take(&mut self.batches);
        self.lookup.clear();
        let count = batches.len();

        for batch in batches {
            if self.immediate {
                Self::draw_immediate(device, tracker, style, &batch.key, &batch.vertices);
                continue;
            }

            let indices: Vec<u32> = (0..batch.vertices.len() as u32).collect();
            match device.create_buffer(&batch.vertices, &indices) {
                Ok(buffer) => {
                    tracker.apply_key(device, &batch.key, batch.key.baked_material(), style.gpu_fog(batch.key.fog));
                    tracker.apply(device, GpuCommand::LoadModelView(Mat4::identity()));
                    tracker.draw(
                        device,
                        GpuCommand::DrawBuffer { buffer, primitive: Primitive::Triangles, count: indices.len() as u32 },
                    );
                    device.delete_buffer(buffer);
                }
                Err(e) => {
                    warnings.post(RenderWarning::BufferAllocationFailed { reason: e.to_string() });
                    self.immediate = true;
                    Self::draw_immediate(device, tracker, style, &batch.key, &batch.vertices);
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gpu::recording::RecordingDevice;
    use crate::render::gpu::{PolygonMode, ShaderProgram};
    use crate::render::state::ColorState;
    use crate::scene::FillStyle;

    fn key(style: &StyleState) -> GpuStateKey {
        let program = ShaderProgram { vertex_colors: true, ..ShaderProgram::default() };
        GpuStateKey::new(program, None, style, &ColorState::default(), false)
    }

    fn tri() -> [GpuVertex; 3] {
        [GpuVertex::default(); 3]
    }

    #[test]
    fn test_same_key_merges_into_one_draw() {
        let style = StyleState::default();
        let mut buffer = OpaqueTriBuffer::new();
        for _ in 0..4 {
            buffer.add_triangle(key(&style), tri());
        }
        assert_eq!(buffer.batch_count(), 1);
        assert_eq!(buffer.triangle_count(), 4);

        let mut device = RecordingDevice::new();
        let mut tracker = GlStateTracker::new();
        let drawn = buffer.flush(&mut device, &mut tracker, &style, &mut WarningLog::new());
        assert_eq!(drawn, 1);
        assert_eq!(device.draw_count(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_batches_flush_in_first_use_order() {
        let filled = StyleState::default();
        let mut edges = StyleState::default();
        edges.set_fill(FillStyle::Edges);

        let mut buffer = OpaqueTriBuffer::new();
        buffer.add_triangle(key(&filled), tri());
        buffer.add_triangle(key(&edges), tri());
        buffer.add_triangle(key(&filled), tri());

        let mut device = RecordingDevice::new();
        let mut tracker = GlStateTracker::new();
        buffer.flush(&mut device, &mut tracker, &filled, &mut WarningLog::new());

        let modes: Vec<PolygonMode> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                GpuCommand::PolygonMode(m) => Some(*m),
                _ => None,
            })
            .collect();
        assert_eq!(modes, vec![PolygonMode::Fill, PolygonMode::Line]);
        assert_eq!(device.draw_count(), 2);
        // Batch buffers do not outlive the flush
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn test_allocation_failure_falls_back_to_immediate() {
        let style = StyleState::default();
        let mut buffer = OpaqueTriBuffer::new();
        buffer.add_triangle(key(&style), tri());
        buffer.add_triangle(key(&style), tri());

        let mut device = RecordingDevice::new();
        device.fail_buffer_allocations = true;
        let mut tracker = GlStateTracker::new();
        let mut warnings = WarningLog::new();
        buffer.flush(&mut device, &mut tracker, &style, &mut warnings);

        // Nothing dropped: one draw per triangle
        assert_eq!(device.draw_count(), 2);
        assert!(buffer.is_immediate());
        assert!(matches!(warnings.warnings()[0], RenderWarning::BufferAllocationFailed { .. }));

        buffer.reset_frame();
        assert!(!buffer.is_immediate());
    }
}
