//! Light state
//!
//! Resolves the view's light group into GPU light slots at the start of a
//! frame and plans the passes needed for shadow-casting lights.
//!
//! Ambient lights never use a slot; their radiance is summed. Non-ambient
//! lights beyond the slot count are dropped with a warning. When shadows
//! are enabled, the first pass carries the ambient term and every light
//! that does not cast shadows, and each shadow-casting light then gets an
//! additive pass of its own.

use super::error::{RenderWarning, WarningLog};
use super::gpu::{GpuCommand, GpuDevice, GpuLight, GpuLightKind};
use super::state::GlStateTracker;
use crate::foundation::math::{Mat4, Vec3};
use crate::scene::{Light, LightKind};

/// Lights enabled during one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassLighting {
    /// Whether the ambient term is applied
    pub ambient: bool,
    /// Slots enabled in this pass
    pub slots: Vec<usize>,
    /// Whether this pass adds onto earlier passes
    pub additive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SlotLight {
    light: GpuLight,
    casts_shadows: bool,
}

/// Eye-space light slots and the pass plan
#[derive(Debug, Clone, PartialEq)]
pub struct LightState {
    ambient: [f32; 3],
    slots: Vec<SlotLight>,
    slot_capacity: usize,
    plan: Vec<PassLighting>,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            ambient: [0.0; 3],
            slots: Vec::new(),
            slot_capacity: 0,
            plan: vec![PassLighting { ambient: true, slots: Vec::new(), additive: false }],
        }
    }
}

/// Convert a world-space light into eye space
fn to_gpu_light(light: &Light, world_to_camera: &Mat4) -> Option<GpuLight> {
    let color = light.radiance().to_array();
    let eye_direction = |d: &Vec3| -> [f32; 3] {
        world_to_camera.transform_vector(d).try_normalize(f32::EPSILON).unwrap_or(*d).into()
    };
    let base = GpuLight {
        kind: GpuLightKind::Directional,
        color,
        position: [0.0; 3],
        direction: [0.0, 0.0, -1.0],
        attenuation: [1.0, 0.0, 0.0],
        spot_cos_inner: -1.0,
        spot_cos_outer: -1.0,
    };
    match light.kind {
        LightKind::Ambient => None,
        LightKind::Directional { direction } => Some(GpuLight { direction: eye_direction(&direction), ..base }),
        LightKind::Point { location, attenuation } => Some(GpuLight {
            kind: GpuLightKind::Point,
            position: world_to_camera.transform_point(&location).coords.into(),
            attenuation: attenuation.coefficients(),
            ..base
        }),
        LightKind::Spot { location, direction, hot_angle, outer_angle, attenuation } => Some(GpuLight {
            kind: GpuLightKind::Spot,
            position: world_to_camera.transform_point(&location).coords.into(),
            direction: eye_direction(&direction),
            attenuation: attenuation.coefficients(),
            spot_cos_inner: hot_angle.cos(),
            spot_cos_outer: outer_angle.cos(),
            ..base
        }),
    }
}

impl LightState {
    /// Empty light state with a single unlit pass
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a light group for the coming frame
    ///
    /// # Arguments
    /// * `lights` - Light group in world space
    /// * `world_to_camera` - Camera transform of the frame
    /// * `slot_capacity` - Number of GPU light slots
    /// * `shadows` - Whether shadow-casting lights get their own passes
    /// * `warnings` - Receives a warning when lights are dropped
    pub fn configure(
        &mut self,
        lights: &[Light],
        world_to_camera: &Mat4,
        slot_capacity: usize,
        shadows: bool,
        warnings: &mut WarningLog,
    ) {
        let mut ambient = [0.0; 3];
        let mut slots = Vec::new();
        let mut supplied = 0;

        for light in lights.iter().filter(|l| l.is_on) {
            if light.is_ambient() {
                let c = light.radiance();
                ambient[0] += c.r;
                ambient[1] += c.g;
                ambient[2] += c.b;
                continue;
            }
            supplied += 1;
            if slots.len() >= slot_capacity {
                continue;
            }
            if let Some(gpu) = to_gpu_light(light, world_to_camera) {
                slots.push(SlotLight { light: gpu, casts_shadows: shadows && light.casts_shadows });
            }
        }

        if supplied > slot_capacity {
            warnings.post(RenderWarning::LightsDropped { supplied, max: slot_capacity });
        }

        let mut plan = vec![PassLighting {
            ambient: true,
            slots: (0..slots.len()).filter(|&i| !slots[i].casts_shadows).collect(),
            additive: false,
        }];
        plan.extend(
            slots
                .iter()
                .enumerate()
                .filter(|(_, s)| s.casts_shadows)
                .map(|(i, _)| PassLighting { ambient: false, slots: vec![i], additive: true }),
        );
        if plan.len() > 1 {
            log::debug!("Planned {} passes for {} shadow-casting lights", plan.len(), plan.len() - 1);
        }

        self.ambient = ambient;
        self.slots = slots;
        self.slot_capacity = slot_capacity;
        self.plan = plan;
    }

    /// Number of passes the current light group needs
    pub fn pass_count(&self) -> usize {
        self.plan.len()
    }

    /// Lighting of one pass
    pub fn pass(&self, index: usize) -> Option<&PassLighting> {
        self.plan.get(index)
    }

    /// Summed ambient radiance
    pub const fn ambient(&self) -> [f32; 3] {
        self.ambient
    }

    /// Number of occupied slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Eye-space light in a slot
    pub fn slot(&self, index: usize) -> Option<&GpuLight> {
        self.slots.get(index).map(|s| &s.light)
    }

    /// Enable the lights of one pass
    pub fn emit_pass<D: GpuDevice + ?Sized>(&self, device: &mut D, tracker: &mut GlStateTracker, index: usize) {
        let Some(pass) = self.plan.get(index) else { return };
        self.emit(device, tracker, pass.ambient, |slot| pass.slots.contains(&slot));
    }

    /// Enable every light, as for transparent geometry
    pub fn emit_all<D: GpuDevice + ?Sized>(&self, device: &mut D, tracker: &mut GlStateTracker) {
        self.emit(device, tracker, true, |_| true);
    }

    fn emit<D: GpuDevice + ?Sized>(
        &self,
        device: &mut D,
        tracker: &mut GlStateTracker,
        ambient: bool,
        enabled: impl Fn(usize) -> bool,
    ) {
        tracker.apply(device, GpuCommand::SetAmbient(if ambient { self.ambient } else { [0.0; 3] }));
        for slot in 0..self.slot_capacity {
            let light = self.slots.get(slot).filter(|_| enabled(slot)).map(|s| s.light);
            tracker.apply(device, GpuCommand::SetLight { slot, light });
        }
    }
}
