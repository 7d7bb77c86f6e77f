//! Matrix state
//!
//! Tracks the local-to-camera and camera-to-frustum transforms along with
//! the derived normal matrix, and answers view-frustum visibility queries.

use crate::foundation::math::{utils, Mat3, Mat4, Point3, Vec3, Vec4};
use crate::scene::BoundingBox;

/// Current transforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixState {
    world_to_camera: Mat4,
    local_to_camera: Mat4,
    camera_to_frustum: Mat4,
    normal: Mat3,
}

impl Default for MatrixState {
    fn default() -> Self {
        Self {
            world_to_camera: Mat4::identity(),
            local_to_camera: Mat4::identity(),
            camera_to_frustum: Mat4::identity(),
            normal: Mat3::identity(),
        }
    }
}

impl MatrixState {
    /// Identity transforms
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to identity
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Install a camera, making local space equal world space
    pub fn set_camera(&mut self, world_to_camera: Mat4, camera_to_frustum: Mat4) {
        self.world_to_camera = world_to_camera;
        self.camera_to_frustum = camera_to_frustum;
        self.set_local_to_camera(world_to_camera);
    }

    /// Set local-to-camera; returns true if it changed
    pub fn set_local_to_camera(&mut self, matrix: Mat4) -> bool {
        if self.local_to_camera == matrix {
            return false;
        }
        self.local_to_camera = matrix;
        self.normal = utils::normal_matrix(&matrix);
        true
    }

    /// Set camera-to-frustum; returns true if it changed
    pub fn set_camera_to_frustum(&mut self, matrix: Mat4) -> bool {
        if self.camera_to_frustum == matrix {
            return false;
        }
        self.camera_to_frustum = matrix;
        true
    }

    /// World-to-camera transform of the current pass
    pub const fn world_to_camera(&self) -> &Mat4 {
        &self.world_to_camera
    }

    /// Local-to-camera transform
    pub const fn local_to_camera(&self) -> &Mat4 {
        &self.local_to_camera
    }

    /// Camera-to-frustum (projection) transform
    pub const fn camera_to_frustum(&self) -> &Mat4 {
        &self.camera_to_frustum
    }

    /// Inverse-transpose of the local-to-camera upper 3x3
    pub const fn normal_matrix(&self) -> &Mat3 {
        &self.normal
    }

    /// Local-to-frustum transform
    pub fn local_to_frustum(&self) -> Mat4 {
        self.camera_to_frustum * self.local_to_camera
    }

    /// Transform a local point into camera space
    pub fn point_to_camera(&self, point: &Point3) -> Point3 {
        self.local_to_camera.transform_point(point)
    }

    /// Transform a local normal into camera space, renormalized
    pub fn normal_to_camera(&self, normal: &Vec3) -> Vec3 {
        (self.normal * normal).try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros)
    }

    /// Depth along the view direction of a local point
    pub fn camera_depth(&self, point: &Point3) -> f32 {
        -self.point_to_camera(point).z
    }

    /// Whether any part of a local bounding box can be on screen
    ///
    /// The box is rejected only when all eight corners lie outside the same
    /// clip plane, so boxes straddling a frustum corner stay visible.
    pub fn is_bounding_box_visible(&self, bounds: &BoundingBox) -> bool {
        let to_clip = self.local_to_frustum();
        let clip: Vec<Vec4> = bounds
            .corners()
            .iter()
            .map(|c| to_clip * Vec4::new(c.x, c.y, c.z, 1.0))
            .collect();

        let outside = |test: fn(&Vec4) -> bool| clip.iter().all(test);
        !(outside(|p| p.x < -p.w)
            || outside(|p| p.x > p.w)
            || outside(|p| p.y < -p.w)
            || outside(|p| p.y > p.w)
            || outside(|p| p.z < -p.w)
            || outside(|p| p.z > p.w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4Ext;
    use approx::assert_relative_eq;

    fn camera_state() -> MatrixState {
        let mut state = MatrixState::new();
        let view = Mat4::look_at(Point3::new(0.0, 0.0, 5.0), Point3::origin(), Vec3::y());
        state.set_camera(view, Mat4::perspective_gl(60.0_f32.to_radians(), 1.0, 0.1, 100.0));
        state
    }

    #[test]
    fn test_normal_matrix_follows_local_to_camera() {
        let mut state = MatrixState::new();
        assert!(state.set_local_to_camera(Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0))));
        assert!(!state.set_local_to_camera(Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 1.0, 1.0))));

        // A 45° normal under x-scaling tilts toward y
        let n = state.normal_to_camera(&Vec3::new(1.0, 1.0, 0.0).normalize());
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-6);
        assert!(n.y > n.x);
    }

    #[test]
    fn test_camera_depth_is_view_axis_distance() {
        let state = camera_state();
        assert_relative_eq!(state.camera_depth(&Point3::origin()), 5.0, epsilon = 1e-5);
        // Off-axis points at the same plane share the depth
        assert_relative_eq!(state.camera_depth(&Point3::new(3.0, 2.0, 0.0)), 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_box_visibility() {
        let state = camera_state();
        let unit = BoundingBox { min: Point3::new(-1.0, -1.0, -1.0), max: Point3::new(1.0, 1.0, 1.0) };
        assert!(state.is_bounding_box_visible(&unit));

        let behind = BoundingBox { min: Point3::new(-1.0, -1.0, 10.0), max: Point3::new(1.0, 1.0, 12.0) };
        assert!(!state.is_bounding_box_visible(&behind));

        let far_left = BoundingBox { min: Point3::new(-100.0, -1.0, -1.0), max: Point3::new(-90.0, 1.0, 1.0) };
        assert!(!state.is_bounding_box_visible(&far_left));
    }
}
