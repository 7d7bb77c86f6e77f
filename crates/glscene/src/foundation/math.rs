//! Math utilities and types
//!
//! Provides the vector and matrix types shared by the scene model and the
//! renderer. All matrices follow nalgebra's column-vector convention, so a
//! point is transformed as `matrix * point`.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
};

/// 2D vector type (texture coordinates)
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::*;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// True if every component of the point is a finite number
    pub fn is_finite_point(p: &Point3) -> bool {
        p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
    }

    /// Flatten a matrix into the column-major array layout OpenGL expects
    pub fn to_gl_array(m: &Mat4) -> [f32; 16] {
        let mut out = [0.0; 16];
        out.copy_from_slice(m.as_slice());
        out
    }

    /// Upper 3x3 inverse-transpose, used to carry normals into eye space
    ///
    /// Falls back to the plain upper 3x3 when the matrix is singular.
    pub fn normal_matrix(m: &Mat4) -> Mat3 {
        let upper = m.fixed_view::<3, 3>(0, 0).into_owned();
        upper
            .try_inverse()
            .map_or(upper, |inv| inv.transpose())
    }
}

/// Extension trait for Mat4 with projection and view helpers
pub trait Mat4Ext {
    /// Create an OpenGL perspective projection (clip z in [-1, 1])
    fn perspective_gl(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an OpenGL orthographic projection (clip z in [-1, 1])
    fn orthographic_gl(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix (camera looks down -Z)
    fn look_at(eye: Point3, target: Point3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective_gl(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let f = 1.0 / (fov_y * 0.5).tan();
        let mut result = Mat4::zeros();
        result[(0, 0)] = f / aspect;
        result[(1, 1)] = f;
        if far.is_finite() {
            result[(2, 2)] = (far + near) / (near - far);
            result[(2, 3)] = (2.0 * far * near) / (near - far);
        } else {
            // Infinite yon plane
            result[(2, 2)] = -1.0;
            result[(2, 3)] = -2.0 * near;
        }
        result[(3, 2)] = -1.0;
        result
    }

    fn orthographic_gl(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let mut result = Mat4::identity();
        result[(0, 0)] = 2.0 / (right - left);
        result[(1, 1)] = 2.0 / (top - bottom);
        result[(2, 2)] = -2.0 / (far - near);
        result[(0, 3)] = -(right + left) / (right - left);
        result[(1, 3)] = -(top + bottom) / (top - bottom);
        result[(2, 3)] = -(far + near) / (far - near);
        result
    }

    fn look_at(eye: Point3, target: Point3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&eye, &target, &up)
    }
}
