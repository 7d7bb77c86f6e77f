//! # Camera
//!
//! Cameras describe where the scene is seen from (placement), which depth
//! slab is visible (range), which part of the image plane maps to the
//! draw context (viewport) and how points are projected.
//!
//! ## Conventions
//! - View space is right-handed, Y up, looking down -Z (OpenGL convention)
//! - Clip-space depth is in [-1, 1]
//! - The yon plane may be infinite

use serde::{Deserialize, Serialize};

use crate::foundation::math::{utils, Mat4, Mat4Ext, Point3, Vec3};

/// Position and orientation of a camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPlacement {
    /// Eye position in world space
    pub location: Point3,
    /// Point the camera looks at
    pub point_of_interest: Point3,
    /// Approximate up direction
    pub up_vector: Vec3,
}

/// Visible depth range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraRange {
    /// Distance to the near plane, greater than zero
    pub hither: f32,
    /// Distance to the far plane; `f32::INFINITY` for no far plane
    pub yon: f32,
}

/// Region of the unit image plane mapped to the draw context
///
/// The full image plane is the square from (-1, 1) with width and
/// height 2; a smaller viewport zooms into part of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraViewPort {
    /// Upper-left corner x
    pub origin_x: f32,
    /// Upper-left corner y
    pub origin_y: f32,
    /// Width in image-plane units
    pub width: f32,
    /// Height in image-plane units
    pub height: f32,
}

impl Default for CameraViewPort {
    fn default() -> Self {
        Self { origin_x: -1.0, origin_y: 1.0, width: 2.0, height: 2.0 }
    }
}

/// Projection model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Parallel projection of a view-space rectangle
    Orthographic {
        /// Left edge
        left: f32,
        /// Top edge
        top: f32,
        /// Right edge
        right: f32,
        /// Bottom edge
        bottom: f32,
    },
    /// Perspective projection from a field of view
    ViewAngleAspect {
        /// Field of view in radians, measured along the smaller dimension
        field_of_view: f32,
        /// Width / height
        aspect_ratio_x_to_y: f32,
    },
}

/// Scene camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Placement in world space
    pub placement: CameraPlacement,
    /// Visible depth range
    pub range: CameraRange,
    /// Image-plane viewport
    pub view_port: CameraViewPort,
    /// Projection model
    pub projection: Projection,
}

impl Camera {
    /// Create a perspective camera looking at the origin
    ///
    /// # Arguments
    /// * `location` - Eye position in world space
    /// * `fov_degrees` - Field of view in degrees
    /// * `aspect` - Width / height of the draw context
    /// * `hither` - Near plane distance (must be > 0)
    /// * `yon` - Far plane distance, may be `f32::INFINITY`
    pub fn perspective(location: Point3, fov_degrees: f32, aspect: f32, hither: f32, yon: f32) -> Self {
        Self {
            placement: CameraPlacement {
                location,
                point_of_interest: Point3::origin(),
                up_vector: Vec3::y(),
            },
            range: CameraRange { hither, yon },
            view_port: CameraViewPort::default(),
            projection: Projection::ViewAngleAspect {
                field_of_view: utils::deg_to_rad(fov_degrees),
                aspect_ratio_x_to_y: aspect,
            },
        }
    }

    /// Create an orthographic camera looking at the origin
    pub fn orthographic(location: Point3, half_width: f32, half_height: f32, hither: f32, yon: f32) -> Self {
        Self {
            placement: CameraPlacement {
                location,
                point_of_interest: Point3::origin(),
                up_vector: Vec3::y(),
            },
            range: CameraRange { hither, yon },
            view_port: CameraViewPort::default(),
            projection: Projection::Orthographic {
                left: -half_width,
                top: half_height,
                right: half_width,
                bottom: -half_height,
            },
        }
    }

    /// Aim the camera at a point with a custom up vector
    pub fn look_at(&mut self, target: Point3, up: Vec3) {
        self.placement.point_of_interest = target;
        self.placement.up_vector = up;
        log::trace!("Camera look_at updated - target: {:?}, up: {:?}", target, up);
    }

    /// Update the aspect ratio after a draw-context resize
    ///
    /// Has no effect on orthographic cameras.
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if let Projection::ViewAngleAspect { aspect_ratio_x_to_y, .. } = &mut self.projection {
            if (*aspect_ratio_x_to_y - aspect).abs() > 0.01 {
                log::debug!("Camera aspect ratio changed: {:.3} -> {:.3}", aspect_ratio_x_to_y, aspect);
            }
            *aspect_ratio_x_to_y = aspect;
        }
    }

    /// World-to-view transform
    pub fn world_to_view(&self) -> Mat4 {
        Mat4::look_at(
            self.placement.location,
            self.placement.point_of_interest,
            self.placement.up_vector,
        )
    }

    /// View-to-frustum (clip) transform, viewport included
    pub fn view_to_frustum(&self) -> Mat4 {
        let CameraRange { hither, yon } = self.range;
        let projection = match self.projection {
            Projection::Orthographic { left, top, right, bottom } => {
                let far = if yon.is_finite() { yon } else { hither + 1.0e6 };
                Mat4::orthographic_gl(left, right, bottom, top, hither, far)
            }
            Projection::ViewAngleAspect { field_of_view, aspect_ratio_x_to_y } => {
                // Field of view spans the smaller dimension
                let fov_y = if aspect_ratio_x_to_y >= 1.0 {
                    field_of_view
                } else {
                    2.0 * ((field_of_view * 0.5).tan() / aspect_ratio_x_to_y).atan()
                };
                Mat4::perspective_gl(fov_y, aspect_ratio_x_to_y, hither, yon)
            }
        };
        self.view_port_matrix() * projection
    }

    /// World-to-frustum transform
    pub fn world_to_frustum(&self) -> Mat4 {
        self.view_to_frustum() * self.world_to_view()
    }

    /// Maps the viewport rectangle onto the full clip square
    fn view_port_matrix(&self) -> Mat4 {
        let vp = &self.view_port;
        let center_x = vp.origin_x + vp.width * 0.5;
        let center_y = vp.origin_y - vp.height * 0.5;
        let sx = 2.0 / vp.width;
        let sy = 2.0 / vp.height;

        let mut m = Mat4::identity();
        m[(0, 0)] = sx;
        m[(1, 1)] = sy;
        m[(0, 3)] = -center_x * sx;
        m[(1, 3)] = -center_y * sy;
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_view_port_is_identity() {
        let camera = Camera::perspective(Point3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        assert_relative_eq!(camera.view_port_matrix(), Mat4::identity());
    }

    #[test]
    fn test_point_of_interest_projects_to_center() {
        let camera = Camera::perspective(Point3::new(3.0, 2.0, 5.0), 60.0, 1.5, 0.1, 100.0);
        let clip = camera.world_to_frustum() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_infinite_yon_keeps_depth_in_range() {
        let camera = Camera::perspective(Point3::new(0.0, 0.0, 5.0), 60.0, 1.0, 1.0, f32::INFINITY);
        let clip = camera.view_to_frustum() * Vec4::new(0.0, 0.0, -1.0e5, 1.0);
        let depth = clip.z / clip.w;
        assert!(depth < 1.0 && depth > 0.99);
    }

    #[test]
    fn test_half_view_port_zooms() {
        let mut camera = Camera::orthographic(Point3::new(0.0, 0.0, 5.0), 1.0, 1.0, 0.1, 10.0);
        // Upper-right quadrant of the image plane
        camera.view_port = CameraViewPort { origin_x: 0.0, origin_y: 1.0, width: 1.0, height: 1.0 };
        let clip = camera.view_to_frustum() * Vec4::new(0.5, 0.5, -1.0, 1.0);
        assert_relative_eq!(clip.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_set_aspect_ratio_only_affects_perspective() {
        let mut camera = Camera::perspective(Point3::new(0.0, 0.0, 5.0), 60.0, 1.0, 0.1, 100.0);
        camera.set_aspect_ratio(2.0);
        assert!(matches!(
            camera.projection,
            Projection::ViewAngleAspect { aspect_ratio_x_to_y, .. } if aspect_ratio_x_to_y == 2.0
        ));
    }
}
