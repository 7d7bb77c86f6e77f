//! Light sources
//!
//! Lights are plain descriptions in world space. The renderer's light
//! tracker transforms them into eye space at the start of each pass and
//! assigns them to a fixed number of GPU slots.
//!
//! Supported kinds:
//! - **Ambient**: uniform light from all directions, summed into one color
//! - **Directional**: parallel rays (sunlight)
//! - **Point**: omnidirectional light from a position
//! - **Spot**: cone of light from a position

use serde::{Deserialize, Serialize};

use super::color::ColorRgb;
use crate::foundation::math::{Point3, Vec3};

/// Distance attenuation model for positional lights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Attenuation {
    /// Constant intensity
    #[default]
    None,
    /// Intensity falls off as 1 / d
    InverseDistance,
    /// Intensity falls off as 1 / d²
    InverseDistanceSquared,
}

impl Attenuation {
    /// Constant, linear and quadratic coefficients
    pub const fn coefficients(self) -> [f32; 3] {
        match self {
            Self::None => [1.0, 0.0, 0.0],
            Self::InverseDistance => [0.0, 1.0, 0.0],
            Self::InverseDistanceSquared => [0.0, 0.0, 1.0],
        }
    }
}

/// Light type with its kind-specific parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    /// Ambient light
    Ambient,
    /// Directional light
    Directional {
        /// Direction the light travels, world space
        direction: Vec3,
    },
    /// Point light
    Point {
        /// Position, world space
        location: Point3,
        /// Distance falloff
        attenuation: Attenuation,
    },
    /// Spot light
    Spot {
        /// Position, world space
        location: Point3,
        /// Cone axis, world space
        direction: Vec3,
        /// Half-angle of the fully lit cone, radians
        hot_angle: f32,
        /// Half-angle where the light reaches zero, radians
        outer_angle: f32,
        /// Distance falloff
        attenuation: Attenuation,
    },
}

/// Light source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    /// Light type
    pub kind: LightKind,
    /// Light color
    pub color: ColorRgb,
    /// Intensity multiplier
    pub brightness: f32,
    /// Disabled lights are ignored
    pub is_on: bool,
    /// Whether this light gets its own shadow pass
    pub casts_shadows: bool,
}

impl Light {
    fn with_kind(kind: LightKind, color: ColorRgb, brightness: f32) -> Self {
        Self { kind, color, brightness, is_on: true, casts_shadows: false }
    }

    /// Create an ambient light
    pub fn ambient(color: ColorRgb, brightness: f32) -> Self {
        Self::with_kind(LightKind::Ambient, color, brightness)
    }

    /// Create a directional light
    pub fn directional(direction: Vec3, color: ColorRgb, brightness: f32) -> Self {
        Self::with_kind(
            LightKind::Directional { direction: direction.normalize() },
            color,
            brightness,
        )
    }

    /// Create a point light
    pub fn point(location: Point3, color: ColorRgb, brightness: f32, attenuation: Attenuation) -> Self {
        Self::with_kind(LightKind::Point { location, attenuation }, color, brightness)
    }

    /// Create a spot light
    ///
    /// # Arguments
    /// * `location` - Light position in world space
    /// * `direction` - Cone axis (normalized internally)
    /// * `hot_angle` - Half-angle of full intensity, radians
    /// * `outer_angle` - Half-angle of zero intensity, radians
    pub fn spot(
        location: Point3,
        direction: Vec3,
        hot_angle: f32,
        outer_angle: f32,
        color: ColorRgb,
        brightness: f32,
    ) -> Self {
        Self::with_kind(
            LightKind::Spot {
                location,
                direction: direction.normalize(),
                hot_angle,
                outer_angle: outer_angle.max(hot_angle),
                attenuation: Attenuation::None,
            },
            color,
            brightness,
        )
    }

    /// Builder: mark the light as shadow casting
    pub fn with_shadows(mut self, casts_shadows: bool) -> Self {
        self.casts_shadows = casts_shadows;
        self
    }

    /// Light color scaled by brightness
    pub fn radiance(&self) -> ColorRgb {
        self.color.scaled(self.brightness)
    }

    /// True for ambient lights
    pub const fn is_ambient(&self) -> bool {
        matches!(self.kind, LightKind::Ambient)
    }
}

/// A warm indoor setup: dim ambient, one key light and one fill bulb
pub fn indoor_warm() -> Vec<Light> {
    vec![
        Light::ambient(ColorRgb::new(1.0, 0.9, 0.8), 0.2),
        Light::directional(Vec3::new(-0.3, -1.0, -0.5), ColorRgb::new(1.0, 0.95, 0.8), 0.8),
        Light::point(
            Point3::new(2.0, 3.0, 2.0),
            ColorRgb::new(1.0, 0.9, 0.7),
            1.0,
            Attenuation::InverseDistance,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directional_light_is_normalized() {
        let light = Light::directional(Vec3::new(0.0, -2.0, 0.0), ColorRgb::WHITE, 1.0);
        match light.kind {
            LightKind::Directional { direction } => assert_eq!(direction, Vec3::new(0.0, -1.0, 0.0)),
            _ => panic!("expected a directional light"),
        }
    }

    #[test]
    fn test_spot_outer_angle_never_below_hot_angle() {
        let light = Light::spot(Point3::origin(), -Vec3::z(), 0.5, 0.2, ColorRgb::WHITE, 1.0);
        match light.kind {
            LightKind::Spot { hot_angle, outer_angle, .. } => assert!(outer_angle >= hot_angle),
            _ => panic!("expected a spot light"),
        }
    }

    #[test]
    fn test_radiance_scales_color() {
        let light = Light::ambient(ColorRgb::new(1.0, 0.5, 0.0), 0.5);
        assert_eq!(light.radiance(), ColorRgb::new(0.5, 0.25, 0.0));
    }

    #[test]
    fn test_indoor_preset() {
        let lights = indoor_warm();
        assert_eq!(lights.iter().filter(|l| l.is_ambient()).count(), 1);
        assert!(lights.iter().all(|l| l.is_on && !l.casts_shadows));
    }
}
