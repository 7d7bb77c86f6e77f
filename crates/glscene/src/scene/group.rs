//! Scene-graph nodes
//!
//! A minimal ordered group tree, walked depth-first in pre-order. Style,
//! attribute, shader and transform nodes affect every later sibling and
//! their descendants until the enclosing group ends.

use super::attributes::{AttributeSet, Illumination, TextureShader};
use super::geometry::GeometryObject;
use super::object::ObjectId;
use super::style::{
    AntiAliasStyleData, BackfacingStyle, FillStyle, FogStyleData, InterpolationStyle,
    OrientationStyle,
};
use crate::foundation::math::Mat4;

/// A style node
#[derive(Debug, Clone, PartialEq)]
pub enum StyleNode {
    /// Shading interpolation
    Interpolation(InterpolationStyle),
    /// Back-face handling
    Backfacing(BackfacingStyle),
    /// Fill mode
    Fill(FillStyle),
    /// Front-face winding
    Orientation(OrientationStyle),
    /// Highlight attributes, `None` to disable highlighting
    Highlight(Option<AttributeSet>),
    /// Anti-aliasing
    AntiAlias(AntiAliasStyleData),
    /// Fog
    Fog(FogStyleData),
    /// Whether geometry casts shadows
    CastShadows(bool),
    /// Whether geometry receives shadows
    ReceiveShadows(bool),
    /// Line width in pixels
    LineWidth(f32),
}

/// One node of a scene graph
#[derive(Debug, Clone)]
pub enum SceneNode {
    /// Drawable geometry
    Geometry(GeometryObject),
    /// Attribute set applied to the view state
    Attributes(AttributeSet),
    /// Surface (texture) shader, `None` to remove texturing
    SurfaceShader(Option<TextureShader>),
    /// Illumination model
    Illumination(Illumination),
    /// Style change
    Style(StyleNode),
    /// Transform multiplied onto the current local-to-world matrix
    Transform(Mat4),
    /// Nested scope
    Group(Vec<SceneNode>),
}

impl SceneNode {
    /// Create a group node
    pub fn group(children: Vec<SceneNode>) -> Self {
        Self::Group(children)
    }

    /// Find a geometry anywhere below this node
    pub fn geometry_mut(&mut self, id: ObjectId) -> Option<&mut GeometryObject> {
        match self {
            Self::Geometry(object) if object.id() == id => Some(object),
            Self::Group(children) => children.iter_mut().find_map(|c| c.geometry_mut(id)),
            _ => None,
        }
    }

    /// Number of geometry nodes below this node
    pub fn geometry_count(&self) -> usize {
        match self {
            Self::Geometry(_) => 1,
            Self::Group(children) => children.iter().map(Self::geometry_count).sum(),
            _ => 0,
        }
    }
}
