//! Draw context description
//!
//! A draw context names the surface the renderer draws into. The renderer
//! (re)creates its GPU context whenever the draw context's edit index
//! differs from the one it last opened.

use super::color::ColorRgb;

/// What to clear at the start of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClearMethod {
    /// Leave the previous image
    None,
    /// Fill with the clear color
    #[default]
    WithColor,
}

/// Draw-context parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DrawContextData {
    /// Surface width in pixels
    pub pane_width: u32,
    /// Surface height in pixels
    pub pane_height: u32,
    /// Color clearing policy
    pub clear_method: ClearMethod,
    /// Background color
    pub clear_color: ColorRgb,
    /// Background alpha
    pub clear_alpha: f32,
    /// Whether the depth buffer is cleared each frame
    pub clear_depth: bool,
    /// Whether frames are double buffered
    pub double_buffer: bool,
    /// Incremented whenever any field changes
    pub edit_index: u32,
}

impl DrawContextData {
    /// Opaque black, double-buffered context of the given size
    pub fn new(pane_width: u32, pane_height: u32) -> Self {
        Self {
            pane_width,
            pane_height,
            clear_method: ClearMethod::WithColor,
            clear_color: ColorRgb::BLACK,
            clear_alpha: 1.0,
            clear_depth: true,
            double_buffer: true,
            edit_index: 0,
        }
    }

    /// Resize the pane, bumping the edit index
    pub fn resize(&mut self, pane_width: u32, pane_height: u32) {
        if (pane_width, pane_height) != (self.pane_width, self.pane_height) {
            self.pane_width = pane_width;
            self.pane_height = pane_height;
            self.edit_index = self.edit_index.wrapping_add(1);
        }
    }

    /// Width / height
    pub fn aspect_ratio(&self) -> f32 {
        self.pane_width as f32 / self.pane_height.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_bumps_edit_index_only_on_change() {
        let mut context = DrawContextData::new(640, 480);
        context.resize(640, 480);
        assert_eq!(context.edit_index, 0);
        context.resize(800, 600);
        assert_eq!(context.edit_index, 1);
        assert!((context.aspect_ratio() - 800.0 / 600.0).abs() < 1e-6);
    }
}
