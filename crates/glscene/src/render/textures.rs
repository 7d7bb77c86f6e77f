//! Texture cache
//!
//! Maps texture objects to device textures. Entries are keyed by object id
//! and remember the edit index they were uploaded at; an edited texture is
//! uploaded again the next time it is drawn. A failed upload posts one
//! warning per texture version and the geometry is drawn untextured.

use std::collections::{HashMap, HashSet};

use super::error::{RenderWarning, WarningLog};
use super::gpu::{GpuDevice, TextureBinding, TextureId};
use crate::scene::{ObjectId, TextureShader};

#[derive(Debug, Clone, Copy)]
struct CachedTexture {
    edit_index: u32,
    texture: TextureId,
}

/// Uploaded textures
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<ObjectId, CachedTexture>,
    failed: HashSet<(ObjectId, u32)>,
    uploads: usize,
}

impl TextureCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Device binding for a texture shader, uploading if needed
    ///
    /// Returns `None` if the upload failed.
    pub fn binding<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        shader: &TextureShader,
        warnings: &mut WarningLog,
    ) -> Option<TextureBinding> {
        let image = &shader.texture;
        let (id, edit_index) = (image.id(), image.edit_index());

        let texture = match self.entries.get(&id) {
            Some(entry) if entry.edit_index == edit_index => entry.texture,
            stale => {
                if let Some(entry) = stale.copied() {
                    device.delete_texture(entry.texture);
                    self.entries.remove(&id);
                }
                if self.failed.contains(&(id, edit_index)) {
                    return None;
                }
                match device.create_texture(image) {
                    Ok(texture) => {
                        log::trace!("Uploaded {}x{} texture {:?}", image.width(), image.height(), id);
                        self.uploads += 1;
                        self.entries.insert(id, CachedTexture { edit_index, texture });
                        texture
                    }
                    Err(e) => {
                        warnings.post(RenderWarning::TextureUploadFailed { reason: e.to_string() });
                        self.failed.insert((id, edit_index));
                        return None;
                    }
                }
            }
        };

        Some(TextureBinding { texture, u_boundary: shader.u_boundary, v_boundary: shader.v_boundary })
    }

    /// Number of textures resident on the device
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is resident
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Uploads performed since creation
    pub const fn uploads(&self) -> usize {
        self.uploads
    }

    /// Release every texture
    pub fn clear<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        for (_, entry) in self.entries.drain() {
            device.delete_texture(entry.texture);
        }
        self.failed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gpu::recording::RecordingDevice;
    use crate::scene::{ObjectRegistry, TextureImage};
    use std::sync::Arc;

    fn shader(registry: &mut ObjectRegistry) -> TextureShader {
        TextureShader::new(Arc::new(TextureImage::solid_color(registry, 2, 2, [255, 0, 0, 255])))
    }

    #[test]
    fn test_texture_uploaded_once() {
        let mut registry = ObjectRegistry::new();
        let shader = shader(&mut registry);
        let mut device = RecordingDevice::new();
        let mut cache = TextureCache::new();
        let mut warnings = WarningLog::new();

        let first = cache.binding(&mut device, &shader, &mut warnings);
        let second = cache.binding(&mut device, &shader, &mut warnings);
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(device.texture_uploads(), 1);
    }

    #[test]
    fn test_edited_texture_is_reuploaded() {
        let mut registry = ObjectRegistry::new();
        let mut image = TextureImage::solid_color(&mut registry, 2, 2, [0, 0, 0, 255]);
        let mut device = RecordingDevice::new();
        let mut cache = TextureCache::new();
        let mut warnings = WarningLog::new();

        let before = TextureShader::new(Arc::new(image.clone()));
        cache.binding(&mut device, &before, &mut warnings);

        image.pixels_mut()[0] = 255;
        let after = TextureShader::new(Arc::new(image));
        cache.binding(&mut device, &after, &mut warnings);

        assert_eq!(device.texture_uploads(), 2);
        assert_eq!(device.live_textures(), 1);
    }

    #[test]
    fn test_upload_failure_warns_once() {
        let mut registry = ObjectRegistry::new();
        let shader = shader(&mut registry);
        let mut device = RecordingDevice::new();
        device.fail_texture_uploads = true;
        let mut cache = TextureCache::new();
        let mut warnings = WarningLog::new();

        assert!(cache.binding(&mut device, &shader, &mut warnings).is_none());
        assert!(cache.binding(&mut device, &shader, &mut warnings).is_none());
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings.warnings()[0], RenderWarning::TextureUploadFailed { .. }));
    }
}
