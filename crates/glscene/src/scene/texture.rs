//! Texture images
//!
//! RGBA8 pixel data with an object identity and edit index, so the
//! renderer can keep one GPU texture per image and re-upload it only after
//! the pixels change.

use std::path::Path;

use super::object::{EditIndex, ObjectId, ObjectKind, ObjectRegistry};

/// Texture loading errors
#[derive(thiserror::Error, Debug)]
pub enum TextureError {
    /// The image could not be read or decoded
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),

    /// Pixel buffer length does not match the dimensions
    #[error("Pixel buffer of {actual} bytes does not match {width}x{height} RGBA")]
    SizeMismatch {
        /// Image width
        width: u32,
        /// Image height
        height: u32,
        /// Supplied byte count
        actual: usize,
    },
}

/// Decoded RGBA8 image ready for GPU upload
#[derive(Debug, Clone)]
pub struct TextureImage {
    id: ObjectId,
    edit_index: EditIndex,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureImage {
    /// Wrap raw RGBA8 pixels
    pub fn from_rgba(
        registry: &mut ObjectRegistry,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<Self, TextureError> {
        if pixels.len() != width as usize * height as usize * 4 {
            return Err(TextureError::SizeMismatch { width, height, actual: pixels.len() });
        }
        Ok(Self {
            id: registry.register(ObjectKind::Texture),
            edit_index: EditIndex::new(),
            width,
            height,
            pixels,
        })
    }

    /// Load an image file (PNG) and convert it to RGBA8
    pub fn from_file<P: AsRef<Path>>(registry: &mut ObjectRegistry, path: P) -> Result<Self, TextureError> {
        let path_ref = path.as_ref();
        log::debug!("Loading texture from: {:?}", path_ref);

        let rgba = image::open(path_ref)?.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::info!("Loaded texture {}x{} from {:?}", width, height, path_ref);
        Self::from_rgba(registry, width, height, rgba.into_raw())
    }

    /// Decode an encoded image held in memory
    pub fn from_bytes(registry: &mut ObjectRegistry, bytes: &[u8]) -> Result<Self, TextureError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("Loaded texture {}x{} from memory", width, height);
        Self::from_rgba(registry, width, height, rgba.into_raw())
    }

    /// Single-color image
    pub fn solid_color(registry: &mut ObjectRegistry, width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = color.repeat(width as usize * height as usize);
        Self {
            id: registry.register(ObjectKind::Texture),
            edit_index: EditIndex::new(),
            width,
            height,
            pixels,
        }
    }

    /// Object identity
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    /// Current edit index value
    pub const fn edit_index(&self) -> u32 {
        self.edit_index.get()
    }

    /// Width in pixels
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// RGBA8 pixel bytes, row-major from the top row
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable pixel access; counts as an edit
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.edit_index.edited();
        &mut self.pixels
    }

    /// Size of the pixel data in bytes
    pub fn size_bytes(&self) -> usize {
        self.pixels.len()
    }

    /// True if any pixel is not fully opaque
    pub fn has_alpha(&self) -> bool {
        self.pixels.chunks_exact(4).any(|px| px[3] < u8::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mismatch_is_rejected() {
        let mut registry = ObjectRegistry::new();
        let result = TextureImage::from_rgba(&mut registry, 2, 2, vec![0; 15]);
        assert!(matches!(result, Err(TextureError::SizeMismatch { actual: 15, .. })));
    }

    #[test]
    fn test_png_decoding() {
        let mut encoded = std::io::Cursor::new(Vec::new());
        image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut encoded, image::ImageFormat::Png)
            .unwrap();

        let mut registry = ObjectRegistry::new();
        let texture = TextureImage::from_bytes(&mut registry, encoded.get_ref()).unwrap();
        assert_eq!((texture.width(), texture.height()), (3, 2));
        assert_eq!(&texture.pixels()[..4], &[10, 20, 30, 255]);
        assert!(!texture.has_alpha());
    }

    #[test]
    fn test_pixel_edits_bump_edit_index() {
        let mut registry = ObjectRegistry::new();
        let mut texture = TextureImage::solid_color(&mut registry, 1, 1, [255, 255, 255, 128]);
        assert!(texture.has_alpha());
        texture.pixels_mut()[3] = 255;
        assert_eq!(texture.edit_index(), 1);
        assert!(!texture.has_alpha());
    }
}
