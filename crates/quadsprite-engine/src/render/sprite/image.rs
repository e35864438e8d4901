use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

/// Stable identity of a source image, usually its path or URL.
///
/// Two [`Image`] values with equal keys share one GPU texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageKey(Arc<str>);

impl ImageKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ImageKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A decoded RGBA8 bitmap with a stable identity.
///
/// Cheap to clone; pixels are shared. The renderer only reads the natural size
/// and uses the key for caching.
#[derive(Debug, Clone)]
pub struct Image {
    key: ImageKey,
    pixels: Arc<image::RgbaImage>,
}

impl Image {
    pub fn from_rgba(key: impl Into<ImageKey>, pixels: image::RgbaImage) -> Self {
        Self {
            key: key.into(),
            pixels: Arc::new(pixels),
        }
    }

    /// Decodes an image file; the path becomes the key.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoded =
            image::open(path).with_context(|| format!("failed to decode image {}", path.display()))?;
        Ok(Self::from_rgba(path.to_string_lossy().into_owned(), decoded.to_rgba8()))
    }

    /// Decodes an encoded image held in memory (e.g. `include_bytes!`).
    pub fn from_bytes(key: impl Into<ImageKey>, bytes: &[u8]) -> Result<Self> {
        let key = key.into();
        let decoded = image::load_from_memory(bytes)
            .with_context(|| format!("failed to decode image {key}"))?;
        Ok(Self::from_rgba(key, decoded.to_rgba8()))
    }

    pub fn key(&self) -> &ImageKey {
        &self.key
    }

    pub fn natural_width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn natural_height(&self) -> u32 {
        self.pixels.height()
    }

    /// Row-major RGBA8 bytes, top row first.
    pub fn rgba(&self) -> &[u8] {
        self.pixels.as_raw()
    }
}
