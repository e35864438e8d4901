use anyhow::Result;

use super::Image;

/// Opaque GPU texture issued by a [`TextureFactory`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u32);

impl TextureHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Uploads decoded images to the GPU.
pub trait TextureFactory {
    /// Uploads `image` and returns a handle to the new texture.
    fn create_texture(&mut self, image: &Image) -> Result<TextureHandle>;

    /// Frees a texture. Only called when the texture cache evicts an entry.
    fn release_texture(&mut self, handle: TextureHandle) {
        let _ = handle;
    }
}
