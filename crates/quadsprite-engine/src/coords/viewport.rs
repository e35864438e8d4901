/// Canvas size in pixels.
///
/// The sprite projection spans `[-width/2, width/2] x [-height/2, height/2]`,
/// so this is also the extent of canvas space.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    #[inline]
    pub fn half_extent(self) -> (f32, f32) {
        (self.width * 0.5, self.height * 0.5)
    }
}
