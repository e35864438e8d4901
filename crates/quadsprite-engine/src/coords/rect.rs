use glam::Vec2;

/// Axis-aligned rectangle in image pixels (top-left origin).
///
/// Used as the atlas slice: the sub-region of a source image a sprite samples.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    /// Rectangle covering a whole `width x height` image.
    #[inline]
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// True when the rectangle lies inside a `width x height` image.
    ///
    /// Edges are inclusive: a slice may end exactly on the image border.
    #[inline]
    pub fn fits_within(self, width: u32, height: u32) -> bool {
        let max = self.max();
        self.is_finite()
            && self.origin.x >= 0.0
            && self.origin.y >= 0.0
            && max.x <= width as f32
            && max.y <= height as f32
    }
}
