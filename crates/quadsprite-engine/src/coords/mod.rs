//! Pixel-space geometry shared by the device and sprite layers.
//!
//! Two spaces are in play:
//! - image space: pixels of a source bitmap, origin top-left, +Y down (slices)
//! - canvas space: world units centered on the canvas, +X right, +Y up
//!
//! The projection built from [`Viewport`] maps canvas space to clip space.

mod rect;
mod viewport;

pub use rect::Rect;
pub use viewport::Viewport;
