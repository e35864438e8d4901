//! GPU rendering subsystem.
//!
//! `sprite` holds the backend-agnostic image pipeline (texture cache, transform
//! composition, render state, the `ImageRenderer` orchestrator) together with the
//! collaborator contracts it drives. `wgpu_backend` implements those contracts on
//! wgpu.
//!
//! Convention:
//! - sprite positions are canvas units centered on the canvas, +Y up
//! - slices are image pixels, top-left origin, +Y down

mod ctx;
pub mod sprite;
pub mod wgpu_backend;

pub use ctx::{RenderCtx, RenderTarget};
