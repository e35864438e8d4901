//! Quadsprite engine crate.
//!
//! A minimal 2D sprite renderer: every image draw is one textured quad, placed
//! by a model matrix, sampled through a texture matrix (atlas slices) and
//! projected by a fixed orthographic projection centered on the canvas.
//!
//! Typical wiring on a window:
//!
//! ```no_run
//! # fn demo(window: &winit::window::Window) -> anyhow::Result<()> {
//! use quadsprite_engine::device::{Gpu, GpuInit};
//! use quadsprite_engine::render::RenderTarget;
//! use quadsprite_engine::render::sprite::{Image, ImageRenderer, ImageRendererConfig, SpriteDraw};
//! use quadsprite_engine::render::wgpu_backend::{WgpuBackend, WgpuBackendConfig};
//!
//! let mut gpu = Gpu::new_blocking(window, GpuInit::default())?;
//! let ctx = gpu.render_ctx();
//! let backend = WgpuBackend::new(&ctx, WgpuBackendConfig::default());
//! let mut renderer = ImageRenderer::new(backend, ImageRendererConfig::new(ctx.viewport))?;
//!
//! let avatar = Image::open("assets/avatar.png")?;
//! let draw = SpriteDraw::new(glam::Vec2::new(0.0, 200.0), 128.0, 128.0).rotation(90.0);
//! renderer.render_image(&avatar, &draw)?;
//!
//! let mut frame = gpu.begin_frame()?;
//! let mut target = RenderTarget::new(&mut frame.encoder, &frame.view);
//! renderer.backend_mut().encode(&mut target, Some(wgpu::Color::BLACK));
//! gpu.submit(frame);
//! # Ok(())
//! # }
//! ```

pub mod coords;
pub mod device;
pub mod logging;
pub mod render;
