use std::ops::Range;

use anyhow::Result;

use super::{ProgramFactory, RenderState, TextureFactory};

/// Opaque vertex buffer issued by a [`RenderBackend`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u32);

/// Primitive assembly for a draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
}

/// The GPU context a renderer drives.
///
/// Owns buffers, textures and programs; executes draws against an explicit
/// [`RenderState`] instead of ambient global state.
pub trait RenderBackend: ProgramFactory + TextureFactory {
    /// Uploads immutable vertex data (tightly packed `f32`s).
    fn create_vertex_buffer(&mut self, label: &str, data: &[f32]) -> Result<BufferHandle>;

    /// Draws `vertices` from the attribute buffers bound in `state`.
    fn draw_arrays(
        &mut self,
        program: &Self::Program,
        state: &RenderState,
        topology: Topology,
        vertices: Range<u32>,
    ) -> Result<()>;
}
