use anyhow::{Context, Result};

use super::{BufferHandle, RenderBackend};

/// Unit quad centered on the origin, ordered for a triangle strip.
pub const QUAD_POSITIONS: [f32; 8] = [
    -0.5, -0.5, //
    0.5, -0.5, //
    -0.5, 0.5, //
    0.5, 0.5,
];

/// Texture coordinates matching [`QUAD_POSITIONS`] corner for corner.
///
/// Texture space has v = 0 at the first (top) image row, so the bottom of the
/// quad samples v = 1 and the image comes out upright.
pub const QUAD_TEX_COORDS: [f32; 8] = [
    0.0, 1.0, //
    1.0, 1.0, //
    0.0, 0.0, //
    1.0, 0.0,
];

/// Floats per vertex in both quad buffers.
pub const QUAD_COMPONENTS: u32 = 2;

/// Vertices in the quad strip.
pub const QUAD_VERTEX_COUNT: u32 = 4;

/// The two static vertex buffers every sprite draw reuses.
///
/// Uploaded once; per-draw variation lives entirely in uniforms.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GeometryBuffers {
    pub positions: BufferHandle,
    pub tex_coords: BufferHandle,
}

impl GeometryBuffers {
    pub fn upload<B>(backend: &mut B) -> Result<Self>
    where
        B: RenderBackend + ?Sized,
    {
        let positions = backend
            .create_vertex_buffer("quadsprite quad positions", &QUAD_POSITIONS)
            .context("failed to upload quad positions")?;
        let tex_coords = backend
            .create_vertex_buffer("quadsprite quad tex coords", &QUAD_TEX_COORDS)
            .context("failed to upload quad texture coordinates")?;

        Ok(Self {
            positions,
            tex_coords,
        })
    }
}
