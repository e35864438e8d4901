//! Backend-agnostic sprite pipeline.
//!
//! [`ImageRenderer`] turns "draw this image here" into one backend draw call:
//! it resolves the image to a cached texture, composes the model and texture
//! matrices, writes them into the [`RenderState`] and issues a four-vertex
//! triangle strip over the shared unit quad.
//!
//! Backends implement [`RenderBackend`] (which extends [`ProgramFactory`] and
//! [`TextureFactory`]); `render::wgpu_backend` is the GPU one.

mod backend;
mod cache;
mod geometry;
mod image;
mod program;
mod renderer;
mod state;
mod texture;
pub mod transform;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BufferHandle, RenderBackend, Topology};
pub use cache::{CachePolicy, EvictionPolicy, Lru, TextureCache, Unbounded};
pub use geometry::{
    GeometryBuffers, QUAD_COMPONENTS, QUAD_POSITIONS, QUAD_TEX_COORDS, QUAD_VERTEX_COUNT,
};
pub use self::image::{Image, ImageKey};
pub use program::{AttributeLocation, Program, ProgramFactory, UniformLocation};
pub use renderer::{
    ATTR_POSITION, ATTR_TEX_COORDS, ImageRenderer, ImageRendererConfig, SPRITE_FRAGMENT_SHADER,
    SPRITE_VERTEX_SHADER, SpriteDraw, SpriteLocations, UNIFORM_ALPHA, UNIFORM_MODEL,
    UNIFORM_PROJECTION, UNIFORM_TEX_IMAGE, UNIFORM_TEXTURE,
};
pub use state::{
    BlendFactor, BlendFunc, MAX_TEXTURE_UNITS, RenderState, UniformValue, VertexBinding,
};
pub use texture::{TextureFactory, TextureHandle};
pub use transform::SpriteTransform;
