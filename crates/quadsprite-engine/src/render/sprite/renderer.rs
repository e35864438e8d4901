use anyhow::{Context, Result};
use glam::{Mat4, Vec2};

use crate::coords::{Rect, Viewport};

use super::geometry::{QUAD_COMPONENTS, QUAD_VERTEX_COUNT};
use super::transform::{self, SpriteTransform};
use super::{
    AttributeLocation, BlendFunc, CachePolicy, GeometryBuffers, Image, Program, RenderBackend,
    RenderState, TextureCache, Topology, UniformLocation, UniformValue, VertexBinding,
};

/// Vertex stage of the sprite program.
pub const SPRITE_VERTEX_SHADER: &str = include_str!("shaders/sprite.vert.wgsl");
/// Fragment stage of the sprite program.
pub const SPRITE_FRAGMENT_SHADER: &str = include_str!("shaders/sprite.frag.wgsl");

pub const ATTR_POSITION: &str = "position";
pub const ATTR_TEX_COORDS: &str = "textureCoords";
pub const UNIFORM_PROJECTION: &str = "projectionMatrix";
pub const UNIFORM_MODEL: &str = "modelMatrix";
pub const UNIFORM_TEXTURE: &str = "textureMatrix";
pub const UNIFORM_ALPHA: &str = "alpha";
pub const UNIFORM_TEX_IMAGE: &str = "texImage";

/// Texture unit sprites sample from.
const SPRITE_TEXTURE_UNIT: u32 = 0;

/// Renderer construction parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRendererConfig {
    /// Canvas size in pixels. Fixed for the renderer's lifetime.
    pub canvas: Viewport,
    pub cache: CachePolicy,
}

impl ImageRendererConfig {
    pub fn new(canvas: Viewport) -> Self {
        Self {
            canvas,
            cache: CachePolicy::default(),
        }
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }
}

/// One sprite draw: where, how big, which part of the image, how opaque.
///
/// Defaults: whole image, no rotation, no flips, fully opaque.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SpriteDraw {
    /// Sprite center in canvas units.
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
    /// Pixel rectangle of the source image; `None` = whole image.
    pub slice: Option<Rect>,
    /// Degrees about the sprite center. The canvas is +Y up, so positive
    /// angles turn the sprite counter-clockwise on screen.
    pub rotation: f32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    /// Opacity in `[0, 1]`. Anything below 1 turns blending on.
    pub alpha: f32,
}

impl SpriteDraw {
    pub fn new(position: Vec2, width: f32, height: f32) -> Self {
        Self {
            position,
            width,
            height,
            slice: None,
            rotation: 0.0,
            flip_horizontal: false,
            flip_vertical: false,
            alpha: 1.0,
        }
    }

    pub fn slice(mut self, slice: Rect) -> Self {
        self.slice = Some(slice);
        self
    }

    pub fn rotation(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn flip(mut self, horizontal: bool, vertical: bool) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn transform(&self) -> SpriteTransform {
        SpriteTransform {
            position: self.position,
            width: self.width,
            height: self.height,
            rotation: self.rotation,
            flip_horizontal: self.flip_horizontal,
            flip_vertical: self.flip_vertical,
        }
    }

    fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.rotation.is_finite()
            && self.alpha.is_finite()
    }
}

/// Attribute and uniform locations resolved once from the sprite program.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpriteLocations {
    pub position: AttributeLocation,
    pub tex_coords: AttributeLocation,
    pub projection: UniformLocation,
    pub model: UniformLocation,
    pub texture: UniformLocation,
    pub alpha: UniformLocation,
    pub tex_image: UniformLocation,
}

impl SpriteLocations {
    fn resolve<P: Program>(program: &P) -> Result<Self> {
        Ok(Self {
            position: program.require_attribute(ATTR_POSITION)?,
            tex_coords: program.require_attribute(ATTR_TEX_COORDS)?,
            projection: program.require_uniform(UNIFORM_PROJECTION)?,
            model: program.require_uniform(UNIFORM_MODEL)?,
            texture: program.require_uniform(UNIFORM_TEXTURE)?,
            alpha: program.require_uniform(UNIFORM_ALPHA)?,
            tex_image: program.require_uniform(UNIFORM_TEX_IMAGE)?,
        })
    }
}

/// Draws images as textured quads, one draw call per sprite.
///
/// Owns the backend, the compiled sprite program, the static quad geometry, the
/// texture cache and the [`RenderState`] draws execute against. Draw order is
/// stacking order; state set by one call (notably blending) is what the next
/// caller of the backend sees.
pub struct ImageRenderer<B: RenderBackend> {
    backend: B,
    program: B::Program,
    locations: SpriteLocations,
    geometry: GeometryBuffers,
    projection: Mat4,
    cache: TextureCache,
    state: RenderState,
}

impl<B: RenderBackend> ImageRenderer<B> {
    /// Compiles the sprite program and uploads the quad geometry.
    ///
    /// Fails if the canvas is degenerate, the program does not compile or link,
    /// or any attribute/uniform the renderer binds is missing from it.
    pub fn new(mut backend: B, config: ImageRendererConfig) -> Result<Self> {
        let ImageRendererConfig { canvas, cache } = config;
        anyhow::ensure!(canvas.is_valid(), "invalid canvas size {canvas:?}");

        let program = backend
            .create_program(SPRITE_VERTEX_SHADER, SPRITE_FRAGMENT_SHADER)
            .context("failed to build sprite program")?;
        let locations =
            SpriteLocations::resolve(&program).context("sprite program is missing a binding")?;
        let geometry = GeometryBuffers::upload(&mut backend)?;

        log::info!(
            "image renderer ready: canvas {}x{}, cache {cache:?}",
            canvas.width,
            canvas.height
        );

        Ok(Self {
            backend,
            program,
            locations,
            geometry,
            projection: transform::projection(canvas),
            cache: TextureCache::new(cache),
            state: RenderState::new(),
        })
    }

    /// Draws `image` as described by `draw`.
    ///
    /// Uploads the image on first use. Slices outside the image, zero-sized
    /// images and non-finite parameters are caller errors and are only checked
    /// in debug builds.
    pub fn render_image(&mut self, image: &Image, draw: &SpriteDraw) -> Result<()> {
        let texture = self.cache.resolve(image, &mut self.backend)?;

        let (width, height) = (image.natural_width(), image.natural_height());
        let slice = draw.slice.unwrap_or_else(|| Rect::full(width, height));
        debug_assert!(
            slice.fits_within(width, height),
            "slice {slice:?} outside {width}x{height} image {}",
            image.key()
        );
        debug_assert!(draw.is_finite(), "non-finite sprite draw {draw:?}");

        let model = transform::model(&draw.transform());
        let texture_matrix = transform::texture_transform(slice, width, height);

        let loc = self.locations;
        let state = &mut self.state;

        state.bind_attribute(
            loc.position,
            VertexBinding {
                buffer: self.geometry.positions,
                components: QUAD_COMPONENTS,
            },
        );
        state.bind_attribute(
            loc.tex_coords,
            VertexBinding {
                buffer: self.geometry.tex_coords,
                components: QUAD_COMPONENTS,
            },
        );

        state.set_uniform(loc.projection, UniformValue::Mat4(self.projection));
        state.set_uniform(loc.model, UniformValue::Mat4(model));
        state.set_uniform(loc.texture, UniformValue::Mat4(texture_matrix));

        // Opaque sprites skip blending entirely.
        if draw.alpha < 1.0 {
            state.enable_blend(BlendFunc::ALPHA);
        } else {
            state.disable_blend();
        }

        state.active_texture(SPRITE_TEXTURE_UNIT);
        state.bind_texture(texture);
        state.set_uniform(loc.tex_image, UniformValue::Sampler(SPRITE_TEXTURE_UNIT));
        state.set_uniform(loc.alpha, UniformValue::Float(draw.alpha));

        log::trace!(
            "draw {} at {:?} {}x{} slice {slice:?} rot {} alpha {}",
            image.key(),
            draw.position,
            draw.width,
            draw.height,
            draw.rotation,
            draw.alpha
        );

        self.backend.draw_arrays(
            &self.program,
            &self.state,
            Topology::TriangleStrip,
            0..QUAD_VERTEX_COUNT,
        )
    }

    /// State left behind by the last draw.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn locations(&self) -> &SpriteLocations {
        &self.locations
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.cache
    }

    pub fn program(&self) -> &B::Program {
        &self.program
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
