use std::collections::BTreeMap;

use glam::Mat4;

use super::{AttributeLocation, BufferHandle, TextureHandle, UniformLocation};

/// Number of texture units a [`RenderState`] tracks.
pub const MAX_TEXTURE_UNITS: usize = 4;

/// Source/destination blend factors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Blend equation `src * src_factor + dst * dst_factor`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunc {
    /// Straight (non-premultiplied) alpha.
    pub const ALPHA: Self = Self {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
}

/// Value stored for a uniform location.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Mat4(Mat4),
    /// Texture sampler reading from the given texture unit.
    Sampler(u32),
}

/// Vertex attribute fed from a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexBinding {
    pub buffer: BufferHandle,
    /// Floats per vertex.
    pub components: u32,
}

/// GPU pipeline state a draw executes against.
///
/// Stands in for the ambient state of an immediate-mode context: whatever was
/// set by the previous draw stays set until overwritten. The renderer owns one
/// and is its only mutator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderState {
    blend: Option<BlendFunc>,
    attributes: BTreeMap<AttributeLocation, VertexBinding>,
    uniforms: BTreeMap<UniformLocation, UniformValue>,
    active_texture_unit: u32,
    texture_units: [Option<TextureHandle>; MAX_TEXTURE_UNITS],
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── blend ─────────────────────────────────────────────────────────────

    pub fn enable_blend(&mut self, func: BlendFunc) {
        self.blend = Some(func);
    }

    pub fn disable_blend(&mut self) {
        self.blend = None;
    }

    /// Active blend function, `None` when blending is disabled.
    pub fn blend(&self) -> Option<BlendFunc> {
        self.blend
    }

    pub fn is_blend_enabled(&self) -> bool {
        self.blend.is_some()
    }

    // ── attributes ────────────────────────────────────────────────────────

    pub fn bind_attribute(&mut self, location: AttributeLocation, binding: VertexBinding) {
        self.attributes.insert(location, binding);
    }

    pub fn attribute(&self, location: AttributeLocation) -> Option<VertexBinding> {
        self.attributes.get(&location).copied()
    }

    /// Bound attributes in location order.
    pub fn attributes(&self) -> impl Iterator<Item = (AttributeLocation, VertexBinding)> + '_ {
        self.attributes.iter().map(|(loc, b)| (*loc, *b))
    }

    // ── uniforms ──────────────────────────────────────────────────────────

    pub fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.uniforms.insert(location, value);
    }

    pub fn uniform(&self, location: UniformLocation) -> Option<UniformValue> {
        self.uniforms.get(&location).copied()
    }

    /// Returns the matrix at `location`, or `None` if unset or not a matrix.
    pub fn uniform_mat4(&self, location: UniformLocation) -> Option<Mat4> {
        match self.uniform(location)? {
            UniformValue::Mat4(m) => Some(m),
            _ => None,
        }
    }

    /// Set uniforms in location order.
    pub fn uniforms(&self) -> impl Iterator<Item = (UniformLocation, UniformValue)> + '_ {
        self.uniforms.iter().map(|(loc, v)| (*loc, *v))
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Selects the unit that [`RenderState::bind_texture`] writes to.
    ///
    /// Units past [`MAX_TEXTURE_UNITS`] are clamped to the last one.
    pub fn active_texture(&mut self, unit: u32) {
        self.active_texture_unit = unit.min(MAX_TEXTURE_UNITS as u32 - 1);
    }

    pub fn active_texture_unit(&self) -> u32 {
        self.active_texture_unit
    }

    pub fn bind_texture(&mut self, texture: TextureHandle) {
        self.texture_units[self.active_texture_unit as usize] = Some(texture);
    }

    pub fn texture(&self, unit: u32) -> Option<TextureHandle> {
        self.texture_units.get(unit as usize).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_starts_disabled_and_toggles() {
        let mut s = RenderState::new();
        assert!(!s.is_blend_enabled());

        s.enable_blend(BlendFunc::ALPHA);
        assert_eq!(s.blend(), Some(BlendFunc::ALPHA));

        s.disable_blend();
        assert_eq!(s.blend(), None);
    }

    #[test]
    fn uniform_overwrite_keeps_latest() {
        let mut s = RenderState::new();
        let loc = UniformLocation(3);
        s.set_uniform(loc, UniformValue::Float(0.25));
        s.set_uniform(loc, UniformValue::Float(1.0));
        assert_eq!(s.uniform(loc), Some(UniformValue::Float(1.0)));
        assert_eq!(s.uniforms().count(), 1);
    }

    #[test]
    fn uniform_mat4_ignores_other_kinds() {
        let mut s = RenderState::new();
        s.set_uniform(UniformLocation(0), UniformValue::Sampler(0));
        s.set_uniform(UniformLocation(1), UniformValue::Mat4(Mat4::IDENTITY));
        assert_eq!(s.uniform_mat4(UniformLocation(0)), None);
        assert_eq!(s.uniform_mat4(UniformLocation(1)), Some(Mat4::IDENTITY));
    }

    #[test]
    fn bind_texture_targets_active_unit() {
        let mut s = RenderState::new();
        s.active_texture(2);
        s.bind_texture(TextureHandle(7));
        assert_eq!(s.texture(2), Some(TextureHandle(7)));
        assert_eq!(s.texture(0), None);
    }

    #[test]
    fn active_texture_clamps_out_of_range_units() {
        let mut s = RenderState::new();
        s.active_texture(99);
        assert_eq!(s.active_texture_unit(), MAX_TEXTURE_UNITS as u32 - 1);
        assert_eq!(s.texture(99), None);
    }

    #[test]
    fn attributes_iterate_in_location_order() {
        let mut s = RenderState::new();
        let b = VertexBinding { buffer: BufferHandle(0), components: 2 };
        s.bind_attribute(AttributeLocation(1), b);
        s.bind_attribute(AttributeLocation(0), b);
        let locs: Vec<_> = s.attributes().map(|(l, _)| l.0).collect();
        assert_eq!(locs, vec![0, 1]);
    }
}
