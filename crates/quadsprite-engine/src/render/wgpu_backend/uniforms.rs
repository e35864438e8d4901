use anyhow::{Result, bail};

use crate::render::sprite::{RenderState, TextureHandle, UniformLocation, UniformValue};

use super::reflect::{UniformKind, UniformSlot};

pub(super) fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Serializes the uniform values a draw sees into the program's block layout.
///
/// Returns the block bytes and the texture the program samples, if any.
pub(super) fn pack_block(
    slots: &[(String, UniformSlot)],
    block_size: u32,
    state: &RenderState,
) -> Result<(Vec<u8>, Option<TextureHandle>)> {
    let mut block = vec![0u8; block_size as usize];
    let mut texture = None;

    for (index, (name, slot)) in slots.iter().enumerate() {
        let value = state.uniform(UniformLocation(index as u32));

        match (*slot, value) {
            (UniformSlot::Value { offset, kind }, Some(value)) => {
                let start = offset as usize;
                let end = start + kind.size() as usize;
                match (kind, value) {
                    (UniformKind::Mat4, UniformValue::Mat4(m)) => {
                        let cols = m.to_cols_array();
                        block[start..end].copy_from_slice(bytemuck::cast_slice(&cols));
                    }
                    (UniformKind::Float, UniformValue::Float(v)) => {
                        block[start..end].copy_from_slice(bytemuck::bytes_of(&v));
                    }
                    (kind, value) => bail!("uniform `{name}` is {kind:?} but was set to {value:?}"),
                }
            }
            (UniformSlot::Texture, Some(UniformValue::Sampler(unit))) => {
                let Some(handle) = state.texture(unit) else {
                    bail!("uniform `{name}` samples texture unit {unit}, which is empty");
                };
                texture = Some(handle);
            }
            (UniformSlot::Texture, Some(value)) => {
                bail!("uniform `{name}` is a texture sampler but was set to {value:?}")
            }
            (_, None) => bail!("uniform `{name}` was never set"),
        }
    }

    Ok((block, texture))
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;

    fn slots() -> Vec<(String, UniformSlot)> {
        vec![
            (
                "modelMatrix".into(),
                UniformSlot::Value { offset: 0, kind: UniformKind::Mat4 },
            ),
            (
                "alpha".into(),
                UniformSlot::Value { offset: 64, kind: UniformKind::Float },
            ),
            ("texImage".into(), UniformSlot::Texture),
        ]
    }

    fn complete_state() -> RenderState {
        let mut state = RenderState::new();
        let model = Mat4::from_scale(glam::vec3(2.0, 3.0, 1.0));
        state.set_uniform(UniformLocation(0), UniformValue::Mat4(model));
        state.set_uniform(UniformLocation(1), UniformValue::Float(0.25));
        state.set_uniform(UniformLocation(2), UniformValue::Sampler(0));
        state.active_texture(0);
        state.bind_texture(TextureHandle(7));
        state
    }

    fn f32_at(block: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(block[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn align_rounds_up_to_the_next_multiple() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(208, 256), 256);
        assert_eq!(align_to(512, 256), 512);
    }

    #[test]
    fn values_land_at_reflected_offsets() {
        let (block, texture) = pack_block(&slots(), 80, &complete_state()).unwrap();

        assert_eq!(block.len(), 80);
        // Column-major: x scale first, y scale at column 1 row 1.
        assert_eq!(f32_at(&block, 0), 2.0);
        assert_eq!(f32_at(&block, 20), 3.0);
        assert_eq!(f32_at(&block, 60), 1.0);
        assert_eq!(f32_at(&block, 64), 0.25);
        assert_eq!(texture, Some(TextureHandle(7)));
    }

    #[test]
    fn unset_uniform_is_an_error() {
        let mut state = complete_state();
        state.set_uniform(UniformLocation(1), UniformValue::Float(1.0));
        let mut partial = RenderState::new();
        partial.set_uniform(UniformLocation(0), UniformValue::Mat4(Mat4::IDENTITY));

        assert!(pack_block(&slots(), 80, &state).is_ok());
        let err = pack_block(&slots(), 80, &partial).unwrap_err();
        assert!(err.to_string().contains("`alpha` was never set"));
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let mut state = complete_state();
        state.set_uniform(UniformLocation(1), UniformValue::Mat4(Mat4::IDENTITY));
        let err = pack_block(&slots(), 80, &state).unwrap_err();
        assert!(err.to_string().contains("`alpha` is Float"));
    }

    #[test]
    fn sampler_without_bound_texture_is_an_error() {
        let mut state = complete_state();
        state.set_uniform(UniformLocation(2), UniformValue::Sampler(3));
        let err = pack_block(&slots(), 80, &state).unwrap_err();
        assert!(err.to_string().contains("texture unit 3"));
    }
}
