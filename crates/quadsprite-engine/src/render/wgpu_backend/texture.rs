use anyhow::{Result, ensure};

use crate::render::sprite::Image;

use super::reflect::{SAMPLER_BINDING, TEXTURE_BINDING};

pub(super) const SPRITE_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// An uploaded image and the group-1 bind group that samples it.
pub(super) struct GpuTexture {
    // Held so the texture outlives its view.
    _texture: wgpu::Texture,
    pub bind_group: wgpu::BindGroup,
}

/// Checks an image against what a single 2D texture upload accepts.
pub(super) fn check_upload(image: &Image, max_dimension: u32) -> Result<()> {
    let (w, h) = (image.natural_width(), image.natural_height());
    ensure!(w > 0 && h > 0, "image {} has zero size ({w}x{h})", image.key());
    ensure!(
        w <= max_dimension && h <= max_dimension,
        "image {} ({w}x{h}) exceeds the device texture limit of {max_dimension}",
        image.key()
    );
    let expected = w as usize * h as usize * 4;
    ensure!(
        image.rgba().len() == expected,
        "image {} has {} bytes of pixel data, expected {expected}",
        image.key(),
        image.rgba().len()
    );
    Ok(())
}

pub(super) fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    image: &Image,
    label: &str,
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: image.natural_width(),
        height: image.natural_height(),
        depth_or_array_layers: 1,
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SPRITE_TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.rgba(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.width),
            rows_per_image: Some(size.height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: TEXTURE_BINDING,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    GpuTexture {
        _texture: texture,
        bind_group,
    }
}

pub(super) fn texture_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: TEXTURE_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: SAMPLER_BINDING,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::sprite::testing::image;

    #[test]
    fn accepts_well_formed_images() {
        assert!(check_upload(&image("a.png", 16, 8), 2048).is_ok());
    }

    #[test]
    fn rejects_zero_size() {
        let err = check_upload(&image("empty.png", 0, 8), 2048).unwrap_err();
        assert!(err.to_string().contains("empty.png has zero size"));
    }

    #[test]
    fn rejects_oversized_images() {
        let err = check_upload(&image("huge.png", 4096, 1), 2048).unwrap_err();
        assert!(err.to_string().contains("exceeds the device texture limit"));
    }
}
