//! wgpu implementation of the sprite backend contracts.
//!
//! Draws are recorded as they are issued and replayed in order by
//! [`WgpuBackend::encode`], one draw call per sprite. Each recorded draw owns a
//! snapshot of the uniform block at a dynamic offset into a shared arena, so
//! state changes between draws never leak backwards.

mod reflect;
mod texture;
mod uniforms;

use std::borrow::Cow;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::ops::Range;

use anyhow::{Context, Result, bail};
use wgpu::util::DeviceExt;

use crate::render::sprite::{
    AttributeLocation, BlendFactor, BlendFunc, BufferHandle, Image, Program, ProgramFactory,
    RenderBackend, RenderState, TextureFactory, TextureHandle, Topology, UniformLocation,
};
use crate::render::{RenderCtx, RenderTarget};

use reflect::{
    ProgramLayout, TEXTURE_GROUP, UNIFORM_BINDING, UNIFORM_GROUP, UniformSlot, VertexInput,
};
use texture::GpuTexture;

/// Sampling and labelling options for [`WgpuBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct WgpuBackendConfig {
    /// Magnification/minification filter. Nearest keeps pixel art crisp.
    pub filter: wgpu::FilterMode,
    pub address_mode: wgpu::AddressMode,
    /// Prefix for every GPU object label.
    pub label: String,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            filter: wgpu::FilterMode::Nearest,
            address_mode: wgpu::AddressMode::ClampToEdge,
            label: "quadsprite".to_string(),
        }
    }
}

/// A linked WGSL program with its reflected interface.
pub struct WgpuProgram {
    id: u32,
    inputs: Vec<VertexInput>,
    uniforms: Vec<(String, UniformSlot)>,
    block_size: u32,
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
    pipeline_layout: wgpu::PipelineLayout,
}

impl WgpuProgram {
    /// Vertex attributes in buffer slot order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.inputs.iter().map(|input| input.name.as_str())
    }

    /// Uniform names in location order.
    pub fn uniform_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.uniforms.iter().map(|(name, _)| name.as_str())
    }
}

impl Program for WgpuProgram {
    fn attribute_location(&self, name: &str) -> Option<AttributeLocation> {
        self.inputs
            .iter()
            .find(|input| input.name == name)
            .map(|input| input.location)
    }

    fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .position(|(n, _)| n == name)
            .map(|index| UniformLocation(index as u32))
    }
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    floats: u32,
}

struct RecordedDraw {
    pipeline: wgpu::RenderPipeline,
    vertex_buffers: Vec<wgpu::Buffer>,
    uniform_offset: u32,
    texture: Option<wgpu::BindGroup>,
    vertices: Range<u32>,
}

/// Sprite backend on a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    config: WgpuBackendConfig,

    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_alignment: u64,
    max_texture_dimension: u32,

    next_program: u32,
    pipelines: HashMap<(u32, Option<BlendFunc>), wgpu::RenderPipeline>,

    buffers: Vec<GpuBuffer>,
    textures: HashMap<u32, GpuTexture>,
    next_texture: u32,

    // Largest uniform block of any program; every binding of the arena uses it.
    max_block_size: u64,
    uniform_bytes: Vec<u8>,
    uniform_arena: Option<wgpu::Buffer>,
    uniform_bind_group: Option<wgpu::BindGroup>,
    draws: Vec<RecordedDraw>,
}

impl WgpuBackend {
    pub fn new(ctx: &RenderCtx<'_>, config: WgpuBackendConfig) -> Self {
        let device = ctx.device.clone();
        let limits = device.limits();

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{} uniform bgl", config.label)),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: UNIFORM_BINDING,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout =
            texture::texture_layout(&device, &format!("{} texture bgl", config.label));

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} sampler", config.label)),
            address_mode_u: config.address_mode,
            address_mode_v: config.address_mode,
            address_mode_w: config.address_mode,
            mag_filter: config.filter,
            min_filter: config.filter,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        log::info!(
            "wgpu sprite backend ready: format {:?}, filter {:?}",
            ctx.surface_format,
            config.filter
        );

        Self {
            queue: ctx.queue.clone(),
            surface_format: ctx.surface_format,
            uniform_layout,
            texture_layout,
            sampler,
            uniform_alignment: u64::from(limits.min_uniform_buffer_offset_alignment),
            max_texture_dimension: limits.max_texture_dimension_2d,
            next_program: 0,
            pipelines: HashMap::new(),
            buffers: Vec::new(),
            textures: HashMap::new(),
            next_texture: 0,
            max_block_size: 0,
            uniform_bytes: Vec::new(),
            uniform_arena: None,
            uniform_bind_group: None,
            draws: Vec::new(),
            device,
            config,
        }
    }

    /// Draws recorded since the last [`WgpuBackend::encode`].
    pub fn pending_draws(&self) -> usize {
        self.draws.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Replays recorded draws into one render pass on `target`, in call order.
    ///
    /// `clear` clears the target first; `None` draws over what is there. The
    /// recording is consumed. Returns the number of draws encoded.
    pub fn encode(&mut self, target: &mut RenderTarget<'_>, clear: Option<wgpu::Color>) -> usize {
        if self.draws.is_empty() && clear.is_none() {
            return 0;
        }

        self.upload_uniforms();

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("quadsprite sprite pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let draws = std::mem::take(&mut self.draws);
        for draw in &draws {
            rpass.set_pipeline(&draw.pipeline);
            if let Some(bind_group) = self.uniform_bind_group.as_ref() {
                rpass.set_bind_group(UNIFORM_GROUP, bind_group, &[draw.uniform_offset]);
            }
            if let Some(bind_group) = draw.texture.as_ref() {
                rpass.set_bind_group(TEXTURE_GROUP, bind_group, &[]);
            }
            for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            rpass.draw(draw.vertices.clone(), 0..1);
        }

        self.uniform_bytes.clear();
        log::trace!("encoded {} sprite draws", draws.len());
        draws.len()
    }

    /// Writes the frame's uniform snapshots, growing the arena when needed.
    fn upload_uniforms(&mut self) {
        if self.uniform_bytes.is_empty() {
            return;
        }

        // The last binding window must fit inside the buffer.
        let used = self.uniform_bytes.len() as u64;
        let needed = uniforms::align_to(used, self.uniform_alignment) + self.max_block_size;
        self.uniform_bytes.resize(needed as usize, 0);

        let capacity = self.uniform_arena.as_ref().map_or(0, |b| b.size());
        if capacity < needed {
            let size = needed.next_power_of_two().max(self.uniform_alignment * 4);
            log::debug!("growing sprite uniform arena to {size} bytes");

            let arena = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{} uniform arena", self.config.label)),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{} uniform bind group", self.config.label)),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: UNIFORM_BINDING,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &arena,
                        offset: 0,
                        size: NonZeroU64::new(self.max_block_size),
                    }),
                }],
            });
            self.uniform_bind_group = Some(bind_group);
            self.uniform_arena = Some(arena);
        }

        if let Some(arena) = self.uniform_arena.as_ref() {
            self.queue.write_buffer(arena, 0, &self.uniform_bytes);
        }
    }

    fn pipeline(
        &mut self,
        program: &WgpuProgram,
        blend: Option<BlendFunc>,
    ) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.pipelines.get(&(program.id, blend)) {
            return pipeline.clone();
        }
        let pipeline = self.build_pipeline(program, blend);
        self.pipelines.insert((program.id, blend), pipeline.clone());
        pipeline
    }

    fn build_pipeline(
        &self,
        program: &WgpuProgram,
        blend: Option<BlendFunc>,
    ) -> wgpu::RenderPipeline {
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = program
            .inputs
            .iter()
            .map(|input| {
                [wgpu::VertexAttribute {
                    format: input.format,
                    offset: 0,
                    shader_location: input.location.0,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = program
            .inputs
            .iter()
            .zip(&attributes)
            .map(|(input, attrs)| wgpu::VertexBufferLayout {
                array_stride: u64::from(input.components) * 4,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attrs,
            })
            .collect();

        let label = match blend {
            None => format!("{} program {} opaque pipeline", self.config.label, program.id),
            Some(func) => format!("{} program {} {func:?} pipeline", self.config.label, program.id),
        };

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(&program.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.vertex_module,
                entry_point: Some(&program.vertex_entry),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.fragment_module,
                entry_point: Some(&program.fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_format,
                    blend: blend.map(blend_state),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Flipped sprites wind the other way.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

fn blend_state(func: BlendFunc) -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: blend_factor(func.src),
        dst_factor: blend_factor(func.dst),
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

impl ProgramFactory for WgpuBackend {
    type Program = WgpuProgram;

    fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<WgpuProgram> {
        let layout = ProgramLayout::reflect(vertex_source, fragment_source)?;
        let id = self.next_program;
        self.next_program += 1;

        let vertex_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} program {id} vertex", self.config.label)),
            source: wgpu::ShaderSource::Naga(Cow::Owned(layout.vertex)),
        });
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} program {id} fragment", self.config.label)),
            source: wgpu::ShaderSource::Naga(Cow::Owned(layout.fragment)),
        });

        let mut groups = vec![&self.uniform_layout];
        if layout.samples_texture {
            groups.push(&self.texture_layout);
        }
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{} program {id} layout", self.config.label)),
            bind_group_layouts: &groups,
            immediate_size: 0,
        });

        self.max_block_size = self.max_block_size.max(u64::from(layout.block_size));
        // A grown block invalidates the arena binding size.
        self.uniform_arena = None;
        self.uniform_bind_group = None;

        let program = WgpuProgram {
            id,
            inputs: layout.inputs,
            uniforms: layout.uniforms,
            block_size: layout.block_size,
            vertex_module,
            fragment_module,
            vertex_entry: layout.vertex_entry,
            fragment_entry: layout.fragment_entry,
            pipeline_layout,
        };

        self.pipeline(&program, None);
        self.pipeline(&program, Some(BlendFunc::ALPHA));

        log::debug!(
            "created program {id}: attributes [{}], uniforms [{}]",
            program.attribute_names().collect::<Vec<_>>().join(", "),
            program.uniform_names().collect::<Vec<_>>().join(", ")
        );
        Ok(program)
    }
}

impl TextureFactory for WgpuBackend {
    fn create_texture(&mut self, image: &Image) -> Result<TextureHandle> {
        texture::check_upload(image, self.max_texture_dimension)?;

        let id = self.next_texture;
        self.next_texture += 1;

        let label = format!("{} texture {}", self.config.label, image.key());
        let gpu = texture::upload(
            &self.device,
            &self.queue,
            &self.texture_layout,
            &self.sampler,
            image,
            &label,
        );
        self.textures.insert(id, gpu);

        log::debug!(
            "uploaded {} ({}x{}) as texture {id}",
            image.key(),
            image.natural_width(),
            image.natural_height()
        );
        Ok(TextureHandle(id))
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        // Recorded draws keep their own bind group reference.
        if self.textures.remove(&handle.id()).is_none() {
            log::warn!("release of unknown texture {}", handle.id());
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn create_vertex_buffer(&mut self, label: &str, data: &[f32]) -> Result<BufferHandle> {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.buffers.push(GpuBuffer {
            buffer,
            floats: data.len() as u32,
        });
        Ok(BufferHandle(self.buffers.len() as u32 - 1))
    }

    fn draw_arrays(
        &mut self,
        program: &WgpuProgram,
        state: &RenderState,
        topology: Topology,
        vertices: Range<u32>,
    ) -> Result<()> {
        if topology != Topology::TriangleStrip {
            bail!("wgpu sprite pipelines only draw triangle strips, got {topology:?}");
        }

        let mut vertex_buffers = Vec::with_capacity(program.inputs.len());
        for input in &program.inputs {
            let binding = state
                .attribute(input.location)
                .with_context(|| format!("attribute `{}` has no bound buffer", input.name))?;
            let buffer = self.buffers.get(binding.buffer.0 as usize).with_context(|| {
                format!("attribute `{}` is bound to an unknown buffer", input.name)
            })?;
            if binding.components != input.components {
                bail!(
                    "attribute `{}` expects {} components per vertex, bound with {}",
                    input.name,
                    input.components,
                    binding.components
                );
            }
            if vertices.end * binding.components > buffer.floats {
                bail!("draw of {vertices:?} overruns the buffer bound to `{}`", input.name);
            }
            vertex_buffers.push(buffer.buffer.clone());
        }

        let (block, texture) = uniforms::pack_block(&program.uniforms, program.block_size, state)?;
        let texture = match texture {
            Some(handle) => Some(
                self.textures
                    .get(&handle.id())
                    .with_context(|| format!("texture {} was released", handle.id()))?
                    .bind_group
                    .clone(),
            ),
            None => None,
        };

        let uniform_offset =
            uniforms::align_to(self.uniform_bytes.len() as u64, self.uniform_alignment);
        self.uniform_bytes.resize(uniform_offset as usize, 0);
        self.uniform_bytes.extend_from_slice(&block);

        let pipeline = self.pipeline(program, state.blend());
        self.draws.push(RecordedDraw {
            pipeline,
            vertex_buffers,
            uniform_offset: uniform_offset as u32,
            texture,
            vertices,
        });
        Ok(())
    }
}
