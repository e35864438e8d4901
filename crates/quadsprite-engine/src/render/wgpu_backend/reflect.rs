//! WGSL program reflection.
//!
//! Both stages are parsed and validated with naga, then walked to recover what a
//! GL-style program exposes: named vertex attributes with their locations, and
//! named uniforms (members of the uniform block plus texture globals). Resource
//! bindings must follow the sprite layout:
//!
//! - group 0, binding 0: the uniform block (one struct, shared by both stages)
//! - group 1, binding 0: the sampled 2D texture
//! - group 1, binding 1: its sampler

use anyhow::{Context, Result, anyhow, bail, ensure};
use wgpu::naga::{
    self, AddressSpace, Binding, Handle, Module, ResourceBinding, Scalar, ShaderStage, Type,
    TypeInner, VectorSize,
};

use crate::render::sprite::AttributeLocation;

pub(super) const UNIFORM_GROUP: u32 = 0;
pub(super) const UNIFORM_BINDING: u32 = 0;
pub(super) const TEXTURE_GROUP: u32 = 1;
pub(super) const TEXTURE_BINDING: u32 = 0;
pub(super) const SAMPLER_BINDING: u32 = 1;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum UniformKind {
    Float,
    Mat4,
}

impl UniformKind {
    pub(crate) fn size(self) -> u32 {
        match self {
            UniformKind::Float => 4,
            UniformKind::Mat4 => 64,
        }
    }
}

/// Where a named uniform lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum UniformSlot {
    /// Byte range inside the uniform block.
    Value { offset: u32, kind: UniformKind },
    /// The texture bound at group 1.
    Texture,
}

/// One `@location` input of the vertex entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VertexInput {
    pub name: String,
    pub location: AttributeLocation,
    pub format: wgpu::VertexFormat,
    /// Floats per vertex.
    pub components: u32,
}

/// Everything the backend needs from a linked pair of stages.
#[derive(Debug)]
pub(crate) struct ProgramLayout {
    pub vertex: Module,
    pub fragment: Module,
    pub vertex_entry: String,
    pub fragment_entry: String,
    /// Sorted by location; the index is the vertex buffer slot.
    pub inputs: Vec<VertexInput>,
    /// Declaration order; the index is the uniform location.
    pub uniforms: Vec<(String, UniformSlot)>,
    /// Size of the uniform block in bytes, 0 if there is none.
    pub block_size: u32,
    pub samples_texture: bool,
}

impl ProgramLayout {
    pub(crate) fn reflect(vertex_source: &str, fragment_source: &str) -> Result<Self> {
        let vertex = parse("vertex", vertex_source)?;
        let fragment = parse("fragment", fragment_source)?;

        let vs = entry_point(&vertex, ShaderStage::Vertex, "vertex")?;
        let fs = entry_point(&fragment, ShaderStage::Fragment, "fragment")?;

        // Vertex attributes.
        let mut raw = Vec::new();
        for arg in &vs.function.arguments {
            let name = arg.name.as_deref();
            collect_locations(&vertex, name, arg.ty, arg.binding.as_ref(), &mut raw);
        }
        let mut inputs = raw
            .into_iter()
            .map(|(name, location, ty)| {
                let (format, components) = vertex_format(&vertex.types[ty].inner)
                    .with_context(|| format!("vertex attribute `{name}` is not a float vector"))?;
                Ok(VertexInput {
                    name,
                    location: AttributeLocation(location),
                    format,
                    components,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        inputs.sort_by_key(|input| input.location);

        // Link: every fragment input must be written by the vertex stage.
        let mut outputs = Vec::new();
        if let Some(result) = &vs.function.result {
            collect_locations(&vertex, None, result.ty, result.binding.as_ref(), &mut outputs);
        }
        let mut varyings = Vec::new();
        for arg in &fs.function.arguments {
            let name = arg.name.as_deref();
            collect_locations(&fragment, name, arg.ty, arg.binding.as_ref(), &mut varyings);
        }
        for (name, location, ty) in &varyings {
            let written = outputs
                .iter()
                .find(|(_, out, _)| out == location)
                .ok_or_else(|| {
                    anyhow!(
                        "link failed: fragment input `{name}` (location {location}) \
                         is not written by the vertex stage"
                    )
                })?;
            ensure!(
                vertex.types[written.2].inner == fragment.types[*ty].inner,
                "link failed: fragment input `{name}` (location {location}) \
                 does not match the vertex output type"
            );
        }

        // Uniforms, in stage order.
        let mut reflected = Reflected::default();
        reflected.collect(&vertex, "vertex")?;
        reflected.collect(&fragment, "fragment")?;

        log::debug!(
            "reflected program: {} attributes, {} uniforms, {}-byte uniform block",
            inputs.len(),
            reflected.uniforms.len(),
            reflected.block_size
        );

        Ok(Self {
            vertex_entry: vs.name.clone(),
            fragment_entry: fs.name.clone(),
            vertex,
            fragment,
            inputs,
            uniforms: reflected.uniforms,
            block_size: reflected.block_size,
            samples_texture: reflected.samples_texture,
        })
    }
}

fn parse(stage: &str, source: &str) -> Result<Module> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|err| {
            anyhow!("{stage} shader failed to compile:\n{}", err.emit_to_string(source))
        })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|err| anyhow!("{stage} shader failed validation: {err}"))?;

    Ok(module)
}

fn entry_point<'m>(
    module: &'m Module,
    stage: ShaderStage,
    label: &str,
) -> Result<&'m naga::EntryPoint> {
    let mut found = module.entry_points.iter().filter(|ep| ep.stage == stage);
    let ep = found
        .next()
        .with_context(|| format!("{label} shader has no {stage:?} entry point"))?;
    ensure!(
        found.next().is_none(),
        "{label} shader has more than one {stage:?} entry point"
    );
    Ok(ep)
}

/// Flattens an argument or result into its `@location` bindings.
fn collect_locations(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<(String, u32, Handle<Type>)>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.push((name.unwrap_or_default().to_string(), *location, ty));
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    let name = member.name.as_deref();
                    collect_locations(module, name, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

fn vertex_format(inner: &TypeInner) -> Option<(wgpu::VertexFormat, u32)> {
    match *inner {
        TypeInner::Scalar(scalar) if scalar == Scalar::F32 => {
            Some((wgpu::VertexFormat::Float32, 1))
        }
        TypeInner::Vector { size, scalar } if scalar == Scalar::F32 => Some(match size {
            VectorSize::Bi => (wgpu::VertexFormat::Float32x2, 2),
            VectorSize::Tri => (wgpu::VertexFormat::Float32x3, 3),
            VectorSize::Quad => (wgpu::VertexFormat::Float32x4, 4),
        }),
        _ => None,
    }
}

fn uniform_kind(inner: &TypeInner) -> Option<UniformKind> {
    match *inner {
        TypeInner::Scalar(scalar) if scalar == Scalar::F32 => Some(UniformKind::Float),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar == Scalar::F32 => Some(UniformKind::Mat4),
        _ => None,
    }
}

fn expect_binding(
    binding: Option<&ResourceBinding>,
    group: u32,
    slot: u32,
    what: &str,
) -> Result<()> {
    match binding {
        Some(b) if b.group == group && b.binding == slot => Ok(()),
        Some(b) => bail!(
            "{what} must be bound at @group({group}) @binding({slot}), \
             found @group({}) @binding({})",
            b.group,
            b.binding
        ),
        None => bail!("{what} has no resource binding"),
    }
}

#[derive(Default)]
struct Reflected {
    uniforms: Vec<(String, UniformSlot)>,
    block_size: u32,
    samples_texture: bool,
}

impl Reflected {
    fn collect(&mut self, module: &Module, stage: &str) -> Result<()> {
        for (_, var) in module.global_variables.iter() {
            let var_name = var.name.as_deref().unwrap_or("<unnamed>");
            let inner = &module.types[var.ty].inner;

            match var.space {
                AddressSpace::Uniform => {
                    expect_binding(
                        var.binding.as_ref(),
                        UNIFORM_GROUP,
                        UNIFORM_BINDING,
                        &format!("{stage} uniform block `{var_name}`"),
                    )?;
                    self.collect_block(module, var_name, inner)
                        .with_context(|| format!("in {stage} uniform block `{var_name}`"))?;
                }
                AddressSpace::Handle => match inner {
                    TypeInner::Image { .. } => {
                        expect_binding(
                            var.binding.as_ref(),
                            TEXTURE_GROUP,
                            TEXTURE_BINDING,
                            &format!("{stage} texture `{var_name}`"),
                        )?;
                        self.insert(var_name, UniformSlot::Texture)?;
                        self.samples_texture = true;
                    }
                    TypeInner::Sampler { .. } => {
                        expect_binding(
                            var.binding.as_ref(),
                            TEXTURE_GROUP,
                            SAMPLER_BINDING,
                            &format!("{stage} sampler `{var_name}`"),
                        )?;
                    }
                    _ => bail!("{stage} shader resource `{var_name}` has an unsupported type"),
                },
                AddressSpace::Private | AddressSpace::WorkGroup | AddressSpace::Function => {}
                _ => bail!("{stage} shader resource `{var_name}` has an unsupported address space"),
            }
        }
        Ok(())
    }

    fn collect_block(&mut self, module: &Module, var_name: &str, inner: &TypeInner) -> Result<()> {
        match inner {
            TypeInner::Struct { members, span } => {
                for member in members {
                    let name = member.name.as_deref().unwrap_or_default();
                    let kind = uniform_kind(&module.types[member.ty].inner)
                        .with_context(|| format!("uniform `{name}` must be f32 or mat4x4<f32>"))?;
                    self.insert(
                        name,
                        UniformSlot::Value {
                            offset: member.offset,
                            kind,
                        },
                    )?;
                }
                self.block_size = self.block_size.max(*span);
            }
            other => {
                let kind = uniform_kind(other)
                    .with_context(|| format!("uniform `{var_name}` must be f32 or mat4x4<f32>"))?;
                self.insert(var_name, UniformSlot::Value { offset: 0, kind })?;
                self.block_size = self.block_size.max(kind.size());
            }
        }
        Ok(())
    }

    /// Stages may both declare a uniform; the declarations must agree.
    fn insert(&mut self, name: &str, slot: UniformSlot) -> Result<()> {
        match self.uniforms.iter().find(|(existing, _)| existing == name) {
            Some((_, existing)) if *existing == slot => Ok(()),
            Some((_, existing)) => bail!(
                "uniform `{name}` is declared differently across stages ({existing:?} vs {slot:?})"
            ),
            None => {
                self.uniforms.push((name.to_string(), slot));
                Ok(())
            }
        }
    }
}
