//! In-memory backend for exercising the sprite pipeline without a GPU.

use std::collections::HashMap;
use std::ops::Range;

use anyhow::{Result, bail};

use super::{
    AttributeLocation, BufferHandle, Image, Program, ProgramFactory, RenderBackend, RenderState,
    TextureFactory, TextureHandle, Topology, UniformLocation,
};

pub fn image(key: &str, width: u32, height: u32) -> Image {
    Image::from_rgba(key, image::RgbaImage::new(width, height))
}

/// Program whose locations are assigned in declaration order.
#[derive(Debug, Clone)]
pub struct FakeProgram {
    attributes: HashMap<String, AttributeLocation>,
    uniforms: HashMap<String, UniformLocation>,
}

impl FakeProgram {
    pub fn new(attributes: &[&str], uniforms: &[&str]) -> Self {
        Self {
            attributes: attributes
                .iter()
                .enumerate()
                .map(|(i, n)| (n.to_string(), AttributeLocation(i as u32)))
                .collect(),
            uniforms: uniforms
                .iter()
                .enumerate()
                .map(|(i, n)| (n.to_string(), UniformLocation(i as u32)))
                .collect(),
        }
    }
}

impl Program for FakeProgram {
    fn attribute_location(&self, name: &str) -> Option<AttributeLocation> {
        self.attributes.get(name).copied()
    }

    fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }
}

#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub state: RenderState,
    pub topology: Topology,
    pub vertices: Range<u32>,
}

/// Records every call; programs come from a preset name table.
#[derive(Debug)]
pub struct RecordingBackend {
    program: FakeProgram,
    programs_created: usize,
    buffers: Vec<(String, Vec<f32>)>,
    uploads: Vec<String>,
    released: Vec<TextureHandle>,
    next_texture: u32,
    fail_uploads: bool,
    draws: Vec<RecordedDraw>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::with_program(FakeProgram::new(
            &["position", "textureCoords"],
            &["projectionMatrix", "modelMatrix", "textureMatrix", "alpha", "texImage"],
        ))
    }
}

impl RecordingBackend {
    pub fn with_program(program: FakeProgram) -> Self {
        Self {
            program,
            programs_created: 0,
            buffers: Vec::new(),
            uploads: Vec::new(),
            released: Vec::new(),
            next_texture: 0,
            fail_uploads: false,
            draws: Vec::new(),
        }
    }

    pub fn fail_uploads(&mut self, fail: bool) {
        self.fail_uploads = fail;
    }

    pub fn programs_created(&self) -> usize {
        self.programs_created
    }

    pub fn buffer(&self, handle: BufferHandle) -> &[f32] {
        &self.buffers[handle.0 as usize].1
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Keys uploaded, in order.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.clone()
    }

    pub fn released(&self) -> Vec<TextureHandle> {
        self.released.clone()
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    pub fn last_draw(&self) -> &RecordedDraw {
        self.draws.last().expect("no draw recorded")
    }
}

impl ProgramFactory for RecordingBackend {
    type Program = FakeProgram;

    fn create_program(&mut self, vertex_source: &str, fragment_source: &str) -> Result<FakeProgram> {
        if vertex_source.trim().is_empty() || fragment_source.trim().is_empty() {
            bail!("empty shader source");
        }
        self.programs_created += 1;
        Ok(self.program.clone())
    }
}

impl TextureFactory for RecordingBackend {
    fn create_texture(&mut self, image: &Image) -> Result<TextureHandle> {
        if self.fail_uploads {
            bail!("image {} is not decoded", image.key());
        }
        self.uploads.push(image.key().to_string());
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        Ok(handle)
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        self.released.push(handle);
    }
}

impl RenderBackend for RecordingBackend {
    fn create_vertex_buffer(&mut self, label: &str, data: &[f32]) -> Result<BufferHandle> {
        self.buffers.push((label.to_string(), data.to_vec()));
        Ok(BufferHandle(self.buffers.len() as u32 - 1))
    }

    fn draw_arrays(
        &mut self,
        _program: &FakeProgram,
        state: &RenderState,
        topology: Topology,
        vertices: Range<u32>,
    ) -> Result<()> {
        self.draws.push(RecordedDraw {
            state: state.clone(),
            topology,
            vertices,
        });
        Ok(())
    }
}
