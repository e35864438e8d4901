use anyhow::{Result, anyhow};

/// Location of a vertex attribute in a compiled program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeLocation(pub u32);

/// Location of a uniform (value or texture sampler) in a compiled program.
///
/// Opaque: only meaningful to the program that issued it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

/// A compiled and linked shader program.
pub trait Program {
    fn attribute_location(&self, name: &str) -> Option<AttributeLocation>;
    fn uniform_location(&self, name: &str) -> Option<UniformLocation>;

    /// Like [`Program::attribute_location`], but a missing name is an error.
    ///
    /// A miss means the shader source and the binding code disagree.
    fn require_attribute(&self, name: &str) -> Result<AttributeLocation> {
        self.attribute_location(name)
            .ok_or_else(|| anyhow!("program has no vertex attribute named `{name}`"))
    }

    /// Like [`Program::uniform_location`], but a missing name is an error.
    fn require_uniform(&self, name: &str) -> Result<UniformLocation> {
        self.uniform_location(name)
            .ok_or_else(|| anyhow!("program has no uniform named `{name}`"))
    }
}

/// Compiles and links programs from shader source text.
pub trait ProgramFactory {
    type Program: Program;

    /// Fails on compile or link errors.
    fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self::Program>;
}
