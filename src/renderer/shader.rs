use std::{borrow::Cow, fmt};

use wgpu::{ShaderModule, ShaderModuleDescriptor, ShaderSource};

use crate::renderer::{
    RenderContext, ShaderReflection, UniformBlock, UniformType, UniformValue,
    reflect::reflect_stage, shaders,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("{stage} shader compilation error: {message}")]
    Compile { stage: ShaderStage, message: String },

    #[error("no {0} entry point")]
    MissingEntryPoint(ShaderStage),

    #[error("linking error: fragment input `{name}` at location {location} is not written by the vertex stage")]
    UnmatchedVarying { name: String, location: u32 },

    #[error("linking error: fragment input `{name}` at location {location} is {fragment}, vertex stage writes {vertex}")]
    VaryingMismatch {
        name: String,
        location: u32,
        vertex: String,
        fragment: String,
    },

    #[error("linking error: stages disagree about binding {0}")]
    BindingConflict(u32),

    #[error("unsupported resource `{name}`: {reason}")]
    UnsupportedResource { name: String, reason: &'static str },

    #[error("vertex input `{0}` must be a 32-bit float scalar or vector")]
    UnsupportedAttribute(String),

    #[error("uniform `{name}` has an unsupported type")]
    UnsupportedUniform { name: String },

    #[error("shader has no uniform named `{0}`")]
    UnknownUniform(String),

    #[error("uniform `{name}` is {expected}, got {found}")]
    UniformTypeMismatch {
        name: String,
        expected: UniformType,
        found: UniformType,
    },

    #[error("shader has no vertex input named `{0}`")]
    MissingAttribute(String),

    #[error("vertex input `{0}` is not provided by the vertex layout")]
    UnboundAttribute(String),

    #[error("vertex input `{name}` has {expected} components, layout gives {found}")]
    AttributeMismatch {
        name: String,
        expected: u32,
        found: u32,
    },
}

/// Compiled, validated and linked WGSL, independent of any device.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    vertex_source: String,
    fragment_source: String,
    reflection: ShaderReflection,
}

/// A [`ShaderProgram`] turned into device shader modules, together with the
/// CPU copy of its uniforms.
#[derive(Debug)]
pub struct Shader {
    label: String,
    vertex: ShaderModule,
    fragment: ShaderModule,
    reflection: ShaderReflection,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

impl ShaderProgram {
    pub fn compile(
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
    ) -> Result<Self, ShaderError> {
        let vertex_source = vertex_source.into();
        let fragment_source = fragment_source.into();

        let vertex = reflect_stage(ShaderStage::Vertex, &vertex_source)?;
        let fragment = reflect_stage(ShaderStage::Fragment, &fragment_source)?;
        let reflection = ShaderReflection::link(vertex, fragment)?;

        Ok(Self {
            vertex_source,
            fragment_source,
            reflection,
        })
    }

    pub fn base() -> Result<Self, ShaderError> {
        Self::compile(shaders::BASE_VERTEX, shaders::BASE_FRAGMENT)
    }

    pub fn circle() -> Result<Self, ShaderError> {
        Self::compile(shaders::BASE_VERTEX, shaders::CIRCLE_FRAGMENT)
    }

    pub fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }
}

impl Shader {
    pub fn new(label: &str, program: ShaderProgram, ctx: RenderContext<'_>) -> Self {
        let vertex = ctx.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(format!("{label} vertex shader").as_str()),
            source: ShaderSource::Wgsl(Cow::Owned(program.vertex_source)),
        });

        let fragment = ctx.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(format!("{label} fragment shader").as_str()),
            source: ShaderSource::Wgsl(Cow::Owned(program.fragment_source)),
        });

        match &program.reflection.uniforms {
            Some(block) => {
                let names: Vec<&str> = block.fields().iter().map(|f| f.name.as_str()).collect();
                log::debug!("shader `{label}` uniforms: {}", names.join(", "));
            }
            None => log::debug!("shader `{label}` has no uniforms"),
        }

        Self {
            label: label.to_owned(),
            vertex,
            fragment,
            reflection: program.reflection,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    pub fn uniforms(&self) -> Option<&UniformBlock> {
        self.reflection.uniforms.as_ref()
    }

    pub fn uniforms_mut(&mut self) -> Option<&mut UniformBlock> {
        self.reflection.uniforms.as_mut()
    }

    pub fn set_uniform(
        &mut self,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<(), ShaderError> {
        match self.uniforms_mut() {
            Some(block) => block.set(name, value),
            None => Err(ShaderError::UnknownUniform(name.to_owned())),
        }
    }

    pub(in crate::renderer) fn vertex_module(&self) -> &ShaderModule {
        &self.vertex
    }

    pub(in crate::renderer) fn fragment_module(&self) -> &ShaderModule {
        &self.fragment
    }
}
