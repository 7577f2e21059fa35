use wgpu::{VertexAttribute, VertexFormat};

use crate::renderer::{BatchError, ShaderError, ShaderReflection, quad_batch::BASE_COMPONENTS};

pub const POSITION: &str = "a_position";
pub const TEXCOORD: &str = "a_texcoord";
pub const COLOR: &str = "a_color";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: String,
    pub components: u32,
}

/// Interleaved `f32` vertex layout. Position and texcoord always lead,
/// followed by the per-quad extras handed to `Batch::draw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: Vec<AttributeSpec>,
}

impl VertexLayout {
    pub fn new<I, S>(extras: I) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut attributes = vec![
            AttributeSpec {
                name: POSITION.to_owned(),
                components: 2,
            },
            AttributeSpec {
                name: TEXCOORD.to_owned(),
                components: 2,
            },
        ];

        for (name, components) in extras {
            let name = name.into();

            if !(1..=4).contains(&components) {
                return Err(BatchError::InvalidAttribute { name, components });
            }

            if attributes.iter().any(|attr| attr.name == name) {
                return Err(BatchError::DuplicateAttribute(name));
            }

            attributes.push(AttributeSpec { name, components });
        }

        Ok(Self { attributes })
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    /// Floats per vertex.
    pub fn stride(&self) -> usize {
        self.attributes
            .iter()
            .map(|attr| attr.components as usize)
            .sum()
    }

    /// Floats `Batch::draw` expects per quad.
    pub fn extra_components(&self) -> usize {
        self.stride() - BASE_COMPONENTS
    }

    /// Matches every attribute to the shader input of the same name.
    pub fn vertex_attributes(
        &self,
        reflection: &ShaderReflection,
    ) -> Result<Vec<VertexAttribute>, ShaderError> {
        if let Some(input) = reflection
            .vertex_inputs
            .iter()
            .find(|input| !self.attributes.iter().any(|attr| attr.name == input.name))
        {
            return Err(ShaderError::UnboundAttribute(input.name.clone()));
        }

        let mut offset = 0;
        let mut result = Vec::with_capacity(self.attributes.len());

        for attr in &self.attributes {
            let input = reflection
                .vertex_input(&attr.name)
                .ok_or_else(|| ShaderError::MissingAttribute(attr.name.clone()))?;

            if input.components != attr.components {
                return Err(ShaderError::AttributeMismatch {
                    name: attr.name.clone(),
                    expected: input.components,
                    found: attr.components,
                });
            }

            result.push(VertexAttribute {
                format: float_format(attr.components),
                offset,
                shader_location: input.location,
            });

            offset += u64::from(attr.components) * size_of::<f32>() as u64;
        }

        Ok(result)
    }
}

impl Default for VertexLayout {
    fn default() -> Self {
        Self {
            attributes: vec![
                AttributeSpec {
                    name: POSITION.to_owned(),
                    components: 2,
                },
                AttributeSpec {
                    name: TEXCOORD.to_owned(),
                    components: 2,
                },
                AttributeSpec {
                    name: COLOR.to_owned(),
                    components: 4,
                },
            ],
        }
    }
}

fn float_format(components: u32) -> VertexFormat {
    match components {
        1 => VertexFormat::Float32,
        2 => VertexFormat::Float32x2,
        3 => VertexFormat::Float32x3,
        _ => VertexFormat::Float32x4,
    }
}
