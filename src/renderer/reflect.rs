//! WGSL reflection: finds entry points, vertex inputs, the uniform block and
//! the texture/sampler bindings of a vertex + fragment pair, and checks that
//! the two stages agree with each other.

use std::{collections::BTreeMap, fmt};

use naga::{
    AddressSpace, Binding, EntryPoint, Handle, ImageClass, ImageDimension, Module, Scalar,
    ScalarKind, Type, TypeInner,
    front::wgsl,
    valid::{Capabilities, ValidationFlags, Validator},
};

use crate::renderer::{ShaderError, ShaderStage, UniformBlock, UniformField, UniformType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    pub name: String,
    pub location: u32,
    pub components: u32,
}

#[derive(Debug, Clone)]
pub struct ShaderReflection {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub vertex_inputs: Vec<VertexInput>,
    pub uniforms: Option<UniformBlock>,
    pub texture: Option<u32>,
    pub sampler: Option<u32>,
}

#[derive(Debug, Clone)]
pub(in crate::renderer) struct StageInfo {
    stage: ShaderStage,
    entry: String,
    inputs: Vec<Varying>,
    outputs: Vec<Varying>,
    resources: Vec<Resource>,
}

#[derive(Debug, Clone)]
struct Varying {
    name: String,
    location: u32,
    /// `None` for anything that is not a scalar or vector.
    ty: Option<VaryingType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VaryingType {
    scalar: Scalar,
    components: u32,
}

impl VaryingType {
    fn of(inner: &TypeInner) -> Option<Self> {
        match *inner {
            TypeInner::Scalar(scalar) => Some(Self {
                scalar,
                components: 1,
            }),
            TypeInner::Vector { size, scalar } => Some(Self {
                scalar,
                components: size as u32,
            }),
            _ => None,
        }
    }

    /// Components of a 32-bit float value, the only kind a vertex buffer feeds.
    fn float_components(self) -> Option<u32> {
        (self.scalar == Scalar::F32).then_some(self.components)
    }
}

impl fmt::Display for VaryingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scalar = match (self.scalar.kind, self.scalar.width) {
            (ScalarKind::Float, 4) => "f32".to_owned(),
            (ScalarKind::Float, 2) => "f16".to_owned(),
            (ScalarKind::Sint, 4) => "i32".to_owned(),
            (ScalarKind::Uint, 4) => "u32".to_owned(),
            (kind, width) => format!("{kind:?}{}", u32::from(width) * 8).to_lowercase(),
        };

        match self.components {
            1 => f.write_str(&scalar),
            n => write!(f, "vec{n}<{scalar}>"),
        }
    }
}

fn describe(ty: Option<VaryingType>) -> String {
    ty.map_or_else(|| "an unsupported type".to_owned(), |ty| ty.to_string())
}

#[derive(Debug, Clone)]
enum Resource {
    Uniform(UniformBlock),
    Texture { name: String, binding: u32 },
    Sampler { name: String, binding: u32 },
}

impl Resource {
    fn binding(&self) -> u32 {
        match self {
            Self::Uniform(block) => block.binding(),
            Self::Texture { binding, .. } | Self::Sampler { binding, .. } => *binding,
        }
    }

    fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Uniform(a), Self::Uniform(b)) => a.is_compatible(b),
            (Self::Texture { binding: a, .. }, Self::Texture { binding: b, .. }) => a == b,
            (Self::Sampler { binding: a, .. }, Self::Sampler { binding: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// Parses and validates one stage, then extracts what linking needs.
pub(in crate::renderer) fn reflect_stage(
    stage: ShaderStage,
    source: &str,
) -> Result<StageInfo, ShaderError> {
    let module = wgsl::parse_str(source).map_err(|err| ShaderError::Compile {
        stage,
        message: err.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| ShaderError::Compile {
            stage,
            message: error_chain(&err),
        })?;

    let entry = entry_point(&module, stage)?;

    let inputs = entry
        .function
        .arguments
        .iter()
        .flat_map(|arg| varyings(&module, arg.name.as_deref(), arg.ty, arg.binding.as_ref()))
        .collect();

    let outputs = entry
        .function
        .result
        .as_ref()
        .map(|result| {
            varyings(&module, None, result.ty, result.binding.as_ref())
        })
        .unwrap_or_default();

    Ok(StageInfo {
        stage,
        entry: entry.name.clone(),
        inputs,
        outputs,
        resources: resources(&module)?,
    })
}

impl ShaderReflection {
    pub(in crate::renderer) fn link(
        vertex: StageInfo,
        fragment: StageInfo,
    ) -> Result<Self, ShaderError> {
        debug_assert_eq!(vertex.stage, ShaderStage::Vertex);
        debug_assert_eq!(fragment.stage, ShaderStage::Fragment);

        for input in &fragment.inputs {
            let Some(output) = vertex
                .outputs
                .iter()
                .find(|output| output.location == input.location)
            else {
                return Err(ShaderError::UnmatchedVarying {
                    name: input.name.clone(),
                    location: input.location,
                });
            };

            if input.ty.is_none() || output.ty != input.ty {
                return Err(ShaderError::VaryingMismatch {
                    name: input.name.clone(),
                    location: input.location,
                    vertex: describe(output.ty),
                    fragment: describe(input.ty),
                });
            }
        }

        let mut bindings = BTreeMap::<u32, Resource>::new();
        for resource in vertex.resources.into_iter().chain(fragment.resources) {
            match bindings.get(&resource.binding()) {
                Some(existing) if existing.same_as(&resource) => {}
                Some(_) => return Err(ShaderError::BindingConflict(resource.binding())),
                None => {
                    bindings.insert(resource.binding(), resource);
                }
            }
        }

        let mut uniforms = None;
        let mut texture = None;
        let mut sampler = None;
        for resource in bindings.into_values() {
            match resource {
                Resource::Uniform(block) => set_once(&mut uniforms, block, "uniform block")?,
                Resource::Texture { name, binding } => set_once(&mut texture, binding, &name)?,
                Resource::Sampler { name, binding } => set_once(&mut sampler, binding, &name)?,
            }
        }

        let vertex_inputs = vertex
            .inputs
            .into_iter()
            .map(|varying| match varying.ty.and_then(VaryingType::float_components) {
                Some(components) => Ok(VertexInput {
                    name: varying.name,
                    location: varying.location,
                    components,
                }),
                None => Err(ShaderError::UnsupportedAttribute(varying.name)),
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            vertex_entry: vertex.entry,
            fragment_entry: fragment.entry,
            vertex_inputs,
            uniforms,
            texture,
            sampler,
        })
    }

    pub fn vertex_input(&self, name: &str) -> Option<&VertexInput> {
        self.vertex_inputs.iter().find(|input| input.name == name)
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, name: &str) -> Result<(), ShaderError> {
    if slot.is_some() {
        return Err(ShaderError::UnsupportedResource {
            name: name.to_owned(),
            reason: "only one of each resource kind is supported",
        });
    }

    *slot = Some(value);
    Ok(())
}

fn entry_point(module: &Module, stage: ShaderStage) -> Result<&EntryPoint, ShaderError> {
    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };

    module
        .entry_points
        .iter()
        .find(|entry| entry.stage == wanted)
        .ok_or(ShaderError::MissingEntryPoint(stage))
}

/// Location-bound values of an argument or result, looking through structs.
fn varyings(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
) -> Vec<Varying> {
    match binding {
        Some(Binding::Location { location, .. }) => vec![Varying {
            name: name.unwrap_or_default().to_owned(),
            location: *location,
            ty: VaryingType::of(&module.types[ty].inner),
        }],
        Some(Binding::BuiltIn(_)) => Vec::new(),
        None => match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => members
                .iter()
                .flat_map(|member| {
                    varyings(module, member.name.as_deref(), member.ty, member.binding.as_ref())
                })
                .collect(),
            _ => Vec::new(),
        },
    }
}

fn resources(module: &Module) -> Result<Vec<Resource>, ShaderError> {
    let mut resources = Vec::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };

        let name = var.name.clone().unwrap_or_default();

        if binding.group != 0 {
            return Err(ShaderError::UnsupportedResource {
                name,
                reason: "resources must live in bind group 0",
            });
        }

        let resource = match (&var.space, &module.types[var.ty].inner) {
            (AddressSpace::Uniform, inner) => {
                Resource::Uniform(uniform_block(module, &name, binding.binding, inner)?)
            }
            (
                AddressSpace::Handle,
                TypeInner::Image {
                    dim: ImageDimension::D2,
                    arrayed: false,
                    class:
                        ImageClass::Sampled {
                            kind: ScalarKind::Float,
                            multi: false,
                        },
                },
            ) => Resource::Texture {
                name,
                binding: binding.binding,
            },
            (AddressSpace::Handle, TypeInner::Image { .. }) => {
                return Err(ShaderError::UnsupportedResource {
                    name,
                    reason: "textures must be single-sampled `texture_2d<f32>`",
                });
            }
            (AddressSpace::Handle, TypeInner::Sampler { comparison: false }) => {
                Resource::Sampler {
                    name,
                    binding: binding.binding,
                }
            }
            _ => {
                return Err(ShaderError::UnsupportedResource {
                    name,
                    reason: "only uniform buffers, textures and filtering samplers are supported",
                });
            }
        };

        resources.push(resource);
    }

    Ok(resources)
}

fn uniform_block(
    module: &Module,
    var_name: &str,
    binding: u32,
    inner: &TypeInner,
) -> Result<UniformBlock, ShaderError> {
    let TypeInner::Struct { members, span } = inner else {
        // A bare `var<uniform> x: T` behaves like a one-field struct.
        let ty = uniform_type(inner).ok_or_else(|| ShaderError::UnsupportedUniform {
            name: var_name.to_owned(),
        })?;

        let field = UniformField {
            name: var_name.to_owned(),
            offset: 0,
            ty,
        };

        return Ok(UniformBlock::new(binding, ty.size().next_multiple_of(16), vec![field]));
    };

    let fields = members
        .iter()
        .map(|member| {
            let name = member.name.clone().unwrap_or_default();

            match uniform_type(&module.types[member.ty].inner) {
                Some(ty) => Ok(UniformField {
                    name,
                    offset: member.offset,
                    ty,
                }),
                None => Err(ShaderError::UnsupportedUniform { name }),
            }
        })
        .collect::<Result<_, _>>()?;

    Ok(UniformBlock::new(binding, (*span).next_multiple_of(16), fields))
}

fn uniform_type(inner: &TypeInner) -> Option<UniformType> {
    use naga::VectorSize::{Bi, Quad, Tri};

    match inner {
        TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
            ScalarKind::Float => Some(UniformType::F32),
            ScalarKind::Sint => Some(UniformType::I32),
            ScalarKind::Uint => Some(UniformType::U32),
            _ => None,
        },
        TypeInner::Vector { size, scalar }
            if scalar.kind == ScalarKind::Float && scalar.width == 4 =>
        {
            Some(match size {
                Bi => UniformType::Vec2,
                Tri => UniformType::Vec3,
                Quad => UniformType::Vec4,
            })
        }
        TypeInner::Matrix {
            columns: Quad,
            rows: Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float && scalar.width == 4 => Some(UniformType::Mat4),
        _ => None,
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::shaders;

    fn link(vertex: &str, fragment: &str) -> Result<ShaderReflection, ShaderError> {
        ShaderReflection::link(
            reflect_stage(ShaderStage::Vertex, vertex)?,
            reflect_stage(ShaderStage::Fragment, fragment)?,
        )
    }

    #[test]
    fn builtin_base_shader() {
        let reflection = link(shaders::BASE_VERTEX, shaders::BASE_FRAGMENT).unwrap();

        assert_eq!(reflection.vertex_entry, "vs_main");
        assert_eq!(reflection.fragment_entry, "fs_main");
        assert_eq!(
            reflection.vertex_inputs,
            vec![
                VertexInput {
                    name: "a_position".into(),
                    location: 0,
                    components: 2
                },
                VertexInput {
                    name: "a_texcoord".into(),
                    location: 1,
                    components: 2
                },
                VertexInput {
                    name: "a_color".into(),
                    location: 2,
                    components: 4
                },
            ]
        );

        let uniforms = reflection.uniforms.unwrap();
        assert_eq!(uniforms.binding(), 0);
        assert_eq!(uniforms.size(), 32);
        assert_eq!(uniforms.field("u_camera").unwrap().offset, 0);
        assert_eq!(uniforms.field("u_zoom").unwrap().offset, 16);
        assert_eq!(uniforms.field("u_zoom").unwrap().ty, UniformType::F32);

        assert_eq!(reflection.texture, Some(1));
        assert_eq!(reflection.sampler, Some(2));
    }

    #[test]
    fn builtin_circle_shader() {
        let reflection = link(shaders::BASE_VERTEX, shaders::CIRCLE_FRAGMENT).unwrap();
        assert_eq!(reflection.texture, Some(1));
    }

    #[test]
    fn parse_error_names_the_stage() {
        let err = link(shaders::BASE_VERTEX, "@fragment fn fs_main( {").unwrap_err();

        match err {
            ShaderError::Compile { stage, message } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validation_error_is_reported() {
        let vertex = "
            @vertex
            fn vs_main(@location(0) a_position: vec2<f32>) -> @builtin(position) vec4<f32> {
                return a_position;
            }
        ";

        assert!(matches!(
            reflect_stage(ShaderStage::Vertex, vertex),
            Err(ShaderError::Compile {
                stage: ShaderStage::Vertex,
                ..
            })
        ));
    }

    #[test]
    fn missing_entry_point() {
        assert!(matches!(
            reflect_stage(ShaderStage::Vertex, shaders::BASE_FRAGMENT),
            Err(ShaderError::MissingEntryPoint(ShaderStage::Vertex))
        ));
    }

    #[test]
    fn fragment_input_without_vertex_output() {
        let fragment = "
            @fragment
            fn fs_main(@location(5) v_extra: vec4<f32>) -> @location(0) vec4<f32> {
                return v_extra;
            }
        ";

        assert!(matches!(
            link(shaders::BASE_VERTEX, fragment),
            Err(ShaderError::UnmatchedVarying { location: 5, .. })
        ));
    }

    #[test]
    fn varying_type_must_match_vertex_output() {
        let fragment = "
            @fragment
            fn fs_main(@location(0) v_texcoord: vec4<f32>) -> @location(0) vec4<f32> {
                return v_texcoord;
            }
        ";

        match link(shaders::BASE_VERTEX, fragment).unwrap_err() {
            ShaderError::VaryingMismatch {
                location,
                vertex,
                fragment,
                ..
            } => {
                assert_eq!(location, 0);
                assert_eq!(vertex, "vec2<f32>");
                assert_eq!(fragment, "vec4<f32>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn integer_texture_is_rejected() {
        let fragment = "
            @group(0) @binding(1) var u_tex: texture_2d<u32>;

            @fragment
            fn fs_main(@location(0) v_texcoord: vec2<f32>) -> @location(0) vec4<f32> {
                let texel = textureLoad(u_tex, vec2<i32>(v_texcoord), 0);
                return vec4<f32>(texel);
            }
        ";

        assert!(matches!(
            reflect_stage(ShaderStage::Fragment, fragment),
            Err(ShaderError::UnsupportedResource { name, .. }) if name == "u_tex"
        ));
    }

    #[test]
    fn multisampled_texture_is_rejected() {
        let fragment = "
            @group(0) @binding(1) var u_tex: texture_multisampled_2d<f32>;

            @fragment
            fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
                return textureLoad(u_tex, vec2<i32>(position.xy), 0);
            }
        ";

        assert!(matches!(
            reflect_stage(ShaderStage::Fragment, fragment),
            Err(ShaderError::UnsupportedResource { .. })
        ));
    }

    #[test]
    fn conflicting_binding() {
        let fragment = "
            @group(0) @binding(0) var u_tex: texture_2d<f32>;
            @group(0) @binding(2) var u_sampler: sampler;

            @fragment
            fn fs_main(@location(0) v_texcoord: vec2<f32>) -> @location(0) vec4<f32> {
                return textureSample(u_tex, u_sampler, v_texcoord);
            }
        ";

        assert!(matches!(
            link(shaders::BASE_VERTEX, fragment),
            Err(ShaderError::BindingConflict(0))
        ));
    }

    #[test]
    fn bare_uniform_variable() {
        let vertex = "
            @group(0) @binding(0) var<uniform> u_offset: vec2<f32>;

            @vertex
            fn vs_main(@location(0) a_position: vec2<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(a_position + u_offset, 0.0, 1.0);
            }
        ";
        let fragment = "
            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0);
            }
        ";

        let reflection = link(vertex, fragment).unwrap();
        let uniforms = reflection.uniforms.unwrap();

        assert_eq!(uniforms.size(), 16);
        assert_eq!(uniforms.field("u_offset").unwrap().ty, UniformType::Vec2);
        assert_eq!(reflection.texture, None);
    }

    #[test]
    fn non_zero_group_is_rejected() {
        let vertex = "
            @group(1) @binding(0) var<uniform> u_zoom: f32;

            @vertex
            fn vs_main(@location(0) a_position: vec2<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(a_position * u_zoom, 0.0, 1.0);
            }
        ";

        assert!(matches!(
            reflect_stage(ShaderStage::Vertex, vertex),
            Err(ShaderError::UnsupportedResource { .. })
        ));
    }
}
