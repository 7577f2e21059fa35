use std::fmt;

use bytemuck::bytes_of;
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::renderer::ShaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    F32,
    I32,
    U32,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    F32(f32),
    I32(i32),
    U32(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub offset: u32,
    pub ty: UniformType,
}

/// CPU copy of a shader's uniform struct, laid out exactly as the GPU
/// expects it so it can be uploaded in one write.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformBlock {
    binding: u32,
    fields: Vec<UniformField>,
    data: Vec<u8>,
}

impl UniformType {
    pub fn size(self) -> u32 {
        match self {
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat4 => 64,
        }
    }
}

impl fmt::Display for UniformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::F32 => "f32",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::Vec2 => "vec2<f32>",
            Self::Vec3 => "vec3<f32>",
            Self::Vec4 => "vec4<f32>",
            Self::Mat4 => "mat4x4<f32>",
        };

        f.write_str(name)
    }
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            Self::F32(_) => UniformType::F32,
            Self::I32(_) => UniformType::I32,
            Self::U32(_) => UniformType::U32,
            Self::Vec2(_) => UniformType::Vec2,
            Self::Vec3(_) => UniformType::Vec3,
            Self::Vec4(_) => UniformType::Vec4,
            Self::Mat4(_) => UniformType::Mat4,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Self::F32(value) => bytes_of(value),
            Self::I32(value) => bytes_of(value),
            Self::U32(value) => bytes_of(value),
            Self::Vec2(value) => bytes_of(value),
            Self::Vec3(value) => bytes_of(value),
            Self::Vec4(value) => bytes_of(value),
            Self::Mat4(value) => bytes_of(value),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for UniformValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_value! {
    f32 => F32,
    i32 => I32,
    u32 => U32,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Mat4 => Mat4,
}

impl UniformBlock {
    /// `size` is the struct's full span including trailing padding.
    pub fn new(binding: u32, size: u32, fields: Vec<UniformField>) -> Self {
        Self {
            binding,
            fields,
            data: vec![0; size as usize],
        }
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<(), ShaderError> {
        let value = value.into();

        let field = self
            .field(name)
            .ok_or_else(|| ShaderError::UnknownUniform(name.to_owned()))?;

        if field.ty != value.ty() {
            return Err(ShaderError::UniformTypeMismatch {
                name: name.to_owned(),
                expected: field.ty,
                found: value.ty(),
            });
        }

        let start = field.offset as usize;
        let bytes = value.bytes();
        self.data[start..start + bytes.len()].copy_from_slice(bytes);

        Ok(())
    }

    /// Same struct layout at the same binding.
    pub(in crate::renderer) fn is_compatible(&self, other: &Self) -> bool {
        self.binding == other.binding
            && self.fields == other.fields
            && self.data.len() == other.data.len()
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::pod_read_unaligned;
    use glam::{vec2, vec4};

    use super::*;

    fn camera_block() -> UniformBlock {
        UniformBlock::new(
            0,
            32,
            vec![
                UniformField {
                    name: "u_camera".into(),
                    offset: 0,
                    ty: UniformType::Vec4,
                },
                UniformField {
                    name: "u_zoom".into(),
                    offset: 16,
                    ty: UniformType::F32,
                },
            ],
        )
    }

    #[test]
    fn writes_at_field_offsets() {
        let mut block = camera_block();
        block.set("u_zoom", 2.5_f32).unwrap();
        block
            .set("u_camera", vec4(512.0, 256.0, 100.0, 100.0))
            .unwrap();

        let bytes = block.as_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(pod_read_unaligned::<f32>(&bytes[16..20]), 2.5);
        assert_eq!(
            pod_read_unaligned::<[f32; 4]>(&bytes[0..16]),
            [512.0, 256.0, 100.0, 100.0]
        );
        assert!(bytes[20..].iter().all(|b| *b == 0));
    }

    #[test]
    fn unknown_name() {
        let mut block = camera_block();
        let err = block.set("u_missing", 1.0_f32).unwrap_err();
        assert!(matches!(err, ShaderError::UnknownUniform(name) if name == "u_missing"));
    }

    #[test]
    fn type_mismatch_leaves_data_untouched() {
        let mut block = camera_block();
        let err = block.set("u_zoom", vec2(1.0, 2.0)).unwrap_err();

        assert!(matches!(
            err,
            ShaderError::UniformTypeMismatch {
                expected: UniformType::F32,
                found: UniformType::Vec2,
                ..
            }
        ));
        assert!(block.as_bytes().iter().all(|b| *b == 0));
    }
}
