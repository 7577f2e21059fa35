mod batch;
mod camera;
mod frame;
mod quad_batch;
mod reflect;
mod shader;
pub mod shaders;
mod texture;
mod uniform;
mod vertex_layout;
pub use batch::*;
pub use camera::*;
pub use frame::*;
pub use quad_batch::*;
pub use reflect::{ShaderReflection, VertexInput};
pub use shader::*;
pub use texture::*;
pub use uniform::*;
pub use vertex_layout::*;

use wgpu::{Device, Queue, TextureFormat};

#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub surface_format: TextureFormat,
}
