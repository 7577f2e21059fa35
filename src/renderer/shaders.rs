//! Built-in WGSL sources.
//!
//! Every vertex source reads `a_position`, `a_texcoord` and `a_color` and
//! exposes the `u_camera` / `u_zoom` uniforms at binding 0. Fragment sources
//! sample `u_tex` (binding 1) through `u_sampler` (binding 2).

pub const BASE_VERTEX: &str = include_str!("shaders/base_vertex.wgsl");

/// Vertex color times the texture sample.
pub const BASE_FRAGMENT: &str = include_str!("shaders/base_fragment.wgsl");

/// Like [`BASE_FRAGMENT`], but drops fragments outside the inscribed circle.
pub const CIRCLE_FRAGMENT: &str = include_str!("shaders/circle_fragment.wgsl");
