//! Quad batch rendering on top of `wgpu` and `winit`.
//!
//! [`renderer::Batch`] packs axis-aligned quads into one vertex buffer and
//! draws them with a single indexed call. [`app::run`] owns the window, the
//! device and the loop, and forwards input to an [`app::AppHandler`].

pub mod app;
pub mod config;
mod error;
pub mod renderer;

pub use error::Error;
