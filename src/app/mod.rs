use std::time::Duration;

use glam::{UVec2, Vec2, uvec2};
use wgpu::{Device, Queue, TextureFormat};
use winit::{event::MouseButton, keyboard::KeyCode, window::Window};

use crate::{
    Error,
    renderer::{Frame, RenderContext},
};

mod runner;
mod time;
pub use runner::run;
pub use time::*;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("only one app can be instantiated per process")]
    AlreadyRunning,

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to get adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to get device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface is not supported by the adapter")]
    UnsupportedSurface,
}

/// Callbacks driven by [`run`]. Every method has a default so apps only
/// implement what they use.
pub trait AppHandler {
    fn update(&mut self, _delta_time: Duration, _ctx: AppContext<'_>) -> AppFlow {
        AppFlow::Continue
    }

    fn event(&mut self, event: &AppEvent, _ctx: AppContext<'_>) -> AppFlow {
        match event {
            AppEvent::CloseRequested => AppFlow::Exit,
            _ => AppFlow::Continue,
        }
    }

    /// A frame nothing draws into is still cleared.
    fn draw(&mut self, _frame: &mut Frame<'_>) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AppContext<'a> {
    pub window: &'a Window,
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub surface_format: TextureFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppFlow {
    Continue,
    Exit,
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    CloseRequested,
    /// Also sent once right after startup.
    Resized { width: u32, height: u32 },
    Key {
        code: KeyCode,
        is_held: bool,
        repeat: bool,
    },
    MouseButton {
        button: MouseButton,
        is_held: bool,
        /// Cursor position in physical pixels, origin top-left.
        position: Vec2,
    },
    CursorMoved { position: Vec2 },
}

impl<'a> AppContext<'a> {
    pub fn size(&self) -> UVec2 {
        let size = self.window.inner_size();
        uvec2(size.width, size.height)
    }
}

impl<'a> From<AppContext<'a>> for RenderContext<'a> {
    fn from(value: AppContext<'a>) -> Self {
        Self {
            device: value.device,
            queue: value.queue,
            surface_format: value.surface_format,
        }
    }
}
