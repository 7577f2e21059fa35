use std::{
    mem,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use glam::{Vec2, vec2};
use wgpu::{
    Device, DeviceDescriptor, Instance, PollType, PresentMode, Queue, RequestAdapterOptions,
    Surface, SurfaceConfiguration, TextureViewDescriptor,
};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{
    Error,
    app::{AppContext, AppError, AppEvent, AppFlow, AppHandler, FpsCounter, Time},
    config::AppConfig,
    renderer::{Frame, RenderContext},
};

static APP_INSTANTIATED: AtomicBool = AtomicBool::new(false);

/// Opens the window, builds the app with `init` once a device exists, and
/// drives it until it asks to exit. Only one app may ever run per process.
pub fn run<T, F>(config: AppConfig, init: F) -> Result<(), Error>
where
    T: AppHandler,
    F: FnOnce(AppContext<'_>) -> Result<T, Error>,
{
    claim(&APP_INSTANTIATED)?;
    config.validate()?;

    let event_loop = EventLoop::new().map_err(AppError::from)?;
    let mut runner = Runner::Uninit { config, init };

    event_loop.run_app(&mut runner).map_err(AppError::from)?;

    match runner {
        Runner::Failed(err) => Err(err),
        _ => {
            log::info!("app exited");
            Ok(())
        }
    }
}

/// Marks `flag` as taken; fails if something already took it.
fn claim(flag: &AtomicBool) -> Result<(), AppError> {
    if flag.swap(true, Ordering::SeqCst) {
        return Err(AppError::AlreadyRunning);
    }

    Ok(())
}

/// What the runner does with one window event.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Dispatch {
    Forward(AppEvent),
    Exit,
    Ignore,
}

fn resized_event(size: PhysicalSize<u32>) -> AppEvent {
    AppEvent::Resized {
        width: size.width,
        height: size.height,
    }
}

/// Escape closes the window (on press) and is swallowed when
/// `exit_on_escape` is set; every other key reaches the app.
fn key_dispatch(code: KeyCode, pressed: bool, repeat: bool, exit_on_escape: bool) -> Dispatch {
    if exit_on_escape && code == KeyCode::Escape {
        return if pressed {
            Dispatch::Exit
        } else {
            Dispatch::Ignore
        };
    }

    Dispatch::Forward(AppEvent::Key {
        code,
        is_held: pressed,
        repeat,
    })
}

/// Maps a window event to what the app sees. `cursor` tracks the last known
/// pointer position so button events can carry it.
fn dispatch(event: &WindowEvent, cursor: &mut Vec2, exit_on_escape: bool) -> Dispatch {
    match event {
        WindowEvent::CloseRequested => Dispatch::Forward(AppEvent::CloseRequested),

        WindowEvent::Resized(size) => Dispatch::Forward(resized_event(*size)),

        WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state,
                    repeat,
                    ..
                },
            ..
        } => key_dispatch(*code, state.is_pressed(), *repeat, exit_on_escape),

        WindowEvent::MouseInput { state, button, .. } => Dispatch::Forward(AppEvent::MouseButton {
            button: *button,
            is_held: state.is_pressed(),
            position: *cursor,
        }),

        WindowEvent::CursorMoved { position, .. } => {
            *cursor = vec2(position.x as f32, position.y as f32);
            Dispatch::Forward(AppEvent::CursorMoved { position: *cursor })
        }

        _ => Dispatch::Ignore,
    }
}

enum Runner<T, F> {
    Uninit { config: AppConfig, init: F },
    Init(InitRunner<T>),
    Failed(Error),
    Exited,
}

struct InitRunner<T> {
    window: Arc<Window>,
    device: Device,
    queue: Queue,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    config: AppConfig,
    time: Time,
    fps: FpsCounter,
    cursor: Vec2,
    app: T,
}

macro_rules! app_context {
    ($runner:expr) => {
        AppContext {
            window: &$runner.window,
            device: &$runner.device,
            queue: &$runner.queue,
            surface_format: $runner.surface_config.format,
        }
    };
}

macro_rules! handle_flow {
    ($event_loop:expr, $flow:expr) => {
        match $flow {
            AppFlow::Continue => {}
            AppFlow::Exit => {
                $event_loop.exit();
                return Ok(());
            }
        }
    };
}

impl<T, F> Runner<T, F> {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Error) {
        log::error!("{err}");
        *self = Runner::Failed(err);
        event_loop.exit();
    }
}

impl<T, F> ApplicationHandler for Runner<T, F>
where
    T: AppHandler,
    F: FnOnce(AppContext<'_>) -> Result<T, Error>,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Runner::Uninit { config, init } = mem::replace(self, Runner::Exited) else {
            return;
        };

        let result = InitRunner::new(event_loop, config, init).and_then(|mut runner| {
            runner.started(event_loop)?;
            Ok(runner)
        });

        match result {
            Ok(runner) => *self = Runner::Init(runner),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _: WindowId, event: WindowEvent) {
        let Runner::Init(runner) = self else {
            return;
        };

        if let Err(err) = runner.window_event(event_loop, event) {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Runner::Init(runner) = self {
            runner.about_to_wait(event_loop);
        }
    }
}

impl<T: AppHandler> InitRunner<T> {
    fn new<F>(event_loop: &ActiveEventLoop, config: AppConfig, init: F) -> Result<Self, Error>
    where
        F: FnOnce(AppContext<'_>) -> Result<T, Error>,
    {
        let fps_interval = config.fps_refresh_interval()?;

        let window = {
            let window = event_loop
                .create_window(config.window_attributes())
                .map_err(AppError::from)?;

            Arc::new(window)
        };

        let device;
        let queue;
        let surface;
        let surface_config;
        {
            let instance = Instance::default();

            surface = instance
                .create_surface(window.clone())
                .map_err(AppError::from)?;

            let adapter = instance.request_adapter(&RequestAdapterOptions {
                compatible_surface: Some(&surface),
                ..Default::default()
            });
            let adapter = pollster::block_on(adapter).map_err(AppError::from)?;

            log::info!("using adapter: {}", adapter.get_info().name);

            let device_queue = adapter.request_device(&DeviceDescriptor::default());
            let device_queue = pollster::block_on(device_queue).map_err(AppError::from)?;
            device = device_queue.0;
            queue = device_queue.1;

            let size = window.inner_size();
            let mut default_config = surface
                .get_default_config(&adapter, size.width.max(1), size.height.max(1))
                .ok_or(AppError::UnsupportedSurface)?;

            default_config.present_mode = if config.vsync {
                PresentMode::AutoVsync
            } else {
                PresentMode::AutoNoVsync
            };

            surface.configure(&device, &default_config);
            surface_config = default_config;
        };

        let app = init(AppContext {
            window: &window,
            device: &device,
            queue: &queue,
            surface_format: surface_config.format,
        })?;

        Ok(Self {
            window,
            device,
            queue,
            surface,
            surface_config,
            fps: FpsCounter::new(fps_interval),
            config,
            time: Time::new(),
            cursor: Vec2::ZERO,
            app,
        })
    }

    /// Lets the app size itself before the first frame.
    fn started(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Error> {
        let event = resized_event(PhysicalSize::new(
            self.surface_config.width,
            self.surface_config.height,
        ));

        handle_flow!(event_loop, self.app.event(&event, app_context!(self)));

        self.time = Time::new();
        self.window.request_redraw();

        Ok(())
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> Result<(), Error> {
        if let WindowEvent::Resized(size) = &event {
            if size.width > 0 && size.height > 0 {
                self.surface_config.width = size.width;
                self.surface_config.height = size.height;
                self.surface.configure(&self.device, &self.surface_config);
            }
        }

        match dispatch(&event, &mut self.cursor, self.config.exit_on_escape) {
            Dispatch::Forward(app_event) => {
                handle_flow!(event_loop, self.app.event(&app_event, app_context!(self)));
            }
            Dispatch::Exit => {
                log::debug!("escape pressed, exiting");
                event_loop.exit();
                return Ok(());
            }
            Dispatch::Ignore => {}
        }

        if let WindowEvent::RedrawRequested = event {
            self.redraw()?;
        }

        Ok(())
    }

    fn redraw(&mut self) -> Result<(), Error> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(surface_texture) => surface_texture,
            Err(err) => {
                log::warn!("skipping frame: {err}");
                self.surface.configure(&self.device, &self.surface_config);
                return Ok(());
            }
        };

        let view = surface_texture
            .texture
            .create_view(&TextureViewDescriptor::default());

        {
            let mut frame = Frame::new(
                &view,
                self.config.clear_color(),
                RenderContext {
                    device: &self.device,
                    queue: &self.queue,
                    surface_format: self.surface_config.format,
                },
            );

            self.app.draw(&mut frame)?;
        }

        self.window.pre_present_notify();
        surface_texture.present();

        if let Err(err) = self.device.poll(PollType::Poll) {
            log::warn!("failed to poll device: {err}");
        }

        Ok(())
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let dt = self.time.tick();

        if self.config.show_fps {
            if let Some(fps) = self.fps.tick(dt) {
                self.window
                    .set_title(&format!("{} - {} fps", self.config.title, fps as u32));
            }
        }

        if self.app.update(dt, app_context!(self)) == AppFlow::Exit {
            event_loop.exit();
            return;
        }

        self.window.request_redraw();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails() {
        let flag = AtomicBool::new(false);

        assert!(claim(&flag).is_ok());
        assert!(matches!(claim(&flag), Err(AppError::AlreadyRunning)));
        assert!(matches!(claim(&flag), Err(AppError::AlreadyRunning)));
    }

    #[test]
    fn escape_exits_without_reaching_the_app() {
        assert_eq!(key_dispatch(KeyCode::Escape, true, false, true), Dispatch::Exit);
        assert_eq!(key_dispatch(KeyCode::Escape, false, false, true), Dispatch::Ignore);
    }

    #[test]
    fn escape_is_forwarded_when_exit_is_disabled() {
        assert_eq!(
            key_dispatch(KeyCode::Escape, true, false, false),
            Dispatch::Forward(AppEvent::Key {
                code: KeyCode::Escape,
                is_held: true,
                repeat: false,
            })
        );
    }

    #[test]
    fn other_keys_are_forwarded() {
        assert_eq!(
            key_dispatch(KeyCode::KeyA, false, true, true),
            Dispatch::Forward(AppEvent::Key {
                code: KeyCode::KeyA,
                is_held: false,
                repeat: true,
            })
        );
    }

    #[test]
    fn startup_resize_matches_window_resize() {
        let size = PhysicalSize::new(512, 384);
        let mut cursor = Vec2::ZERO;

        assert_eq!(
            resized_event(size),
            AppEvent::Resized {
                width: 512,
                height: 384
            }
        );
        assert_eq!(
            dispatch(&WindowEvent::Resized(size), &mut cursor, true),
            Dispatch::Forward(resized_event(size))
        );
    }

    #[test]
    fn close_is_forwarded() {
        let mut cursor = Vec2::ZERO;

        assert_eq!(
            dispatch(&WindowEvent::CloseRequested, &mut cursor, true),
            Dispatch::Forward(AppEvent::CloseRequested)
        );
        assert_eq!(
            dispatch(&WindowEvent::Focused(true), &mut cursor, true),
            Dispatch::Ignore
        );
    }
}
