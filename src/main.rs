use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, ValueEnum};
use glam::{Vec2, vec2};
use quadbatch::{
    Error,
    app::{self, AppContext, AppEvent, AppFlow, AppHandler},
    config::AppConfig,
    renderer::{
        Batch, Camera, Frame, Shader, ShaderProgram, Texture, TextureOptions, VertexLayout,
    },
};

#[derive(Parser, Debug)]
#[command(name = "quadbatch-demo", version)]
struct Args {
    /// TOML window configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fragment shader to draw with.
    #[arg(long, value_enum, default_value_t = ShaderChoice::Circle)]
    shader: ShaderChoice,

    /// Image to texture the quads with (defaults to plain white).
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Quads per batch before an automatic flush.
    #[arg(long, default_value_t = 1000)]
    capacity: usize,

    #[arg(long, default_value_t = 1.0)]
    zoom: f32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ShaderChoice {
    Base,
    Circle,
}

#[derive(Debug)]
struct Demo {
    batch: Batch,
    camera: Camera,
    viewport: Vec2,
}

impl Demo {
    fn new(ctx: AppContext<'_>, args: &Args) -> Result<Self, Error> {
        let (label, program) = match args.shader {
            ShaderChoice::Base => ("base", ShaderProgram::base()?),
            ShaderChoice::Circle => ("circle", ShaderProgram::circle()?),
        };

        let shader = Shader::new(label, program, ctx.into());

        let texture = match &args.texture {
            Some(path) => Texture::from_file(path, TextureOptions::default(), ctx.into())?,
            None => Texture::white(ctx.into()),
        };

        let batch = Batch::new(
            args.capacity,
            shader,
            VertexLayout::default(),
            &texture,
            ctx.into(),
        )?;

        Ok(Self {
            batch,
            camera: Camera::new(vec2(100.0, 100.0), args.zoom),
            viewport: ctx.size().as_vec2(),
        })
    }
}

impl AppHandler for Demo {
    fn event(&mut self, event: &AppEvent, _ctx: AppContext<'_>) -> AppFlow {
        match *event {
            AppEvent::CloseRequested => return AppFlow::Exit,

            AppEvent::Resized { width, height } => {
                self.viewport = vec2(width as f32, height as f32);

                if let Some(block) = self.batch.shader_mut().uniforms_mut() {
                    if let Err(err) = self.camera.apply(self.viewport, block) {
                        log::warn!("failed to update camera: {err}");
                    }
                }
            }

            AppEvent::MouseButton {
                button,
                is_held: true,
                position,
            } => {
                let world = self.camera.screen_to_world(position, self.viewport);
                log::info!("{button:?} click at ({:.1}, {:.1})", world.x, world.y);
            }

            AppEvent::CursorMoved { position } => {
                let world = self.camera.screen_to_world(position, self.viewport);
                log::trace!("cursor at ({:.1}, {:.1})", world.x, world.y);
            }

            _ => {}
        }

        AppFlow::Continue
    }

    fn draw(&mut self, frame: &mut Frame<'_>) -> Result<(), Error> {
        let mut batch = self.batch.begin(frame);

        for i in 0..50 {
            let offset = i as f32 * 100.0;
            batch.draw(vec2(offset, offset), Vec2::splat(100.0), &[1.0, 0.0, 1.0, 1.0])?;
        }

        Ok(())
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run_demo(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run_demo(args: &Args) -> Result<(), Error> {
    let config = match &args.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::default().with_title("Hello"),
    };

    app::run(config, |ctx| Demo::new(ctx, args))
}
