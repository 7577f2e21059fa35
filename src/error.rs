use crate::{
    app::AppError,
    config::ConfigError,
    renderer::{BatchError, ShaderError, TextureError},
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}
