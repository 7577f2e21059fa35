//! Application configuration, loaded from TOML.

use std::{path::Path, time::Duration};

use glam::Vec4;
use serde::{Deserialize, Serialize};
use winit::{dpi::LogicalSize, window::WindowAttributes};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Window and loop settings. Keys missing from the file keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// RGBA, each channel in `0.0..=1.0`.
    pub clear_color: [f32; 4],
    pub vsync: bool,
    /// Append the measured frame rate to the window title.
    pub show_fps: bool,
    /// Seconds between frame rate title refreshes.
    pub fps_interval: f32,
    /// Escape closes the window instead of reaching the app.
    pub exit_on_escape: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Untitled App".to_owned(),
            width: 512,
            height: 512,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync: true,
            show_fps: true,
            fps_interval: 0.5,
            exit_on_escape: true,
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        ensure_toml(path)?;

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;

        log::info!("loaded configuration from {}", path.display());

        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        ensure_toml(path)?;

        std::fs::write(path, toml::to_string_pretty(self)?)?;

        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid {
                field: if self.width == 0 { "width" } else { "height" },
                reason: "window dimensions must be non-zero".to_owned(),
            });
        }

        if let Some(channel) = self
            .clear_color
            .iter()
            .find(|c| !(0.0..=1.0).contains(*c))
        {
            return Err(ConfigError::Invalid {
                field: "clear_color",
                reason: format!("channel {channel} is outside 0..=1"),
            });
        }

        self.fps_refresh_interval()?;

        Ok(())
    }

    /// `fps_interval` as a [`Duration`]; fails for values a `Duration` cannot hold.
    pub fn fps_refresh_interval(&self) -> Result<Duration, ConfigError> {
        match Duration::try_from_secs_f32(self.fps_interval) {
            Ok(interval) if !interval.is_zero() => Ok(interval),
            _ => Err(ConfigError::Invalid {
                field: "fps_interval",
                reason: format!("{} is not a positive number of seconds", self.fps_interval),
            }),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn clear_color(&self) -> Vec4 {
        Vec4::from_array(self.clear_color)
    }

    pub fn window_attributes(&self) -> WindowAttributes {
        WindowAttributes::default()
            .with_title(self.title.clone())
            .with_inner_size(LogicalSize::new(self.width, self.height))
    }
}

fn ensure_toml(path: &Path) -> Result<(), ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(()),
        _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(AppConfig::from_toml_str("").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_file_overrides() {
        let config = AppConfig::from_toml_str(
            r#"
            title = "Hello"
            width = 800
            clear_color = [0.1, 0.2, 0.3, 1.0]
            show_fps = false
            "#,
        )
        .unwrap();

        assert_eq!(config.title, "Hello");
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 512);
        assert_eq!(config.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert!(!config.show_fps);
        assert!(config.exit_on_escape);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            AppConfig::from_toml_str("fullscreen = true"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            AppConfig::from_toml_str("height = 0"),
            Err(ConfigError::Invalid { field: "height", .. })
        ));
        assert!(matches!(
            AppConfig::from_toml_str("clear_color = [0.0, 0.0, 2.0, 1.0]"),
            Err(ConfigError::Invalid {
                field: "clear_color",
                ..
            })
        ));
        assert!(matches!(
            AppConfig::from_toml_str("fps_interval = 0.0"),
            Err(ConfigError::Invalid {
                field: "fps_interval",
                ..
            })
        ));
    }

    #[test]
    fn rejects_unrepresentable_fps_interval() {
        for value in ["inf", "nan", "-1.0", "1e30", "1e-12"] {
            let err = AppConfig::from_toml_str(&format!("fps_interval = {value}")).unwrap_err();
            assert!(
                matches!(
                    err,
                    ConfigError::Invalid {
                        field: "fps_interval",
                        ..
                    }
                ),
                "fps_interval = {value} was accepted"
            );
        }
    }

    #[test]
    fn fps_interval_as_duration() {
        let config = AppConfig::from_toml_str("fps_interval = 0.25").unwrap();
        assert_eq!(config.fps_refresh_interval().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn only_toml_files() {
        assert!(matches!(
            AppConfig::load_from_file("settings.ron"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("quadbatch-config-{}.toml", std::process::id()));
        let config = AppConfig::default().with_title("Saved");

        config.save_to_file(&path).unwrap();
        let loaded = AppConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, config);
    }
}
