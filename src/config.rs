//! Configuration module
//!
//! Loads and saves the user's settings as TOML under the platform config
//! directory. A missing file simply yields the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR: &str = "brightness-tray";
const CONFIG_FILE: &str = "config.toml";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Show the "NN%" label next to the slider
    pub show_percentage_text: bool,
    /// Brightness change per mouse-wheel notch
    pub scroll_step: u32,
    /// Popup size in logical pixels
    pub popup_width: f32,
    pub popup_height: f32,
    /// Hold the display awake from launch
    pub keep_awake_on_start: bool,
    /// Tracing filter directive, overridden by RUST_LOG
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            show_percentage_text: true,
            scroll_step: 1,
            popup_width: 300.0,
            popup_height: 110.0,
            keep_awake_on_start: false,
            log_level: None,
        }
    }
}

impl AppConfig {
    /// `<config dir>/brightness-tray/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Loads from the default location. Systems without a config directory
    /// get the defaults.
    pub fn load() -> ConfigResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Re-reads `path`, applies `edit` and writes the result back. A file
    /// that fails to load is left untouched and the error returned.
    pub fn update_at(path: &Path, edit: impl FnOnce(&mut Self)) -> ConfigResult<Self> {
        let mut config = Self::load_from(path)?;
        edit(&mut config);
        config.save_to(path)?;
        Ok(config)
    }

    pub fn update(edit: impl FnOnce(&mut Self)) -> ConfigResult<Self> {
        match Self::default_path() {
            Some(path) => Self::update_at(&path, edit),
            None => Err(ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no config directory on this system",
            ))),
        }
    }
}
