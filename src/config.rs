use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use confique::Config;
use serde::Serialize;

pub const CONFIG_FILE_NAME: &str = ".aggregator.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration from {path}")]
    Load {
        path: PathBuf,
        #[source]
        source: confique::Error,
    },
    #[error("failed to serialize configuration")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write configuration to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot locate the home directory, pass --config explicitly")]
    NoHome,
}

#[derive(Debug, Config, Serialize, Clone, PartialEq, Eq)]
pub struct Configuration {
    #[config(env = "AGGREGATOR_DATABASE_URL", default = "sqlite:aggregator.db?mode=rwc")]
    pub db_url: String,
    /// Name of the user commands act as.
    pub current_user_name: Option<String>,
    #[config(env = "AGGREGATOR_REQUEST_TIMEOUT_SECS", default = 60)]
    pub request_timeout_secs: u64,
}

impl Configuration {
    /// `~/.aggregator.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoHome)
    }

    /// Loads the file at `path`, if present, with defaults and environment
    /// overrides applied.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        Self::builder()
            .file(path)
            .env()
            .load()
            .map_err(|source| ConfigError::Load {
                path: path.to_owned(),
                source,
            })
    }

    /// Records `name` as the current user in the file at `path`.
    ///
    /// The file is re-read without environment overrides, so values that
    /// only came from the environment are not persisted.
    pub fn save_current_user(path: &Path, name: &str) -> Result<(), ConfigError> {
        let mut on_disk = Self::builder()
            .file(path)
            .load()
            .map_err(|source| ConfigError::Load {
                path: path.to_owned(),
                source,
            })?;
        on_disk.current_user_name = Some(name.to_owned());
        on_disk.write(path)
    }

    /// Overwrites the file at `path` with the whole configuration.
    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_owned(),
            source,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
