//! Locating, seeding, and reading `config.toml`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::app_config::AppConfig;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";
const APP_NAME: &str = "mdex-pack";

/// Errors raised while locating or seeding the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform configuration directory could be determined.
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    /// The file or its directory could not be read or written.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The default configuration could not be serialized.
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// The configuration file backing an [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Uses `path_override` when given, else `config.toml` in the platform
    /// configuration directory.
    ///
    /// # Errors
    /// Returns [`ConfigError::ConfigDirNotFound`] if no override is given and
    /// the platform directory is unknown.
    pub fn locate(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path_override {
            return Ok(Self::at(path));
        }
        let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .ok_or(ConfigError::ConfigDirNotFound)?;
        Ok(Self::at(dirs.config_dir().join(CONFIG_FILE_NAME)))
    }

    /// Uses the file at `path`.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the configuration file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the configuration.
    ///
    /// A missing file is created with the defaults. A malformed file yields
    /// the defaults and is left as it is.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or the defaults
    /// cannot be written.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let config = AppConfig::default();
                self.seed(&config)?;
                return Ok(config);
            }
            Err(e) => return Err(e.into()),
        };

        match toml::from_str(&content) {
            Ok(config) => {
                debug!(path = %self.path.display(), "Loaded configuration");
                Ok(config)
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Malformed config file, using defaults"
                );
                Ok(AppConfig::default())
            }
        }
    }

    fn seed(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(toml::to_string_pretty(config)?.as_bytes())?;
        file.persist(&self.path).map_err(|e| e.error)?;

        info!(path = %self.path.display(), "Wrote default configuration");
        Ok(())
    }
}
