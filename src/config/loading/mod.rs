use std::{fs, path::Path};

use tracing::{debug, info, instrument};

use super::{Config, ConfigPaths};
use crate::{NowPlayingError, Result};

impl Config {
    /// Loads the configuration from the default location.
    ///
    /// A missing file is not an error: defaults are returned so the service
    /// can start on a fresh system.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined, the
    /// file exists but cannot be read, or its content is invalid.
    #[instrument]
    pub fn load() -> Result<Config> {
        let path = ConfigPaths::main_config()?;
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Config::default());
        }

        Self::load_from(&path)
    }

    /// Loads the configuration from an explicit TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// holds out-of-range values.
    pub fn load_from(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| NowPlayingError::io(e, path))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| NowPlayingError::toml_parse(e, Some(path)))?;

        config.validate()?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or holds out-of-range
    /// values.
    pub fn from_toml_str(content: &str) -> Result<Config> {
        let config: Config =
            toml::from_str(content).map_err(|e| NowPlayingError::toml_parse(e, None))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfigField` for a zero thumbnail timeout.
    pub fn validate(&self) -> Result<()> {
        if self.media.thumbnail_timeout_ms == 0 {
            return Err(NowPlayingError::InvalidConfigField {
                field: "thumbnail_timeout_ms".to_string(),
                component: "media".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
