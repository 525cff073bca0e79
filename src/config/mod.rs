//! Configuration schema definitions and loading.
//!
//! Defines the configuration structure for nowplaying: general settings such
//! as logging, and the media service settings. All configurations are
//! serializable to/from TOML format.

mod general;
mod loading;
mod media;
mod paths;

#[cfg(test)]
mod tests;

pub use general::{GeneralConfig, LogLevel};
pub use media::MediaConfig;
pub use paths::ConfigPaths;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Main configuration structure for nowplaying.
///
/// Represents the complete configuration schema that can be loaded
/// from TOML files. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
pub struct Config {
    /// General application settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Media session tracking settings.
    #[serde(default)]
    pub media: MediaConfig,
}
