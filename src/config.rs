//! Engine configuration
//!
//! Loaded from a JSON file. Every field is optional in the file; missing
//! values take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::params::PlaybackParameters;
use crate::error::{PhantomError, Result};

/// Output device preferences. `None` means the device default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub device_name: Option<String>,
}

/// Top-level engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Randomly pick which ear hears track 1 for each dual-mode session
    pub randomize_channels: bool,
    /// Initial playback parameters for a new context
    pub defaults: PlaybackParameters,
    pub output: OutputConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            randomize_channels: true,
            defaults: PlaybackParameters::default(),
            output: OutputConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.defaults.validate()?;

        if self.output.sample_rate == Some(0) {
            return Err(PhantomError::Config {
                reason: "output.sample_rate must be positive".to_string(),
            });
        }
        if self.output.channels == Some(0) {
            return Err(PhantomError::Config {
                reason: "output.channels must be positive".to_string(),
            });
        }
        Ok(())
    }
}
