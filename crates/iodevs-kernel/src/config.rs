//! Device layer configuration.
//!
//! Every field has a default matching the paths WASI framebuffer guests
//! expect, so an empty file (or no file) yields a working setup:
//!
//! ```toml
//! framebuffer = "wasmerfb0"
//! dev_root = "/dev"
//! graphics_root = "/sys/class/graphics"
//! input = "/dev/input"
//! event_capacity = 256
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default framebuffer device name.
pub const DEFAULT_FRAMEBUFFER: &str = "wasmerfb0";

/// Default root for character devices.
pub const DEFAULT_DEV_ROOT: &str = "/dev";

/// Default sysfs graphics class directory.
pub const DEFAULT_GRAPHICS_ROOT: &str = "/sys/class/graphics";

/// Default input device path.
pub const DEFAULT_INPUT: &str = "/dev/input";

/// Default device event bus capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config parsed but describes an unusable layout.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Device layer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Framebuffer device name, used under both `dev_root` and `graphics_root`.
    pub framebuffer: String,
    /// Directory holding the framebuffer device node.
    pub dev_root: String,
    /// sysfs graphics class directory.
    pub graphics_root: String,
    /// Input device path.
    pub input: String,
    /// Capacity of the device event bus.
    pub event_capacity: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            framebuffer: DEFAULT_FRAMEBUFFER.to_string(),
            dev_root: DEFAULT_DEV_ROOT.to_string(),
            graphics_root: DEFAULT_GRAPHICS_ROOT.to_string(),
            input: DEFAULT_INPUT.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl DeviceConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check the values describe a usable layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.framebuffer.is_empty() || self.framebuffer.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "framebuffer name {:?} must be a single path component",
                self.framebuffer
            )));
        }
        for (field, value) in [
            ("dev_root", &self.dev_root),
            ("graphics_root", &self.graphics_root),
            ("input", &self.input),
        ] {
            if !value.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "{field} {value:?} must be an absolute path"
                )));
            }
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be non-zero".into()));
        }
        Ok(())
    }
}
