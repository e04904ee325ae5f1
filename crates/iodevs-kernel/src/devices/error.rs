//! Device layer error types.

use thiserror::Error;

use crate::config::ConfigError;
use crate::vfs::VfsError;

/// Device layer error type.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Window-size content is not `<width>x<height>`.
    #[error("malformed window size: {0:?}")]
    MalformedSize(String),

    /// No device is registered under this role name.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// Configuration describes an unusable layout.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Underlying store failure.
    #[error(transparent)]
    Vfs(#[from] VfsError),
}

impl DeviceError {
    /// Create a MalformedSize error.
    pub fn malformed_size(text: impl Into<String>) -> Self {
        Self::MalformedSize(text.into())
    }

    /// Create an UnknownDevice error.
    pub fn unknown_device(name: impl Into<String>) -> Self {
        Self::UnknownDevice(name.into())
    }
}

/// Device result type.
pub type DeviceResult<T> = Result<T, DeviceError>;
