//! Error types for the host window.

use iodevs_kernel::DeviceError;
use thiserror::Error;

/// Errors from mirroring devices into a host window.
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("no window is open")]
    NoWindow,

    #[error("frame of {len} bytes does not fit a {capacity} byte canvas")]
    FrameTooLarge { len: usize, capacity: usize },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("input encoding: {0}")]
    Encode(#[from] postcard::Error),
}

pub type WindowResult<T> = Result<T, WindowError>;
