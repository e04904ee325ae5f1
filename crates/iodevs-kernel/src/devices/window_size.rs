//! `<width>x<height>` window size text.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::DeviceError;

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)x(\d+)$").expect("window size pattern is valid")
});

/// Dimensions written to the window-size device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A size with both sides non-zero. `0x0` means "close the window".
    pub fn is_visible(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Byte length of an RGBA buffer covering this size, or `None` if it
    /// does not fit in `usize`.
    pub fn rgba_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(4)
    }

    /// Decode raw device bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeviceError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| DeviceError::malformed_size(String::from_utf8_lossy(bytes)))?;
        text.parse()
    }
}

impl FromStr for WindowSize {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = SIZE_RE
            .captures(s)
            .ok_or_else(|| DeviceError::malformed_size(s))?;
        // Digits only, so the sole failure left is overflow
        let width = caps[1].parse().map_err(|_| DeviceError::malformed_size(s))?;
        let height = caps[2].parse().map_err(|_| DeviceError::malformed_size(s))?;
        Ok(Self { width, height })
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<WindowSize> for (u32, u32) {
    fn from(size: WindowSize) -> Self {
        (size.width, size.height)
    }
}
