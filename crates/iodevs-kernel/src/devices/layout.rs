//! Device roles and the paths they live at.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::config::DeviceConfig;

/// Semantic identity of a device file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum DeviceRole {
    /// Raw RGBA pixels, whole-buffer overwrite.
    #[strum(serialize = "frame_buffer", serialize = "framebuffer", serialize = "fb")]
    FrameBuffer,
    /// UTF-8 `<width>x<height>`.
    #[strum(serialize = "window_size", serialize = "virtual_size")]
    WindowSize,
    /// Repaint trigger; only the write matters.
    #[strum(serialize = "buffer_index_display", serialize = "display")]
    BufferIndexDisplay,
    /// Opaque input-event bytes, cleared after each read.
    #[strum(serialize = "input")]
    Input,
}

impl DeviceRole {
    /// Every role, in registration order.
    pub const ALL: [DeviceRole; 4] = [
        DeviceRole::FrameBuffer,
        DeviceRole::WindowSize,
        DeviceRole::BufferIndexDisplay,
        DeviceRole::Input,
    ];

    /// Parse from string (case-insensitive, with aliases).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::FrameBuffer => "frame_buffer",
            DeviceRole::WindowSize => "window_size",
            DeviceRole::BufferIndexDisplay => "buffer_index_display",
            DeviceRole::Input => "input",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Concrete paths for the four device roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLayout {
    pub frame_buffer: String,
    pub window_size: String,
    pub buffer_index_display: String,
    pub input: String,
}

impl Default for DeviceLayout {
    fn default() -> Self {
        Self::from_config(&DeviceConfig::default())
    }
}

impl DeviceLayout {
    /// Derive paths from configuration.
    ///
    /// With defaults this yields `/dev/wasmerfb0`,
    /// `/sys/class/graphics/wasmerfb0/virtual_size`,
    /// `/sys/class/graphics/wasmerfb0/buffer_index_display` and `/dev/input`.
    pub fn from_config(config: &DeviceConfig) -> Self {
        let dev = config.dev_root.trim_end_matches('/');
        let sys = format!(
            "{}/{}",
            config.graphics_root.trim_end_matches('/'),
            config.framebuffer
        );
        Self {
            frame_buffer: format!("{dev}/{}", config.framebuffer),
            window_size: format!("{sys}/virtual_size"),
            buffer_index_display: format!("{sys}/buffer_index_display"),
            input: config.input.clone(),
        }
    }

    /// Path for a role.
    pub fn path(&self, role: DeviceRole) -> &str {
        match role {
            DeviceRole::FrameBuffer => &self.frame_buffer,
            DeviceRole::WindowSize => &self.window_size,
            DeviceRole::BufferIndexDisplay => &self.buffer_index_display,
            DeviceRole::Input => &self.input,
        }
    }

    /// Role bound to a path, if any.
    pub fn role_for_path(&self, path: &str) -> Option<DeviceRole> {
        DeviceRole::ALL.into_iter().find(|role| self.path(*role) == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = DeviceLayout::default();
        assert_eq!(layout.frame_buffer, "/dev/wasmerfb0");
        assert_eq!(layout.window_size, "/sys/class/graphics/wasmerfb0/virtual_size");
        assert_eq!(
            layout.buffer_index_display,
            "/sys/class/graphics/wasmerfb0/buffer_index_display"
        );
        assert_eq!(layout.input, "/dev/input");
    }

    #[test]
    fn test_layout_from_custom_config() {
        let config = DeviceConfig {
            framebuffer: "fb1".into(),
            dev_root: "/devices/".into(),
            graphics_root: "/sys/gfx".into(),
            ..DeviceConfig::default()
        };
        let layout = DeviceLayout::from_config(&config);
        assert_eq!(layout.frame_buffer, "/devices/fb1");
        assert_eq!(layout.window_size, "/sys/gfx/fb1/virtual_size");
    }

    #[test]
    fn test_role_for_path() {
        let layout = DeviceLayout::default();
        assert_eq!(layout.role_for_path("/dev/input"), Some(DeviceRole::Input));
        assert_eq!(
            layout.role_for_path("/dev/wasmerfb0"),
            Some(DeviceRole::FrameBuffer)
        );
        assert_eq!(layout.role_for_path("/dev/null"), None);
    }

    #[test]
    fn test_role_names() {
        assert_eq!(DeviceRole::from_str("FB"), Some(DeviceRole::FrameBuffer));
        assert_eq!(DeviceRole::from_str("virtual_size"), Some(DeviceRole::WindowSize));
        assert_eq!(DeviceRole::from_str("mouse"), None);
        for role in DeviceRole::ALL {
            assert_eq!(DeviceRole::from_str(role.as_str()), Some(role));
        }
    }
}
