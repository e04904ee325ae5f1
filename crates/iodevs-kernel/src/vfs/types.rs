//! Core VFS types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use strum::EnumString;

/// Opaque reference to an open virtual file.
///
/// Handles are views: several handles on one path share a single buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u32);

impl Handle {
    /// Wrap a raw descriptor number.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw descriptor number.
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd {}", self.0)
    }
}

/// Access mode a handle is opened with.
///
/// Parses node-style flag strings: `r`, `w`, `r+`, `w+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// Read-only.
    #[strum(serialize = "r", serialize = "read")]
    Read,
    /// Write-only.
    #[strum(serialize = "w", serialize = "write")]
    Write,
    /// Read and write.
    #[default]
    #[strum(serialize = "r+", serialize = "w+", serialize = "rw", serialize = "readwrite")]
    ReadWrite,
}

impl OpenMode {
    /// Parse a flag string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Returns true if reads are allowed.
    pub fn can_read(&self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    /// Returns true if writes and truncation are allowed.
    pub fn can_write(&self) -> bool {
        matches!(self, OpenMode::Write | OpenMode::ReadWrite)
    }

    /// Whether this mode permits `op`.
    pub fn permits(&self, op: Operation) -> bool {
        match op {
            Operation::Read => self.can_read(),
            Operation::Write => self.can_write(),
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenMode::Read => "r",
            OpenMode::Write => "w",
            OpenMode::ReadWrite => "w+",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operation kind a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// File metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStat {
    /// Full device path.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Whether a post-read hook is installed.
    pub read_hooked: bool,
    /// Whether a post-write hook is installed.
    pub write_hooked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_parse() {
        assert_eq!(OpenMode::from_str("w+"), Some(OpenMode::ReadWrite));
        assert_eq!(OpenMode::from_str("r+"), Some(OpenMode::ReadWrite));
        assert_eq!(OpenMode::from_str("r"), Some(OpenMode::Read));
        assert_eq!(OpenMode::from_str("w"), Some(OpenMode::Write));
        assert_eq!(OpenMode::from_str("a"), None);
    }

    #[test]
    fn test_open_mode_permissions() {
        assert!(OpenMode::Read.permits(Operation::Read));
        assert!(!OpenMode::Read.permits(Operation::Write));
        assert!(!OpenMode::Write.permits(Operation::Read));
        assert!(OpenMode::ReadWrite.can_read() && OpenMode::ReadWrite.can_write());
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(Handle::from_raw(3).to_string(), "fd 3");
    }
}
