//! VFS error types.

use std::io;
use thiserror::Error;

use super::types::{Handle, OpenMode, Operation};

/// Boxed error carried out of a failing hook.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path was never created.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Handle is unknown or was closed.
    #[error("invalid handle: {0}")]
    InvalidHandle(Handle),

    /// Path is not a flat absolute device path.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// Operation not allowed by the mode the handle was opened with.
    #[error("{op} not permitted on {handle} (opened {mode})")]
    ModeViolation {
        handle: Handle,
        op: Operation,
        mode: OpenMode,
    },

    /// A post-operation hook failed. The operation itself was committed.
    #[error("{op} hook on {path} failed: {source}")]
    HookFailed {
        path: String,
        op: Operation,
        #[source]
        source: BoxError,
    },
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Wrap a hook failure.
    pub fn hook_failed(path: impl Into<String>, op: Operation, source: impl Into<BoxError>) -> Self {
        Self::HookFailed {
            path: path.into(),
            op,
            source: source.into(),
        }
    }

    /// Returns true if the error came from a hook rather than the store.
    pub fn is_hook_failure(&self) -> bool {
        matches!(self, Self::HookFailed { .. })
    }
}

/// Convert VfsError to std::io::Error for callers speaking `std::io`.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(path) => io::Error::new(io::ErrorKind::NotFound, path),
            VfsError::AlreadyExists(path) => io::Error::new(io::ErrorKind::AlreadyExists, path),
            VfsError::InvalidHandle(handle) => {
                io::Error::new(io::ErrorKind::InvalidInput, format!("invalid handle: {handle}"))
            }
            VfsError::InvalidPath(path) => io::Error::new(io::ErrorKind::InvalidInput, path),
            e @ VfsError::ModeViolation { .. } => {
                io::Error::new(io::ErrorKind::PermissionDenied, e.to_string())
            }
            VfsError::HookFailed { source, .. } => io::Error::other(source),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
