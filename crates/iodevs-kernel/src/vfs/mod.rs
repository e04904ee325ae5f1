//! Virtual file store with interception hooks.
//!
//! - [`VirtualFileStore`] - flat path -> bytes store with open handles
//! - [`Hook`] - post-read / post-write callbacks installed per file
//!
//! ## Design Decisions
//!
//! - **Whole-buffer files**: a write replaces the content, a read returns
//!   all of it. Device files always hold their latest state.
//! - **Handles are views**: every handle on a path shares one buffer and
//!   one set of hooks.
//! - **Synchronous hooks**: a hook runs on the caller's thread after its
//!   operation commits and before the operation returns.

mod error;
mod hooks;
mod store;
mod types;

pub use error::{BoxError, VfsError, VfsResult};
pub use hooks::Hook;
pub use store::VirtualFileStore;
pub use types::{FileStat, Handle, OpenMode, Operation};
