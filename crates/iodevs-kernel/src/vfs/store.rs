//! Flat in-memory file store.
//!
//! Every file is a whole-buffer byte sequence keyed by its absolute path.
//! Writes replace the buffer; reads return an owned copy. Each file lives
//! behind its own re-entrant lock, held across the operation and any hook
//! it fires, so a hook observes exactly the state its operation produced
//! and may read the same file back without deadlocking.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;

use parking_lot::{ReentrantMutex, RwLock};

use super::error::{VfsError, VfsResult};
use super::hooks::HookSlots;
use super::types::{FileStat, Handle, OpenMode, Operation};

/// Descriptors 0..=2 are left to stdio, matching what a WASI guest expects.
const FIRST_HANDLE: u32 = 3;

/// A named virtual file.
#[derive(Debug)]
pub(crate) struct VirtualFile {
    pub(crate) path: String,
    pub(crate) data: Vec<u8>,
    pub(crate) mtime: SystemTime,
    pub(crate) hooks: HookSlots,
}

impl VirtualFile {
    fn new(path: String) -> Self {
        Self {
            path,
            data: Vec::new(),
            mtime: SystemTime::now(),
            hooks: HookSlots::default(),
        }
    }
}

pub(crate) type FileCell = Arc<ReentrantMutex<RefCell<VirtualFile>>>;

#[derive(Debug, Clone)]
struct OpenFile {
    file: FileCell,
    mode: OpenMode,
}

/// In-memory virtual file store.
///
/// Thread-safe; operations run synchronously on the calling thread.
#[derive(Debug)]
pub struct VirtualFileStore {
    files: RwLock<HashMap<String, FileCell>>,
    handles: RwLock<HashMap<Handle, OpenFile>>,
    next_handle: AtomicU32,
}

impl Default for VirtualFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            handles: RwLock::new(HashMap::new()),
            next_handle: AtomicU32::new(FIRST_HANDLE),
        }
    }

    /// Device paths are flat, absolute and never end in `/`.
    fn validate(path: &str) -> VfsResult<()> {
        if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
            return Err(VfsError::invalid_path(path));
        }
        Ok(())
    }

    /// Look up a handle without holding the table lock afterwards.
    pub(crate) fn resolve(&self, handle: Handle) -> VfsResult<(FileCell, OpenMode)> {
        self.handles
            .read()
            .get(&handle)
            .map(|open| (Arc::clone(&open.file), open.mode))
            .ok_or(VfsError::InvalidHandle(handle))
    }

    fn resolve_for(&self, handle: Handle, op: Operation) -> VfsResult<FileCell> {
        let (file, mode) = self.resolve(handle)?;
        if !mode.permits(op) {
            return Err(VfsError::ModeViolation { handle, op, mode });
        }
        Ok(file)
    }

    // ========================================================================
    // Namespace
    // ========================================================================

    /// Register an empty file at `path`.
    pub fn create(&self, path: &str) -> VfsResult<()> {
        Self::validate(path)?;
        let mut files = self.files.write();
        if files.contains_key(path) {
            return Err(VfsError::already_exists(path));
        }
        files.insert(
            path.to_string(),
            Arc::new(ReentrantMutex::new(RefCell::new(VirtualFile::new(path.to_string())))),
        );
        tracing::trace!(path, "created virtual file");
        Ok(())
    }

    /// Remove `path` and close every handle that refers to it.
    pub fn unlink(&self, path: &str) -> VfsResult<()> {
        let file = self
            .files
            .write()
            .remove(path)
            .ok_or_else(|| VfsError::not_found(path))?;
        self.handles
            .write()
            .retain(|_, open| !Arc::ptr_eq(&open.file, &file));
        tracing::trace!(path, "unlinked virtual file");
        Ok(())
    }

    /// Returns true if `path` was created.
    pub fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    /// All paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Metadata for `path`.
    pub fn stat(&self, path: &str) -> VfsResult<FileStat> {
        let file = self
            .files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::not_found(path))?;
        let guard = file.lock();
        let f = guard.borrow();
        Ok(FileStat {
            path: f.path.clone(),
            size: f.data.len() as u64,
            mtime: f.mtime,
            read_hooked: f.hooks.is_set(Operation::Read),
            write_hooked: f.hooks.is_set(Operation::Write),
        })
    }

    /// Copy of every file's content, keyed by path. Fires no hooks.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        let files: Vec<FileCell> = self.files.read().values().cloned().collect();
        files
            .iter()
            .map(|file| {
                let guard = file.lock();
                let f = guard.borrow();
                (f.path.clone(), f.data.clone())
            })
            .collect()
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Open `path`, returning a fresh handle.
    pub fn open(&self, path: &str, mode: OpenMode) -> VfsResult<Handle> {
        let file = self
            .files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| VfsError::not_found(path))?;
        let handle = Handle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.handles.write().insert(handle, OpenFile { file, mode });
        tracing::trace!(path, %handle, %mode, "opened virtual file");
        Ok(handle)
    }

    /// Close a handle. Later use of it fails with `InvalidHandle`.
    pub fn close(&self, handle: Handle) -> VfsResult<()> {
        self.handles
            .write()
            .remove(&handle)
            .map(|_| ())
            .ok_or(VfsError::InvalidHandle(handle))
    }

    /// Path a handle refers to.
    pub fn path_of(&self, handle: Handle) -> VfsResult<String> {
        let (file, _) = self.resolve(handle)?;
        let guard = file.lock();
        let path = guard.borrow().path.clone();
        Ok(path)
    }

    /// Current content length behind a handle. Fires no hooks.
    pub fn len(&self, handle: Handle) -> VfsResult<usize> {
        let (file, _) = self.resolve(handle)?;
        let guard = file.lock();
        let len = guard.borrow().data.len();
        Ok(len)
    }

    /// Returns true if the content behind a handle is empty.
    pub fn is_empty(&self, handle: Handle) -> VfsResult<bool> {
        Ok(self.len(handle)? == 0)
    }

    // ========================================================================
    // Data
    // ========================================================================

    /// Read the full content as an owned snapshot, then fire the read hook.
    pub fn read(&self, handle: Handle) -> VfsResult<Vec<u8>> {
        let file = self.resolve_for(handle, Operation::Read)?;
        let guard = file.lock();
        let (data, hook, path) = {
            let f = guard.borrow();
            (f.data.clone(), f.hooks.get(Operation::Read), f.path.clone())
        };
        if let Some(hook) = hook {
            tracing::debug!(path = %path, %handle, len = data.len(), "read hook firing");
            hook.fire()
                .map_err(|e| VfsError::hook_failed(&path, Operation::Read, e))?;
        }
        Ok(data)
    }

    /// Replace the full content with `data`, then fire the write hook.
    ///
    /// Returns the number of bytes written.
    pub fn write(&self, handle: Handle, data: &[u8]) -> VfsResult<usize> {
        let file = self.resolve_for(handle, Operation::Write)?;
        let guard = file.lock();
        let (hook, path) = {
            let mut f = guard.borrow_mut();
            f.data.clear();
            f.data.extend_from_slice(data);
            f.mtime = SystemTime::now();
            (f.hooks.get(Operation::Write), f.path.clone())
        };
        if let Some(hook) = hook {
            tracing::debug!(path = %path, %handle, len = data.len(), "write hook firing");
            hook.fire()
                .map_err(|e| VfsError::hook_failed(&path, Operation::Write, e))?;
        }
        Ok(data.len())
    }

    /// Empty the content. Fires no hooks.
    pub fn truncate(&self, handle: Handle) -> VfsResult<()> {
        let file = self.resolve_for(handle, Operation::Write)?;
        let guard = file.lock();
        let mut f = guard.borrow_mut();
        f.data.clear();
        f.mtime = SystemTime::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(path: &str) -> (VirtualFileStore, Handle) {
        let store = VirtualFileStore::new();
        store.create(path).unwrap();
        let handle = store.open(path, OpenMode::ReadWrite).unwrap();
        (store, handle)
    }

    #[test]
    fn test_fresh_file_reads_empty() {
        let (store, h) = store_with("/dev/wasmerfb0");
        assert!(store.read(h).unwrap().is_empty());
        assert!(store.is_empty(h).unwrap());
    }

    #[test]
    fn test_write_then_read() {
        let (store, h) = store_with("/dev/wasmerfb0");
        assert_eq!(store.write(h, &[1, 2, 3, 4]).unwrap(), 4);
        assert_eq!(store.read(h).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_write_replaces_not_appends() {
        let (store, h) = store_with("/dev/input");
        store.write(h, b"hello world").unwrap();
        store.write(h, b"hi").unwrap();
        assert_eq!(store.read(h).unwrap(), b"hi");
    }

    #[test]
    fn test_read_is_a_snapshot() {
        let (store, h) = store_with("/dev/input");
        store.write(h, b"first").unwrap();
        let before = store.read(h).unwrap();
        store.write(h, b"second").unwrap();
        assert_eq!(before, b"first");
    }

    #[test]
    fn test_empty_write_clears() {
        let (store, h) = store_with("/dev/input");
        store.write(h, b"abc").unwrap();
        store.write(h, b"").unwrap();
        assert!(store.read(h).unwrap().is_empty());
    }

    #[test]
    fn test_create_twice_fails() {
        let (store, _) = store_with("/dev/input");
        assert!(matches!(
            store.create("/dev/input"),
            Err(VfsError::AlreadyExists(p)) if p == "/dev/input"
        ));
    }

    #[test]
    fn test_open_missing_fails() {
        let store = VirtualFileStore::new();
        assert!(matches!(
            store.open("/dev/missing", OpenMode::Read),
            Err(VfsError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_paths() {
        let store = VirtualFileStore::new();
        assert!(matches!(store.create("dev/fb"), Err(VfsError::InvalidPath(_))));
        assert!(matches!(store.create("/"), Err(VfsError::InvalidPath(_))));
        assert!(matches!(store.create("/dev/"), Err(VfsError::InvalidPath(_))));
    }

    #[test]
    fn test_handles_share_one_buffer() {
        let (store, a) = store_with("/sys/class/graphics/wasmerfb0/virtual_size");
        let b = store
            .open("/sys/class/graphics/wasmerfb0/virtual_size", OpenMode::Read)
            .unwrap();
        assert_ne!(a, b);
        store.write(a, b"640x480").unwrap();
        assert_eq!(store.read(b).unwrap(), b"640x480");
    }

    #[test]
    fn test_handles_start_after_stdio() {
        let (_, h) = store_with("/dev/input");
        assert_eq!(h.raw(), FIRST_HANDLE);
    }

    #[test]
    fn test_mode_enforced() {
        let (store, _) = store_with("/dev/input");
        let ro = store.open("/dev/input", OpenMode::Read).unwrap();
        let wo = store.open("/dev/input", OpenMode::Write).unwrap();

        assert!(matches!(
            store.write(ro, b"x"),
            Err(VfsError::ModeViolation { op: Operation::Write, .. })
        ));
        assert!(matches!(store.truncate(ro), Err(VfsError::ModeViolation { .. })));
        assert!(matches!(
            store.read(wo),
            Err(VfsError::ModeViolation { op: Operation::Read, .. })
        ));
        assert_eq!(store.write(wo, b"ok").unwrap(), 2);
    }

    #[test]
    fn test_close_makes_handle_stale() {
        let (store, h) = store_with("/dev/input");
        store.close(h).unwrap();
        assert!(matches!(store.read(h), Err(VfsError::InvalidHandle(x)) if x == h));
        assert!(matches!(store.close(h), Err(VfsError::InvalidHandle(_))));
        // File survives its handles
        assert!(store.exists("/dev/input"));
    }

    #[test]
    fn test_truncate() {
        let (store, h) = store_with("/dev/input");
        store.write(h, b"key-a").unwrap();
        store.truncate(h).unwrap();
        assert!(store.read(h).unwrap().is_empty());
    }

    #[test]
    fn test_unlink_closes_handles() {
        let (store, h) = store_with("/dev/input");
        store.unlink("/dev/input").unwrap();
        assert!(!store.exists("/dev/input"));
        assert!(matches!(store.len(h), Err(VfsError::InvalidHandle(_))));
        assert!(matches!(store.unlink("/dev/input"), Err(VfsError::NotFound(_))));
    }

    #[test]
    fn test_stat_and_snapshot() {
        let (store, h) = store_with("/dev/wasmerfb0");
        store.create("/dev/input").unwrap();
        store.write(h, &[0xff; 16]).unwrap();

        let stat = store.stat("/dev/wasmerfb0").unwrap();
        assert_eq!(stat.size, 16);
        assert!(!stat.write_hooked);

        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["/dev/wasmerfb0"], vec![0xff; 16]);
        assert!(snap["/dev/input"].is_empty());

        assert_eq!(store.paths(), vec!["/dev/input", "/dev/wasmerfb0"]);
        assert_eq!(store.path_of(h).unwrap(), "/dev/wasmerfb0");
    }
}
