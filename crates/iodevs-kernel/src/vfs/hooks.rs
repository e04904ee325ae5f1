//! Post-operation hooks.
//!
//! A hook turns a plain file operation into a device side effect: after a
//! write (or read) commits, the file's hook for that operation runs on the
//! caller's thread before the operation returns. Each file has one slot per
//! operation kind; installing a hook replaces whatever was there.
//!
//! Hooks are attached through any handle but belong to the file, so a guest
//! that opens its own handle on a device path still triggers them.

use std::fmt;
use std::sync::Arc;

use super::error::VfsResult;
use super::store::VirtualFileStore;
use super::types::{Handle, Operation};

type HookFn = dyn Fn() -> anyhow::Result<()> + Send + Sync;

/// A callback fired after a file operation completes.
#[derive(Clone)]
pub struct Hook {
    f: Arc<HookFn>,
}

impl Hook {
    /// Wrap a closure.
    pub fn new(f: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    /// Run the hook.
    pub fn fire(&self) -> anyhow::Result<()> {
        (self.f)()
    }

    /// Returns true if both values wrap the same closure.
    pub fn ptr_eq(&self, other: &Hook) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook").finish_non_exhaustive()
    }
}

/// One hook slot per operation kind.
#[derive(Debug, Clone, Default)]
pub(crate) struct HookSlots {
    read: Option<Hook>,
    write: Option<Hook>,
}

impl HookSlots {
    fn slot_mut(&mut self, op: Operation) -> &mut Option<Hook> {
        match op {
            Operation::Read => &mut self.read,
            Operation::Write => &mut self.write,
        }
    }

    pub(crate) fn get(&self, op: Operation) -> Option<Hook> {
        match op {
            Operation::Read => self.read.clone(),
            Operation::Write => self.write.clone(),
        }
    }

    pub(crate) fn is_set(&self, op: Operation) -> bool {
        match op {
            Operation::Read => self.read.is_some(),
            Operation::Write => self.write.is_some(),
        }
    }

    /// Install or clear a slot, returning the previous occupant.
    pub(crate) fn replace(&mut self, op: Operation, hook: Option<Hook>) -> Option<Hook> {
        std::mem::replace(self.slot_mut(op), hook)
    }
}

impl VirtualFileStore {
    /// Fire `f` after every completed write on the file behind `handle`.
    ///
    /// Returns the hook this one replaced, if any.
    pub fn hook_write(
        &self,
        handle: Handle,
        f: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> VfsResult<Option<Hook>> {
        self.install(handle, Operation::Write, Some(Hook::new(f)))
    }

    /// Fire `f` after every completed read on the file behind `handle`.
    ///
    /// Returns the hook this one replaced, if any.
    pub fn hook_read(
        &self,
        handle: Handle,
        f: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> VfsResult<Option<Hook>> {
        self.install(handle, Operation::Read, Some(Hook::new(f)))
    }

    /// Install an already-built hook.
    pub fn set_hook(&self, handle: Handle, op: Operation, hook: Hook) -> VfsResult<Option<Hook>> {
        self.install(handle, op, Some(hook))
    }

    /// Remove the hook for `op`, returning it.
    pub fn unhook(&self, handle: Handle, op: Operation) -> VfsResult<Option<Hook>> {
        self.install(handle, op, None)
    }

    /// Returns true if the file behind `handle` has a hook for `op`.
    pub fn is_hooked(&self, handle: Handle, op: Operation) -> VfsResult<bool> {
        let (file, _) = self.resolve(handle)?;
        let guard = file.lock();
        let hooked = guard.borrow().hooks.is_set(op);
        Ok(hooked)
    }

    fn install(&self, handle: Handle, op: Operation, hook: Option<Hook>) -> VfsResult<Option<Hook>> {
        let (file, _) = self.resolve(handle)?;
        let guard = file.lock();
        let mut f = guard.borrow_mut();
        tracing::debug!(
            path = %f.path,
            %handle,
            %op,
            installed = hook.is_some(),
            "hook slot updated"
        );
        Ok(f.hooks.replace(op, hook))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::{OpenMode, VfsError};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SIZE: &str = "/sys/class/graphics/wasmerfb0/virtual_size";

    fn setup() -> (Arc<VirtualFileStore>, Handle) {
        let store = Arc::new(VirtualFileStore::new());
        store.create(SIZE).unwrap();
        let h = store.open(SIZE, OpenMode::ReadWrite).unwrap();
        (store, h)
    }

    #[test]
    fn test_write_hook_fires_once_per_write_in_order() {
        let (store, h) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&store);
        let log = Arc::clone(&seen);
        store
            .hook_write(h, move || {
                // The write is already visible when the hook runs
                log.lock().push(s.read(h)?);
                Ok(())
            })
            .unwrap();

        for i in 0..5u8 {
            store.write(h, &[i]).unwrap();
        }

        let seen = seen.lock();
        assert_eq!(*seen, vec![vec![0], vec![1], vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn test_read_hook_fires_after_read() {
        let (store, h) = setup();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        store
            .hook_read(h, move || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        store.write(h, b"1x1").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(store.read(h).unwrap(), b"1x1");
        store.read(h).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rehook_replaces() {
        let (store, h) = setup();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));

        let ac = Arc::clone(&a);
        let prev = store
            .hook_write(h, move || {
                ac.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        assert!(prev.is_none());
        store.write(h, b"x").unwrap();

        let bc = Arc::clone(&b);
        let prev = store
            .hook_write(h, move || {
                bc.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        assert!(prev.is_some());
        store.write(h, b"y").unwrap();

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_is_per_file_not_per_handle() {
        let (store, h) = setup();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        store
            .hook_write(h, move || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let guest = store.open(SIZE, OpenMode::Write).unwrap();
        store.write(guest, b"320x200").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_on_invalid_handle_fails() {
        let store = VirtualFileStore::new();
        let bogus = Handle::from_raw(99);
        assert!(matches!(
            store.hook_write(bogus, || Ok(())),
            Err(VfsError::InvalidHandle(h)) if h == bogus
        ));
        assert!(matches!(
            store.hook_read(bogus, || Ok(())),
            Err(VfsError::InvalidHandle(_))
        ));
    }

    #[test]
    fn test_hook_error_propagates_after_commit() {
        let (store, h) = setup();
        store
            .hook_write(h, || Err(anyhow::anyhow!("window gone")))
            .unwrap();

        let err = store.write(h, b"800x600").unwrap_err();
        match &err {
            VfsError::HookFailed { path, op, source } => {
                assert_eq!(path, SIZE);
                assert_eq!(*op, Operation::Write);
                assert_eq!(source.to_string(), "window gone");
            }
            other => panic!("expected HookFailed, got {other:?}"),
        }
        // Data stays committed
        store.unhook(h, Operation::Write).unwrap();
        assert_eq!(store.read(h).unwrap(), b"800x600");
    }

    #[test]
    fn test_unhook_and_inspect() {
        let (store, h) = setup();
        assert!(!store.is_hooked(h, Operation::Write).unwrap());
        store.hook_write(h, || Ok(())).unwrap();
        assert!(store.is_hooked(h, Operation::Write).unwrap());
        assert!(!store.is_hooked(h, Operation::Read).unwrap());
        assert!(store.stat(SIZE).unwrap().write_hooked);

        let removed = store.unhook(h, Operation::Write).unwrap().unwrap();
        assert!(!store.is_hooked(h, Operation::Write).unwrap());

        // A removed hook can be reinstalled as-is
        store.set_hook(h, Operation::Write, removed.clone()).unwrap();
        let back = store.unhook(h, Operation::Write).unwrap().unwrap();
        assert!(back.ptr_eq(&removed));
    }

    #[test]
    fn test_hook_may_rehook_itself() {
        let (store, h) = setup();
        let s = Arc::clone(&store);
        store
            .hook_write(h, move || {
                s.unhook(h, Operation::Write)?;
                Ok(())
            })
            .unwrap();
        store.write(h, b"a").unwrap();
        assert!(!store.is_hooked(h, Operation::Write).unwrap());
    }
}
