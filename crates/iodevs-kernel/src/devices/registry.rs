//! Fixed role -> path -> handle table.

use std::collections::HashMap;

use crate::vfs::{Handle, OpenMode, VfsResult, VirtualFileStore};

use super::error::{DeviceError, DeviceResult};
use super::layout::{DeviceLayout, DeviceRole};

/// A registered device file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub role: DeviceRole,
    pub path: String,
    pub handle: Handle,
}

/// The four device files, created and opened once.
///
/// There is no partially registered state: either every device exists and
/// has an open handle, or construction fails and nothing is left behind.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    entries: HashMap<DeviceRole, DeviceEntry>,
}

impl DeviceRegistry {
    /// Create and open every device file described by `layout`.
    pub fn register(store: &VirtualFileStore, layout: &DeviceLayout) -> VfsResult<Self> {
        let mut entries = HashMap::with_capacity(DeviceRole::ALL.len());
        let mut created = Vec::with_capacity(DeviceRole::ALL.len());

        for role in DeviceRole::ALL {
            let path = layout.path(role);
            let result = store.create(path).and_then(|()| {
                created.push(path);
                store.open(path, OpenMode::ReadWrite)
            });
            match result {
                Ok(handle) => {
                    tracing::debug!(%role, path, %handle, "device registered");
                    entries.insert(
                        role,
                        DeviceEntry {
                            role,
                            path: path.to_string(),
                            handle,
                        },
                    );
                }
                Err(e) => {
                    tracing::error!(%role, path, error = %e, "device registration failed");
                    rollback(store, &created);
                    return Err(e);
                }
            }
        }

        Ok(Self { entries })
    }

    /// Entry for a role.
    pub fn entry(&self, role: DeviceRole) -> DeviceResult<&DeviceEntry> {
        self.entries
            .get(&role)
            .ok_or_else(|| DeviceError::unknown_device(role.as_str()))
    }

    /// Handle for a role.
    pub fn handle(&self, role: DeviceRole) -> DeviceResult<Handle> {
        self.entry(role).map(|e| e.handle)
    }

    /// Path for a role.
    pub fn path(&self, role: DeviceRole) -> DeviceResult<&str> {
        self.entry(role).map(|e| e.path.as_str())
    }

    /// Look up a device by role name (`"input"`, `"fb"`, ...).
    pub fn lookup(&self, name: &str) -> DeviceResult<&DeviceEntry> {
        let role = DeviceRole::from_str(name).ok_or_else(|| DeviceError::unknown_device(name))?;
        self.entry(role)
    }

    /// Look up the device bound to a path.
    pub fn by_path(&self, path: &str) -> Option<&DeviceEntry> {
        self.entries.values().find(|e| e.path == path)
    }

    /// All entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &DeviceEntry> {
        DeviceRole::ALL.into_iter().filter_map(|role| self.entries.get(&role))
    }
}

/// Unlink every path in `created`. Returns how many could not be removed;
/// each of those is logged, since it leaves the store half cleaned.
fn rollback(store: &VirtualFileStore, created: &[&str]) -> usize {
    let mut leftover = 0;
    for path in created {
        if let Err(e) = store.unlink(path) {
            leftover += 1;
            tracing::warn!(path = *path, error = %e, "device rollback could not unlink");
        }
    }
    leftover
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::VfsError;

    #[test]
    fn test_register_creates_all_devices() {
        let store = VirtualFileStore::new();
        let layout = DeviceLayout::default();
        let registry = DeviceRegistry::register(&store, &layout).unwrap();

        assert_eq!(registry.entries().count(), 4);
        for role in DeviceRole::ALL {
            let entry = registry.entry(role).unwrap();
            assert_eq!(entry.path, layout.path(role));
            assert!(store.exists(&entry.path));
            assert!(store.read(entry.handle).unwrap().is_empty());
        }
    }

    #[test]
    fn test_lookup_by_name() {
        let store = VirtualFileStore::new();
        let registry = DeviceRegistry::register(&store, &DeviceLayout::default()).unwrap();

        assert_eq!(registry.lookup("input").unwrap().path, "/dev/input");
        assert!(matches!(
            registry.lookup("speaker"),
            Err(DeviceError::UnknownDevice(name)) if name == "speaker"
        ));
        assert_eq!(
            registry.by_path("/dev/wasmerfb0").map(|e| e.role),
            Some(DeviceRole::FrameBuffer)
        );
    }

    #[test]
    fn test_failed_registration_leaves_nothing_behind() {
        let store = VirtualFileStore::new();
        let layout = DeviceLayout::default();
        // Input is registered last; a pre-existing file makes it fail
        store.create(&layout.input).unwrap();

        let err = DeviceRegistry::register(&store, &layout).unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(p) if p == "/dev/input"));
        assert!(!store.exists(&layout.frame_buffer));
        assert!(!store.exists(&layout.window_size));
        assert!(!store.exists(&layout.buffer_index_display));
        // The file we did not create is untouched
        assert!(store.exists(&layout.input));
    }

    #[test]
    fn test_rollback_counts_paths_it_could_not_remove() {
        let store = VirtualFileStore::new();
        store.create("/dev/wasmerfb0").unwrap();

        let leftover = rollback(&store, &["/dev/wasmerfb0", "/dev/already-gone"]);
        assert_eq!(leftover, 1);
        assert!(!store.exists("/dev/wasmerfb0"));
    }
}
