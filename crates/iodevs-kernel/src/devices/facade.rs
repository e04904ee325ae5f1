//! Host-facing device API.
//!
//! [`IoDevices`] registers the four device files, wires their hooks, and
//! exposes what a host needs: the current framebuffer, the decoded window
//! size, two callback slots and input clearing. It holds no device state of
//! its own; every accessor reads back through the store.
//!
//! Hook wiring:
//!
//! | Device | Hook | Effect |
//! |---|---|---|
//! | window size | write | publish, fire `window_size` callback |
//! | buffer index display | write | publish, fire `buffer_ready` callback |
//! | frame buffer | write | publish |
//! | input | write | publish |
//! | input | read | clear input, publish |

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::config::DeviceConfig;
use crate::flows::{DeviceFlow, SharedDeviceFlowBus, Subscription, shared_device_flow_bus};
use crate::vfs::{Handle, VirtualFileStore};

use super::error::{DeviceError, DeviceResult};
use super::layout::{DeviceLayout, DeviceRole};
use super::registry::DeviceRegistry;
use super::window_size::WindowSize;

type CallbackFn = dyn Fn(&IoDevices) -> anyhow::Result<()> + Send + Sync;

/// A replaceable host callback. Empty until set; firing an empty slot is
/// the one no-op path.
#[derive(Clone, Default)]
pub struct CallbackSlot {
    callback: Option<Arc<CallbackFn>>,
}

impl CallbackSlot {
    /// Returns true if a callback is registered.
    pub fn is_set(&self) -> bool {
        self.callback.is_some()
    }

    /// Replace the callback. Returns true if one was already registered.
    pub fn set(&mut self, f: impl Fn(&IoDevices) -> anyhow::Result<()> + Send + Sync + 'static) -> bool {
        self.callback.replace(Arc::new(f)).is_some()
    }

    /// Empty the slot. Returns true if a callback was removed.
    pub fn clear(&mut self) -> bool {
        self.callback.take().is_some()
    }

    fn current(&self) -> Option<Arc<CallbackFn>> {
        self.callback.clone()
    }
}

impl fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("set", &self.is_set())
            .finish()
    }
}

/// Which host callback a device write triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    WindowSize,
    BufferReady,
}

impl Slot {
    fn role(self) -> DeviceRole {
        match self {
            Slot::WindowSize => DeviceRole::WindowSize,
            Slot::BufferReady => DeviceRole::BufferIndexDisplay,
        }
    }
}

/// The virtual device layer.
///
/// Always held in an `Arc`: hooks installed in the store refer back to it
/// weakly, so dropping the last `Arc` turns every hook into a no-op.
pub struct IoDevices {
    store: Arc<VirtualFileStore>,
    registry: DeviceRegistry,
    window_size_cb: RwLock<CallbackSlot>,
    buffer_ready_cb: RwLock<CallbackSlot>,
    flows: SharedDeviceFlowBus,
}

impl fmt::Debug for IoDevices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoDevices")
            .field("registry", &self.registry)
            .field("window_size_cb", &*self.window_size_cb.read())
            .field("buffer_ready_cb", &*self.buffer_ready_cb.read())
            .finish_non_exhaustive()
    }
}

impl IoDevices {
    /// Register the devices in `store` and wire their hooks.
    ///
    /// Fails with `Config` before touching the store if `config` does not
    /// validate, and without leaving any device behind if a path is taken.
    pub fn new(store: Arc<VirtualFileStore>, config: &DeviceConfig) -> DeviceResult<Arc<Self>> {
        config.validate()?;
        let layout = DeviceLayout::from_config(config);
        Self::with_layout(store, &layout, shared_device_flow_bus(config.event_capacity))
    }

    /// Register devices at explicit paths, publishing on `flows`.
    pub fn with_layout(
        store: Arc<VirtualFileStore>,
        layout: &DeviceLayout,
        flows: SharedDeviceFlowBus,
    ) -> DeviceResult<Arc<Self>> {
        let registry = DeviceRegistry::register(&store, layout)?;
        let devices = Arc::new(Self {
            store,
            registry,
            window_size_cb: RwLock::new(CallbackSlot::default()),
            buffer_ready_cb: RwLock::new(CallbackSlot::default()),
            flows,
        });
        devices.install_hooks(Arc::downgrade(&devices))?;

        tracing::info!(
            frame_buffer = %layout.frame_buffer,
            window_size = %layout.window_size,
            buffer_index_display = %layout.buffer_index_display,
            input = %layout.input,
            "io devices ready"
        );
        Ok(devices)
    }

    fn install_hooks(&self, weak: Weak<IoDevices>) -> DeviceResult<()> {
        let store = &self.store;

        let w = weak.clone();
        store.hook_write(self.handle(DeviceRole::WindowSize)?, move || {
            let Some(devices) = w.upgrade() else { return Ok(()) };
            let text = String::from_utf8_lossy(&devices.raw(DeviceRole::WindowSize)?).into_owned();
            devices.publish(DeviceFlow::WindowSizeWritten {
                path: devices.path(DeviceRole::WindowSize).to_string(),
                text,
            });
            devices.fire(Slot::WindowSize)
        })?;

        let w = weak.clone();
        store.hook_write(self.handle(DeviceRole::BufferIndexDisplay)?, move || {
            let Some(devices) = w.upgrade() else { return Ok(()) };
            devices.publish(DeviceFlow::BufferIndexDisplayed {
                path: devices.path(DeviceRole::BufferIndexDisplay).to_string(),
            });
            devices.fire(Slot::BufferReady)
        })?;

        let w = weak.clone();
        store.hook_write(self.handle(DeviceRole::FrameBuffer)?, move || {
            let Some(devices) = w.upgrade() else { return Ok(()) };
            let len = devices.store.len(devices.handle(DeviceRole::FrameBuffer)?)?;
            devices.publish(DeviceFlow::FrameBufferWritten {
                path: devices.path(DeviceRole::FrameBuffer).to_string(),
                len,
            });
            Ok(())
        })?;

        let w = weak.clone();
        store.hook_write(self.handle(DeviceRole::Input)?, move || {
            let Some(devices) = w.upgrade() else { return Ok(()) };
            let len = devices.store.len(devices.handle(DeviceRole::Input)?)?;
            devices.publish(DeviceFlow::InputWritten {
                path: devices.path(DeviceRole::Input).to_string(),
                len,
            });
            Ok(())
        })?;

        store.hook_read(self.handle(DeviceRole::Input)?, move || {
            let Some(devices) = weak.upgrade() else { return Ok(()) };
            devices.clear_input()?;
            Ok(())
        })?;

        Ok(())
    }

    fn slot(&self, slot: Slot) -> &RwLock<CallbackSlot> {
        match slot {
            Slot::WindowSize => &self.window_size_cb,
            Slot::BufferReady => &self.buffer_ready_cb,
        }
    }

    /// Run the callback in `slot`. The slot lock is released before the
    /// callback runs, so callbacks may replace slots.
    fn fire(&self, slot: Slot) -> anyhow::Result<()> {
        let Some(callback) = self.slot(slot).read().current() else {
            tracing::trace!(role = %slot.role(), "no callback registered");
            return Ok(());
        };
        callback(self).inspect_err(|e| {
            tracing::warn!(role = %slot.role(), error = %e, "device callback failed");
            self.publish(DeviceFlow::CallbackFailed {
                role: slot.role(),
                error: e.to_string(),
            });
        })
    }

    fn publish(&self, event: DeviceFlow) {
        tracing::debug!(subject = event.subject(), "device event");
        self.flows.publish(event);
    }

    /// Read raw content without going through any facade decoding.
    fn raw(&self, role: DeviceRole) -> DeviceResult<Vec<u8>> {
        Ok(self.store.read(self.handle(role)?)?)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The current framebuffer bytes, exactly as last written.
    pub fn frame_buffer(&self) -> DeviceResult<Vec<u8>> {
        self.raw(DeviceRole::FrameBuffer)
    }

    /// Decode the window-size device.
    pub fn window_size(&self) -> DeviceResult<WindowSize> {
        let bytes = self.raw(DeviceRole::WindowSize)?;
        WindowSize::from_bytes(&bytes).inspect_err(|e| {
            tracing::warn!(error = %e, "window size rejected");
        })
    }

    /// Empty the input device.
    pub fn clear_input(&self) -> DeviceResult<()> {
        let handle = self.handle(DeviceRole::Input)?;
        let len = self.store.len(handle)?;
        self.store.truncate(handle)?;
        self.publish(DeviceFlow::InputConsumed {
            path: self.path(DeviceRole::Input).to_string(),
            len,
        });
        Ok(())
    }

    /// Queue input for the guest, replacing anything not yet consumed.
    pub fn write_input(&self, bytes: &[u8]) -> DeviceResult<()> {
        self.store.write(self.handle(DeviceRole::Input)?, bytes)?;
        Ok(())
    }

    /// Consume pending input. The device is empty afterwards.
    pub fn read_input(&self) -> DeviceResult<Vec<u8>> {
        self.raw(DeviceRole::Input)
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    /// Called after every write to the window-size device.
    pub fn set_window_size_callback(
        &self,
        f: impl Fn(&IoDevices) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        if self.window_size_cb.write().set(f) {
            tracing::debug!("window size callback replaced");
        }
    }

    /// Called after every write to the buffer-index-display device.
    pub fn set_buffer_ready_callback(
        &self,
        f: impl Fn(&IoDevices) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        if self.buffer_ready_cb.write().set(f) {
            tracing::debug!("buffer ready callback replaced");
        }
    }

    /// Remove the window-size callback.
    pub fn clear_window_size_callback(&self) -> bool {
        self.window_size_cb.write().clear()
    }

    /// Remove the buffer-ready callback.
    pub fn clear_buffer_ready_callback(&self) -> bool {
        self.buffer_ready_cb.write().clear()
    }

    pub fn has_window_size_callback(&self) -> bool {
        self.window_size_cb.read().is_set()
    }

    pub fn has_buffer_ready_callback(&self) -> bool {
        self.buffer_ready_cb.read().is_set()
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    /// Handle the facade holds for a role.
    pub fn handle(&self, role: DeviceRole) -> DeviceResult<Handle> {
        self.registry.handle(role)
    }

    /// Path of a role. Every role is registered once construction succeeds.
    pub fn path(&self, role: DeviceRole) -> &str {
        self.registry.path(role).unwrap_or_default()
    }

    /// The registry of device files.
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The backing store, for guests that open device paths themselves.
    pub fn store(&self) -> &Arc<VirtualFileStore> {
        &self.store
    }

    /// The device event bus.
    pub fn flows(&self) -> &SharedDeviceFlowBus {
        &self.flows
    }

    /// Subscribe to device events matching `pattern` (e.g. `device.>`).
    pub fn subscribe(&self, pattern: &str) -> Subscription<DeviceFlow> {
        self.flows.subscribe(pattern)
    }

    /// Look up a role by name; fails with `UnknownDevice` for unknown names.
    pub fn role(&self, name: &str) -> DeviceResult<DeviceRole> {
        self.registry.lookup(name).map(|e| e.role)
    }
}
