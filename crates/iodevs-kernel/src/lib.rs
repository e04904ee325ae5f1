//! # iodevs-kernel
//!
//! A virtual device filesystem. A guest sees ordinary files; writing to
//! them drives device behavior on the host:
//!
//! - `/dev/wasmerfb0` holds raw RGBA framebuffer bytes
//! - `/sys/class/graphics/wasmerfb0/virtual_size` holds `<width>x<height>`
//! - `/sys/class/graphics/wasmerfb0/buffer_index_display` triggers a repaint
//! - `/dev/input` carries input events and empties once read
//!
//! Side effects are hooks on the store, run synchronously after the
//! operation that triggers them. Hosts react through two callbacks on
//! [`IoDevices`] or by subscribing to [`DeviceFlow`] events.

pub mod config;
pub mod devices;
pub mod flows;
pub mod vfs;

pub use config::{ConfigError, DeviceConfig};
pub use devices::{
    CallbackSlot, DeviceEntry, DeviceError, DeviceLayout, DeviceRegistry, DeviceResult,
    DeviceRole, IoDevices, WindowSize,
};
pub use flows::{
    DeviceFlow, FlowBus, FlowMessage, HasSubject, MIN_FLOW_CAPACITY, SharedDeviceFlowBus, Subscription,
    matches_pattern, shared_device_flow_bus,
};
pub use vfs::{FileStat, Handle, Hook, OpenMode, Operation, VfsError, VfsResult, VirtualFileStore};
