//! Device layer on top of the virtual file store.
//!
//! - [`DeviceRole`] / [`DeviceLayout`] - which role lives at which path
//! - [`DeviceRegistry`] - the four device files, created and opened once
//! - [`IoDevices`] - host-facing facade with callbacks and accessors
//! - [`WindowSize`] - `<width>x<height>` decoding

mod error;
mod facade;
mod layout;
mod registry;
mod window_size;

pub use error::{DeviceError, DeviceResult};
pub use facade::{CallbackSlot, IoDevices};
pub use layout::{DeviceLayout, DeviceRole};
pub use registry::{DeviceEntry, DeviceRegistry};
pub use window_size::WindowSize;
