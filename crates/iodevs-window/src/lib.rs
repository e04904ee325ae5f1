//! Host side of the iodevs device layer.
//!
//! [`HostWindow`] mirrors the window-size and buffer-index-display devices
//! into an in-memory popup with an RGBA canvas, and turns [`InputEvent`]s
//! into writes on the input device.

pub mod error;
pub mod input;
pub mod window;

pub use error::{WindowError, WindowResult};
pub use input::{InputEvent, MouseButton, decode_batch, encode_batch};
pub use window::{HostWindow, MAX_CANVAS_BYTES, Popup};
