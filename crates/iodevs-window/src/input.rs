//! Input events carried through the input device.
//!
//! The input device replaces its content on every write, so the host sends
//! one batch per write and the guest decodes the batch it read. An empty
//! device decodes to an empty batch.

use serde::{Deserialize, Serialize};

use crate::error::WindowResult;

/// Mouse buttons, in DOM `MouseEvent.button` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// A single host input event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    KeyDown { code: u32 },
    KeyUp { code: u32 },
    MouseMove { x: i32, y: i32 },
    Click { x: i32, y: i32, button: MouseButton },
}

impl InputEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InputEvent::KeyDown { .. } => "key_down",
            InputEvent::KeyUp { .. } => "key_up",
            InputEvent::MouseMove { .. } => "mouse_move",
            InputEvent::Click { .. } => "click",
        }
    }
}

/// Encode a batch of events for one write to the input device.
pub fn encode_batch(events: &[InputEvent]) -> WindowResult<Vec<u8>> {
    Ok(postcard::to_stdvec(events)?)
}

/// Decode the bytes a guest read from the input device.
pub fn decode_batch(bytes: &[u8]) -> WindowResult<Vec<InputEvent>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(postcard::from_bytes(bytes)?)
}
