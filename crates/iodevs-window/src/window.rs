//! In-memory host window mirroring the device files.
//!
//! [`HostWindow::attach`] claims both facade callbacks. A visible size opens
//! the popup or resizes it, `0x0` closes it, and each buffer-ready write
//! copies the framebuffer into the canvas.

use std::sync::Arc;

use parking_lot::Mutex;

use iodevs_kernel::{DeviceError, IoDevices, WindowSize};

use crate::error::{WindowError, WindowResult};
use crate::input::{InputEvent, encode_batch};

/// Largest canvas a guest may ask for: 8192x8192 RGBA.
pub const MAX_CANVAS_BYTES: usize = 8192 * 8192 * 4;

/// Canvas length for `size`, if it is within [`MAX_CANVAS_BYTES`].
fn canvas_len(size: WindowSize) -> Option<usize> {
    size.rgba_len().filter(|len| *len <= MAX_CANVAS_BYTES)
}

/// An open popup and its RGBA canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub size: WindowSize,
    pub canvas: Vec<u8>,
    pub frames_drawn: u64,
}

impl Popup {
    fn new(size: WindowSize, len: usize) -> Self {
        Self {
            size,
            canvas: vec![0; len],
            frames_drawn: 0,
        }
    }
}

#[derive(Debug, Default)]
struct WindowState {
    popup: Option<Popup>,
    last_size: Option<WindowSize>,
}

impl WindowState {
    /// Apply a well-formed size. Sizes too large for a canvas are treated
    /// like malformed ones: logged, and the last good size stays.
    fn resize(&mut self, size: WindowSize) {
        if !size.is_visible() {
            self.last_size = Some(size);
            if self.popup.take().is_some() {
                tracing::info!("window closed");
            }
            return;
        }

        let Some(len) = canvas_len(size) else {
            tracing::warn!(
                %size,
                max_bytes = MAX_CANVAS_BYTES,
                kept = ?self.last_size,
                "ignoring oversized window size"
            );
            return;
        };
        self.last_size = Some(size);

        match &mut self.popup {
            Some(popup) if popup.size == size => {}
            Some(popup) => {
                tracing::debug!(from = %popup.size, to = %size, "window resized");
                popup.size = size;
                popup.canvas = vec![0; len];
            }
            None => {
                tracing::info!(%size, "window opened");
                self.popup = Some(Popup::new(size, len));
            }
        }
    }

    /// `ImageData.set` semantics: a short frame overwrites a prefix.
    fn draw(&mut self, frame: &[u8]) -> WindowResult<()> {
        let popup = self.popup.as_mut().ok_or(WindowError::NoWindow)?;
        let capacity = popup.canvas.len();
        if frame.len() > capacity {
            return Err(WindowError::FrameTooLarge {
                len: frame.len(),
                capacity,
            });
        }
        popup.canvas[..frame.len()].copy_from_slice(frame);
        popup.frames_drawn += 1;
        tracing::trace!(len = frame.len(), frame = popup.frames_drawn, "frame drawn");
        Ok(())
    }
}

/// Host-side window driven by device callbacks.
#[derive(Debug, Clone)]
pub struct HostWindow {
    devices: Arc<IoDevices>,
    state: Arc<Mutex<WindowState>>,
}

impl HostWindow {
    /// Register this window's callbacks on `devices`, replacing any others.
    pub fn attach(devices: &Arc<IoDevices>) -> Self {
        let state = Arc::new(Mutex::new(WindowState::default()));

        let s = Arc::clone(&state);
        devices.set_window_size_callback(move |d| {
            match d.window_size() {
                Ok(size) => s.lock().resize(size),
                Err(DeviceError::MalformedSize(text)) => {
                    tracing::warn!(
                        size = %text,
                        kept = ?s.lock().last_size,
                        "ignoring malformed window size"
                    );
                }
                Err(e) => return Err(e.into()),
            }
            Ok(())
        });

        let s = Arc::clone(&state);
        devices.set_buffer_ready_callback(move |d| {
            let frame = d.frame_buffer()?;
            s.lock().draw(&frame)?;
            Ok(())
        });

        Self {
            devices: Arc::clone(devices),
            state,
        }
    }

    /// Encode `events` and hand them to the guest in one input write.
    pub fn send_input(&self, events: &[InputEvent]) -> WindowResult<()> {
        let bytes = encode_batch(events)?;
        tracing::debug!(events = events.len(), bytes = bytes.len(), "input queued");
        self.devices.write_input(&bytes)?;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().popup.is_some()
    }

    /// Size of the open popup.
    pub fn size(&self) -> Option<WindowSize> {
        self.state.lock().popup.as_ref().map(|p| p.size)
    }

    /// Last size the window applied, including `0x0`.
    pub fn last_size(&self) -> Option<WindowSize> {
        self.state.lock().last_size
    }

    /// Copy of the open popup.
    pub fn popup(&self) -> Option<Popup> {
        self.state.lock().popup.clone()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.state.lock().popup.as_ref().map_or(0, |p| p.frames_drawn)
    }

    pub fn devices(&self) -> &Arc<IoDevices> {
        &self.devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_lifecycle() {
        let mut state = WindowState::default();
        state.resize(WindowSize::new(2, 2));
        assert_eq!(state.popup.as_ref().unwrap().canvas.len(), 16);

        state.resize(WindowSize::new(3, 1));
        let popup = state.popup.as_ref().unwrap();
        assert_eq!(popup.size, WindowSize::new(3, 1));
        assert_eq!(popup.canvas.len(), 12);

        state.resize(WindowSize::new(0, 0));
        assert!(state.popup.is_none());
        assert_eq!(state.last_size, Some(WindowSize::new(0, 0)));
    }

    #[test]
    fn test_same_size_keeps_canvas() {
        let mut state = WindowState::default();
        state.resize(WindowSize::new(1, 1));
        state.draw(&[9, 9, 9, 9]).unwrap();
        state.resize(WindowSize::new(1, 1));
        assert_eq!(state.popup.as_ref().unwrap().canvas, vec![9, 9, 9, 9]);
    }

    #[test]
    fn test_draw_prefix_and_overflow() {
        let mut state = WindowState::default();
        assert!(matches!(state.draw(&[1]), Err(WindowError::NoWindow)));

        state.resize(WindowSize::new(2, 1));
        state.draw(&[1, 2, 3, 4]).unwrap();
        assert_eq!(state.popup.as_ref().unwrap().canvas, vec![1, 2, 3, 4, 0, 0, 0, 0]);

        let err = state.draw(&[0; 9]).unwrap_err();
        assert!(matches!(err, WindowError::FrameTooLarge { len: 9, capacity: 8 }));
        assert_eq!(state.popup.as_ref().unwrap().frames_drawn, 1);
    }

    #[test]
    fn test_oversized_size_keeps_last_good() {
        let mut state = WindowState::default();
        state.resize(WindowSize::new(2, 2));

        state.resize(WindowSize::new(u32::MAX, u32::MAX));
        state.resize(WindowSize::new(70_000, 70_000));
        state.resize(WindowSize::new(8193, 8192));

        assert_eq!(state.last_size, Some(WindowSize::new(2, 2)));
        assert_eq!(state.popup.as_ref().unwrap().canvas.len(), 16);
    }

    #[test]
    fn test_canvas_limit_is_inclusive() {
        assert_eq!(canvas_len(WindowSize::new(8192, 8192)), Some(MAX_CANVAS_BYTES));
        assert_eq!(canvas_len(WindowSize::new(8192, 8193)), None);
    }

    #[test]
    fn test_zero_width_closes() {
        let mut state = WindowState::default();
        state.resize(WindowSize::new(4, 4));
        state.resize(WindowSize::new(0, 4));
        assert!(state.popup.is_none());
    }
}
