//! FlowBus pub/sub for device events.
//!
//! Every hooked device operation publishes a [`DeviceFlow`] so hosts can
//! observe the device layer without installing callbacks of their own.
//! Subscribers filter with NATS-style subject patterns.
//!
//! # Pattern Matching
//!
//! Patterns use dot-separated tokens with wildcards:
//! - `*` matches exactly one token: `device.input.*` matches `device.input.written`
//! - `>` matches one or more tokens (only at end): `device.>` matches every device event
//! - Exact match: `device.display.ready` only matches `device.display.ready`
//!
//! # Example
//!
//! ```ignore
//! let bus = FlowBus::<DeviceFlow>::new(256);
//! let mut sub = bus.subscribe("device.input.*");
//! bus.publish(DeviceFlow::InputWritten { path: "/dev/input".into(), len: 4 });
//! while let Some(msg) = sub.try_recv() {
//!     println!("{}", msg.subject);
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::devices::DeviceRole;

// ============================================================================
// Pattern Matching
// ============================================================================

/// Check if a subject matches a pattern.
///
/// `*` stands for exactly one token, `>` for one or more trailing tokens
/// and is only valid as the last token of the pattern.
pub fn matches_pattern(pattern: &str, subject: &str) -> bool {
    let mut wanted = pattern.split('.').peekable();
    let mut subject = subject.split('.');

    while let Some(want) = wanted.next() {
        match (want, subject.next()) {
            (_, None) => return false,
            (">", Some(_)) => return wanted.peek().is_none(),
            ("*", Some(_)) => {}
            (want, Some(got)) if want == got => {}
            _ => return false,
        }
    }
    subject.next().is_none()
}

// ============================================================================
// Flow Messages
// ============================================================================

/// Payloads that know the subject they publish under.
pub trait HasSubject {
    fn subject(&self) -> &str;
}

/// A published event with its bus-assigned sequence number.
#[derive(Clone, Debug)]
pub struct FlowMessage<T> {
    /// Subject derived from the payload.
    pub subject: String,
    pub payload: T,
    /// Position in the bus's publish order, starting at 0. Gaps seen by a
    /// subscriber mean it lagged or filtered those events out.
    pub seq: u64,
    pub timestamp: Instant,
}

impl<T: HasSubject> FlowMessage<T> {
    fn new(payload: T, seq: u64) -> Self {
        Self {
            subject: payload.subject().to_string(),
            payload,
            seq,
            timestamp: Instant::now(),
        }
    }
}

// ============================================================================
// Device Flow Events
// ============================================================================

/// Device-level events, published after the triggering operation commits
/// and before any host callback runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceFlow {
    /// New pixels landed in the framebuffer.
    FrameBufferWritten {
        path: String,
        len: usize,
    },

    /// The guest wrote a window size. `text` is the raw content, unparsed.
    WindowSizeWritten {
        path: String,
        text: String,
    },

    /// The guest asked for the current framebuffer to be shown.
    BufferIndexDisplayed {
        path: String,
    },

    /// The host queued input for the guest.
    InputWritten {
        path: String,
        len: usize,
    },

    /// The guest consumed pending input; the device is now empty.
    InputConsumed {
        path: String,
        len: usize,
    },

    /// A host callback returned an error. The error is also returned to
    /// the writer.
    CallbackFailed {
        role: DeviceRole,
        error: String,
    },
}

impl DeviceFlow {
    /// Get the subject string for this event.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::FrameBufferWritten { .. } => "device.fb.written",
            Self::WindowSizeWritten { .. } => "device.size.written",
            Self::BufferIndexDisplayed { .. } => "device.display.ready",
            Self::InputWritten { .. } => "device.input.written",
            Self::InputConsumed { .. } => "device.input.consumed",
            Self::CallbackFailed { .. } => "device.callback.failed",
        }
    }

    /// The device path involved, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::FrameBufferWritten { path, .. }
            | Self::WindowSizeWritten { path, .. }
            | Self::BufferIndexDisplayed { path }
            | Self::InputWritten { path, .. }
            | Self::InputConsumed { path, .. } => Some(path),
            Self::CallbackFailed { .. } => None,
        }
    }
}

impl HasSubject for DeviceFlow {
    fn subject(&self) -> &str {
        DeviceFlow::subject(self)
    }
}

// ============================================================================
// FlowBus
// ============================================================================

/// Smallest channel a bus is built with; broadcast channels need room for
/// at least one message.
pub const MIN_FLOW_CAPACITY: usize = 1;

/// Pub/sub bus over a broadcast channel. Each subscriber filters by its
/// own pattern; publishing never blocks and never fails.
#[derive(Debug)]
pub struct FlowBus<T: Clone + Send + 'static> {
    tx: broadcast::Sender<FlowMessage<T>>,
    capacity: usize,
    next_seq: AtomicU64,
}

impl<T: Clone + Send + 'static> FlowBus<T> {
    /// Create a bus holding up to `capacity` unread messages per subscriber.
    /// A capacity below [`MIN_FLOW_CAPACITY`] is raised to it.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_FLOW_CAPACITY);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            capacity,
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Number of messages published so far.
    pub fn published(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed)
    }
}

impl<T: Clone + Send + HasSubject + 'static> FlowBus<T> {
    /// Publish `payload`, returning how many subscribers were reached.
    pub fn publish(&self, payload: T) -> usize {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.tx.send(FlowMessage::new(payload, seq)).unwrap_or(0)
    }

    /// Subscribe to messages whose subject matches `pattern`.
    pub fn subscribe(&self, pattern: &str) -> Subscription<T> {
        Subscription {
            pattern: pattern.to_string(),
            rx: self.tx.subscribe(),
            lagged: 0,
        }
    }
}

/// Shared bus for device events.
pub type SharedDeviceFlowBus = Arc<FlowBus<DeviceFlow>>;

/// Create a shared device flow bus.
pub fn shared_device_flow_bus(capacity: usize) -> SharedDeviceFlowBus {
    Arc::new(FlowBus::new(capacity))
}

// ============================================================================
// Subscription
// ============================================================================

/// A pattern-filtered view of a [`FlowBus`].
pub struct Subscription<T: Clone> {
    pattern: String,
    rx: broadcast::Receiver<FlowMessage<T>>,
    lagged: u64,
}

impl<T: Clone> Subscription<T> {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Total messages this subscription lost by falling behind the bus.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    fn note_lag(&mut self, n: u64) {
        self.lagged += n;
        tracing::warn!(pattern = %self.pattern, lagged = n, "device event subscription lagged");
    }

    /// Wait for the next matching message. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<FlowMessage<T>> {
        loop {
            match self.rx.recv().await {
                Ok(msg) if matches_pattern(&self.pattern, &msg.subject) => return Some(msg),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => self.note_lag(n),
            }
        }
    }

    /// Next matching message already queued, if any.
    pub fn try_recv(&mut self) -> Option<FlowMessage<T>> {
        loop {
            match self.rx.try_recv() {
                Ok(msg) if matches_pattern(&self.pattern, &msg.subject) => return Some(msg),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                    return None;
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => self.note_lag(n),
            }
        }
    }

    /// Every matching message currently queued.
    pub fn drain(&mut self) -> Vec<FlowMessage<T>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl Subscription<DeviceFlow> {
    /// Drain queued events that concern the device at `path`. Events for
    /// other devices are consumed and dropped.
    pub fn drain_path(&mut self, path: &str) -> Vec<DeviceFlow> {
        self.drain()
            .into_iter()
            .map(|msg| msg.payload)
            .filter(|event| event.path() == Some(path))
            .collect()
    }
}

impl<T: Clone> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pattern", &self.pattern)
            .field("lagged", &self.lagged)
            .finish_non_exhaustive()
    }
}
