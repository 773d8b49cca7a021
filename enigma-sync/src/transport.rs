//! Streaming transport abstraction.
//!
//! The connection manager never touches a socket directly. It asks a
//! [`Transport`] to open a connection and hands it an [`EventSink`]; the
//! transport reports open, message, close and error events through the sink,
//! from whatever task or thread it runs on.

use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::error::TransportError;

/// Something that happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The handshake completed.
    Open,
    /// A text frame arrived.
    Message(String),
    /// The connection closed.
    Closed,
    /// The connection failed. Treated like a close.
    Error(String),
}

/// Callback target for transport events.
///
/// Each sink is bound to one connection attempt. Events from an attempt that
/// is no longer current are ignored by the receiver, so a transport may keep
/// emitting after it was closed without harm.
#[derive(Clone)]
pub struct EventSink {
    deliver: Arc<dyn Fn(TransportEvent) + Send + Sync>,
}

impl EventSink {
    /// Create a sink that forwards every event to `deliver`.
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Report an event.
    pub fn emit(&self, event: TransportEvent) {
        (self.deliver)(event)
    }
}

impl Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// A live (or pending) connection returned by [`Transport::open`].
pub trait Connection: Send + Sync + Debug {
    /// Send a text frame.
    ///
    /// Returns false if the connection is not open; the frame is dropped.
    fn send_text(&self, text: &str) -> bool;

    /// Close the connection. Must be idempotent.
    fn close(&self);
}

/// Factory for streaming connections.
pub trait Transport: Send + Sync + Debug {
    /// Start connecting to `url`, reporting progress through `sink`.
    ///
    /// May emit events on `sink` before returning. An `Err` means no
    /// connection attempt was started.
    fn open(&self, url: &str, sink: EventSink) -> Result<Arc<dyn Connection>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn sink_forwards_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let sink = EventSink::new(move |event| log.lock().push(event));

        sink.emit(TransportEvent::Open);
        sink.clone().emit(TransportEvent::Message("pong".to_string()));
        sink.emit(TransportEvent::Closed);

        assert_eq!(
            *seen.lock(),
            vec![
                TransportEvent::Open,
                TransportEvent::Message("pong".to_string()),
                TransportEvent::Closed,
            ]
        );
    }
}
