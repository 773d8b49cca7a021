//! WebSocket transport for the dashboard stream.
//!
//! Each [`Transport::open`] spawns one task that performs the handshake,
//! forwards inbound text frames to the event sink, and writes outbound
//! frames queued through the returned connection. Protocol-level ping/pong
//! is answered by the WebSocket layer; the text `ping`/`pong` keepalive is
//! ordinary frame traffic to this module.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use enigma_adapters::ws::WsTransport;
//! use enigma_sync::{ConnectionConfig, ConnectionManager, MergeStore, TokioScheduler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let scheduler = Arc::new(TokioScheduler::new());
//!     let store = MergeStore::new(scheduler.clone());
//!     let manager = ConnectionManager::new(
//!         ConnectionConfig::new("ws://localhost:8000/ws/dashboard"),
//!         Arc::new(WsTransport::new()),
//!         scheduler,
//!         store.clone(),
//!     );
//!
//!     manager.start();
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     println!("{} subjects", store.snapshot().len());
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use enigma_sync::{Connection, EventSink, Transport, TransportError, TransportEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use crate::AdapterError;

/// Opens WebSocket connections on a Tokio runtime.
#[derive(Debug, Clone)]
pub struct WsTransport {
    handle: Handle,
}

impl WsTransport {
    /// Create a transport that spawns onto the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str, sink: EventSink) -> Result<Arc<dyn Connection>, TransportError> {
        if !is_ws_url(url) {
            return Err(TransportError::InvalidEndpoint(url.to_string()));
        }

        let (outbound, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let conn = Arc::new(WsConnection {
            outbound,
            open: open.clone(),
        });

        self.handle.spawn(run(url.to_string(), sink, rx, open));
        Ok(conn)
    }
}

fn is_ws_url(url: &str) -> bool {
    ["ws://", "wss://"].iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

/// Handle to one WebSocket connection. Dropping it closes the socket.
#[derive(Debug)]
pub struct WsConnection {
    outbound: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl Connection for WsConnection {
    fn send_text(&self, text: &str) -> bool {
        if !self.open.load(Ordering::SeqCst) {
            return false;
        }
        self.outbound.send(Outbound::Text(text.to_string())).is_ok()
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Resolves once the connection handle asks to close or is dropped.
async fn close_requested(rx: &mut mpsc::UnboundedReceiver<Outbound>) {
    while let Some(Outbound::Text(_)) = rx.recv().await {}
}

async fn run(
    url: String,
    sink: EventSink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    open: Arc<AtomicBool>,
) {
    let stream = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => match result {
            Ok((stream, _)) => stream,
            Err(err) => {
                sink.emit(TransportEvent::Error(AdapterError::from(err).to_string()));
                return;
            }
        },
        _ = close_requested(&mut outbound) => {
            debug!(%url, "closed before handshake");
            return;
        }
    };

    open.store(true, Ordering::SeqCst);
    sink.emit(TransportEvent::Open);

    let (mut write, mut read) = stream.split();
    let end = loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    sink.emit(TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(_))) | None => break TransportEvent::Closed,
                Some(Ok(other)) => trace!(len = other.len(), "ignoring non-text frame"),
                Some(Err(err)) => break TransportEvent::Error(AdapterError::from(err).to_string()),
            },
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(err) = write.send(Message::text(text)).await {
                        break TransportEvent::Error(AdapterError::from(err).to_string());
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break TransportEvent::Closed;
                }
            },
        }
    };

    open.store(false, Ordering::SeqCst);
    sink.emit(end);
}
