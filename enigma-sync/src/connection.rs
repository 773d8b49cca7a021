//! Connection lifecycle: open, keepalive, reconnect with backoff.
//!
//! The manager keeps at most one live transport. Every attempt gets a new
//! generation number and the event sink handed to the transport is bound to
//! it, so events from a replaced or stopped transport are ignored.

use std::sync::{Arc, Weak};
use std::time::Duration;

use enigma_types::ConnectionState;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::frame::{self, Frame, PING};
use crate::scheduler::{Scheduler, TimerId};
use crate::store::MergeStore;
use crate::transport::{Connection, EventSink, Transport, TransportEvent};

/// Default interval between keepalive probes.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// Exponential reconnect delay: `min(base * 2^attempt, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before the reconnect that follows failure number `attempt`
    /// (counting from zero).
    pub fn delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(30_000))
    }
}

/// Upgrade a `ws://` endpoint to `wss://` when running in a secure context.
///
/// ```rust
/// use enigma_sync::resolve_stream_url;
///
/// assert_eq!(resolve_stream_url("ws://host/ws", true), "wss://host/ws");
/// assert_eq!(resolve_stream_url("ws://host/ws", false), "ws://host/ws");
/// assert_eq!(resolve_stream_url("wss://host/ws", true), "wss://host/ws");
/// ```
pub fn resolve_stream_url(raw: &str, secure_context: bool) -> String {
    const INSECURE: &str = "ws://";

    match raw.get(..INSECURE.len()) {
        Some(scheme) if secure_context && scheme.eq_ignore_ascii_case(INSECURE) => {
            format!("wss://{}", &raw[INSECURE.len()..])
        }
        _ => raw.to_string(),
    }
}

/// Settings for a [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Streaming endpoint, before any scheme upgrade.
    pub url: String,
    /// Whether the embedding context is secure (forces `wss://`).
    pub secure_context: bool,
    pub keepalive: Duration,
    pub backoff: Backoff,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            secure_context: false,
            keepalive: DEFAULT_KEEPALIVE,
            backoff: Backoff::default(),
        }
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub is_connected: bool,
}

impl From<ConnectionState> for ConnectionStatus {
    fn from(state: ConnectionState) -> Self {
        Self {
            state,
            is_connected: state.is_connected(),
        }
    }
}

#[derive(Debug, Default)]
struct LinkState {
    running: bool,
    generation: u64,
    attempt: u32,
    active: Option<Arc<dyn Connection>>,
    keepalive: Option<TimerId>,
    reconnect: Option<TimerId>,
    state: ConnectionState,
}

impl LinkState {
    fn is_current(&self, generation: u64) -> bool {
        self.running && self.generation == generation
    }
}

struct ManagerInner {
    url: String,
    keepalive: Duration,
    backoff: Backoff,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    store: MergeStore,
    link: Mutex<LinkState>,
    status: watch::Sender<ConnectionStatus>,
}

impl ManagerInner {
    fn connect(self: &Arc<Self>) {
        let generation = {
            let mut link = self.link.lock();
            if !link.running {
                return;
            }
            link.generation += 1;
            link.reconnect = None;
            link.generation
        };

        debug!(url = %self.url, generation, "opening stream");
        // Called without the link lock: a transport may report events before
        // `open` returns.
        match self.transport.open(&self.url, self.sink(generation)) {
            Ok(conn) => {
                let mut link = self.link.lock();
                if link.is_current(generation) {
                    link.active = Some(conn);
                } else {
                    drop(link);
                    conn.close();
                }
            }
            Err(err) => {
                warn!(url = %self.url, error = %err, "failed to open stream");
                self.fail(generation);
            }
        }
    }

    fn sink(self: &Arc<Self>, generation: u64) -> EventSink {
        let weak = Arc::downgrade(self);
        EventSink::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle(generation, event);
            }
        })
    }

    fn handle(self: &Arc<Self>, generation: u64, event: TransportEvent) {
        match event {
            TransportEvent::Open => self.on_open(generation),
            TransportEvent::Message(text) => self.on_message(generation, &text),
            TransportEvent::Closed => self.fail(generation),
            TransportEvent::Error(err) => {
                if self.link.lock().is_current(generation) {
                    warn!(error = %err, "stream error");
                }
                self.fail(generation);
            }
        }
    }

    fn on_open(self: &Arc<Self>, generation: u64) {
        let mut link = self.link.lock();
        if !link.is_current(generation) {
            return;
        }

        link.attempt = 0;
        if let Some(id) = link.keepalive.take() {
            self.scheduler.cancel(id);
        }
        link.keepalive = Some(self.schedule_keepalive(generation));
        link.state = ConnectionState::Connected;
        self.publish(&link);

        info!(url = %self.url, "stream connected");
    }

    fn on_message(&self, generation: u64, text: &str) {
        let frame = frame::decode(text);

        let link = self.link.lock();
        if !link.is_current(generation) {
            return;
        }

        match frame {
            Frame::Pong => trace!("pong"),
            Frame::Record(record) => self.store.apply(record),
            Frame::Discarded(reason) => debug!(%reason, "discarding frame"),
        }
    }

    /// Close or error on the transport of `generation`, or a failed open.
    fn fail(self: &Arc<Self>, generation: u64) {
        let stale = {
            let mut link = self.link.lock();
            if !link.is_current(generation) {
                return;
            }

            link.generation += 1;
            if let Some(id) = link.keepalive.take() {
                self.scheduler.cancel(id);
            }

            let delay = self.backoff.delay(link.attempt);
            let weak = Arc::downgrade(self);
            let expected = link.generation;
            link.reconnect = Some(self.scheduler.schedule(
                delay,
                Box::new(move || reconnect(weak, expected)),
            ));

            if link.state != ConnectionState::Reconnecting {
                warn!(url = %self.url, "stream disconnected");
            }
            link.state = ConnectionState::Reconnecting;
            self.publish(&link);

            debug!(attempt = link.attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
            link.active.take()
        };

        if let Some(conn) = stale {
            conn.close();
        }
    }

    fn schedule_keepalive(self: &Arc<Self>, generation: u64) -> TimerId {
        let weak = Arc::downgrade(self);
        self.scheduler.schedule(
            self.keepalive,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.keepalive_tick(generation);
                }
            }),
        )
    }

    fn keepalive_tick(self: &Arc<Self>, generation: u64) {
        let conn = {
            let mut link = self.link.lock();
            if !link.is_current(generation) {
                return;
            }
            link.keepalive = Some(self.schedule_keepalive(generation));
            link.active.clone()
        };

        if let Some(conn) = conn {
            if !conn.send_text(PING) {
                debug!("keepalive probe dropped");
            }
        }
    }

    fn stop(&self) {
        let conn = {
            let mut link = self.link.lock();
            link.running = false;
            link.generation += 1;
            for id in [link.keepalive.take(), link.reconnect.take()].into_iter().flatten() {
                self.scheduler.cancel(id);
            }
            link.state = ConnectionState::Disconnected;
            self.publish(&link);
            link.active.take()
        };

        if let Some(conn) = conn {
            conn.close();
            info!(url = %self.url, "stream stopped");
        }
    }

    fn publish(&self, link: &LinkState) {
        let next = ConnectionStatus::from(link.state);
        self.status.send_if_modified(|status| {
            if *status == next {
                return false;
            }
            *status = next;
            true
        });
    }
}

fn reconnect(weak: Weak<ManagerInner>, expected: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    {
        let mut link = inner.link.lock();
        if !link.is_current(expected) {
            return;
        }
        link.attempt = link.attempt.saturating_add(1);
    }
    inner.connect();
}

/// Owns the streaming transport and feeds decoded records into a
/// [`MergeStore`].
///
/// Failures never surface as errors: they show up only as
/// [`ConnectionState::Reconnecting`] while the manager retries with
/// exponential backoff, indefinitely, until [`stop`](Self::stop).
///
/// Dropping the manager stops it.
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        store: MergeStore,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());

        Self {
            inner: Arc::new(ManagerInner {
                url: resolve_stream_url(&config.url, config.secure_context),
                keepalive: config.keepalive,
                backoff: config.backoff,
                transport,
                scheduler,
                store,
                link: Mutex::new(LinkState::default()),
                status,
            }),
        }
    }

    /// Start connecting. Does nothing if already started.
    pub fn start(&self) {
        {
            let mut link = self.inner.link.lock();
            if link.running {
                return;
            }
            link.running = true;
            link.attempt = 0;
        }
        self.inner.connect();
    }

    /// Stop: cancel every timer, close the transport, and stay
    /// disconnected until the next [`start`](Self::start).
    ///
    /// Safe to call in any state, any number of times.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// The current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    /// Subscribe to connection status changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// The endpoint actually dialed, after any scheme upgrade.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Consecutive failed cycles since the last successful open.
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.link.lock().attempt
    }

    pub fn is_running(&self) -> bool {
        self.inner.link.lock().running
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.url)
            .field("status", &self.status())
            .finish()
    }
}
