//! In-crate fakes for deterministic tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use enigma_types::HealthData;
use parking_lot::Mutex;

use crate::error::{HealthError, TransportError};
use crate::health::HealthSource;
use crate::transport::{Connection, EventSink, Transport, TransportEvent};

#[derive(Debug, Default)]
pub(crate) struct FakeConnection {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl Connection for FakeConnection {
    fn send_text(&self, text: &str) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().push(text.to_string());
        true
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// One connection attempt made through [`FakeTransport`]. Drives the
/// server side of the link.
#[derive(Debug, Clone)]
pub(crate) struct FakeLink {
    url: String,
    sink: EventSink,
    conn: Arc<FakeConnection>,
}

impl FakeLink {
    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn open(&self) {
        self.sink.emit(TransportEvent::Open);
    }

    pub(crate) fn message(&self, text: &str) {
        self.sink.emit(TransportEvent::Message(text.to_string()));
    }

    pub(crate) fn close(&self) {
        self.sink.emit(TransportEvent::Closed);
    }

    pub(crate) fn error(&self, reason: &str) {
        self.sink.emit(TransportEvent::Error(reason.to_string()));
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.conn.sent.lock().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.conn.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    attempts: usize,
    failures: usize,
    open_immediately: bool,
    links: Vec<FakeLink>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    state: Mutex<FakeState>,
}

impl FakeTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `count` opens fail.
    pub(crate) fn fail_next_opens(&self, count: usize) {
        self.state.lock().failures = count;
    }

    /// Report `Open` from inside `open` itself.
    pub(crate) fn open_immediately(&self) {
        self.state.lock().open_immediately = true;
    }

    /// Number of `open` calls, failed ones included.
    pub(crate) fn attempts(&self) -> usize {
        self.state.lock().attempts
    }

    pub(crate) fn last(&self) -> FakeLink {
        self.state
            .lock()
            .links
            .last()
            .cloned()
            .expect("no connection attempted")
    }
}

impl Transport for FakeTransport {
    fn open(&self, url: &str, sink: EventSink) -> Result<Arc<dyn Connection>, TransportError> {
        let (link, immediate) = {
            let mut state = self.state.lock();
            state.attempts += 1;
            if state.failures > 0 {
                state.failures -= 1;
                return Err(TransportError::Unavailable("refused".to_string()));
            }

            let link = FakeLink {
                url: url.to_string(),
                sink,
                conn: Arc::new(FakeConnection::default()),
            };
            state.links.push(link.clone());
            (link, state.open_immediately)
        };

        if immediate {
            link.open();
        }
        Ok(link.conn)
    }
}

/// Health source returning a scripted sequence of results; repeats the last.
#[derive(Debug)]
pub(crate) struct FakeHealth {
    script: Mutex<Vec<Result<HealthData, String>>>,
    calls: Mutex<usize>,
    latency: Duration,
}

impl FakeHealth {
    pub(crate) fn new(script: Vec<Result<HealthData, String>>) -> Arc<Self> {
        Self::slow(script, Duration::ZERO)
    }

    /// Each fetch takes `latency` of (Tokio) time before answering.
    pub(crate) fn slow(script: Vec<Result<HealthData, String>>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: Mutex::new(0),
            latency,
        })
    }

    pub(crate) fn ok(status: &str) -> Result<HealthData, String> {
        Ok(HealthData {
            status: status.to_string(),
            ..HealthData::default()
        })
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl HealthSource for FakeHealth {
    async fn fetch(&self) -> Result<HealthData, HealthError> {
        let step = {
            let mut script = self.script.lock();
            *self.calls.lock() += 1;
            if script.len() > 1 {
                script.remove(0)
            } else {
                script
                    .first()
                    .cloned()
                    .unwrap_or_else(|| Err("empty script".to_string()))
            }
        };
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        step.map_err(HealthError::new)
    }
}
