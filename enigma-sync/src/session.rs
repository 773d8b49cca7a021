//! Session: one store, one connection, one health poller.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::connection::{Backoff, ConnectionConfig, ConnectionManager, ConnectionStatus, DEFAULT_KEEPALIVE};
use crate::freshness::DEFAULT_FRESHNESS_WINDOW;
use crate::health::{HealthPoller, HealthSnapshot, HealthSource, PollerHandle, DEFAULT_HEALTH_INTERVAL};
use crate::scheduler::Scheduler;
use crate::store::{MergeStore, StoreSnapshot, DEFAULT_FEED_CAPACITY};
use crate::transport::Transport;

/// Default streaming endpoint.
pub const DEFAULT_STREAM_URL: &str = "ws://localhost:8000/ws/dashboard";

/// Everything needed to build a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub stream_url: String,
    pub secure_context: bool,
    pub keepalive: Duration,
    pub backoff: Backoff,
    pub feed_capacity: usize,
    pub freshness_window: Duration,
    pub health_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            secure_context: false,
            keepalive: DEFAULT_KEEPALIVE,
            backoff: Backoff::default(),
            feed_capacity: DEFAULT_FEED_CAPACITY,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }
}

/// Combined view of a session at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub connection: ConnectionStatus,
    pub store: StoreSnapshot,
    pub health: HealthSnapshot,
}

/// A client session against one backend.
///
/// Owns the merge store and everything that mutates it. Consumers read
/// through [`snapshot`](Self::snapshot) or the `subscribe_*` channels.
///
/// # Example
///
/// ```rust,ignore
/// let session = Session::new(config, transport, health, Arc::new(TokioScheduler::new()));
/// session.start();
///
/// let mut updates = session.subscribe_store();
/// while updates.changed().await.is_ok() {
///     let snapshot = updates.borrow().clone();
///     println!("{} subjects", snapshot.len());
/// }
/// ```
#[derive(Debug)]
pub struct Session {
    store: MergeStore,
    connection: ConnectionManager,
    health: HealthPoller,
    poller: Mutex<Option<PollerHandle>>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        health: Arc<dyn HealthSource>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let store = MergeStore::builder()
            .capacity(config.feed_capacity)
            .freshness_window(config.freshness_window)
            .build(scheduler.clone());

        let connection = ConnectionManager::new(
            ConnectionConfig {
                url: config.stream_url,
                secure_context: config.secure_context,
                keepalive: config.keepalive,
                backoff: config.backoff,
            },
            transport,
            scheduler,
            store.clone(),
        );

        Self {
            store,
            connection,
            health: HealthPoller::new(health, config.health_interval),
            poller: Mutex::new(None),
        }
    }

    /// Start streaming and health polling. Does nothing if already started.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut poller = self.poller.lock();
        if poller.is_none() {
            info!(url = %self.connection.url(), "starting session");
            *poller = Some(self.health.start());
        }
        self.connection.start();
    }

    /// Stop streaming and polling. Store contents are kept.
    pub fn stop(&self) {
        self.connection.stop();
        if let Some(handle) = self.poller.lock().take() {
            handle.stop();
        }
    }

    /// Full teardown: stop, cancel every freshness timer and empty the store.
    pub fn shutdown(&self) {
        self.stop();
        self.store.reset();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection: self.connection.status(),
            store: self.store.snapshot(),
            health: self.health.snapshot(),
        }
    }

    pub fn store(&self) -> &MergeStore {
        &self.store
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn health(&self) -> &HealthPoller {
        &self.health
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe()
    }

    pub fn subscribe_store(&self) -> watch::Receiver<StoreSnapshot> {
        self.store.subscribe()
    }

    pub fn subscribe_health(&self) -> watch::Receiver<HealthSnapshot> {
        self.health.subscribe()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
