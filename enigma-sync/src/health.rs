//! Periodic out-of-band health polling.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use enigma_types::HealthData;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::HealthError;

/// Default interval between health polls.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Fetches a point-in-time status object.
#[async_trait]
pub trait HealthSource: Send + Sync + Debug {
    async fn fetch(&self) -> Result<HealthData, HealthError>;
}

/// Last known-good health result.
///
/// All fields are `None` until the first successful poll; failed polls
/// leave the previous values in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub health: Option<HealthData>,
    /// Round-trip time of the poll that produced `health`.
    pub latency_ms: Option<u64>,
    /// Unix time (ms) at which `health` was received.
    pub last_update_ms: Option<u64>,
}

/// Polls a [`HealthSource`] and publishes the result.
///
/// Cheap to clone; clones publish to the same channel.
#[derive(Debug, Clone)]
pub struct HealthPoller {
    source: Arc<dyn HealthSource>,
    interval: Duration,
    snapshot: Arc<watch::Sender<HealthSnapshot>>,
}

impl HealthPoller {
    pub fn new(source: Arc<dyn HealthSource>, interval: Duration) -> Self {
        let (snapshot, _) = watch::channel(HealthSnapshot::default());
        Self {
            source,
            interval,
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll once and publish on success. Returns whether the poll succeeded.
    pub async fn poll_once(&self) -> bool {
        match self.measure().await {
            Some(snapshot) => {
                self.snapshot.send_replace(snapshot);
                true
            }
            None => false,
        }
    }

    async fn measure(&self) -> Option<HealthSnapshot> {
        let started = Instant::now();
        match self.source.fetch().await {
            Ok(health) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                debug!(status = %health.status, latency_ms, "health polled");
                Some(HealthSnapshot {
                    health: Some(health),
                    latency_ms: Some(latency_ms),
                    last_update_ms: Some(unix_millis()),
                })
            }
            Err(err) => {
                warn!(error = %err, "health poll failed");
                None
            }
        }
    }

    /// The last published snapshot.
    pub fn snapshot(&self) -> HealthSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthSnapshot> {
        self.snapshot.subscribe()
    }

    /// Spawn the polling loop: one poll immediately, then one per interval.
    ///
    /// Must be called from within a Tokio runtime. The loop ends when the
    /// returned handle is stopped or dropped; a poll still in flight at that
    /// point is abandoned without publishing.
    pub fn start(&self) -> PollerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let poller = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = tokio::select! {
                            outcome = poller.measure() => outcome,
                            _ = stop_rx.changed() => break,
                        };
                        if *stop_rx.borrow() {
                            break;
                        }
                        if let Some(snapshot) = outcome {
                            poller.snapshot.send_replace(snapshot);
                        }
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("health poller stopped");
        });

        PollerHandle { stop_tx }
    }
}

/// Handle for a running poll loop.
///
/// Drop this handle to stop polling, or call `stop()` explicitly.
#[derive(Debug)]
pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
}

impl PollerHandle {
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
