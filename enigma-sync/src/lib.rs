//! # enigma-sync
//!
//! Streaming state synchronization for the Enigma dashboard.
//!
//! A [`Session`] keeps one streaming connection to the analysis backend,
//! decodes inbound frames, and merges analysis records into a
//! [`MergeStore`]: the latest record per subject, a bounded most-recent-first
//! feed, and a short-lived "fresh" marker per subject. Disconnects are
//! recovered with exponential backoff and surface only as a state change.
//!
//! Networking and timers sit behind traits ([`Transport`], [`HealthSource`],
//! [`Scheduler`]), so the whole engine can be driven deterministically in
//! tests. Concrete WebSocket and HTTP collaborators live in
//! `enigma-adapters`.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use enigma_sync::{decode, Frame, ManualScheduler, MergeStore};
//!
//! let store = MergeStore::new(Arc::new(ManualScheduler::new()));
//!
//! let raw = r#"{"type":"situation_analysis","situation":{"situation_id":"abc"}}"#;
//! if let Frame::Record(record) = decode(raw) {
//!     store.apply(record);
//! }
//!
//! let snapshot = store.snapshot();
//! assert_eq!(snapshot.len(), 1);
//! assert!(snapshot.is_fresh("abc"));
//! ```
//!
//! ## Features
//!
//! - **Atomic snapshots**: map, feed and freshness change together
//! - **Bounded memory**: the feed is capped (200 entries by default)
//! - **Self-healing**: indefinite reconnects with capped exponential backoff
//! - **Testable time**: inject a [`ManualScheduler`] to drive timers by hand

mod connection;
mod error;
mod frame;
mod freshness;
mod health;
mod scheduler;
mod session;
mod store;
mod transport;

#[cfg(test)]
mod testing;

pub use connection::{
    resolve_stream_url, Backoff, ConnectionConfig, ConnectionManager, ConnectionStatus,
    DEFAULT_KEEPALIVE,
};
pub use error::{HealthError, TransportError};
pub use frame::{decode, DiscardReason, Frame, PING, PONG};
pub use freshness::{ExpiryToken, FreshnessTracker, DEFAULT_FRESHNESS_WINDOW};
pub use health::{HealthPoller, HealthSnapshot, HealthSource, PollerHandle, DEFAULT_HEALTH_INTERVAL};
pub use scheduler::{ManualScheduler, Scheduler, Task, TimerId, TokioScheduler};
pub use session::{Session, SessionConfig, SessionSnapshot, DEFAULT_STREAM_URL};
pub use store::{MergeStore, MergeStoreBuilder, StoreSnapshot, DEFAULT_FEED_CAPACITY};
pub use transport::{Connection, EventSink, Transport, TransportEvent};

// Re-export types for convenience
pub use enigma_types::{AnalysisRecord, ConnectionState, HealthData};
