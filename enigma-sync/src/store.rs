//! Merge store - latest record per subject plus a bounded arrival feed.
//!
//! The store publishes [`StoreSnapshot`] values through a watch channel. Each
//! snapshot is immutable once published: its map, feed and freshness set sit
//! behind `Arc`s and are copied on write, so a reader holding a snapshot never
//! sees a later update, and never sees one part updated without the others.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use enigma_types::AnalysisRecord;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::trace;

use crate::freshness::{ExpiryToken, FreshnessTracker, DEFAULT_FRESHNESS_WINDOW};
use crate::scheduler::Scheduler;

/// Default maximum number of feed entries.
pub const DEFAULT_FEED_CAPACITY: usize = 200;

/// A consistent view of the store at one point in time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    current: Arc<BTreeMap<String, Arc<AnalysisRecord>>>,
    feed: Arc<VecDeque<Arc<AnalysisRecord>>>,
    fresh: Arc<BTreeSet<String>>,
}

impl StoreSnapshot {
    /// Latest record per subject.
    pub fn current(&self) -> &BTreeMap<String, Arc<AnalysisRecord>> {
        &self.current
    }

    /// Latest record for one subject.
    pub fn get(&self, subject: &str) -> Option<&Arc<AnalysisRecord>> {
        self.current.get(subject)
    }

    /// Arrival history, most recent first. May hold several records for the
    /// same subject.
    pub fn feed(&self) -> &VecDeque<Arc<AnalysisRecord>> {
        &self.feed
    }

    /// Subjects updated within the freshness window.
    pub fn fresh(&self) -> &BTreeSet<String> {
        &self.fresh
    }

    /// Returns true if `subject` was updated within the freshness window.
    pub fn is_fresh(&self, subject: &str) -> bool {
        self.fresh.contains(subject)
    }

    /// Number of distinct subjects.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Returns true if no record has been applied.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    fn merge(&mut self, record: Arc<AnalysisRecord>, capacity: usize) {
        let subject = record.subject_id().to_string();

        Arc::make_mut(&mut self.current).insert(subject.clone(), record.clone());

        let feed = Arc::make_mut(&mut self.feed);
        feed.push_front(record);
        feed.truncate(capacity);

        Arc::make_mut(&mut self.fresh).insert(subject);
    }

    fn unmark(&mut self, subject: &str) -> bool {
        if !self.fresh.contains(subject) {
            return false;
        }
        Arc::make_mut(&mut self.fresh).remove(subject)
    }
}

struct StoreInner {
    capacity: usize,
    tracker: Mutex<FreshnessTracker>,
    snapshot: watch::Sender<StoreSnapshot>,
}

impl StoreInner {
    fn expire(&self, subject: &str, token: ExpiryToken) {
        let mut tracker = self.tracker.lock();
        if !tracker.settle(subject, token) {
            return;
        }
        self.snapshot.send_if_modified(|snapshot| snapshot.unmark(subject));
        trace!(subject, "freshness expired");
    }
}

/// The session's record store.
///
/// Cheap to clone; clones share the same state.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use enigma_sync::{ManualScheduler, MergeStore};
/// use enigma_types::AnalysisRecord;
///
/// let store = MergeStore::new(Arc::new(ManualScheduler::new()));
/// store.apply(AnalysisRecord::new("abc"));
///
/// let snapshot = store.snapshot();
/// assert_eq!(snapshot.len(), 1);
/// assert_eq!(snapshot.feed().len(), 1);
/// assert!(snapshot.is_fresh("abc"));
/// ```
#[derive(Clone)]
pub struct MergeStore {
    inner: Arc<StoreInner>,
}

impl MergeStore {
    /// Create a store with the default feed capacity and freshness window.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::builder().build(scheduler)
    }

    /// Create a builder for configuring the store.
    pub fn builder() -> MergeStoreBuilder {
        MergeStoreBuilder::default()
    }

    /// Apply one inbound record.
    ///
    /// Replaces the subject's entry, prepends the record to the feed
    /// (dropping the oldest entries beyond capacity) and marks the subject
    /// fresh, restarting its freshness window. All three changes become
    /// visible in a single snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the record has an empty subject id. Frame decoding rejects
    /// such records, so reaching this is a caller bug.
    pub fn apply(&self, record: AnalysisRecord) {
        assert!(
            !record.subject_id().is_empty(),
            "analysis record applied without a subject id"
        );

        let subject = record.subject_id().to_string();
        let record = Arc::new(record);
        let capacity = self.inner.capacity;

        let mut tracker = self.inner.tracker.lock();
        self.inner
            .snapshot
            .send_modify(|snapshot| snapshot.merge(record, capacity));

        let weak = Arc::downgrade(&self.inner);
        let expiring = subject.clone();
        tracker.touch(&subject, move |token| {
            if let Some(inner) = weak.upgrade() {
                inner.expire(&expiring, token);
            }
        });
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Discard all state and cancel every pending freshness timer.
    pub fn reset(&self) {
        let mut tracker = self.inner.tracker.lock();
        let cancelled = tracker.cancel_all();
        self.inner.snapshot.send_replace(StoreSnapshot::default());
        trace!(cancelled, "store reset");
    }

    /// Maximum number of feed entries.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of subjects with a freshness expiry pending.
    pub fn pending_expiries(&self) -> usize {
        self.inner.tracker.lock().pending()
    }
}

impl std::fmt::Debug for MergeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.inner.snapshot.borrow();
        f.debug_struct("MergeStore")
            .field("capacity", &self.inner.capacity)
            .field("subjects", &snapshot.len())
            .field("feed", &snapshot.feed().len())
            .finish()
    }
}

/// Builder for [`MergeStore`].
#[derive(Debug, Default)]
pub struct MergeStoreBuilder {
    capacity: Option<usize>,
    freshness_window: Option<Duration>,
}

impl MergeStoreBuilder {
    /// Set the maximum number of feed entries (default: 200).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set how long a subject stays fresh after an update (default: 2s).
    pub fn freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = Some(window);
        self
    }

    /// Build the store, scheduling freshness expiry on `scheduler`.
    pub fn build(self, scheduler: Arc<dyn Scheduler>) -> MergeStore {
        let window = self.freshness_window.unwrap_or(DEFAULT_FRESHNESS_WINDOW);
        let (snapshot, _) = watch::channel(StoreSnapshot::default());

        MergeStore {
            inner: Arc::new(StoreInner {
                capacity: self.capacity.unwrap_or(DEFAULT_FEED_CAPACITY),
                tracker: Mutex::new(FreshnessTracker::new(scheduler, window)),
                snapshot,
            }),
        }
    }
}
