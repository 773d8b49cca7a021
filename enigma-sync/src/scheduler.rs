//! Timer scheduling behind an injectable interface.
//!
//! Every delayed action in the engine (reconnect backoff, keepalive probes,
//! freshness expiry) goes through a [`Scheduler`], so production code runs on
//! Tokio timers while tests drive a [`ManualScheduler`] deterministically.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Token identifying a scheduled timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Schedules one-shot tasks after a delay.
///
/// Implementations must never run a task while holding an internal lock:
/// tasks are free to schedule or cancel other timers.
pub trait Scheduler: Send + Sync + Debug {
    /// Run `task` once after `delay`, unless cancelled first.
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;

    /// Cancel a pending timer.
    ///
    /// Returns `false` if the timer already fired or was already cancelled.
    fn cancel(&self, id: TimerId) -> bool;

    /// Number of timers that are scheduled and have not fired yet.
    fn pending(&self) -> usize;
}

/// Scheduler backed by Tokio timers.
///
/// Each timer is a spawned task that sleeps for the delay. A fired timer
/// removes itself from the pending table before running, so a racing
/// `cancel` either wins (the task never runs) or reports `false`.
pub struct TokioScheduler {
    handle: Handle,
    next_id: AtomicU64,
    timers: Arc<Mutex<HashMap<TimerId, AbortHandle>>>,
}

impl TokioScheduler {
    /// Create a scheduler on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    /// Create a scheduler that spawns its timers on the given runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(0),
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let timers = self.timers.clone();

        // Hold the table while spawning so the timer cannot fire before it is registered
        let mut table = self.timers.lock();
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let live = timers.lock().remove(&id).is_some();
            if live {
                task();
            }
        });
        table.insert(id, join.abort_handle());
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        match self.timers.lock().remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}

impl Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Deterministic scheduler driven by a virtual clock.
///
/// Nothing fires until [`ManualScheduler::advance`] moves the clock forward.
/// Timers fire in deadline order, ties in the order they were scheduled.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use enigma_sync::{ManualScheduler, Scheduler};
///
/// let scheduler = ManualScheduler::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = fired.clone();
/// scheduler.schedule(Duration::from_millis(500), Box::new(move || {
///     flag.store(true, Ordering::SeqCst);
/// }));
///
/// scheduler.advance(Duration::from_millis(499));
/// assert!(!fired.load(Ordering::SeqCst));
/// scheduler.advance(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), Task>,
    deadlines: HashMap<u64, Duration>,
}

impl ManualScheduler {
    /// Create a scheduler with its clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Move the clock forward, firing every timer that comes due.
    ///
    /// Timers scheduled by fired tasks also fire if their deadline falls
    /// inside the window.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now + by;

        loop {
            let task = {
                let mut state = self.state.lock();
                match state.queue.keys().next().copied() {
                    Some((deadline, seq)) if deadline <= target => {
                        state.now = deadline;
                        state.deadlines.remove(&seq);
                        state.queue.remove(&(deadline, seq))
                    }
                    _ => {
                        state.now = target;
                        None
                    }
                }
            };

            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Remaining delay of every pending timer, soonest first.
    pub fn pending_delays(&self) -> Vec<Duration> {
        let state = self.state.lock();
        state
            .queue
            .keys()
            .map(|(deadline, _)| deadline.saturating_sub(state.now))
            .collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let mut state = self.state.lock();
        let seq = state.next_id;
        state.next_id += 1;
        let deadline = state.now + delay;
        state.queue.insert((deadline, seq), task);
        state.deadlines.insert(seq, deadline);
        TimerId(seq)
    }

    fn cancel(&self, id: TimerId) -> bool {
        let mut state = self.state.lock();
        match state.deadlines.remove(&id.0) {
            Some(deadline) => state.queue.remove(&(deadline, id.0)).is_some(),
            None => false,
        }
    }

    fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }
}

impl Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = log.clone();
        let make = move |label: &'static str| -> Task {
            let log = handle.clone();
            Box::new(move || log.lock().push(label))
        };
        (log, make)
    }

    #[test]
    fn manual_fires_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.schedule(Duration::from_millis(300), task("c"));
        scheduler.schedule(Duration::from_millis(100), task("a"));
        scheduler.schedule(Duration::from_millis(200), task("b"));

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(scheduler.now(), Duration::from_secs(1));
    }

    #[test]
    fn manual_ties_fire_in_schedule_order() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.schedule(Duration::from_millis(100), task("first"));
        scheduler.schedule(Duration::from_millis(100), task("second"));

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn manual_does_not_fire_before_deadline() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.schedule(Duration::from_millis(100), task("a"));
        scheduler.advance(Duration::from_millis(99));
        assert!(log.lock().is_empty());
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.pending_delays(), vec![Duration::from_millis(1)]);
    }

    #[test]
    fn manual_cancel_prevents_fire() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        let id = scheduler.schedule(Duration::from_millis(100), task("a"));
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));

        scheduler.advance(Duration::from_secs(1));
        assert!(log.lock().is_empty());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn manual_fires_tasks_scheduled_during_advance() {
        let scheduler = Arc::new(ManualScheduler::new());
        let count = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = scheduler.clone();
        let inner_count = count.clone();
        scheduler.schedule(
            Duration::from_millis(100),
            Box::new(move || {
                inner_count.fetch_add(1, Ordering::SeqCst);
                let again = inner_count.clone();
                inner_scheduler.schedule(
                    Duration::from_millis(100),
                    Box::new(move || {
                        again.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        scheduler.advance(Duration::from_millis(250));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_fires_after_delay() {
        let scheduler = TokioScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = count.clone();

        scheduler.schedule(
            Duration::from_millis(500),
            Box::new(move || {
                handle.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_cancel_is_idempotent() {
        let scheduler = TokioScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = count.clone();

        let id = scheduler.schedule(
            Duration::from_millis(500),
            Box::new(move || {
                handle.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
    }
}
