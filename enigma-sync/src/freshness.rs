//! Per-subject expiry timers for the "recently updated" marker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::scheduler::{Scheduler, TimerId};

/// Default length of the freshness window.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_millis(2000);

/// Identifies one arming of a subject's expiry timer.
///
/// An expiry callback only counts if its token is still the current one for
/// the subject; anything else was superseded by a newer touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryToken(u64);

#[derive(Debug)]
struct PendingExpiry {
    token: ExpiryToken,
    timer: TimerId,
}

/// Timer bookkeeping for subject freshness.
///
/// Holds at most one pending expiry per subject. Touching a subject again
/// cancels the previous timer and restarts the window. Dropping the tracker
/// cancels everything still pending.
#[derive(Debug)]
pub struct FreshnessTracker {
    scheduler: Arc<dyn Scheduler>,
    window: Duration,
    next_token: u64,
    pending: HashMap<String, PendingExpiry>,
}

impl FreshnessTracker {
    /// Create a tracker that expires subjects `window` after their last touch.
    pub fn new(scheduler: Arc<dyn Scheduler>, window: Duration) -> Self {
        Self {
            scheduler,
            window,
            next_token: 0,
            pending: HashMap::new(),
        }
    }

    /// Arm (or re-arm) the expiry timer for `subject`.
    ///
    /// `on_expire` receives the token of this arming when the window elapses.
    /// The caller confirms the expiry with [`FreshnessTracker::settle`].
    pub fn touch<F>(&mut self, subject: &str, on_expire: F) -> ExpiryToken
    where
        F: FnOnce(ExpiryToken) + Send + 'static,
    {
        self.next_token += 1;
        let token = ExpiryToken(self.next_token);

        if let Some(previous) = self.pending.remove(subject) {
            self.scheduler.cancel(previous.timer);
        }

        let timer = self
            .scheduler
            .schedule(self.window, Box::new(move || on_expire(token)));
        self.pending
            .insert(subject.to_string(), PendingExpiry { token, timer });
        token
    }

    /// Confirm that the expiry identified by `token` is still current.
    ///
    /// Returns true and forgets the subject if so; returns false for a
    /// superseded or cancelled arming.
    pub fn settle(&mut self, subject: &str, token: ExpiryToken) -> bool {
        match self.pending.get(subject) {
            Some(pending) if pending.token == token => {
                self.pending.remove(subject);
                true
            }
            _ => false,
        }
    }

    /// Cancel every pending expiry. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        for (_, pending) in self.pending.drain() {
            self.scheduler.cancel(pending.timer);
        }
        count
    }

    /// Returns true if `subject` has an expiry pending.
    pub fn is_pending(&self, subject: &str) -> bool {
        self.pending.contains_key(subject)
    }

    /// Number of subjects with an expiry pending.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for FreshnessTracker {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
