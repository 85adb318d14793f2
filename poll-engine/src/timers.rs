//! Cancellable timers keyed by the resource they act on.
//!
//! Scheduling a key that already has a pending timer aborts the old one.
//! Each timer also carries a generation and re-checks it on wake, so a
//! superseded timer that already woke up still does nothing.

use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use poll_calendar::{Day, PeriodKind};

use crate::types::Scope;

/// What a timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerPurpose {
    /// Nudge members who have not voted
    Reminder(Day),
    /// Reveal counts hidden until a deadline
    DeadlineReveal(Day),
    /// Archive and reset a block
    Rollover(PeriodKind),
}

/// Identity of a timer. At most one is pending per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub scope: Scope,
    pub purpose: TimerPurpose,
}

impl TimerKey {
    pub fn new(scope: Scope, purpose: TimerPurpose) -> Self {
        Self { scope, purpose }
    }
}

struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Registry of pending timers with explicit teardown.
///
/// Dropping the registry aborts every pending timer.
pub struct NotificationTimers {
    timers: Arc<DashMap<TimerKey, TimerEntry>>,
    generation: AtomicU64,
}

impl Default for NotificationTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationTimers {
    pub fn new() -> Self {
        Self {
            timers: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Run `task` after `delay`, replacing any pending timer for `key`.
    ///
    /// Returns the generation of the new timer. Must be called inside a
    /// tokio runtime.
    pub fn schedule<F>(&self, key: TimerKey, delay: Duration, task: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (arm, armed) = oneshot::channel::<()>();
        let timers = Arc::clone(&self.timers);
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            // Wait until the entry is registered before checking it.
            if armed.await.is_err() {
                return;
            }
            tokio::time::sleep(delay).await;
            let current = timers
                .remove_if(&task_key, |_, entry| entry.generation == generation)
                .is_some();
            if !current {
                debug!(key = ?task_key, generation = generation, "Stale timer woke up");
                return;
            }
            debug!(key = ?task_key, generation = generation, "Timer fired");
            task.await;
        });

        let previous = self.timers.insert(key.clone(), TimerEntry { generation, handle });
        if let Some(previous) = previous {
            previous.handle.abort();
            debug!(key = ?key, superseded = previous.generation, "Superseded timer");
        }
        let _ = arm.send(());

        debug!(key = ?key, generation = generation, delay_ms = millis(delay), "Scheduled timer");
        generation
    }

    /// Cancel the pending timer for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &TimerKey) -> bool {
        match self.timers.remove(key) {
            Some((_, entry)) => {
                entry.handle.abort();
                debug!(key = ?key, generation = entry.generation, "Cancelled timer");
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer of a scope. Returns how many were pending.
    pub fn cancel_scope(&self, scope: &Scope) -> usize {
        let mut cancelled = 0;
        self.timers.retain(|key, entry| {
            if &key.scope == scope {
                entry.handle.abort();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        if cancelled > 0 {
            debug!(scope = %scope, cancelled = cancelled, "Cancelled scope timers");
        }
        cancelled
    }

    /// Cancel everything. Returns how many timers were pending.
    pub fn shutdown(&self) -> usize {
        let mut cancelled = 0;
        self.timers.retain(|_, entry| {
            entry.handle.abort();
            cancelled += 1;
            false
        });
        cancelled
    }

    pub fn is_scheduled(&self, key: &TimerKey) -> bool {
        self.timers.contains_key(key)
    }

    /// Generation of the pending timer for `key`.
    pub fn generation_of(&self, key: &TimerKey) -> Option<u64> {
        self.timers.get(key).map(|entry| entry.generation)
    }

    pub fn scheduled_count(&self) -> usize {
        self.timers.len()
    }
}

/// Whole milliseconds of `delay`, saturating.
fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

impl Drop for NotificationTimers {
    fn drop(&mut self) {
        let cancelled = self.shutdown();
        if cancelled > 0 {
            debug!(cancelled = cancelled, "Dropped pending timers");
        }
    }
}
