//! Sliding-window request counter store.
//!
//! The store answers one question: has this client key exceeded its budget
//! within the trailing window? Counting uses window-reset semantics (one
//! counter and a window start per key) rather than a full sliding log, which
//! keeps memory at O(1) per key and allows up to twice the nominal budget
//! across a window boundary. That approximation is accepted: this is abuse
//! mitigation, not billing.
//!
//! State is process-local and in-memory. In a horizontally scaled deployment
//! each instance enforces its own budget, so the effective global budget is
//! `budget * instance_count`. Counts reset to empty on process restart.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Per-key counter state for the current window.
struct CounterEntry {
    /// Admitted requests seen in the current window, capped at the budget
    count: u32,
    /// When the current window began
    window_start: Instant,
}

struct StoreInner {
    entries: HashMap<String, CounterEntry>,
    last_sweep: Instant,
}

/// In-memory rate limit counter store.
///
/// Thread-safe; a single coarse mutex serializes each check so that the
/// read-then-write on an entry is atomic with respect to concurrent requests
/// from the same key. The critical section is synchronous and O(1) outside
/// of sweeps, and no lock is held across request boundaries.
pub struct RateLimitStore {
    /// Trailing window a budget applies to
    window: Duration,
    /// Minimum interval between bulk sweeps
    sweep_interval: Duration,
    /// Hard ceiling on tracked entries
    max_entries: usize,
    inner: Mutex<StoreInner>,
}

impl RateLimitStore {
    /// Create a new store.
    pub fn new(window: Duration, sweep_interval: Duration, max_entries: usize) -> Self {
        Self {
            window,
            sweep_interval,
            max_entries,
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Record an attempt for `key` and report whether it is over budget.
    ///
    /// Returns `true` when the key has already used up `max_requests` in the
    /// current window. Rejected attempts do not increment the counter, so
    /// repeated rejections neither extend nor corrupt the window.
    pub fn check_and_record(&self, key: &str, max_requests: u32) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        self.maybe_sweep(&mut inner, now);

        if let Some(entry) = inner.entries.get_mut(key) {
            if now.duration_since(entry.window_start) > self.window {
                // Stale entry: a fresh window begins with this request.
                entry.count = 1;
                entry.window_start = now;
                return false;
            }

            if entry.count >= max_requests {
                trace!(key, count = entry.count, "Over budget");
                return true;
            }

            entry.count += 1;
            return false;
        }

        // First request from this key. When the table is full of live
        // entries even after a forced sweep, admit without tracking until
        // the next sweep frees space; the entry count never exceeds the
        // ceiling and identification pressure fails open.
        if inner.entries.len() < self.max_entries {
            inner.entries.insert(
                key.to_owned(),
                CounterEntry {
                    count: 1,
                    window_start: now,
                },
            );
        } else {
            debug!(key, "Entry table full, admitting untracked");
        }

        false
    }

    /// Bulk-remove expired entries, at most once per sweep interval or
    /// immediately when the table has reached the ceiling.
    fn maybe_sweep(&self, inner: &mut StoreInner, now: Instant) {
        if now.duration_since(inner.last_sweep) < self.sweep_interval
            && inner.entries.len() < self.max_entries
        {
            return;
        }

        let window = self.window;
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, entry| now.duration_since(entry.window_start) <= window);
        inner.last_sweep = now;

        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!(removed, remaining = inner.entries.len(), "Swept expired entries");
        }
    }

    /// Get the current count for a key.
    ///
    /// Returns `None` if no entry exists for the key.
    pub fn current_count(&self, key: &str) -> Option<u32> {
        let inner = self.inner.lock();
        inner.entries.get(key).map(|entry| entry.count)
    }

    /// Get the number of tracked entries.
    pub fn entry_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.entries.len()
    }

    /// Clear all entries.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
    }
}
