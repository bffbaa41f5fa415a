#![forbid(unsafe_code)]

//! Keyed one-shot timers over an engine-owned clock.
//!
//! The engine never reads wall time. Hosts advance the clock with
//! `VirtualScroll::tick`, and timers fire when the accumulated clock passes
//! their deadline. This keeps every pass deterministic under test.
//!
//! # Invariants
//!
//! 1. At most one pending deadline per key. Scheduling an existing key
//!    cancels and replaces it; timers never stack.
//! 2. `drain_due` returns keys ordered by `(deadline, key)` and removes them.

use std::hash::Hash;
use std::time::Duration;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Registry of pending one-shot deadlines keyed by `K`.
#[derive(Debug, Clone)]
pub struct TimerRegistry<K> {
    deadlines: FxHashMap<K, Duration>,
}

impl<K> Default for TimerRegistry<K> {
    fn default() -> Self {
        Self {
            deadlines: FxHashMap::default(),
        }
    }
}

impl<K: Copy + Eq + Hash + Ord> TimerRegistry<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) `key` to fire at `now + delay`.
    pub fn schedule(&mut self, key: K, now: Duration, delay: Duration) {
        self.deadlines.insert(key, now.saturating_add(delay));
    }

    /// Cancel a pending timer. Returns whether one was armed.
    pub fn cancel(&mut self, key: K) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.deadlines.clear();
    }

    #[must_use]
    pub fn is_pending(&self, key: K) -> bool {
        self.deadlines.contains_key(&key)
    }

    #[must_use]
    pub fn deadline(&self, key: K) -> Option<Duration> {
        self.deadlines.get(&key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Remove and return every key whose deadline is `<= now`.
    pub fn drain_due(&mut self, now: Duration) -> SmallVec<[K; 8]> {
        let mut due: SmallVec<[(Duration, K); 8]> = self
            .deadlines
            .iter()
            .filter(|&(_, &deadline)| deadline <= now)
            .map(|(&key, &deadline)| (deadline, key))
            .collect();
        due.sort_unstable();
        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    /// Drop timers whose key fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(K) -> bool) {
        self.deadlines.retain(|&key, _| keep(key));
    }
}

impl TimerRegistry<usize> {
    /// Move every index key right by `delta` (items were prepended).
    pub fn shift_keys(&mut self, delta: usize) {
        if delta == 0 {
            return;
        }
        self.deadlines = self
            .deadlines
            .drain()
            .map(|(key, deadline)| (key + delta, deadline))
            .collect();
    }
}
