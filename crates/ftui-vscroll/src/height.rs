#![forbid(unsafe_code)]

//! Per-index height storage with default fallback and short-lived locks.
//!
//! # Design
//!
//! Measured heights live in a dense `Vec<Option<f64>>` sized to the sequence,
//! with `None` meaning "never measured" (resolves to the default height).
//! Locked heights are a separate sparse map consulted first; each lock has
//! its own expiry timer in a [`TimerRegistry`], so re-locking an index
//! replaces its deadline rather than stacking a second one.
//!
//! # Invariants
//!
//! 1. `len()` tracks the observed sequence length after every reconcile.
//! 2. `get(i)` = locked(i) ?? measured(i) ?? default.
//! 3. `sum_range(a, b)` = Σ `get(i)` for `i in a..b`, clamped to `len()`.

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::timer::TimerRegistry;

/// Height storage for every index of the observed sequence.
#[derive(Debug, Clone)]
pub struct HeightModel {
    measured: Vec<Option<f64>>,
    locked: FxHashMap<usize, f64>,
    lock_timers: TimerRegistry<usize>,
    default_height: f64,
    lock_duration: Duration,
}

impl HeightModel {
    #[must_use]
    pub fn new(default_height: f64, lock_duration: Duration) -> Self {
        Self {
            measured: Vec::new(),
            locked: FxHashMap::default(),
            lock_timers: TimerRegistry::new(),
            default_height,
            lock_duration,
        }
    }

    /// Number of indices tracked (measured or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.measured.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measured.is_empty()
    }

    #[must_use]
    pub fn default_height(&self) -> f64 {
        self.default_height
    }

    /// Effective height: lock, then measurement, then default.
    #[must_use]
    pub fn get(&self, idx: usize) -> f64 {
        if let Some(&h) = self.locked.get(&idx) {
            return h;
        }
        self.measured(idx).unwrap_or(self.default_height)
    }

    /// Measured height, ignoring locks and the default.
    #[must_use]
    pub fn measured(&self, idx: usize) -> Option<f64> {
        self.measured.get(idx).copied().flatten()
    }

    #[must_use]
    pub fn locked(&self, idx: usize) -> Option<f64> {
        self.locked.get(&idx).copied()
    }

    /// Number of indices with a measurement.
    #[must_use]
    pub fn measured_count(&self) -> usize {
        self.measured.iter().filter(|h| h.is_some()).count()
    }

    /// Record a measurement. Grows storage if `idx` is past the end.
    pub fn set(&mut self, idx: usize, height: f64) {
        if idx >= self.measured.len() {
            self.measured.resize(idx + 1, None);
        }
        self.measured[idx] = Some(height);
    }

    /// Pin `idx` to its current measured height until `now + lock_duration`.
    ///
    /// Returns `false` when the index has never been measured (nothing to pin).
    pub fn lock(&mut self, idx: usize, now: Duration) -> bool {
        let Some(height) = self.measured(idx) else {
            return false;
        };
        self.locked.insert(idx, height);
        self.lock_timers.schedule(idx, now, self.lock_duration);
        true
    }

    /// Drop locks whose timers have run out. Returns whether any expired.
    pub fn expire_locks(&mut self, now: Duration) -> bool {
        let due = self.lock_timers.drain_due(now);
        for idx in &due {
            self.locked.remove(idx);
        }
        !due.is_empty()
    }

    #[must_use]
    pub fn has_locks(&self) -> bool {
        !self.locked.is_empty()
    }

    /// Σ `get(i)` for `i in start..end`. Linear in the range length.
    #[must_use]
    pub fn sum_range(&self, start: usize, end: usize) -> f64 {
        let end = end.min(self.len());
        if start >= end {
            return 0.0;
        }
        (start..end).map(|i| self.get(i)).sum()
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.sum_range(0, self.len())
    }

    /// Truncate or extend (with unset entries) to `len`.
    pub fn resize(&mut self, len: usize) {
        self.measured.resize(len, None);
        self.locked.retain(|&idx, _| idx < len);
        self.lock_timers.retain(|idx| idx < len);
    }

    /// Forget every measurement and lock; track `len` unset entries.
    pub fn reset(&mut self, len: usize) {
        self.measured.clear();
        self.measured.resize(len, None);
        self.locked.clear();
        self.lock_timers.cancel_all();
    }

    /// Insert `count` unset entries at the front, moving every existing key
    /// (measurements and locks) right by `count`.
    pub fn shift_right(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let mut shifted = vec![None; count];
        shifted.append(&mut self.measured);
        self.measured = shifted;
        self.locked = self
            .locked
            .drain()
            .map(|(idx, h)| (idx + count, h))
            .collect();
        self.lock_timers.shift_keys(count);
    }

    /// Drop all locks and their timers.
    pub fn clear_locks(&mut self) {
        self.locked.clear();
        self.lock_timers.cancel_all();
    }
}
