#![forbid(unsafe_code)]

//! Debounced pagination trigger.
//!
//! Every recalculation pass re-evaluates the loading-edge condition. While it
//! holds, the debounce timer is re-armed; once the engine clock passes the
//! deadline the caller's fetch source runs once. Failures are returned to
//! the caller untouched. There is no retry: the next qualifying pass simply
//! arms the timer again.

use std::fmt;
use std::time::Duration;

use crate::error::FetchError;
use crate::host::ViewportMetrics;
use crate::timer::TimerRegistry;

/// Caller-supplied pagination source.
pub type FetchMore = Box<dyn FnMut() -> Result<(), FetchError>>;

/// Debounced "approaching the loading edge" detector.
pub struct LoadMoreTrigger {
    fetch: Option<FetchMore>,
    timer: TimerRegistry<()>,
    debounce: Duration,
    threshold: f64,
    stick_to_edge: bool,
    fired: u64,
}

impl fmt::Debug for LoadMoreTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadMoreTrigger")
            .field("has_fetch", &self.fetch.is_some())
            .field("armed", &self.is_armed())
            .field("debounce", &self.debounce)
            .field("threshold", &self.threshold)
            .field("stick_to_edge", &self.stick_to_edge)
            .field("fired", &self.fired)
            .finish()
    }
}

impl LoadMoreTrigger {
    #[must_use]
    pub fn new(debounce: Duration, threshold: f64, stick_to_edge: bool) -> Self {
        Self {
            fetch: None,
            timer: TimerRegistry::new(),
            debounce,
            threshold,
            stick_to_edge,
            fired: 0,
        }
    }

    pub fn set_fetch(&mut self, fetch: Option<FetchMore>) {
        self.fetch = fetch;
        if self.fetch.is_none() {
            self.timer.cancel_all();
        }
    }

    #[must_use]
    pub fn has_fetch(&self) -> bool {
        self.fetch.is_some()
    }

    /// The loading-edge condition.
    ///
    /// Short content always qualifies. Stick mode loads older content at the
    /// top; otherwise more content is loaded at the bottom.
    #[must_use]
    pub fn should_load(&self, metrics: &ViewportMetrics) -> bool {
        if metrics.content_height < metrics.viewport_height {
            return true;
        }
        if self.stick_to_edge {
            metrics.scroll_offset < self.threshold
        } else {
            metrics.distance_from_bottom() < self.threshold
        }
    }

    /// Re-arm the debounce timer if the condition holds. Returns whether the
    /// timer is armed afterwards.
    pub fn evaluate(&mut self, metrics: &ViewportMetrics, now: Duration) -> bool {
        if self.fetch.is_some() && self.should_load(metrics) {
            self.timer.schedule((), now, self.debounce);
        }
        self.is_armed()
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.timer.is_pending(())
    }

    pub fn cancel(&mut self) {
        self.timer.cancel_all();
    }

    /// Run the fetch source if the debounce deadline has passed.
    ///
    /// Returns `Ok(true)` when the source ran successfully.
    pub fn poll(&mut self, now: Duration) -> Result<bool, FetchError> {
        if self.timer.drain_due(now).is_empty() {
            return Ok(false);
        }
        let Some(fetch) = self.fetch.as_mut() else {
            return Ok(false);
        };
        self.fired += 1;
        tracing::debug!(fired = self.fired, "fetch-more");
        fetch().map(|()| true)
    }

    /// How many times the fetch source has run.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.fired
    }
}
