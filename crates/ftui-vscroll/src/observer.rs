#![forbid(unsafe_code)]

//! Realized-element bookkeeping and resize-subscription glue.
//!
//! [`RealizedElements`] is the engine's explicit index ↔ element mapping,
//! updated synchronously whenever an element is realized or released.
//! [`ResizeSubscriptions`] follows the host's attach/detach notifications so
//! that only attached, indexed elements are observed for resizes and
//! detached ones are always unsubscribed.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::host::{ChildMutation, ElementId, ViewportHost};
use crate::range::ItemRange;

/// Index ↔ element mapping for the realized window.
#[derive(Debug, Clone, Default)]
pub struct RealizedElements {
    by_index: BTreeMap<usize, ElementId>,
    by_element: FxHashMap<ElementId, usize>,
}

impl RealizedElements {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    pub fn insert(&mut self, index: usize, element: ElementId) {
        if let Some(prev) = self.by_index.insert(index, element) {
            self.by_element.remove(&prev);
        }
        self.by_element.insert(element, index);
    }

    #[must_use]
    pub fn element(&self, index: usize) -> Option<ElementId> {
        self.by_index.get(&index).copied()
    }

    #[must_use]
    pub fn index_of(&self, element: ElementId) -> Option<usize> {
        self.by_element.get(&element).copied()
    }

    pub fn remove_index(&mut self, index: usize) -> Option<ElementId> {
        let element = self.by_index.remove(&index)?;
        self.by_element.remove(&element);
        Some(element)
    }

    /// Realized indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_index.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, ElementId)> + '_ {
        self.by_index.iter().map(|(&i, &e)| (i, e))
    }

    /// Remove every entry outside `range`, returning the dropped elements.
    pub fn retain_range(&mut self, range: ItemRange) -> Vec<ElementId> {
        let outside: Vec<usize> = self
            .by_index
            .keys()
            .copied()
            .filter(|&i| !range.contains(i))
            .collect();
        outside
            .into_iter()
            .filter_map(|i| self.remove_index(i))
            .collect()
    }

    /// Indices of `range` that have no element yet.
    #[must_use]
    pub fn missing_in(&self, range: ItemRange) -> Vec<usize> {
        range
            .as_range()
            .filter(|i| !self.by_index.contains_key(i))
            .collect()
    }

    /// Remove everything, returning the dropped elements in index order.
    pub fn drain(&mut self) -> Vec<ElementId> {
        self.by_element.clear();
        std::mem::take(&mut self.by_index).into_values().collect()
    }
}

/// Resize subscriptions driven by attach/detach notifications.
#[derive(Debug, Clone, Default)]
pub struct ResizeSubscriptions {
    subscribed: FxHashSet<ElementId>,
}

impl ResizeSubscriptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribed.is_empty()
    }

    #[must_use]
    pub fn contains(&self, element: ElementId) -> bool {
        self.subscribed.contains(&element)
    }

    /// Apply one batch of attach/detach records.
    ///
    /// Attached elements are subscribed only if they map to a realized index;
    /// detached elements are unsubscribed if they were subscribed.
    /// Returns `(subscribed, unsubscribed)` counts.
    pub fn apply<H: ViewportHost + ?Sized>(
        &mut self,
        mutations: &[ChildMutation],
        realized: &RealizedElements,
        host: &mut H,
    ) -> (usize, usize) {
        let mut added = 0;
        let mut removed = 0;
        for mutation in mutations {
            match *mutation {
                ChildMutation::Attached(element) => {
                    if realized.index_of(element).is_some() && self.subscribed.insert(element) {
                        host.subscribe_resize(element);
                        added += 1;
                    }
                }
                ChildMutation::Detached(element) => {
                    if self.subscribed.remove(&element) {
                        host.unsubscribe_resize(element);
                        removed += 1;
                    }
                }
            }
        }
        (added, removed)
    }

    /// Unsubscribe everything (teardown).
    pub fn release_all<H: ViewportHost + ?Sized>(&mut self, host: &mut H) {
        let mut elements: Vec<ElementId> = self.subscribed.drain().collect();
        elements.sort_unstable();
        for element in elements {
            host.unsubscribe_resize(element);
        }
    }
}
