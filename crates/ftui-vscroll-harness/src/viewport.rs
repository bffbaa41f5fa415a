#![forbid(unsafe_code)]

//! Headless [`ViewportHost`] with deterministic layout.
//!
//! Content height is `top padding + Σ committed element heights + bottom
//! padding`, where an element's height is the true height of the item at its
//! index. Notifications a real viewport would deliver asynchronously are
//! queued and drained by [`Harness::settle`](crate::Harness::settle):
//!
//! - one coalesced scroll notification whenever the offset changed,
//! - attach records on commit and detach records on release,
//! - a resize on subscribe and whenever a subscribed element's height
//!   changes.

use std::collections::{BTreeMap, BTreeSet};

use ftui_vscroll::{ChildMutation, ElementId, Offsets, ViewportHost, ViewportMetrics};
use rustc_hash::FxHashMap;

/// One element handed out by [`HeadlessViewport::render`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderedElement {
    pub index: usize,
    pub height_hint: Option<f64>,
    pub committed: bool,
}

/// Counters for assertions about host traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewportStats {
    pub renders: u64,
    pub releases: u64,
    pub commits: u64,
    pub programmatic_scrolls: u64,
}

#[derive(Debug, Clone)]
pub struct HeadlessViewport {
    heights: Vec<f64>,
    viewport_height: f64,
    scroll_offset: f64,
    offsets: Offsets,
    elements: BTreeMap<ElementId, RenderedElement>,
    next_element: u64,
    subscribed: BTreeSet<ElementId>,
    reported: FxHashMap<ElementId, f64>,
    mutations: Vec<ChildMutation>,
    resizes: BTreeSet<ElementId>,
    scroll_pending: bool,
    detached: bool,
    vanish_index: Option<usize>,
    indicator: bool,
    stats: ViewportStats,
}

impl HeadlessViewport {
    #[must_use]
    pub fn new(viewport_height: f64) -> Self {
        Self {
            heights: Vec::new(),
            viewport_height,
            scroll_offset: 0.0,
            offsets: Offsets::default(),
            elements: BTreeMap::new(),
            next_element: 1,
            subscribed: BTreeSet::new(),
            reported: FxHashMap::default(),
            mutations: Vec::new(),
            resizes: BTreeSet::new(),
            scroll_pending: false,
            detached: false,
            vanish_index: None,
            indicator: false,
            stats: ViewportStats::default(),
        }
    }

    // ── Inspection ──────────────────────────────────────────────────────

    #[must_use]
    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    #[must_use]
    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    #[must_use]
    pub fn offsets(&self) -> Offsets {
        self.offsets
    }

    #[must_use]
    pub fn content_height(&self) -> f64 {
        self.offsets.top + self.rendered_height() + self.offsets.bottom
    }

    /// Σ true heights of committed elements.
    #[must_use]
    pub fn rendered_height(&self) -> f64 {
        self.elements
            .values()
            .filter(|e| e.committed)
            .map(|e| self.true_height(e.index))
            .sum()
    }

    #[must_use]
    pub fn true_height(&self, index: usize) -> f64 {
        self.heights.get(index).copied().unwrap_or(0.0)
    }

    /// True height of every item, by index.
    #[must_use]
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    #[must_use]
    pub fn item_count(&self) -> usize {
        self.heights.len()
    }

    /// Indices of committed elements, ascending.
    #[must_use]
    pub fn mounted_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .elements
            .values()
            .filter(|e| e.committed)
            .map(|e| e.index)
            .collect();
        indices.sort_unstable();
        indices
    }

    #[must_use]
    pub fn element(&self, element: ElementId) -> Option<&RenderedElement> {
        self.elements.get(&element)
    }

    #[must_use]
    pub fn subscribed(&self) -> &BTreeSet<ElementId> {
        &self.subscribed
    }

    #[must_use]
    pub fn indicator_visible(&self) -> bool {
        self.indicator
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    #[must_use]
    pub fn stats(&self) -> ViewportStats {
        self.stats
    }

    // ── Driving ─────────────────────────────────────────────────────────

    /// User scroll: clamp and flag a notification.
    pub fn user_scroll(&mut self, offset: f64) {
        self.move_to(offset);
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport_height = height.max(0.0);
        self.clamp_scroll();
    }

    /// Replace the true heights, queueing resizes for subscribed elements
    /// whose height changed.
    pub fn set_heights(&mut self, heights: Vec<f64>) {
        self.heights = heights;
        self.queue_changed_resizes();
    }

    /// Change one item's true height.
    pub fn set_height(&mut self, index: usize, height: f64) {
        if let Some(slot) = self.heights.get_mut(index) {
            *slot = height;
            self.queue_changed_resizes();
        }
    }

    /// Simulate the viewport element going away.
    pub fn detach(&mut self) {
        self.detached = true;
    }

    /// The next element rendered for `index` disappears before it can be
    /// measured.
    pub fn vanish_next_render(&mut self, index: usize) {
        self.vanish_index = Some(index);
    }

    pub fn take_mutations(&mut self) -> Vec<ChildMutation> {
        std::mem::take(&mut self.mutations)
    }

    /// Queued resizes for elements that still exist.
    pub fn take_resizes(&mut self) -> Vec<ElementId> {
        let queued = std::mem::take(&mut self.resizes);
        queued
            .into_iter()
            .filter(|e| self.elements.contains_key(e))
            .collect()
    }

    pub fn take_scroll(&mut self) -> bool {
        std::mem::take(&mut self.scroll_pending)
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.scroll_pending || !self.mutations.is_empty() || !self.resizes.is_empty()
    }

    fn max_scroll(&self) -> f64 {
        (self.content_height() - self.viewport_height).max(0.0)
    }

    fn move_to(&mut self, offset: f64) {
        let target = offset.clamp(0.0, self.max_scroll());
        if target != self.scroll_offset {
            self.scroll_offset = target;
            self.scroll_pending = true;
        }
    }

    fn clamp_scroll(&mut self) {
        self.move_to(self.scroll_offset);
    }

    fn queue_changed_resizes(&mut self) {
        for &element in &self.subscribed {
            let Some(rendered) = self.elements.get(&element) else {
                continue;
            };
            let height = self.heights.get(rendered.index).copied().unwrap_or(0.0);
            if self.reported.get(&element) != Some(&height) {
                self.resizes.insert(element);
            }
        }
        self.clamp_scroll();
    }
}

impl ViewportHost for HeadlessViewport {
    fn metrics(&self) -> Option<ViewportMetrics> {
        if self.detached {
            return None;
        }
        Some(ViewportMetrics {
            scroll_offset: self.scroll_offset,
            viewport_height: self.viewport_height,
            content_height: self.content_height(),
        })
    }

    fn set_scroll_offset(&mut self, offset: f64) {
        if self.detached {
            return;
        }
        self.stats.programmatic_scrolls += 1;
        self.move_to(offset);
    }

    fn apply_offsets(&mut self, offsets: Offsets) {
        self.offsets = offsets;
        self.clamp_scroll();
    }

    fn render(&mut self, index: usize, height_hint: Option<f64>) -> ElementId {
        let element = ElementId(self.next_element);
        self.next_element += 1;
        self.stats.renders += 1;
        if self.vanish_index == Some(index) {
            self.vanish_index = None;
            return element;
        }
        self.elements.insert(
            element,
            RenderedElement {
                index,
                height_hint,
                committed: false,
            },
        );
        element
    }

    fn release(&mut self, element: ElementId) {
        let Some(rendered) = self.elements.remove(&element) else {
            return;
        };
        self.stats.releases += 1;
        self.resizes.remove(&element);
        if rendered.committed {
            self.mutations.push(ChildMutation::Detached(element));
        }
    }

    fn commit(&mut self) {
        self.stats.commits += 1;
        for (&element, rendered) in &mut self.elements {
            if !rendered.committed {
                rendered.committed = true;
                self.mutations.push(ChildMutation::Attached(element));
            }
        }
    }

    fn measure(&self, element: ElementId) -> Option<f64> {
        let rendered = self.elements.get(&element)?;
        rendered.committed.then(|| self.true_height(rendered.index))
    }

    fn subscribe_resize(&mut self, element: ElementId) {
        if self.subscribed.insert(element) {
            self.resizes.insert(element);
        }
    }

    fn unsubscribe_resize(&mut self, element: ElementId) {
        self.subscribed.remove(&element);
        self.reported.remove(&element);
        self.resizes.remove(&element);
    }

    fn set_new_content_indicator(&mut self, visible: bool) {
        self.indicator = visible;
    }
}

/// Record that `element`'s current height was delivered.
pub(crate) fn mark_reported(viewport: &mut HeadlessViewport, elements: &[ElementId]) {
    for &element in elements {
        if let Some(rendered) = viewport.elements.get(&element) {
            let height = viewport.true_height(rendered.index);
            viewport.reported.insert(element, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_attaches_and_release_detaches() {
        let mut vp = HeadlessViewport::new(100.0);
        vp.set_heights(vec![30.0, 40.0]);
        let a = vp.render(0, None);
        let b = vp.render(1, Some(40.0));
        assert_eq!(vp.measure(a), None);
        vp.commit();
        assert_eq!(vp.measure(b), Some(40.0));
        assert_eq!(
            vp.take_mutations(),
            vec![ChildMutation::Attached(a), ChildMutation::Attached(b)]
        );
        vp.release(a);
        assert_eq!(vp.take_mutations(), vec![ChildMutation::Detached(a)]);
        assert_eq!(vp.rendered_height(), 40.0);
    }

    #[test]
    fn scroll_is_clamped_and_coalesced() {
        let mut vp = HeadlessViewport::new(100.0);
        vp.apply_offsets(Offsets {
            top: 0.0,
            bottom: 300.0,
        });
        vp.user_scroll(50.0);
        vp.user_scroll(1_000.0);
        assert_eq!(vp.scroll_offset(), 200.0);
        assert!(vp.take_scroll());
        assert!(!vp.take_scroll());

        vp.apply_offsets(Offsets::default());
        assert_eq!(vp.scroll_offset(), 0.0);
        assert!(vp.take_scroll());
    }

    #[test]
    fn height_changes_queue_resizes_for_subscribed_only() {
        let mut vp = HeadlessViewport::new(100.0);
        vp.set_heights(vec![30.0, 40.0]);
        let a = vp.render(0, None);
        let b = vp.render(1, None);
        vp.commit();
        vp.subscribe_resize(a);
        let initial = vp.take_resizes();
        assert_eq!(initial, vec![a]);
        mark_reported(&mut vp, &initial);

        vp.set_height(0, 35.0);
        vp.set_height(1, 45.0);
        assert_eq!(vp.take_resizes(), vec![a]);
        assert!(vp.measure(b).is_some());
    }

    #[test]
    fn vanished_render_is_never_measurable() {
        let mut vp = HeadlessViewport::new(100.0);
        vp.set_heights(vec![30.0]);
        vp.vanish_next_render(0);
        let a = vp.render(0, None);
        vp.commit();
        assert_eq!(vp.measure(a), None);
        assert!(vp.take_mutations().is_empty());
    }

    #[test]
    fn detached_viewport_reports_no_metrics() {
        let mut vp = HeadlessViewport::new(100.0);
        assert!(vp.metrics().is_some());
        vp.detach();
        assert!(vp.metrics().is_none());
        assert!(vp.is_detached());
    }
}
