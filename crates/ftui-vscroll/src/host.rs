#![forbid(unsafe_code)]

//! Capabilities the engine consumes from its host.
//!
//! The engine owns no visuals and no data. It asks the host to realize and
//! release elements for indices, to measure them, and to move the scroll
//! offset; it learns about the sequence through [`ItemSequence`].

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::range::Offsets;

/// Stable identity of a sequence record, used for head/tail change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemId(pub u64);

impl ItemId {
    /// Hash an arbitrary key (string ids, tuples, ...) into an `ItemId`.
    #[must_use]
    pub fn from_key<K: Hash + ?Sized>(key: &K) -> Self {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// Handle to a realized visual element, minted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementId(pub u64);

/// Externally owned ordered sequence, seen only through index and identity.
pub trait ItemSequence {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable id of the record at `index`, or `None` if it has none.
    fn identity(&self, index: usize) -> Option<ItemId>;
}

/// [`ItemSequence`] over a slice plus an identity function.
pub struct SliceSequence<'a, T, F> {
    items: &'a [T],
    identity: F,
}

impl<'a, T, F> SliceSequence<'a, T, F>
where
    F: Fn(&T) -> Option<ItemId>,
{
    pub fn new(items: &'a [T], identity: F) -> Self {
        Self { items, identity }
    }
}

impl<T, F> ItemSequence for SliceSequence<'_, T, F>
where
    F: Fn(&T) -> Option<ItemId>,
{
    fn len(&self) -> usize {
        self.items.len()
    }

    fn identity(&self, index: usize) -> Option<ItemId> {
        self.items.get(index).and_then(&self.identity)
    }
}

/// Point-in-time viewport geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewportMetrics {
    pub scroll_offset: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

impl ViewportMetrics {
    /// Largest legal scroll offset.
    #[must_use]
    pub fn max_scroll(&self) -> f64 {
        (self.content_height - self.viewport_height).max(0.0)
    }

    /// Distance between the viewport bottom and the content bottom, never
    /// negative (short content is already "at" the edge).
    #[must_use]
    pub fn distance_from_bottom(&self) -> f64 {
        (self.content_height - self.scroll_offset - self.viewport_height).max(0.0)
    }
}

/// Scrollable viewport that realizes items on the engine's behalf.
///
/// Every method is synchronous. `commit` stands in for "wait until the next
/// render has been committed": after it returns, freshly rendered elements
/// must be measurable unless they were torn down concurrently.
pub trait ViewportHost {
    /// Current geometry, or `None` once the viewport has gone away.
    fn metrics(&self) -> Option<ViewportMetrics>;

    /// Assign the scroll offset. The host clamps to its legal range and
    /// emits a scroll notification if the offset changed.
    fn set_scroll_offset(&mut self, offset: f64);

    /// Apply top/bottom padding for unrealized items.
    fn apply_offsets(&mut self, offsets: Offsets);

    /// Realize the item at `index`. `height_hint` carries a locked height the
    /// element should be pinned to while it settles.
    fn render(&mut self, index: usize, height_hint: Option<f64>) -> ElementId;

    /// Drop a realized element.
    fn release(&mut self, element: ElementId);

    /// Flush pending renders/releases so they can be measured.
    fn commit(&mut self);

    /// Rendered height, or `None` if the element is not present.
    fn measure(&self, element: ElementId) -> Option<f64>;

    fn subscribe_resize(&mut self, element: ElementId);

    fn unsubscribe_resize(&mut self, element: ElementId);

    /// Show or hide the "jump to new content" affordance.
    fn set_new_content_indicator(&mut self, _visible: bool) {}
}

/// Attach/detach record from the realized-item container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChildMutation {
    Attached(ElementId),
    Detached(ElementId),
}
