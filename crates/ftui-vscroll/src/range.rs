#![forbid(unsafe_code)]

//! Render/visible range calculation in a single accumulation pass.
//!
//! # Invariants
//!
//! For every input, [`calculate_ranges`] returns
//! `0 <= render.start <= visible.start <= visible.end <= render.end <= len`.
//!
//! A result whose render range is empty for a non-empty sequence is
//! *degenerate* ([`RangeSnapshot::is_degenerate`]); callers must discard it
//! and keep their previous range.

use std::ops::Range;

use crate::height::HeightModel;

/// Half-open index range `[start, end)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemRange {
    pub start: usize,
    pub end: usize,
}

impl ItemRange {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[must_use]
    pub const fn contains(&self, idx: usize) -> bool {
        self.start <= idx && idx < self.end
    }

    /// Clamp both ends to `len`.
    #[must_use]
    pub fn clamp_to(self, len: usize) -> Self {
        let end = self.end.min(len);
        Self::new(self.start.min(end), end)
    }

    /// Shift both ends right by `delta`.
    #[must_use]
    pub const fn shifted(self, delta: usize) -> Self {
        Self::new(self.start + delta, self.end + delta)
    }

    #[must_use]
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<Range<usize>> for ItemRange {
    fn from(r: Range<usize>) -> Self {
        Self::new(r.start, r.end)
    }
}

/// Padding applied above and below the realized items so the scrollable
/// height matches the whole sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Offsets {
    /// Σ height(i) for i in `[0, render.start)`.
    pub top: f64,
    /// Σ height(i) for i in `[render.end, len)`.
    pub bottom: f64,
}

impl Offsets {
    /// Compute padding for `render` from the height model.
    #[must_use]
    pub fn for_range(render: ItemRange, heights: &HeightModel) -> Self {
        Self {
            top: heights.sum_range(0, render.start),
            bottom: heights.sum_range(render.end, heights.len()),
        }
    }
}

/// Geometry inputs for one calculation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeInput {
    pub scroll_offset: f64,
    pub viewport_height: f64,
    pub render_distance: f64,
    pub len: usize,
}

/// Output of one calculation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeSnapshot {
    pub render: ItemRange,
    pub visible: ItemRange,
}

impl RangeSnapshot {
    /// Empty render range over a non-empty sequence.
    #[must_use]
    pub fn is_degenerate(&self, len: usize) -> bool {
        len > 0 && self.render.end <= self.render.start
    }
}

/// Compute render and visible ranges in one forward pass over `0..len`.
///
/// `height_of(i)` supplies each item's height; the engine passes a lookup
/// that prefers an element's live rendered size over the cached model so
/// the pass self-corrects before storage catches up.
///
/// - `render.start`: first index whose bottom edge passes `scroll − distance`.
/// - `visible.start`: first index whose bottom edge passes `scroll`.
/// - `visible.end`: first index whose top edge reaches `scroll + viewport`.
/// - `render.end`: first index whose top edge reaches
///   `scroll + viewport + distance`.
///
/// Anything not reached before the sequence ends extends to `len`.
#[must_use]
pub fn calculate_ranges(
    input: RangeInput,
    mut height_of: impl FnMut(usize) -> f64,
) -> RangeSnapshot {
    let len = input.len;
    if len == 0 {
        return RangeSnapshot::default();
    }

    let scroll = input.scroll_offset.max(0.0);
    let distance = input.render_distance.max(0.0);
    let render_top = (scroll - distance).max(0.0);
    let view_bottom = scroll + input.viewport_height.max(0.0);
    let render_bottom = view_bottom + distance;

    let mut render_start = None;
    let mut visible_start = None;
    let mut visible_end = None;
    let mut render_end = None;
    let mut acc = 0.0;

    for i in 0..len {
        let item_top = acc;
        if item_top >= render_bottom && render_start.is_some() {
            render_end = Some(i);
            break;
        }
        if visible_end.is_none() && item_top >= view_bottom && visible_start.is_some() {
            visible_end = Some(i);
        }
        let item_bottom = item_top + height_of(i).max(0.0);
        if render_start.is_none() && item_bottom > render_top {
            render_start = Some(i);
        }
        if visible_start.is_none() && item_bottom > scroll {
            visible_start = Some(i);
        }
        acc = item_bottom;
    }

    let render_start = render_start.unwrap_or(len);
    let render_end = render_end.unwrap_or(len).max(render_start);
    let visible_start = visible_start
        .unwrap_or(render_end)
        .clamp(render_start, render_end);
    let visible_end = visible_end
        .unwrap_or(render_end)
        .clamp(visible_start, render_end);

    RangeSnapshot {
        render: ItemRange::new(render_start, render_end),
        visible: ItemRange::new(visible_start, visible_end),
    }
}
