#![forbid(unsafe_code)]

//! The windowing engine: ties heights, ranges, scroll compensation, change
//! reconciliation, pagination and observer glue to one host viewport.
//!
//! # Event handlers
//!
//! There is no scheduler. The host calls one handler per external input and
//! each handler runs to completion:
//!
//! | Input | Handler | Order of work |
//! |-------|---------|---------------|
//! | scroll notification | [`VirtualScroll::on_scroll`] | direction, then recalculation |
//! | resize batch | [`VirtualScroll::on_resize`] | measure, compensate, then one recalculation |
//! | attach/detach batch | [`VirtualScroll::on_child_mutations`] | (un)subscribe |
//! | sequence changed | [`VirtualScroll::on_sequence_changed`] | reconcile, then recalculation |
//! | viewport resized | [`VirtualScroll::on_viewport_resize`] | recalculation |
//! | time passed | [`VirtualScroll::tick`] | lock expiry, debounced fetch |
//!
//! # Invariants
//!
//! 1. `render_range ⊆ [0, len)`; `None` means "not initialized".
//! 2. After every applied pass, `offsets.top = Σ height(0..start)` and
//!    `offsets.bottom = Σ height(end..len)`.
//! 3. A recalculation started while another is in flight is a no-op.
//! 4. A programmatic scroll that moves the offset arms the one-shot
//!    suppression flag; one that would not move it is skipped.
//! 5. When the host clamps the offset while a window is applied, the pass
//!    is recomputed from the clamped offset.
//! 6. After [`VirtualScroll::teardown`] every handler is a no-op.

use std::fmt;
use std::time::Duration;

use tracing::{debug, debug_span, trace, warn};

use crate::config::VirtualScrollConfig;
use crate::error::VirtualScrollError;
use crate::height::HeightModel;
use crate::host::{ChildMutation, ElementId, ItemSequence, ViewportHost};
use crate::load_more::{FetchMore, LoadMoreTrigger};
use crate::observer::{RealizedElements, ResizeSubscriptions};
use crate::range::{ItemRange, Offsets, RangeInput, calculate_ranges};
use crate::reconcile::{SequenceChange, SequenceSnapshot, classify};
use crate::scroll::{Compensation, ResizeContext, ScrollCoordinator, ScrollDirection, ScrollPhase};

/// Listener for visible-range changes. Receives `None` once, at teardown.
pub type VisibleRangeListener = Box<dyn FnMut(Option<ItemRange>)>;

/// Upper bound on assign/refresh rounds when settling at the follow edge.
const MAX_EDGE_PASSES: usize = 4;

/// Upper bound on range passes when the host clamps the offset mid-refresh.
const MAX_REFRESH_PASSES: usize = 3;

/// Offsets closer than this are treated as equal.
const SCROLL_EPSILON: f64 = 0.5;

/// How the first window of an initialization pass is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// Top of the given index is placed at the viewport top.
    Index(usize),
    /// Last item, then snap to the follow edge.
    FollowEdge,
}

/// Virtualized list engine bound to a host viewport.
pub struct VirtualScroll<H: ViewportHost> {
    config: VirtualScrollConfig,
    host: H,
    heights: HeightModel,
    scroll: ScrollCoordinator,
    load_more: LoadMoreTrigger,
    realized: RealizedElements,
    subscriptions: ResizeSubscriptions,
    sequence: SequenceSnapshot,
    render_range: Option<ItemRange>,
    visible_range: Option<ItemRange>,
    offsets: Offsets,
    clock: Duration,
    recalculating: bool,
    start_index_pending: bool,
    new_content: bool,
    listener: Option<VisibleRangeListener>,
    torn_down: bool,
}

impl<H: ViewportHost + fmt::Debug> fmt::Debug for VirtualScroll<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualScroll")
            .field("host", &self.host)
            .field("len", &self.sequence.len)
            .field("render_range", &self.render_range)
            .field("visible_range", &self.visible_range)
            .field("offsets", &self.offsets)
            .field("direction", &self.scroll.direction())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl<H: ViewportHost> VirtualScroll<H> {
    /// Bind an engine to `host`.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualScrollError::InvalidConfig`] listing every violation.
    pub fn new(config: VirtualScrollConfig, host: H) -> Result<Self, VirtualScrollError> {
        config
            .validate()
            .map_err(VirtualScrollError::InvalidConfig)?;
        Ok(Self {
            heights: HeightModel::new(config.default_item_height, config.height_lock_duration),
            scroll: ScrollCoordinator::new(
                config.stick_to_edge,
                config.edge_threshold,
                config.snap_tolerance,
            ),
            load_more: LoadMoreTrigger::new(
                config.load_more_debounce,
                config.edge_threshold,
                config.stick_to_edge,
            ),
            realized: RealizedElements::new(),
            subscriptions: ResizeSubscriptions::new(),
            sequence: SequenceSnapshot::default(),
            render_range: None,
            visible_range: None,
            offsets: Offsets::default(),
            clock: Duration::ZERO,
            recalculating: false,
            start_index_pending: config.start_index.is_some(),
            new_content: false,
            listener: None,
            torn_down: false,
            host,
            config,
        })
    }

    /// Install (or remove) the pagination source.
    pub fn set_fetch_more(&mut self, fetch: Option<FetchMore>) {
        self.load_more.set_fetch(fetch);
    }

    /// Install the visible-range listener.
    pub fn set_visible_range_listener(&mut self, listener: Option<VisibleRangeListener>) {
        self.listener = listener;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &VirtualScrollConfig {
        &self.config
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub fn heights(&self) -> &HeightModel {
        &self.heights
    }

    #[must_use]
    pub fn render_range(&self) -> Option<ItemRange> {
        self.render_range
    }

    #[must_use]
    pub fn visible_range(&self) -> Option<ItemRange> {
        self.visible_range
    }

    #[must_use]
    pub fn offsets(&self) -> Offsets {
        self.offsets
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.len == 0
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.render_range.is_some()
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    #[must_use]
    pub fn direction(&self) -> ScrollDirection {
        self.scroll.direction()
    }

    #[must_use]
    pub fn phase(&self) -> ScrollPhase {
        self.scroll.phase()
    }

    #[must_use]
    pub fn jump_target(&self) -> Option<usize> {
        self.scroll.jump_target()
    }

    /// Whether the "new content available" indicator is raised.
    #[must_use]
    pub fn has_new_content(&self) -> bool {
        self.new_content
    }

    /// Element currently realized for `index`.
    #[must_use]
    pub fn element(&self, index: usize) -> Option<ElementId> {
        self.realized.element(index)
    }

    #[must_use]
    pub fn realized_count(&self) -> usize {
        self.realized.len()
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Engine clock (sum of all `tick` deltas).
    #[must_use]
    pub fn clock(&self) -> Duration {
        self.clock
    }

    /// `content − scroll − viewport` for the follow edge, never negative.
    /// Zero when the viewport is gone.
    #[must_use]
    pub fn distance_from_edge(&self) -> f64 {
        self.host
            .metrics()
            .map_or(0.0, |m| m.distance_from_bottom())
    }

    #[must_use]
    pub fn is_near_edge(&self) -> bool {
        self.scroll.is_near_edge(self.distance_from_edge())
    }

    // ------------------------------------------------------------------
    // Event handlers
    // ------------------------------------------------------------------

    /// Scroll notification from the host.
    pub fn on_scroll(&mut self) {
        if self.torn_down {
            return;
        }
        let Some(metrics) = self.host.metrics() else {
            return;
        };
        if !self.scroll.observe_scroll(metrics.scroll_offset) {
            trace!(offset = metrics.scroll_offset, "programmatic scroll echo");
            return;
        }
        let distance = metrics.distance_from_bottom();
        self.scroll.record_distance(distance);
        if self.new_content && self.scroll.is_near_edge(distance) {
            self.set_new_content(false);
        }
        self.recalculate();
    }

    /// Resize batch for realized elements.
    pub fn on_resize(&mut self, elements: &[ElementId]) {
        if self.torn_down || self.host.metrics().is_none() {
            return;
        }
        self.scroll.set_phase(ScrollPhase::Measuring);
        let default_height = self.heights.default_height();
        let mut changed = false;
        for &element in elements {
            let Some(index) = self.realized.index_of(element) else {
                continue;
            };
            let Some(new_height) = self.host.measure(element) else {
                continue;
            };
            let previous = self.heights.measured(index);
            if previous.is_some_and(|h| (h - new_height).abs() < f64::EPSILON) {
                continue;
            }
            self.heights.set(index, new_height);
            changed = true;
            self.compensate_for_resize(index, previous.unwrap_or(default_height), new_height);
        }
        if changed {
            self.recalculate();
        }
        self.scroll.set_phase(ScrollPhase::Idle);
    }

    /// Attach/detach batch for the realized-item container.
    pub fn on_child_mutations(&mut self, mutations: &[ChildMutation]) {
        if self.torn_down {
            return;
        }
        let (added, removed) = self
            .subscriptions
            .apply(mutations, &self.realized, &mut self.host);
        if added + removed > 0 {
            trace!(added, removed, "resize subscriptions updated");
        }
    }

    /// The viewport itself changed size.
    pub fn on_viewport_resize(&mut self) {
        if self.torn_down {
            return;
        }
        let was_near = self.scroll.was_near_edge();
        self.recalculate();
        if self.config.stick_to_edge && was_near {
            self.scroll_to_edge();
        }
    }

    /// Observe the backing sequence and reconcile against the last view.
    pub fn on_sequence_changed<S: ItemSequence + ?Sized>(&mut self, sequence: &S) {
        if self.torn_down {
            return;
        }
        let new = SequenceSnapshot::of(sequence);
        let old = self.sequence;
        let change = classify(&old, &new, self.is_initialized());
        debug!(?change, old_len = old.len, new_len = new.len, "sequence changed");
        self.sequence = new;
        let len = new.len;

        match change {
            SequenceChange::Initialize => {
                self.heights.resize(len);
                self.recalculate();
            }
            SequenceChange::Replace => {
                self.heights.reset(len);
                self.release_window();
                self.render_range = None;
                self.scroll.set_jump_target(None);
                self.recalculate();
            }
            SequenceChange::Prepend { count } => self.reconcile_prepend(count),
            SequenceChange::Append { .. } => self.reconcile_append(),
            SequenceChange::Shrink { .. } => self.reconcile_shrink(),
            SequenceChange::Grow { .. } => {
                self.heights.resize(len);
                self.recalculate();
            }
        }

        if len == 0 {
            self.clear_window();
        }
    }

    /// Advance the engine clock by `dt`: expire height locks and run a due
    /// fetch-more.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualScrollError::FetchMore`] when the fetch source fails.
    /// Nothing is retried; the next qualifying pass re-arms the trigger.
    pub fn tick(&mut self, dt: Duration) -> Result<(), VirtualScrollError> {
        if self.torn_down {
            return Ok(());
        }
        self.clock = self.clock.saturating_add(dt);
        if self.heights.expire_locks(self.clock) {
            trace!("height locks expired");
            self.recalculate();
        }
        self.load_more.poll(self.clock).map(|_| ()).map_err(|err| {
            warn!(error = %err, "fetch-more failed");
            VirtualScrollError::FetchMore(err)
        })
    }

    // ------------------------------------------------------------------
    // Imperative navigation
    // ------------------------------------------------------------------

    /// Jump instantly to the follow edge.
    pub fn scroll_to_edge(&mut self) {
        if self.torn_down || self.recalculating {
            return;
        }
        self.recalculating = true;
        self.settle_at_edge();
        self.recalculating = false;
        if self.new_content {
            self.set_new_content(false);
        }
    }

    /// Re-initialize the window rooted at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualScrollError::IndexOutOfBounds`] unless
    /// `index < len`.
    pub fn jump_to_index(&mut self, index: usize) -> Result<(), VirtualScrollError> {
        if self.torn_down {
            return Ok(());
        }
        let len = self.sequence.len;
        if index >= len {
            return Err(VirtualScrollError::IndexOutOfBounds { index, len });
        }
        if self.host.metrics().is_none() {
            return Ok(());
        }
        debug!(index, "jump to index");
        self.scroll.reset_direction();
        self.heights.lock(index, self.clock);
        self.scroll.set_jump_target(Some(index));
        self.release_window();
        self.render_range = None;
        self.recalculate();
        Ok(())
    }

    /// Release every element and subscription, cancel timers, and report a
    /// final `None` visible range. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.subscriptions.release_all(&mut self.host);
        for element in self.realized.drain() {
            self.host.release(element);
        }
        self.heights.clear_locks();
        self.load_more.cancel();
        self.render_range = None;
        self.visible_range = None;
        if let Some(listener) = self.listener.as_mut() {
            listener(None);
        }
        debug!("teardown");
    }

    // ------------------------------------------------------------------
    // Recalculation
    // ------------------------------------------------------------------

    /// Recompute ranges and offsets from the current scroll position,
    /// initializing first if needed. No-op while another pass is running.
    pub fn recalculate(&mut self) {
        if self.torn_down || self.recalculating {
            return;
        }
        self.recalculating = true;
        let _span = debug_span!("vscroll.recalculate", len = self.sequence.len).entered();
        if self.render_range.is_some() || self.initialize() {
            self.refresh_window();
        }
        self.recalculating = false;
    }

    fn refresh_window(&mut self) {
        for _ in 0..MAX_REFRESH_PASSES {
            let Some(used) = self.refresh_once() else {
                return;
            };
            let Some(metrics) = self.host.metrics() else {
                return;
            };
            if (metrics.scroll_offset - used).abs() < SCROLL_EPSILON {
                break;
            }
            trace!(used, now = metrics.scroll_offset, "offset clamped while applying window");
        }
        if let Some(metrics) = self.host.metrics() {
            self.scroll.record_distance(metrics.distance_from_bottom());
            self.load_more.evaluate(&metrics, self.clock);
        }
    }

    /// One range pass. Returns the scroll offset it was computed for, or
    /// `None` if nothing was applied.
    fn refresh_once(&mut self) -> Option<f64> {
        let metrics = self.host.metrics()?;
        let len = self.sequence.len;
        let previous = self.render_range?;
        let input = RangeInput {
            scroll_offset: metrics.scroll_offset,
            viewport_height: metrics.viewport_height,
            render_distance: self.config.render_distance,
            len,
        };
        let (realized, host, heights) = (&self.realized, &self.host, &self.heights);
        let snapshot = calculate_ranges(input, |i| {
            realized
                .element(i)
                .and_then(|element| host.measure(element))
                .unwrap_or_else(|| heights.get(i))
        });
        if snapshot.is_degenerate(len) {
            debug!(?previous, ?snapshot, "degenerate range discarded");
            return None;
        }
        trace!(render = ?snapshot.render, visible = ?snapshot.visible, "ranges");
        self.apply_window(snapshot.render);
        self.set_visible(snapshot.visible);
        Some(metrics.scroll_offset)
    }

    /// Make `range` the realized window and push fresh offsets to the host.
    fn apply_window(&mut self, range: ItemRange) {
        self.render_range = Some(range);
        let mut dirty = false;
        for element in self.realized.retain_range(range) {
            self.host.release(element);
            dirty = true;
        }
        for index in self.realized.missing_in(range) {
            let element = self.host.render(index, self.heights.locked(index));
            self.realized.insert(index, element);
            dirty = true;
        }
        if dirty {
            self.host.commit();
        }
        self.apply_offsets();
    }

    fn apply_offsets(&mut self) {
        self.offsets = match self.render_range {
            Some(range) => Offsets::for_range(range, &self.heights),
            None => Offsets::default(),
        };
        self.host.apply_offsets(self.offsets);
    }

    fn set_visible(&mut self, visible: ItemRange) {
        if self.visible_range == Some(visible) {
            return;
        }
        self.visible_range = Some(visible);
        if let Some(listener) = self.listener.as_mut() {
            listener(Some(visible));
        }
    }

    fn set_new_content(&mut self, raised: bool) {
        self.new_content = raised;
        self.host.set_new_content_indicator(raised);
    }

    /// Drop every realized element.
    fn release_window(&mut self) {
        let elements = self.realized.drain();
        if elements.is_empty() {
            return;
        }
        for element in elements {
            self.host.release(element);
        }
        self.host.commit();
    }

    /// Empty sequence: nothing realized, no padding, empty visible range.
    fn clear_window(&mut self) {
        self.release_window();
        self.render_range = None;
        self.apply_offsets();
        self.set_visible(ItemRange::default());
    }

    // ------------------------------------------------------------------
    // Scroll assignment and compensation
    // ------------------------------------------------------------------

    /// Programmatic scroll. Arms suppression only if the offset will move.
    fn assign_scroll(&mut self, offset: f64) {
        let Some(metrics) = self.host.metrics() else {
            return;
        };
        let target = offset.clamp(0.0, metrics.max_scroll());
        if (target - metrics.scroll_offset).abs() < SCROLL_EPSILON {
            return;
        }
        self.scroll.suppress_next_scroll();
        self.host.set_scroll_offset(target);
    }

    fn settle_at_edge(&mut self) {
        for _ in 0..MAX_EDGE_PASSES {
            let Some(metrics) = self.host.metrics() else {
                return;
            };
            if !self.scroll.has_drifted(metrics.distance_from_bottom()) {
                break;
            }
            self.assign_scroll(metrics.max_scroll());
            self.refresh_window();
        }
        if let Some(metrics) = self.host.metrics() {
            self.scroll.record_distance(metrics.distance_from_bottom());
        }
    }

    fn compensate_for_resize(&mut self, index: usize, old_height: f64, new_height: f64) {
        let Some(metrics) = self.host.metrics() else {
            return;
        };
        let ctx = ResizeContext {
            index,
            old_height,
            new_height,
            render_start: self.render_range.map_or(0, |r| r.start),
            top_offset: self.offsets.top,
            scroll_offset: metrics.scroll_offset,
            distance: metrics.distance_from_bottom(),
            last_index: self.sequence.len.saturating_sub(1),
        };
        let decision = self.scroll.decide(&ctx);
        if decision == Compensation::None {
            return;
        }
        debug!(index, old_height, new_height, ?decision, "resize compensation");
        self.scroll.set_phase(ScrollPhase::Compensating);
        match decision {
            Compensation::AdjustBy(delta) => self.assign_scroll(metrics.scroll_offset + delta),
            Compensation::PinTo(target) => self.assign_scroll(self.heights.sum_range(0, target)),
            Compensation::SnapToEdge => self.assign_scroll(metrics.max_scroll()),
            Compensation::None => {}
        }
    }

    // ------------------------------------------------------------------
    // Reconciliation branches
    // ------------------------------------------------------------------

    fn reconcile_prepend(&mut self, count: usize) {
        self.heights.shift_right(count);
        self.scroll.shift_jump_target(count);
        let Some(range) = self.render_range else {
            self.recalculate();
            return;
        };
        // Realized elements now sit on different records; remount them.
        self.release_window();
        if self.config.stick_to_edge {
            let shifted = range.shifted(count).clamp_to(self.sequence.len);
            for index in shifted.as_range() {
                self.heights.lock(index, self.clock);
            }
            self.apply_window(shifted);
            // Estimate only; unmeasured items above are corrected as they
            // are realized.
            let estimate = count as f64 * self.heights.default_height();
            if let Some(metrics) = self.host.metrics() {
                self.assign_scroll(metrics.scroll_offset + estimate);
            }
        }
        self.recalculate();
    }

    fn reconcile_append(&mut self) {
        self.heights.resize(self.sequence.len);
        let was_near = self.scroll.was_near_edge();
        self.recalculate();
        let now_near = self.is_near_edge();
        // Only stick mode follows appends. A plain list near its end keeps
        // its offset and lets load-more page in below it.
        if self.config.stick_to_edge && (was_near || now_near) {
            self.scroll_to_edge();
        } else if !(was_near || now_near) && self.config.show_jump_to_new {
            self.set_new_content(true);
        }
    }

    fn reconcile_shrink(&mut self) {
        let len = self.sequence.len;
        let was_near = self.scroll.was_near_edge();
        self.heights.resize(len);
        if let Some(range) = self.render_range {
            let clamped = range.clamp_to(len);
            if !clamped.is_empty() {
                self.apply_window(clamped);
            } else if len > 0 {
                // Window fell off the end: hold the last item so the host
                // clamps the offset, then let the refresh recompute from there.
                self.apply_window(ItemRange::new(len - 1, len));
            } else {
                self.release_window();
                self.render_range = None;
            }
        }
        self.recalculate();
        if self.config.stick_to_edge
            && was_near
            && self.scroll.has_drifted(self.distance_from_edge())
        {
            self.scroll_to_edge();
        }
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    fn pick_anchor(&mut self, len: usize) -> Anchor {
        let last = len - 1;
        if let Some(target) = self.scroll.jump_target() {
            return Anchor::Index(target.min(last));
        }
        if self.start_index_pending {
            self.start_index_pending = false;
            if let Some(start) = self.config.start_index {
                let start = start.min(last);
                self.scroll.set_jump_target(Some(start));
                return Anchor::Index(start);
            }
        }
        if self.config.stick_to_edge {
            Anchor::FollowEdge
        } else {
            Anchor::Index(0)
        }
    }

    /// Seed the window around an anchor, realizing and measuring items until
    /// the viewport plus render distance is covered on both sides.
    ///
    /// Returns `false` (leaving the engine uninitialized) if the viewport is
    /// gone, the sequence is empty, or a realized element vanished before it
    /// could be measured.
    fn initialize(&mut self) -> bool {
        let len = self.sequence.len;
        if len == 0 {
            return false;
        }
        let Some(metrics) = self.host.metrics() else {
            return false;
        };
        let anchor = self.pick_anchor(len);
        let anchor_index = match anchor {
            Anchor::Index(index) => index,
            Anchor::FollowEdge => len - 1,
        };
        let _span = debug_span!("vscroll.initialize", len, anchor_index).entered();
        self.release_window();

        let default_height = self.heights.default_height();
        let below_target = metrics.viewport_height + self.config.render_distance;

        let mut end = anchor_index;
        let mut covered = 0.0;
        while end < len && covered < below_target {
            let batch = batch_size(below_target - covered, default_height);
            let batch_end = end.saturating_add(batch).min(len);
            let Some(height) = self.realize_and_measure(ItemRange::new(end, batch_end)) else {
                self.abort_initialization();
                return false;
            };
            covered += height;
            end = batch_end;
        }

        let above_target = self.config.render_distance + (below_target - covered).max(0.0);
        let mut start = anchor_index;
        let mut above = 0.0;
        while start > 0 && above < above_target {
            let batch = batch_size(above_target - above, default_height);
            let batch_start = start.saturating_sub(batch);
            let Some(height) = self.realize_and_measure(ItemRange::new(batch_start, start)) else {
                self.abort_initialization();
                return false;
            };
            above += height;
            start = batch_start;
        }

        let range = ItemRange::new(start, end);
        debug!(?range, ?anchor, "initialized");
        self.render_range = Some(range);
        self.apply_offsets();
        match anchor {
            Anchor::Index(index) => {
                let top = self.heights.sum_range(0, index);
                self.assign_scroll(top);
            }
            Anchor::FollowEdge => {
                if let Some(metrics) = self.host.metrics() {
                    self.assign_scroll(metrics.max_scroll());
                }
            }
        }
        if anchor == Anchor::FollowEdge {
            self.refresh_window();
            self.settle_at_edge();
        }
        if let Some(metrics) = self.host.metrics() {
            self.scroll.record_sample(metrics.scroll_offset);
        }
        true
    }

    /// Render every index of `range`, wait for the commit, and measure.
    /// Returns the summed height, or `None` on a measurement miss.
    fn realize_and_measure(&mut self, range: ItemRange) -> Option<f64> {
        for index in range.as_range() {
            if self.heights.measured(index).is_some() {
                self.heights.lock(index, self.clock);
            }
            let element = self.host.render(index, self.heights.locked(index));
            self.realized.insert(index, element);
        }
        self.host.commit();
        let mut total = 0.0;
        for index in range.as_range() {
            let measured = self
                .realized
                .element(index)
                .and_then(|element| self.host.measure(element));
            let Some(height) = measured else {
                warn!(index, "realized element missing after commit; aborting initialization");
                return None;
            };
            self.heights.set(index, height);
            total += height;
        }
        Some(total)
    }

    fn abort_initialization(&mut self) {
        self.release_window();
        self.render_range = None;
    }
}

impl<H: ViewportHost> Drop for VirtualScroll<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Items needed to cover `remaining` pixels at `default_height` each.
/// Saturates at `usize::MAX` for tiny heights; callers add with saturation.
fn batch_size(remaining: f64, default_height: f64) -> usize {
    if default_height <= 0.0 || !remaining.is_finite() {
        return 1;
    }
    ((remaining / default_height).ceil() as usize).max(1)
}

#[cfg(test)]
mod tests;
