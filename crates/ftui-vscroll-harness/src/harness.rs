#![forbid(unsafe_code)]

//! Scenario driver: a [`VirtualScroll`] bound to a [`HeadlessViewport`] plus
//! a synthetic feed.
//!
//! Every operation runs the engine handler it corresponds to and then
//! [`Harness::settle`]s, delivering queued host notifications until the
//! viewport is quiet. Operations are [`TraceOp`]s so any session can be
//! recorded and replayed.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use ftui_vscroll::{
    ElementId, FetchError, ItemId, ItemRange, Offsets, SliceSequence, VirtualScroll,
    VirtualScrollConfig, VirtualScrollError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::trace::{StateDigest, TraceOp, TraceRecorder};
use crate::viewport::{HeadlessViewport, mark_reported};

/// Bound on notification rounds per operation.
pub const MAX_SETTLE_ROUNDS: usize = 64;

/// Pixel slack when comparing layout sums.
const LAYOUT_EPSILON: f64 = 1e-6;

/// What the synthetic feed does when the engine asks for more.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchBehavior {
    /// No fetch source installed.
    #[default]
    Disabled,
    /// Serve one page of items with these heights per request: older items
    /// at the head in stick-to-edge mode, newer items at the tail otherwise.
    Page { heights: Vec<f64> },
    /// Every request fails with this message.
    Fail { message: String },
}

#[derive(Debug)]
pub struct Harness {
    engine: VirtualScroll<HeadlessViewport>,
    ids: Vec<u64>,
    next_id: u64,
    fetch: FetchBehavior,
    requests: Rc<Cell<usize>>,
    recorder: Option<TraceRecorder>,
}

impl Harness {
    /// Empty feed in a viewport of `viewport_height` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualScrollError::InvalidConfig`] for a bad config.
    pub fn new(
        config: VirtualScrollConfig,
        viewport_height: f64,
    ) -> Result<Self, VirtualScrollError> {
        let engine = VirtualScroll::new(config, HeadlessViewport::new(viewport_height))?;
        Ok(Self {
            engine,
            ids: Vec::new(),
            next_id: 1,
            fetch: FetchBehavior::Disabled,
            requests: Rc::new(Cell::new(0)),
            recorder: None,
        })
    }

    /// Feed seeded with items of the given true heights.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualScrollError::InvalidConfig`] for a bad config.
    pub fn with_items(
        config: VirtualScrollConfig,
        viewport_height: f64,
        heights: &[f64],
    ) -> Result<Self, VirtualScrollError> {
        let mut harness = Self::new(config, viewport_height)?;
        harness.set_items(heights);
        Ok(harness)
    }

    /// Feed of `count` items, all `height` pixels tall.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualScrollError::InvalidConfig`] for a bad config.
    pub fn uniform(
        config: VirtualScrollConfig,
        viewport_height: f64,
        count: usize,
        height: f64,
    ) -> Result<Self, VirtualScrollError> {
        Self::with_items(config, viewport_height, &vec![height; count])
    }

    // ── Accessors ───────────────────────────────────────────────────────

    #[must_use]
    pub fn engine(&self) -> &VirtualScroll<HeadlessViewport> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut VirtualScroll<HeadlessViewport> {
        &mut self.engine
    }

    #[must_use]
    pub fn viewport(&self) -> &HeadlessViewport {
        self.engine.host()
    }

    pub fn viewport_mut(&mut self) -> &mut HeadlessViewport {
        self.engine.host_mut()
    }

    /// Identity of every record, in order.
    #[must_use]
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn render_range(&self) -> Option<ItemRange> {
        self.engine.render_range()
    }

    #[must_use]
    pub fn visible_range(&self) -> Option<ItemRange> {
        self.engine.visible_range()
    }

    #[must_use]
    pub fn scroll_offset(&self) -> f64 {
        self.viewport().scroll_offset()
    }

    /// Identity of the first visible record.
    #[must_use]
    pub fn first_visible_id(&self) -> Option<u64> {
        let visible = self.visible_range()?;
        if visible.is_empty() {
            return None;
        }
        self.ids.get(visible.start).copied()
    }

    /// Screen position of `index`'s top edge relative to the viewport top.
    #[must_use]
    pub fn screen_top(&self, index: usize) -> f64 {
        self.engine.heights().sum_range(0, index) - self.scroll_offset()
    }

    /// Fetch requests the engine made that have not been served.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.requests.get()
    }

    // ── Feed configuration ──────────────────────────────────────────────

    pub fn set_fetch_behavior(&mut self, behavior: FetchBehavior) {
        let fetch: Option<ftui_vscroll::FetchMore> = match &behavior {
            FetchBehavior::Disabled => None,
            FetchBehavior::Page { .. } => {
                let requests = Rc::clone(&self.requests);
                Some(Box::new(move || {
                    requests.set(requests.get() + 1);
                    Ok(())
                }))
            }
            FetchBehavior::Fail { message } => {
                let message = message.clone();
                Some(Box::new(move || Err(FetchError::new(message.clone()))))
            }
        };
        self.engine.set_fetch_more(fetch);
        self.fetch = behavior;
    }

    #[must_use]
    pub fn fetch_behavior(&self) -> &FetchBehavior {
        &self.fetch
    }

    // ── Recording ───────────────────────────────────────────────────────

    /// Start recording every subsequent operation.
    ///
    /// The header captures the config, viewport height, fetch behavior and
    /// the current feed. Replay rebuilds a harness from those alone, so start
    /// recording right after construction.
    pub fn start_recording(&mut self) {
        let header_items: Vec<f64> = self.viewport().heights().to_vec();
        self.recorder = Some(TraceRecorder::new(
            self.engine.config().clone(),
            self.viewport().viewport_height(),
            self.fetch.clone(),
            header_items,
        ));
    }

    pub fn take_trace(&mut self) -> Option<TraceRecorder> {
        self.recorder.take()
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// Run `op`, settle, and record the resulting state if recording.
    ///
    /// # Errors
    ///
    /// Propagates the engine error for `JumpTo` and `Advance`.
    pub fn apply(&mut self, op: &TraceOp) -> Result<(), VirtualScrollError> {
        debug!(?op, "harness op");
        let result = self.execute(op);
        self.settle();
        if self.recorder.is_some() {
            let digest = StateDigest::capture(self);
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.record_step(op, result.as_ref().err(), digest);
            }
        }
        result
    }

    pub fn scroll_to(&mut self, offset: f64) {
        self.run(TraceOp::ScrollTo { offset });
    }

    pub fn scroll_by(&mut self, delta: f64) {
        self.run(TraceOp::ScrollBy { delta });
    }

    pub fn resize_viewport(&mut self, height: f64) {
        self.run(TraceOp::ResizeViewport { height });
    }

    /// Replace the whole feed with fresh records.
    pub fn set_items(&mut self, heights: &[f64]) {
        self.run(TraceOp::SetItems {
            heights: heights.to_vec(),
        });
    }

    pub fn append(&mut self, heights: &[f64]) {
        self.run(TraceOp::Append {
            heights: heights.to_vec(),
        });
    }

    pub fn prepend(&mut self, heights: &[f64]) {
        self.run(TraceOp::Prepend {
            heights: heights.to_vec(),
        });
    }

    pub fn truncate(&mut self, len: usize) {
        self.run(TraceOp::Truncate { len });
    }

    pub fn set_item_height(&mut self, index: usize, height: f64) {
        self.run(TraceOp::SetItemHeight { index, height });
    }

    pub fn scroll_to_edge(&mut self) {
        self.run(TraceOp::ScrollToEdge);
    }

    /// Advance the engine clock, then serve any fetch requests.
    ///
    /// # Errors
    ///
    /// Returns [`VirtualScrollError::FetchMore`] when the feed fails.
    pub fn advance(&mut self, dt: Duration) -> Result<(), VirtualScrollError> {
        let ms = u64::try_from(dt.as_millis()).unwrap_or(u64::MAX);
        self.apply(&TraceOp::Advance { ms })
    }

    /// # Errors
    ///
    /// Returns [`VirtualScrollError::IndexOutOfBounds`] for a bad index.
    pub fn jump_to(&mut self, index: usize) -> Result<(), VirtualScrollError> {
        self.apply(&TraceOp::JumpTo { index })
    }

    pub fn teardown(&mut self) {
        self.engine.teardown();
        self.settle();
    }

    fn run(&mut self, op: TraceOp) {
        if let Err(err) = self.apply(&op) {
            warn!(error = %err, ?op, "harness op failed");
        }
    }

    fn execute(&mut self, op: &TraceOp) -> Result<(), VirtualScrollError> {
        match op {
            TraceOp::ScrollTo { offset } => self.viewport_mut().user_scroll(*offset),
            TraceOp::ScrollBy { delta } => {
                let target = self.scroll_offset() + delta;
                self.viewport_mut().user_scroll(target);
            }
            TraceOp::ResizeViewport { height } => {
                self.viewport_mut().set_viewport_height(*height);
                self.engine.on_viewport_resize();
            }
            TraceOp::SetItems { heights } => {
                self.ids = self.fresh_ids(heights.len());
                self.sync_sequence(heights.clone());
            }
            TraceOp::Append { heights } => self.append_records(heights),
            TraceOp::Prepend { heights } => self.prepend_records(heights),
            TraceOp::Truncate { len } => {
                let len = (*len).min(self.ids.len());
                self.ids.truncate(len);
                let mut all = self.viewport().heights().to_vec();
                all.truncate(len);
                self.sync_sequence(all);
            }
            TraceOp::SetItemHeight { index, height } => {
                self.viewport_mut().set_height(*index, *height);
            }
            TraceOp::Advance { ms } => {
                let result = self.engine.tick(Duration::from_millis(*ms));
                self.serve_requests();
                return result;
            }
            TraceOp::JumpTo { index } => return self.engine.jump_to_index(*index),
            TraceOp::ScrollToEdge => self.engine.scroll_to_edge(),
        }
        Ok(())
    }

    fn fresh_ids(&mut self, count: usize) -> Vec<u64> {
        let start = self.next_id;
        self.next_id += count as u64;
        (start..self.next_id).collect()
    }

    fn append_records(&mut self, heights: &[f64]) {
        let fresh = self.fresh_ids(heights.len());
        self.ids.extend(fresh);
        let mut all = self.viewport().heights().to_vec();
        all.extend_from_slice(heights);
        self.sync_sequence(all);
    }

    fn prepend_records(&mut self, heights: &[f64]) {
        let mut ids = self.fresh_ids(heights.len());
        ids.append(&mut self.ids);
        self.ids = ids;
        let mut all = heights.to_vec();
        all.extend_from_slice(self.viewport().heights());
        self.sync_sequence(all);
    }

    /// Publish the current records: the viewport re-renders bound elements
    /// with the new data, then the engine reconciles.
    fn sync_sequence(&mut self, heights: Vec<f64>) {
        self.engine.host_mut().set_heights(heights);
        let sequence = SliceSequence::new(&self.ids, |id: &u64| Some(ItemId(*id)));
        self.engine.on_sequence_changed(&sequence);
    }

    fn serve_requests(&mut self) {
        let pending = self.requests.replace(0);
        if pending == 0 {
            return;
        }
        let FetchBehavior::Page { heights } = self.fetch.clone() else {
            return;
        };
        for _ in 0..pending {
            if self.engine.config().stick_to_edge {
                self.prepend_records(&heights);
            } else {
                self.append_records(&heights);
            }
        }
    }

    /// Deliver queued host notifications until the viewport is quiet.
    /// Returns the number of rounds that delivered something.
    pub fn settle(&mut self) -> usize {
        for round in 0..MAX_SETTLE_ROUNDS {
            let mut delivered = false;

            let mutations = self.engine.host_mut().take_mutations();
            if !mutations.is_empty() {
                self.engine.on_child_mutations(&mutations);
                delivered = true;
            }

            let resizes = self.engine.host_mut().take_resizes();
            if !resizes.is_empty() {
                mark_reported(self.engine.host_mut(), &resizes);
                self.engine.on_resize(&resizes);
                delivered = true;
            }

            if self.engine.host_mut().take_scroll() {
                self.engine.on_scroll();
                delivered = true;
            }

            if !delivered {
                return round;
            }
        }
        warn!(
            rounds = MAX_SETTLE_ROUNDS,
            "viewport did not settle; notifications still pending"
        );
        MAX_SETTLE_ROUNDS
    }

    // ── Invariants ──────────────────────────────────────────────────────

    /// Structural invariants that must hold after every settled operation.
    /// Returns one message per violation.
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        let len = self.ids.len();
        let engine = &self.engine;
        let viewport = self.viewport();

        if engine.is_torn_down() {
            if !viewport.mounted_indices().is_empty() {
                out.push("elements mounted after teardown".to_string());
            }
            return out;
        }

        if let (Some(render), Some(visible)) = (engine.render_range(), engine.visible_range()) {
            if !(render.start <= visible.start
                && visible.start <= visible.end
                && visible.end <= render.end
                && render.end <= len)
            {
                out.push(format!(
                    "range order violated: render={render:?} visible={visible:?} len={len}"
                ));
            }
            let mounted = viewport.mounted_indices();
            if mounted != render.as_range().collect::<Vec<_>>() {
                out.push(format!(
                    "mounted {mounted:?} does not match render range {render:?}"
                ));
            }
            let expected = Offsets::for_range(render, engine.heights());
            let actual = engine.offsets();
            if (expected.top - actual.top).abs() > LAYOUT_EPSILON
                || (expected.bottom - actual.bottom).abs() > LAYOUT_EPSILON
            {
                out.push(format!(
                    "stale offsets: applied {actual:?}, model says {expected:?}"
                ));
            }
        } else if len > 0 && !viewport.is_detached() {
            out.push(format!("{len} items but engine is not initialized"));
        }

        if engine.heights().len() != len {
            out.push(format!(
                "height model tracks {} entries for {len} items",
                engine.heights().len()
            ));
        }

        for &element in viewport.subscribed() {
            if !is_realized(engine, element) {
                out.push(format!("subscribed element {element:?} is not realized"));
            }
        }

        let max_scroll = (viewport.content_height() - viewport.viewport_height()).max(0.0);
        let scroll = viewport.scroll_offset();
        if scroll < 0.0 || scroll > max_scroll + LAYOUT_EPSILON {
            out.push(format!("scroll {scroll} outside [0, {max_scroll}]"));
        }
        out
    }
}

fn is_realized(engine: &VirtualScroll<HeadlessViewport>, element: ElementId) -> bool {
    engine
        .host()
        .element(element)
        .is_some_and(|rendered| engine.element(rendered.index) == Some(element))
}
