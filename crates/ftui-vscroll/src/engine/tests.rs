use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use tracing_test::traced_test;

use super::*;
use crate::error::FetchError;
use crate::host::{ItemId, ViewportMetrics};

const MS: Duration = Duration::from_millis(1);

/// In-memory viewport: content height is padding plus the true height of
/// every live element; scroll notifications are coalesced into one flag.
#[derive(Debug)]
struct TestHost {
    true_heights: Vec<f64>,
    viewport: f64,
    scroll: f64,
    offsets: Offsets,
    live: BTreeMap<ElementId, usize>,
    next_id: u64,
    scroll_pending: bool,
    attached: bool,
    vanish_on_render: Option<usize>,
    hints: Vec<(usize, Option<f64>)>,
    unsubscribed: Vec<ElementId>,
    indicator: bool,
}

impl TestHost {
    fn new(viewport: f64, true_heights: Vec<f64>) -> Self {
        Self {
            true_heights,
            viewport,
            scroll: 0.0,
            offsets: Offsets::default(),
            live: BTreeMap::new(),
            next_id: 1,
            scroll_pending: false,
            attached: true,
            vanish_on_render: None,
            hints: Vec::new(),
            unsubscribed: Vec::new(),
            indicator: false,
        }
    }

    fn content(&self) -> f64 {
        let rendered: f64 = self
            .live
            .values()
            .map(|&i| self.true_heights.get(i).copied().unwrap_or(0.0))
            .sum();
        self.offsets.top + rendered + self.offsets.bottom
    }

    fn clamp_scroll(&mut self) {
        let max = (self.content() - self.viewport).max(0.0);
        let clamped = self.scroll.clamp(0.0, max);
        if clamped != self.scroll {
            self.scroll = clamped;
            self.scroll_pending = true;
        }
    }
}

impl ViewportHost for TestHost {
    fn metrics(&self) -> Option<ViewportMetrics> {
        self.attached.then(|| ViewportMetrics {
            scroll_offset: self.scroll,
            viewport_height: self.viewport,
            content_height: self.content(),
        })
    }

    fn set_scroll_offset(&mut self, offset: f64) {
        let max = (self.content() - self.viewport).max(0.0);
        let target = offset.clamp(0.0, max);
        if target != self.scroll {
            self.scroll = target;
            self.scroll_pending = true;
        }
    }

    fn apply_offsets(&mut self, offsets: Offsets) {
        self.offsets = offsets;
        self.clamp_scroll();
    }

    fn render(&mut self, index: usize, height_hint: Option<f64>) -> ElementId {
        let element = ElementId(self.next_id);
        self.next_id += 1;
        self.hints.push((index, height_hint));
        if self.vanish_on_render != Some(index) {
            self.live.insert(element, index);
        }
        element
    }

    fn release(&mut self, element: ElementId) {
        self.live.remove(&element);
    }

    fn commit(&mut self) {}

    fn measure(&self, element: ElementId) -> Option<f64> {
        let index = *self.live.get(&element)?;
        self.true_heights.get(index).copied()
    }

    fn subscribe_resize(&mut self, _element: ElementId) {}

    fn unsubscribe_resize(&mut self, element: ElementId) {
        self.unsubscribed.push(element);
    }

    fn set_new_content_indicator(&mut self, visible: bool) {
        self.indicator = visible;
    }
}

struct Ids(Vec<u64>);

impl ItemSequence for Ids {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn identity(&self, index: usize) -> Option<ItemId> {
        self.0.get(index).map(|&id| ItemId(id))
    }
}

type Engine = VirtualScroll<TestHost>;

fn pump(engine: &mut Engine) {
    for _ in 0..8 {
        if !std::mem::take(&mut engine.host_mut().scroll_pending) {
            break;
        }
        engine.on_scroll();
    }
}

fn user_scroll(engine: &mut Engine, offset: f64) {
    engine.host_mut().set_scroll_offset(offset);
    pump(engine);
}

fn set_items(engine: &mut Engine, ids: std::ops::Range<u64>, height: f64) {
    let ids: Vec<u64> = ids.collect();
    engine.host_mut().true_heights = vec![height; ids.len()];
    engine.on_sequence_changed(&Ids(ids));
    pump(engine);
}

fn engine_with(config: VirtualScrollConfig, count: u64) -> Engine {
    let mut engine = VirtualScroll::new(config, TestHost::new(500.0, Vec::new())).unwrap();
    set_items(&mut engine, 0..count, 50.0);
    engine
}

fn recorder(engine: &mut Engine) -> Rc<RefCell<Vec<Option<ItemRange>>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    engine.set_visible_range_listener(Some(Box::new(move |range| {
        sink.borrow_mut().push(range);
    })));
    seen
}

#[test]
fn invalid_config_is_rejected() {
    let config = VirtualScrollConfig::new(0.0);
    let err = VirtualScroll::new(config, TestHost::new(500.0, Vec::new())).unwrap_err();
    assert!(matches!(err, VirtualScrollError::InvalidConfig(ref errors) if !errors.is_empty()));
}

#[test]
fn initialization_fills_viewport() {
    let engine = engine_with(VirtualScrollConfig::default(), 100);
    assert_eq!(engine.render_range(), Some(ItemRange::new(0, 10)));
    assert_eq!(engine.visible_range(), Some(ItemRange::new(0, 10)));
    assert_eq!(engine.offsets(), Offsets { top: 0.0, bottom: 4_500.0 });
    assert_eq!(engine.realized_count(), 10);
    assert_eq!(engine.heights().measured_count(), 10);
    assert_eq!(engine.host().scroll, 0.0);
}

#[test]
fn deep_scroll_realizes_only_visible_items() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 10_000);
    user_scroll(&mut engine, 25_000.0);
    let render = engine.render_range().unwrap();
    assert_eq!(render.start, 500);
    assert_eq!(engine.visible_range(), Some(ItemRange::new(500, 510)));
    assert_eq!(engine.realized_count(), render.len());
    assert_eq!(engine.offsets().top, 25_000.0);
    assert_eq!(engine.direction(), ScrollDirection::Down);
}

#[test]
fn scrolling_up_anchors_resized_top_item() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 100);
    user_scroll(&mut engine, 1_000.0);
    user_scroll(&mut engine, 990.0);
    assert_eq!(engine.direction(), ScrollDirection::Up);
    assert_eq!(engine.render_range().unwrap().start, 19);

    let element = engine.element(19).unwrap();
    engine.host_mut().true_heights[19] = 80.0;
    engine.on_resize(&[element]);
    pump(&mut engine);

    assert_eq!(engine.host().scroll, 1_020.0);
    assert_eq!(engine.heights().measured(19), Some(80.0));
    // The compensation echo did not count as a user scroll.
    assert_eq!(engine.direction(), ScrollDirection::Up);
    assert_eq!(engine.phase(), ScrollPhase::Idle);
}

#[test]
fn unchanged_resize_is_ignored() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 100);
    let element = engine.element(3).unwrap();
    engine.on_resize(&[element, ElementId(9_999)]);
    assert_eq!(engine.host().scroll, 0.0);
    assert_eq!(engine.heights().measured(3), Some(50.0));
}

#[test]
fn jump_to_index_positions_target_at_top() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 10_000);
    engine.jump_to_index(5_000).unwrap();
    pump(&mut engine);

    assert_eq!(engine.host().scroll, 250_000.0);
    assert!(engine.render_range().unwrap().contains(5_000));
    assert_eq!(engine.visible_range().unwrap().start, 5_000);
    assert_eq!(engine.direction(), ScrollDirection::Still);
    assert_eq!(engine.jump_target(), Some(5_000));

    user_scroll(&mut engine, 250_100.0);
    assert_eq!(engine.jump_target(), None);
}

#[test]
fn jump_out_of_bounds_fails() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 10);
    assert_eq!(
        engine.jump_to_index(10),
        Err(VirtualScrollError::IndexOutOfBounds { index: 10, len: 10 })
    );
}

#[test]
fn jump_locks_and_hints_measured_target() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 100);
    engine.jump_to_index(5).unwrap();
    pump(&mut engine);
    assert_eq!(engine.heights().locked(5), Some(50.0));
    assert!(engine.host().hints.contains(&(5, Some(50.0))));

    engine.tick(250 * MS).unwrap();
    assert_eq!(engine.heights().locked(5), None);
}

#[test]
fn start_index_overrides_first_render_only() {
    let config = VirtualScrollConfig::default()
        .with_stick_to_edge(true)
        .with_start_index(40);
    let mut engine = engine_with(config, 100);
    assert_eq!(engine.host().scroll, 2_000.0);
    assert_eq!(engine.visible_range().unwrap().start, 40);

    // A full replace re-initializes at the follow edge.
    set_items(&mut engine, 1_000..1_100, 50.0);
    assert_eq!(engine.host().scroll, 4_500.0);
    assert_eq!(engine.render_range().unwrap().end, 100);
}

#[test]
fn stick_mode_starts_at_edge() {
    let config = VirtualScrollConfig::default().with_stick_to_edge(true);
    let engine = engine_with(config, 100);
    assert_eq!(engine.host().scroll, 4_500.0);
    assert_eq!(engine.visible_range(), Some(ItemRange::new(90, 100)));
    assert_eq!(engine.distance_from_edge(), 0.0);
}

#[test]
fn stick_mode_follows_append() {
    let config = VirtualScrollConfig::default().with_stick_to_edge(true);
    let mut engine = engine_with(config, 100);
    set_items(&mut engine, 0..101, 50.0);
    assert_eq!(engine.host().scroll, 4_550.0);
    assert_eq!(engine.render_range().unwrap().end, 101);
    assert_eq!(engine.distance_from_edge(), 0.0);
    assert!(!engine.has_new_content());
}

#[test]
fn single_item_feed_append() {
    let config = VirtualScrollConfig::default().with_stick_to_edge(true);
    let mut engine = engine_with(config, 1);
    assert_eq!(engine.render_range(), Some(ItemRange::new(0, 1)));
    set_items(&mut engine, 0..2, 50.0);
    assert_eq!(engine.render_range().unwrap().end, 2);
    assert_eq!(engine.distance_from_edge(), 0.0);
}

#[test]
fn append_away_from_edge_raises_indicator() {
    let config = VirtualScrollConfig::default()
        .with_stick_to_edge(true)
        .with_show_jump_to_new(true);
    let mut engine = engine_with(config, 100);
    user_scroll(&mut engine, 0.0);
    set_items(&mut engine, 0..101, 50.0);

    assert_eq!(engine.host().scroll, 0.0);
    assert!(engine.has_new_content());
    assert!(engine.host().indicator);

    engine.scroll_to_edge();
    pump(&mut engine);
    assert_eq!(engine.distance_from_edge(), 0.0);
    assert!(!engine.has_new_content());
    assert!(!engine.host().indicator);
}

#[test]
fn stick_mode_prepend_keeps_items_in_place() {
    let config = VirtualScrollConfig::default().with_stick_to_edge(true);
    let mut engine = engine_with(config, 100);
    engine.host_mut().true_heights = vec![50.0; 110];
    // Ten older records arrive at the head; the tail is unchanged.
    let mut ids: Vec<u64> = (10_000..10_010).collect();
    ids.extend(0..100);
    engine.on_sequence_changed(&Ids(ids));
    pump(&mut engine);

    assert_eq!(engine.host().scroll, 5_000.0);
    assert_eq!(engine.visible_range(), Some(ItemRange::new(100, 110)));
    assert_eq!(engine.heights().len(), 110);
    assert_eq!(engine.heights().measured(0), None);
    assert_eq!(engine.heights().measured(100), Some(50.0));
}

#[test]
fn prepend_without_stick_rerenders_top() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 100);
    let before = engine.element(0);
    engine.host_mut().true_heights = vec![50.0; 105];
    let mut ids: Vec<u64> = (10_000..10_005).collect();
    ids.extend(0..100);
    engine.on_sequence_changed(&Ids(ids));
    pump(&mut engine);

    assert_eq!(engine.host().scroll, 0.0);
    assert_eq!(engine.render_range(), Some(ItemRange::new(0, 10)));
    assert_ne!(engine.element(0), before);
}

#[test]
fn replace_resets_heights() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 100);
    user_scroll(&mut engine, 2_000.0);
    let element = engine.element(40).unwrap();
    engine.host_mut().true_heights[40] = 90.0;
    engine.on_resize(&[element]);
    pump(&mut engine);
    assert_eq!(engine.heights().measured(40), Some(90.0));

    set_items(&mut engine, 500..560, 50.0);
    assert_eq!(engine.heights().len(), 60);
    assert_eq!(engine.heights().measured(40), None);
    assert_eq!(engine.heights().measured_count(), 10);
    assert_eq!(engine.render_range(), Some(ItemRange::new(0, 10)));
    assert_eq!(engine.host().scroll, 0.0);
}

#[test]
fn shrink_clamps_window() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 100);
    user_scroll(&mut engine, 4_500.0);
    set_items(&mut engine, 0..95, 50.0);
    assert_eq!(engine.render_range().unwrap().end, 95);
    assert_eq!(engine.host().scroll, 4_250.0);
    assert_eq!(engine.offsets().bottom, 0.0);
}

#[test]
fn emptied_sequence_clears_window() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 20);
    let seen = recorder(&mut engine);
    set_items(&mut engine, 0..0, 50.0);
    assert!(!engine.is_initialized());
    assert_eq!(engine.realized_count(), 0);
    assert_eq!(engine.offsets(), Offsets::default());
    assert_eq!(seen.borrow().last(), Some(&Some(ItemRange::default())));

    set_items(&mut engine, 0..20, 50.0);
    assert_eq!(engine.render_range(), Some(ItemRange::new(0, 10)));
}

#[test]
fn missing_viewport_defers_initialization() {
    let mut engine =
        VirtualScroll::new(VirtualScrollConfig::default(), TestHost::new(500.0, Vec::new()))
            .unwrap();
    engine.host_mut().attached = false;
    set_items(&mut engine, 0..50, 50.0);
    assert!(!engine.is_initialized());
    assert_eq!(engine.jump_to_index(3), Ok(()));

    engine.host_mut().attached = true;
    engine.recalculate();
    assert_eq!(engine.render_range(), Some(ItemRange::new(0, 10)));
}

#[test]
#[traced_test]
fn measurement_miss_aborts_initialization() {
    let mut engine =
        VirtualScroll::new(VirtualScrollConfig::default(), TestHost::new(500.0, Vec::new()))
            .unwrap();
    engine.host_mut().vanish_on_render = Some(4);
    set_items(&mut engine, 0..50, 50.0);

    assert!(!engine.is_initialized());
    assert_eq!(engine.realized_count(), 0);
    assert!(engine.host().live.is_empty());
    assert!(logs_contain("aborting initialization"));

    engine.host_mut().vanish_on_render = None;
    engine.recalculate();
    assert!(engine.is_initialized());
}

#[test]
fn visible_range_listener_fires_on_change_only() {
    let mut engine = VirtualScroll::new(
        VirtualScrollConfig::default(),
        TestHost::new(500.0, Vec::new()),
    )
    .unwrap();
    let seen = recorder(&mut engine);
    set_items(&mut engine, 0..100, 50.0);
    engine.recalculate();
    assert_eq!(*seen.borrow(), vec![Some(ItemRange::new(0, 10))]);

    user_scroll(&mut engine, 100.0);
    assert_eq!(seen.borrow().last(), Some(&Some(ItemRange::new(2, 12))));
}

#[test]
fn subscriptions_track_realized_elements() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 100);
    let mut mutations: Vec<ChildMutation> = (0..10)
        .filter_map(|i| engine.element(i))
        .map(ChildMutation::Attached)
        .collect();
    mutations.push(ChildMutation::Attached(ElementId(77_777)));
    engine.on_child_mutations(&mutations);
    assert_eq!(engine.subscription_count(), 10);

    let gone = engine.element(0).unwrap();
    engine.on_child_mutations(&[ChildMutation::Detached(gone)]);
    assert_eq!(engine.subscription_count(), 9);
    assert_eq!(engine.host().unsubscribed, vec![gone]);
}

#[test]
fn fetch_more_is_debounced() {
    let mut engine = VirtualScroll::new(
        VirtualScrollConfig::default(),
        TestHost::new(500.0, Vec::new()),
    )
    .unwrap();
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    engine.set_fetch_more(Some(Box::new(move || {
        *counter.borrow_mut() += 1;
        Ok(())
    })));
    // Five short items never fill the viewport.
    set_items(&mut engine, 0..5, 50.0);

    engine.tick(30 * MS).unwrap();
    assert_eq!(*calls.borrow(), 0);
    engine.tick(30 * MS).unwrap();
    assert_eq!(*calls.borrow(), 1);
    engine.tick(100 * MS).unwrap();
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn fetch_more_failure_is_surfaced() {
    let mut engine = VirtualScroll::new(
        VirtualScrollConfig::default(),
        TestHost::new(500.0, Vec::new()),
    )
    .unwrap();
    engine.set_fetch_more(Some(Box::new(|| Err(FetchError::new("offline")))));
    set_items(&mut engine, 0..5, 50.0);

    let err = engine.tick(60 * MS).unwrap_err();
    assert_eq!(err, VirtualScrollError::FetchMore(FetchError::new("offline")));
    assert_eq!(engine.tick(60 * MS), Ok(()));
}

#[test]
fn viewport_shrink_keeps_stick_at_edge() {
    let config = VirtualScrollConfig::default().with_stick_to_edge(true);
    let mut engine = engine_with(config, 100);
    engine.host_mut().viewport = 300.0;
    engine.on_viewport_resize();
    pump(&mut engine);
    assert_eq!(engine.host().scroll, 4_700.0);
    assert_eq!(engine.distance_from_edge(), 0.0);
}

#[test]
fn teardown_releases_everything_once() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 100);
    let seen = recorder(&mut engine);
    let attached: Vec<ChildMutation> = (0..10)
        .filter_map(|i| engine.element(i))
        .map(ChildMutation::Attached)
        .collect();
    engine.on_child_mutations(&attached);

    engine.teardown();
    assert!(engine.is_torn_down());
    assert!(engine.host().live.is_empty());
    assert_eq!(engine.host().unsubscribed.len(), 10);
    assert_eq!(engine.subscription_count(), 0);
    assert_eq!(*seen.borrow(), vec![None]);

    // Late events are ignored.
    engine.teardown();
    engine.on_scroll();
    set_items(&mut engine, 0..200, 50.0);
    assert_eq!(engine.jump_to_index(150), Ok(()));
    assert_eq!(engine.tick(MS), Ok(()));
    assert_eq!(*seen.borrow(), vec![None]);
    assert!(engine.host().live.is_empty());
}

#[test]
fn drop_tears_down() {
    let mut engine = engine_with(VirtualScrollConfig::default(), 10);
    let seen = recorder(&mut engine);
    drop(engine);
    assert_eq!(*seen.borrow(), vec![None]);
}

#[test]
fn batch_size_covers_remaining() {
    assert_eq!(batch_size(500.0, 50.0), 10);
    assert_eq!(batch_size(501.0, 50.0), 11);
    assert_eq!(batch_size(0.1, 50.0), 1);
    assert_eq!(batch_size(f64::INFINITY, 50.0), 1);
    assert_eq!(batch_size(500.0, 1e-300), usize::MAX);
}

#[test]
fn tiny_default_height_packs_without_overflow() {
    let mut engine = engine_with(VirtualScrollConfig::new(1e-300), 100);
    engine.jump_to_index(50).unwrap();
    pump(&mut engine);
    let range = engine.render_range().unwrap();
    assert!(range.start <= 50 && 50 < range.end && range.end <= 100, "{range:?}");
    assert_eq!(engine.visible_range().unwrap().start, 50);

    let stick = engine_with(VirtualScrollConfig::new(1e-300).with_stick_to_edge(true), 100);
    assert_eq!(stick.render_range().map(|r| r.end), Some(100));

    let wide = engine_with(
        VirtualScrollConfig::default()
            .with_render_distance(1e300)
            .with_start_index(40),
        100,
    );
    assert_eq!(wide.render_range(), Some(ItemRange::new(0, 100)));
}

#[test]
fn resize_above_settling_jump_pins_to_target() {
    let config = VirtualScrollConfig::default().with_render_distance(200.0);
    let mut engine = engine_with(config, 10_000);
    engine.jump_to_index(500).unwrap();
    pump(&mut engine);
    assert_eq!(engine.host().scroll, 25_000.0);
    assert_eq!(engine.direction(), ScrollDirection::Still);
    assert!(engine.render_range().unwrap().start <= 496);

    let element = engine.element(496).unwrap();
    engine.host_mut().true_heights[496] = 80.0;
    engine.on_resize(&[element]);
    pump(&mut engine);

    assert_eq!(engine.heights().measured(496), Some(80.0));
    assert_eq!(engine.host().scroll, 25_030.0);
    assert_eq!(engine.host().scroll, engine.heights().sum_range(0, 500));
    assert_eq!(engine.visible_range().unwrap().start, 500);
}
