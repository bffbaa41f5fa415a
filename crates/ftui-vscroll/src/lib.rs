#![forbid(unsafe_code)]

//! Variable-height list windowing for feeds and long scrollback.
//!
//! # Role in FrankenTUI
//! `ftui-vscroll` decides which slice of a long, externally owned sequence is
//! realized at any moment, learns true item heights by measuring what the
//! host rendered, and keeps the visible content stable while heights settle,
//! items are prepended or appended, and the user scrolls.
//!
//! # Primary responsibilities
//! - **HeightModel**: per-index measurements with timed height locks.
//! - **Range calculation**: render/visible ranges in one accumulation pass.
//! - **ScrollCoordinator**: direction, follow-edge distance, and resize
//!   compensation with a fixed policy order.
//! - **Reconciliation**: classifying sequence changes by length, head and
//!   tail identity.
//! - **LoadMoreTrigger**: debounced pagination at the loading edge.
//! - **Observer glue**: resize subscriptions that follow attach/detach.
//!
//! # How it fits in the system
//! The engine owns no visuals. A host implements [`ViewportHost`] (realize,
//! release, measure, scroll) and forwards its notifications to the
//! [`VirtualScroll`] handlers. `ftui-vscroll-harness` provides a headless
//! host for deterministic scenario tests and trace replay.

pub mod config;
pub mod engine;
pub mod error;
pub mod height;
pub mod host;
pub mod load_more;
pub mod observer;
pub mod range;
pub mod reconcile;
pub mod scroll;
pub mod timer;

pub use config::{ConfigParse, VirtualScrollConfig};
pub use engine::{VirtualScroll, VisibleRangeListener};
pub use error::{ConfigError, FetchError, VirtualScrollError};
pub use height::HeightModel;
pub use host::{
    ChildMutation, ElementId, ItemId, ItemSequence, SliceSequence, ViewportHost, ViewportMetrics,
};
pub use load_more::{FetchMore, LoadMoreTrigger};
pub use range::{ItemRange, Offsets, RangeInput, RangeSnapshot, calculate_ranges};
pub use reconcile::{SequenceChange, SequenceSnapshot, classify};
pub use scroll::{Compensation, ScrollCoordinator, ScrollDirection, ScrollPhase};
