#![forbid(unsafe_code)]

//! Deterministic test harness for `ftui-vscroll`.
//!
//! # Role in FrankenTUI
//! The windowing engine only talks to a [`ViewportHost`](ftui_vscroll::ViewportHost).
//! This crate supplies a headless one with exact, reproducible layout, a
//! [`Harness`] that drives it like a feed UI would, and JSONL traces that
//! replay a session and verify every step by checksum.
//!
//! # Primary responsibilities
//! - **HeadlessViewport**: clamped scrolling, commit/measure, queued
//!   attach/detach, resize and scroll notifications.
//! - **Harness**: feed mutations, user scrolls, clock advance, settling, and
//!   invariant checks.
//! - **Trace**: record and replay sessions.

pub mod harness;
pub mod logging;
pub mod trace;
pub mod viewport;

pub use harness::{FetchBehavior, Harness, MAX_SETTLE_ROUNDS};
pub use logging::init_test_tracing;
pub use trace::{
    ReplaySummary, StateDigest, TraceOp, TraceRecord, TraceRecorder, replay_trace,
    replay_trace_file,
};
pub use viewport::{HeadlessViewport, RenderedElement, ViewportStats};
