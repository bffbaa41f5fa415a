#![forbid(unsafe_code)]

//! Scroll direction tracking, follow-edge distance, and resize compensation.
//!
//! # State machine
//!
//! ```text
//! Idle ──resize batch──▶ Measuring ──policy fired──▶ Compensating
//!  ▲                        │                            │
//!  └────────no policy───────┘◀───────────done────────────┘
//! ```
//!
//! # Compensation priority
//!
//! [`ScrollCoordinator::decide`] evaluates three mutually exclusive policies
//! in a fixed order; the first that applies wins:
//!
//! 1. **Anchor while scrolling up**: the topmost realized item changed size
//!    and the viewport is not aligned to the unrealized-above padding. Shift
//!    the offset by the size delta.
//! 2. **Settle a jump**: a jump (or initial start index) is active and the
//!    user has not scrolled. Pin the offset to the jump target's top.
//! 3. **Follow the edge**: near the follow edge and not scrolling up, and
//!    either stick mode drifted past tolerance or the last item resized with
//!    a nonzero offset. Snap to the edge.
//!
//! # One-shot suppression
//!
//! Programmatic offset changes arm a flag that swallows the next scroll
//! notification, so compensation never feeds back into direction tracking.

/// Direction of the last user scroll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScrollDirection {
    Up,
    Down,
    /// Unchanged offset, first sample, or reset by a jump.
    #[default]
    Still,
}

/// Phase of the resize → compensation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrollPhase {
    #[default]
    Idle,
    Measuring,
    Compensating,
}

/// Action chosen for one item resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Compensation {
    None,
    /// Move the offset by this many pixels.
    AdjustBy(f64),
    /// Pin the offset to the top of this index.
    PinTo(usize),
    SnapToEdge,
}

/// Facts about one resize, gathered by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeContext {
    pub index: usize,
    pub old_height: f64,
    pub new_height: f64,
    /// First realized index.
    pub render_start: usize,
    /// Padding above the realized items.
    pub top_offset: f64,
    pub scroll_offset: f64,
    /// Current distance from the follow edge (after the resize).
    pub distance: f64,
    /// Index of the last item in the sequence.
    pub last_index: usize,
}

/// Tracks scroll direction and edge distance; decides compensations.
#[derive(Debug, Clone)]
pub struct ScrollCoordinator {
    direction: ScrollDirection,
    last_sample: Option<f64>,
    last_distance: f64,
    suppress_next: bool,
    jump_target: Option<usize>,
    phase: ScrollPhase,
    stick_to_edge: bool,
    edge_threshold: f64,
    snap_tolerance: f64,
}

impl ScrollCoordinator {
    #[must_use]
    pub fn new(stick_to_edge: bool, edge_threshold: f64, snap_tolerance: f64) -> Self {
        Self {
            direction: ScrollDirection::Still,
            last_sample: None,
            last_distance: 0.0,
            suppress_next: false,
            jump_target: None,
            phase: ScrollPhase::Idle,
            stick_to_edge,
            edge_threshold,
            snap_tolerance,
        }
    }

    #[must_use]
    pub fn direction(&self) -> ScrollDirection {
        self.direction
    }

    #[must_use]
    pub fn phase(&self) -> ScrollPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: ScrollPhase) {
        self.phase = phase;
    }

    #[must_use]
    pub fn stick_to_edge(&self) -> bool {
        self.stick_to_edge
    }

    /// Compare `offset` with the previous sample and update the direction.
    pub fn update_direction(&mut self, offset: f64) -> ScrollDirection {
        self.direction = match self.last_sample {
            Some(prev) if offset < prev => ScrollDirection::Up,
            Some(prev) if offset > prev => ScrollDirection::Down,
            _ => ScrollDirection::Still,
        };
        self.last_sample = Some(offset);
        self.direction
    }

    /// Handle a scroll notification.
    ///
    /// Returns `false` when the notification was the echo of a programmatic
    /// scroll and must not trigger recalculation. The sample is still
    /// recorded so the next user scroll is measured from the new offset.
    pub fn observe_scroll(&mut self, offset: f64) -> bool {
        if self.suppress_next {
            self.suppress_next = false;
            self.last_sample = Some(offset);
            return false;
        }
        if self.update_direction(offset) != ScrollDirection::Still {
            self.jump_target = None;
        }
        true
    }

    /// Take `offset` as the baseline for the next direction comparison
    /// without changing the direction.
    pub fn record_sample(&mut self, offset: f64) {
        self.last_sample = Some(offset);
    }

    /// Arm the one-shot suppression flag before a programmatic scroll.
    pub fn suppress_next_scroll(&mut self) {
        self.suppress_next = true;
    }

    #[must_use]
    pub fn is_suppressing(&self) -> bool {
        self.suppress_next
    }

    /// Forget direction (jumps, re-initialization).
    pub fn reset_direction(&mut self) {
        self.direction = ScrollDirection::Still;
    }

    /// Remember the latest distance from the follow edge.
    pub fn record_distance(&mut self, distance: f64) {
        self.last_distance = distance;
    }

    #[must_use]
    pub fn last_distance(&self) -> f64 {
        self.last_distance
    }

    #[must_use]
    pub fn is_near_edge(&self, distance: f64) -> bool {
        distance < self.edge_threshold
    }

    #[must_use]
    pub fn was_near_edge(&self) -> bool {
        self.is_near_edge(self.last_distance)
    }

    /// Whether the view drifted far enough from the edge to re-snap.
    #[must_use]
    pub fn has_drifted(&self, distance: f64) -> bool {
        distance > self.snap_tolerance
    }

    pub fn set_jump_target(&mut self, target: Option<usize>) {
        self.jump_target = target;
    }

    #[must_use]
    pub fn jump_target(&self) -> Option<usize> {
        self.jump_target
    }

    /// Shift the jump target after items were prepended.
    pub fn shift_jump_target(&mut self, delta: usize) {
        if let Some(target) = self.jump_target.as_mut() {
            *target += delta;
        }
    }

    /// Choose a compensation for one resized item, honoring the policy order.
    #[must_use]
    pub fn decide(&self, ctx: &ResizeContext) -> Compensation {
        if self.direction == ScrollDirection::Up
            && ctx.index == ctx.render_start
            && (ctx.scroll_offset - ctx.top_offset).abs() > 0.5
        {
            return Compensation::AdjustBy(ctx.new_height - ctx.old_height);
        }

        if let Some(target) = self.jump_target
            && self.direction == ScrollDirection::Still
        {
            return Compensation::PinTo(target);
        }

        if self.was_near_edge() && self.direction != ScrollDirection::Up {
            let drifted = self.stick_to_edge && self.has_drifted(ctx.distance);
            let last_resized = ctx.index == ctx.last_index && ctx.scroll_offset > 0.0;
            if drifted || last_resized {
                return Compensation::SnapToEdge;
            }
        }

        Compensation::None
    }
}
