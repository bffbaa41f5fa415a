#![forbid(unsafe_code)]

//! Classification of sequence changes between two observations.
//!
//! Only three facts are compared: length delta, identity of the first
//! record, and identity of the last record. That is enough to tell the
//! common feed mutations apart without diffing the sequence.
//!
//! | Change | Condition |
//! |--------|-----------|
//! | `Initialize` | not yet initialized, new sequence non-empty |
//! | `Replace` | head and tail both changed, old sequence non-empty |
//! | `Prepend` | head changed, tail kept, grew |
//! | `Append` | tail changed, head kept, grew |
//! | `Shrink` | did not grow |
//! | `Grow` | grew with head and tail kept (mid-sequence insert) |

use crate::host::{ItemId, ItemSequence};

/// The parts of a sequence observation the reconciler compares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SequenceSnapshot {
    pub len: usize,
    pub head: Option<ItemId>,
    pub tail: Option<ItemId>,
}

impl SequenceSnapshot {
    /// Observe `seq`.
    #[must_use]
    pub fn of<S: ItemSequence + ?Sized>(seq: &S) -> Self {
        let len = seq.len();
        if len == 0 {
            return Self::default();
        }
        Self {
            len,
            head: seq.identity(0),
            tail: seq.identity(len - 1),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// How the sequence changed since the last observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceChange {
    Initialize,
    Replace,
    Prepend { count: usize },
    Append { count: usize },
    Shrink { removed: usize },
    Grow { count: usize },
}

/// Classify the change from `old` to `new`.
///
/// `initialized` is whether the engine currently holds a render range.
#[must_use]
pub fn classify(
    old: &SequenceSnapshot,
    new: &SequenceSnapshot,
    initialized: bool,
) -> SequenceChange {
    let head_changed = old.head != new.head;
    let tail_changed = old.tail != new.tail;

    if !initialized && !new.is_empty() {
        return SequenceChange::Initialize;
    }
    if head_changed && tail_changed && !old.is_empty() {
        return SequenceChange::Replace;
    }
    if new.len > old.len {
        let count = new.len - old.len;
        if head_changed && !tail_changed {
            return SequenceChange::Prepend { count };
        }
        if tail_changed && !head_changed {
            return SequenceChange::Append { count };
        }
        return SequenceChange::Grow { count };
    }
    SequenceChange::Shrink {
        removed: old.len - new.len,
    }
}
