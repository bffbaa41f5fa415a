#![forbid(unsafe_code)]

//! Error types for the windowing engine.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Measurement miss | Realized element gone after commit | Init aborted, `warn!`, no error |
//! | Degenerate range | Empty/inverted render range | Result discarded, previous range kept |
//! | Fetch failure | Caller's fetch source failed | [`VirtualScrollError::FetchMore`] from `tick` |
//! | Teardown race | Viewport or sequence disappeared | Silent no-op |
//! | Bad jump target | `index >= len` | [`VirtualScrollError::IndexOutOfBounds`] |

use std::fmt;

/// Errors surfaced by [`VirtualScroll`](crate::VirtualScroll) operations.
///
/// Nothing here is fatal to the host: every variant leaves the engine in its
/// last good state.
#[derive(Debug, Clone, PartialEq)]
pub enum VirtualScrollError {
    /// `jump_to_index` was given an index outside the sequence.
    IndexOutOfBounds { index: usize, len: usize },
    /// The caller's fetch-more source reported a failure.
    FetchMore(FetchError),
    /// The configuration failed validation.
    InvalidConfig(Vec<ConfigError>),
}

impl fmt::Display for VirtualScrollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for sequence of length {len}")
            }
            Self::FetchMore(err) => write!(f, "fetch-more failed: {err}"),
            Self::InvalidConfig(errors) => {
                write!(f, "invalid config:")?;
                for err in errors {
                    write!(f, " {err};")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for VirtualScrollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FetchMore(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FetchError> for VirtualScrollError {
    fn from(err: FetchError) -> Self {
        Self::FetchMore(err)
    }
}

/// Failure reported by a caller-supplied fetch-more source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    message: String,
}

impl FetchError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FetchError {}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(
        field: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}
