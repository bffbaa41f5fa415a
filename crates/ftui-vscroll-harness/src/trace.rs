#![forbid(unsafe_code)]

//! Session traces: JSONL recording and checksum-verified replay.
//!
//! A trace is one `header` record followed by one `step` record per
//! operation. Each step carries a digest of the settled engine state with an
//! FNV-1a checksum; replay re-runs the operations on a fresh [`Harness`] and
//! fails at the first step whose checksum or error differs.
//!
//! ```text
//! {"event":"header","version":1,"viewport_height":500.0,"config":{...},"fetch":{...},"items":[...]}
//! {"event":"step","seq":1,"op":{"op":"scroll_to","offset":2500.0},"error":null,"state":{...}}
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use ftui_vscroll::{ItemRange, Offsets, VirtualScrollConfig, VirtualScrollError};
use serde::{Deserialize, Serialize};

use crate::harness::{FetchBehavior, Harness};

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

pub const TRACE_VERSION: u32 = 1;

/// One harness operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceOp {
    ScrollTo { offset: f64 },
    ScrollBy { delta: f64 },
    ResizeViewport { height: f64 },
    SetItems { heights: Vec<f64> },
    Append { heights: Vec<f64> },
    Prepend { heights: Vec<f64> },
    Truncate { len: usize },
    SetItemHeight { index: usize, height: f64 },
    Advance { ms: u64 },
    JumpTo { index: usize },
    ScrollToEdge,
}

/// Settled engine state after one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDigest {
    pub len: usize,
    pub render: Option<ItemRange>,
    pub visible: Option<ItemRange>,
    pub scroll_offset: f64,
    pub offsets: Offsets,
    pub checksum: String,
}

impl StateDigest {
    #[must_use]
    pub fn capture(harness: &Harness) -> Self {
        let engine = harness.engine();
        let len = harness.len();
        let render = engine.render_range();
        let visible = engine.visible_range();
        let scroll_offset = harness.scroll_offset();
        let offsets = engine.offsets();

        let mut hash = FNV_OFFSET_BASIS;
        fnv1a_u64(&mut hash, len as u64);
        for range in [render, visible] {
            match range {
                Some(r) => {
                    fnv1a_u64(&mut hash, 1);
                    fnv1a_u64(&mut hash, r.start as u64);
                    fnv1a_u64(&mut hash, r.end as u64);
                }
                None => fnv1a_u64(&mut hash, 0),
            }
        }
        fnv1a_u64(&mut hash, scroll_offset.to_bits());
        fnv1a_u64(&mut hash, offsets.top.to_bits());
        fnv1a_u64(&mut hash, offsets.bottom.to_bits());
        for id in harness.ids() {
            fnv1a_u64(&mut hash, *id);
        }

        Self {
            len,
            render,
            visible,
            scroll_offset,
            offsets,
            checksum: format!("{hash:016x}"),
        }
    }
}

fn fnv1a_u64(hash: &mut u64, value: u64) {
    for byte in value.to_le_bytes() {
        *hash ^= u64::from(byte);
        *hash = hash.wrapping_mul(FNV_PRIME);
    }
}

/// One JSONL line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceRecord {
    Header {
        version: u32,
        viewport_height: f64,
        config: VirtualScrollConfig,
        fetch: FetchBehavior,
        items: Vec<f64>,
    },
    Step {
        seq: u64,
        op: TraceOp,
        error: Option<String>,
        state: StateDigest,
    },
}

/// Accumulates trace records in memory.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    records: Vec<TraceRecord>,
    seq: u64,
}

impl TraceRecorder {
    #[must_use]
    pub fn new(
        config: VirtualScrollConfig,
        viewport_height: f64,
        fetch: FetchBehavior,
        items: Vec<f64>,
    ) -> Self {
        Self {
            records: vec![TraceRecord::Header {
                version: TRACE_VERSION,
                viewport_height,
                config,
                fetch,
                items,
            }],
            seq: 0,
        }
    }

    pub fn record_step(
        &mut self,
        op: &TraceOp,
        error: Option<&VirtualScrollError>,
        state: StateDigest,
    ) {
        self.seq += 1;
        self.records.push(TraceRecord::Step {
            seq: self.seq,
            op: op.clone(),
            error: error.map(ToString::to_string),
            state,
        });
    }

    #[must_use]
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.seq
    }

    /// Serialize as JSONL.
    ///
    /// # Errors
    ///
    /// Fails only if a record cannot be serialized.
    pub fn to_jsonl(&self) -> io::Result<String> {
        let mut out = String::new();
        for record in &self.records {
            let line = serde_json::to_string(record)
                .map_err(|err| io::Error::other(format!("failed to serialize record: {err}")))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    /// Write the trace to `path`.
    ///
    /// # Errors
    ///
    /// Propagates I/O and serialization failures.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(self.to_jsonl()?.as_bytes())?;
        file.flush()
    }
}

/// Outcome of a successful replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub steps: u64,
    pub last_checksum: Option<String>,
}

/// Replay a JSONL trace and verify every step.
///
/// # Errors
///
/// Returns `InvalidData` for malformed records, a missing header, or the
/// first checksum/error mismatch.
pub fn replay_trace(reader: impl BufRead) -> io::Result<ReplaySummary> {
    let mut harness: Option<Harness> = None;
    let mut steps = 0u64;
    let mut last_checksum = None;

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: TraceRecord = serde_json::from_str(trimmed).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid JSONL at line {}: {err}", line_idx + 1),
            )
        })?;

        match record {
            TraceRecord::Header {
                version,
                viewport_height,
                config,
                fetch,
                items,
            } => {
                if harness.is_some() {
                    return Err(invalid(format!("duplicate header at line {}", line_idx + 1)));
                }
                if version != TRACE_VERSION {
                    return Err(invalid(format!("unsupported trace version {version}")));
                }
                let mut fresh = Harness::new(config, viewport_height)
                    .map_err(|err| invalid(format!("header config rejected: {err}")))?;
                // Same order as a recorded harness: seed the feed, then
                // install the fetch source.
                if !items.is_empty() {
                    fresh.set_items(&items);
                }
                fresh.set_fetch_behavior(fetch);
                harness = Some(fresh);
            }
            TraceRecord::Step {
                seq,
                op,
                error,
                state,
            } => {
                let Some(h) = harness.as_mut() else {
                    return Err(invalid(format!("step {seq} before header")));
                };
                let actual_error = h.apply(&op).err().map(|err| err.to_string());
                if actual_error != error {
                    return Err(invalid(format!(
                        "error mismatch at step {seq}: expected {error:?}, got {actual_error:?}"
                    )));
                }
                let actual = StateDigest::capture(h);
                if actual.checksum != state.checksum {
                    return Err(invalid(format!(
                        "checksum mismatch at step {seq}: expected {}, got {} (render {:?} vs {:?}, scroll {} vs {})",
                        state.checksum,
                        actual.checksum,
                        state.render,
                        actual.render,
                        state.scroll_offset,
                        actual.scroll_offset
                    )));
                }
                steps += 1;
                last_checksum = Some(actual.checksum);
            }
        }
    }

    if harness.is_none() {
        return Err(invalid("no header record found".to_string()));
    }
    Ok(ReplaySummary {
        steps,
        last_checksum,
    })
}

/// Replay a trace file.
///
/// # Errors
///
/// See [`replay_trace`]; also propagates open failures.
pub fn replay_trace_file(path: impl AsRef<Path>) -> io::Result<ReplaySummary> {
    replay_trace(BufReader::new(File::open(path)?))
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
