//! Protocol event trace.
//!
//! One line per segment an endpoint sends, receives or (simulated-)drops:
//!
//! ```text
//! snd 0.00       SYN    40113    0
//! rcv 0.41       ACK    40114    0
//! snd 0.52       DATA   40114    1000
//! drp 12.07      ACK    41114    0
//! ```
//!
//! Columns: direction, milliseconds since the connection started, segment
//! type, sequence number, payload bytes.  Other tooling parses this format.
//!
//! The engines never touch a file directly; they append [`LogEntry`] values
//! to an injected [`EventSink`].

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use crate::packet::{Segment, SegmentType};
use crate::stats::Summary;

/// What happened to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Snd,
    Rcv,
    Drp,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Direction::Snd => "snd",
            Direction::Rcv => "rcv",
            Direction::Drp => "drp",
        })
    }
}

/// A single traced segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEvent {
    pub direction: Direction,
    pub elapsed: Duration,
    pub kind: SegmentType,
    pub seq: u16,
    pub len: usize,
}

impl fmt::Display for SegmentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.elapsed.as_secs_f64() * 1000.0;
        write!(
            f,
            "{:<3} {:<10.2} {:<6} {:<8} {}",
            self.direction, millis, self.kind, self.seq, self.len
        )
    }
}

/// Anything that can be appended to the event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Segment(SegmentEvent),
    Summary(Summary),
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEntry::Segment(event) => event.fmt(f),
            LogEntry::Summary(summary) => summary.fmt(f),
        }
    }
}

/// Append-only destination for log entries, shared by every duty of an
/// endpoint.
pub trait EventSink: Send + Sync {
    fn append(&self, entry: LogEntry);
}

/// Writes entries as text lines to a file.
#[derive(Debug)]
pub struct FileSink {
    out: Mutex<BufWriter<File>>,
}

impl FileSink {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl EventSink for FileSink {
    fn append(&self, entry: LogEntry) {
        let mut out = self.out.lock().unwrap_or_else(|p| p.into_inner());
        let mut written = writeln!(out, "{entry}");
        if written.is_ok() && matches!(entry, LogEntry::Summary(_)) {
            written = out.flush();
        }
        if let Err(e) = written {
            log::warn!("event log write failed: {e}");
        }
    }
}

/// Keeps entries in memory; used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Only the segment events, in append order.
    pub fn events(&self) -> Vec<SegmentEvent> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                LogEntry::Segment(event) => Some(event),
                LogEntry::Summary(_) => None,
            })
            .collect()
    }

    /// The last summary appended, if any.
    pub fn summary(&self) -> Option<Summary> {
        self.entries().into_iter().rev().find_map(|entry| match entry {
            LogEntry::Summary(summary) => Some(summary),
            LogEntry::Segment(_) => None,
        })
    }
}

impl EventSink for MemorySink {
    fn append(&self, entry: LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(entry);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn append(&self, _entry: LogEntry) {}
}

/// Timestamps events relative to the connection start and forwards them to
/// the sink.
#[derive(Clone)]
pub struct Trace {
    sink: Arc<dyn EventSink>,
    epoch: Arc<OnceLock<Instant>>,
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trace")
            .field("epoch", &self.epoch.get())
            .finish_non_exhaustive()
    }
}

impl Trace {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            epoch: Arc::new(OnceLock::new()),
        }
    }

    /// Mark the connection start.  Only the first call has an effect.
    pub fn start(&self) {
        self.epoch.get_or_init(Instant::now);
    }

    /// Time since [`start`](Self::start); zero before it.
    pub fn elapsed(&self) -> Duration {
        self.epoch.get().map_or(Duration::ZERO, Instant::elapsed)
    }

    pub fn record(&self, direction: Direction, segment: &Segment) {
        self.sink.append(LogEntry::Segment(SegmentEvent {
            direction,
            elapsed: self.elapsed(),
            kind: segment.kind,
            seq: segment.seq,
            len: segment.payload.len(),
        }));
    }

    pub fn summary(&self, summary: Summary) {
        self.sink.append(LogEntry::Summary(summary));
    }
}
