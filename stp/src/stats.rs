//! Transfer counters.
//!
//! Counters are plain atomics so every duty of an engine can bump them
//! without taking the connection lock.  They carry no protocol logic; at the
//! end of a run the engine turns them into a [`Summary`] that is appended to
//! the event log.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Labelled counter values, rendered as the trailing block of an event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub rows: Vec<(&'static str, u64)>,
}

impl Summary {
    /// Look a counter up by its label.
    pub fn get(&self, label: &str) -> Option<u64> {
        self.rows
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, value)| *value)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        write!(f, "--- Statistics ---")?;
        for (label, value) in &self.rows {
            write!(f, "\n{label}: {value}")?;
        }
        Ok(())
    }
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

/// Sender-side counters.
#[derive(Debug, Default)]
pub struct SenderStats {
    pub data_bytes_sent: AtomicU64,
    pub data_segments_sent: AtomicU64,
    pub retransmissions: AtomicU64,
    pub duplicate_acks: AtomicU64,
    pub acks_dropped: AtomicU64,
}

impl SenderStats {
    /// First transmission of a DATA segment.
    pub fn original_sent(&self, bytes: usize) {
        bump(&self.data_bytes_sent, bytes as u64);
        bump(&self.data_segments_sent, 1);
    }

    pub fn retransmitted(&self) {
        bump(&self.retransmissions, 1);
    }

    pub fn duplicate_ack(&self) {
        bump(&self.duplicate_acks, 1);
    }

    pub fn ack_dropped(&self) {
        bump(&self.acks_dropped, 1);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.data_bytes_sent.load(Ordering::Relaxed)
    }

    pub fn retransmission_count(&self) -> u64 {
        self.retransmissions.load(Ordering::Relaxed)
    }

    pub fn duplicate_ack_count(&self) -> u64 {
        self.duplicate_acks.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> Summary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Summary {
            rows: vec![
                ("Original Data Sent", load(&self.data_bytes_sent)),
                ("Original Data Segments Sent", load(&self.data_segments_sent)),
                ("Retransmitted Segments", load(&self.retransmissions)),
                ("Duplicate ACKs Received", load(&self.duplicate_acks)),
                ("ACKs Dropped", load(&self.acks_dropped)),
            ],
        }
    }
}

/// Receiver-side counters.
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub data_bytes_received: AtomicU64,
    pub data_segments_received: AtomicU64,
    pub duplicate_segments: AtomicU64,
    pub data_dropped: AtomicU64,
    pub acks_dropped: AtomicU64,
}

impl ReceiverStats {
    /// First arrival of a DATA segment's bytes.
    pub fn original_received(&self, bytes: usize) {
        bump(&self.data_bytes_received, bytes as u64);
        bump(&self.data_segments_received, 1);
    }

    pub fn duplicate(&self) {
        bump(&self.duplicate_segments, 1);
    }

    pub fn data_dropped(&self) {
        bump(&self.data_dropped, 1);
    }

    pub fn ack_dropped(&self) {
        bump(&self.acks_dropped, 1);
    }

    pub fn summary(&self) -> Summary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        Summary {
            rows: vec![
                ("Original Data Received", load(&self.data_bytes_received)),
                (
                    "Original Data Segments Received",
                    load(&self.data_segments_received),
                ),
                (
                    "Duplicate Data Segments Received",
                    load(&self.duplicate_segments),
                ),
                ("Data Segments Dropped", load(&self.data_dropped)),
                ("ACKs Dropped", load(&self.acks_dropped)),
            ],
        }
    }
}
