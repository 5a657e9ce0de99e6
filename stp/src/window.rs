//! Sliding send window.
//!
//! [`SendWindow`] holds every DATA segment that has been sent but not yet
//! cumulatively acknowledged, together with the two window edges.  It is the
//! single piece of state the sender's producer, ACK handler and timeout sweep
//! share; they reach it through one lock and only through the operations
//! below, never by iterating the queue themselves.
//!
//! # Protocol contract
//!
//! - New segments are admitted while `next_seq - base < max_window`; a
//!   segment may therefore end past the window edge.
//! - ACKs are **cumulative**: `ack = K` means every byte before `K` arrived.
//! - An ACK equal to the previous ACK value is a duplicate.  Duplicates are
//!   counted, never acted on: only the timeout sweep retransmits.
//! - Expired segments are retransmitted individually and unchanged.
//!
//! This module only manages state; all socket I/O is the caller's job.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::packet::Segment;
use crate::seq::{seq_add, seq_le, seq_lt};

/// A single in-flight segment.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub segment: Segment,
    /// Total transmissions so far (1 = only the original send).
    pub transmissions: u32,
    /// Time of the most recent transmission.
    pub sent_at: Instant,
}

impl InFlight {
    fn end(&self) -> u16 {
        seq_add(self.segment.seq, self.segment.payload.len())
    }
}

/// What an inbound ACK did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The base moved forward; `evicted` segments left the window.
    Advanced { evicted: usize },
    /// Same value as the previous ACK.
    Duplicate,
    /// Below the current base: an old ACK overtaken by newer ones.
    Stale,
    /// Beyond anything sent; ignored.
    OutOfRange,
}

/// A segment the sweep decided to send again.
#[derive(Debug, Clone)]
pub struct Retransmit {
    pub segment: Segment,
    /// Transmissions including this one.
    pub transmissions: u32,
}

/// Send-side window for one connection.
///
/// ```text
///    base               next_seq
///      │                   │
///  ────┼───────────────────┼──────────────────▶ seq space (mod 65536)
///      │ <── in flight ──▶ │ <── admissible ──▶ base + max_window
/// ```
#[derive(Debug)]
pub struct SendWindow {
    base: u16,
    next_seq: u16,
    max_window: usize,
    last_ack: u16,
    in_flight: VecDeque<InFlight>,
}

impl SendWindow {
    /// Create an empty window whose first data byte is `start` (ISN + 1).
    ///
    /// The handshake ACK carried `start`, so it counts as the previous ACK.
    pub fn new(start: u16, max_window: usize) -> Self {
        Self {
            base: start,
            next_seq: start,
            max_window,
            last_ack: start,
            in_flight: VecDeque::new(),
        }
    }

    /// Lowest unacknowledged offset.
    pub fn base(&self) -> u16 {
        self.base
    }

    /// Offset the next new segment will carry.
    pub fn next_seq(&self) -> u16 {
        self.next_seq
    }

    /// Bytes sent but not yet acknowledged.
    pub fn in_flight_bytes(&self) -> usize {
        usize::from(self.next_seq.wrapping_sub(self.base))
    }

    /// Number of segments awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// `true` when `next_seq` still lies inside `[base, base + max_window)`.
    pub fn admits(&self) -> bool {
        self.in_flight_bytes() < self.max_window
    }

    /// `true` once everything sent has been acknowledged.
    pub fn is_drained(&self) -> bool {
        self.base == self.next_seq
    }

    /// Build a DATA segment at `next_seq`, record it as sent at `now`, and
    /// advance `next_seq`.  Returns the segment for the caller to transmit.
    pub fn insert_in_flight(&mut self, payload: Vec<u8>, now: Instant) -> Segment {
        debug_assert!(self.admits(), "insert_in_flight on a full window");
        let segment = Segment::data(self.next_seq, payload);
        self.next_seq = seq_add(self.next_seq, segment.payload.len());
        self.in_flight.push_back(InFlight {
            segment: segment.clone(),
            transmissions: 1,
            sent_at: now,
        });
        segment
    }

    /// Process a cumulative ACK.
    pub fn try_advance_base(&mut self, ack: u16) -> AckOutcome {
        if ack == self.last_ack {
            return AckOutcome::Duplicate;
        }
        if seq_lt(ack, self.base) {
            return AckOutcome::Stale;
        }
        if seq_lt(self.next_seq, ack) {
            return AckOutcome::OutOfRange;
        }

        self.last_ack = ack;
        self.base = ack;
        let mut evicted = 0;
        while self
            .in_flight
            .front()
            .is_some_and(|front| seq_le(front.end(), ack))
        {
            self.in_flight.pop_front();
            evicted += 1;
        }
        AckOutcome::Advanced { evicted }
    }

    /// Collect every segment last sent more than `rto` before `now`, stamp it
    /// as re-sent at `now`, and return copies for retransmission (oldest
    /// first).
    pub fn sweep_expired(&mut self, now: Instant, rto: Duration) -> Vec<Retransmit> {
        let mut expired = Vec::new();
        for entry in self.in_flight.iter_mut() {
            if now.saturating_duration_since(entry.sent_at) >= rto {
                entry.sent_at = now;
                entry.transmissions += 1;
                expired.push(Retransmit {
                    segment: entry.segment.clone(),
                    transmissions: entry.transmissions,
                });
            }
        }
        expired
    }
}
