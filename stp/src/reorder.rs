//! Receive-side reorder buffer.
//!
//! [`ReorderBuffer`] keeps every DATA payload the receiver accepts, keyed by
//! its position in the stream, and tracks the cursor: the next in-order
//! offset.  It decides how an arriving segment relates to the cursor; the
//! caller turns that into ACK behaviour.
//!
//! - `seq == cursor`: stored, cursor advances by the payload length.
//! - `seq >  cursor`: stored ahead of a gap; cursor unchanged.
//! - `seq <  cursor`: stale duplicate; nothing stored.
//!
//! Entries are only removed by [`ReorderBuffer::flush`], which concatenates
//! them in stream order.  A range that never arrived stays a hole.
//!
//! Wire offsets wrap at 65536, so positions are unwrapped relative to the
//! cursor into a 64-bit stream offset.  This is exact as long as no segment
//! arrives more than half the sequence space away from the cursor, which the
//! sender's window bound guarantees.

use std::collections::BTreeMap;

use crate::seq::{seq_add, seq_delta};

/// How an arriving DATA segment relates to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// At the cursor.  `fresh` is false when the bytes were already stashed.
    InOrder { fresh: bool },
    /// Beyond the cursor.  `fresh` is false for a repeat of a stashed offset.
    Ahead { fresh: bool },
    /// Before the cursor.
    Stale,
}

#[derive(Debug)]
pub struct ReorderBuffer {
    cursor: u16,
    /// Stream offset of `cursor`, counted from the first data byte.
    position: u64,
    segments: BTreeMap<u64, Vec<u8>>,
}

impl ReorderBuffer {
    /// `start` is the first data offset: the peer's ISN + 1.
    pub fn new(start: u16) -> Self {
        Self {
            cursor: start,
            position: 0,
            segments: BTreeMap::new(),
        }
    }

    /// Next expected offset; the value every cumulative ACK carries.
    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    /// Number of buffered segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Classify and (if not stale) store an arriving DATA payload.
    pub fn accept(&mut self, seq: u16, payload: Vec<u8>) -> Arrival {
        let delta = seq_delta(self.cursor, seq);
        if delta < 0 {
            return Arrival::Stale;
        }

        let offset = self.position + delta as u64;
        let len = payload.len();
        let fresh = self.segments.insert(offset, payload).is_none();

        if delta == 0 {
            self.cursor = seq_add(self.cursor, len);
            self.position += len as u64;
            Arrival::InOrder { fresh }
        } else {
            Arrival::Ahead { fresh }
        }
    }

    /// Drain the buffer into one byte stream, in stream order.
    pub fn flush(&mut self) -> Vec<u8> {
        let segments = std::mem::take(&mut self.segments);
        let total = segments.values().map(Vec::len).sum();
        let mut out = Vec::with_capacity(total);
        for payload in segments.into_values() {
            out.extend_from_slice(&payload);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(fill: u8) -> Vec<u8> {
        vec![fill; 1000]
    }

    #[test]
    fn in_order_segments_advance_cursor() {
        let mut r = ReorderBuffer::new(100);
        assert_eq!(r.accept(100, b"hello".to_vec()), Arrival::InOrder { fresh: true });
        assert_eq!(r.cursor(), 105);
        assert_eq!(r.accept(105, b"!".to_vec()), Arrival::InOrder { fresh: true });
        assert_eq!(r.flush(), b"hello!");
    }

    #[test]
    fn ahead_segment_is_stashed_without_moving_cursor() {
        let mut r = ReorderBuffer::new(0);
        assert_eq!(r.accept(2000, chunk(3)), Arrival::Ahead { fresh: true });
        assert_eq!(r.cursor(), 0);
        assert_eq!(r.accept(2000, chunk(3)), Arrival::Ahead { fresh: false });
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn stale_segment_is_not_stored() {
        let mut r = ReorderBuffer::new(0);
        r.accept(0, chunk(1));
        assert_eq!(r.accept(0, chunk(9)), Arrival::Stale);
        assert_eq!(r.len(), 1);
        assert_eq!(r.flush(), chunk(1));
    }

    #[test]
    fn gap_filled_out_of_order_flushes_in_stream_order() {
        let mut r = ReorderBuffer::new(0);
        r.accept(0, chunk(1));
        r.accept(2000, chunk(3));
        assert_eq!(r.accept(1000, chunk(2)), Arrival::InOrder { fresh: true });
        // The cursor moves by the arriving payload only.
        assert_eq!(r.cursor(), 2000);
        // The stashed segment's retransmission is then in order but not fresh.
        assert_eq!(r.accept(2000, chunk(3)), Arrival::InOrder { fresh: false });
        assert_eq!(r.cursor(), 3000);

        let out = r.flush();
        assert_eq!(out.len(), 3000);
        assert!(out[..1000].iter().all(|&b| b == 1));
        assert!(out[1000..2000].iter().all(|&b| b == 2));
        assert!(out[2000..].iter().all(|&b| b == 3));
    }

    #[test]
    fn missing_range_leaves_a_hole() {
        let mut r = ReorderBuffer::new(0);
        r.accept(0, b"ab".to_vec());
        r.accept(4, b"ef".to_vec());
        assert_eq!(r.flush(), b"abef");
        assert!(r.is_empty());
    }

    #[test]
    fn wraparound_keeps_stream_order() {
        let start = u16::MAX - 999;
        let mut r = ReorderBuffer::new(start);
        // Second chunk (wire offset 1000) arrives first.
        assert_eq!(r.accept(1000, chunk(2)), Arrival::Ahead { fresh: true });
        assert_eq!(r.accept(start, chunk(1)), Arrival::InOrder { fresh: true });
        assert_eq!(r.cursor(), 0);
        assert_eq!(r.accept(0, chunk(9)), Arrival::InOrder { fresh: true });

        let out = r.flush();
        assert_eq!(out.len(), 3000);
        assert_eq!(out[0], 1);
        assert_eq!(out[1000], 9);
        assert_eq!(out[2000], 2);
    }
}
