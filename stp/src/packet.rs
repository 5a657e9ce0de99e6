//! Wire-format definitions for protocol segments.
//!
//! Every datagram exchanged between the endpoints is a [`Segment`].  This
//! module is responsible for:
//! - Defining the on-wire binary layout (sequence number, type, payload).
//! - Serialising a [`Segment`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Segment`], returning errors
//!   for header-less or unrecognised input.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        Sequence Number        |             Type              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Payload (0..=1000 bytes) ...                 |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! There is no checksum and no length field: the payload is whatever follows
//! the [`HEADER_LEN`]-byte header in the datagram.

use std::fmt;

use thiserror::Error;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 4;

/// Largest payload a DATA segment carries.
pub const MAX_PAYLOAD: usize = 1000;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_TYPE: usize = 2;

/// The closed set of segment kinds, with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SegmentType {
    /// Carries stream bytes starting at `seq`.
    Data = 0,
    /// Cumulative acknowledgement: every byte below `seq` has arrived.
    Ack = 1,
    /// Opens the connection; `seq` is the sender's ISN.
    Syn = 2,
    /// Closes the connection; `seq` is one past the last data byte.
    Fin = 3,
    /// Aborts the connection.
    Reset = 4,
}

impl SegmentType {
    /// Name used in the event log.
    pub fn name(self) -> &'static str {
        match self {
            SegmentType::Data => "DATA",
            SegmentType::Ack => "ACK",
            SegmentType::Syn => "SYN",
            SegmentType::Fin => "FIN",
            SegmentType::Reset => "RESET",
        }
    }
}

impl TryFrom<u16> for SegmentType {
    type Error = SegmentError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SegmentType::Data),
            1 => Ok(SegmentType::Ack),
            2 => Ok(SegmentType::Syn),
            3 => Ok(SegmentType::Fin),
            4 => Ok(SegmentType::Reset),
            other => Err(SegmentError::UnknownType(other)),
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A complete protocol datagram: header fields + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Byte offset of the first payload byte (DATA) or handshake number.
    pub seq: u16,
    pub kind: SegmentType,
    pub payload: Vec<u8>,
}

impl Segment {
    /// A DATA segment carrying `payload` at stream offset `seq`.
    pub fn data(seq: u16, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self {
            seq,
            kind: SegmentType::Data,
            payload,
        }
    }

    /// A payload-less control segment (ACK, SYN, FIN or RESET).
    pub fn control(kind: SegmentType, seq: u16) -> Self {
        Self {
            seq,
            kind,
            payload: Vec::new(),
        }
    }

    /// Serialise this segment into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[OFF_SEQ..OFF_SEQ + 2].copy_from_slice(&self.seq.to_be_bytes());
        buf[OFF_TYPE..OFF_TYPE + 2].copy_from_slice(&(self.kind as u16).to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Segment`] from a raw datagram.
    ///
    /// Returns [`Err`] if `buf` is shorter than [`HEADER_LEN`] or the type
    /// code is not one of the five known kinds.
    pub fn decode(buf: &[u8]) -> Result<Self, SegmentError> {
        if buf.len() < HEADER_LEN {
            return Err(SegmentError::MalformedSegment { len: buf.len() });
        }

        let seq = u16::from_be_bytes([buf[OFF_SEQ], buf[OFF_SEQ + 1]]);
        let code = u16::from_be_bytes([buf[OFF_TYPE], buf[OFF_TYPE + 1]]);
        let kind = SegmentType::try_from(code)?;

        Ok(Self {
            seq,
            kind,
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    /// Datagram shorter than the fixed header.
    #[error("datagram of {len} bytes is shorter than the {HEADER_LEN}-byte header")]
    MalformedSegment { len: usize },
    /// Type field outside the known range.
    #[error("unknown segment type {0}")]
    UnknownType(u16),
}
