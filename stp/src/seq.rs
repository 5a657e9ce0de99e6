//! Modulo-65536 sequence-number arithmetic.
//!
//! Sequence numbers are 16 bits wide and wrap.  Ordering is only meaningful
//! between numbers less than half the space apart, which is why the send
//! window is capped at [`crate::config::MAX_WINDOW`].

/// Half the sequence space; the largest distance that still orders correctly.
pub const HALF_SPACE: u16 = 0x8000;

/// Returns `true` when `a` is at or before `b` in wrap-around space.
#[inline]
pub fn seq_le(a: u16, b: u16) -> bool {
    b.wrapping_sub(a) < HALF_SPACE
}

/// Returns `true` when `a` is strictly before `b` in wrap-around space.
#[inline]
pub fn seq_lt(a: u16, b: u16) -> bool {
    a != b && seq_le(a, b)
}

/// Signed distance from `from` to `to`, assuming they are less than half
/// the space apart.
#[inline]
pub fn seq_delta(from: u16, to: u16) -> i32 {
    i32::from(to.wrapping_sub(from) as i16)
}

/// Advance `seq` by `len` bytes.
#[inline]
pub fn seq_add(seq: u16, len: usize) -> u16 {
    seq.wrapping_add(len as u16)
}
