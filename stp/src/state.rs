//! Connection finite-state machine (FSM) types.
//!
//! Each engine walks its own small state machine; transitions are driven by
//! [`crate::sender`] and [`crate::receiver`].  Keeping the state types here
//! lets both engines and the binary report them uniformly.

use std::fmt;

/// Sender states.
///
/// ```text
///  CLOSED ──SYN sent──▶ SYN_SENT ──ACK(ISN+1)──▶ ESTABLISHED
///                          │                          │ source drained,
///                          │ retries exhausted        │ window empty
///                          ▼                          ▼
///                        RESET ◀──retries exhausted── FIN_WAIT ──ACK(FIN+1)──▶ CLOSED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// No connection exists; initial and successful final state.
    #[default]
    Closed,
    /// SYN has been sent; waiting for its ACK.
    SynSent,
    /// Handshake complete; data transfer in progress.
    Established,
    /// FIN has been sent; waiting for its ACK.
    FinWait,
    /// The connection was aborted with a RESET.
    Reset,
}

/// Receiver states.
///
/// ```text
///  AWAIT_SYN ──SYN──▶ ESTABLISHED ──FIN / RESET / idle──▶ CLOSED
///      │                                                   ▲
///      └────────────────────────RESET──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    #[default]
    AwaitSyn,
    Established,
    Closed,
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            SenderState::Closed => "CLOSED",
            SenderState::SynSent => "SYN_SENT",
            SenderState::Established => "ESTABLISHED",
            SenderState::FinWait => "FIN_WAIT",
            SenderState::Reset => "RESET",
        })
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ReceiverState::AwaitSyn => "AWAIT_SYN",
            ReceiverState::Established => "ESTABLISHED",
            ReceiverState::Closed => "CLOSED",
        })
    }
}
