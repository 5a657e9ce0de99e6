//! `stp`: a reliable, ordered byte stream over a lossy UDP channel.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐     SYN / DATA / FIN      ┌──────────────┐
//!  │    Sender    │──────────────────────────▶│   Receiver   │
//!  │  SendWindow  │                           │ ReorderBuffer│
//!  │  sweep (RTO) │◀──────────────────────────│  DelayedAck  │
//!  └──────┬───────┘      cumulative ACKs      └──────┬───────┘
//!         │                                          │
//!  ┌──────▼───────┐  LossGate on each side    ┌──────▼───────┐
//!  │   Endpoint   │  decides what "arrives"   │   Endpoint   │
//!  │  + Trace     │                           │  + Trace     │
//!  └──────┬───────┘                           └──────┬───────┘
//!         │            raw UDP datagrams             │
//!  ┌──────▼───────┐                           ┌──────▼───────┐
//!  │    Socket    │◀─────────────────────────▶│    Socket    │
//!  └──────────────┘                           └──────────────┘
//! ```
//!
//! The sender streams one source in segments of at most 1000 bytes through
//! a byte-bounded sliding window, retransmitting per segment on timeout.
//! The receiver reassembles by stream offset, acknowledges cumulatively and
//! hands back the stream when the connection closes.  Both sides write a
//! per-segment event log and a statistics summary.
//!
//! Modules:
//! - [`packet`]: wire format
//! - [`seq`]: modulo-65536 sequence arithmetic
//! - [`socket`]: async UDP socket carrying [`packet::Segment`]s
//! - [`connection`]: socket + peer + trace, with bounded receives
//! - [`window`]: sender's in-flight bookkeeping
//! - [`reorder`]: receiver's reassembly buffer
//! - [`timer`]: delayed-ACK timer
//! - [`signal`]: end-of-transmission latch
//! - [`simulator`]: loss gates
//! - [`trace`]: event log lines and sinks
//! - [`stats`]: transfer counters
//! - [`state`]: connection states
//! - [`config`]: endpoint parameters
//! - [`sender`] / [`receiver`]: the two engines

pub mod config;
pub mod connection;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod reorder;
pub mod sender;
pub mod seq;
pub mod signal;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod stats;
pub mod timer;
pub mod trace;
pub mod window;

pub use config::{ReceiverConfig, SenderConfig};
pub use error::{Result, StpError};
pub use receiver::{CloseReason, Received, Receiver};
pub use sender::{Sender, SenderReport};
