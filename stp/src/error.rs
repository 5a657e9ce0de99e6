//! Engine-level error type.

use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used across the engines.
pub type Result<T> = std::result::Result<T, StpError>;

/// Everything that can end a transfer early.
///
/// Simulated loss and malformed datagrams never surface here: the engines
/// absorb them as ordinary protocol events.
#[derive(Debug, Error)]
pub enum StpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// No ACK for the SYN within the retry budget; a RESET was sent.
    #[error("handshake failed after {attempts} SYN attempts")]
    HandshakeFailed { attempts: u32 },

    /// No ACK for the FIN within the retry budget; a RESET was sent.
    #[error("termination failed after {attempts} FIN attempts")]
    TerminationFailed { attempts: u32 },

    /// A single segment hit the retransmission cap; a RESET was sent.
    #[error("peer unresponsive: segment {seq} sent {transmissions} times")]
    PeerUnresponsive { seq: u16, transmissions: u32 },

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
