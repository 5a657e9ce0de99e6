//! Per-endpoint plumbing shared by the sender and receiver engines.
//!
//! An [`Endpoint`] owns the socket, knows the one peer this process talks
//! to, and traces every segment it puts on the wire.  It is shared between
//! the duties of an engine behind an `Arc`; all methods take `&self`.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::packet::Segment;
use crate::socket::{is_transient_io_error, Socket, SocketError};
use crate::trace::{Direction, Trace};

/// Outcome of one bounded receive.
#[derive(Debug)]
pub enum Inbound {
    /// A decoded segment from the peer.
    Segment(Segment),
    /// The deadline passed without a usable datagram.
    TimedOut,
}

#[derive(Debug)]
pub struct Endpoint {
    socket: Socket,
    peer: SocketAddr,
    trace: Trace,
}

impl Endpoint {
    pub fn new(socket: Socket, peer: SocketAddr, trace: Trace) -> Self {
        Self {
            socket,
            peer,
            trace,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Send `segment` to the peer and trace it as `snd`.
    pub async fn send(&self, segment: &Segment) -> std::io::Result<()> {
        self.socket.send_to(segment, self.peer).await?;
        self.trace.record(Direction::Snd, segment);
        Ok(())
    }

    /// Wait for the next segment from the peer, without a deadline.
    ///
    /// Undecodable datagrams, foreign senders and transient socket errors are
    /// skipped.
    pub async fn recv(&self) -> std::io::Result<Segment> {
        loop {
            match self.socket.recv_from().await {
                Ok((segment, from)) if from == self.peer => return Ok(segment),
                Ok((segment, from)) => {
                    log::debug!("ignoring {} from foreign address {from}", segment.kind);
                }
                Err(SocketError::Io(e)) if !is_transient_io_error(&e) => return Err(e),
                Err(e) => log::debug!("discarding datagram: {e}"),
            }
        }
    }

    /// Like [`recv`](Self::recv) but gives up at `deadline`.
    pub async fn recv_until(&self, deadline: Instant) -> std::io::Result<Inbound> {
        match timeout_at(deadline, self.recv()).await {
            Ok(segment) => segment.map(Inbound::Segment),
            Err(_elapsed) => Ok(Inbound::TimedOut),
        }
    }

    /// Like [`recv`](Self::recv) but gives up after `wait`.
    pub async fn recv_within(&self, wait: Duration) -> std::io::Result<Inbound> {
        self.recv_until(Instant::now() + wait).await
    }
}
