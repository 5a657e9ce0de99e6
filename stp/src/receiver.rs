//! Receiver engine: accept one connection, reassemble, close.
//!
//! The main loop owns the socket's receive side.  Every inbound datagram
//! first passes the forward-loss gate; survivors drive the connection state
//! under the session lock.  In-order DATA re-arms a delayed cumulative ACK,
//! while anything that exposes a gap (or repeats old data) is answered
//! immediately so the sender learns the cursor quickly.  Outbound ACKs pass
//! the reverse-loss gate; a dropped ACK is traced and never retried.
//!
//! The connection closes on FIN, on RESET, or after `idle_timeout` of
//! silence once established.  After a FIN the receiver lingers, re-ACKing
//! repeated FINs, until the line has been quiet for `idle_timeout`.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ReceiverConfig;
use crate::connection::{Endpoint, Inbound};
use crate::error::Result;
use crate::packet::{Segment, SegmentType};
use crate::reorder::{Arrival, ReorderBuffer};
use crate::simulator::LossGate;
use crate::socket::Socket;
use crate::state::ReceiverState;
use crate::stats::ReceiverStats;
use crate::timer::DelayedAck;
use crate::trace::{Direction, EventSink, Trace};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why the connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Fin,
    Reset,
    IdleTimeout,
}

/// The reassembled stream and how the connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub data: Vec<u8>,
    pub reason: CloseReason,
}

// ---------------------------------------------------------------------------
// ACK path and session
// ---------------------------------------------------------------------------

/// Outbound ACK path: reverse-loss gate in front of the socket.
#[derive(Debug)]
struct AckPath {
    endpoint: Endpoint,
    reverse: LossGate,
    stats: Arc<ReceiverStats>,
}

impl AckPath {
    async fn send_ack(&self, seq: u16) -> std::io::Result<()> {
        let ack = Segment::control(SegmentType::Ack, seq);
        if self.reverse.should_deliver() {
            self.endpoint.send(&ack).await
        } else {
            self.endpoint.trace().record(Direction::Drp, &ack);
            self.stats.ack_dropped();
            log::debug!("[rcv] → ACK {seq} dropped");
            Ok(())
        }
    }
}

#[derive(Debug)]
struct Session {
    state: ReceiverState,
    /// Sequence number of the accepted SYN.
    isn: Option<u16>,
    buffer: Option<ReorderBuffer>,
    delayed_ack: DelayedAck,
    output: Option<Vec<u8>>,
    reason: Option<CloseReason>,
}

impl Session {
    fn close(&mut self, reason: CloseReason) {
        self.delayed_ack.cancel();
        self.state = ReceiverState::Closed;
        self.reason = Some(reason);
        let data = self.buffer.as_mut().map(ReorderBuffer::flush).unwrap_or_default();
        log::info!("[rcv] closed ({reason:?}) with {} bytes", data.len());
        self.output = Some(data);
    }
}

/// Whether the main loop keeps reading.
enum Flow {
    Continue,
    Stop,
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Server side of the protocol.  One instance accepts one connection.
pub struct Receiver {
    acks: Arc<AckPath>,
    forward: LossGate,
    session: Arc<Mutex<Session>>,
    config: ReceiverConfig,
}

impl Receiver {
    /// Build a receiver that accepts a connection from `peer` on `socket`.
    pub fn new(
        socket: Socket,
        peer: SocketAddr,
        config: ReceiverConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        // The two gates draw from distinct streams even when seeded.
        let reverse_seed = config.seed.map(|seed| seed.rotate_left(32) ^ 0x5eed);
        let acks = AckPath {
            endpoint: Endpoint::new(socket, peer, Trace::new(sink)),
            reverse: LossGate::from_seed(config.reverse_loss, reverse_seed),
            stats: Arc::new(ReceiverStats::default()),
        };
        let session = Session {
            state: ReceiverState::AwaitSyn,
            isn: None,
            buffer: None,
            delayed_ack: DelayedAck::new(config.ack_delay),
            output: None,
            reason: None,
        };
        Ok(Self {
            acks: Arc::new(acks),
            forward: LossGate::from_seed(config.forward_loss, config.seed),
            session: Arc::new(Mutex::new(session)),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.acks.endpoint.local_addr()
    }

    pub fn stats(&self) -> Arc<ReceiverStats> {
        Arc::clone(&self.acks.stats)
    }

    /// Serve one connection to completion and hand back the stream.
    ///
    /// The statistics summary is appended to the event log whatever the
    /// outcome.
    pub async fn run(self) -> Result<Received> {
        let result = self.receive().await;
        self.acks.endpoint.trace().summary(self.acks.stats.summary());
        if let Err(e) = &result {
            log::warn!("[rcv] connection failed: {e}");
        }
        result
    }

    async fn receive(&self) -> Result<Received> {
        let endpoint = &self.acks.endpoint;
        loop {
            let state = self.session.lock().await.state;
            let inbound = match state {
                ReceiverState::AwaitSyn => Inbound::Segment(endpoint.recv().await?),
                _ => endpoint.recv_within(self.config.idle_timeout).await?,
            };

            let mut session = self.session.lock().await;
            let segment = match inbound {
                Inbound::Segment(segment) => segment,
                Inbound::TimedOut => {
                    if session.state == ReceiverState::Established {
                        log::warn!("[rcv] peer idle for {:?}", self.config.idle_timeout);
                        session.close(CloseReason::IdleTimeout);
                    }
                    break;
                }
            };

            endpoint.trace().start();
            if let Flow::Stop = self.on_segment(&mut session, segment).await? {
                break;
            }
        }

        let mut session = self.session.lock().await;
        Ok(Received {
            data: session.output.take().unwrap_or_default(),
            reason: session.reason.unwrap_or(CloseReason::IdleTimeout),
        })
    }

    async fn on_segment(&self, session: &mut Session, segment: Segment) -> Result<Flow> {
        let trace = self.acks.endpoint.trace();
        if !self.forward.should_deliver() {
            trace.record(Direction::Drp, &segment);
            if segment.kind == SegmentType::Data {
                self.acks.stats.data_dropped();
            }
            log::debug!("[rcv] ← {} seq={} dropped", segment.kind, segment.seq);
            return Ok(Flow::Continue);
        }
        trace.record(Direction::Rcv, &segment);

        match (session.state, segment.kind) {
            (ReceiverState::Closed, SegmentType::Reset) => return Ok(Flow::Stop),
            (_, SegmentType::Reset) => {
                log::warn!("[rcv] ← RESET");
                session.close(CloseReason::Reset);
                return Ok(Flow::Stop);
            }
            (ReceiverState::AwaitSyn, SegmentType::Syn) => {
                let start = segment.seq.wrapping_add(1);
                session.isn = Some(segment.seq);
                session.buffer = Some(ReorderBuffer::new(start));
                session.state = ReceiverState::Established;
                log::debug!("[rcv] {} → {}", ReceiverState::AwaitSyn, session.state);
                self.acks.send_ack(start).await?;
            }
            (ReceiverState::Established, SegmentType::Syn) if session.isn == Some(segment.seq) => {
                // Our handshake ACK was lost.
                self.acks.send_ack(segment.seq.wrapping_add(1)).await?;
            }
            (ReceiverState::Established, SegmentType::Data) => {
                self.on_data(session, segment).await?;
            }
            (ReceiverState::Established, SegmentType::Fin) => {
                self.acks.send_ack(segment.seq.wrapping_add(1)).await?;
                session.close(CloseReason::Fin);
            }
            (ReceiverState::Closed, SegmentType::Fin) => {
                self.acks.send_ack(segment.seq.wrapping_add(1)).await?;
            }
            (state, kind) => {
                log::debug!("[rcv] ignoring {kind} seq={} in {state}", segment.seq);
            }
        }
        Ok(Flow::Continue)
    }

    async fn on_data(&self, session: &mut Session, segment: Segment) -> Result<()> {
        let Some(buffer) = session.buffer.as_mut() else {
            return Ok(());
        };
        let stats = &self.acks.stats;
        let (seq, len) = (segment.seq, segment.payload.len());

        match buffer.accept(seq, segment.payload) {
            Arrival::InOrder { fresh } => {
                count(stats, fresh, len);
                log::debug!("[rcv] ← DATA seq={seq} in order, cursor={}", buffer.cursor());
                self.schedule_ack(session);
            }
            Arrival::Ahead { fresh } => {
                count(stats, fresh, len);
                let cursor = buffer.cursor();
                log::debug!("[rcv] ← DATA seq={seq} ahead of cursor {cursor}");
                self.acks.send_ack(cursor).await?;
            }
            Arrival::Stale => {
                stats.duplicate();
                let cursor = buffer.cursor();
                log::debug!("[rcv] ← DATA seq={seq} behind cursor {cursor}");
                self.acks.send_ack(cursor).await?;
            }
        }
        Ok(())
    }

    /// (Re)arm the delayed ACK; when it fires it acknowledges whatever the
    /// cursor is at that moment.
    fn schedule_ack(&self, session: &mut Session) {
        let shared = Arc::clone(&self.session);
        let acks = Arc::clone(&self.acks);
        session.delayed_ack.rearm(async move {
            let session = shared.lock().await;
            if session.state != ReceiverState::Established {
                return;
            }
            if let Some(cursor) = session.buffer.as_ref().map(ReorderBuffer::cursor) {
                if let Err(e) = acks.send_ack(cursor).await {
                    log::warn!("[rcv] delayed ACK failed: {e}");
                }
            }
        });
    }
}

fn count(stats: &ReceiverStats, fresh: bool, len: usize) {
    if fresh {
        stats.original_received(len);
    } else {
        stats.duplicate();
    }
}
