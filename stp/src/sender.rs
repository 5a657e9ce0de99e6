//! Sender engine: handshake, windowed transmission, termination.
//!
//! ```text
//!               ┌──────────────┐  insert_in_flight   ┌──────────────────────┐
//!   source ───▶ │   producer   │ ──────────────────▶ │                      │
//!               └──────▲───────┘                     │  Mutex<SendWindow>   │
//!                      │ Notify (space)              │                      │
//!               ┌──────┴───────┐  try_advance_base   │                      │
//!   ACKs ─────▶ │ ACK handler  │ ──────────────────▶ │                      │
//!               │ + sweep      │  sweep_expired      │                      │
//!               └──────────────┘ ──────────────────▶ └──────────────────────┘
//! ```
//!
//! After the handshake the producer and the ACK handler run as separate
//! tasks.  The ACK handler receives with a timeout equal to the RTO and
//! sweeps the window after every wake-up, so the RTO doubles as the polling
//! cadence.  When the source is exhausted and the window has drained, the
//! producer sets the end-of-transmission latch; the ACK handler stops and
//! the calling task runs the FIN exchange.
//!
//! Duplicate ACKs are counted but never trigger a retransmission: the sweep
//! is the only recovery path.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinError;

use crate::config::SenderConfig;
use crate::connection::{Endpoint, Inbound};
use crate::error::{Result, StpError};
use crate::packet::{Segment, SegmentType, MAX_PAYLOAD};
use crate::signal::Latch;
use crate::simulator::LossGate;
use crate::socket::Socket;
use crate::state::SenderState;
use crate::stats::SenderStats;
use crate::trace::{Direction, EventSink, Trace};
use crate::window::{AckOutcome, SendWindow};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What a completed transfer looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderReport {
    pub isn: u16,
    /// Stream bytes delivered (and acknowledged).
    pub bytes_sent: u64,
    /// Sequence number after the acknowledged FIN.
    pub final_seq: u16,
    pub retransmissions: u64,
}

/// The socket, the ACK-path loss gate and the counters.
#[derive(Debug)]
struct Link {
    endpoint: Endpoint,
    reverse: LossGate,
    stats: Arc<SenderStats>,
}

impl Link {
    /// Apply the reverse-loss gate to an inbound segment and trace it.
    fn admit(&self, segment: &Segment) -> bool {
        let trace = self.endpoint.trace();
        if self.reverse.should_deliver() {
            trace.record(Direction::Rcv, segment);
            true
        } else {
            trace.record(Direction::Drp, segment);
            if segment.kind == SegmentType::Ack {
                self.stats.ack_dropped();
            }
            log::debug!("[snd] ← {} seq={} dropped", segment.kind, segment.seq);
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Data phase
// ---------------------------------------------------------------------------

/// State shared by the data-phase duties.
struct Transmission {
    link: Arc<Link>,
    window: Mutex<SendWindow>,
    /// Signalled whenever the window base advances.
    space: Notify,
    end_of_transmission: Latch,
    rto: Duration,
    max_retransmits: u32,
}

impl Transmission {
    async fn on_inbound(&self, segment: Segment) {
        if !self.link.admit(&segment) {
            return;
        }
        if segment.kind != SegmentType::Ack {
            log::debug!("[snd] ignoring {} during transfer", segment.kind);
            return;
        }

        let outcome = self.window.lock().await.try_advance_base(segment.seq);
        match outcome {
            AckOutcome::Advanced { evicted } => {
                log::debug!("[snd] ← ACK {} (slid {evicted} seg)", segment.seq);
                self.space.notify_one();
            }
            AckOutcome::Duplicate => {
                self.link.stats.duplicate_ack();
                log::debug!("[snd] ← duplicate ACK {}", segment.seq);
            }
            AckOutcome::Stale | AckOutcome::OutOfRange => {
                log::debug!("[snd] ← ACK {} outside window ({outcome:?})", segment.seq);
            }
        }
    }

    /// Re-send every segment older than the RTO.
    async fn sweep(&self) -> Result<()> {
        let mut window = self.window.lock().await;
        for resend in window.sweep_expired(Instant::now(), self.rto) {
            if resend.transmissions > self.max_retransmits.saturating_add(1) {
                // The expired copy is not sent; report what actually went out.
                return Err(StpError::PeerUnresponsive {
                    seq: resend.segment.seq,
                    transmissions: resend.transmissions - 1,
                });
            }
            self.link.endpoint.send(&resend.segment).await?;
            self.link.stats.retransmitted();
            log::debug!(
                "[snd] timeout, DATA seq={} resent (#{})",
                resend.segment.seq,
                resend.transmissions
            );
        }
        Ok(())
    }
}

/// Fill the window from `source` until it is exhausted and acknowledged.
async fn produce<R>(shared: Arc<Transmission>, mut source: R) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut exhausted = false;
    loop {
        let admits = {
            let window = shared.window.lock().await;
            if exhausted && window.is_drained() {
                shared.end_of_transmission.set();
                log::debug!("[snd] end of transmission at {}", window.next_seq());
                return Ok(());
            }
            !exhausted && window.admits()
        };
        if !admits {
            shared.space.notified().await;
            continue;
        }

        let chunk = read_chunk(&mut source).await?;
        if chunk.is_empty() {
            exhausted = true;
            continue;
        }

        let mut window = shared.window.lock().await;
        let segment = window.insert_in_flight(chunk, Instant::now());
        shared.link.endpoint.send(&segment).await?;
        shared.link.stats.original_sent(segment.payload.len());
        log::debug!(
            "[snd] → DATA seq={} len={} in_flight={}",
            segment.seq,
            segment.payload.len(),
            window.in_flight_bytes()
        );
    }
}

/// Read up to [`MAX_PAYLOAD`] bytes; empty only at end of input.
async fn read_chunk<R>(source: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = Vec::with_capacity(MAX_PAYLOAD);
    (&mut *source)
        .take(MAX_PAYLOAD as u64)
        .read_to_end(&mut chunk)
        .await?;
    Ok(chunk)
}

/// Process ACKs and sweep the window until end of transmission.
async fn handle_acks(shared: Arc<Transmission>) -> Result<()> {
    loop {
        tokio::select! {
            _ = shared.end_of_transmission.wait() => return Ok(()),
            inbound = shared.link.endpoint.recv_within(shared.rto) => {
                if let Inbound::Segment(segment) = inbound? {
                    shared.on_inbound(segment).await;
                }
                shared.sweep().await?;
            }
        }
    }
}

fn flatten(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(StpError::from).and_then(|duty| duty)
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Client side of the protocol.  One instance performs one transfer.
pub struct Sender {
    link: Arc<Link>,
    config: SenderConfig,
    state: std::sync::Mutex<SenderState>,
}

impl Sender {
    /// Build a sender that talks to `peer` over `socket`.
    pub fn new(
        socket: Socket,
        peer: SocketAddr,
        config: SenderConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;
        let endpoint = Endpoint::new(socket, peer, Trace::new(sink));
        let link = Link {
            endpoint,
            reverse: LossGate::from_seed(config.reverse_loss, config.seed),
            stats: Arc::new(SenderStats::default()),
        };
        Ok(Self {
            link: Arc::new(link),
            config,
            state: std::sync::Mutex::new(SenderState::Closed),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.link.endpoint.local_addr()
    }

    pub fn stats(&self) -> Arc<SenderStats> {
        Arc::clone(&self.link.stats)
    }

    pub fn state(&self) -> SenderState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: SenderState) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        log::debug!("[snd] {} → {next}", *state);
        *state = next;
    }

    /// Connect, stream all of `source`, and close.
    ///
    /// The statistics summary is appended to the event log whatever the
    /// outcome.
    pub async fn transfer<R>(&self, source: R) -> Result<SenderReport>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let result = self.run(source).await;
        self.link.endpoint.trace().summary(self.link.stats.summary());
        match &result {
            Ok(report) => log::info!("[snd] transfer complete: {} bytes", report.bytes_sent),
            Err(e) => log::warn!("[snd] transfer failed: {e}"),
        }
        result
    }

    async fn run<R>(&self, source: R) -> Result<SenderReport>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let isn = self.config.isn.unwrap_or_else(|| rand::rng().random());
        self.connect(isn).await?;

        let start = isn.wrapping_add(1);
        let shared = Arc::new(Transmission {
            link: Arc::clone(&self.link),
            window: Mutex::new(SendWindow::new(start, self.config.max_window)),
            space: Notify::new(),
            end_of_transmission: Latch::new(),
            rto: self.config.rto,
            max_retransmits: self.config.max_retransmits,
        });

        if let Err(e) = self.transmit(&shared, source).await {
            let seq = shared.window.lock().await.next_seq();
            self.reset(seq).await?;
            return Err(e);
        }

        shared.end_of_transmission.wait().await;
        let fin_seq = shared.window.lock().await.next_seq();
        let final_seq = self.terminate(fin_seq).await?;

        Ok(SenderReport {
            isn,
            bytes_sent: self.link.stats.bytes_sent(),
            final_seq,
            retransmissions: self.link.stats.retransmission_count(),
        })
    }

    /// SYN / ACK exchange.  Sends a RESET when every attempt goes unanswered.
    async fn connect(&self, isn: u16) -> Result<()> {
        let syn = Segment::control(SegmentType::Syn, isn);
        let expected = isn.wrapping_add(1);
        self.link.endpoint.trace().start();
        self.set_state(SenderState::SynSent);

        for attempt in 1..=self.config.max_retries {
            self.link.endpoint.send(&syn).await?;
            log::debug!("[snd] → SYN seq={isn} (attempt {attempt})");
            if self.await_ack(expected).await? {
                self.set_state(SenderState::Established);
                return Ok(());
            }
        }

        log::warn!("[snd] no ACK for SYN; resetting");
        self.reset(isn).await?;
        Err(StpError::HandshakeFailed {
            attempts: self.config.max_retries,
        })
    }

    /// Run the producer and ACK handler until end of transmission or the
    /// first failure.
    async fn transmit<R>(&self, shared: &Arc<Transmission>, source: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        enum Finished {
            Producer(std::result::Result<Result<()>, JoinError>),
            AckHandler(std::result::Result<Result<()>, JoinError>),
        }

        let mut producer = tokio::spawn(produce(Arc::clone(shared), source));
        let mut ack_handler = tokio::spawn(handle_acks(Arc::clone(shared)));

        let first = tokio::select! {
            joined = &mut producer => Finished::Producer(joined),
            joined = &mut ack_handler => Finished::AckHandler(joined),
        };
        let outcome = match first {
            Finished::Producer(joined) => match flatten(joined) {
                Ok(()) => flatten((&mut ack_handler).await),
                Err(e) => Err(e),
            },
            Finished::AckHandler(joined) => match flatten(joined) {
                Ok(()) => flatten((&mut producer).await),
                Err(e) => Err(e),
            },
        };

        if outcome.is_err() {
            producer.abort();
            ack_handler.abort();
        }
        outcome
    }

    /// FIN / ACK exchange.  Returns the sequence number after the FIN.
    async fn terminate(&self, fin_seq: u16) -> Result<u16> {
        let fin = Segment::control(SegmentType::Fin, fin_seq);
        let expected = fin_seq.wrapping_add(1);
        self.set_state(SenderState::FinWait);

        for attempt in 1..=self.config.max_retries {
            self.link.endpoint.send(&fin).await?;
            log::debug!("[snd] → FIN seq={fin_seq} (attempt {attempt})");
            if self.await_ack(expected).await? {
                self.set_state(SenderState::Closed);
                return Ok(expected);
            }
        }

        log::warn!("[snd] no ACK for FIN; resetting");
        self.link
            .endpoint
            .send(&Segment::control(SegmentType::Reset, fin_seq))
            .await?;
        self.set_state(SenderState::Closed);
        Err(StpError::TerminationFailed {
            attempts: self.config.max_retries,
        })
    }

    /// Wait one response timeout for an ACK carrying `expected`.
    ///
    /// Anything else that arrives in the meantime is traced and ignored.
    async fn await_ack(&self, expected: u16) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + self.config.response_timeout;
        loop {
            match self.link.endpoint.recv_until(deadline).await? {
                Inbound::TimedOut => return Ok(false),
                Inbound::Segment(segment) => {
                    if !self.link.admit(&segment) {
                        continue;
                    }
                    if segment.kind == SegmentType::Ack && segment.seq == expected {
                        log::debug!("[snd] ← ACK {expected}");
                        return Ok(true);
                    }
                    log::debug!(
                        "[snd] ← {} seq={} while waiting for ACK {expected}",
                        segment.kind,
                        segment.seq
                    );
                }
            }
        }
    }

    /// Abort the connection.
    async fn reset(&self, seq: u16) -> Result<()> {
        self.link
            .endpoint
            .send(&Segment::control(SegmentType::Reset, seq))
            .await?;
        self.set_state(SenderState::Reset);
        Ok(())
    }
}
