//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stp::packet::{Segment, SegmentType};
use stp::socket::Socket;
use stp::trace::{Direction, MemorySink, SegmentEvent};
use stp::{Received, Receiver, ReceiverConfig, Sender, SenderConfig, SenderReport};
use tokio::net::UdpSocket;

pub const LOOPBACK: &str = "127.0.0.1:0";

/// Bind a library socket on an OS-chosen loopback port.
pub async fn bind() -> (Socket, SocketAddr) {
    let socket = Socket::bind(LOOPBACK.parse().unwrap())
        .await
        .expect("bind socket");
    let addr = socket.local_addr;
    (socket, addr)
}

/// Deterministic, non-repeating-looking test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}

/// Outcome of one sender/receiver pair run to completion.
pub struct Transfer {
    pub sender: stp::Result<SenderReport>,
    pub receiver: stp::Result<Received>,
    pub sender_log: Arc<MemorySink>,
    pub receiver_log: Arc<MemorySink>,
}

/// Run a full transfer of `data` over loopback.
pub async fn transfer(data: Vec<u8>, sender: SenderConfig, receiver: ReceiverConfig) -> Transfer {
    let (snd_socket, snd_addr) = bind().await;
    let (rcv_socket, rcv_addr) = bind().await;
    let sender_log = Arc::new(MemorySink::new());
    let receiver_log = Arc::new(MemorySink::new());

    let receiver = Receiver::new(rcv_socket, snd_addr, receiver, receiver_log.clone())
        .expect("receiver config");
    let receiver_task = tokio::spawn(receiver.run());

    let sender = Sender::new(snd_socket, rcv_addr, sender, sender_log.clone())
        .expect("sender config");
    let source = std::io::Cursor::new(data);
    let sender_result = tokio::time::timeout(Duration::from_secs(30), sender.transfer(source))
        .await
        .expect("sender timed out");

    let receiver_result = tokio::time::timeout(Duration::from_secs(30), receiver_task)
        .await
        .expect("receiver timed out")
        .expect("receiver task panicked");

    Transfer {
        sender: sender_result,
        receiver: receiver_result,
        sender_log,
        receiver_log,
    }
}

/// Events of one direction and type, in log order.
pub fn events_of(sink: &MemorySink, direction: Direction, kind: SegmentType) -> Vec<SegmentEvent> {
    sink.events()
        .into_iter()
        .filter(|e| e.direction == direction && e.kind == kind)
        .collect()
}

/// A bare UDP socket standing in for the other endpoint.
pub struct RawPeer {
    pub socket: UdpSocket,
    pub target: SocketAddr,
}

impl RawPeer {
    /// `target` is where [`send`](Self::send) delivers; set it once the
    /// endpoint under test is bound.
    pub async fn bind() -> Self {
        let socket = UdpSocket::bind(LOOPBACK).await.expect("bind raw peer");
        Self {
            socket,
            target: "127.0.0.1:9".parse().unwrap(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    pub async fn send(&self, segment: &Segment) {
        self.socket
            .send_to(&segment.encode(), self.target)
            .await
            .expect("raw send");
    }

    pub async fn send_bytes(&self, bytes: &[u8]) {
        self.socket.send_to(bytes, self.target).await.expect("raw send");
    }

    /// Next decodable segment, or `None` after `wait`.
    pub async fn recv(&self, wait: Duration) -> Option<Segment> {
        let mut buf = [0u8; 2048];
        loop {
            let (n, _) = tokio::time::timeout(wait, self.socket.recv_from(&mut buf))
                .await
                .ok()?
                .ok()?;
            if let Ok(segment) = Segment::decode(&buf[..n]) {
                return Some(segment);
            }
        }
    }

    /// Read until an ACK carrying `seq` shows up; panics after two seconds.
    pub async fn expect_ack(&self, seq: u16) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.recv(left).await {
                Some(s) if s.kind == SegmentType::Ack && s.seq == seq => return,
                Some(_) => continue,
                None => panic!("no ACK {seq} within two seconds"),
            }
        }
    }
}
