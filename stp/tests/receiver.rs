//! The receiver against a scripted sender.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{bind, events_of, RawPeer};
use stp::packet::{Segment, SegmentType};
use stp::trace::{Direction, MemorySink};
use stp::{CloseReason, Received, Receiver, ReceiverConfig};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config() -> ReceiverConfig {
    ReceiverConfig::new()
        .ack_delay(Duration::from_millis(20))
        .idle_timeout(Duration::from_millis(300))
}

/// Start a receiver that accepts from `peer` and point `peer` at it.
async fn start(peer: &mut RawPeer) -> (JoinHandle<stp::Result<Received>>, Arc<MemorySink>) {
    let (socket, addr) = bind().await;
    let sink = Arc::new(MemorySink::new());
    let receiver = Receiver::new(socket, peer.addr(), config(), sink.clone()).expect("config");
    peer.target = addr;
    (tokio::spawn(receiver.run()), sink)
}

async fn finish(task: JoinHandle<stp::Result<Received>>) -> Received {
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("receiver hung")
        .expect("receiver panicked")
        .expect("receiver failed")
}

fn data(seq: u16, fill: u8, len: usize) -> Segment {
    Segment::data(seq, vec![fill; len])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// `[0,1000)`, `[2000,3000)`, then `[1000,2000)` flushes in stream order.
#[tokio::test]
async fn out_of_order_data_is_reassembled() {
    let mut peer = RawPeer::bind().await;
    let (task, sink) = start(&mut peer).await;

    peer.send(&Segment::control(SegmentType::Syn, 99)).await;
    peer.expect_ack(100).await;

    peer.send(&data(100, b'a', 1000)).await;
    peer.send(&data(2100, b'c', 1000)).await;
    // The gap is reported straight away.
    peer.expect_ack(1100).await;
    peer.send(&data(1100, b'b', 1000)).await;
    peer.expect_ack(2100).await;

    peer.send(&Segment::control(SegmentType::Fin, 3100)).await;
    peer.expect_ack(3101).await;

    let received = finish(task).await;
    assert_eq!(received.reason, CloseReason::Fin);
    assert_eq!(received.data.len(), 3000);
    assert!(received.data[..1000].iter().all(|&b| b == b'a'));
    assert!(received.data[1000..2000].iter().all(|&b| b == b'b'));
    assert!(received.data[2000..].iter().all(|&b| b == b'c'));

    let summary = sink.summary().expect("summary");
    assert_eq!(summary.get("Original Data Segments Received"), Some(3));
    assert_eq!(summary.get("Duplicate Data Segments Received"), Some(0));
}

/// Back-to-back in-order segments share one delayed cumulative ACK.
#[tokio::test]
async fn in_order_burst_gets_one_delayed_ack() {
    let mut peer = RawPeer::bind().await;
    let (task, sink) = start(&mut peer).await;

    peer.send(&Segment::control(SegmentType::Syn, 0)).await;
    peer.expect_ack(1).await;
    for (i, seq) in [1u16, 101, 201].into_iter().enumerate() {
        peer.send(&data(seq, i as u8, 100)).await;
    }

    let mut acks = Vec::new();
    while let Some(segment) = peer.recv(Duration::from_millis(150)).await {
        acks.push(segment.seq);
    }
    assert_eq!(acks, vec![301]);

    peer.send(&Segment::control(SegmentType::Fin, 301)).await;
    peer.expect_ack(302).await;
    let received = finish(task).await;
    assert_eq!(received.data.len(), 300);

    let sent: Vec<u16> = events_of(&sink, Direction::Snd, SegmentType::Ack)
        .iter()
        .map(|e| e.seq)
        .collect();
    assert_eq!(sent, vec![1, 301, 302]);
}

/// Data behind the cursor is counted as a duplicate and ACKed at once.
#[tokio::test]
async fn repeated_data_is_counted_and_reacknowledged() {
    let mut peer = RawPeer::bind().await;
    let (task, sink) = start(&mut peer).await;

    peer.send(&Segment::control(SegmentType::Syn, 0)).await;
    peer.expect_ack(1).await;
    peer.send(&data(1, 5, 400)).await;
    peer.expect_ack(401).await;
    peer.send(&data(1, 5, 400)).await;
    peer.expect_ack(401).await;

    peer.send(&Segment::control(SegmentType::Fin, 401)).await;
    peer.expect_ack(402).await;

    let received = finish(task).await;
    assert_eq!(received.data, vec![5; 400]);
    let summary = sink.summary().expect("summary");
    assert_eq!(summary.get("Original Data Received"), Some(400));
    assert_eq!(summary.get("Duplicate Data Segments Received"), Some(1));
}

/// A repeated SYN after the handshake means our ACK was lost; ACK it again.
#[tokio::test]
async fn retransmitted_syn_is_acknowledged_again() {
    let mut peer = RawPeer::bind().await;
    let (task, _sink) = start(&mut peer).await;

    peer.send(&Segment::control(SegmentType::Syn, 300)).await;
    peer.expect_ack(301).await;
    peer.send(&Segment::control(SegmentType::Syn, 300)).await;
    peer.expect_ack(301).await;

    peer.send(&Segment::control(SegmentType::Fin, 301)).await;
    peer.expect_ack(302).await;
    let received = finish(task).await;
    assert!(received.data.is_empty());
    assert_eq!(received.reason, CloseReason::Fin);
}

/// After closing on FIN the receiver keeps answering repeated FINs.
#[tokio::test]
async fn repeated_fin_is_acknowledged_while_lingering() {
    let mut peer = RawPeer::bind().await;
    let (task, sink) = start(&mut peer).await;

    peer.send(&Segment::control(SegmentType::Syn, 10)).await;
    peer.expect_ack(11).await;
    peer.send(&Segment::control(SegmentType::Fin, 11)).await;
    peer.expect_ack(12).await;
    peer.send(&Segment::control(SegmentType::Fin, 11)).await;
    peer.expect_ack(12).await;

    finish(task).await;
    assert_eq!(events_of(&sink, Direction::Snd, SegmentType::Ack).len(), 3);
}

/// RESET mid-transfer closes and hands back what arrived.
#[tokio::test]
async fn reset_closes_with_partial_data() {
    let mut peer = RawPeer::bind().await;
    let (task, _sink) = start(&mut peer).await;

    peer.send(&Segment::control(SegmentType::Syn, 0)).await;
    peer.expect_ack(1).await;
    peer.send(&data(1, 8, 1000)).await;
    peer.expect_ack(1001).await;
    peer.send(&Segment::control(SegmentType::Reset, 1001)).await;

    let received = finish(task).await;
    assert_eq!(received.reason, CloseReason::Reset);
    assert_eq!(received.data, vec![8; 1000]);
}

/// An established connection gone quiet closes on the idle timeout.
#[tokio::test]
async fn silence_after_handshake_times_out() {
    let mut peer = RawPeer::bind().await;
    let (task, _sink) = start(&mut peer).await;

    peer.send(&Segment::control(SegmentType::Syn, 0)).await;
    peer.expect_ack(1).await;
    peer.send(&data(1, 4, 10)).await;

    let received = finish(task).await;
    assert_eq!(received.reason, CloseReason::IdleTimeout);
    assert_eq!(received.data, vec![4; 10]);
}

/// Short or unknown-type datagrams and pre-handshake DATA change nothing.
#[tokio::test]
async fn malformed_and_early_datagrams_are_ignored() {
    let mut peer = RawPeer::bind().await;
    let (task, sink) = start(&mut peer).await;

    peer.send_bytes(&[1, 2]).await;
    peer.send_bytes(&[0, 1, 0, 9]).await;
    // DATA before the handshake is dropped silently.
    peer.send(&data(1, 1, 10)).await;
    peer.send(&Segment::control(SegmentType::Syn, 0)).await;
    peer.expect_ack(1).await;
    peer.send(&Segment::control(SegmentType::Fin, 1)).await;
    peer.expect_ack(2).await;

    let received = finish(task).await;
    assert!(received.data.is_empty());
    assert!(events_of(&sink, Direction::Snd, SegmentType::Ack)
        .iter()
        .all(|e| e.seq == 1 || e.seq == 2));
}

/// With forward loss 1.0 nothing is processed, only traced as `drp`.
#[tokio::test]
async fn total_forward_loss_drops_everything() {
    let mut peer = RawPeer::bind().await;
    let (socket, addr) = bind().await;
    let sink = Arc::new(MemorySink::new());
    let config = config().forward_loss(1.0);
    let receiver = Receiver::new(socket, peer.addr(), config, sink.clone()).expect("config");
    peer.target = addr;
    let task = tokio::spawn(receiver.run());

    peer.send(&Segment::control(SegmentType::Syn, 0)).await;
    assert!(peer.recv(Duration::from_millis(200)).await.is_none());
    task.abort();

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].direction, Direction::Drp);
    assert_eq!(events[0].kind, SegmentType::Syn);
}
