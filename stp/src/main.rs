//! Entry point for `stp`.
//!
//! Parses CLI arguments and runs either the **sender** or the **receiver**.
//! Protocol work is delegated to the library; `main.rs` owns only process
//! setup (logging, argument parsing, file I/O).

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use stp::socket::Socket;
use stp::trace::FileSink;
use stp::{Receiver, ReceiverConfig, Sender, SenderConfig};

/// Reliable file transfer over UDP on the loopback interface.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a file to a waiting receiver.
    Sender {
        /// Local UDP port.
        sender_port: u16,
        /// Receiver's UDP port.
        receiver_port: u16,
        /// File to send.
        file: PathBuf,
        /// Maximum bytes in flight.
        max_win: usize,
        /// Retransmission timeout in milliseconds.
        rto: u64,
        /// Probability of treating an inbound ACK as lost.
        #[arg(long, default_value_t = 0.0)]
        rlp: f64,
        /// Event log path.
        #[arg(long, default_value = "sender_log.txt")]
        log: PathBuf,
    },
    /// Receive one file and write it out.
    Receiver {
        /// Local UDP port.
        receiver_port: u16,
        /// Sender's UDP port.
        sender_port: u16,
        /// Where to write the received stream.
        file: PathBuf,
        /// Forward-loss probability.
        flp: f64,
        /// Reverse-loss probability.
        rlp: f64,
        /// Event log path.
        #[arg(long, default_value = "receiver_log.txt")]
        log: PathBuf,
    },
}

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Sender {
            sender_port,
            receiver_port,
            file,
            max_win,
            rto,
            rlp,
            log,
        } => {
            let config = SenderConfig::new()
                .max_window(max_win)
                .rto(Duration::from_millis(rto))
                .reverse_loss(rlp);
            let source = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("opening {}", file.display()))?;
            let sink = FileSink::create(&log)
                .with_context(|| format!("creating {}", log.display()))?;
            let socket = Socket::bind(loopback(sender_port))
                .await
                .with_context(|| format!("binding port {sender_port}"))?;

            log::info!("sending {} to port {receiver_port}", file.display());
            let sender = Sender::new(socket, loopback(receiver_port), config, Arc::new(sink))?;
            let report = sender.transfer(source).await?;
            log::info!(
                "done: {} bytes, {} retransmissions",
                report.bytes_sent,
                report.retransmissions
            );
        }
        Mode::Receiver {
            receiver_port,
            sender_port,
            file,
            flp,
            rlp,
            log,
        } => {
            let config = ReceiverConfig::new().forward_loss(flp).reverse_loss(rlp);
            let sink = FileSink::create(&log)
                .with_context(|| format!("creating {}", log.display()))?;
            let socket = Socket::bind(loopback(receiver_port))
                .await
                .with_context(|| format!("binding port {receiver_port}"))?;

            log::info!("waiting for a connection on port {receiver_port}");
            let receiver = Receiver::new(socket, loopback(sender_port), config, Arc::new(sink))?;
            let received = receiver.run().await?;
            tokio::fs::write(&file, &received.data)
                .await
                .with_context(|| format!("writing {}", file.display()))?;
            log::info!(
                "wrote {} bytes to {} ({:?})",
                received.data.len(),
                file.display(),
                received.reason
            );
        }
    }
    Ok(())
}
