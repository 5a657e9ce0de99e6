//! Endpoint configuration.
//!
//! Both configs are plain structs with public fields and sensible defaults;
//! the builder-style setters exist for call sites that prefer chaining.
//! [`SenderConfig::validate`] / [`ReceiverConfig::validate`] are the only
//! place a bad value is rejected; the engines assume a validated config.

use std::time::Duration;

use thiserror::Error;

use crate::packet::MAX_PAYLOAD;
use crate::seq::HALF_SPACE;

/// Largest accepted send window in bytes.
///
/// The producer may admit one more full segment while the in-flight span is
/// just below the window, so the span stays under half the sequence space.
pub const MAX_WINDOW: usize = HALF_SPACE as usize - MAX_PAYLOAD;

/// A configuration value the engines cannot run with.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a probability in [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("max window must be between 1 and {MAX_WINDOW} bytes, got {0}")]
    Window(usize),

    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}

fn check_duration(name: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        Err(ConfigError::ZeroDuration(name))
    } else {
        Ok(())
    }
}

/// Sender parameters.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Bytes that may be in flight before the producer waits.
    pub max_window: usize,
    /// Age after which an unacknowledged segment is re-sent.
    pub rto: Duration,
    /// How long each SYN or FIN attempt waits for its ACK.
    pub response_timeout: Duration,
    /// SYN and FIN attempts before giving up with a RESET.
    pub max_retries: u32,
    /// Retransmissions of one DATA segment before the peer is declared gone.
    pub max_retransmits: u32,
    /// Probability that an inbound ACK is treated as lost.
    pub reverse_loss: f64,
    /// Fixed initial sequence number; random when `None`.
    pub isn: Option<u16>,
    /// Seed for the loss gate; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_window: 2000,
            rto: Duration::from_millis(500),
            response_timeout: Duration::from_millis(500),
            max_retries: 3,
            max_retransmits: 32,
            reverse_loss: 0.0,
            isn: None,
            seed: None,
        }
    }
}

impl SenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_window(mut self, bytes: usize) -> Self {
        self.max_window = bytes;
        self
    }

    pub fn rto(mut self, rto: Duration) -> Self {
        self.rto = rto;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn max_retransmits(mut self, retransmits: u32) -> Self {
        self.max_retransmits = retransmits;
        self
    }

    pub fn reverse_loss(mut self, probability: f64) -> Self {
        self.reverse_loss = probability;
        self
    }

    pub fn isn(mut self, isn: u16) -> Self {
        self.isn = Some(isn);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_window == 0 || self.max_window > MAX_WINDOW {
            return Err(ConfigError::Window(self.max_window));
        }
        check_duration("rto", self.rto)?;
        check_duration("response timeout", self.response_timeout)?;
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroCount("max retries"));
        }
        if self.max_retransmits == 0 {
            return Err(ConfigError::ZeroCount("max retransmits"));
        }
        check_probability("reverse loss", self.reverse_loss)
    }
}

/// Receiver parameters.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Probability that an inbound datagram is treated as lost.
    pub forward_loss: f64,
    /// Probability that an outbound ACK is dropped instead of sent.
    pub reverse_loss: f64,
    /// Delay before a cumulative ACK for in-order data goes out.
    pub ack_delay: Duration,
    /// Silence after which an open (or lingering) connection closes.
    pub idle_timeout: Duration,
    /// Seed for both loss gates; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            forward_loss: 0.0,
            reverse_loss: 0.0,
            ack_delay: Duration::from_millis(100),
            idle_timeout: Duration::from_secs(2),
            seed: None,
        }
    }
}

impl ReceiverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward_loss(mut self, probability: f64) -> Self {
        self.forward_loss = probability;
        self
    }

    pub fn reverse_loss(mut self, probability: f64) -> Self {
        self.reverse_loss = probability;
        self
    }

    pub fn ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = delay;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("forward loss", self.forward_loss)?;
        check_probability("reverse loss", self.reverse_loss)?;
        check_duration("ack delay", self.ack_delay)?;
        check_duration("idle timeout", self.idle_timeout)
    }
}
