//! Loss simulator.
//!
//! The datagram channel between the endpoints is loopback, so it never loses
//! anything on its own.  To exercise the reliability mechanisms each endpoint
//! passes its traffic through a [`LossGate`]: an independent Bernoulli trial
//! per unit that decides whether the unit is acted upon or treated as if it
//! never arrived.
//!
//! | Gate     | Owner    | Applied to                                  |
//! |----------|----------|---------------------------------------------|
//! | forward  | receiver | every datagram the receiver reads           |
//! | reverse  | receiver | every ACK the receiver is about to send     |
//! | reverse  | sender   | every datagram the sender reads (ACKs)      |
//!
//! Losses are i.i.d.; the gate keeps no memory of previous outcomes.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A per-direction Bernoulli drop decision.
#[derive(Debug)]
pub struct LossGate {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl LossGate {
    /// A gate dropping each unit with `probability`, seeded from entropy.
    ///
    /// `probability` is expected to be validated by the config layer.
    pub fn new(probability: f64) -> Self {
        Self::with_rng(probability, StdRng::from_os_rng())
    }

    /// A gate with a reproducible drop sequence.
    pub fn seeded(probability: f64, seed: u64) -> Self {
        Self::with_rng(probability, StdRng::seed_from_u64(seed))
    }

    /// Build from an optional seed, as carried by the endpoint configs.
    pub fn from_seed(probability: f64, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(probability, seed),
            None => Self::new(probability),
        }
    }

    fn with_rng(probability: f64, rng: StdRng) -> Self {
        Self {
            probability,
            rng: Mutex::new(rng),
        }
    }

    /// Draw once: `true` means deliver, `false` means drop.
    pub fn should_deliver(&self) -> bool {
        if self.probability <= 0.0 {
            return true;
        }
        let draw: f64 = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .random();
        draw > self.probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_probability_always_delivers() {
        let gate = LossGate::new(0.0);
        assert!((0..10_000).all(|_| gate.should_deliver()));
    }

    #[test]
    fn certain_loss_always_drops() {
        let gate = LossGate::new(1.0);
        assert!((0..10_000).all(|_| !gate.should_deliver()));
    }

    #[test]
    fn seeded_gates_agree() {
        let a = LossGate::seeded(0.3, 7);
        let b = LossGate::seeded(0.3, 7);
        let run_a: Vec<bool> = (0..256).map(|_| a.should_deliver()).collect();
        let run_b: Vec<bool> = (0..256).map(|_| b.should_deliver()).collect();
        assert_eq!(run_a, run_b);
    }

    #[test]
    fn drop_rate_tracks_probability() {
        let gate = LossGate::seeded(0.25, 99);
        let dropped = (0..20_000).filter(|_| !gate.should_deliver()).count();
        let rate = dropped as f64 / 20_000.0;
        assert!((0.22..0.28).contains(&rate), "observed drop rate {rate}");
    }
}
