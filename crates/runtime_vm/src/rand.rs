//! Randomness sources the VM can be wired to.
//!
//! The VM never draws real entropy. [`ReplayingRand`] answers every request
//! from the rules declared on a vector, falling back to the fixed
//! placeholder for unmatched requests.

use tracing::debug;
use tvx_schema::{Randomness, RandomnessKind};

/// Randomness oracle queried by actors.
pub trait Rand: Send {
    fn randomness(&self, kind: RandomnessKind, tag: i64, epoch: i64, entropy: &[u8]) -> Vec<u8>;
}

/// Replays the randomness rules of a vector.
#[derive(Debug, Clone, Default)]
pub struct ReplayingRand {
    rules: Randomness,
}

impl ReplayingRand {
    pub fn new(rules: Randomness) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &Randomness {
        &self.rules
    }
}

impl Rand for ReplayingRand {
    fn randomness(&self, kind: RandomnessKind, tag: i64, epoch: i64, entropy: &[u8]) -> Vec<u8> {
        match self.rules.lookup(kind, tag, epoch, entropy) {
            Some(ret) => ret.to_vec(),
            None => {
                debug!(?kind, tag, epoch, "randomness request unmatched, using fallback");
                self.rules.resolve(kind, tag, epoch, entropy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvx_schema::{RandomnessRule, RANDOMNESS_FALLBACK};

    #[test]
    fn replays_declared_rules() {
        let mut rules = Randomness::default();
        rules.push(
            RandomnessRule::new(RandomnessKind::Chain, 1, 5, b"e".to_vec()),
            vec![9u8; 32],
        );
        let rand = ReplayingRand::new(rules);
        assert_eq!(rand.randomness(RandomnessKind::Chain, 1, 5, b"e"), vec![9u8; 32]);
        assert_eq!(
            rand.randomness(RandomnessKind::Beacon, 1, 5, b"e"),
            RANDOMNESS_FALLBACK.to_vec()
        );
    }
}
