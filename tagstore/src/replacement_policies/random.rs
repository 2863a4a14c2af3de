use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use crate::set::CacheSet;
use crate::tag_store::AccessKind;
use super::ReplacementPolicy;

/// Random replacement policy
///
/// Victims are drawn uniformly from the set using a ChaCha stream seeded at construction, so a
/// given seed and access history always produce the same victims
pub struct RandomReplacement {
    rng: ChaCha8Rng,
}

impl RandomReplacement {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl ReplacementPolicy for RandomReplacement {
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize {
        self.rng.gen_range(0..set.associativity())
    }

    fn on_access(&mut self, _set: &mut CacheSet, _way: usize, _hit: bool) {}

    fn on_insert(&mut self, _set: &mut CacheSet, _way: usize, _access: AccessKind) {}
}
