use crate::set::CacheSet;
use crate::tag_store::AccessKind;
use super::{min_meta_way, ReplacementPolicy};

/// Least frequently used replacement policy
///
/// The metadata word is a saturating reference count. It is reset to 1 on insertion and never
/// wraps, once at the cap a block stays at the cap until it is replaced
pub struct LeastFrequentlyUsed {
    max_count: u64,
}

impl LeastFrequentlyUsed {
    /// Creates the policy with counters `counter_bits` wide
    pub fn new(counter_bits: u32) -> Self {
        let max_count = if counter_bits >= u64::BITS {
            u64::MAX
        } else {
            (1 << counter_bits) - 1
        };
        Self { max_count }
    }

    pub fn max_count(&self) -> u64 {
        self.max_count
    }
}

impl ReplacementPolicy for LeastFrequentlyUsed {
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize {
        min_meta_way(set)
    }

    fn on_access(&mut self, set: &mut CacheSet, way: usize, hit: bool) {
        if hit {
            let block = set.block_mut(way);
            let count = block.meta().saturating_add(1).min(self.max_count);
            block.set_meta(count);
        }
    }

    fn on_insert(&mut self, set: &mut CacheSet, way: usize, _access: AccessKind) {
        set.block_mut(way).set_meta(1);
    }
}
