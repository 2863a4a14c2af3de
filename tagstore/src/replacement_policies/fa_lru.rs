use std::collections::BTreeMap;
use crate::set::CacheSet;
use crate::tag_store::AccessKind;
use super::ReplacementPolicy;

/// LRU for the fully associative organisation
///
/// The whole store is a single set which can be very wide, so rather than scanning for the oldest
/// stamp the policy keeps valid ways ordered by stamp. Lookups go through the set's tag index and
/// victim selection is a map lookup
pub struct FullyAssociativeLru {
    recency: BTreeMap<u64, usize>,
    time: u64,
}

impl FullyAssociativeLru {
    pub fn new() -> Self {
        Self {
            recency: BTreeMap::new(),
            time: 1,
        }
    }

    fn stamp(&mut self, set: &mut CacheSet, way: usize) {
        let block = set.block_mut(way);
        self.recency.remove(&block.meta());
        block.set_meta(self.time);
        self.recency.insert(self.time, way);
        self.time += 1;
    }
}

impl Default for FullyAssociativeLru {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for FullyAssociativeLru {
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize {
        match self.recency.values().next() {
            Some(way) => *way,
            None => set.consistency_failure("full set with no recency entries"),
        }
    }

    fn on_access(&mut self, set: &mut CacheSet, way: usize, hit: bool) {
        if hit {
            self.stamp(set, way);
        }
    }

    fn on_insert(&mut self, set: &mut CacheSet, way: usize, _access: AccessKind) {
        self.stamp(set, way);
    }

    fn on_invalidate(&mut self, set: &mut CacheSet, way: usize) {
        self.recency.remove(&set.block(way).meta());
    }

    fn fully_associative(&self) -> bool {
        true
    }
}
