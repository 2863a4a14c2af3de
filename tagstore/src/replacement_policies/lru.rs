use crate::set::CacheSet;
use crate::tag_store::AccessKind;
use super::{min_meta_way, ReplacementPolicy};

/// Least Recently Used replacement policy
///
/// Each block's metadata word holds the logical time it was last touched. The clock is shared by
/// every set of the store and advances on each hit and fill, so stamps within a set are unique and
/// the oldest one is always the least recently used line
pub struct LeastRecentlyUsed {
    time: u64,
}

impl LeastRecentlyUsed {
    pub fn new() -> Self {
        // Start at 1 so a stamped block is always newer than the initial metadata
        Self { time: 1 }
    }

    fn stamp(&mut self, set: &mut CacheSet, way: usize) {
        set.block_mut(way).set_meta(self.time);
        self.time += 1;
    }
}

impl Default for LeastRecentlyUsed {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize {
        min_meta_way(set)
    }

    fn on_access(&mut self, set: &mut CacheSet, way: usize, hit: bool) {
        if hit {
            self.stamp(set, way);
        }
    }

    fn on_insert(&mut self, set: &mut CacheSet, way: usize, _access: AccessKind) {
        self.stamp(set, way);
    }
}
