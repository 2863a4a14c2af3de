use crate::block::MemoryKind;
use crate::set::CacheSet;
use crate::tag_store::AccessKind;
use super::{tick_interval, ReplacementPolicy};

/// Thrash-resistant replacement for hybrid DRAM/NVM main memory
///
/// A stack policy: new lines are distrusted and land at the LRU end of the recency stack, and only
/// a hit moves a line to the MRU end. Two exceptions insert at MRU instead: the fill that lands on
/// the set's periodic interval, and an NVM fill into a set that still holds a DRAM line, so DRAM
/// lines are given up first
pub struct TrashResistant {
    intervals: Vec<u32>,
    interval: u32,
}

impl TrashResistant {
    pub fn new(num_sets: usize, interval: u32) -> Self {
        Self {
            intervals: vec![0; num_sets],
            interval,
        }
    }
}

impl ReplacementPolicy for TrashResistant {
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize {
        set.tail_way()
    }

    fn on_access(&mut self, set: &mut CacheSet, way: usize, hit: bool) {
        tick_interval(&mut self.intervals[set.index() as usize], self.interval);
        if hit {
            set.move_to_head(way);
        }
    }

    fn on_insert(&mut self, set: &mut CacheSet, way: usize, _access: AccessKind) {
        set.move_to_tail(way);
        let on_interval = self.intervals[set.index() as usize] == self.interval;
        let holds_dram = set
            .blocks()
            .iter()
            .any(|b| b.way_index() != way && b.is_valid() && b.kind() == MemoryKind::Dram);
        if on_interval || (holds_dram && set.block(way).kind() == MemoryKind::Nvm) {
            set.move_to_head(way);
        }
    }

    fn on_invalidate(&mut self, set: &mut CacheSet, way: usize) {
        set.move_to_tail(way);
    }
}

/// Bimodal insertion policy (BIP)
///
/// Like LRU, except fills land at the LRU end of the recency stack and only every
/// `interval`-th fill lands at the MRU end. A scan larger than the set therefore only cycles
/// through the LRU way and leaves the reused lines alone
pub struct Bimodal {
    fills: u32,
    interval: u32,
}

impl Bimodal {
    pub fn new(interval: u32) -> Self {
        Self {
            fills: 0,
            interval: interval.max(1),
        }
    }
}

impl ReplacementPolicy for Bimodal {
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize {
        set.tail_way()
    }

    fn on_access(&mut self, set: &mut CacheSet, way: usize, hit: bool) {
        if hit {
            set.move_to_head(way);
        }
    }

    fn on_insert(&mut self, set: &mut CacheSet, way: usize, _access: AccessKind) {
        self.fills += 1;
        if self.fills >= self.interval {
            self.fills = 0;
            set.move_to_head(way);
        } else {
            set.move_to_tail(way);
        }
    }

    fn on_invalidate(&mut self, set: &mut CacheSet, way: usize) {
        set.move_to_tail(way);
    }
}
