use crate::block::MemoryKind;
use crate::set::CacheSet;
use crate::tag_store::AccessKind;
use super::ReplacementPolicy;

/// Write-back aware replacement (WBAR) for hybrid DRAM/NVM main memory
///
/// A stack policy where the insertion position depends on the backing memory, on whether the
/// fill is a dirty writeback from the level above, and on a per-set counter. The counter rises
/// with demand fills of DRAM lines and falls with demand fills of NVM lines; a high count pushes
/// DRAM fills towards the LRU end and lets dirty NVM writebacks start close to the MRU end, where
/// they avoid costly NVM writes for longer
pub struct WriteBackAware {
    counters: Vec<u32>,
    counter_max: u32,
}

impl WriteBackAware {
    pub fn new(num_sets: usize, counter_max: u32) -> Self {
        Self {
            counters: vec![0; num_sets],
            counter_max,
        }
    }

    /// The counter of a set
    pub fn counter(&self, set_index: u64) -> u32 {
        self.counters[set_index as usize]
    }
}

impl ReplacementPolicy for WriteBackAware {
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize {
        set.tail_way()
    }

    fn on_access(&mut self, set: &mut CacheSet, way: usize, hit: bool) {
        if !hit {
            return;
        }
        match set.block(way).kind() {
            MemoryKind::Nvm => set.move_to_head(way),
            MemoryKind::Dram => {
                let count = self.counters[set.index() as usize] as usize;
                set.promote(way, count / 2);
            }
        }
    }

    fn on_insert(&mut self, set: &mut CacheSet, way: usize, access: AccessKind) {
        let last = set.associativity() - 1;
        let counter = &mut self.counters[set.index() as usize];
        let count = *counter as usize;
        let kind = set.block(way).kind();
        let position = match (access, kind) {
            (AccessKind::Writeback, MemoryKind::Nvm) => count / 8,
            (AccessKind::Writeback, MemoryKind::Dram) => last.saturating_sub(count / 2),
            (_, MemoryKind::Nvm) => {
                *counter = counter.saturating_sub(1);
                last.saturating_sub(count / 4)
            }
            (_, MemoryKind::Dram) => {
                *counter = (*counter + 1).min(self.counter_max);
                last.saturating_sub(count / 8)
            }
        };
        set.move_to_position(way, position);
    }

    fn on_invalidate(&mut self, set: &mut CacheSet, way: usize) {
        set.move_to_tail(way);
    }
}
