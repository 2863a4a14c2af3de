use crate::block::MemoryKind;
use crate::set::{CacheSet, DuelRole};
use crate::tag_store::AccessKind;
use super::{tick_interval, ReplacementPolicy};

/// The largest value an RRPV `bits` wide can hold
pub(crate) fn rrpv_max(bits: u32) -> u64 {
    (1 << bits) - 1
}

/// Re-reference interval prediction victim search, shared by the RRIP family
///
/// Returns the first way predicted to be re-referenced furthest in the future, ageing every way
/// until one reaches the maximum RRPV. Values are capped, so at most `max + 1` rounds are needed
fn rrip_victim(set: &mut CacheSet, max: u64) -> usize {
    for _ in 0..=max {
        if let Some(way) = set.blocks().iter().position(|b| b.meta() == max) {
            log::trace!("set {}: rrip victim way {way}", set.index());
            return way;
        }
        for way in 0..set.associativity() {
            let block = set.block_mut(way);
            block.set_meta((block.meta() + 1).min(max));
        }
    }
    set.consistency_failure(&format!("no way reached rrpv {max} after {} ageing rounds", max + 1))
}

/// Static re-reference interval prediction (SRRIP)
///
/// Fills are predicted a long re-reference interval (`max - 1` unless configured otherwise), hits
/// predict a near-immediate one
pub struct StaticRrip {
    max: u64,
    insertion: u64,
}

impl StaticRrip {
    /// Creates the policy. An explicit insertion RRPV must not exceed the maximum RRPV
    pub fn new(rrpv_bits: u32, insertion: Option<u64>) -> Self {
        let max = rrpv_max(rrpv_bits);
        debug_assert!(insertion.map_or(true, |rrpv| rrpv <= max), "insertion rrpv above {max}");
        Self {
            max,
            insertion: insertion.unwrap_or(max.saturating_sub(1)),
        }
    }

    pub fn max_rrpv(&self) -> u64 {
        self.max
    }

    pub fn insertion_rrpv(&self) -> u64 {
        self.insertion
    }
}

impl ReplacementPolicy for StaticRrip {
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize {
        rrip_victim(set, self.max)
    }

    fn on_access(&mut self, set: &mut CacheSet, way: usize, hit: bool) {
        if hit {
            set.block_mut(way).set_meta(0);
        }
    }

    fn on_insert(&mut self, set: &mut CacheSet, way: usize, _access: AccessKind) {
        set.block_mut(way).set_meta(self.insertion);
    }
}

/// The two insertion policies competing under dynamic RRIP
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InsertionPolicy {
    /// Insert at a long re-reference interval
    Srrip,
    /// Insert at a distant re-reference interval, occasionally at a long one
    Brrip,
}

/// Dynamic re-reference interval prediction (DRRIP)
///
/// Set dueling between SRRIP and bimodal RRIP insertion. Leader sets are fixed by index when the
/// store is built; a fill in an SRRIP leader counts against SRRIP and a fill in a BRRIP leader
/// counts against BRRIP on a saturating selection counter, and followers use whichever policy the
/// counter favours
pub struct DynamicRrip {
    max: u64,
    psel: u32,
    psel_max: u32,
    bimodal_interval: u32,
    brrip_fills: u32,
}

impl DynamicRrip {
    pub fn new(rrpv_bits: u32, psel_bits: u32, bimodal_interval: u32) -> Self {
        let psel_max = (1u32 << psel_bits) - 1;
        Self {
            max: rrpv_max(rrpv_bits),
            psel: psel_max / 2,
            psel_max,
            bimodal_interval: bimodal_interval.max(1),
            brrip_fills: 0,
        }
    }

    pub fn psel(&self) -> u32 {
        self.psel
    }

    /// The insertion policy followers currently use
    pub fn selected_policy(&self) -> InsertionPolicy {
        if self.psel > self.psel_max / 2 {
            InsertionPolicy::Brrip
        } else {
            InsertionPolicy::Srrip
        }
    }

    fn policy_for(&self, role: DuelRole) -> InsertionPolicy {
        match role {
            DuelRole::SrripLeader => InsertionPolicy::Srrip,
            DuelRole::BrripLeader => InsertionPolicy::Brrip,
            DuelRole::Follower => self.selected_policy(),
        }
    }

    fn insertion_rrpv(&mut self, policy: InsertionPolicy) -> u64 {
        match policy {
            InsertionPolicy::Srrip => self.max.saturating_sub(1),
            InsertionPolicy::Brrip => {
                self.brrip_fills += 1;
                if self.brrip_fills >= self.bimodal_interval {
                    self.brrip_fills = 0;
                    self.max.saturating_sub(1)
                } else {
                    self.max
                }
            }
        }
    }
}

impl ReplacementPolicy for DynamicRrip {
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize {
        rrip_victim(set, self.max)
    }

    fn on_access(&mut self, set: &mut CacheSet, way: usize, hit: bool) {
        if hit {
            set.block_mut(way).set_meta(0);
        }
    }

    fn on_insert(&mut self, set: &mut CacheSet, way: usize, _access: AccessKind) {
        let role = set.duel_role();
        match role {
            DuelRole::SrripLeader => self.psel = (self.psel + 1).min(self.psel_max),
            DuelRole::BrripLeader => self.psel = self.psel.saturating_sub(1),
            DuelRole::Follower => {}
        }
        let policy = self.policy_for(role);
        let rrpv = self.insertion_rrpv(policy);
        set.block_mut(way).set_meta(rrpv);
    }

    fn duels_sets(&self) -> bool {
        true
    }
}

/// Memory-type aware RRIP (TRRIP) for hybrid DRAM/NVM main memory
///
/// NVM lines are costly to miss on, so a hit on one predicts immediate re-reference while a hit on
/// a DRAM line only brings its prediction closer. DRAM fills start at the distant prediction and
/// NVM fills one step nearer. Once every `interval + 1` accesses to a set the fill is given a
/// nearer prediction instead, so the set can adapt when the working set changes
pub struct TypeAwareRrip {
    max: u64,
    intervals: Vec<u32>,
    interval: u32,
    dram_hit_demotion: u64,
}

impl TypeAwareRrip {
    pub fn new(num_sets: usize, rrpv_bits: u32, interval: u32, dram_hit_demotion: u64) -> Self {
        Self {
            max: rrpv_max(rrpv_bits),
            intervals: vec![0; num_sets],
            interval,
            dram_hit_demotion,
        }
    }

    pub fn max_rrpv(&self) -> u64 {
        self.max
    }
}

impl ReplacementPolicy for TypeAwareRrip {
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize {
        rrip_victim(set, self.max)
    }

    fn on_access(&mut self, set: &mut CacheSet, way: usize, hit: bool) {
        tick_interval(&mut self.intervals[set.index() as usize], self.interval);
        if hit {
            let block = set.block_mut(way);
            match block.kind() {
                MemoryKind::Nvm => block.set_meta(0),
                MemoryKind::Dram => {
                    block.set_meta(block.meta().saturating_sub(self.dram_hit_demotion))
                }
            }
        }
    }

    fn on_insert(&mut self, set: &mut CacheSet, way: usize, _access: AccessKind) {
        let bimodal = self.intervals[set.index() as usize] == self.interval;
        let block = set.block_mut(way);
        let rrpv = if bimodal {
            self.max.saturating_sub(2)
        } else {
            match block.kind() {
                MemoryKind::Dram => self.max,
                MemoryKind::Nvm => self.max.saturating_sub(1),
            }
        };
        block.set_meta(rrpv);
    }
}
