use std::collections::HashMap;
use crate::block::{Block, MemoryKind};
use crate::replacement_policies::ReplacementPolicy;
use crate::tag_store::AccessKind;

/// The part a set plays in set dueling between two insertion policies
///
/// Leader sets always use their own insertion policy and feed the selection counter, followers
/// adopt whichever policy the counter currently favours
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DuelRole {
    Follower,
    SrripLeader,
    BrripLeader,
}

impl DuelRole {
    /// Assigns a role from the set index alone, so the assignment is the same on every run
    ///
    /// A stride of 0 or 1 disables dueling, every set is then a follower
    pub fn for_set(set_index: u64, leader_set_stride: u64) -> Self {
        if leader_set_stride < 2 {
            return DuelRole::Follower;
        }
        match set_index % leader_set_stride {
            0 => DuelRole::SrripLeader,
            1 => DuelRole::BrripLeader,
            _ => DuelRole::Follower,
        }
    }
}

/// How a way is being touched by `CacheSet::record_access`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Touch {
    /// The way already holds the requested line
    Hit(AccessKind),
    /// The way is being filled with a new line after a miss
    Fill {
        tag: u64,
        kind: MemoryKind,
        access: AccessKind,
    },
}

/// One associative bucket of the tag store
///
/// Besides its blocks, the set owns the recency stack used by the stack-based policies (way
/// indices, most recently used first) and, for the fully associative organisation, an index from
/// tag to way so lookups don't need a scan
#[derive(Debug)]
pub struct CacheSet {
    index: u64,
    blocks: Vec<Block>,
    stack: Vec<usize>,
    duel_role: DuelRole,
    tag_index: Option<HashMap<u64, usize>>,
}

impl CacheSet {
    pub(crate) fn new(index: u64, associativity: usize, duel_role: DuelRole) -> Self {
        Self {
            index,
            blocks: (0..associativity).map(|way| Block::new(index, way)).collect(),
            stack: (0..associativity).collect(),
            duel_role,
            tag_index: None,
        }
    }

    /// Creates a set which keeps a hash index from tag to way
    pub(crate) fn with_tag_index(index: u64, associativity: usize) -> Self {
        let mut set = Self::new(index, associativity, DuelRole::Follower);
        set.tag_index = Some(HashMap::with_capacity(associativity));
        set
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn associativity(&self) -> usize {
        self.blocks.len()
    }

    pub fn duel_role(&self) -> DuelRole {
        self.duel_role
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, way: usize) -> &Block {
        &self.blocks[way]
    }

    /// Mutable access to a block, for policies updating their metadata word
    pub fn block_mut(&mut self, way: usize) -> &mut Block {
        &mut self.blocks[way]
    }

    /// The number of valid blocks
    pub fn occupancy(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_valid()).count()
    }

    /// Finds the way holding a valid block with the given tag
    pub fn find(&self, tag: u64) -> Option<usize> {
        if let Some(index) = &self.tag_index {
            return index.get(&tag).copied();
        }
        // At most one valid block can hold the tag, the first match is the only one
        self.blocks.iter().position(|b| b.is_valid() && b.tag() == tag)
    }

    /// Picks the way a new line will be placed in
    ///
    /// Empty capacity is always filled before anything is evicted, the policy is only consulted
    /// when every way holds a valid block
    pub fn select_victim_way<P: ReplacementPolicy>(&mut self, policy: &mut P) -> usize {
        if let Some(way) = self.blocks.iter().position(|b| !b.is_valid()) {
            return way;
        }
        let way = policy.choose_victim(self);
        if way >= self.blocks.len() {
            self.consistency_failure(&format!("policy chose way {way} which does not exist"));
        }
        way
    }

    /// Applies a hit or a fill to a way and lets the policy update its metadata
    pub fn record_access<P>(&mut self, way: usize, touch: Touch, policy: &mut P)
    where
        P: ReplacementPolicy,
    {
        match touch {
            Touch::Hit(access) => {
                if access.is_write() {
                    self.blocks[way].mark_dirty();
                }
                policy.on_access(self, way, true);
            }
            Touch::Fill { tag, kind, access } => {
                debug_assert!(
                    !self.blocks[way].is_valid(),
                    "filling a valid way {way} of set {}",
                    self.index
                );
                self.blocks[way].fill(tag, kind, access.is_write());
                if let Some(index) = &mut self.tag_index {
                    index.insert(tag, way);
                }
                policy.on_access(self, way, false);
                policy.on_insert(self, way, access);
                #[cfg(debug_assertions)]
                self.check_unique_tags();
            }
        }
    }

    /// Invalidates a way, returning the block as it was if it held a line
    pub(crate) fn invalidate<P>(&mut self, way: usize, policy: &mut P) -> Option<Block>
    where
        P: ReplacementPolicy,
    {
        let block = self.blocks[way];
        if !block.is_valid() {
            return None;
        }
        policy.on_invalidate(self, way);
        self.blocks[way].invalidate();
        if let Some(index) = &mut self.tag_index {
            index.remove(&block.tag());
        }
        Some(block)
    }

    /// The position of a way in the recency stack, 0 being the most recently used
    pub fn stack_position(&self, way: usize) -> usize {
        match self.stack.iter().position(|w| *w == way) {
            Some(position) => position,
            None => self.consistency_failure(&format!("way {way} missing from the recency stack")),
        }
    }

    /// The way at the least recently used end of the recency stack
    pub fn tail_way(&self) -> usize {
        self.stack[self.stack.len() - 1]
    }

    /// Moves a way to a position in the recency stack, clamped to the last position
    pub fn move_to_position(&mut self, way: usize, position: usize) {
        let current = self.stack_position(way);
        self.stack.remove(current);
        let position = position.min(self.stack.len());
        self.stack.insert(position, way);
    }

    pub fn move_to_head(&mut self, way: usize) {
        self.move_to_position(way, 0);
    }

    pub fn move_to_tail(&mut self, way: usize) {
        self.move_to_position(way, self.stack.len());
    }

    /// Moves a way `by` positions towards the head of the recency stack
    pub fn promote(&mut self, way: usize, by: usize) {
        let current = self.stack_position(way);
        self.move_to_position(way, current.saturating_sub(by));
    }

    /// Checks that no tag is resident twice, aborting with a dump of the set if one is
    pub fn check_unique_tags(&self) {
        for (way, block) in self.blocks.iter().enumerate().filter(|(_, b)| b.is_valid()) {
            let duplicate = self.blocks[way + 1..]
                .iter()
                .any(|other| other.is_valid() && other.tag() == block.tag());
            if duplicate {
                let reason = format!("tag {:#x} is resident more than once", block.tag());
                self.consistency_failure(&reason);
            }
        }
    }

    /// Reports a broken internal invariant. These are policy bugs, never input errors, so the
    /// full state of the set is dumped and the process aborts
    pub fn consistency_failure(&self, reason: &str) -> ! {
        log::error!("internal consistency failure in set {}: {reason}", self.index);
        panic!("internal consistency failure in set {}: {reason}\n{self:#?}", self.index)
    }
}
