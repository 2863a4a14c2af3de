//! Replacement policies for the tag store
//!
//! Every policy implements [`ReplacementPolicy`]. Policies never own blocks, they read and write
//! the per-block metadata word and, for the stack based policies, the set's recency stack. Any
//! other state (clocks, random streams, dueling counters, per-set counters) is owned by the policy
//! instance, and so by a single tag store.

use crate::set::CacheSet;
use crate::tag_store::AccessKind;

mod fa_lru;
mod lfu;
mod lru;
mod random;
mod rrip;
mod trash;
mod wbar;

pub use fa_lru::FullyAssociativeLru;
pub use lfu::LeastFrequentlyUsed;
pub use lru::LeastRecentlyUsed;
pub use random::RandomReplacement;
pub use rrip::{DynamicRrip, InsertionPolicy, StaticRrip, TypeAwareRrip};
pub use trash::{Bimodal, TrashResistant};
pub use wbar::WriteBackAware;

/// A generic trait for implementing replacement policies. Used to parameterise a `TagStore`.
pub trait ReplacementPolicy {
    /// Selects the way to evict from a full set
    ///
    /// Only called when every way of the set holds a valid block; filling empty ways is handled by
    /// the set. Must return a way index below the set's associativity
    fn choose_victim(&mut self, set: &mut CacheSet) -> usize;

    /// Updates the policy when a way is touched
    ///
    /// Called with `hit` set on every hit, and with `hit` clear whenever a way is filled, right
    /// before `on_insert`
    fn on_access(&mut self, set: &mut CacheSet, way: usize, hit: bool);

    /// Initialises the metadata of a freshly filled way
    fn on_insert(&mut self, set: &mut CacheSet, way: usize, access: AccessKind);

    /// Called before a valid way is invalidated. A default which does nothing is provided
    fn on_invalidate(&mut self, _set: &mut CacheSet, _way: usize) {}

    /// Whether the policy needs the whole store laid out as a single set indexed by tag
    fn fully_associative(&self) -> bool {
        false
    }

    /// Whether the policy duels insertion policies between leader sets
    fn duels_sets(&self) -> bool {
        false
    }
}

/// Finds the first way with the smallest metadata word
///
/// Shared by the policies ranking ways by a counter, ties go to the lowest way index
pub(crate) fn min_meta_way(set: &CacheSet) -> usize {
    let mut min_value = u64::MAX;
    let mut min_way = 0;
    for (way, block) in set.blocks().iter().enumerate() {
        if block.meta() < min_value {
            min_value = block.meta();
            min_way = way;
        }
    }
    min_way
}

/// Advances a per-set interval counter, returning true when it reaches the interval
///
/// The counter runs through `0..=interval` and restarts, so this is true once every
/// `interval + 1` ticks
pub(crate) fn tick_interval(counter: &mut u32, interval: u32) -> bool {
    if *counter >= interval {
        *counter = 0;
    } else {
        *counter += 1;
    }
    *counter == interval
}
