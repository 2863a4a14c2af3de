use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::block::{Block, MemoryKind};
use crate::config::{ConfigError, Geometry, PolicyKind, TagStoreConfig};
use crate::replacement_policies::{
    Bimodal, DynamicRrip, FullyAssociativeLru, LeastFrequentlyUsed, LeastRecentlyUsed,
    RandomReplacement, ReplacementPolicy, StaticRrip, TrashResistant, TypeAwareRrip,
    WriteBackAware,
};
use crate::set::{CacheSet, DuelRole, Touch};

/// The kind of request reaching the tag store
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    /// A dirty line written back from the level above
    Writeback,
}

impl AccessKind {
    pub fn is_write(self) -> bool {
        !matches!(self, AccessKind::Read)
    }
}

/// The result of a lookup. On a miss there is no way, the caller installs separately
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub hit: bool,
    pub set_index: u64,
    pub way: Option<usize>,
    /// The store's hit latency in cycles, for the caller's scheduling
    pub latency: u64,
}

/// Notification that a valid line left the store, so a dirty one can be written back
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Eviction {
    /// Block-aligned address of the evicted line
    pub address: u64,
    pub was_dirty: bool,
}

/// Where an install placed the line, and what it displaced
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub set_index: u64,
    pub way: usize,
    pub eviction: Option<Eviction>,
}

/// A lookup, followed by an install when the lookup missed
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    pub lookup: LookupResult,
    pub install: Option<InstallOutcome>,
}

impl AccessOutcome {
    pub fn hit(&self) -> bool {
        self.lookup.hit
    }

    pub fn eviction(&self) -> Option<Eviction> {
        self.install.and_then(|i| i.eviction)
    }
}

/// Counters collected by a tag store
#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagStoreStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Evictions of dirty lines
    pub writebacks: u64,
    pub occupancy: u64,
}

/// A request the tag store can't serve. These are caller contract violations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagStoreError {
    #[error("address {address:#x} is outside the {address_bits} bit address space")]
    AddressOutOfRange { address: u64, address_bits: u32 },
    #[error("address {address:#x} is already resident")]
    AlreadyResident { address: u64 },
}

impl Geometry {
    /// Splits an address into a set index and a tag
    ///
    /// The tag is every address bit above the set index, shifted down
    pub fn address_to_set_and_tag(&self, address: u64) -> Result<(u64, u64), TagStoreError> {
        if self.address_bits < u64::BITS && address >> self.address_bits != 0 {
            return Err(TagStoreError::AddressOutOfRange {
                address,
                address_bits: self.address_bits,
            });
        }
        let set_index = (address >> self.offset_bits) & (self.num_sets - 1);
        let tag = address.checked_shr(self.offset_bits + self.index_bits).unwrap_or(0);
        Ok((set_index, tag))
    }

    /// Rebuilds the block-aligned address of a line from its set index and tag
    pub fn block_address(&self, set_index: u64, tag: u64) -> u64 {
        let tag_bits = tag.checked_shl(self.offset_bits + self.index_bits).unwrap_or(0);
        tag_bits | (set_index << self.offset_bits)
    }
}

/// A generic trait for tag stores
///
/// Static dispatch is used for the concrete stores and the enum below, this keeps the operations
/// available to code that is generic over the policy. Only `probe`, `fill` and `invalidate` touch
/// state, the rest is expressed in terms of them
pub trait TagStoreTrait {
    fn geometry(&self) -> &Geometry;

    /// Looks an address up, updating the policy on a hit
    fn probe(&mut self, address: u64, access: AccessKind) -> Result<LookupResult, TagStoreError>;

    /// Installs an address which missed, evicting a line if the set is full
    fn fill(&mut self, address: u64, access: AccessKind) -> Result<InstallOutcome, TagStoreError>;

    /// Invalidates an address if it's resident, returning the line's prior state
    fn invalidate(&mut self, address: u64) -> Result<Option<Eviction>, TagStoreError>;

    fn stats(&self) -> TagStoreStats;

    /// Read-only view of a block, `None` when the set or way doesn't exist
    fn block(&self, set_index: u64, way: usize) -> Option<&Block>;

    fn lookup(&mut self, address: u64, is_write: bool) -> Result<LookupResult, TagStoreError> {
        self.probe(address, if is_write { AccessKind::Write } else { AccessKind::Read })
    }

    fn install(&mut self, address: u64, is_write: bool) -> Result<InstallOutcome, TagStoreError> {
        self.fill(address, if is_write { AccessKind::Write } else { AccessKind::Read })
    }

    /// Installs a dirty line written back from the level above
    fn install_writeback(&mut self, address: u64) -> Result<InstallOutcome, TagStoreError> {
        self.fill(address, AccessKind::Writeback)
    }

    /// Looks an address up and installs it on a miss
    fn access(&mut self, address: u64, access: AccessKind) -> Result<AccessOutcome, TagStoreError> {
        let lookup = self.probe(address, access)?;
        let install = if lookup.hit { None } else { Some(self.fill(address, access)?) };
        Ok(AccessOutcome { lookup, install })
    }

    fn address_to_set_and_tag(&self, address: u64) -> Result<(u64, u64), TagStoreError> {
        self.geometry().address_to_set_and_tag(address)
    }

    fn block_address(&self, set_index: u64, tag: u64) -> u64 {
        self.geometry().block_address(set_index, tag)
    }

    fn hit_latency(&self) -> u64 {
        self.geometry().hit_latency
    }

    /// Gets the number of valid blocks
    fn occupancy(&self) -> u64 {
        self.stats().occupancy
    }

    fn hit_count(&self) -> u64 {
        self.stats().hits
    }

    fn miss_count(&self) -> u64 {
        self.stats().misses
    }

    fn eviction_count(&self) -> u64 {
        self.stats().evictions
    }

    /// Gets the number of evictions which were dirty
    fn writeback_count(&self) -> u64 {
        self.stats().writebacks
    }
}

/// A tag store parameterised by a replacement policy
///
/// The store owns every set and the policy, nothing else reaches into a set. Like the rest of the
/// crate it relies on monomorphisation so the policy hooks are inlined into the hit path
pub struct TagStore<P: ReplacementPolicy> {
    name: String,
    geometry: Geometry,
    region_border: Option<u64>,
    sets: Vec<CacheSet>,
    policy: P,
    stats: TagStoreStats,
}

impl<P: ReplacementPolicy> TagStore<P> {
    /// Builds a store from a configuration and a policy instance
    ///
    /// The layout of the sets follows the policy: a fully associative policy gets one set with a
    /// tag index, a dueling policy gets leader sets every `leader_set_stride` sets
    pub fn new(config: &TagStoreConfig, policy: P) -> Result<Self, ConfigError> {
        let geometry = config.geometry()?;
        let associativity = geometry.associativity as usize;
        let sets = if policy.fully_associative() {
            if geometry.num_sets != 1 {
                return Err(ConfigError::NotFullyAssociative {
                    name: config.name.clone(),
                    associativity: geometry.associativity,
                    expected: geometry.num_blocks(),
                });
            }
            vec![CacheSet::with_tag_index(0, associativity)]
        } else {
            let stride = if policy.duels_sets() {
                let stride = config.policy_params.leader_set_stride;
                if stride < 2 {
                    return Err(ConfigError::ParameterOutOfRange {
                        name: config.name.clone(),
                        param: "leader_set_stride",
                        value: stride,
                    });
                }
                stride
            } else {
                0
            };
            (0..geometry.num_sets)
                .map(|index| CacheSet::new(index, associativity, DuelRole::for_set(index, stride)))
                .collect()
        };
        log::info!(
            "cache `{}`: {} bytes, {} sets of {} ways, {} byte blocks, {:?} replacement, {} cycles",
            config.name,
            geometry.capacity,
            geometry.num_sets,
            geometry.associativity,
            geometry.block_size,
            config.replacement_policy,
            geometry.hit_latency
        );
        Ok(Self {
            name: config.name.clone(),
            geometry,
            region_border: config.region_border,
            sets,
            policy,
            stats: TagStoreStats::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    #[cfg(test)]
    pub(crate) fn set(&self, set_index: u64) -> &CacheSet {
        &self.sets[set_index as usize]
    }
}

impl<P: ReplacementPolicy> TagStoreTrait for TagStore<P> {
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn probe(&mut self, address: u64, access: AccessKind) -> Result<LookupResult, TagStoreError> {
        let (set_index, tag) = self.geometry.address_to_set_and_tag(address)?;
        let set = &mut self.sets[set_index as usize];
        let way = set.find(tag);
        if let Some(way) = way {
            set.record_access(way, Touch::Hit(access), &mut self.policy);
            self.stats.hits += 1;
            log::trace!("cache `{}`: hit {address:#x} in set {set_index} way {way}", self.name);
        } else {
            self.stats.misses += 1;
            log::trace!("cache `{}`: miss {address:#x} in set {set_index}", self.name);
        }
        Ok(LookupResult {
            hit: way.is_some(),
            set_index,
            way,
            latency: self.geometry.hit_latency,
        })
    }

    fn fill(&mut self, address: u64, access: AccessKind) -> Result<InstallOutcome, TagStoreError> {
        let geometry = self.geometry;
        let (set_index, tag) = geometry.address_to_set_and_tag(address)?;
        let kind = MemoryKind::classify(geometry.block_address(set_index, tag), self.region_border);
        let set = &mut self.sets[set_index as usize];
        if set.find(tag).is_some() {
            return Err(TagStoreError::AlreadyResident { address });
        }
        let way = set.select_victim_way(&mut self.policy);
        let eviction = set.invalidate(way, &mut self.policy).map(|victim| Eviction {
            address: geometry.block_address(set_index, victim.tag()),
            was_dirty: victim.is_dirty(),
        });
        set.record_access(way, Touch::Fill { tag, kind, access }, &mut self.policy);
        match eviction {
            Some(evicted) => {
                self.stats.evictions += 1;
                if evicted.was_dirty {
                    self.stats.writebacks += 1;
                }
                log::debug!(
                    "cache `{}`: {address:#x} evicts {:#x} ({}) from set {set_index} way {way}",
                    self.name,
                    evicted.address,
                    if evicted.was_dirty { "dirty" } else { "clean" }
                );
            }
            None => self.stats.occupancy += 1,
        }
        Ok(InstallOutcome {
            set_index,
            way,
            eviction,
        })
    }

    fn invalidate(&mut self, address: u64) -> Result<Option<Eviction>, TagStoreError> {
        let (set_index, tag) = self.geometry.address_to_set_and_tag(address)?;
        let set = &mut self.sets[set_index as usize];
        let Some(way) = set.find(tag) else {
            return Ok(None);
        };
        let invalidated = set.invalidate(way, &mut self.policy).map(|block| Eviction {
            address: self.geometry.block_address(set_index, block.tag()),
            was_dirty: block.is_dirty(),
        });
        if let Some(invalidated) = invalidated {
            self.stats.occupancy -= 1;
            log::debug!(
                "cache `{}`: invalidated {:#x} (dirty: {})",
                self.name,
                invalidated.address,
                invalidated.was_dirty
            );
        }
        Ok(invalidated)
    }

    fn stats(&self) -> TagStoreStats {
        self.stats
    }

    fn block(&self, set_index: u64, way: usize) -> Option<&Block> {
        self.sets.get(set_index as usize).and_then(|s| s.blocks().get(way))
    }
}

/// Enum for every tag store the library provides
///
/// Trait objects would save the boilerplate, but every access would then go through a virtual
/// call the compiler can't see through. Branching on the concrete store keeps the policy hooks
/// inlinable
pub enum GenericTagStore {
    Lru(TagStore<LeastRecentlyUsed>),
    Lfu(TagStore<LeastFrequentlyUsed>),
    Random(TagStore<RandomReplacement>),
    StaticRrip(TagStore<StaticRrip>),
    DynamicRrip(TagStore<DynamicRrip>),
    TrashResistant(TagStore<TrashResistant>),
    FullyAssociativeLru(TagStore<FullyAssociativeLru>),
    Bimodal(TagStore<Bimodal>),
    TypeAwareRrip(TagStore<TypeAwareRrip>),
    WriteBackAware(TagStore<WriteBackAware>),
}

macro_rules! generic_from {
    ($($variant:ident => $policy:ty),* $(,)?) => {
        $(
            impl From<TagStore<$policy>> for GenericTagStore {
                fn from(value: TagStore<$policy>) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

generic_from!(
    Lru => LeastRecentlyUsed,
    Lfu => LeastFrequentlyUsed,
    Random => RandomReplacement,
    StaticRrip => StaticRrip,
    DynamicRrip => DynamicRrip,
    TrashResistant => TrashResistant,
    FullyAssociativeLru => FullyAssociativeLru,
    Bimodal => Bimodal,
    TypeAwareRrip => TypeAwareRrip,
    WriteBackAware => WriteBackAware,
);

macro_rules! dispatch {
    ($self:expr, $store:ident => $body:expr) => {
        match $self {
            GenericTagStore::Lru($store) => $body,
            GenericTagStore::Lfu($store) => $body,
            GenericTagStore::Random($store) => $body,
            GenericTagStore::StaticRrip($store) => $body,
            GenericTagStore::DynamicRrip($store) => $body,
            GenericTagStore::TrashResistant($store) => $body,
            GenericTagStore::FullyAssociativeLru($store) => $body,
            GenericTagStore::Bimodal($store) => $body,
            GenericTagStore::TypeAwareRrip($store) => $body,
            GenericTagStore::WriteBackAware($store) => $body,
        }
    };
}

impl GenericTagStore {
    /// Validates a configuration and builds the store with the policy it names
    pub fn from_config(config: &TagStoreConfig) -> Result<Self, ConfigError> {
        let geometry = config.geometry()?;
        let num_sets = geometry.num_sets as usize;
        let p = &config.policy_params;
        let store = match config.replacement_policy {
            PolicyKind::Lru => TagStore::new(config, LeastRecentlyUsed::new())?.into(),
            PolicyKind::Lfu => {
                TagStore::new(config, LeastFrequentlyUsed::new(p.lfu_counter_bits))?.into()
            }
            PolicyKind::Random => TagStore::new(config, RandomReplacement::new(p.seed))?.into(),
            PolicyKind::StaticRrip => {
                TagStore::new(config, StaticRrip::new(p.rrpv_bits, p.srrip_insertion))?.into()
            }
            PolicyKind::DynamicRrip => {
                let policy = DynamicRrip::new(p.rrpv_bits, p.psel_bits, p.bimodal_interval);
                TagStore::new(config, policy)?.into()
            }
            PolicyKind::TrashResistant => {
                TagStore::new(config, TrashResistant::new(num_sets, p.trash_interval))?.into()
            }
            PolicyKind::FullyAssociativeLru => {
                TagStore::new(config, FullyAssociativeLru::new())?.into()
            }
            PolicyKind::Bimodal => TagStore::new(config, Bimodal::new(p.bimodal_interval))?.into(),
            PolicyKind::TypeAwareRrip => {
                let policy = TypeAwareRrip::new(
                    num_sets,
                    p.trrip_rrpv_bits,
                    p.trrip_interval,
                    p.dram_hit_demotion,
                );
                TagStore::new(config, policy)?.into()
            }
            PolicyKind::WriteBackAware => {
                let counter_max = p.wbar_counter_max.unwrap_or(4 * geometry.associativity as u32);
                TagStore::new(config, WriteBackAware::new(num_sets, counter_max))?.into()
            }
        };
        Ok(store)
    }

    pub fn name(&self) -> &str {
        dispatch!(self, s => s.name())
    }
}

impl TagStoreTrait for GenericTagStore {
    fn geometry(&self) -> &Geometry {
        dispatch!(self, s => s.geometry())
    }

    fn probe(&mut self, address: u64, access: AccessKind) -> Result<LookupResult, TagStoreError> {
        dispatch!(self, s => s.probe(address, access))
    }

    fn fill(&mut self, address: u64, access: AccessKind) -> Result<InstallOutcome, TagStoreError> {
        dispatch!(self, s => s.fill(address, access))
    }

    fn invalidate(&mut self, address: u64) -> Result<Option<Eviction>, TagStoreError> {
        dispatch!(self, s => s.invalidate(address))
    }

    fn stats(&self) -> TagStoreStats {
        dispatch!(self, s => s.stats())
    }

    fn block(&self, set_index: u64, way: usize) -> Option<&Block> {
        dispatch!(self, s => s.block(set_index, way))
    }
}
