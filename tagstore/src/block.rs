/// The memory technology backing a block's address in a hybrid main memory
///
/// Addresses at or below the configured region border are served by DRAM, addresses above it by
/// NVM. Region-aware policies use this to keep blocks that are expensive to re-fetch or write back
/// resident for longer
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryKind {
    Dram,
    Nvm,
}

impl MemoryKind {
    /// Classifies a block-aligned address against an optional region border
    ///
    /// With no border every address is DRAM
    pub fn classify(block_address: u64, region_border: Option<u64>) -> Self {
        match region_border {
            Some(border) if block_address > border => MemoryKind::Nvm,
            _ => MemoryKind::Dram,
        }
    }
}

/// A single tag-store line. Holds metadata only, there is no payload
///
/// Tag, validity and dirtiness are only changed by the owning set so they always move together.
/// The `meta` word belongs to the replacement policy: a recency stamp, a reference count or an
/// RRPV depending on which policy owns the store
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Block {
    tag: u64,
    valid: bool,
    dirty: bool,
    set_index: u64,
    way_index: usize,
    kind: MemoryKind,
    meta: u64,
}

impl Block {
    pub(crate) fn new(set_index: u64, way_index: usize) -> Self {
        Self {
            tag: 0,
            valid: false,
            dirty: false,
            set_index,
            way_index,
            kind: MemoryKind::Dram,
            meta: 0,
        }
    }

    /// The tag of the resident line. Meaningless when the block is invalid
    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the resident line has pending writes. Always false for invalid blocks
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_index(&self) -> u64 {
        self.set_index
    }

    pub fn way_index(&self) -> usize {
        self.way_index
    }

    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    /// The policy-owned metadata word
    pub fn meta(&self) -> u64 {
        self.meta
    }

    pub fn set_meta(&mut self, meta: u64) {
        self.meta = meta;
    }

    pub(crate) fn fill(&mut self, tag: u64, kind: MemoryKind, dirty: bool) {
        self.tag = tag;
        self.kind = kind;
        self.dirty = dirty;
        self.valid = true;
    }

    pub(crate) fn mark_dirty(&mut self) {
        debug_assert!(self.valid, "marking an invalid block dirty: {self:?}");
        self.dirty = true;
    }

    pub(crate) fn invalidate(&mut self) {
        self.valid = false;
        self.dirty = false;
    }
}
