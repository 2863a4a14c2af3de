use serde::Deserialize;
use thiserror::Error;

/// A cache configuration with multiple layers, first entry closest to the processor
#[derive(Debug, Deserialize)]
pub struct LayeredCacheConfig {
    /// Cycles charged for each line served by main memory
    #[serde(default)]
    pub memory_latency: u64,
    pub caches: Vec<TagStoreConfig>,
}

/// The configuration of a single tag store
#[derive(Debug, Clone, Deserialize)]
pub struct TagStoreConfig {
    pub name: String,
    #[serde(alias = "size")]
    pub capacity: u64,
    #[serde(alias = "line_size")]
    pub block_size: u64,
    pub associativity: u64,
    #[serde(default = "default_hit_latency")]
    pub hit_latency: u64,
    #[serde(default)]
    pub replacement_policy: PolicyKind,
    /// Width of the physical address space, addresses beyond it are rejected
    #[serde(default = "default_address_bits")]
    pub address_bits: u32,
    /// Highest address backed by DRAM in a hybrid memory, everything above is NVM. `null` treats
    /// all memory as DRAM
    #[serde(default = "default_region_border")]
    pub region_border: Option<u64>,
    #[serde(default)]
    pub policy_params: PolicyParams,
}

fn default_hit_latency() -> u64 {
    1
}

fn default_address_bits() -> u32 {
    64
}

fn default_region_border() -> Option<u64> {
    Some(1 << 30)
}

/// The replacement policy of a tag store. Defaults to LRU.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub enum PolicyKind {
    #[serde(alias = "lru")]
    Lru,
    #[serde(alias = "lfu")]
    Lfu,
    #[serde(alias = "random")]
    Random,
    #[serde(alias = "srrip")]
    StaticRrip,
    #[serde(alias = "drrip")]
    DynamicRrip,
    #[serde(alias = "trash")]
    TrashResistant,
    #[serde(alias = "fa_lru")]
    FullyAssociativeLru,
    #[serde(alias = "bip")]
    Bimodal,
    #[serde(alias = "trrip")]
    TypeAwareRrip,
    #[serde(alias = "wbar")]
    WriteBackAware,
}

impl Default for PolicyKind {
    fn default() -> Self {
        PolicyKind::Lru
    }
}

/// Policy specific tuning. Every field has a default, only the ones a policy reads matter to it
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyParams {
    /// RRPV width for SRRIP and DRRIP
    pub rrpv_bits: u32,
    /// RRPV given to SRRIP fills, `max - 1` when unset
    pub srrip_insertion: Option<u64>,
    /// One SRRIP and one BRRIP leader set in every `leader_set_stride` sets
    pub leader_set_stride: u64,
    pub psel_bits: u32,
    /// BRRIP and BIP make one near insertion every `bimodal_interval` fills
    pub bimodal_interval: u32,
    pub seed: u64,
    pub lfu_counter_bits: u32,
    pub trash_interval: u32,
    pub trrip_rrpv_bits: u32,
    pub trrip_interval: u32,
    pub dram_hit_demotion: u64,
    /// Saturation point of the WBAR per-set counter, `4 * associativity` when unset
    pub wbar_counter_max: Option<u32>,
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self {
            rrpv_bits: 2,
            srrip_insertion: None,
            leader_set_stride: 32,
            psel_bits: 10,
            bimodal_interval: 32,
            seed: 0,
            lfu_counter_bits: 32,
            trash_interval: 23,
            trrip_rrpv_bits: 3,
            trrip_interval: 80,
            dram_hit_demotion: 3,
            wbar_counter_max: None,
        }
    }
}

/// A configuration which was rejected. Nothing is ever rounded to make it fit
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cache `{name}`: capacity must be non-zero")]
    ZeroCapacity { name: String },
    #[error("cache `{name}`: associativity must be at least 1")]
    ZeroAssociativity { name: String },
    #[error("cache `{name}`: block size {block_size} is not a power of two")]
    BlockSizeNotPowerOfTwo { name: String, block_size: u64 },
    #[error("cache `{name}`: capacity {capacity} isn't a multiple of {block_size}x{associativity}")]
    CapacityNotDivisible {
        name: String,
        capacity: u64,
        block_size: u64,
        associativity: u64,
    },
    #[error("cache `{name}`: number of sets {num_sets} is not a power of two")]
    SetsNotPowerOfTwo { name: String, num_sets: u64 },
    #[error("cache `{name}`: fully associative needs {expected} ways, got {associativity}")]
    NotFullyAssociative {
        name: String,
        associativity: u64,
        expected: u64,
    },
    #[error("cache `{name}`: {address_bits} address bits can't hold {needed} offset/index bits")]
    AddressSpaceTooSmall {
        name: String,
        address_bits: u32,
        needed: u32,
    },
    #[error("cache `{name}`: parameter `{param}` = {value} is out of range")]
    ParameterOutOfRange {
        name: String,
        param: &'static str,
        value: u64,
    },
    #[error("configuration contains no caches")]
    NoCaches,
}

/// The validated shape of a tag store
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub capacity: u64,
    pub block_size: u64,
    pub associativity: u64,
    pub num_sets: u64,
    pub offset_bits: u32,
    pub index_bits: u32,
    pub address_bits: u32,
    pub hit_latency: u64,
}

impl Geometry {
    pub fn num_blocks(&self) -> u64 {
        self.num_sets * self.associativity
    }
}

impl TagStoreConfig {
    /// Validates the configuration, deriving the geometry of the store
    pub fn geometry(&self) -> Result<Geometry, ConfigError> {
        let name = || self.name.clone();
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity { name: name() });
        }
        if self.associativity == 0 {
            return Err(ConfigError::ZeroAssociativity { name: name() });
        }
        if !self.block_size.is_power_of_two() {
            return Err(ConfigError::BlockSizeNotPowerOfTwo {
                name: name(),
                block_size: self.block_size,
            });
        }
        let divisible = self
            .block_size
            .checked_mul(self.associativity)
            .map_or(false, |set_bytes| self.capacity % set_bytes == 0);
        if !divisible {
            return Err(ConfigError::CapacityNotDivisible {
                name: name(),
                capacity: self.capacity,
                block_size: self.block_size,
                associativity: self.associativity,
            });
        }
        let num_sets = self.capacity / (self.block_size * self.associativity);
        if !num_sets.is_power_of_two() {
            return Err(ConfigError::SetsNotPowerOfTwo { name: name(), num_sets });
        }
        if self.replacement_policy == PolicyKind::FullyAssociativeLru && num_sets != 1 {
            return Err(ConfigError::NotFullyAssociative {
                name: name(),
                associativity: self.associativity,
                expected: self.capacity / self.block_size,
            });
        }
        if self.address_bits == 0 || self.address_bits > u64::BITS {
            return Err(self.out_of_range("address_bits", self.address_bits as u64));
        }
        let offset_bits = self.block_size.trailing_zeros();
        let index_bits = num_sets.trailing_zeros();
        if offset_bits + index_bits > self.address_bits {
            return Err(ConfigError::AddressSpaceTooSmall {
                name: name(),
                address_bits: self.address_bits,
                needed: offset_bits + index_bits,
            });
        }
        self.validate_params()?;
        Ok(Geometry {
            capacity: self.capacity,
            block_size: self.block_size,
            associativity: self.associativity,
            num_sets,
            offset_bits,
            index_bits,
            address_bits: self.address_bits,
            hit_latency: self.hit_latency,
        })
    }

    fn validate_params(&self) -> Result<(), ConfigError> {
        let p = &self.policy_params;
        match self.replacement_policy {
            PolicyKind::Lfu if !(1..=64).contains(&p.lfu_counter_bits) => {
                Err(self.out_of_range("lfu_counter_bits", p.lfu_counter_bits as u64))
            }
            PolicyKind::StaticRrip | PolicyKind::DynamicRrip if !(1..=8).contains(&p.rrpv_bits) => {
                Err(self.out_of_range("rrpv_bits", p.rrpv_bits as u64))
            }
            PolicyKind::StaticRrip => match p.srrip_insertion {
                Some(rrpv) if rrpv > (1u64 << p.rrpv_bits) - 1 => {
                    Err(self.out_of_range("srrip_insertion", rrpv))
                }
                _ => Ok(()),
            },
            PolicyKind::DynamicRrip if !(1..=16).contains(&p.psel_bits) => {
                Err(self.out_of_range("psel_bits", p.psel_bits as u64))
            }
            PolicyKind::DynamicRrip if p.leader_set_stride < 2 => {
                Err(self.out_of_range("leader_set_stride", p.leader_set_stride))
            }
            PolicyKind::DynamicRrip | PolicyKind::Bimodal if p.bimodal_interval == 0 => {
                Err(self.out_of_range("bimodal_interval", p.bimodal_interval as u64))
            }
            PolicyKind::TypeAwareRrip if !(1..=8).contains(&p.trrip_rrpv_bits) => {
                Err(self.out_of_range("trrip_rrpv_bits", p.trrip_rrpv_bits as u64))
            }
            _ => Ok(()),
        }
    }

    fn out_of_range(&self, param: &'static str, value: u64) -> ConfigError {
        ConfigError::ParameterOutOfRange {
            name: self.name.clone(),
            param,
            value,
        }
    }
}
