use crate::config::{PolicyKind, PolicyParams, TagStoreConfig};
use crate::tag_store::AccessKind;

/// A single store configuration with defaults for everything but the geometry and policy
pub fn store_config(
    policy: PolicyKind,
    capacity: u64,
    block_size: u64,
    associativity: u64,
) -> TagStoreConfig {
    TagStoreConfig {
        name: format!("{policy:?}"),
        capacity,
        block_size,
        associativity,
        hit_latency: 1,
        replacement_policy: policy,
        address_bits: 64,
        region_border: Some(1 << 30),
        policy_params: PolicyParams::default(),
    }
}

/// Block addresses that all map to one set: `count` distinct lines `set_stride` bytes apart
///
/// `set_stride` should be `num_sets * block_size` for the store under test
pub fn same_set_lines(base: u64, count: u64, set_stride: u64) -> Vec<u64> {
    (0..count).map(|i| base + i * set_stride).collect()
}

/// A cyclic scan over `lines` consecutive blocks, repeated `repeats` times
///
/// With more lines than the store holds this is the classic thrashing pattern for LRU
pub fn cyclic_scan(base: u64, lines: u64, block_size: u64, repeats: usize) -> Vec<u64> {
    let pass: Vec<u64> = (0..lines).map(|i| base + i * block_size).collect();
    pass.iter().copied().cycle().take(pass.len() * repeats).collect()
}

/// A small hot working set interleaved with a scan that never repeats
///
/// Every `hot_every`-th access goes to one of the `hot_lines` lines, the rest stream through fresh
/// lines starting at `scan_base`
pub fn hot_set_with_scan(
    hot_lines: u64,
    scan_base: u64,
    block_size: u64,
    hot_every: u64,
    total: u64,
) -> Vec<u64> {
    let mut scanned = 0;
    (0..total)
        .map(|i| {
            if i % hot_every == 0 {
                ((i / hot_every) % hot_lines) * block_size
            } else {
                scanned += 1;
                scan_base + scanned * block_size
            }
        })
        .collect()
}

/// Formats one record of the fixed-width trace format
pub fn fixed_record(program_counter: u64, address: u64, kind: AccessKind, size: u16) -> String {
    let mode = if kind.is_write() { 'W' } else { 'R' };
    format!("{program_counter:016X} {address:016X} {mode} {size:03}\n")
}
