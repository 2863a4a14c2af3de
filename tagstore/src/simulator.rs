use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::config::{ConfigError, LayeredCacheConfig};
use crate::tag_store::{AccessKind, GenericTagStore, TagStoreError, TagStoreTrait};
use crate::trace::{parse_fixed_record, parse_text_line, TraceError, TraceRecord, RECORD_SIZE};

/// The simulator drives a hierarchy of tag stores with a trace, splitting accesses into lines and
/// collecting results.
///
/// Levels are probed in order until one hits. Every level that misses installs the line, and a
/// dirty line evicted from one level is written back into the next, after the demand line has
/// been looked up there, or to main memory from the last. It supports calling simulate multiple
/// times, results and the time taken accumulate
pub struct Simulator {
    caches: Vec<GenericTagStore>,
    memory_latency: u64,
    result: LayeredCacheResult,
    simulation_time: Duration,
}

/// The result of a simulation. Can be serialised to the output format
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct LayeredCacheResult {
    pub main_memory_accesses: u64,
    pub main_memory_writebacks: u64,
    /// Hit latency of every level probed, plus the memory latency of every line served by memory
    pub cycles: u64,
    pub caches: Vec<CacheResult>,
}

/// The result for an individual cache. Hits and misses count trace accesses only, writebacks
/// received from the level above are not included
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct CacheResult {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Dirty evictions written back to the next level
    pub writebacks: u64,
}

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error(transparent)]
    TagStore(#[from] TagStoreError),
    #[error(transparent)]
    Trace(#[from] TraceError),
}

impl Simulator {
    /// Creates a new simulator for a given configuration, usually resulting from parsing JSON
    pub fn new(config: &LayeredCacheConfig) -> Result<Self, ConfigError> {
        if config.caches.is_empty() {
            return Err(ConfigError::NoCaches);
        }
        let caches = config
            .caches
            .iter()
            .map(GenericTagStore::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        let result = LayeredCacheResult {
            main_memory_accesses: 0,
            main_memory_writebacks: 0,
            cycles: 0,
            caches: config
                .caches
                .iter()
                .map(|cache| CacheResult {
                    name: cache.name.clone(),
                    hits: 0,
                    misses: 0,
                    evictions: 0,
                    writebacks: 0,
                })
                .collect(),
        };
        Ok(Self {
            caches,
            memory_latency: config.memory_latency,
            result,
            simulation_time: Duration::new(0, 0),
        })
    }

    /// Simulates a trace in the fixed-width format
    ///
    /// The records aren't validated beyond their length. Reads from the slice are sequential, so
    /// a memory map advised for sequential access suits it well
    pub fn simulate(&mut self, bytes: &[u8]) -> Result<&LayeredCacheResult, SimulatorError> {
        if bytes.len() % RECORD_SIZE != 0 {
            return Err(TraceError::PartialRecord(bytes.len()).into());
        }
        let start = Instant::now();
        for chunk in bytes.chunks_exact(RECORD_SIZE) {
            let record: &[u8; RECORD_SIZE] =
                chunk.try_into().expect("chunks_exact yields full records");
            self.read(parse_fixed_record(record))?;
        }
        self.simulation_time += start.elapsed();
        Ok(&self.result)
    }

    /// Simulates a trace in the text format
    pub fn simulate_text(&mut self, text: &str) -> Result<&LayeredCacheResult, SimulatorError> {
        let start = Instant::now();
        for (index, line) in text.lines().enumerate() {
            if let Some(record) = parse_text_line(index + 1, line)? {
                self.read(record)?;
            }
        }
        self.simulation_time += start.elapsed();
        Ok(&self.result)
    }

    pub fn result(&self) -> &LayeredCacheResult {
        &self.result
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    pub fn caches(&self) -> &[GenericTagStore] {
        &self.caches
    }

    /// Gets the number of valid lines in each cache
    pub fn get_occupancies(&self) -> Vec<u64> {
        self.caches.iter().map(|c| c.occupancy()).collect()
    }

    /// Splits an access into the lines of the first level and runs each through the hierarchy
    ///
    /// Line sizes are assumed not to shrink further from the processor
    fn read(&mut self, record: TraceRecord) -> Result<(), TagStoreError> {
        let line_size = self.caches[0].geometry().block_size;
        let end = record.address.saturating_add(record.size.max(1) as u64);
        let mut line = record.address & !(line_size - 1);
        while line < end {
            self.access_line(line, record.kind)?;
            match line.checked_add(line_size) {
                Some(next) => line = next,
                None => break,
            }
        }
        Ok(())
    }

    fn access_line(&mut self, address: u64, kind: AccessKind) -> Result<(), TagStoreError> {
        // Only the first level sees the write, lower levels are filled by reads
        let mut access = kind;
        // Dirty victims are written back once the demand line has been looked up below them
        let mut pending = Vec::new();
        let mut served = false;
        for level in 0..self.caches.len() {
            let cache = &mut self.caches[level];
            let outcome = cache.access(address, access)?;
            self.result.cycles += cache.hit_latency();
            let res = &mut self.result.caches[level];
            if outcome.hit() {
                res.hits += 1;
                served = true;
                break;
            }
            res.misses += 1;
            if let Some(evicted) = outcome.eviction() {
                res.evictions += 1;
                if evicted.was_dirty {
                    res.writebacks += 1;
                    pending.push((level + 1, evicted.address));
                }
            }
            access = AccessKind::Read;
        }
        if !served {
            self.result.main_memory_accesses += 1;
            self.result.cycles += self.memory_latency;
        }
        for (level, evicted) in pending {
            self.write_back(level, evicted)?;
        }
        Ok(())
    }

    /// Writes a dirty line back into a level, cascading any dirty line that displaces
    fn write_back(&mut self, mut level: usize, mut address: u64) -> Result<(), TagStoreError> {
        while let Some(cache) = self.caches.get_mut(level) {
            if cache.probe(address, AccessKind::Writeback)?.hit {
                return Ok(());
            }
            let install = cache.install_writeback(address)?;
            let res = &mut self.result.caches[level];
            match install.eviction {
                Some(evicted) => {
                    res.evictions += 1;
                    if !evicted.was_dirty {
                        return Ok(());
                    }
                    res.writebacks += 1;
                    log::debug!(
                        "writeback of {address:#x} displaced dirty {:#x} from level {level}",
                        evicted.address
                    );
                    level += 1;
                    address = evicted.address;
                }
                None => return Ok(()),
            }
        }
        self.result.main_memory_writebacks += 1;
        Ok(())
    }
}
