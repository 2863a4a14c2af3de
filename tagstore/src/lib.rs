//! # TagStore
//!
//! Tagstore models the tag array of a cache: which memory blocks occupy which frames, and which
//! resident block to evict on a capacity miss.
//!
//! It provides a set-associative tag store parameterised by a replacement policy, a family of
//! policies (recency, frequency, random, the RRIP variants, thrash resistant and write-back aware
//! stack policies, and a fully associative LRU), and a simulator which drives a hierarchy of stores
//! with a memory trace
//!
//! The tag store is a pure state machine. Every operation runs synchronously to completion, and
//! latencies are reported to the caller rather than modelled

/// Contains the tag-store line
pub mod block;

/// Contains the JSON configuration format, and its validation
pub mod config;

/// Contains the provided replacement policies, with a trait for implementing custom replacement
/// policies
pub mod replacement_policies;

/// Contains the associative set
pub mod set;

/// Contains the tag store, and a utility enum for the provided policies
pub mod tag_store;

/// Contains the simulator used to drive a hierarchy of tag stores with a trace
pub mod simulator;

/// Contains the trace formats understood by the simulator
pub mod trace;

/// Contains trace file input
pub mod io;

// Generated from the build.rs, private
mod hex {
    include!(concat!(env!("OUT_DIR"), "/hex.rs"));
}
#[cfg(test)]
mod test;

/// Contains utilities for running tests and benchmarks.
pub mod util;
