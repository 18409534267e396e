//! Storage backends and clocks.
//!
//! `in_memory` is always available. The RocksDB backend is compiled only with
//! the `storage-rocksdb` feature.

pub mod clock;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
