//! Persistence
//!
//! A key-value capability holding opaque string blobs, and the two per-chain
//! stores built on top of it: the price cache and the LP registry. Both
//! stores merge read-modify-write so entries for unrelated tokens survive.

mod chain_store;
mod kv;

pub use chain_store::{ChainBlob, ChainBlobStore, LpRegistryStore, PriceCacheStore};
pub use kv::{FileKv, KvStore, MemoryKv};
