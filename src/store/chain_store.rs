//! Per-chain blob stores
//!
//! One blob per chain id. `merge` reads the current blob, upserts the
//! incoming entries and writes the result back. The read-modify-write is not
//! atomic across concurrent requests; the later write wins per key.

use eyre::Result;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use super::kv::KvStore;
use crate::chains::ChainId;
use crate::types::{ChainTokenPrices, LpTokenRegistry};

/// A mapping persisted as one JSON blob per chain
pub trait ChainBlob: Default + Send + Sync + Sized {
    /// Label used in log lines
    const NAME: &'static str;

    fn key(chain: ChainId) -> String;
    fn from_blob(blob: &str) -> Result<Self>;
    fn to_blob(&self) -> Result<String>;
    fn merge_from(&mut self, other: Self);
    fn entry_count(&self) -> usize;
}

impl ChainBlob for ChainTokenPrices {
    const NAME: &'static str = "price cache";

    fn key(chain: ChainId) -> String {
        chain.price_cache_key()
    }

    fn from_blob(blob: &str) -> Result<Self> {
        ChainTokenPrices::from_blob(blob)
    }

    fn to_blob(&self) -> Result<String> {
        ChainTokenPrices::to_blob(self)
    }

    fn merge_from(&mut self, other: Self) {
        self.merge(other);
    }

    fn entry_count(&self) -> usize {
        self.len()
    }
}

impl ChainBlob for LpTokenRegistry {
    const NAME: &'static str = "LP registry";

    fn key(chain: ChainId) -> String {
        chain.lp_registry_key()
    }

    fn from_blob(blob: &str) -> Result<Self> {
        LpTokenRegistry::from_blob(blob)
    }

    fn to_blob(&self) -> Result<String> {
        LpTokenRegistry::to_blob(self)
    }

    fn merge_from(&mut self, other: Self) {
        self.merge(other);
    }

    fn entry_count(&self) -> usize {
        self.len()
    }
}

/// Store for one kind of per-chain blob on top of a `KvStore`
pub struct ChainBlobStore<T: ChainBlob> {
    kv: Arc<dyn KvStore>,
    _blob: PhantomData<fn() -> T>,
}

pub type PriceCacheStore = ChainBlobStore<ChainTokenPrices>;
pub type LpRegistryStore = ChainBlobStore<LpTokenRegistry>;

impl<T: ChainBlob> Clone for ChainBlobStore<T> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            _blob: PhantomData,
        }
    }
}

impl<T: ChainBlob> ChainBlobStore<T> {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            _blob: PhantomData,
        }
    }

    /// Stored mapping for `chain`. A missing or unparsable blob is `None`.
    pub async fn get(&self, chain: ChainId) -> Result<Option<T>> {
        let key = T::key(chain);
        let Some(blob) = self.kv.get(&key).await? else {
            return Ok(None);
        };

        match T::from_blob(&blob) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(
                    "Corrupted {} for chain {} (key {}), treating as empty: {}",
                    T::NAME,
                    chain,
                    key,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Upsert `partial` into the stored mapping for `chain`
    pub async fn merge(&self, chain: ChainId, partial: T) -> Result<()> {
        if partial.entry_count() == 0 {
            return Ok(());
        }

        let incoming = partial.entry_count();
        let mut current = self.get(chain).await?.unwrap_or_default();
        current.merge_from(partial);

        self.kv.put(&T::key(chain), current.to_blob()?).await?;

        debug!(
            "Merged {} entries into {} for chain {} ({} total)",
            incoming,
            T::NAME,
            chain,
            current.entry_count()
        );
        Ok(())
    }
}
