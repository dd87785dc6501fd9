//! In-crate fakes for the injected collaborators

use async_trait::async_trait;
use eyre::{eyre, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::chains::ChainId;
use crate::lp::{LpIntrospector, LpPoolState, PoolReserve};
use crate::price_source::PriceSource;
use crate::resolver::Resolver;
use crate::store::{KvStore, MemoryKv};
use crate::types::{ChainTokenPrices, LpTokenInfo, LpTokenRegistry, PricePoint, TokenAddress, TokenPriceHistory};

pub fn addr(n: u8) -> TokenAddress {
    TokenAddress::parse(&format!("0x{}", hex::encode([n; 20]))).unwrap()
}

pub fn history(points: &[(f64, u64)]) -> TokenPriceHistory {
    TokenPriceHistory::new(points.iter().map(|&(p, t)| PricePoint::new(p, t)).collect()).unwrap()
}

// ============================================
// PRICE SOURCE
// ============================================

#[derive(Default)]
pub struct FakePriceSource {
    pub known: ChainTokenPrices,
    pub fail: bool,
    pub calls: AtomicUsize,
    pub requested: Mutex<Vec<Vec<TokenAddress>>>,
}

impl FakePriceSource {
    pub fn with_prices(known: ChainTokenPrices) -> Self {
        Self {
            known,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for FakePriceSource {
    async fn fetch(&self, _chain: ChainId, addresses: &[TokenAddress]) -> Result<ChainTokenPrices> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(addresses.to_vec());
        if self.fail {
            return Err(eyre!("upstream unavailable"));
        }
        Ok(addresses
            .iter()
            .filter_map(|a| self.known.get(a).map(|h| (a.clone(), h.clone())))
            .collect())
    }
}

// ============================================
// LP INTROSPECTOR
// ============================================

#[derive(Default)]
pub struct FakeIntrospector {
    pub lps: HashMap<TokenAddress, LpPoolState>,
    pub classify_calls: AtomicUsize,
    pub composition_calls: AtomicUsize,
}

impl FakeIntrospector {
    /// LP over `underlying` with the given scaled reserves and supply
    pub fn with_pool(mut self, lp: TokenAddress, reserves: &[(TokenAddress, f64)], total_supply: f64) -> Self {
        self.lps.insert(
            lp,
            LpPoolState {
                reserves: reserves
                    .iter()
                    .map(|(token, amount)| PoolReserve {
                        token: token.clone(),
                        amount: *amount,
                    })
                    .collect(),
                total_supply,
            },
        );
        self
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn composition_calls(&self) -> usize {
        self.composition_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LpIntrospector for FakeIntrospector {
    async fn classify(&self, _chain: ChainId, addresses: &[TokenAddress]) -> LpTokenRegistry {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        let mut registry = LpTokenRegistry::new();
        for address in addresses {
            if let Some(pool) = self.lps.get(address) {
                registry.insert(address.clone(), LpTokenInfo::lp(pool.underlying().cloned().collect()));
            }
        }
        registry
    }

    async fn composition(&self, _chain: ChainId, lp_tokens: &LpTokenRegistry) -> HashMap<TokenAddress, LpPoolState> {
        self.composition_calls.fetch_add(1, Ordering::SeqCst);
        lp_tokens
            .iter()
            .filter_map(|(address, _)| self.lps.get(address).map(|p| (address.clone(), p.clone())))
            .collect()
    }
}

// ============================================
// KV
// ============================================

/// Memory KV that counts puts per key and can fail for keys containing a marker
#[derive(Default)]
pub struct RecordingKv {
    inner: MemoryKv,
    pub puts: Mutex<HashMap<String, usize>>,
    pub fail_marker: Option<String>,
}

impl RecordingKv {
    pub fn failing_for(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Default::default()
        }
    }

    pub fn puts_for(&self, key: &str) -> usize {
        self.puts.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    fn check(&self, key: &str) -> Result<()> {
        match &self.fail_marker {
            Some(marker) if key.contains(marker.as_str()) => Err(eyre!("kv unavailable for {}", key)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KvStore for RecordingKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.check(key)?;
        *self.puts.lock().unwrap().entry(key.to_string()).or_default() += 1;
        self.inner.put(key, value).await
    }
}

// ============================================
// HARNESS
// ============================================

pub struct Harness {
    pub kv: Arc<RecordingKv>,
    pub source: Arc<FakePriceSource>,
    pub introspector: Arc<FakeIntrospector>,
    pub resolver: Resolver,
}

impl Harness {
    pub fn new(source: FakePriceSource, introspector: FakeIntrospector) -> Self {
        Self::with_kv(RecordingKv::default(), source, introspector, 4)
    }

    pub fn with_kv(kv: RecordingKv, source: FakePriceSource, introspector: FakeIntrospector, max_depth: usize) -> Self {
        let kv = Arc::new(kv);
        let source = Arc::new(source);
        let introspector = Arc::new(introspector);
        let resolver = Resolver::new(kv.clone(), source.clone(), introspector.clone(), max_depth);
        Self {
            kv,
            source,
            introspector,
            resolver,
        }
    }

    /// Seed the price cache for `chain` directly
    pub async fn seed(&self, chain: ChainId, prices: ChainTokenPrices) {
        self.kv
            .inner
            .put(&chain.price_cache_key(), prices.to_blob().unwrap())
            .await
            .unwrap();
    }

    pub async fn cached(&self, chain: ChainId) -> ChainTokenPrices {
        self.resolver
            .price_cache()
            .get(chain)
            .await
            .unwrap()
            .unwrap_or_default()
    }
}
