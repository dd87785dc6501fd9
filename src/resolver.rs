//! Resolver - recursive price resolution
//!
//! RESOLUTION (per level):
//! 1. Cache hits go straight into the result
//! 2. Misses not known to be LP tokens go to the price source
//! 3. Still-unpriced misses are classified; confirmed LPs are persisted to
//!    the registry immediately
//! 4. Underlying tokens of every LP at this level are resolved one level down
//! 5. LP prices are derived from the underlying prices
//!
//! Every level works with full histories; truncation only happens on the
//! way out. All new price entries of a request are persisted with a single
//! merge at the end.

use eyre::Result;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::chains::ChainId;
use crate::lp::{calculate_lp_prices, LpIntrospector};
use crate::price_source::PriceSource;
use crate::store::{KvStore, LpRegistryStore, PriceCacheStore};
use crate::types::{ChainTokenPrices, LpTokenRegistry, TokenAddress};

/// Mutable state threaded through one request's recursion
#[derive(Debug, Default)]
struct Resolution {
    /// Everything resolved so far, full histories
    result: ChainTokenPrices,
    /// Entries not yet persisted to the price cache
    pending: ChainTokenPrices,
    /// Addresses some level already handled
    attempted: HashSet<TokenAddress>,
    /// Persisted registry plus classifications made during this request
    registry: LpTokenRegistry,
}

/// One chain's part of a batched request. `addresses: None` is a refresh.
#[derive(Debug, Clone)]
pub struct ChainRequest {
    pub chain: ChainId,
    pub addresses: Option<Vec<String>>,
}

pub struct Resolver {
    prices: PriceCacheStore,
    lp_registry: LpRegistryStore,
    price_source: Arc<dyn PriceSource>,
    introspector: Arc<dyn LpIntrospector>,
    max_depth: usize,
}

impl Resolver {
    pub fn new(
        kv: Arc<dyn KvStore>,
        price_source: Arc<dyn PriceSource>,
        introspector: Arc<dyn LpIntrospector>,
        max_depth: usize,
    ) -> Self {
        Self {
            prices: PriceCacheStore::new(Arc::clone(&kv)),
            lp_registry: LpRegistryStore::new(kv),
            price_source,
            introspector,
            max_depth: max_depth.max(1),
        }
    }

    pub fn price_cache(&self) -> &PriceCacheStore {
        &self.prices
    }

    pub fn lp_registry(&self) -> &LpRegistryStore {
        &self.lp_registry
    }

    /// Resolve `addresses`, or return the refresh snapshot when `None`
    pub async fn resolve(
        &self,
        chain: ChainId,
        addresses: Option<&[String]>,
        include_history: bool,
    ) -> Result<ChainTokenPrices> {
        match addresses {
            Some(addresses) => self.resolve_addresses(chain, addresses, include_history).await,
            None => self.refresh(chain).await,
        }
    }

    /// Current point of every token already cached for `chain`. Never fetches
    /// and never writes.
    pub async fn refresh(&self, chain: ChainId) -> Result<ChainTokenPrices> {
        let snapshot = self
            .prices
            .get(chain)
            .await?
            .map(|cached| cached.truncated())
            .unwrap_or_default();

        debug!("Refresh snapshot for chain {}: {} tokens", chain, snapshot.len());
        Ok(snapshot)
    }

    pub async fn resolve_addresses<S: AsRef<str>>(
        &self,
        chain: ChainId,
        addresses: &[S],
        include_history: bool,
    ) -> Result<ChainTokenPrices> {
        let requested: BTreeSet<TokenAddress> = addresses
            .iter()
            .filter_map(|raw| match TokenAddress::parse(raw.as_ref()) {
                Ok(address) => Some(address),
                Err(e) => {
                    debug!("Skipping unparsable address: {}", e);
                    None
                }
            })
            .collect();

        if requested.is_empty() {
            return Ok(ChainTokenPrices::new());
        }

        let cache = self.prices.get(chain).await?.unwrap_or_default();
        let mut resolution = Resolution {
            registry: self.lp_registry.get(chain).await?.unwrap_or_default(),
            ..Default::default()
        };

        self.resolve_level(chain, requested.into_iter().collect(), &cache, &mut resolution, 0)
            .await?;

        if !resolution.pending.is_empty() {
            self.prices.merge(chain, resolution.pending).await?;
        }

        info!(
            "Resolved {}/{} tokens on chain {}",
            resolution.result.len(),
            resolution.attempted.len(),
            chain
        );

        Ok(if include_history {
            resolution.result
        } else {
            resolution.result.truncated()
        })
    }

    fn resolve_level<'a>(
        &'a self,
        chain: ChainId,
        addresses: Vec<TokenAddress>,
        cache: &'a ChainTokenPrices,
        acc: &'a mut Resolution,
        depth: usize,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            acc.attempted.extend(addresses.iter().cloned());

            // Cache hits
            let mut misses = Vec::new();
            for address in addresses {
                match cache.get(&address) {
                    Some(history) => acc.result.insert(address, history.clone()),
                    None => misses.push(address),
                }
            }
            if misses.is_empty() {
                return Ok(());
            }

            // Known LP tokens are never directly quoted
            let (known_lp, unknown): (Vec<_>, Vec<_>) =
                misses.into_iter().partition(|a| acc.registry.is_known_lp(a));

            // Plain price source
            let mut unpriced = unknown;
            if !unpriced.is_empty() {
                match self.price_source.fetch(chain, &unpriced).await {
                    Ok(fetched) => {
                        for (address, history) in fetched {
                            if unpriced.contains(&address) {
                                acc.result.insert(address.clone(), history.clone());
                                acc.pending.insert(address, history);
                            }
                        }
                        unpriced.retain(|a| !acc.result.contains(a));
                    }
                    Err(e) => warn!(
                        "Price source failed for {} tokens on chain {}: {}",
                        unpriced.len(),
                        chain,
                        e
                    ),
                }
            }

            // LP classification of whatever the price source could not price
            let mut level_lps = LpTokenRegistry::new();
            if !unpriced.is_empty() {
                let classified = self.introspector.classify(chain, &unpriced).await;
                for address in unpriced.iter().filter(|a| classified.get(a).is_none()) {
                    debug!("No price for {} on chain {}, dropping", address, chain);
                }
                if !classified.is_empty() {
                    self.lp_registry.merge(chain, classified.clone()).await?;
                    acc.registry.merge(classified.clone());
                    level_lps.merge(classified);
                }
            }
            for address in known_lp {
                if let Some(info) = acc.registry.get(&address) {
                    level_lps.insert(address.clone(), info.clone());
                }
            }
            if level_lps.is_empty() {
                return Ok(());
            }

            if depth >= self.max_depth {
                error!(
                    "LP nesting deeper than {} on chain {}, leaving {} LP tokens unpriced",
                    self.max_depth,
                    chain,
                    level_lps.len()
                );
                return Ok(());
            }

            // Underlying tokens, one level down
            let underlying: Vec<TokenAddress> = level_lps
                .underlying_addresses()
                .into_iter()
                .filter(|a| !acc.attempted.contains(a))
                .collect();
            if !underlying.is_empty() {
                debug!(
                    "Resolving {} underlying tokens for {} LPs at depth {}",
                    underlying.len(),
                    level_lps.len(),
                    depth + 1
                );
                self.resolve_level(chain, underlying, cache, &mut *acc, depth + 1)
                    .await?;
            }

            // Derived LP prices
            let mut pools = self.introspector.composition(chain, &level_lps).await;
            // LPs of the same level may be built on each other, so price in rounds
            // until a round adds nothing
            loop {
                let lp_prices = calculate_lp_prices(&pools, &acc.result);
                if lp_prices.is_empty() {
                    break;
                }
                for (address, history) in lp_prices {
                    pools.remove(&address);
                    acc.result.insert(address.clone(), history.clone());
                    acc.pending.insert(address, history);
                }
            }

            Ok(())
        }
        .boxed()
    }

    /// One independent pipeline per chain. A failing chain maps to `None`
    /// without affecting the others.
    pub async fn resolve_many(
        &self,
        requests: Vec<ChainRequest>,
        include_history: bool,
    ) -> BTreeMap<ChainId, Option<ChainTokenPrices>> {
        let pipelines = requests.into_iter().map(|request| async move {
            let outcome = self
                .resolve(request.chain, request.addresses.as_deref(), include_history)
                .await;
            let prices = match outcome {
                Ok(prices) => Some(prices),
                Err(e) => {
                    error!("Price resolution failed for chain {}: {:#}", request.chain, e);
                    None
                }
            };
            (request.chain, prices)
        });

        join_all(pipelines).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::types::TokenPriceHistory;

    const CHAIN: ChainId = ChainId::Mainnet;

    fn strs(addresses: &[TokenAddress]) -> Vec<String> {
        addresses.iter().map(|a| a.to_string()).collect()
    }

    fn prices(entries: &[(TokenAddress, TokenPriceHistory)]) -> ChainTokenPrices {
        entries.iter().cloned().collect()
    }

    #[tokio::test]
    async fn test_cached_union_needs_no_fetch() {
        let h = Harness::new(FakePriceSource::default(), FakeIntrospector::default());
        h.seed(
            CHAIN,
            prices(&[
                (addr(1), history(&[(1.0, 10)])),
                (addr(2), history(&[(2.0, 10)])),
                (addr(3), history(&[(3.0, 10)])),
            ]),
        )
        .await;

        let result = h
            .resolver
            .resolve_addresses(CHAIN, &strs(&[addr(1), addr(2)]), false)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.contains(&addr(1)) && result.contains(&addr(2)));
        assert_eq!(h.source.calls(), 0);
        assert_eq!(h.introspector.classify_calls(), 0);
        assert_eq!(h.kv.puts_for(&CHAIN.price_cache_key()), 0);
    }

    #[tokio::test]
    async fn test_history_flag_controls_output_length() {
        let h = Harness::new(FakePriceSource::default(), FakeIntrospector::default());
        h.seed(CHAIN, prices(&[(addr(1), history(&[(1.2, 30), (1.1, 20), (1.0, 10)]))]))
            .await;
        let request = strs(&[addr(1)]);

        let short = h.resolver.resolve_addresses(CHAIN, &request, false).await.unwrap();
        assert_eq!(short.get(&addr(1)).unwrap().len(), 1);
        assert_eq!(short.get(&addr(1)).unwrap().current().price, 1.2);

        let full = h.resolver.resolve_addresses(CHAIN, &request, true).await.unwrap();
        assert_eq!(full.get(&addr(1)).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_address_case_insensitive() {
        let h = Harness::new(FakePriceSource::default(), FakeIntrospector::default());
        let mixed = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";
        let lower = TokenAddress::parse(mixed).unwrap();
        h.seed(CHAIN, prices(&[(lower.clone(), history(&[(5.0, 10)]))])).await;

        let a = h.resolver.resolve_addresses(CHAIN, &[mixed], false).await.unwrap();
        let b = h
            .resolver
            .resolve_addresses(CHAIN, &[mixed.to_lowercase()], false)
            .await
            .unwrap();
        let c = h
            .resolver
            .resolve_addresses(CHAIN, &[mixed.to_uppercase().replacen("0X", "0x", 1)], false)
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.get(&lower).unwrap().current().price, 5.0);
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_lp_resolution_end_to_end() {
        let (lp, a, b) = (addr(0xaa), addr(0x0a), addr(0x0b));
        let source = FakePriceSource::with_prices(prices(&[
            (a.clone(), history(&[(2.00, 100)])),
            (b.clone(), history(&[(0.50, 100)])),
        ]));
        let introspector =
            FakeIntrospector::default().with_pool(lp.clone(), &[(a.clone(), 1000.0), (b.clone(), 4000.0)], 2000.0);
        let h = Harness::new(source, introspector);

        let result = h.resolver.resolve_addresses(CHAIN, &strs(&[lp.clone()]), false).await.unwrap();

        assert_eq!(result.len(), 3);
        assert!((result.get(&lp).unwrap().current().price - 2.0).abs() < 1e-12);
        assert_eq!(result.get(&a).unwrap().current().price, 2.0);
        assert_eq!(result.get(&b).unwrap().current().price, 0.5);

        let cached = h.cached(CHAIN).await;
        assert!(cached.contains(&lp) && cached.contains(&a) && cached.contains(&b));

        let registry = h.resolver.lp_registry().get(CHAIN).await.unwrap().unwrap();
        assert_eq!(registry.get(&lp).unwrap().underlying(), &[a, b]);

        // One price-cache write for the whole request
        assert_eq!(h.kv.puts_for(&CHAIN.price_cache_key()), 1);
    }

    #[tokio::test]
    async fn test_lp_resolution_idempotent() {
        let (lp, a, b) = (addr(0xaa), addr(0x0a), addr(0x0b));
        let source = FakePriceSource::with_prices(prices(&[
            (a.clone(), history(&[(2.00, 100)])),
            (b.clone(), history(&[(0.50, 100)])),
        ]));
        let introspector =
            FakeIntrospector::default().with_pool(lp.clone(), &[(a.clone(), 1000.0), (b.clone(), 4000.0)], 2000.0);
        let h = Harness::new(source, introspector);
        let request = strs(&[lp.clone()]);

        let first = h.resolver.resolve_addresses(CHAIN, &request, false).await.unwrap();
        let source_calls = h.source.calls();
        let classify_calls = h.introspector.classify_calls();

        let second = h.resolver.resolve_addresses(CHAIN, &request, false).await.unwrap();

        assert_eq!(first.get(&lp), second.get(&lp));
        assert_eq!(h.source.calls(), source_calls);
        assert_eq!(h.introspector.classify_calls(), classify_calls);
        assert_eq!(h.kv.puts_for(&CHAIN.price_cache_key()), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_address_is_omitted() {
        let h = Harness::new(FakePriceSource::default(), FakeIntrospector::default());

        let result = h
            .resolver
            .resolve_addresses(CHAIN, &strs(&[addr(0xee)]), false)
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(h.source.calls(), 1);
        assert_eq!(h.introspector.classify_calls(), 1);
        assert!(h.resolver.lp_registry().get(CHAIN).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_input_is_skipped_without_calls() {
        let h = Harness::new(FakePriceSource::default(), FakeIntrospector::default());
        let result = h
            .resolver
            .resolve_addresses(CHAIN, &["not-an-address", "0x12"], true)
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_truncates_and_leaves_cache_untouched() {
        let h = Harness::new(FakePriceSource::default(), FakeIntrospector::default());
        let z = addr(0x2f);
        h.seed(CHAIN, prices(&[(z.clone(), history(&[(1.10, 2), (1.05, 1)]))])).await;

        let snapshot = h.resolver.resolve(CHAIN, None, true).await.unwrap();

        assert_eq!(snapshot.get(&z).unwrap().points(), history(&[(1.10, 2)]).points());
        assert_eq!(h.cached(CHAIN).await.get(&z).unwrap().len(), 2);
        assert_eq!(h.kv.puts_for(&CHAIN.price_cache_key()), 0);
        assert_eq!(h.source.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_of_empty_chain() {
        let h = Harness::new(FakePriceSource::default(), FakeIntrospector::default());
        assert!(h.resolver.refresh(ChainId::Scroll).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_source_failure_is_recovered() {
        let (lp, a, b) = (addr(0xaa), addr(0x0a), addr(0x0b));
        let introspector =
            FakeIntrospector::default().with_pool(lp.clone(), &[(a.clone(), 1.0), (b.clone(), 1.0)], 1.0);
        let h = Harness::new(FakePriceSource::failing(), introspector);
        h.seed(CHAIN, prices(&[(addr(1), history(&[(1.0, 10)]))])).await;

        let result = h
            .resolver
            .resolve_addresses(CHAIN, &strs(&[addr(1), lp.clone()]), false)
            .await
            .unwrap();

        // Cached entry still served, LP classified but unpriceable
        assert_eq!(result.len(), 1);
        assert!(result.contains(&addr(1)));
        assert!(h.resolver.lp_registry().get(CHAIN).await.unwrap().unwrap().is_known_lp(&lp));
    }

    #[tokio::test]
    async fn test_lp_pricing_uses_full_underlying_history() {
        let (lp, a, b) = (addr(0xaa), addr(0x0a), addr(0x0b));
        let introspector =
            FakeIntrospector::default().with_pool(lp.clone(), &[(a.clone(), 1.0), (b.clone(), 1.0)], 1.0);
        let h = Harness::new(FakePriceSource::default(), introspector);
        h.seed(
            CHAIN,
            prices(&[
                (a.clone(), history(&[(3.0, 300), (2.0, 200), (1.0, 100)])),
                (b.clone(), history(&[(1.0, 300), (1.0, 200), (1.0, 100)])),
            ]),
        )
        .await;

        let result = h.resolver.resolve_addresses(CHAIN, &strs(&[lp.clone()]), false).await.unwrap();
        assert_eq!(result.get(&lp).unwrap().len(), 1);
        assert_eq!(result.get(&lp).unwrap().current().price, 4.0);

        // The persisted LP series is aligned with the full underlying series
        let cached = h.cached(CHAIN).await;
        let series: Vec<f64> = cached.get(&lp).unwrap().points().iter().map(|p| p.price).collect();
        assert_eq!(series, vec![4.0, 3.0, 2.0]);
    }

    #[tokio::test]
    async fn test_known_lp_skips_price_source_and_classification() {
        let (lp, a, b) = (addr(0xaa), addr(0x0a), addr(0x0b));
        let introspector =
            FakeIntrospector::default().with_pool(lp.clone(), &[(a.clone(), 1.0), (b.clone(), 1.0)], 2.0);
        let h = Harness::new(FakePriceSource::default(), introspector);
        h.seed(
            CHAIN,
            prices(&[(a.clone(), history(&[(1.0, 10)])), (b.clone(), history(&[(1.0, 10)]))]),
        )
        .await;

        let mut registry = LpTokenRegistry::new();
        registry.insert(lp.clone(), crate::types::LpTokenInfo::lp(vec![a, b]));
        h.resolver.lp_registry().merge(CHAIN, registry).await.unwrap();

        let result = h.resolver.resolve_addresses(CHAIN, &strs(&[lp.clone()]), false).await.unwrap();

        assert_eq!(result.get(&lp).unwrap().current().price, 1.0);
        assert_eq!(h.source.calls(), 0);
        assert_eq!(h.introspector.classify_calls(), 0);
        assert_eq!(h.introspector.composition_calls(), 1);
    }

    #[tokio::test]
    async fn test_nested_lp_resolves_recursively() {
        let (outer, inner, a, b, c) = (addr(0xa1), addr(0xa2), addr(1), addr(2), addr(3));
        let source = FakePriceSource::with_prices(prices(&[
            (a.clone(), history(&[(1.0, 10)])),
            (b.clone(), history(&[(3.0, 10)])),
            (c.clone(), history(&[(10.0, 10)])),
        ]));
        let introspector = FakeIntrospector::default()
            .with_pool(inner.clone(), &[(a.clone(), 1.0), (b.clone(), 1.0)], 1.0)
            .with_pool(outer.clone(), &[(inner.clone(), 1.0), (c.clone(), 1.0)], 2.0);
        let h = Harness::new(source, introspector);

        let result = h.resolver.resolve_addresses(CHAIN, &strs(&[outer.clone()]), false).await.unwrap();

        // inner = 1 + 3 = 4, outer = (4 + 10) / 2 = 7
        assert_eq!(result.get(&inner).unwrap().current().price, 4.0);
        assert_eq!(result.get(&outer).unwrap().current().price, 7.0);
        assert_eq!(result.len(), 5);
        assert_eq!(h.kv.puts_for(&CHAIN.price_cache_key()), 1);
    }

    #[tokio::test]
    async fn test_lp_requested_with_its_lp_underlying() {
        let (outer, inner, a, b, c) = (addr(0xa1), addr(0xa2), addr(1), addr(2), addr(3));
        let source = FakePriceSource::with_prices(prices(&[
            (a.clone(), history(&[(1.0, 10)])),
            (b.clone(), history(&[(3.0, 10)])),
            (c.clone(), history(&[(10.0, 10)])),
        ]));
        let introspector = FakeIntrospector::default()
            .with_pool(inner.clone(), &[(a.clone(), 1.0), (b.clone(), 1.0)], 1.0)
            .with_pool(outer.clone(), &[(inner.clone(), 1.0), (c.clone(), 1.0)], 2.0);
        let h = Harness::new(source, introspector);

        let result = h
            .resolver
            .resolve_addresses(CHAIN, &strs(&[outer.clone(), inner.clone()]), false)
            .await
            .unwrap();

        assert_eq!(result.get(&inner).unwrap().current().price, 4.0);
        assert_eq!(result.get(&outer).unwrap().current().price, 7.0);
        let cached = h.cached(CHAIN).await;
        assert!(cached.contains(&outer) && cached.contains(&inner));
    }

    #[tokio::test]
    async fn test_partial_hit_fetches_only_misses() {
        let (a, b) = (addr(1), addr(2));
        let source = FakePriceSource::with_prices(prices(&[(b.clone(), history(&[(2.0, 20)]))]));
        let h = Harness::new(source, FakeIntrospector::default());
        let seeded = history(&[(1.0, 10), (0.9, 5)]);
        h.seed(CHAIN, prices(&[(a.clone(), seeded.clone())])).await;

        let result = h
            .resolver
            .resolve_addresses(CHAIN, &strs(&[a.clone(), b.clone()]), false)
            .await
            .unwrap();

        assert_eq!(*h.source.requested.lock().unwrap(), vec![vec![b.clone()]]);
        assert!(result.contains(&a) && result.contains(&b));

        let cached = h.cached(CHAIN).await;
        assert_eq!(cached.get(&a), Some(&seeded));
        assert_eq!(cached.get(&b).unwrap().current().price, 2.0);
    }

    #[tokio::test]
    async fn test_depth_limit_stops_recursion() {
        let (outer, inner, a, b, c) = (addr(0xa1), addr(0xa2), addr(1), addr(2), addr(3));
        let source = FakePriceSource::with_prices(prices(&[
            (a.clone(), history(&[(1.0, 10)])),
            (b.clone(), history(&[(3.0, 10)])),
            (c.clone(), history(&[(10.0, 10)])),
        ]));
        let introspector = FakeIntrospector::default()
            .with_pool(inner.clone(), &[(a.clone(), 1.0), (b.clone(), 1.0)], 1.0)
            .with_pool(outer.clone(), &[(inner.clone(), 1.0), (c.clone(), 1.0)], 2.0);
        let h = Harness::with_kv(RecordingKv::default(), source, introspector, 1);

        let result = h.resolver.resolve_addresses(CHAIN, &strs(&[outer.clone()]), false).await.unwrap();

        assert!(result.contains(&c));
        assert!(!result.contains(&inner));
        assert!(!result.contains(&outer));
    }

    #[tokio::test]
    async fn test_cyclic_underlying_graph_terminates() {
        let (lp1, lp2, a, b) = (addr(0xa1), addr(0xa2), addr(1), addr(2));
        let introspector = FakeIntrospector::default()
            .with_pool(lp1.clone(), &[(lp2.clone(), 1.0), (a.clone(), 1.0)], 1.0)
            .with_pool(lp2.clone(), &[(lp1.clone(), 1.0), (b.clone(), 1.0)], 1.0);
        let source = FakePriceSource::with_prices(prices(&[
            (a.clone(), history(&[(1.0, 10)])),
            (b.clone(), history(&[(1.0, 10)])),
        ]));
        let h = Harness::new(source, introspector);

        let result = h.resolver.resolve_addresses(CHAIN, &strs(&[lp1.clone()]), false).await.unwrap();

        assert!(result.contains(&a) && result.contains(&b));
        assert!(!result.contains(&lp1));
    }

    #[tokio::test]
    async fn test_resolve_many_isolates_failing_chain() {
        let kv = RecordingKv::failing_for("optimism");
        let source = FakePriceSource::with_prices(prices(&[(addr(1), history(&[(1.0, 10)]))]));
        let h = Harness::with_kv(kv, source, FakeIntrospector::default(), 4);

        let results = h
            .resolver
            .resolve_many(
                vec![
                    ChainRequest {
                        chain: ChainId::Mainnet,
                        addresses: Some(strs(&[addr(1)])),
                    },
                    ChainRequest {
                        chain: ChainId::Optimism,
                        addresses: Some(strs(&[addr(1)])),
                    },
                    ChainRequest {
                        chain: ChainId::Base,
                        addresses: None,
                    },
                ],
                false,
            )
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[&ChainId::Mainnet].as_ref().unwrap().contains(&addr(1)));
        assert!(results[&ChainId::Optimism].is_none());
        assert!(results[&ChainId::Base].as_ref().unwrap().is_empty());
    }
}
