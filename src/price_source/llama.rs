//! DefiLlama coins API price source
//!
//! API: https://coins.llama.fi/prices/current/{chain:address,...}
//!      https://coins.llama.fi/chart/{chain:address,...}?span=N&period=1d

use async_trait::async_trait;
use eyre::{eyre, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::PriceSource;
use crate::chains::ChainId;
use crate::types::{ChainTokenPrices, PricePoint, TokenAddress, TokenPriceHistory};

// ============================================
// CONSTANTS
// ============================================

pub const DEFAULT_PRICE_API_URL: &str = "https://coins.llama.fi";

/// How far back the current-price endpoint may look for a quote
const SEARCH_WIDTH: &str = "4h";

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct CurrentPricesResponse {
    #[serde(default)]
    coins: HashMap<String, CurrentCoin>,
}

#[derive(Debug, Deserialize)]
struct CurrentCoin {
    price: f64,
    timestamp: u64,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    #[serde(default)]
    coins: HashMap<String, ChartCoin>,
}

#[derive(Debug, Deserialize)]
struct ChartCoin {
    #[serde(default)]
    prices: Vec<PricePoint>,
}

// ============================================
// PRICE SOURCE
// ============================================

pub struct LlamaPriceSource {
    http_client: Client,
    base_url: String,
    /// Daily points to request beyond the spot price (0 = spot only)
    history_days: u32,
    batch_size: usize,
}

impl LlamaPriceSource {
    pub fn new(base_url: String, history_days: u32, batch_size: usize, timeout_secs: u64) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            history_days,
            batch_size: batch_size.max(1),
        })
    }

    fn coins_param(chain: ChainId, addresses: &[TokenAddress]) -> String {
        addresses
            .iter()
            .map(|a| format!("{}:{}", chain.llama_slug(), a))
            .collect::<Vec<_>>()
            .join(",")
    }

    async fn fetch_current(&self, chain: ChainId, addresses: &[TokenAddress]) -> Result<HashMap<TokenAddress, PricePoint>> {
        let url = format!(
            "{}/prices/current/{}?searchWidth={}",
            self.base_url,
            Self::coins_param(chain, addresses),
            SEARCH_WIDTH
        );

        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(eyre!("Price API error: {}", response.status()));
        }
        let body: CurrentPricesResponse = response.json().await?;

        Ok(parse_current(chain, body))
    }

    async fn fetch_chart(&self, chain: ChainId, addresses: &[TokenAddress]) -> Result<HashMap<TokenAddress, Vec<PricePoint>>> {
        let url = format!(
            "{}/chart/{}?span={}&period=1d",
            self.base_url,
            Self::coins_param(chain, addresses),
            self.history_days
        );

        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(eyre!("Price chart API error: {}", response.status()));
        }
        let body: ChartResponse = response.json().await?;

        Ok(parse_chart(chain, body))
    }

    async fn fetch_batch(&self, chain: ChainId, batch: &[TokenAddress]) -> Result<ChainTokenPrices> {
        let current = self.fetch_current(chain, batch).await?;
        if current.is_empty() {
            return Ok(ChainTokenPrices::new());
        }

        let mut series = HashMap::new();
        if self.history_days > 0 {
            let priced: Vec<TokenAddress> = current.keys().cloned().collect();
            match self.fetch_chart(chain, &priced).await {
                Ok(chart) => series = chart,
                Err(e) => warn!("Price series fetch failed on chain {}, using spot only: {}", chain, e),
            }
        }

        Ok(combine(current, series))
    }
}

#[async_trait]
impl PriceSource for LlamaPriceSource {
    async fn fetch(&self, chain: ChainId, addresses: &[TokenAddress]) -> Result<ChainTokenPrices> {
        let mut prices = ChainTokenPrices::new();
        if addresses.is_empty() {
            return Ok(prices);
        }

        let mut failures = 0usize;
        let mut last_error = None;
        let batches: Vec<&[TokenAddress]> = addresses.chunks(self.batch_size).collect();

        for batch in &batches {
            match self.fetch_batch(chain, batch).await {
                Ok(batch_prices) => prices.merge(batch_prices),
                Err(e) => {
                    warn!("Price batch of {} failed on chain {}: {}", batch.len(), chain, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        if failures == batches.len() {
            if let Some(e) = last_error {
                return Err(e.wrap_err(format!("All {} price batches failed", failures)));
            }
        }

        debug!(
            "Priced {}/{} tokens on chain {} from DefiLlama",
            prices.len(),
            addresses.len(),
            chain
        );
        Ok(prices)
    }
}

// ============================================
// RESPONSE PARSING
// ============================================

fn parse_coin_key(chain: ChainId, key: &str) -> Option<TokenAddress> {
    let raw = key.strip_prefix(chain.llama_slug())?.strip_prefix(':')?;
    TokenAddress::parse(raw).ok()
}

fn parse_current(chain: ChainId, body: CurrentPricesResponse) -> HashMap<TokenAddress, PricePoint> {
    body.coins
        .into_iter()
        .filter_map(|(key, coin)| {
            let address = parse_coin_key(chain, &key)?;
            let point = PricePoint::new(coin.price, coin.timestamp);
            if !point.is_valid() || point.price == 0.0 {
                trace!("Discarding unusable quote for {}: {}", key, coin.price);
                return None;
            }
            Some((address, point))
        })
        .collect()
}

fn parse_chart(chain: ChainId, body: ChartResponse) -> HashMap<TokenAddress, Vec<PricePoint>> {
    body.coins
        .into_iter()
        .filter_map(|(key, coin)| Some((parse_coin_key(chain, &key)?, coin.prices)))
        .collect()
}

/// Spot point first, then series points strictly older than it
fn combine(
    current: HashMap<TokenAddress, PricePoint>,
    mut series: HashMap<TokenAddress, Vec<PricePoint>>,
) -> ChainTokenPrices {
    current
        .into_iter()
        .filter_map(|(address, spot)| {
            let mut points = vec![spot];
            if let Some(older) = series.remove(&address) {
                points.extend(
                    older
                        .into_iter()
                        .filter(|p| p.timestamp < spot.timestamp && p.price > 0.0),
                );
            }
            TokenPriceHistory::new(points).map(|history| (address, history))
        })
        .collect()
}
