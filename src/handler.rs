//! Request entry point
//!
//! Turns one price request into the response body: serialized
//! `ChainTokenPrices` (`"{}"` when nothing resolved) or `None` as the
//! failure sentinel. Errors are logged here and never leak partial results.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, error};

use crate::chains::ChainId;
use crate::resolver::{ChainRequest, Resolver};
use crate::types::ChainTokenPrices;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestOptions {
    pub include_history: bool,
}

/// Serialized prices for `chain`, or `None` on an unexpected failure.
/// `addresses: None` selects refresh mode.
pub async fn fetch_token_prices(
    resolver: &Resolver,
    chain: ChainId,
    addresses: Option<&[String]>,
    options: RequestOptions,
) -> Option<String> {
    debug!(
        "Price request: chain={} addresses={} history={}",
        chain,
        addresses.map_or_else(|| "refresh".to_string(), |a| a.len().to_string()),
        options.include_history
    );

    let prices = match resolver.resolve(chain, addresses, options.include_history).await {
        Ok(prices) => prices,
        Err(e) => {
            error!("Price request for chain {} failed: {:#}", chain, e);
            return None;
        }
    };

    serialize(chain, &prices)
}

/// Batched variant: one body holding `{ "<chainId>": prices | null }`
pub async fn fetch_many(
    resolver: &Resolver,
    requests: BTreeMap<ChainId, Option<Vec<String>>>,
    options: RequestOptions,
) -> Option<String> {
    let requests = requests
        .into_iter()
        .map(|(chain, addresses)| ChainRequest { chain, addresses })
        .collect();

    let results = resolver.resolve_many(requests, options.include_history).await;

    match serde_json::to_string(&results) {
        Ok(body) => Some(body),
        Err(e) => {
            error!("Failed to serialize batched response: {}", e);
            None
        }
    }
}

fn serialize(chain: ChainId, prices: &ChainTokenPrices) -> Option<String> {
    match serde_json::to_string(prices) {
        Ok(body) => Some(body),
        Err(e) => {
            error!("Failed to serialize prices for chain {}: {}", chain, e);
            None
        }
    }
}
