//! LP Price Calculator
//!
//! PRICE = pool TVL / LP supply
//!       = Σ (balance_i × price_i) / total_supply
//!
//! Balances and supply are read once (current pool state) and applied to
//! every point of the underlying series, so historical LP points reflect
//! historical underlying prices at today's composition.

use std::collections::HashMap;
use tracing::debug;

use crate::types::{ChainTokenPrices, PricePoint, TokenAddress, TokenPriceHistory};

/// One constituent of a pool, amount already scaled by the token decimals
#[derive(Debug, Clone, PartialEq)]
pub struct PoolReserve {
    pub token: TokenAddress,
    pub amount: f64,
}

/// Pool state needed to price one LP token
#[derive(Debug, Clone, PartialEq)]
pub struct LpPoolState {
    pub reserves: Vec<PoolReserve>,
    /// LP supply, scaled by the LP token decimals
    pub total_supply: f64,
}

impl LpPoolState {
    pub fn underlying(&self) -> impl Iterator<Item = &TokenAddress> {
        self.reserves.iter().map(|r| &r.token)
    }

    fn value_per_share(&self, prices: &[f64]) -> f64 {
        let tvl: f64 = self
            .reserves
            .iter()
            .zip(prices)
            .map(|(reserve, price)| reserve.amount * price)
            .sum();
        tvl / self.total_supply
    }
}

/// Price every LP token whose underlying prices are all available.
///
/// The returned history of each LP token is newest-first: index 0 combines
/// each underlying's current point and carries the oldest of their
/// timestamps; older points exist only at timestamps every underlying series
/// contains.
pub fn calculate_lp_prices(
    pools: &HashMap<TokenAddress, LpPoolState>,
    underlying_prices: &ChainTokenPrices,
) -> ChainTokenPrices {
    let mut result = ChainTokenPrices::new();

    for (lp_token, pool) in pools {
        if !(pool.total_supply.is_finite() && pool.total_supply > 0.0) || pool.reserves.is_empty() {
            debug!("LP {} has no supply, skipping", lp_token);
            continue;
        }

        let histories: Option<Vec<&TokenPriceHistory>> = pool
            .underlying()
            .map(|token| underlying_prices.get(token))
            .collect();
        let Some(histories) = histories else {
            debug!("LP {} is missing underlying prices, skipping", lp_token);
            continue;
        };

        if let Some(history) = price_pool(pool, &histories) {
            result.insert(lp_token.clone(), history);
        }
    }

    result
}

fn price_pool(pool: &LpPoolState, histories: &[&TokenPriceHistory]) -> Option<TokenPriceHistory> {
    let current_prices: Vec<f64> = histories.iter().map(|h| h.current().price).collect();
    let current_ts = histories.iter().map(|h| h.current().timestamp).min()?;

    let mut points = vec![PricePoint::new(pool.value_per_share(&current_prices), current_ts)];

    let (reference, others) = histories.split_first()?;
    for point in reference.points().iter().skip(1) {
        if point.timestamp >= current_ts {
            continue;
        }
        let mut prices = Vec::with_capacity(histories.len());
        prices.push(point.price);
        for other in others {
            match other.price_at(point.timestamp) {
                Some(price) => prices.push(price),
                None => break,
            }
        }
        if prices.len() == histories.len() {
            points.push(PricePoint::new(pool.value_per_share(&prices), point.timestamp));
        }
    }

    TokenPriceHistory::new(points)
}
