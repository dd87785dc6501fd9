//! LP Token Introspector
//!
//! Classifies candidate addresses as 2-coin Curve-style LP tokens by probing
//! `coins(0..=2)` through Multicall3, then reads the pool state the
//! calculator needs. One multicall per step, no matter how many candidates.
//!
//! RPC FAILURES:
//! - A failed batch classifies every candidate in it as "not an LP"
//! - A failed sub-call classifies only that candidate as "not an LP"

use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::abi::*;
use super::calculator::{LpPoolState, PoolReserve};
use crate::chains::ChainId;
use crate::types::{LpTokenInfo, LpTokenRegistry, TokenAddress};

#[async_trait]
pub trait LpIntrospector: Send + Sync {
    /// Entries only for addresses confirmed to be LP tokens
    async fn classify(&self, chain: ChainId, addresses: &[TokenAddress]) -> LpTokenRegistry;

    /// Current pool state for each LP token whose state could be read
    async fn composition(&self, chain: ChainId, lp_tokens: &LpTokenRegistry) -> HashMap<TokenAddress, LpPoolState>;
}

// ============================================
// CURVE LP INTROSPECTOR
// ============================================

/// Calls made per LP in the composition batch:
/// balances(0), balances(1), totalSupply(), decimals(), coin0.decimals(), coin1.decimals()
const COMPOSITION_CALLS_PER_LP: usize = 6;

pub struct CurveLpIntrospector {
    rpc_urls: HashMap<ChainId, String>,
    multicall: Address,
}

impl CurveLpIntrospector {
    pub fn new(rpc_urls: HashMap<ChainId, String>, multicall: Address) -> Self {
        Self { rpc_urls, multicall }
    }

    // ============================================
    // MULTICALL HELPERS
    // ============================================

    /// Execute Multicall3 batch - SINGLE RPC call
    async fn execute_multicall(
        &self,
        chain: ChainId,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<IMulticall3::Result>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let rpc_url = self
            .rpc_urls
            .get(&chain)
            .ok_or_else(|| eyre!("No RPC URL configured for chain {}", chain))?;
        let provider = ProviderBuilder::new().connect_http(rpc_url.parse()?);

        let expected = calls.len();
        let calldata = IMulticall3::aggregate3Call { calls }.abi_encode();

        let tx = TransactionRequest::default()
            .to(self.multicall)
            .input(calldata.into());

        let result = provider
            .call(tx)
            .await
            .map_err(|e| eyre!("Multicall3 failed: {}", e))?;

        let decoded = IMulticall3::aggregate3Call::abi_decode_returns(&result)
            .map_err(|e| eyre!("Failed to decode multicall: {}", e))?;

        if decoded.len() != expected {
            return Err(eyre!(
                "Multicall3 returned {} results for {} calls",
                decoded.len(),
                expected
            ));
        }

        Ok(decoded)
    }

    fn call(target: Address, call_data: Vec<u8>) -> IMulticall3::Call3 {
        IMulticall3::Call3 {
            target,
            allowFailure: true,
            callData: call_data.into(),
        }
    }
}

#[async_trait]
impl LpIntrospector for CurveLpIntrospector {
    async fn classify(&self, chain: ChainId, addresses: &[TokenAddress]) -> LpTokenRegistry {
        let mut calls = Vec::with_capacity(addresses.len() * PROBED_COIN_INDICES.len());
        for address in addresses {
            for i in PROBED_COIN_INDICES {
                calls.push(Self::call(
                    address.to_address(),
                    ICurvePool::coinsCall { i: U256::from(i) }.abi_encode(),
                ));
            }
        }

        debug!(
            "LP classification: {} candidates, {} calls in 1 multicall",
            addresses.len(),
            calls.len()
        );

        let results = match self.execute_multicall(chain, calls).await {
            Ok(results) => results,
            Err(e) => {
                warn!(
                    "LP classification failed on chain {}, treating {} candidates as non-LP: {}",
                    chain,
                    addresses.len(),
                    e
                );
                return LpTokenRegistry::new();
            }
        };

        let mut registry = LpTokenRegistry::new();
        for (address, probe) in addresses.iter().zip(results.chunks(PROBED_COIN_INDICES.len())) {
            let coins: Vec<Option<Address>> = probe.iter().map(decode_coin).collect();
            if let Some(underlying) = two_coin_underlying(address, &coins) {
                if registry.insert(address.clone(), LpTokenInfo::lp(underlying)) {
                    debug!("Classified {} as LP on chain {}", address, chain);
                }
            }
        }

        if !registry.is_empty() {
            info!(
                "Classified {}/{} candidates as LP tokens on chain {}",
                registry.len(),
                addresses.len(),
                chain
            );
        }
        registry
    }

    async fn composition(&self, chain: ChainId, lp_tokens: &LpTokenRegistry) -> HashMap<TokenAddress, LpPoolState> {
        let entries: Vec<(&TokenAddress, &LpTokenInfo)> = lp_tokens
            .iter()
            .filter(|(_, info)| info.is_lp && info.underlying().len() == 2)
            .collect();

        let mut calls = Vec::with_capacity(entries.len() * COMPOSITION_CALLS_PER_LP);
        for (lp_token, info) in &entries {
            let pool = lp_token.to_address();
            calls.push(Self::call(pool, ICurvePool::balancesCall { i: U256::from(0u8) }.abi_encode()));
            calls.push(Self::call(pool, ICurvePool::balancesCall { i: U256::from(1u8) }.abi_encode()));
            calls.push(Self::call(pool, IERC20::totalSupplyCall {}.abi_encode()));
            calls.push(Self::call(pool, IERC20::decimalsCall {}.abi_encode()));
            for coin in info.underlying() {
                calls.push(Self::call(coin.to_address(), IERC20::decimalsCall {}.abi_encode()));
            }
        }

        let results = match self.execute_multicall(chain, calls).await {
            Ok(results) => results,
            Err(e) => {
                warn!("LP composition read failed on chain {}: {}", chain, e);
                return HashMap::new();
            }
        };

        let mut pools = HashMap::new();
        for ((lp_token, info), chunk) in entries.iter().zip(results.chunks(COMPOSITION_CALLS_PER_LP)) {
            match decode_pool_state(info.underlying(), chunk) {
                Some(state) => {
                    pools.insert((*lp_token).clone(), state);
                }
                None => warn!("Incomplete pool state for LP {} on chain {}", lp_token, chain),
            }
        }
        pools
    }
}

// ============================================
// DECODING
// ============================================

fn decode_coin(result: &IMulticall3::Result) -> Option<Address> {
    if !result.success {
        return None;
    }
    ICurvePool::coinsCall::abi_decode_returns(&result.returnData)
        .ok()
        .filter(|coin| *coin != Address::ZERO)
}

/// Exactly two coins, both distinct from each other and from the LP itself
fn two_coin_underlying(lp_token: &TokenAddress, coins: &[Option<Address>]) -> Option<Vec<TokenAddress>> {
    match coins {
        [Some(c0), Some(c1), None] if c0 != c1 => {
            let underlying = vec![TokenAddress::from(*c0), TokenAddress::from(*c1)];
            if underlying.contains(lp_token) {
                return None;
            }
            Some(underlying)
        }
        _ => None,
    }
}

fn decode_u256(result: &IMulticall3::Result, decode: fn(&Bytes) -> Option<U256>) -> Option<U256> {
    if !result.success {
        return None;
    }
    decode(&result.returnData)
}

fn decode_decimals(result: &IMulticall3::Result) -> Option<u8> {
    if !result.success {
        return None;
    }
    IERC20::decimalsCall::abi_decode_returns(&result.returnData).ok()
}

fn decode_pool_state(underlying: &[TokenAddress], chunk: &[IMulticall3::Result]) -> Option<LpPoolState> {
    let [bal0, bal1, supply, lp_decimals, dec0, dec1] = chunk else {
        return None;
    };

    let balance = |data: &Bytes| ICurvePool::balancesCall::abi_decode_returns(data).ok();
    let total_supply = |data: &Bytes| IERC20::totalSupplyCall::abi_decode_returns(data).ok();

    let bal0 = decode_u256(bal0, balance)?;
    let bal1 = decode_u256(bal1, balance)?;
    let supply = decode_u256(supply, total_supply)?;
    let lp_decimals = decode_decimals(lp_decimals)?;
    let dec0 = decode_decimals(dec0)?;
    let dec1 = decode_decimals(dec1)?;

    Some(LpPoolState {
        reserves: vec![
            PoolReserve {
                token: underlying[0].clone(),
                amount: scale(bal0, dec0)?,
            },
            PoolReserve {
                token: underlying[1].clone(),
                amount: scale(bal1, dec1)?,
            },
        ],
        total_supply: scale(supply, lp_decimals)?,
    })
}

/// Raw integer amount to a decimal-adjusted float
fn scale(raw: U256, decimals: u8) -> Option<f64> {
    let value: f64 = raw.to_string().parse().ok()?;
    let scaled = value / 10f64.powi(decimals as i32);
    scaled.is_finite().then_some(scaled)
}
