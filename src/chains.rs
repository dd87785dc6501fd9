//! Supported networks
//!
//! Every chain the service prices tokens on, with the static cache keys
//! its persisted blobs live under and the slug the price API knows it by.

use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported network, identified by its EVM chain id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum ChainId {
    Mainnet,
    Optimism,
    Gnosis,
    World,
    Base,
    Arbitrum,
    Scroll,
}

impl ChainId {
    pub const ALL: [ChainId; 7] = [
        ChainId::Mainnet,
        ChainId::Optimism,
        ChainId::Gnosis,
        ChainId::World,
        ChainId::Base,
        ChainId::Arbitrum,
        ChainId::Scroll,
    ];

    pub fn id(&self) -> u64 {
        match self {
            ChainId::Mainnet => 1,
            ChainId::Optimism => 10,
            ChainId::Gnosis => 100,
            ChainId::World => 480,
            ChainId::Base => 8453,
            ChainId::Arbitrum => 42161,
            ChainId::Scroll => 534352,
        }
    }

    /// Short lowercase name, used in cache keys and env var names
    pub fn slug(&self) -> &'static str {
        match self {
            ChainId::Mainnet => "mainnet",
            ChainId::Optimism => "optimism",
            ChainId::Gnosis => "gnosis",
            ChainId::World => "world",
            ChainId::Base => "base",
            ChainId::Arbitrum => "arbitrum",
            ChainId::Scroll => "scroll",
        }
    }

    /// Chain prefix understood by the DefiLlama coins API
    pub fn llama_slug(&self) -> &'static str {
        match self {
            ChainId::Mainnet => "ethereum",
            ChainId::Optimism => "optimism",
            ChainId::Gnosis => "xdai",
            ChainId::World => "wc",
            ChainId::Base => "base",
            ChainId::Arbitrum => "arbitrum",
            ChainId::Scroll => "scroll",
        }
    }

    /// KV key holding this chain's `ChainTokenPrices` blob
    pub fn price_cache_key(&self) -> String {
        format!("token-prices:{}", self.slug())
    }

    /// KV key holding this chain's `LpTokenRegistry` blob
    pub fn lp_registry_key(&self) -> String {
        format!("lp-tokens:{}", self.slug())
    }

    /// Name of the env var carrying this chain's RPC URL
    pub fn rpc_env_var(&self) -> String {
        format!("{}_RPC_URL", self.slug().to_uppercase())
    }
}

impl TryFrom<u64> for ChainId {
    type Error = eyre::Report;

    fn try_from(id: u64) -> Result<Self> {
        ChainId::ALL
            .iter()
            .copied()
            .find(|chain| chain.id() == id)
            .ok_or_else(|| eyre!("Unsupported chain id {}", id))
    }
}

impl From<ChainId> for u64 {
    fn from(chain: ChainId) -> u64 {
        chain.id()
    }
}

impl FromStr for ChainId {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let id: u64 = s
            .trim()
            .parse()
            .map_err(|_| eyre!("Invalid chain id '{}'", s))?;
        ChainId::try_from(id)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}
