//! Service configuration
//!
//! Loaded from environment variables (and a `.env` file) or from a TOML
//! file. Per-chain RPC URLs follow the `<CHAIN>_RPC_URL` convention.

use alloy_primitives::Address;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use crate::chains::ChainId;
use crate::lp::MULTICALL3;
use crate::price_source::DEFAULT_PRICE_API_URL;

// ============================================
// CACHE BACKEND
// ============================================

/// Where persisted blobs live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// One JSON file per key under `cache_dir`
    File,
    /// Process memory, lost on restart
    Memory,
}

impl Default for CacheBackend {
    fn default() -> Self {
        CacheBackend::File
    }
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackend::File => write!(f, "file"),
            CacheBackend::Memory => write!(f, "memory"),
        }
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Network Settings ==========
    /// Multicall3 address used for LP introspection
    pub multicall_address: String,

    // ========== Price Source ==========
    pub price_api_url: String,

    /// Daily history points fetched per token (0 = spot only)
    pub price_history_days: u32,

    /// Max addresses per price API request
    pub price_batch_size: usize,

    pub http_timeout_secs: u64,

    // ========== Cache ==========
    pub cache_backend: CacheBackend,
    pub cache_dir: String,

    // ========== Resolver ==========
    /// Max nesting of LP-of-LP resolution
    pub max_lp_depth: usize,

    // ========== Server ==========
    pub bind_addr: String,

    /// RPC URL per chain, keyed by chain slug (`mainnet`, `base`, ...)
    pub rpc_urls: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let rpc_urls = ChainId::ALL
            .iter()
            .filter_map(|chain| {
                env::var(chain.rpc_env_var())
                    .ok()
                    .filter(|url| !url.trim().is_empty())
                    .map(|url| (chain.slug().to_string(), url))
            })
            .collect();

        Ok(Self {
            rpc_urls,
            multicall_address: env::var("MULTICALL_ADDRESS")
                .unwrap_or(defaults.multicall_address),

            price_api_url: env::var("PRICE_API_URL").unwrap_or(defaults.price_api_url),
            price_history_days: env::var("PRICE_HISTORY_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .unwrap_or(7),
            price_batch_size: env::var("PRICE_BATCH_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .unwrap_or(50),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),

            cache_backend: match env::var("CACHE_BACKEND")
                .unwrap_or_else(|_| "file".to_string())
                .to_lowercase()
                .as_str()
            {
                "memory" | "mem" => CacheBackend::Memory,
                _ => CacheBackend::File,
            },
            cache_dir: env::var("CACHE_DIR").unwrap_or(defaults.cache_dir),

            max_lp_depth: env::var("MAX_LP_DEPTH")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),

            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// RPC URLs for every supported chain that has one configured
    pub fn chain_rpc_urls(&self) -> std::collections::HashMap<ChainId, String> {
        ChainId::ALL
            .iter()
            .filter_map(|chain| {
                self.rpc_urls
                    .get(chain.slug())
                    .map(|url| (*chain, url.clone()))
            })
            .collect()
    }

    pub fn multicall(&self) -> Result<Address> {
        Address::from_str(&self.multicall_address)
            .map_err(|e| eyre!("Invalid MULTICALL_ADDRESS '{}': {}", self.multicall_address, e))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|e| eyre!("Invalid BIND_ADDR '{}': {}", self.bind_addr, e))
    }

    /// Validate configuration before starting the service
    pub fn validate(&self) -> Result<()> {
        for (slug, url) in &self.rpc_urls {
            if !ChainId::ALL.iter().any(|c| c.slug() == slug) {
                return Err(eyre!("RPC URL configured for unknown chain '{}'", slug));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(eyre!("Invalid RPC URL for {} - expected http(s)://", slug));
            }
        }

        if !(self.price_api_url.starts_with("http://") || self.price_api_url.starts_with("https://")) {
            return Err(eyre!("Invalid PRICE_API_URL '{}'", self.price_api_url));
        }
        if self.price_batch_size == 0 {
            return Err(eyre!("PRICE_BATCH_SIZE must be at least 1"));
        }
        if self.max_lp_depth == 0 {
            return Err(eyre!("MAX_LP_DEPTH must be at least 1"));
        }

        self.multicall()?;
        self.socket_addr()?;

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              TOKEN PRICES - CONFIGURATION                  ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ NETWORKS                                                   ║");
        for chain in ChainId::ALL {
            let status = if self.rpc_urls.contains_key(chain.slug()) {
                "✓ RPC configured"
            } else {
                "✗ price source only"
            };
            println!("║ • {:<10} ({:>6}): {:^36} ║", chain.slug(), chain.id(), status);
        }
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ PRICE SOURCE                                               ║");
        println!("║ • API:             {:^40} ║", self.price_api_url);
        println!("║ • History Days:    {:^40} ║", self.price_history_days);
        println!("║ • Batch Size:      {:^40} ║", self.price_batch_size);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CACHE                                                      ║");
        println!("║ • Backend:         {:^40} ║", self.cache_backend);
        println!("║ • Directory:       {:^40} ║", self.cache_dir);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ • Max LP Depth:    {:^40} ║", self.max_lp_depth);
        println!("║ • Bind Address:    {:^40} ║", self.bind_addr);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_urls: BTreeMap::new(),
            multicall_address: format!("{:?}", MULTICALL3),
            price_api_url: DEFAULT_PRICE_API_URL.to_string(),
            price_history_days: 7,
            price_batch_size: 50,
            http_timeout_secs: 10,
            cache_backend: CacheBackend::File,
            cache_dir: "./data/kv".to_string(),
            max_lp_depth: 4,
            bind_addr: "127.0.0.1:8787".to_string(),
        }
    }
}

// ============================================
// TESTS
// ============================================
