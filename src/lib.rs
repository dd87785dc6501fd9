//! Token prices - price resolution and caching with recursive LP pricing
//!
//! - **store**: per-chain price cache and LP registry over a KV capability
//! - **price_source**: plain token prices (DefiLlama)
//! - **lp**: LP classification, pool state and LP price derivation
//! - **resolver**: ties the above together for one request
//! - **handler** / **server**: request entry point and its HTTP binding

pub mod chains;
pub mod config;
pub mod handler;
pub mod lp;
pub mod price_source;
pub mod resolver;
pub mod server;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

use eyre::Result;
use std::sync::Arc;
use tracing::info;

use config::{CacheBackend, Config};
use lp::CurveLpIntrospector;
use price_source::LlamaPriceSource;
use resolver::Resolver;
use store::{FileKv, KvStore, MemoryKv};

/// Wire the production collaborators described by `config` into a resolver
pub fn build_resolver(config: &Config) -> Result<Resolver> {
    let kv: Arc<dyn KvStore> = match config.cache_backend {
        CacheBackend::File => Arc::new(FileKv::new(&config.cache_dir)),
        CacheBackend::Memory => Arc::new(MemoryKv::new()),
    };

    let price_source = LlamaPriceSource::new(
        config.price_api_url.clone(),
        config.price_history_days,
        config.price_batch_size,
        config.http_timeout_secs,
    )?;

    let rpc_urls = config.chain_rpc_urls();
    info!(
        "Resolver ready: {} cache, {} chains with LP introspection",
        config.cache_backend,
        rpc_urls.len()
    );
    let introspector = CurveLpIntrospector::new(rpc_urls, config.multicall()?);

    Ok(Resolver::new(
        kv,
        Arc::new(price_source),
        Arc::new(introspector),
        config.max_lp_depth,
    ))
}
