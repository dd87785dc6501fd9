//! Chain Price Source
//!
//! Prices plain (non-LP) tokens by address. Addresses the source does not
//! know are simply absent from the result; an `Err` means the whole batch
//! failed and the caller decides how to degrade.

mod llama;

pub use llama::{LlamaPriceSource, DEFAULT_PRICE_API_URL};

use async_trait::async_trait;
use eyre::Result;

use crate::chains::ChainId;
use crate::types::{ChainTokenPrices, TokenAddress};

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Price history (newest first) for every address the source could price
    async fn fetch(&self, chain: ChainId, addresses: &[TokenAddress]) -> Result<ChainTokenPrices>;
}
