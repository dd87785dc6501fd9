//! Core price data model
//!
//! Addresses are normalized to lowercase at construction, so every map keyed
//! by `TokenAddress` is case-insensitive by construction. Persisted blobs are
//! deserialized leniently: entries that fail validation are dropped instead
//! of failing the whole blob.

use alloy_primitives::Address;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

// ============================================
// TOKEN ADDRESS
// ============================================

/// Canonical lowercase `0x`-prefixed 20-byte hex address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAddress(String);

impl TokenAddress {
    pub fn parse(raw: &str) -> Result<Self> {
        let lower = raw.trim().to_lowercase();
        let hex_part = lower
            .strip_prefix("0x")
            .ok_or_else(|| eyre!("Address '{}' is missing 0x prefix", raw))?;

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(eyre!("Address '{}' is not 20 bytes of hex", raw));
        }

        Ok(Self(lower))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_address(&self) -> Address {
        // Always 40 hex digits after validation
        Address::from_str(&self.0).unwrap_or(Address::ZERO)
    }
}

impl From<Address> for TokenAddress {
    fn from(address: Address) -> Self {
        Self(format!("0x{}", hex::encode(address)))
    }
}

impl TryFrom<String> for TokenAddress {
    type Error = eyre::Report;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<TokenAddress> for String {
    fn from(address: TokenAddress) -> String {
        address.0
    }
}

impl FromStr for TokenAddress {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================
// PRICE HISTORY
// ============================================

/// A single observed USD price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    /// Unix seconds
    pub timestamp: u64,
}

impl PricePoint {
    pub fn new(price: f64, timestamp: u64) -> Self {
        Self { price, timestamp }
    }

    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price >= 0.0
    }
}

/// Price series for one token, newest first, never empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct TokenPriceHistory(Vec<PricePoint>);

impl TokenPriceHistory {
    /// Sorts newest-first and drops invalid points. `None` if nothing is left.
    pub fn new(mut points: Vec<PricePoint>) -> Option<Self> {
        points.retain(PricePoint::is_valid);
        if points.is_empty() {
            return None;
        }
        points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        points.dedup_by_key(|p| p.timestamp);
        Some(Self(points))
    }

    pub fn single(point: PricePoint) -> Self {
        Self(vec![point])
    }

    /// Most recent point
    pub fn current(&self) -> &PricePoint {
        &self.0[0]
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy holding only the current point
    pub fn truncated(&self) -> Self {
        Self(vec![self.0[0]])
    }

    /// Price observed exactly at `timestamp`
    pub fn price_at(&self, timestamp: u64) -> Option<f64> {
        self.0
            .iter()
            .find(|p| p.timestamp == timestamp)
            .map(|p| p.price)
    }
}

impl TryFrom<Vec<PricePoint>> for TokenPriceHistory {
    type Error = eyre::Report;

    fn try_from(points: Vec<PricePoint>) -> Result<Self> {
        Self::new(points).ok_or_else(|| eyre!("Price history has no valid points"))
    }
}

impl From<TokenPriceHistory> for Vec<PricePoint> {
    fn from(history: TokenPriceHistory) -> Self {
        history.0
    }
}

// ============================================
// CHAIN TOKEN PRICES
// ============================================

/// Token address -> price history, scoped to one chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, serde_json::Value>")]
pub struct ChainTokenPrices(BTreeMap<TokenAddress, TokenPriceHistory>);

impl ChainTokenPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a persisted blob. Malformed JSON is an error; malformed entries
    /// inside well-formed JSON are dropped.
    pub fn from_blob(blob: &str) -> Result<Self> {
        serde_json::from_str(blob).map_err(|e| eyre!("Invalid price blob: {}", e))
    }

    pub fn to_blob(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn get(&self, address: &TokenAddress) -> Option<&TokenPriceHistory> {
        self.0.get(address)
    }

    pub fn contains(&self, address: &TokenAddress) -> bool {
        self.0.contains_key(address)
    }

    /// Insert or replace the whole history for `address`
    pub fn insert(&mut self, address: TokenAddress, history: TokenPriceHistory) {
        self.0.insert(address, history);
    }

    /// Upsert every entry of `other`, keeping unrelated keys
    pub fn merge(&mut self, other: ChainTokenPrices) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TokenAddress, &TokenPriceHistory)> {
        self.0.iter()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &TokenAddress> {
        self.0.keys()
    }

    /// Copy with every history cut down to its current point
    pub fn truncated(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|(address, history)| (address.clone(), history.truncated()))
                .collect(),
        )
    }
}

impl From<HashMap<String, serde_json::Value>> for ChainTokenPrices {
    fn from(raw: HashMap<String, serde_json::Value>) -> Self {
        let mut prices = BTreeMap::new();
        let mut dropped = 0usize;

        for (key, value) in raw {
            let address = TokenAddress::parse(&key);
            let history = serde_json::from_value::<TokenPriceHistory>(value);
            match (address, history) {
                (Ok(address), Ok(history)) => {
                    prices.insert(address, history);
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            debug!("Dropped {} invalid price entries from blob", dropped);
        }

        Self(prices)
    }
}

impl FromIterator<(TokenAddress, TokenPriceHistory)> for ChainTokenPrices {
    fn from_iter<I: IntoIterator<Item = (TokenAddress, TokenPriceHistory)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ChainTokenPrices {
    type Item = (TokenAddress, TokenPriceHistory);
    type IntoIter = std::collections::btree_map::IntoIter<TokenAddress, TokenPriceHistory>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ============================================
// LP TOKEN REGISTRY
// ============================================

/// Classification result for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LpTokenInfo {
    pub is_lp: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying: Option<Vec<TokenAddress>>,
}

impl LpTokenInfo {
    pub fn lp(underlying: Vec<TokenAddress>) -> Self {
        Self {
            is_lp: true,
            underlying: Some(underlying),
        }
    }

    pub fn underlying(&self) -> &[TokenAddress] {
        self.underlying.as_deref().unwrap_or(&[])
    }

    /// An LP entry needs at least two distinct underlying tokens, none of them itself
    fn is_valid_for(&self, address: &TokenAddress) -> bool {
        if !self.is_lp {
            return self.underlying.is_none();
        }
        let underlying = self.underlying();
        if underlying.len() < 2 || underlying.contains(address) {
            return false;
        }
        let mut unique = underlying.to_vec();
        unique.sort();
        unique.dedup();
        unique.len() == underlying.len()
    }
}

/// Token address -> LP classification, scoped to one chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, serde_json::Value>")]
pub struct LpTokenRegistry(BTreeMap<TokenAddress, LpTokenInfo>);

impl LpTokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blob(blob: &str) -> Result<Self> {
        serde_json::from_str(blob).map_err(|e| eyre!("Invalid LP registry blob: {}", e))
    }

    pub fn to_blob(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn get(&self, address: &TokenAddress) -> Option<&LpTokenInfo> {
        self.0.get(address)
    }

    /// Insert a classification. Entries that would break the registry invariants are refused.
    pub fn insert(&mut self, address: TokenAddress, info: LpTokenInfo) -> bool {
        if !info.is_valid_for(&address) {
            return false;
        }
        self.0.insert(address, info);
        true
    }

    pub fn merge(&mut self, other: LpTokenRegistry) {
        self.0.extend(other.0);
    }

    /// Whether the registry has `address` recorded as an LP token
    pub fn is_known_lp(&self, address: &TokenAddress) -> bool {
        self.0.get(address).map(|info| info.is_lp).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TokenAddress, &LpTokenInfo)> {
        self.0.iter()
    }

    /// Union of underlying addresses across every LP entry
    pub fn underlying_addresses(&self) -> Vec<TokenAddress> {
        let mut all: Vec<TokenAddress> = self
            .0
            .values()
            .flat_map(|info| info.underlying().iter().cloned())
            .collect();
        all.sort();
        all.dedup();
        all
    }
}

impl From<HashMap<String, serde_json::Value>> for LpTokenRegistry {
    fn from(raw: HashMap<String, serde_json::Value>) -> Self {
        let mut registry = LpTokenRegistry::new();
        let mut dropped = 0usize;

        for (key, value) in raw {
            let accepted = match (
                TokenAddress::parse(&key),
                serde_json::from_value::<LpTokenInfo>(value),
            ) {
                (Ok(address), Ok(info)) => registry.insert(address, info),
                _ => false,
            };
            if !accepted {
                dropped += 1;
            }
        }

        if dropped > 0 {
            debug!("Dropped {} invalid LP registry entries from blob", dropped);
        }

        registry
    }
}
