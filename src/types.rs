//! Core types used throughout the engine
//!
//! Addresses and feed keys are opaque identifiers; all financial values are
//! `rust_decimal::Decimal` to avoid float rounding drift in comparisons.

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The all-zero system address (hex), used to mark "no account configured"
/// (e.g. a bank without an emissions mint).
pub const DEFAULT_ADDRESS: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Opaque hex-encoded account key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The default (all-zero) key, meaning "not set".
    pub fn default_key() -> Self {
        Self(DEFAULT_ADDRESS.to_string())
    }

    /// Hex-encode raw key bytes from a binary payload.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_ADDRESS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier naming one upstream price feed: an account key for
/// on-chain/aggregator feeds, a feed hash for relay-simulated feeds.
/// Stable across fetches; distinct keys never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedKey(pub String);

impl FeedKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Hex-encode raw key bytes from a binary payload.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// E-mode risk category tag. Banks sharing a tag form one collateral class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmodeTag(pub u16);

impl EmodeTag {
    pub const UNSET: EmodeTag = EmodeTag(0);

    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

/// Which upstream strategy serves a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Direct on-chain account read, decoded from the binary price message.
    OnChain,
    /// Authenticated off-chain aggregator HTTP API.
    Aggregator,
    /// Relay service queried in batches with primary/fallback endpoints.
    Relay,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::OnChain => write!(f, "on-chain"),
            SourceKind::Aggregator => write!(f, "aggregator"),
            SourceKind::Relay => write!(f, "relay"),
        }
    }
}

/// One feed to price, with the strategy to use for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedRequest {
    pub key: FeedKey,
    pub source: SourceKind,
}

impl FeedRequest {
    pub fn new(key: FeedKey, source: SourceKind) -> Self {
        Self { key, source }
    }
}

/// A price with its capped confidence band.
///
/// Invariant: `lowest_price <= price <= highest_price`, with the band
/// symmetric around `price` (`confidence` on each side).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub price: Decimal,
    pub confidence: Decimal,
    pub lowest_price: Decimal,
    pub highest_price: Decimal,
}

impl Price {
    /// Build a price around a capped confidence value.
    pub fn with_confidence(price: Decimal, capped_confidence: Decimal) -> Self {
        Self {
            price,
            confidence: capped_confidence,
            lowest_price: price - capped_confidence,
            highest_price: price + capped_confidence,
        }
    }

    /// All-zero price, the normalized form of "feed reporting nothing".
    pub fn zero() -> Self {
        Self {
            price: Decimal::ZERO,
            confidence: Decimal::ZERO,
            lowest_price: Decimal::ZERO,
            highest_price: Decimal::ZERO,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.price.is_zero()
    }
}

/// One fetched price observation for a feed. Immutable once produced; a new
/// fetch produces a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OraclePriceRecord {
    /// Instantaneous feed value.
    pub realtime: Price,
    /// Time-weighted value from the same source; equals `realtime` for
    /// sources without weighting.
    pub weighted: Price,
    /// Feed publish time (unix seconds), where the source reports one.
    pub timestamp: Option<i64>,
}

impl OraclePriceRecord {
    /// Same price for realtime and weighted, for sources without a
    /// time-weighted track.
    pub fn unweighted(price: Price, timestamp: Option<i64>) -> Self {
        Self {
            realtime: price.clone(),
            weighted: price,
            timestamp,
        }
    }
}

/// Per-feed fetch outcome. Every requested key resolves to one of these;
/// callers can always distinguish "priced" from "explicitly unknown".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceResult {
    Priced(OraclePriceRecord),
    Unknown,
}

impl PriceResult {
    pub fn is_unknown(&self) -> bool {
        matches!(self, PriceResult::Unknown)
    }

    pub fn as_record(&self) -> Option<&OraclePriceRecord> {
        match self {
            PriceResult::Priced(record) => Some(record),
            PriceResult::Unknown => None,
        }
    }
}

/// E-mode entry attached to a liability-side bank: collateral from any bank
/// tagged `collateral_bank_emode_tag` is accepted at these weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmodeEntry {
    pub collateral_bank_emode_tag: EmodeTag,
    pub asset_weight_init: Decimal,
    pub asset_weight_maint: Decimal,
}

/// Normalized e-mode relation, derived once per bank-set snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmodePair {
    pub collateral_banks: Vec<Address>,
    pub collateral_bank_tag: EmodeTag,
    pub liability_bank: Address,
    pub liability_bank_tag: EmodeTag,
    pub asset_weight_init: Decimal,
    pub asset_weight_maint: Decimal,
}

/// Per-asset risk configuration entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankRecord {
    pub address: Address,
    pub group: Address,
    pub mint: Address,
    pub emissions_mint: Option<Address>,
    pub oracle_key: FeedKey,
    pub oracle_source: SourceKind,
    /// Statically configured collateral weights; the adjustment baseline.
    pub asset_weight_init: Decimal,
    pub asset_weight_maint: Decimal,
    pub emode_tag: EmodeTag,
    pub emode_entries: Vec<EmodeEntry>,
}

/// Collateral weights for one bank, one value per margin tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustedWeights {
    pub asset_weight_init: Decimal,
    pub asset_weight_maint: Decimal,
}

/// Final per-bank weights after e-mode adjustment, keyed by bank address.
pub type AdjustedWeightMap = HashMap<Address, AdjustedWeights>;

/// Mint-side data positionally joined to a bank during aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintData {
    pub mint: Address,
    pub token_program: Address,
    pub emissions_token_program: Option<Address>,
}

/// The risk group account all banks in a pass belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskGroup {
    pub address: Address,
    pub admin: Address,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_address_is_recognized() {
        assert!(Address::default_key().is_default());
        assert!(!Address::new("4e1c9a3b").is_default());
    }

    #[test]
    fn price_band_is_symmetric() {
        let p = Price::with_confidence(dec!(100), dec!(2));
        assert_eq!(p.lowest_price, dec!(98));
        assert_eq!(p.highest_price, dec!(102));
        assert_eq!(p.highest_price - p.price, p.price - p.lowest_price);
    }

    #[test]
    fn zero_price_is_flagged() {
        assert!(Price::zero().is_zero());
        assert!(!Price::with_confidence(dec!(1), dec!(0)).is_zero());
    }

    #[test]
    fn unweighted_record_mirrors_price() {
        let record = OraclePriceRecord::unweighted(Price::with_confidence(dec!(5), dec!(1)), None);
        assert_eq!(record.realtime, record.weighted);
    }
}
