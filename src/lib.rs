//! Lendcore Library
//!
//! Oracle price aggregation and collateral risk-weight engine for a lending
//! protocol. Converts heterogeneous price-feed data (on-chain accounts, an
//! off-chain aggregator API, a batched relay service) into confidence-bounded
//! prices, and computes per-bank e-mode adjusted collateral weights.

pub mod config;
pub mod decode;
pub mod emode;
pub mod engine;
pub mod errors;
pub mod group;
pub mod logging;
pub mod oracle;
pub mod rpc;
pub mod types;

pub use engine::{AdjustedBankSet, Engine};
pub use errors::{DecodeError, EngineError};
pub use types::{
    Address, BankRecord, EmodePair, EmodeTag, FeedKey, FeedRequest, OraclePriceRecord, Price,
    PriceResult, SourceKind,
};
