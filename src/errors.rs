//! Engine error taxonomy
//!
//! Feed-level failures (malformed payloads, zero prices, broken relay chunks)
//! are absorbed into `PriceResult::Unknown` and never surface here. These
//! errors cover the failures with no sensible partial result: a group that
//! cannot be resolved, a bank whose mint account is missing, transport errors
//! on paths without a fallback source.

use thiserror::Error;

use crate::types::Address;

/// Failure to decode a single binary account payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload truncated: need at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("negative price {0} in feed payload")]
    NegativePrice(i64),

    #[error("exponent {0} outside supported decimal range")]
    UnsupportedExponent(i32),

    #[error("value does not fit a 96-bit decimal mantissa")]
    ValueOutOfRange,

    #[error("unknown oracle setup tag {0}")]
    UnknownOracleSetup(u8),

    #[error("e-mode entry count {0} exceeds the table maximum")]
    EmodeEntryOverflow(u8),
}

/// Failures fatal to a whole aggregation pass or engine call.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("group account {0} not found on chain")]
    MissingGroupAccount(Address),

    #[error("mint account {mint} missing for bank {bank}")]
    MissingMintAccount { bank: Address, mint: Address },

    #[error("bank account {0} not found on chain")]
    MissingBankAccount(Address),

    #[error("failed to decode account {address}: {source}")]
    AccountDecode {
        address: Address,
        source: DecodeError,
    },

    #[error("rpc request failed: {0}")]
    Rpc(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}
