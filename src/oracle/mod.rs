//! Oracle module - Multi-source price retrieval
//!
//! Turns heterogeneous upstream feed data (on-chain binary accounts, an
//! off-chain aggregator API, a batched relay service) into one
//! confidence-bounded `OraclePriceRecord` shape. Each source is normalized at
//! its fetch boundary; nothing downstream branches on source type.

mod fetcher;
pub mod sources;

pub use fetcher::MultiSourcePriceFetcher;

use rust_decimal::Decimal;

/// Bound a feed's self-reported confidence interval to a maximum ratio of
/// price: `min(confidence, price * max_ratio)`.
///
/// A feed's uncertainty can spike during volatility; without the cap a single
/// noisy feed produces a band wide enough to fail every downstream health
/// check. Pure and total for non-negative inputs; negative price or
/// confidence is a caller contract violation.
pub fn cap_confidence(price: Decimal, confidence: Decimal, max_ratio: Decimal) -> Decimal {
    confidence.min(price * max_ratio)
}

/// Median of a non-empty slice of decimal samples.
pub(crate) fn median(samples: &[Decimal]) -> Option<Decimal> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / Decimal::TWO)
    } else {
        Some(sorted[mid])
    }
}
