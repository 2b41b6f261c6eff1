//! E-mode risk weight adjustment
//!
//! Banks can declare that collateral from a tagged risk category is accepted
//! at preferential (higher) weights. This module derives the normalized pair
//! relation from per-bank entries, then computes each bank's final weights:
//! the minimum preferential weight across all pairs naming the bank as
//! collateral, applied only when it actually improves on the bank's
//! statically configured weight. Banks are never patched in place; callers
//! get fresh weight maps next to the untouched bank records.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::types::{Address, AdjustedWeightMap, AdjustedWeights, BankRecord, EmodePair};

/// Output of one adjustment pass: the final weight per bank (total over the
/// bank set) plus the configured weights that were superseded, for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmodeAdjustment {
    pub adjusted: AdjustedWeightMap,
    /// Configured weights of the banks whose weights changed.
    pub original_weights: AdjustedWeightMap,
}

/// Derive the normalized pair relation from all banks' e-mode entries.
///
/// Each entry on a liability-side bank fans out to every bank carrying the
/// entry's collateral tag, the liability bank included when its own tag
/// matches.
pub fn derive_emode_pairs(banks: &[BankRecord]) -> Vec<EmodePair> {
    let mut pairs = Vec::new();
    for liability_bank in banks {
        if liability_bank.emode_tag.is_unset() {
            continue;
        }
        for entry in &liability_bank.emode_entries {
            // An unset collateral tag would fan out to every untagged bank.
            if entry.collateral_bank_emode_tag.is_unset() {
                continue;
            }
            let collateral_banks: Vec<Address> = banks
                .iter()
                .filter(|bank| bank.emode_tag == entry.collateral_bank_emode_tag)
                .map(|bank| bank.address.clone())
                .collect();

            pairs.push(EmodePair {
                collateral_banks,
                collateral_bank_tag: entry.collateral_bank_emode_tag,
                liability_bank: liability_bank.address.clone(),
                liability_bank_tag: liability_bank.emode_tag,
                asset_weight_init: entry.asset_weight_init,
                asset_weight_maint: entry.asset_weight_maint,
            });
        }
    }
    pairs
}

/// Compute final weights for every bank under the given pair set.
///
/// Per tier, the candidate is the minimum weight across all pairs naming the
/// bank as collateral; it is applied only when it is strictly greater than
/// the configured weight. The weight therefore never drops below the
/// configured baseline, and a bank outside every pair keeps its configured
/// weights exactly.
pub fn adjust_bank_weights(banks: &[BankRecord], pairs: &[EmodePair]) -> EmodeAdjustment {
    // Per-bank minimum pair weight, tracked independently per tier.
    let mut lowest: HashMap<&Address, AdjustedWeights> = HashMap::new();
    for pair in pairs {
        for collateral in &pair.collateral_banks {
            lowest
                .entry(collateral)
                .and_modify(|weights| {
                    weights.asset_weight_init =
                        weights.asset_weight_init.min(pair.asset_weight_init);
                    weights.asset_weight_maint =
                        weights.asset_weight_maint.min(pair.asset_weight_maint);
                })
                .or_insert(AdjustedWeights {
                    asset_weight_init: pair.asset_weight_init,
                    asset_weight_maint: pair.asset_weight_maint,
                });
        }
    }

    let mut adjusted = HashMap::with_capacity(banks.len());
    let mut original_weights = HashMap::new();
    for bank in banks {
        let configured = AdjustedWeights {
            asset_weight_init: bank.asset_weight_init,
            asset_weight_maint: bank.asset_weight_maint,
        };

        let final_weights = match lowest.get(&bank.address) {
            Some(candidate) => AdjustedWeights {
                asset_weight_init: raise_only(configured.asset_weight_init, candidate.asset_weight_init),
                asset_weight_maint: raise_only(
                    configured.asset_weight_maint,
                    candidate.asset_weight_maint,
                ),
            },
            None => configured,
        };

        if final_weights != configured {
            debug!(
                bank = %bank.address,
                init = %final_weights.asset_weight_init,
                maint = %final_weights.asset_weight_maint,
                "preferential weights applied"
            );
            original_weights.insert(bank.address.clone(), configured);
        }
        adjusted.insert(bank.address.clone(), final_weights);
    }

    EmodeAdjustment {
        adjusted,
        original_weights,
    }
}

// The safety-critical directionality: preferential weights may only raise a
// weight above its configured baseline, never lower it.
fn raise_only(configured: Decimal, candidate: Decimal) -> Decimal {
    if candidate > configured {
        candidate
    } else {
        configured
    }
}
