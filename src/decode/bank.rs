//! Bank and group account decoders
//!
//! Bank layout after the 8-byte discriminator, little-endian:
//!
//! | offset | field              | type             |
//! |--------|--------------------|------------------|
//! | 0      | group              | [u8; 32]         |
//! | 32     | mint               | [u8; 32]         |
//! | 64     | emissions_mint     | [u8; 32]         |
//! | 96     | oracle_key         | [u8; 32]         |
//! | 128    | oracle_setup       | u8               |
//! | 129    | asset_weight_init  | i128 (I80F48)    |
//! | 145    | asset_weight_maint | i128 (I80F48)    |
//! | 161    | emode_tag          | u16              |
//! | 163    | emode_entry_count  | u8               |
//! | 164    | entries            | count * 34 bytes |
//!
//! Each entry: collateral tag (u16) + init weight (i128) + maint weight
//! (i128). Weights are I80F48 fixed point.

use crate::errors::DecodeError;
use crate::types::{Address, BankRecord, EmodeEntry, EmodeTag, FeedKey, RiskGroup, SourceKind};

use super::{i80f48_to_decimal, read_bytes, read_i128_le, read_u16_le};

/// Length of the account-type discriminator prefix.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Minimum bank account length including the discriminator.
pub const BANK_MIN_LEN: usize = DISCRIMINATOR_LEN + 164;

const EMODE_ENTRY_LEN: usize = 34;
const MAX_EMODE_ENTRIES: u8 = 10;

const GROUP_MIN_LEN: usize = DISCRIMINATOR_LEN + 32;

fn oracle_setup_to_source(tag: u8) -> Result<SourceKind, DecodeError> {
    match tag {
        1 => Ok(SourceKind::OnChain),
        2 => Ok(SourceKind::Aggregator),
        3 => Ok(SourceKind::Relay),
        other => Err(DecodeError::UnknownOracleSetup(other)),
    }
}

/// Decode one raw bank account into a typed record.
pub fn decode_bank(address: Address, data: &[u8]) -> Result<BankRecord, DecodeError> {
    if data.len() < BANK_MIN_LEN {
        return Err(DecodeError::Truncated {
            expected: BANK_MIN_LEN,
            actual: data.len(),
        });
    }
    let payload = &data[DISCRIMINATOR_LEN..];
    let min_len = BANK_MIN_LEN - DISCRIMINATOR_LEN;

    let group = Address::from_bytes(read_bytes(payload, 0, 32, min_len)?);
    let mint = Address::from_bytes(read_bytes(payload, 32, 32, min_len)?);
    let emissions_mint = Address::from_bytes(read_bytes(payload, 64, 32, min_len)?);
    let oracle_key = FeedKey::from_bytes(read_bytes(payload, 96, 32, min_len)?);
    let oracle_source = oracle_setup_to_source(payload[128])?;

    let asset_weight_init = i80f48_to_decimal(read_i128_le(payload, 129, min_len)?)?;
    let asset_weight_maint = i80f48_to_decimal(read_i128_le(payload, 145, min_len)?)?;

    let emode_tag = EmodeTag(read_u16_le(payload, 161, min_len)?);
    let entry_count = payload[163];
    if entry_count > MAX_EMODE_ENTRIES {
        return Err(DecodeError::EmodeEntryOverflow(entry_count));
    }

    let entries_len = entry_count as usize * EMODE_ENTRY_LEN;
    let entries_end = 164 + entries_len;
    if payload.len() < entries_end {
        return Err(DecodeError::Truncated {
            expected: DISCRIMINATOR_LEN + entries_end,
            actual: data.len(),
        });
    }

    let mut emode_entries = Vec::with_capacity(entry_count as usize);
    for i in 0..entry_count as usize {
        let base = 164 + i * EMODE_ENTRY_LEN;
        let collateral_bank_emode_tag = EmodeTag(read_u16_le(payload, base, entries_end)?);
        let asset_weight_init = i80f48_to_decimal(read_i128_le(payload, base + 2, entries_end)?)?;
        let asset_weight_maint =
            i80f48_to_decimal(read_i128_le(payload, base + 18, entries_end)?)?;
        emode_entries.push(EmodeEntry {
            collateral_bank_emode_tag,
            asset_weight_init,
            asset_weight_maint,
        });
    }

    Ok(BankRecord {
        address,
        group,
        mint,
        emissions_mint: if emissions_mint.is_default() {
            None
        } else {
            Some(emissions_mint)
        },
        oracle_key,
        oracle_source,
        asset_weight_init,
        asset_weight_maint,
        emode_tag,
        emode_entries,
    })
}

/// Decode one raw risk-group account.
pub fn decode_group(address: Address, data: &[u8]) -> Result<RiskGroup, DecodeError> {
    if data.len() < GROUP_MIN_LEN {
        return Err(DecodeError::Truncated {
            expected: GROUP_MIN_LEN,
            actual: data.len(),
        });
    }
    let admin = Address::from_bytes(&data[DISCRIMINATOR_LEN..DISCRIMINATOR_LEN + 32]);
    Ok(RiskGroup { address, admin })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use rust_decimal::Decimal;

    /// Assemble a syntactically valid bank account for tests.
    pub(crate) fn build_bank_account(
        group: [u8; 32],
        mint: [u8; 32],
        emissions_mint: [u8; 32],
        oracle_key: [u8; 32],
        oracle_setup: u8,
        weight_init: Decimal,
        weight_maint: Decimal,
        emode_tag: u16,
        entries: &[(u16, Decimal, Decimal)],
    ) -> Vec<u8> {
        let mut data = vec![0u8; BANK_MIN_LEN + entries.len() * EMODE_ENTRY_LEN];
        let payload = &mut data[DISCRIMINATOR_LEN..];
        payload[0..32].copy_from_slice(&group);
        payload[32..64].copy_from_slice(&mint);
        payload[64..96].copy_from_slice(&emissions_mint);
        payload[96..128].copy_from_slice(&oracle_key);
        payload[128] = oracle_setup;
        payload[129..145].copy_from_slice(&decimal_to_i80f48(weight_init).to_le_bytes());
        payload[145..161].copy_from_slice(&decimal_to_i80f48(weight_maint).to_le_bytes());
        payload[161..163].copy_from_slice(&emode_tag.to_le_bytes());
        payload[163] = entries.len() as u8;
        for (i, (tag, init, maint)) in entries.iter().enumerate() {
            let base = 164 + i * EMODE_ENTRY_LEN;
            payload[base..base + 2].copy_from_slice(&tag.to_le_bytes());
            payload[base + 2..base + 18].copy_from_slice(&decimal_to_i80f48(*init).to_le_bytes());
            payload[base + 18..base + 34]
                .copy_from_slice(&decimal_to_i80f48(*maint).to_le_bytes());
        }
        data
    }

    // Close enough for test weights; round-trips within 2^-48.
    pub(crate) fn decimal_to_i80f48(value: Decimal) -> i128 {
        let scaled = value * Decimal::from_i128_with_scale(super::super::I80F48_ONE, 0);
        scaled
            .round()
            .normalize()
            .to_string()
            .parse::<i128>()
            .expect("integral decimal")
    }
}
