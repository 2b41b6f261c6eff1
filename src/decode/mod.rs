//! Pure binary decoders for on-chain account payloads
//!
//! No I/O here: each function takes a byte slice and produces a typed value
//! or a `DecodeError` scoped to that single account.

mod bank;
mod price_feed;

pub use bank::{decode_bank, decode_group, BANK_MIN_LEN, DISCRIMINATOR_LEN};
pub use price_feed::{decode_price_feed, PRICE_FEED_MIN_LEN};

#[cfg(test)]
pub(crate) use bank::test_support as bank_test_support;
#[cfg(test)]
pub(crate) use price_feed::test_support as price_feed_test_support;

use rust_decimal::Decimal;

use crate::errors::DecodeError;

// Decimal mantissas are 96-bit; anything larger cannot be represented.
const DECIMAL_MANTISSA_LIMIT: i128 = 1 << 96;

// checked_abs keeps i128::MIN (no positive counterpart) out of range instead
// of overflowing.
fn mantissa_in_range(value: i128) -> bool {
    value
        .checked_abs()
        .is_some_and(|abs| abs < DECIMAL_MANTISSA_LIMIT)
}

/// Scale an integer mantissa by `10^exponent` without going through floats.
pub(crate) fn scale_by_exponent(mantissa: i128, exponent: i32) -> Result<Decimal, DecodeError> {
    if !mantissa_in_range(mantissa) {
        return Err(DecodeError::ValueOutOfRange);
    }

    if exponent >= 0 {
        if exponent > 28 {
            return Err(DecodeError::UnsupportedExponent(exponent));
        }
        let factor = 10i128
            .checked_pow(exponent as u32)
            .ok_or(DecodeError::UnsupportedExponent(exponent))?;
        let scaled = mantissa
            .checked_mul(factor)
            .filter(|v| mantissa_in_range(*v))
            .ok_or(DecodeError::ValueOutOfRange)?;
        Ok(Decimal::from_i128_with_scale(scaled, 0))
    } else {
        let scale = exponent.unsigned_abs();
        if scale > 28 {
            return Err(DecodeError::UnsupportedExponent(exponent));
        }
        Ok(Decimal::from_i128_with_scale(mantissa, scale))
    }
}

// I80F48: 128-bit signed fixed point with 48 fractional bits.
const I80F48_ONE: i128 = 1 << 48;

/// Convert an I80F48 fixed-point value to a decimal.
pub(crate) fn i80f48_to_decimal(raw: i128) -> Result<Decimal, DecodeError> {
    if !mantissa_in_range(raw) {
        return Err(DecodeError::ValueOutOfRange);
    }
    let value = Decimal::from_i128_with_scale(raw, 0);
    let one = Decimal::from_i128_with_scale(I80F48_ONE, 0);
    Ok(value / one)
}

pub(crate) fn read_bytes<'a>(
    payload: &'a [u8],
    offset: usize,
    len: usize,
    min_len: usize,
) -> Result<&'a [u8], DecodeError> {
    payload
        .get(offset..offset + len)
        .ok_or(DecodeError::Truncated {
            expected: min_len,
            actual: payload.len(),
        })
}

macro_rules! le_reader {
    ($name:ident, $ty:ty) => {
        pub(crate) fn $name(
            payload: &[u8],
            offset: usize,
            min_len: usize,
        ) -> Result<$ty, DecodeError> {
            let bytes = read_bytes(payload, offset, std::mem::size_of::<$ty>(), min_len)?;
            Ok(<$ty>::from_le_bytes(bytes.try_into().expect("sized slice")))
        }
    };
}

le_reader!(read_u16_le, u16);
le_reader!(read_i32_le, i32);
le_reader!(read_i64_le, i64);
le_reader!(read_u64_le, u64);
le_reader!(read_i128_le, i128);
